//! Static mapping from mutation types to the query-key prefixes they stale.

use crate::cache::QueryKey;

/// Every state-changing operation the admin surface performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
  UserUpdate(u64),
  UserDelete(u64),
  UserToggleActive(u64),
  BookCreate,
  BookUpdate(u64),
  BookDelete(u64),
  ForumCreate,
  ForumUpdate(u64),
  ForumDelete(u64),
  ThreadDelete { forum_id: u64, thread_id: u64 },
  PostDelete { thread_id: u64, post_id: u64 },
  ChallengeCreate,
  ChallengeUpdate(u64),
  ChallengeDelete(u64),
  ChallengeJoin(u64),
  EventCreate,
  EventUpdate(u64),
  EventDelete(u64),
  BadgeCreate,
  BadgeUpdate(u64),
  BadgeDelete(u64),
}

/// The key prefixes a successful mutation marks stale.
///
/// Every mutation stales at least the resource's list prefix; the resource
/// prefix also covers the single-entity keys nested under it. Scoped
/// collections (threads under a forum, posts under a thread) add the parent
/// collection prefix so their list views refetch too.
pub fn rules(kind: MutationKind) -> Vec<QueryKey> {
  use MutationKind::*;

  match kind {
    UserUpdate(_) | UserDelete(_) | UserToggleActive(_) => vec![QueryKey::resource("users")],
    BookCreate | BookUpdate(_) | BookDelete(_) => vec![QueryKey::resource("books")],
    ForumCreate | ForumUpdate(_) => vec![QueryKey::resource("forums")],
    // Deleting a forum also takes its threads with it
    ForumDelete(id) => vec![
      QueryKey::resource("forums"),
      QueryKey::resource("forums").segment(id).segment("threads"),
    ],
    ThreadDelete { forum_id, thread_id } => vec![
      QueryKey::resource("forums").segment(forum_id).segment("threads"),
      QueryKey::resource("threads").segment(thread_id),
    ],
    PostDelete { thread_id, post_id } => vec![
      QueryKey::resource("threads").segment(thread_id).segment("posts"),
      QueryKey::resource("posts").segment(post_id),
    ],
    ChallengeCreate | ChallengeUpdate(_) | ChallengeDelete(_) | ChallengeJoin(_) => {
      vec![QueryKey::resource("challenges")]
    }
    EventCreate | EventUpdate(_) | EventDelete(_) => vec![QueryKey::resource("events")],
    BadgeCreate | BadgeUpdate(_) | BadgeDelete(_) => vec![QueryKey::resource("badges")],
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_mutation_stales_its_list_prefix() {
    use MutationKind::*;
    let cases: Vec<(MutationKind, &str)> = vec![
      (UserUpdate(1), "users"),
      (UserDelete(1), "users"),
      (UserToggleActive(1), "users"),
      (BookCreate, "books"),
      (BookDelete(5), "books"),
      (ForumCreate, "forums"),
      (ForumDelete(2), "forums"),
      (ChallengeJoin(9), "challenges"),
      (EventUpdate(3), "events"),
      (BadgeCreate, "badges"),
    ];

    for (kind, resource) in cases {
      let prefixes = rules(kind);
      let list = QueryKey::resource(resource);
      assert!(
        prefixes.contains(&list),
        "{kind:?} must stale the {resource} list prefix"
      );
    }
  }

  #[test]
  fn resource_prefix_covers_entity_keys() {
    let prefixes = rules(MutationKind::BookDelete(5));
    let entity = QueryKey::resource("books").segment(5);
    let filtered_list = QueryKey::resource("books").page(2);

    assert!(prefixes.iter().any(|p| entity.starts_with(p)));
    assert!(prefixes.iter().any(|p| filtered_list.starts_with(p)));
  }

  #[test]
  fn scoped_deletes_stale_the_parent_collection() {
    let prefixes = rules(MutationKind::ThreadDelete {
      forum_id: 3,
      thread_id: 44,
    });
    let thread_list = QueryKey::resource("forums").segment(3).segment("threads").page(1);
    assert!(prefixes.iter().any(|p| thread_list.starts_with(p)));

    // Threads of another forum are untouched
    let other_list = QueryKey::resource("forums").segment(4).segment("threads").page(1);
    assert!(!prefixes.iter().any(|p| other_list.starts_with(p)));
  }
}
