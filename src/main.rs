use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use libiverse_admin::api::AdminApi;
use libiverse_admin::config::Config;
use libiverse_admin::session::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "libiverse-admin")]
#[command(about = "Administration client for the Libiverse book-community platform")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/libiverse/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Log in and store the credential
  Login {
    email: String,
    /// Persist the credential beyond this process
    #[arg(long)]
    remember: bool,
  },
  /// Clear the stored credential (best-effort server notification)
  Logout,
  /// Show the locally stored user record
  Whoami,
  /// List user accounts
  Users {
    #[arg(long, default_value_t = 1)]
    page: u64,
  },
  /// List the book catalogue
  Books {
    #[arg(long, default_value_t = 1)]
    page: u64,
  },
  /// List discussion forums
  Forums {
    #[arg(long, default_value_t = 1)]
    page: u64,
  },
  /// List reading challenges
  Challenges {
    #[arg(long, default_value_t = 1)]
    page: u64,
  },
  /// List community events
  Events {
    #[arg(long, default_value_t = 1)]
    page: u64,
  },
  /// List achievement badges
  Badges {
    #[arg(long, default_value_t = 1)]
    page: u64,
  },
}

/// Set up file logging; stdout stays clean for command output.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()?.join("libiverse");
  let appender = tracing_appender::rolling::never(log_dir, "libiverse-admin.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}

fn print_pagination(pagination: Option<&libiverse_admin::api::Pagination>) {
  if let Some(p) = pagination {
    println!("page {}/{} ({} total)", p.current_page, p.total_pages, p.total);
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing();

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let session = Arc::new(SessionStore::open()?);
  let api = AdminApi::new(&config, session)?;

  match args.command {
    Command::Login { email, remember } => {
      let password = Config::get_password()?;
      let remember = remember || config.remember_me;
      let user = api.login(&email, &password, remember).await?;
      api.session().store_username(&email)?;
      println!("logged in as {} ({:?})", user.name, user.role);
    }
    Command::Logout => {
      api.logout().await?;
      println!("logged out");
    }
    Command::Whoami => match api.current_user()? {
      Some(user) => println!("{} <{}> ({:?})", user.name, user.email, user.role),
      None => println!("not logged in"),
    },
    Command::Users { page } => {
      let result = api.users(page, &Default::default()).await.map_err(|e| eyre!("{e}"))?;
      for user in &result.items {
        let state = if user.active { "active" } else { "inactive" };
        println!("{:>5}  {:<24} {:<32} {:?} ({state})", user.id, user.name, user.email, user.role);
      }
      print_pagination(result.pagination.as_ref());
    }
    Command::Books { page } => {
      let result = api.books(page, &Default::default()).await.map_err(|e| eyre!("{e}"))?;
      for book in &result.items {
        println!("{:>5}  {} by {}", book.id, book.title, book.author);
      }
      print_pagination(result.pagination.as_ref());
    }
    Command::Forums { page } => {
      let result = api.forums(page).await.map_err(|e| eyre!("{e}"))?;
      for forum in &result.items {
        println!("{:>5}  {} ({} threads)", forum.id, forum.title, forum.thread_count);
      }
      print_pagination(result.pagination.as_ref());
    }
    Command::Challenges { page } => {
      let result = api.challenges(page).await.map_err(|e| eyre!("{e}"))?;
      for challenge in &result.items {
        println!(
          "{:>5}  {} ({} to {}, {} joined)",
          challenge.id, challenge.title, challenge.starts_on, challenge.ends_on,
          challenge.participant_count
        );
      }
      print_pagination(result.pagination.as_ref());
    }
    Command::Events { page } => {
      let result = api.events(page).await.map_err(|e| eyre!("{e}"))?;
      for event in &result.items {
        let location = event.location.as_deref().unwrap_or("online");
        println!("{:>5}  {} @ {} ({})", event.id, event.title, location, event.starts_at);
      }
      print_pagination(result.pagination.as_ref());
    }
    Command::Badges { page } => {
      let result = api.badges(page).await.map_err(|e| eyre!("{e}"))?;
      for badge in &result.items {
        println!("{:>5}  {}", badge.id, badge.name);
      }
      print_pagination(result.pagination.as_ref());
    }
  }

  Ok(())
}
