//! Development seeding utility
//!
//! Registers a member, one or more articles and a fresh session token in the
//! progress database, then prints the token for use with `folio-rt`.
//!
//! **Usage:**
//! ```bash
//! folio-seed --member reader-1 --article intro --article chapter-2
//! folio-seed --member troll --ban
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use tracing::info;

use folio_common::config::{RootFolderInitializer, RootFolderResolver};
use folio_common::db::init::init_database;
use folio_common::time::now;
use folio_ps::collab::directory::{insert_article, insert_member, insert_session, set_member_banned};

/// Seed members, articles and sessions
#[derive(Parser, Debug)]
#[clap(name = "folio-seed")]
#[clap(about = "Seed a Folio progress database for local development")]
struct Args {
    /// Root folder holding the database
    #[clap(short, long, env = "FOLIO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Database file (defaults to <root>/folio.db)
    #[clap(long)]
    database: Option<PathBuf>,

    /// Member identifier
    #[clap(long, default_value = "reader-1")]
    member: String,

    /// Member display name (defaults to the identifier)
    #[clap(long)]
    display_name: Option<String>,

    /// Article identifier to register (repeatable)
    #[clap(long = "article", value_name = "ID")]
    articles: Vec<String>,

    /// Session lifetime in hours; 0 for a session that never expires
    #[clap(long, default_value = "24")]
    session_hours: i64,

    /// Mark the member as banned
    #[clap(long)]
    ban: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let db_path = match args.database {
        Some(path) => path,
        None => {
            let root = RootFolderResolver::new("seed")
                .with_cli_arg(args.root_folder)
                .resolve();
            let initializer = RootFolderInitializer::new(root);
            initializer.ensure_directory_exists()?;
            initializer.database_path()
        }
    };

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    let display_name = args.display_name.as_deref().unwrap_or(&args.member);
    insert_member(&pool, &args.member, display_name).await?;
    set_member_banned(&pool, &args.member, args.ban).await?;
    info!(member_id = %args.member, banned = args.ban, "Member registered");

    for article_id in &args.articles {
        insert_article(&pool, article_id, article_id).await?;
        info!(article_id = %article_id, "Article registered");
    }

    let token = uuid::Uuid::new_v4().simple().to_string();
    let expires_at = (args.session_hours > 0).then(|| now() + Duration::hours(args.session_hours));
    insert_session(&pool, &args.member, &token, expires_at).await?;

    pool.close().await;

    println!("{}", token);
    Ok(())
}
