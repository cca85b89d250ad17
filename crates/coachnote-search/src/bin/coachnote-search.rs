//! coachnote-search: query coach notes from the command line.
//!
//! Results are printed to stdout as JSON; logs go to stderr (or `LOG_FILE`).

use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coachnote_core::defaults::SNIPPET_LENGTH;
use coachnote_db::{Database, PgNoteSearch, PoolConfig};
use coachnote_search::{
    AccessLevel, InMemoryNoteStore, NoteSearchEngine, NoteSearchStore, Requester, SearchConfig,
    SearchOptions, SortBy, SortOrder,
};

#[derive(Parser)]
#[command(name = "coachnote-search")]
#[command(author, version, about = "Search coach notes")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RequesterArgs {
    /// Requesting user id
    #[arg(short, long)]
    user: String,

    /// Requesting user role (admin, supervisor, coach, ...)
    #[arg(short, long)]
    role: String,
}

impl RequesterArgs {
    fn requester(&self) -> Requester {
        Requester::new(self.user.clone(), self.role.as_str())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search notes visible to a user
    Search {
        #[command(flatten)]
        who: RequesterArgs,

        /// Free-text query ("phrase", -exclude)
        #[arg(short, long)]
        query: Option<String>,

        /// Match notes carrying any of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Restrict to these access levels (repeatable)
        #[arg(long = "access-level")]
        access_levels: Vec<AccessLevel>,

        /// Earliest creation time (RFC 3339)
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// Latest creation time (RFC 3339)
        #[arg(long)]
        to: Option<DateTime<Utc>>,

        #[arg(long)]
        coach: Option<String>,

        #[arg(long)]
        client: Option<String>,

        #[arg(long)]
        session: Option<String>,

        #[arg(long)]
        page: Option<i64>,

        #[arg(long)]
        limit: Option<i64>,

        /// relevance, date, title, or lastAccess
        #[arg(long)]
        sort_by: Option<SortBy>,

        /// asc or desc
        #[arg(long)]
        sort_order: Option<SortOrder>,

        /// Truncate note bodies in the output
        #[arg(long)]
        preview: bool,
    },

    /// Autocomplete a partial query
    Suggest {
        #[command(flatten)]
        who: RequesterArgs,

        /// Partial query text
        #[arg(short, long)]
        prefix: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Most used tags
    PopularTags {
        #[command(flatten)]
        who: RequesterArgs,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Apply database migrations
    #[cfg(feature = "migrations")]
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional; daily rotation)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - env filter (default: "coachnote_search=info,coachnote_db=warn")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coachnote_search=info,coachnote_db=warn".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match std::env::var("LOG_FILE").ok() {
        Some(path) => {
            let path = std::path::Path::new(&path);
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("coachnote-search.log");
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));

            if log_format == "json" {
                registry
                    .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                    .init();
            } else {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(writer)
                            .with_ansi(log_ansi.unwrap_or(false)),
                    )
                    .init();
            }
            Some(guard)
        }
        None => {
            // stdout carries results
            if log_format == "json" {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
                if let Some(ansi) = log_ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
            None
        }
    }
}

async fn connect(database_url: Option<String>) -> anyhow::Result<Database> {
    let url = database_url.ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let db = Database::connect_with_config(&url, PoolConfig::from_env()).await?;
    Ok(db)
}

fn engine<S: NoteSearchStore>(store: S) -> NoteSearchEngine<S> {
    let config = SearchConfig::from_env();
    info!(
        subsystem = "cli",
        query_timeout_ms = config.query_timeout_ms(),
        default_limit = config.default_limit,
        "Search engine configured"
    );
    NoteSearchEngine::with_config(store, config)
}

fn pg_engine(db: &Database) -> NoteSearchEngine<PgNoteSearch> {
    engine(db.search.clone())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let database_url = cli.database_url;

    match cli.command {
        Commands::Search {
            who,
            query,
            tags,
            access_levels,
            from,
            to,
            coach,
            client,
            session,
            page,
            limit,
            sort_by,
            sort_order,
            preview,
        } => {
            let options = SearchOptions {
                query,
                tags,
                access_level: access_levels,
                date_range: None,
                coach_id: coach,
                client_id: client,
                session_id: session,
                page,
                limit,
                sort_by,
                sort_order,
            };
            let options = if from.is_some() || to.is_some() {
                options.with_date_range(from, to)
            } else {
                options
            };

            let db = connect(database_url).await?;
            let mut result = pg_engine(&db)
                .search_notes(&who.requester(), &options)
                .await?;
            if preview {
                for hit in &mut result.notes {
                    hit.note.searchable_content =
                        truncate_chars(&hit.note.searchable_content, SNIPPET_LENGTH);
                }
            }
            print_json(&result)
        }
        Commands::Suggest { who, prefix, limit } => {
            let db = connect(database_url).await?;
            let suggestions = pg_engine(&db)
                .get_search_suggestions(&who.requester(), &prefix, limit)
                .await?;
            print_json(&suggestions)
        }
        Commands::PopularTags { who, limit } => {
            // Tag statistics never reach the store; no connection needed.
            let tags = engine(InMemoryNoteStore::new())
                .get_popular_tags(&who.requester(), limit)
                .await?;
            print_json(&tags)
        }
        #[cfg(feature = "migrations")]
        Commands::Migrate => {
            let db = connect(database_url).await?;
            db.migrate().await?;
            info!(subsystem = "cli", op = "migrate", "Migrations applied");
            Ok(())
        }
    }
}
