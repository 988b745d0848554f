use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use feedline::background::{JobScheduler, FEED_REFRESH_JOB};
use feedline::background::{Job, JobOutcome};
use feedline::config::Config;
use feedline::feed::{FeedRefreshResult, SubscribeError};
use feedline::storage::{Article, DatabaseError, Feed};
use feedline::{AppContext, ContextError};

/// How often the daemon re-reads the enabled preference.
const DAEMON_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Get the config directory path (~/.config/feedline/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedline"))
}

#[derive(Parser, Debug)]
#[command(name = "feedline", version, about = "RSS/Atom feed subscriptions and refresh")]
struct Cli {
    /// Config file (default: ~/.config/feedline/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file, overrides the config
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a feed or to the feed a web page advertises
    Add { url: String },
    /// Unsubscribe and delete the feed's articles
    Remove { feed_id: String },
    /// List subscriptions, favorites first
    List,
    /// Mark a feed as favorite (refreshed first in the background)
    Favorite {
        feed_id: String,
        /// Clear the favorite flag instead
        #[arg(long)]
        off: bool,
    },
    /// Refresh every feed, or just one
    Refresh {
        #[arg(long, value_name = "FEED_ID")]
        feed: Option<String>,
    },
    /// List articles, newest first
    Articles(ArticleFilter),
    /// Mark an article as read
    Read {
        article_id: String,
        #[arg(long)]
        unread: bool,
    },
    /// Save an article for later
    Save {
        article_id: String,
        #[arg(long)]
        remove: bool,
    },
    /// Find the feed behind a URL without subscribing
    Discover { url: String },
    /// Control periodic background refresh
    #[command(subcommand)]
    Background(BackgroundCommand),
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct ArticleFilter {
    #[arg(long, value_name = "FEED_ID")]
    feed: Option<String>,
    #[arg(long)]
    saved: bool,
    #[arg(long)]
    unread: bool,
}

#[derive(Subcommand, Debug)]
enum BackgroundCommand {
    Enable {
        /// Also refresh on metered networks
        #[arg(long)]
        allow_cellular: bool,
    },
    Disable,
    /// Run the background job once
    Run,
    /// Keep the periodic job running until interrupted
    Daemon,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = get_config_dir()?;
    ensure_config_dir(&config_dir)?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("feedline.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let ctx = match AppContext::open(db_path_str, config).await {
        Ok(ctx) => ctx,
        Err(ContextError::Database(DatabaseError::InstanceLocked)) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to initialize"),
    };

    run(&ctx, cli.command, cli.json).await
}

fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if config_dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;

    // User-only access on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

async fn run(ctx: &AppContext, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Add { url } => match ctx.subscriptions().add_feed(&url).await {
            Ok(feed) => emit(json, &feed, || print_feed(&feed)),
            Err(SubscribeError::Database(e)) => Err(e).context("Failed to add feed"),
            Err(e) => anyhow::bail!("{e}"),
        },
        Command::Remove { feed_id } => {
            if !ctx.subscriptions().remove_feed(&feed_id).await? {
                anyhow::bail!("No feed with id {feed_id}");
            }
            if !json {
                println!("Removed {feed_id}");
            }
            Ok(())
        }
        Command::List => {
            let feeds = ctx.db().list_feeds().await.context("Failed to load feeds")?;
            emit(json, &feeds, || feeds.iter().for_each(print_feed))
        }
        Command::Favorite { feed_id, off } => {
            require_feed(ctx, &feed_id).await?;
            ctx.subscriptions().set_favorite(&feed_id, !off).await?;
            Ok(())
        }
        Command::Refresh { feed } => {
            let results = match feed {
                Some(feed_id) => {
                    let feed = require_feed(ctx, &feed_id).await?;
                    vec![ctx.fetcher().refresh_feed(&feed).await]
                }
                None => ctx
                    .fetcher()
                    .refresh_all()
                    .await
                    .context("Failed to load feeds")?,
            };
            emit(json, &results, || print_results(&results))
        }
        Command::Articles(filter) => {
            let db = ctx.db();
            let articles = if let Some(feed_id) = &filter.feed {
                db.articles_for_feed(feed_id).await?
            } else if filter.saved {
                db.saved_articles().await?
            } else if filter.unread {
                db.unread_articles().await?
            } else {
                db.list_articles().await?
            };
            emit(json, &articles, || articles.iter().for_each(print_article))
        }
        Command::Read { article_id, unread } => {
            require_article(ctx, &article_id).await?;
            ctx.subscriptions().mark_read(&article_id, !unread).await?;
            Ok(())
        }
        Command::Save { article_id, remove } => {
            require_article(ctx, &article_id).await?;
            ctx.subscriptions().set_saved(&article_id, !remove).await?;
            Ok(())
        }
        Command::Discover { url } => match ctx.discoverer().discover(&url).await {
            Some(found) => emit(json, &found, || {
                println!("{}  {}", found.feed_url, found.title);
            }),
            None => anyhow::bail!("No RSS or Atom feed found at {url}"),
        },
        Command::Background(cmd) => run_background(ctx, cmd, json).await,
    }
}

async fn run_background(ctx: &AppContext, cmd: BackgroundCommand, json: bool) -> Result<()> {
    let prefs = ctx.preferences();
    match cmd {
        BackgroundCommand::Enable { allow_cellular } => {
            prefs.set_background_refresh_enabled(true).await?;
            prefs.set_wifi_only(!allow_cellular).await?;
            println!("Background refresh enabled");
        }
        BackgroundCommand::Disable => {
            prefs.set_background_refresh_enabled(false).await?;
            println!("Background refresh disabled");
        }
        BackgroundCommand::Run => {
            let outcome = ctx.refresh_job().run().await;
            let last = prefs.last_refresh_time().await?;
            if json {
                print_json(&serde_json::json!({
                    "retry": outcome == JobOutcome::Retry,
                    "last_refresh_time": last,
                }))?;
            } else {
                println!("{outcome:?} (last refresh: {})", format_millis(last));
            }
        }
        BackgroundCommand::Daemon => {
            let mut scheduler = JobScheduler::new(ctx.conditions());
            let policy = ctx.schedule_policy();
            loop {
                let enabled = prefs.background_refresh_enabled().await?;
                scheduler.sync(FEED_REFRESH_JOB, enabled, policy, || ctx.refresh_job());
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = tokio::time::sleep(DAEMON_SYNC_INTERVAL) => {}
                }
            }
            scheduler.cancel(FEED_REFRESH_JOB);
            tracing::info!("Background daemon stopped");
        }
    }
    Ok(())
}

async fn require_feed(ctx: &AppContext, feed_id: &str) -> Result<Feed> {
    ctx.db()
        .get_feed(feed_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No feed with id {feed_id}"))
}

async fn require_article(ctx: &AppContext, article_id: &str) -> Result<Article> {
    ctx.db()
        .get_article(article_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No article with id {article_id}"))
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        print_json(value)
    } else {
        human();
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn print_feed(feed: &Feed) {
    let star = if feed.is_favorite { "*" } else { " " };
    println!(
        "{star} {}  {}  (updated {})",
        feed.id,
        feed.title,
        format_millis(feed.last_updated)
    );
    if let Some(err) = &feed.last_refresh_error {
        println!("    last error: {err}");
    }
}

fn print_article(article: &Article) {
    let flag = match (article.is_read, article.is_saved) {
        (_, true) => "S",
        (false, false) => "N",
        (true, false) => " ",
    };
    println!(
        "{flag} {}  {}  [{}]  {}",
        article.id,
        format_millis(Some(article.published)),
        article.feed_title,
        article.title
    );
}

fn print_results(results: &[FeedRefreshResult]) {
    for r in results {
        match &r.error {
            None => println!("ok    {}  +{}", r.feed_id, r.inserted),
            Some(err) => println!("fail  {}  {err}", r.feed_id),
        }
    }
    let ok = results.iter().filter(|r| r.success).count();
    println!("{ok}/{} feeds refreshed", results.len());
}

fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}
