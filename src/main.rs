use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use pulltally::activity::{
    self, BranchFilter, CommentSummary, IssueSummary, RepoFilter, TallyItem, UserFilter, Window,
};
use pulltally::cache::{Cacher, DiskCache, MemoryCache};
use pulltally::github::retry::RetryPolicy;
use pulltally::github::{Fetcher, GithubClient, PipelineError, auth};
use pulltally::summary::SummaryRules;
use pulltally::util::config::AppConfig;
use pulltally::util::time::parse_date;

/// Repositories processed at once.
const REPO_CONCURRENCY: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "pulltally", version, about = "GitHub contribution reports")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a file holding a GitHub token
    #[arg(long)]
    token_path: Option<PathBuf>,

    /// Keep fetched data in memory only
    #[arg(long)]
    no_cache: bool,

    /// Drop the disk cache before running
    #[arg(short, long)]
    refresh: bool,

    /// Enable debug logging to file
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merged pull requests with change summaries
    Prs(ReportArgs),
    /// Closed issues
    Issues(ReportArgs),
    /// Comment activity per commenter
    Comments(ReportArgs),
    /// Issue and comment leaderboards
    Tally(ReportArgs),
    /// Repository names for organizations
    Repos {
        /// Organizations to list
        #[arg(required = true)]
        orgs: Vec<String>,

        /// Glob patterns a repository must match
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,

        /// Glob patterns that exclude a repository
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Repositories as org/project
    #[arg(long, value_delimiter = ',', required = true)]
    repos: Vec<String>,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    since: String,

    /// Last day of the window (YYYY-MM-DD), defaults to today
    #[arg(long)]
    until: Option<String>,

    /// Only count these users
    #[arg(long, value_delimiter = ',')]
    users: Vec<String>,

    /// Only count pull requests merged into these branches
    #[arg(long, value_delimiter = ',')]
    branches: Vec<String>,
}

impl ReportArgs {
    fn window(&self) -> Result<Window> {
        let since = parse_date(&self.since)?;
        let until = match &self.until {
            Some(s) => parse_date(s)?,
            None => Utc::now().date_naive(),
        };
        Window::from_dates(since, until)
    }

    fn repos(&self) -> Result<Vec<(String, String)>> {
        self.repos
            .iter()
            .map(|r| match r.trim().split_once('/') {
                Some((org, project)) if !org.is_empty() && !project.is_empty() => {
                    Ok((org.to_string(), project.to_string()))
                }
                _ => bail!("Invalid repository {r:?}, expected org/project"),
            })
            .collect()
    }
}

#[derive(Serialize)]
struct TallyReport {
    issue_closers: Vec<TallyItem>,
    issue_openers: Vec<TallyItem>,
    comments: Vec<TallyItem>,
    comment_words: Vec<TallyItem>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    let _guard = setup_logging(&config, cli.debug)?;

    info!("pulltally starting");

    let token = match auth::resolve_token(cli.token_path.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Authentication error: {e:#}");
            std::process::exit(1);
        }
    };

    let client = GithubClient::new(&token, &config.github)?;

    let cache: Arc<dyn Cacher> = if cli.no_cache {
        Arc::new(MemoryCache::new())
    } else {
        let store = DiskCache::new(config.cache_dir(), config.cache.skew_secs);
        if cli.refresh {
            store.invalidate_all()?;
        }
        Arc::new(store)
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling");
            on_interrupt.cancel();
        }
    });

    let fetcher = Fetcher::new(
        client,
        cache,
        RetryPolicy::from_config(&config.retry),
        cancel,
    )
    .with_page_sizes(config.github.per_page, config.github.issue_per_page);

    match &cli.command {
        Command::Prs(args) => {
            let rules = SummaryRules::from_config(&config.summary)?;
            let window = args.window()?;
            let users = UserFilter::new(&args.users);
            let branches = BranchFilter::new(&args.branches);
            let (rows, failed) = per_repo(&args.repos()?, |org, project| {
                let fetcher = &fetcher;
                let (window, users, branches, rules) = (&window, &users, &branches, &rules);
                async move {
                    activity::list_merged_pull_requests(
                        fetcher, &org, &project, window, users, branches, rules,
                    )
                    .await
                }
            })
            .await;
            print_json(&rows)?;
            finish(failed)
        }
        Command::Issues(args) => {
            let window = args.window()?;
            let users = UserFilter::new(&args.users);
            let (rows, failed) = collect_issues(&fetcher, args, &window, &users).await?;
            print_json(&rows)?;
            finish(failed)
        }
        Command::Comments(args) => {
            let window = args.window()?;
            let users = UserFilter::new(&args.users);
            let (rows, failed) = collect_comments(&fetcher, args, &window, &users).await?;
            print_json(&rows)?;
            finish(failed)
        }
        Command::Tally(args) => {
            let window = args.window()?;
            let users = UserFilter::new(&args.users);
            let (issues, issue_failures) = collect_issues(&fetcher, args, &window, &users).await?;
            let (comments, comment_failures) =
                collect_comments(&fetcher, args, &window, &users).await?;
            print_json(&TallyReport {
                issue_closers: activity::issue_closer_tally(&issues, &users),
                issue_openers: activity::issue_opener_tally(&issues, &users),
                comments: activity::comments_tally(&comments, &users),
                comment_words: activity::comment_words_tally(&comments, &users),
            })?;
            finish(issue_failures + comment_failures)
        }
        Command::Repos {
            orgs,
            include,
            exclude,
        } => {
            let filter = RepoFilter {
                include: include.clone(),
                exclude: exclude.clone(),
            };
            let mut names = Vec::new();
            let mut failed = 0;
            for org in orgs {
                match activity::list_repo_names(&fetcher, org, &filter).await {
                    Ok(found) => names.extend(found),
                    Err(e) => {
                        error!(error = %e, "Repository listing failed");
                        eprintln!("{e}");
                        failed += 1;
                    }
                }
            }
            print_json(&names)?;
            finish(failed)
        }
    }
}

async fn collect_issues(
    fetcher: &Fetcher,
    args: &ReportArgs,
    window: &Window,
    users: &UserFilter,
) -> Result<(Vec<IssueSummary>, usize)> {
    Ok(per_repo(&args.repos()?, |org, project| async move {
        activity::closed_issues(fetcher, &org, &project, window, users).await
    })
    .await)
}

async fn collect_comments(
    fetcher: &Fetcher,
    args: &ReportArgs,
    window: &Window,
    users: &UserFilter,
) -> Result<(Vec<CommentSummary>, usize)> {
    Ok(per_repo(&args.repos()?, |org, project| async move {
        activity::comment_summaries(fetcher, &org, &project, window, users).await
    })
    .await)
}

/// Run one pipeline per repository, a few at a time, keeping repository
/// order in the output. A failed repository is reported and left out.
async fn per_repo<T, F, Fut>(repos: &[(String, String)], run: F) -> (Vec<T>, usize)
where
    F: Fn(String, String) -> Fut,
    Fut: Future<Output = Result<Vec<T>, PipelineError>>,
{
    let results: Vec<Result<Vec<T>, PipelineError>> = stream::iter(repos.iter().cloned())
        .map(|(org, project)| run(org, project))
        .buffered(REPO_CONCURRENCY)
        .collect()
        .await;

    let mut rows = Vec::new();
    let mut failed = 0;
    for result in results {
        match result {
            Ok(found) => rows.extend(found),
            Err(e) => {
                error!(error = %e, "Repository report failed");
                eprintln!("{e}");
                failed += 1;
            }
        }
    }
    (rows, failed)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to encode report")?;
    println!("{out}");
    Ok(())
}

fn finish(failed: usize) -> Result<()> {
    if failed > 0 {
        bail!("{failed} report(s) failed");
    }
    Ok(())
}

fn setup_logging(
    config: &AppConfig,
    debug: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_level = if debug { "pulltally=debug" } else { "pulltally=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    if !debug {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    }

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "pulltally.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}
