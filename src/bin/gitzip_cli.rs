use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::Stream;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::path::PathBuf;
use tracing_subscriber::{self, EnvFilter};

use gitzip::archive::{self, ArchiveRequest, TransferReporter};
use gitzip::config::{ClientConfig, GithubEndpoints};
use gitzip::github::{GithubClient, RepositoryItem, parse_repository_url};
use gitzip::search::{LoadOutcome, SearchOutcome, SearchPageSource, SearchSession, SortKey, SortOrder};
use gitzip::transport::proxy_client::ProxyClient;

#[derive(Parser)]
#[command(author, version, about = "gitzip CLI for GitHub repository search and downloads", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// GitHub API token for authentication (overrides GITHUB_TOKEN environment variable)
    #[arg(short = 't', long, global = true)]
    github_token: Option<String>,

    /// Base URL of a running gitzip server; GitHub is called directly when omitted
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Timeout in seconds for API calls, and the longest a download may stall
    #[arg(long, global = true, default_value = "60")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for GitHub repositories, most starred first
    RepositorySearch {
        #[arg(
            help = "Search query - keywords to search for repositories. Can include advanced search qualifiers like 'language:rust' or 'stars:>1000'"
        )]
        query: String,

        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,

        /// Results per page (default is 30, max 100)
        #[arg(long, default_value = "30")]
        per_page: u8,

        /// How to order the printed results
        #[arg(long, value_enum, default_value = "stars")]
        sort_by: SortKeyArg,

        #[arg(long, value_enum, default_value = "desc")]
        order: SortOrderArg,
    },
    /// Download a repository branch as a ZIP archive
    Download {
        #[arg(
            help = "Repository URL - supports 'https://github.com/user/repo', 'git@github.com:user/repo.git', 'github:user/repo' or 'user/repo'"
        )]
        repository_url: String,

        /// Branch to download (default is the repository's default branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// File name stem of the archive (default is the repository name)
        #[arg(short, long)]
        name: Option<String>,

        /// Directory to write the archive to (default is the user's download directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// List the branches of a repository
    ListBranches {
        repository_url: String,
    },
    /// Show today's trending repositories
    Trending,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SortKeyArg {
    Name,
    Stars,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SortOrderArg {
    Asc,
    Desc,
}

impl From<SortKeyArg> for SortKey {
    fn from(value: SortKeyArg) -> Self {
        match value {
            SortKeyArg::Name => SortKey::Name,
            SortKeyArg::Stars => SortKey::Stars,
        }
    }
}

impl From<SortOrderArg> for SortOrder {
    fn from(value: SortOrderArg) -> Self {
        match value {
            SortOrderArg::Asc => SortOrder::Asc,
            SortOrderArg::Desc => SortOrder::Desc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr) // Use stderr for logging
        .with_target(false)
        .with_ansi(false)
        .init();

    if cli.github_token.is_some() {
        tracing::info!("Using GitHub token from command line arguments");
    }
    let timeout = std::time::Duration::from_secs(cli.timeout_secs);
    let config = ClientConfig::from_env(cli.github_token).with_timeout(timeout);
    tracing::debug!("{}", config.auth_status());

    let proxy = cli
        .server
        .as_deref()
        .map(|server| ProxyClient::with_timeout(server, timeout))
        .transpose()?;
    let client = GithubClient::new(config)?;

    match cli.command {
        Commands::RepositorySearch {
            query,
            pages,
            per_page,
            sort_by,
            order,
        } => match proxy {
            Some(proxy) => {
                let session = SearchSession::with_per_page(proxy, per_page);
                run_search(session, &query, pages, sort_by.into(), order.into()).await
            }
            None => {
                let session = SearchSession::with_per_page(client, per_page);
                run_search(session, &query, pages, sort_by.into(), order.into()).await
            }
        },
        Commands::Download {
            repository_url,
            branch,
            name,
            output_dir,
        } => {
            let result = download(
                &client,
                proxy.as_ref(),
                &repository_url,
                branch.clone(),
                name,
                output_dir,
            )
            .await;

            if let Err(err) = &result {
                eprintln!("Download failed: {:#}", err);
                if let Some(url) = direct_archive_url(&repository_url, branch.as_deref()) {
                    eprintln!("You can try downloading it directly from: {}", url);
                }
            }
            result
        }
        Commands::ListBranches { repository_url } => {
            let branches = match &proxy {
                Some(proxy) => proxy.list_branches(&repository_url).await?,
                None => gitzip::services::list_repository_branches(&client, &repository_url).await?,
            };
            for branch in branches {
                println!("{}", branch);
            }
            Ok(())
        }
        Commands::Trending => {
            let trending = match &proxy {
                Some(proxy) => proxy.trending().await?,
                None => gitzip::services::trending_repositories(&client).await?,
            };
            print_trending(&trending)
        }
    }
}

async fn run_search<S: SearchPageSource>(
    mut session: SearchSession<S>,
    query: &str,
    pages: u32,
    sort_by: SortKey,
    order: SortOrder,
) -> Result<()> {
    match session.search(query).await.context("Search failed")? {
        SearchOutcome::Ignored => {
            eprintln!("Empty query, nothing to search.");
            return Ok(());
        }
        SearchOutcome::Completed {
            corrected_query: Some(corrected),
            ..
        } => eprintln!("No results for '{}', showing results for '{}'", query.trim(), corrected),
        SearchOutcome::Completed { .. } => {}
    }

    for _ in 1..pages {
        match session.fetch_next_page().await {
            Ok(LoadOutcome::Loaded { page, added }) => {
                tracing::debug!("Page {} added {} repositories", page, added)
            }
            Ok(LoadOutcome::Skipped) => break,
            Err(err) => {
                eprintln!("Failed to load more results: {}", err);
                break;
            }
        }
    }

    let items = session.sorted_items(sort_by, order);
    if items.is_empty() {
        eprintln!("No repositories found.");
        return Ok(());
    }

    for (i, repo) in items.iter().enumerate() {
        print_repository(i + 1, repo);
    }

    let total = session
        .total_count()
        .map(|count| count.to_string())
        .unwrap_or_else(|| "?".to_string());
    eprintln!(
        "Showing {} of {} repositories{}",
        items.len(),
        total,
        if session.has_more() { " (more available)" } else { "" }
    );
    Ok(())
}

fn print_repository(index: usize, repo: &RepositoryItem) {
    let name = if repo.full_name.is_empty() { &repo.name } else { &repo.full_name };
    println!("{}. {} - {} stars", index, name, repo.stargazers_count);
    println!(
        "   Description: {}",
        repo.description.as_deref().unwrap_or("<no description>")
    );
    if let Some(language) = &repo.language {
        println!("   Language: {}", language);
    }
    println!("   URL: {}", repo.html_url.as_deref().unwrap_or("<no url>"));
    println!();
}

async fn download(
    client: &GithubClient,
    proxy: Option<&ProxyClient>,
    repository_url: &str,
    branch: Option<String>,
    name: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let reference = parse_repository_url(repository_url)?;
    let display_name = name.unwrap_or_else(|| reference.name.clone());

    let output_dir = output_dir
        .or_else(dirs::download_dir)
        .map_or_else(std::env::current_dir, Ok)
        .context("Failed to determine the output directory")?;

    let bytes = match proxy {
        Some(proxy) => {
            let transfer = proxy
                .open_download(repository_url, &display_name, branch.as_deref())
                .await?;
            receive(transfer, &display_name).await?
        }
        None => {
            let request = ArchiveRequest::new(reference, display_name.clone(), branch);
            let response = archive::open_archive(client, &request).await?;
            eprintln!("Branch {} ({} host)", response.branch, response.source);
            receive(response.into_transfer(), &display_name).await?
        }
    };

    let path = archive::save_archive(&output_dir, &format!("{}.zip", display_name), &bytes)
        .await
        .with_context(|| format!("Failed to save the archive into {}", output_dir.display()))?;

    println!("{}", path.display());
    Ok(())
}

/// Streams an archive body while rendering a progress bar, or a spinner
/// when the size is unknown
async fn receive<S, E>(transfer: TransferReporter<S>, display_name: &str) -> Result<Bytes>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
{
    let pb = if transfer.is_determinate() {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
                .progress_chars("#>-"),
        );
        pb
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    };
    pb.set_message(format!("{}.zip", display_name));

    let result = transfer
        .run(|progress| {
            if let Some(percent) = progress.percent {
                pb.set_position(percent as u64);
            }
        })
        .await;

    match result {
        Ok(bytes) => {
            pb.finish_with_message(format!("{}.zip ({} bytes)", display_name, bytes.len()));
            Ok(bytes)
        }
        Err(err) => {
            pb.abandon_with_message("download failed");
            Err(err.into())
        }
    }
}

/// The browser-facing archive link, printed when the streamed download fails
fn direct_archive_url(repository_url: &str, branch: Option<&str>) -> Option<String> {
    let reference = parse_repository_url(repository_url).ok()?;
    let branch = branch.unwrap_or(archive::DEFAULT_BRANCH);
    archive::primary_archive_url(&GithubEndpoints::default(), &reference, branch)
        .ok()
        .map(|url| url.to_string())
}

fn print_trending(trending: &serde_json::Value) -> Result<()> {
    let Some(repositories) = trending.as_array() else {
        println!("{}", serde_json::to_string_pretty(trending)?);
        return Ok(());
    };

    for (i, repo) in repositories.iter().enumerate() {
        let author = repo.get("author").and_then(|a| a.as_str()).unwrap_or("<unknown>");
        let name = repo.get("name").and_then(|n| n.as_str()).unwrap_or("<unnamed>");
        let stars = repo.get("stars").and_then(|s| s.as_u64()).unwrap_or(0);
        let url = repo.get("url").and_then(|u| u.as_str()).unwrap_or("<no url>");

        println!("{}. {}/{} - {} stars", i + 1, author, name, stars);
        println!("   URL: {}", url);
    }
    Ok(())
}
