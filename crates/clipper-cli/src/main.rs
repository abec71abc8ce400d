use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

use clipper_client::{
    DefaultClipService, FsVaultWriter, HtmdCleaner, HtmlSignalExtractor, ReqwestFetcher,
    StrategyChainExtractor, default_fallbacks,
};
use clipper_core::pipeline::{ClipRequest, ClipService, ClipSource};
use clipper_core::render::TemplateStore;
use clipper_core::resilience::Guard;
use clipper_core::template::{find_candidate, load_candidates};
use clipper_core::traits::{ClipStore, EventLog};
use clipper_core::{NullStore, PipelineConfig, TracingEventLog};
use clipper_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "clipper", version, about = "Clip web pages into a Markdown vault")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clip a web page: extract, classify, and render it
    Scrape {
        /// Page to clip
        #[arg(short, long)]
        url: String,

        /// Template id (see `clipper templates`); chosen automatically when omitted
        #[arg(short, long)]
        template: Option<String>,

        /// Extra tag, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Store the clip and pipeline events in the database (requires DATABASE_URL)
        #[arg(long, default_value_t = false)]
        save: bool,

        /// Write the rendered document under this vault directory
        #[arg(long, env = "CLIPPER_VAULT_PATH")]
        vault: Option<PathBuf>,

        /// Print the full result as JSON instead of the rendered Markdown
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Classify a saved HTML page without rendering it
    Classify {
        /// HTML file to classify
        #[arg(short, long)]
        file: PathBuf,

        /// URL the page came from, for resolving relative links
        #[arg(short, long)]
        url: Option<String>,
    },

    /// List the template catalog
    Templates,

    /// Show stored clips for a URL
    History {
        /// Source URL
        #[arg(short, long)]
        url: String,

        /// Number of results to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("clipper=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, abandoning pending retries");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Scrape {
            url,
            template,
            tags,
            save,
            vault,
            json,
        } => {
            let mut config = PipelineConfig::from_env()?;
            if vault.is_some() {
                config.vault_path = vault;
            }
            let request = scrape_request(&url, template, tags, config.vault_path.is_some())?;
            cmd_scrape(request, &config, save, json, &cancel).await?;
        }
        Commands::Classify { file, url } => {
            let config = PipelineConfig::from_env()?;
            cmd_classify(&file, url.as_deref(), &config, &cancel).await?;
        }
        Commands::Templates => cmd_templates(),
        Commands::History { url, limit } => {
            let db = connect_db().await?;
            cmd_history(&url, limit, &db).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()
        .context("DATABASE_URL not set. Required for --save or history command.")?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    Ok(db)
}

fn scrape_request(
    url: &str,
    template: Option<String>,
    tags: Vec<String>,
    persist: bool,
) -> Result<ClipRequest> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {url}"))?;
    anyhow::ensure!(
        matches!(parsed.scheme(), "http" | "https"),
        "Only http and https URLs can be clipped: {url}"
    );
    if let Some(id) = template.as_deref() {
        anyhow::ensure!(
            find_candidate(id).is_some(),
            "Unknown template '{id}'. Run `clipper templates` for the list."
        );
    }

    Ok(ClipRequest::new(ClipSource::Url(parsed.to_string()))
        .with_template(template)
        .with_tags(tags)
        .persisted(persist))
}

/// The fetcher allows private addresses: the user controls this machine.
fn build_service<S, L>(config: &PipelineConfig, log: L) -> Result<DefaultClipService<S, L>>
where
    S: ClipStore,
    L: EventLog,
{
    let fetcher = ReqwestFetcher::new()
        .context("Failed to create HTTP client")?
        .allow_private_urls();
    let templates = TemplateStore::load(&config.templates_dir).with_context(|| {
        format!(
            "Failed to load templates from {}",
            config.templates_dir.display()
        )
    })?;
    let guard = Guard::new(log)
        .with_policy(config.recovery.clone())
        .with_fallbacks(default_fallbacks(fetcher.clone(), config.temp_dir.clone()));

    let service = ClipService::new(
        fetcher,
        HtmlSignalExtractor::new(),
        StrategyChainExtractor::new(),
        HtmdCleaner::new(),
        guard,
    )
    .with_templates(templates);

    Ok(match &config.vault_path {
        Some(root) => service.with_writer(FsVaultWriter::new(root)),
        None => service,
    })
}

async fn cmd_scrape(
    request: ClipRequest,
    config: &PipelineConfig,
    save: bool,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = if save {
        let db = connect_db().await?;
        build_service(config, db.event_log())?
            .with_store(db.clip_repo())
            .clip(request, cancel)
            .await?
    } else {
        build_service::<NullStore, _>(config, TracingEventLog)?
            .clip(request, cancel)
            .await?
    };

    tracing::info!(
        genre = %result.genre,
        template = %result.template_id,
        strategy = %result.strategy,
        "Clipped \"{}\"",
        result.title
    );
    if let Some(path) = &result.saved_path {
        tracing::info!(%path, "Written to vault");
    }
    if let Some(id) = result.clip_id {
        tracing::info!(%id, "Stored in database");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.document.markdown);
    }

    Ok(())
}

async fn cmd_classify(
    file: &Path,
    url: Option<&str>,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read HTML file: {}", file.display()))?;

    let analysis = build_service::<NullStore, _>(config, TracingEventLog)?
        .analyze(&html, url, cancel)
        .await?;

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn cmd_templates() {
    for template in load_candidates() {
        println!("{:<16} {}", template.id, template.name);
        println!("{:<16} {}", "", template.description);
        if !template.default_tags.is_empty() {
            println!("{:<16} tags: {}", "", template.default_tags.join(", "));
        }
        println!();
    }
}

async fn cmd_history(url: &str, limit: usize, db: &Database) -> Result<()> {
    let history = db.clip_repo().get_history(url, limit).await?;

    if history.is_empty() {
        println!("No clips found for url={url}");
        return Ok(());
    }

    println!("Clip history for {url}:\n");

    for (i, clip) in history.iter().enumerate() {
        let changed = history
            .get(i + 1)
            .is_none_or(|older| older.content_hash != clip.content_hash);
        let status = if changed { "CHANGED" } else { "unchanged" };

        println!(
            "  [{}] {} {} ({}, template: {}, hash: {}...)",
            status,
            clip.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            clip.id,
            clip.genre,
            clip.template_id,
            &clip.content_hash[..8.min(clip.content_hash.len())],
        );
        if let Some(path) = &clip.markdown_path {
            println!("      {path}");
        }
    }

    println!("\nTotal: {} clips", history.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_arguments() {
        let cli = Cli::try_parse_from([
            "clipper",
            "scrape",
            "--url",
            "https://example.com/post",
            "--tag",
            "rust",
            "--tag",
            "async",
            "--template",
            "tutorial",
            "--save",
        ])
        .unwrap();

        match cli.command {
            Commands::Scrape {
                url,
                template,
                tags,
                save,
                json,
                ..
            } => {
                assert_eq!(url, "https://example.com/post");
                assert_eq!(template.as_deref(), Some("tutorial"));
                assert_eq!(tags, vec!["rust", "async"]);
                assert!(save);
                assert!(!json);
            }
            _ => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_scrape_request_validation() {
        let request = scrape_request("https://example.com/a", None, vec![], true).unwrap();
        assert_eq!(request.source.url(), Some("https://example.com/a"));
        assert!(request.persist);

        assert!(scrape_request("file:///etc/hosts", None, vec![], false).is_err());
        assert!(scrape_request("https://example.com", Some("recipe".into()), vec![], false).is_err());
    }

    #[test]
    fn test_history_defaults() {
        let cli = Cli::try_parse_from(["clipper", "history", "--url", "https://example.com"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 10, .. }));
    }
}
