use std::{path::PathBuf, process::exit};

use clap::{Parser, Subcommand};
use color_eyre::{
    Section,
    config::HookBuilder,
    eyre::{self, bail},
};
use quill::{
    Blog,
    config::{CONFIG_FILE, Config},
    quill_core::ArticlePreview,
    serve,
    store::ArticleStore,
};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(about = "Publish your writing", long_about = None)]
#[command(version, author)]
struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit machine-readable JSON output and logs
    #[arg(long, global = true)]
    json: bool,

    /// Config file to read
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file with every default spelled out.
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Serve the REST API.
    Serve {
        /// Host address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on. Without it the next free port is used when the
        /// configured one is taken.
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep articles in memory, nothing is written to disk
        #[arg(long)]
        ephemeral: bool,
    },

    /// List stored articles, newest first.
    Articles {
        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    HookBuilder::default()
        .display_env_section(true)
        .panic_section("It looks like Quill encountered a bug")
        .install()
        .expect("Failed to install color-eyre hook");

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter_layer = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let json_layer = cli
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!cli.json).then(|| {
        fmt::layer()
            .without_time()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(json_layer)
        .with(text_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();

    if let Err(err) = entry(cli).await {
        error!("{:#}", err);
        exit(1);
    }
}

async fn entry(cli: Cli) -> eyre::Result<()> {
    match cli.command {
        Commands::Init { force } => {
            if !force && tokio::fs::try_exists(&cli.config).await? {
                bail!(
                    "{} already exists, pass --force to overwrite it",
                    cli.config.display()
                );
            }
            Config::default()
                .save(&cli.config)
                .await
                .note("Failed to write config file")?;
            info!("Wrote {}", cli.config.display());
            Ok(())
        }
        Commands::Serve {
            host,
            port,
            ephemeral,
        } => {
            let mut config = Config::load(&cli.config)
                .await
                .note("Can't load config file")?;
            if let Some(host) = host {
                config.server.host = host;
            }
            let allow_fallback = port.is_none();
            if let Some(port) = port {
                config.server.port = port;
            }

            let store = if ephemeral {
                info!("Running with an in-memory database");
                ArticleStore::in_memory()?
            } else {
                open_store(&config).await?
            };

            let blog = Blog::new(store, config.listing.clone());
            serve::serve(blog, &config.server, allow_fallback).await?;
            Ok(())
        }
        Commands::Articles { drafts } => {
            let config = Config::load(&cli.config)
                .await
                .note("Can't load config file")?;
            let articles: Vec<ArticlePreview> = open_store(&config)
                .await?
                .all_previews()
                .await?
                .into_iter()
                .filter(|article| drafts || article.metadata().published())
                .collect();
            print_articles(&articles, cli.json)
        }
    }
}

async fn open_store(config: &Config) -> eyre::Result<ArticleStore> {
    let path = &config.storage.path;
    let store = ArticleStore::open(path)
        .await
        .with_note(|| format!("Can't open database at {}", path.display()))?;
    Ok(store)
}

fn print_articles(articles: &[ArticlePreview], emit_json: bool) -> eyre::Result<()> {
    if emit_json {
        let rows = articles
            .iter()
            .map(|article| -> eyre::Result<serde_json::Value> {
                let metadata = article.metadata();
                let created = metadata.created().format(&Rfc3339)?;
                Ok(json!({
                    "id": article.id().to_string(),
                    "slug": article.slug().as_str(),
                    "title": article.title(),
                    "author": metadata.author(),
                    "published": metadata.published(),
                    "createdAt": created,
                }))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if articles.is_empty() {
        println!("No articles yet");
        return Ok(());
    }

    println!("Found {} article(s):", articles.len());
    for article in articles {
        let metadata = article.metadata();
        let draft = if metadata.published() { "" } else { " (draft)" };
        println!("• {} -> /{}{draft}", article.title(), article.slug());
        println!(
            "  by {}, {} min read",
            metadata.author(),
            metadata.read_time()
        );
    }
    Ok(())
}
