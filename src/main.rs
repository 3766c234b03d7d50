//! refconf
//!
//! Resolves layered configuration (base document, environment, arguments),
//! prints it as JSON and, with `--watch`, prints a change record per reload.

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use futures::future::try_join;
use refconf::change::diff;
use refconf::cli::diff::DiffArgs;
use refconf::cli::load::LoadArgs;
use refconf::cli::{Cli, Command, ResolveArgs};
use refconf::parsers::ParserRegistry;
use refconf::readers::ReaderRegistry;
use refconf::{ConfigLoader, LoaderEvent, ResolveOpts, Resolver};
use std::fs::OpenOptions;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    match cli.command {
        Some(Command::Resolve(args)) => run_resolve(args).await,
        Some(Command::Diff(args)) => run_diff(args).await,
        Some(Command::Load(args)) => run_load(args).await,
        None => run_load(LoadArgs::default()).await,
    }
}

async fn run_load(args: LoadArgs) -> Result<()> {
    let loader = ConfigLoader::new(args.options()?)?;
    let cancel = CancellationToken::new();
    let mut events = loader.events();
    loader.on_change(|record| match serde_json::to_string(record) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to serialize change record: {}", e),
    });

    let Some(config) = loader.start(cancel.clone()).await? else {
        return Ok(());
    };
    println!("{}", serde_json::to_string_pretty(config.as_ref())?);

    if !args.watch {
        loader.stop();
        return Ok(());
    }

    info!("Watching configuration sources, press Ctrl-C to stop");
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                cancel.cancel();
                break;
            }
            event = events.next() => match event {
                Some(LoaderEvent::Error(err)) => warn!("{}", err),
                Some(LoaderEvent::Stopped) | None => break,
                Some(_) => {}
            },
        }
    }
    Ok(())
}

fn resolver() -> Resolver {
    Resolver::new(
        ReaderRegistry::with_defaults(),
        ParserRegistry::with_defaults(),
        false,
    )
}

async fn run_resolve(args: ResolveArgs) -> Result<()> {
    let resolver = resolver();
    let mut opts = ResolveOpts::new();
    if let Some(content_type) = args.content_type {
        opts = opts.with_content_type(content_type);
    }
    let value = resolver.resolve(&args.uri, opts, None).await;
    resolver.clear();
    println!("{}", serde_json::to_string_pretty(&value?)?);
    Ok(())
}

async fn run_diff(args: DiffArgs) -> Result<()> {
    let resolver = resolver();
    let sources = try_join(
        resolver.resolve(&args.source, ResolveOpts::new(), None),
        resolver.resolve(&args.target, ResolveOpts::new(), None),
    )
    .await;
    resolver.clear();
    let (source, target) = sources?;
    println!("{}", args.render(&diff(&source, &target))?);
    Ok(())
}
