use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use tracing::debug;

use cairn_sdk::{node_from_str, node_to_json, Cairn, CairnConfig, MirrorStatus, ObjectHash};
use cairn_server::{MirrorServer, ServerConfig};
use cairn_sqlite::LocalStoreConfig;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.store.as_deref())?;
    match cli.command {
        Command::Put(args) => cmd_put(config, args).await,
        Command::Get(args) => cmd_get(config, args).await,
        Command::Stat => cmd_stat(config),
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>, store: Option<&Path>) -> anyhow::Result<CairnConfig> {
    let mut config = match path {
        Some(path) => CairnConfig::load(path)?,
        None => CairnConfig::default(),
    };
    if let Some(store) = store {
        config.store = LocalStoreConfig {
            path: Some(store.to_path_buf()),
            ..config.store
        };
    }
    Ok(config)
}

fn log_progress(unit: &str, delta: usize) {
    debug!(unit, delta, "progress");
}

async fn cmd_put(config: CairnConfig, args: PutArgs) -> anyhow::Result<()> {
    let text = if args.file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("reading {}", args.file.display()))?
    };
    let node = node_from_str(&text)?;

    let cairn = Cairn::open(config)?;
    let outcome = cairn.serialize_node(&node, Some(&log_progress)).await;
    cairn.close();
    let outcome = outcome?;

    println!("{} {}", "✓".green().bold(), outcome.root.to_hex().yellow());
    println!("  Records: {} ({} bytes)", outcome.records, outcome.bytes);
    for mirror in &outcome.mirrors {
        let status = match &mirror.status {
            MirrorStatus::Complete => "complete".green(),
            MirrorStatus::Failed(failures) => format!("{} failed", failures.len()).red(),
            MirrorStatus::TimedOut => "timed out".yellow(),
        };
        println!("  Mirror {}: {}", mirror.transport.bold(), status);
        for failure in mirror.failures() {
            println!("    {} {}", failure.hash.short_hex().dimmed(), failure.reason);
        }
    }
    Ok(())
}

async fn cmd_get(config: CairnConfig, args: GetArgs) -> anyhow::Result<()> {
    let hash: ObjectHash = args
        .hash
        .parse()
        .with_context(|| format!("invalid hash {:?}", args.hash))?;

    let cairn = Cairn::open(config)?;
    let node = cairn.deserialize_node(hash, Some(&log_progress)).await;
    cairn.close();

    let json = node_to_json(&node?);
    let text = if args.pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{text}");
    Ok(())
}

fn cmd_stat(config: CairnConfig) -> anyhow::Result<()> {
    let store = cairn_sqlite::LocalStore::open(config.store)?;
    let stats = store.stats()?;
    println!("Store: {}", store.path().display().to_string().bold());
    println!("  Records: {}", stats.records);
    println!("  Stored bytes: {}", stats.stored_bytes);
    println!("  Pending writes: {}", stats.pending);
    store.shutdown(cairn_sqlite::ShutdownMode::Flush);
    Ok(())
}

async fn cmd_serve(config: CairnConfig, args: ServeArgs) -> anyhow::Result<()> {
    let mut server_config = ServerConfig {
        api_key: args.api_key,
        ..ServerConfig::default()
    };
    if let Some(bind) = args.bind {
        server_config.bind_addr = bind
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    if server_config.api_key.is_none() && !server_config.bind_addr.ip().is_loopback() {
        tracing::warn!(addr = %server_config.bind_addr, "serving without an api key on a non-loopback address");
    }

    let cairn = Cairn::open(config)?;
    println!(
        "cairn mirror on {} (store: {})",
        server_config.bind_addr.to_string().bold(),
        cairn.store().path().display()
    );
    let result = MirrorServer::new(server_config, cairn.transport()).serve().await;
    cairn.close();
    if let Err(e) = result {
        bail!("server stopped: {e}");
    }
    Ok(())
}

fn cmd_config(config: &CairnConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
