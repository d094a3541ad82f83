use anyhow::Context;
use clap::{Parser, Subcommand};
use cw_core::config::DEFAULT_CONFIG_PATH;
use cw_core::detector::{DEFAULT_PROVIDERS, probe_provider, select_provider};
use cw_core::{
    BackendSet, ChainManifest, ChainResolver, Config, DesiredChain, Locator, PathLocator, Plan,
    Policy, Protocol, SystemExecutor,
};
use cw_xtables::{ChainEnumerator, Inventory, Reconciler};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chainwarden")]
#[command(version, about = "Packet-filter chain reconciliation for iptables, ip6tables and ebtables", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List chains currently configured in every backend
    List {
        /// Only show chains of this protocol (IPv4, IPv6, ethernet)
        #[arg(long)]
        protocol: Option<Protocol>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show how a chain name resolves
    Resolve {
        /// Chain resource name, table:name:protocol
        name: String,
    },
    /// Make sure a single chain is present or absent
    Ensure {
        /// Chain resource name, table:name:protocol
        name: String,
        /// Remove the chain instead of creating it
        #[arg(long)]
        absent: bool,
        /// Default policy (ACCEPT, DROP, RETURN or -)
        #[arg(long)]
        policy: Option<Policy>,
        /// Show planned changes without applying
        #[arg(long)]
        dry_run: bool,
    },
    /// Reconcile every chain listed in a manifest
    Apply {
        #[arg(short, long, default_value = "chains.yaml")]
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Show which backend tools are installed
    Backends,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    init_logging(cli.verbose, config.log_level.as_deref());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    match cli.command {
        Commands::List { protocol, json } => runtime.block_on(list_chains(&config, protocol, json))?,
        Commands::Resolve { name } => resolve_chain(&name)?,
        Commands::Ensure {
            name,
            absent,
            policy,
            dry_run,
        } => {
            let mut desired = if absent {
                DesiredChain::absent(name)
            } else {
                DesiredChain::present(name)
            };
            desired.policy = policy;
            runtime.block_on(reconcile(&config, &[desired], dry_run))?;
        }
        Commands::Apply { file, dry_run } => {
            let manifest = ChainManifest::from_file(&file)?;
            runtime.block_on(reconcile(&config, &manifest.chains, dry_run))?;
        }
        Commands::Backends => show_backends(&config),
    }

    Ok(())
}

fn init_logging(verbose: u8, configured: Option<&str>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => configured.unwrap_or("info"),
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn backends(config: &Config) -> BackendSet {
    BackendSet::from_config(config).discover(&PathLocator::new())
}

async fn current_state(executor: &SystemExecutor, backends: &BackendSet) -> Inventory {
    if backends.is_empty() {
        tracing::warn!("No backend tools found; run `chainwarden backends` for details");
    }
    ChainEnumerator::new(executor, backends).enumerate().await
}

async fn list_chains(config: &Config, protocol: Option<Protocol>, json: bool) -> anyhow::Result<()> {
    let executor = SystemExecutor::new(config.command_timeout());
    let backends = backends(config);
    let inventory = current_state(&executor, &backends).await;

    let records: Vec<_> = inventory
        .iter()
        .filter(|r| protocol.is_none_or(|p| r.id.protocol() == p))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("⛓️  Chains ({}):", records.len());
    for record in records {
        let marker = if record.id.is_builtin() { " (built-in)" } else { "" };
        println!(
            "  • {:<9} {:<8} {:<24} {}{}",
            record.id.protocol(),
            record.id.table(),
            record.id.name(),
            record.policy,
            marker
        );
    }

    Ok(())
}

fn resolve_chain(name: &str) -> anyhow::Result<()> {
    let resolver = ChainResolver::new();
    let id = resolver.resolve(name)?;

    println!("{}", id);
    println!("  table:    {}", id.table());
    println!("  chain:    {}", id.name());
    println!("  protocol: {}", id.protocol());
    println!("  built-in: {}", if id.is_builtin() { "yes" } else { "no" });
    println!("  aliases:  {}", resolver.aliases(&id).join(", "));

    Ok(())
}

async fn reconcile(config: &Config, desired: &[DesiredChain], dry_run: bool) -> anyhow::Result<()> {
    let executor = SystemExecutor::new(config.command_timeout());
    let backends = backends(config);
    let mut inventory = current_state(&executor, &backends).await;
    let reconciler = Reconciler::new(&executor, &backends).dry_run(dry_run);

    match reconciler.ensure_all(desired, &mut inventory).await {
        Ok(applied) => {
            print!("{}", render_plan(&applied, dry_run));
            Ok(())
        }
        Err(e) => {
            if e.is_policy_violation() {
                eprintln!("💡 Fix the chain declaration; retrying will not help");
            }
            Err(e.into())
        }
    }
}

fn render_plan(plan: &Plan, dry_run: bool) -> String {
    if plan.is_empty() {
        return "✅ Chains already match, nothing to do\n".to_string();
    }

    let heading = if dry_run { "Planned changes" } else { "Applied changes" };
    let mut out = format!("📋 {} ({}):\n\n", heading, plan.actions.len());
    for (i, action) in plan.actions.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, action));
    }
    out
}

fn show_backends(config: &Config) {
    let locator = PathLocator::new();

    println!("🔎 Backend tools:\n");
    for adapter in BackendSet::from_config(config).iter() {
        for command in [adapter.command(), adapter.save_command()] {
            let status = match locator.locate(command) {
                Some(path) => format!("✅ {}", path.display()),
                None => "❌ not found".to_string(),
            };
            println!("  {:<9} {:<16} {}", adapter.protocol(), command, status);
        }
    }

    println!();
    match select_provider(DEFAULT_PROVIDERS, &locator) {
        Some(provider) => println!("Selected provider: {} ({})", provider.name, provider.description),
        None => {
            println!("No usable provider found");
            for provider in DEFAULT_PROVIDERS {
                let probe = probe_provider(provider, &locator);
                println!("  {} is missing: {}", provider.name, probe.missing.join(", "));
            }
        }
    }
}
