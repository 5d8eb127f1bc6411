use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jmxeval::{
    Connection, ConnectionSettings, ConnectionTarget, EvaluationContext, Plan, Query, Settings,
    StateStore,
};
use jmxeval_adapters::StaticConnection;

#[derive(Parser, Debug)]
#[command(name = "jmxeval")]
#[command(about = "Evaluate a managed-object attribute and print it as name=value")]
#[command(version)]
struct Args {
    /// Path to the config file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Override the rate state file from the config
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log more to stderr (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(state_file) = args.state_file {
        settings.state_file = state_file;
    }

    let mut ctx = EvaluationContext::new(StateStore::new(&settings.state_file));
    match settings.connection.as_ref().map(connect).transpose() {
        Ok(Some(connection)) => ctx = ctx.with_connection(connection),
        Ok(None) => {}
        // The query sees no session and falls back or fails on its own terms.
        Err(e) => warn!("{:#}", e),
    }

    let var = settings.query.var.clone();
    let plan = Plan::new().step(Query::new(settings.query));
    plan.run(&mut ctx)?;

    if let Some(value) = ctx.var(&var) {
        println!("{}={}", var, value);
    }

    Ok(())
}

/// Log to stderr so stdout carries only the published value.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Open the session described by the `[connection]` section.
fn connect(settings: &ConnectionSettings) -> Result<Box<dyn Connection>> {
    match settings.target()? {
        ConnectionTarget::Snapshot(path) => {
            let conn = StaticConnection::from_file(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            Ok(Box::new(conn))
        }
        #[cfg(feature = "jolokia")]
        ConnectionTarget::Jolokia(url) => {
            use std::time::Duration;

            use jmxeval_adapters::jolokia::JolokiaConnection;

            let mut builder = JolokiaConnection::builder().endpoint(url);
            if let Some(username) = &settings.username {
                let password = settings.password.as_deref().unwrap_or_default();
                builder = builder.credentials(username, password);
            }
            if let Some(secs) = settings.timeout_secs {
                builder = builder.timeout(Duration::from_secs(secs));
            }
            let conn = builder
                .build()
                .with_context(|| format!("Failed to set up connection to {}", url))?;
            Ok(Box::new(conn))
        }
        #[cfg(not(feature = "jolokia"))]
        ConnectionTarget::Jolokia(url) => {
            anyhow::bail!("Cannot connect to {}: built without the jolokia feature", url)
        }
    }
}
