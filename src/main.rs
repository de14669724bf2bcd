//! FlowGuard - Policy Enforcement Engine
//!
//! Evaluates declarative policies against data records, applies remediation
//! actions, and keeps an immutable audit trail of every decision.

use anyhow::Result;
use clap::{Parser, Subcommand};
use flowguard::{
    actions::{ActionResolver, WebhookNotifier},
    audit::AuditRecorder,
    classifier::Classifier,
    compliance::{ComplianceScorer, ScoreFilter},
    config::FlowGuardConfig,
    engine::{ActorContext, Engine},
    policy::{self, PolicyStore},
    record::Record,
    server::{self, AppState},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flowguard")]
#[command(version)]
#[command(about = "Policy enforcement engine with an immutable audit trail")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FLOWGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Enforce a policy against one record and print the outcome
    Enforce {
        /// Policy id to enforce
        #[arg(short, long)]
        policy: String,

        /// Path to a JSON record file
        #[arg(short, long)]
        record: PathBuf,

        /// Caller id recorded in the audit trail
        #[arg(long, default_value = "cli")]
        caller: String,
    },

    /// Validate a policy document without loading it
    Validate {
        /// Path to a JSON policy document
        file: PathBuf,
    },

    /// Print a compliance score derived from the audit log
    Score {
        /// Restrict to one compliance framework
        #[arg(short, long)]
        framework: Option<String>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("flowguard={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = if let Some(config_path) = &cli.config {
        FlowGuardConfig::from_file(config_path)?
    } else {
        FlowGuardConfig::default()
    };

    match cli.command {
        Commands::Serve { host, port } => {
            run_serve(config, host, port).await?;
        }
        Commands::Enforce {
            policy,
            record,
            caller,
        } => {
            run_enforce(config, &policy, &record, &caller).await?;
        }
        Commands::Validate { file } => {
            run_validate(&file)?;
        }
        Commands::Score { framework } => {
            run_score(config, framework).await?;
        }
        Commands::Config { default } => {
            let config = if default {
                FlowGuardConfig::default()
            } else {
                config
            };
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Assemble the engine from configuration
async fn build_engine(config: &FlowGuardConfig) -> Result<Engine> {
    let classifier = Classifier::with_custom_rules(&config.classifier.custom_rules)?;

    let mut resolver = ActionResolver::new()
        .with_delegate_timeout(Duration::from_millis(config.delegation.timeout_ms));
    if let Some(url) = &config.delegation.webhook_url {
        resolver = resolver.with_notifier(Arc::new(WebhookNotifier::new(url.clone())));
    }

    let store = Arc::new(PolicyStore::load_dir(&config.policies.dir));
    let recorder = Arc::new(AuditRecorder::file(&config.audit.log_path).await?);

    Ok(Engine::new(store, recorder)
        .with_classifier(classifier)
        .with_resolver(resolver))
}

async fn run_serve(
    config: FlowGuardConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    tracing::info!("Starting FlowGuard");

    let engine = build_engine(&config).await?;
    let policies = engine.store().snapshot().await.len();
    tracing::info!(policies, "policies loaded from {}", config.policies.dir.display());

    let state = AppState {
        engine: Arc::new(engine),
        policies_dir: config.policies.dir.clone(),
    };

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    server::serve(state, addr).await?;

    tracing::info!("Shutting down");
    Ok(())
}

async fn run_enforce(
    config: FlowGuardConfig,
    policy_id: &str,
    record_path: &PathBuf,
    caller: &str,
) -> Result<()> {
    let engine = build_engine(&config).await?;

    let content = std::fs::read_to_string(record_path)?;
    let record = Record::from_value(serde_json::from_str(&content)?)?;

    let outcome = engine
        .enforce(policy_id, &record, ActorContext::new(caller))
        .await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.blocks_caller() {
        std::process::exit(2);
    }
    Ok(())
}

fn run_validate(file: &PathBuf) -> Result<()> {
    match policy::load_policy_file(file) {
        Ok(policy) => {
            println!(
                "ok: policy '{}' with {} rule(s)",
                policy.id,
                policy.rules.len()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("invalid: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_score(config: FlowGuardConfig, framework: Option<String>) -> Result<()> {
    let recorder = Arc::new(AuditRecorder::file(&config.audit.log_path).await?);
    let scorer = ComplianceScorer::new(recorder);
    let score = scorer
        .score(&ScoreFilter {
            framework,
            ..Default::default()
        })
        .await;
    println!("{}", serde_json::to_string_pretty(&score)?);
    Ok(())
}
