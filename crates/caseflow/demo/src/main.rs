#![deny(unsafe_code)]
//! Caseflow demo binary.
//!
//! Runs an "Identity Activation" case against the simulated platform:
//! launch, fill in the request form, drive every approval level (or
//! reject the first one), wait for completion and print the session
//! statistics. No external services required.

use anyhow::Context;
use caseflow_config::CaseflowConfig;
use caseflow_engine::{ApprovalPolicy, CaseflowEngine};
use caseflow_session::{AcquisitionStrategy, SessionManager};
use caseflow_sim::{SimulatedAcquisition, SimulatedPlatform, WorkflowScript};
use caseflow_types::{Owner, Variables, WorkItemKind};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WORKFLOW: &str = "Identity Activation";
const APPLICATION: &str = "Active Directory";

/// Caseflow demo CLI
#[derive(Parser)]
#[command(name = "caseflow-demo")]
#[command(about = "Run a simulated identity activation through caseflow", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CASEFLOW_CONFIG_FILE")]
    config: Option<String>,

    /// Number of approval levels in the simulated workflow
    #[arg(short, long, default_value_t = 3)]
    levels: usize,

    /// Reject the first approval level instead of approving all
    #[arg(long)]
    reject: bool,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

// ── Simulated Platform ──────────────────────────────────────────────────

fn activation_platform(admin: &str, levels: usize) -> SimulatedPlatform {
    let script = WorkflowScript::new(WORKFLOW)
        .form(
            Owner::Identity(admin.to_string()),
            ["identityName", "reason", "startDate"],
        )
        .approval_levels(levels, APPLICATION);

    let mut platform = SimulatedPlatform::new()
        .with_identity(admin)
        .with_application(APPLICATION)
        .with_script(script);
    for level in 1..=levels {
        platform = platform.with_identity(&format!("approver-{level}"));
    }
    platform
}

fn request_form() -> Variables {
    let mut values = Variables::new();
    values.insert("identityName".into(), json!("jdoe"));
    values.insert("reason".into(), json!("Returning from leave"));
    values.insert("startDate".into(), json!("2026-11-02"));
    values
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config =
        CaseflowConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging.level, cli.json || config.logging.json);
    config.log_summary();

    let platform = Arc::new(activation_platform(&config.connection.username, cli.levels));
    let session = Arc::new(SessionManager::new(config));
    let strategies: Vec<Box<dyn AcquisitionStrategy>> =
        vec![Box::new(SimulatedAcquisition::new(platform))];
    session
        .initialize(&strategies)
        .await
        .context("failed to initialize session")?;

    let engine = CaseflowEngine::new(Arc::clone(&session));
    let launched = engine
        .controller()
        .launch_as_admin(WORKFLOW, Variables::new())
        .await?;
    let case = launched.reference();

    let form = engine
        .work_items()
        .wait_for(&case, WorkItemKind::Form, Duration::from_secs(30))
        .await?;
    engine
        .work_items()
        .complete_form(&form.id, request_form())
        .await?;

    let policy = ApprovalPolicy::from_defaults(&session.config().approvals);
    let run = if cli.reject {
        engine.approvals().handle_all_rejections(&case, &policy).await?
    } else {
        engine.approvals().handle_all_approvals(&case, &policy).await?
    };
    tracing::info!(
        case = %launched.name,
        processed = run.processed,
        stop = ?run.stop,
        "Approval run finished"
    );

    let finished = engine
        .controller()
        .wait_for_completion_default(&case)
        .await?;
    match finished.completion_status() {
        Some(status) if status.is_successful() => {
            tracing::info!(case = %finished.name, status = %status, "Case finished")
        }
        Some(status) => tracing::error!(case = %finished.name, status = %status, "Case failed"),
        None => tracing::warn!(case = %finished.name, "Case still running"),
    }

    let report = json!({
        "case": launched,
        "status": finished.completion_status(),
        "messages": finished.messages,
        "approvals": run,
        "session": session.statistics(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    session.shutdown().await?;
    Ok(())
}
