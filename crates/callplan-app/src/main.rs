//! callplan application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open the SQLite database (running migrations)
//! 3. Build the decision oracle and tool dispatcher
//! 4. Run one subcommand and print its result as JSON

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;

use callplan_action::{
    DecisionOracle, DisabledOracle, ExecutionEngine, HttpDecisionOracle, ToolDispatcher,
};
use callplan_core::config::{expand_home, CallplanConfig};
use callplan_core::error::CallplanError;
use callplan_core::types::{ActionPlan, ApprovalStatus, ExecutionMode, Timestamp};
use callplan_storage::{
    ActionExecutionFilters, ApprovalRepository, Database, ExecutionRepository, PlanRepository,
};

use cli::{CliArgs, Command};

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_oracle(config: &CallplanConfig) -> Arc<dyn DecisionOracle> {
    if config.oracle.is_enabled() {
        tracing::info!(endpoint = %config.oracle.endpoint, "Decision oracle enabled");
        Arc::new(HttpDecisionOracle::new(&config.oracle))
    } else {
        tracing::info!("No decision endpoint configured, using fallback heuristic only");
        Arc::new(DisabledOracle)
    }
}

fn build_engine(db: &Arc<Database>, config: &CallplanConfig) -> ExecutionEngine {
    let output_dir = expand_home(&config.dispatch.output_dir);
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register_defaults(&output_dir, &config.dispatch);
    ExecutionEngine::with_database(Arc::clone(db), build_oracle(config), Arc::new(dispatcher))
}

fn import_plan(plans: &PlanRepository, file: &Path) -> Result<ActionPlan, CallplanError> {
    let content = std::fs::read_to_string(file)?;
    let plan = ActionPlan::from_json(&content)?;
    plans.save(&plan)?;
    Ok(plan)
}

async fn run(
    command: Command,
    db: Arc<Database>,
    config: &CallplanConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let plans = PlanRepository::new(Arc::clone(&db));
    let approvals = ApprovalRepository::new(Arc::clone(&db));
    let executions = ExecutionRepository::new(Arc::clone(&db));

    match command {
        Command::Import { file } => {
            let plan = import_plan(&plans, &file)?;
            print_json(&serde_json::json!({
                "plan_id": plan.plan_id,
                "queue_status": plan.queue_status,
                "actions": plan.action_count(),
            }))
        }
        Command::Show { plan_id } => {
            let plan = plans
                .get(&plan_id)?
                .ok_or_else(|| CallplanError::plan_not_found(&plan_id))?;
            let action_approvals = approvals.list_for_plan(&plan_id)?;
            print_json(&serde_json::json!({
                "plan": plan,
                "approvals": action_approvals,
            }))
        }
        Command::Plans { status, limit } => print_json(&plans.list(status, limit)?),
        Command::ApprovePlan { plan_id, approver } => {
            print_json(&plans.approve(&plan_id, &approver)?)
        }
        Command::RejectPlan {
            plan_id,
            approver,
            reason,
        } => print_json(&plans.reject(&plan_id, &approver, reason.as_deref())?),
        Command::ApproveAction {
            action_id,
            approver,
            plan_id,
            notes,
        } => print_json(&approvals.set_status(
            &action_id,
            plan_id.as_deref(),
            ApprovalStatus::Approved,
            &approver,
            notes.as_deref(),
        )?),
        Command::RejectAction {
            action_id,
            approver,
            plan_id,
            notes,
        } => print_json(&approvals.set_status(
            &action_id,
            plan_id.as_deref(),
            ApprovalStatus::Rejected,
            &approver,
            notes.as_deref(),
        )?),
        Command::Execute { plan_id, mode } => {
            let mode = ExecutionMode::from(
                mode.as_deref()
                    .unwrap_or(config.execution.default_mode.as_str()),
            );
            let engine = build_engine(&db, config);
            print_json(&engine.execute_action_plan(&plan_id, mode).await)
        }
        Command::Recent { limit } => print_json(&executions.recent(limit)?),
        Command::History {
            plan_id,
            category,
            tool,
            status,
            days,
            limit,
        } => {
            let filters = ActionExecutionFilters {
                plan_id,
                category,
                tool,
                status,
                since: days.map(Timestamp::days_ago),
                until: None,
                limit: Some(limit),
            };
            print_json(&executions.query_actions(&filters)?)
        }
        Command::Stats { days } => print_json(&executions.stats(days)?),
        Command::Delete { execution_id } => {
            let deleted = executions.delete(execution_id)?;
            print_json(&serde_json::json!({
                "execution_id": execution_id,
                "deleted": deleted,
            }))
        }
        Command::DeleteAll { yes } => {
            if !yes {
                return Err("refusing to delete all executions without --yes".into());
            }
            let removed = executions.delete_all()?;
            print_json(&serde_json::json!({ "deleted": removed }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = CallplanConfig::load_or_default(&config_file);

    // Tracing. Logs go to stderr so stdout stays machine-readable.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = expand_home(&args.resolve_data_dir(&config.general.data_dir));
    let db_path = data_dir.join("callplan.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::debug!(path = %db_path.display(), "SQLite database opened");

    run(args.command, db, &config).await
}
