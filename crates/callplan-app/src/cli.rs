//! CLI argument definitions for the callplan binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use callplan_core::types::{ActionCategory, ActionResultStatus, QueueStatus, Tool};

/// callplan: approval-gated execution of call action plans.
#[derive(Parser, Debug)]
#[command(name = "callplan", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the SQLite database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a plan from a JSON file.
    Import { file: PathBuf },

    /// Show one stored plan.
    Show { plan_id: String },

    /// List plans, newest first.
    Plans {
        #[arg(long)]
        status: Option<QueueStatus>,
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },

    /// Approve a pending plan.
    ApprovePlan {
        plan_id: String,
        #[arg(long)]
        approver: String,
    },

    /// Reject a pending plan.
    RejectPlan {
        plan_id: String,
        #[arg(long)]
        approver: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Record an approval for one action.
    ApproveAction {
        action_id: String,
        #[arg(long)]
        approver: String,
        #[arg(long = "plan-id")]
        plan_id: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Record a rejection for one action.
    RejectAction {
        action_id: String,
        #[arg(long)]
        approver: String,
        #[arg(long = "plan-id")]
        plan_id: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Execute a stored plan.
    Execute {
        plan_id: String,
        /// "auto" or "manual"; anything else is treated as auto.
        #[arg(long)]
        mode: Option<String>,
    },

    /// Show the most recent executions.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },

    /// Query executed actions.
    History {
        #[arg(long = "plan-id")]
        plan_id: Option<String>,
        #[arg(long)]
        category: Option<ActionCategory>,
        #[arg(long)]
        tool: Option<Tool>,
        #[arg(long)]
        status: Option<ActionResultStatus>,
        /// Only actions executed in the last N days.
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, default_value_t = 100)]
        limit: u64,
    },

    /// Aggregate execution statistics.
    Stats {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },

    /// Delete one execution record.
    Delete { execution_id: Uuid },

    /// Delete every execution record.
    DeleteAll {
        #[arg(long)]
        yes: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CALLPLAN_CONFIG env var > ~/.callplan/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CALLPLAN_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory.
    ///
    /// Priority: --data-dir flag > CALLPLAN_DATA_DIR env var > config value.
    pub fn resolve_data_dir(&self, config_data_dir: &str) -> String {
        if let Some(ref p) = self.data_dir {
            return p.to_string_lossy().to_string();
        }
        if let Ok(p) = std::env::var("CALLPLAN_DATA_DIR") {
            return p;
        }
        config_data_dir.to_string()
    }

    /// Resolve the log level. Priority: --log-level flag > config value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".callplan").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".callplan").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_execute_with_mode() {
        let args = CliArgs::try_parse_from(["callplan", "execute", "P1", "--mode", "manual"]).unwrap();
        match args.command {
            Command::Execute { plan_id, mode } => {
                assert_eq!(plan_id, "P1");
                assert_eq!(mode.as_deref(), Some("manual"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_typed_filters() {
        let args = CliArgs::try_parse_from([
            "callplan", "history", "--tool", "crm_update", "--status", "error", "--category",
            "advisor",
        ])
        .unwrap();
        match args.command {
            Command::History {
                tool,
                status,
                category,
                limit,
                ..
            } => {
                assert_eq!(tool, Some(Tool::CrmUpdate));
                assert_eq!(status, Some(ActionResultStatus::Error));
                assert_eq!(category, Some(ActionCategory::Advisor));
                assert_eq!(limit, 100);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_tool() {
        assert!(CliArgs::try_parse_from(["callplan", "history", "--tool", "fax"]).is_err());
    }

    #[test]
    fn test_parse_plans_status() {
        let args =
            CliArgs::try_parse_from(["callplan", "plans", "--status", "pending_supervisor"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Plans {
                status: Some(QueueStatus::PendingSupervisor),
                limit: 50
            }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "callplan", "stats", "--days", "7", "--data-dir", "/srv/callplan", "-l", "debug",
        ])
        .unwrap();
        assert_eq!(args.resolve_data_dir("~/.callplan/data"), "/srv/callplan");
        assert_eq!(args.resolve_log_level("info"), "debug");
        assert!(matches!(args.command, Command::Stats { days: 7 }));
    }

    #[test]
    fn test_flag_config_path_wins() {
        let args =
            CliArgs::try_parse_from(["callplan", "-c", "/etc/callplan.toml", "recent"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/callplan.toml"));
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_delete_requires_uuid() {
        assert!(CliArgs::try_parse_from(["callplan", "delete", "not-a-uuid"]).is_err());
        let id = Uuid::new_v4().to_string();
        assert!(CliArgs::try_parse_from(["callplan", "delete", id.as_str()]).is_ok());
    }
}
