use instruction_set::ExecutionPlan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a command's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A partial transcript that went quiet.
    Partial,
    Final,
    /// A partial with "and"/"then" whose final never arrived.
    Connector,
    /// The part of a final not already executed from a partial.
    Remainder,
    Cli,
    /// A yes/no answer resolving a pending command.
    Confirmation,
}

/// Which stage produced the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    CacheExact,
    CacheFuzzy,
    Alias,
    Interpreter,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::CacheExact => "cache-exact",
            Route::CacheFuzzy => "cache-fuzzy",
            Route::Alias => "alias",
            Route::Interpreter => "interpreter",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one command. Every variant carries something to tell
/// the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Executed {
        route: Route,
        plan: ExecutionPlan,
        notes: Vec<String>,
    },
    ExecutedWithNotice {
        route: Route,
        plan: ExecutionPlan,
        notice: String,
        notes: Vec<String>,
    },
    NeedsConfirmation {
        route: Route,
        prompt: String,
        confidence: f64,
    },
    Rejected {
        reason: String,
        confidence: f64,
    },
    NothingToExecute {
        feedback: String,
    },
    Failed {
        route: Option<Route>,
        error: String,
    },
    Halted {
        reason: String,
    },
}

impl CommandOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandOutcome::Executed { .. } => "executed",
            CommandOutcome::ExecutedWithNotice { .. } => "executed_with_notice",
            CommandOutcome::NeedsConfirmation { .. } => "needs_confirmation",
            CommandOutcome::Rejected { .. } => "rejected",
            CommandOutcome::NothingToExecute { .. } => "nothing_to_execute",
            CommandOutcome::Failed { .. } => "failed",
            CommandOutcome::Halted { .. } => "halted",
        }
    }

    pub fn route(&self) -> Option<Route> {
        match self {
            CommandOutcome::Executed { route, .. }
            | CommandOutcome::ExecutedWithNotice { route, .. }
            | CommandOutcome::NeedsConfirmation { route, .. } => Some(*route),
            CommandOutcome::Failed { route, .. } => *route,
            _ => None,
        }
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        match self {
            CommandOutcome::Executed { plan, .. } | CommandOutcome::ExecutedWithNotice { plan, .. } => {
                Some(plan)
            }
            _ => None,
        }
    }

    pub fn is_executed(&self) -> bool {
        self.plan().is_some()
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            CommandOutcome::Executed { plan, .. } | CommandOutcome::ExecutedWithNotice { plan, .. } => {
                Some(plan.confidence)
            }
            CommandOutcome::NeedsConfirmation { confidence, .. }
            | CommandOutcome::Rejected { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Executed { route, plan, notes } => {
                write!(f, "Executed {} step(s) via {route}", plan.len())?;
                for note in notes {
                    write!(f, ". {note}")?;
                }
                Ok(())
            }
            CommandOutcome::ExecutedWithNotice {
                plan, notice, notes, ..
            } => {
                write!(f, "{notice} (executed {} step(s))", plan.len())?;
                for note in notes {
                    write!(f, ". {note}")?;
                }
                Ok(())
            }
            CommandOutcome::NeedsConfirmation { prompt, .. } => f.write_str(prompt),
            CommandOutcome::Rejected { reason, .. } => write!(f, "Rejected: {reason}"),
            CommandOutcome::NothingToExecute { feedback } => f.write_str(feedback),
            CommandOutcome::Failed { error, .. } => write!(f, "Failed: {error}"),
            CommandOutcome::Halted { reason } => write!(f, "Halted: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_serialize_kebab_case() {
        assert_eq!(serde_json::to_string(&Route::CacheFuzzy).unwrap(), "\"cache-fuzzy\"");
        assert_eq!(serde_json::to_string(&Origin::Remainder).unwrap(), "\"remainder\"");
    }

    #[test]
    fn display_mentions_notes() {
        let outcome = CommandOutcome::Executed {
            route: Route::Alias,
            plan: ExecutionPlan {
                steps: Vec::new(),
                source_command: "sandwich".into(),
                composite_name: Some("make_blt".into()),
                confidence: 1.0,
            },
            notes: vec!["Alias for make_blt".into()],
        };
        assert_eq!(outcome.to_string(), "Executed 0 step(s) via alias. Alias for make_blt");
        assert_eq!(outcome.kind(), "executed");
        assert_eq!(outcome.route(), Some(Route::Alias));
    }
}
