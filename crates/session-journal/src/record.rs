//! Journal entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which machine produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineId {
    Auth,
    LoginUi,
    Navigation,
    /// Records that are not machine transitions (canary confirmations).
    System,
}

impl MachineId {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineId::Auth => "auth",
            MachineId::LoginUi => "login_ui",
            MachineId::Navigation => "navigation",
            MachineId::System => "system",
        }
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event name used for eventless (guard fan-out) transitions.
pub const AUTOMATIC_EVENT: &str = "AUTOMATIC";

/// Event name for navigation context merges.
pub const CONTEXT_UPDATED_EVENT: &str = "CONTEXT_UPDATED";

/// One observable change of a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub machine: MachineId,
    /// Dotted state name before the change, e.g. `idle_authenticated.revalidating`.
    pub from: String,
    pub to: String,
    pub event: String,
    pub reason: String,
    /// Context keys that changed, for context-only records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
    pub at: DateTime<Utc>,
}

impl TransitionRecord {
    /// A state change. `event: None` marks an automatic transition.
    pub fn state_change(
        machine: MachineId,
        from: impl Into<String>,
        to: impl Into<String>,
        event: Option<&str>,
    ) -> Self {
        let from = from.into();
        let to = to.into();
        let reason = match event {
            Some(event) => format!("Transitioned from '{from}' to '{to}' on event '{event}'."),
            None => format!("Transitioned from '{from}' to '{to}' due to an automatic transition."),
        };
        Self {
            machine,
            event: event.unwrap_or(AUTOMATIC_EVENT).to_string(),
            from,
            to,
            reason,
            changed_fields: Vec::new(),
            at: Utc::now(),
        }
    }

    /// A context merge that left the state unchanged.
    pub fn context_change(
        machine: MachineId,
        state: impl Into<String>,
        changed_fields: Vec<String>,
    ) -> Self {
        let state = state.into();
        let reason = format!(
            "Context updated in state '{state}'. Changes: {}.",
            changed_fields.join(", ")
        );
        Self {
            machine,
            from: state.clone(),
            to: state,
            event: CONTEXT_UPDATED_EVENT.to_string(),
            reason,
            changed_fields,
            at: Utc::now(),
        }
    }

    /// Canary call returned after a refresh or login.
    pub fn canary_confirmed() -> Self {
        Self {
            machine: MachineId::System,
            from: "canary_request".to_string(),
            to: "canary_response".to_string(),
            event: "AUTH_TEST".to_string(),
            reason: "Canary check completed successfully, confirming browser cookie synchronization."
                .to_string(),
            changed_fields: Vec::new(),
            at: Utc::now(),
        }
    }

    pub fn is_automatic(&self) -> bool {
        self.event == AUTOMATIC_EVENT
    }
}

/// State of the tab captured right before the executor navigates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationSnapshot {
    pub from_path: String,
    pub target_path: String,
    /// Dotted navigation state that issued the command.
    pub state: String,
    pub is_authenticated: bool,
    pub is_auth_loading: bool,
    pub last_known_path: Option<String>,
    pub setup_path: Option<String>,
    pub at: DateTime<Utc>,
}

/// Anything the journal keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    Transition(TransitionRecord),
    Navigation(NavigationSnapshot),
}

impl JournalEntry {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            JournalEntry::Transition(r) => r.at,
            JournalEntry::Navigation(s) => s.at,
        }
    }
}
