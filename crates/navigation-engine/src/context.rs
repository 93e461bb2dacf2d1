//! Navigation context, context patches and side-effect commands.

use serde::Serialize;

/// Action the executor performs on behalf of the decision machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SideEffectCommand {
    SavePath,
    ClearLastKnownPath,
    RevalidateAuth,
    NavigateAndJournal {
        #[serde(rename = "targetPath")]
        target_path: String,
    },
}

/// A command with the sequence number it was issued under.
///
/// Sequence numbers strictly increase per machine, so an executor that
/// remembers the last applied number never runs a command twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSideEffect {
    pub seq: u64,
    pub command: SideEffectCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationContext {
    pub pathname: String,
    pub is_authenticated: bool,
    pub is_auth_loading: bool,
    pub is_auth_stable: bool,
    pub is_setup_loading: bool,
    pub setup_path: Option<String>,
    pub last_known_path: Option<String>,
    pub pending_side_effect: Option<PendingSideEffect>,
}

impl Default for NavigationContext {
    /// Nothing is known yet: auth and setup are both still loading.
    fn default() -> Self {
        Self {
            pathname: String::new(),
            is_authenticated: false,
            is_auth_loading: true,
            is_auth_stable: false,
            is_setup_loading: true,
            setup_path: None,
            last_known_path: None,
            pending_side_effect: None,
        }
    }
}

/// Partial update carried by `CONTEXT_UPDATED`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPatch {
    pub pathname: Option<String>,
    pub is_authenticated: Option<bool>,
    pub is_auth_loading: Option<bool>,
    pub is_auth_stable: Option<bool>,
    pub is_setup_loading: Option<bool>,
    pub setup_path: Option<Option<String>>,
    pub last_known_path: Option<Option<String>>,
}

impl ContextPatch {
    pub fn is_empty(&self) -> bool {
        *self == ContextPatch::default()
    }

    pub fn pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    pub fn authenticated(mut self, is_authenticated: bool) -> Self {
        self.is_authenticated = Some(is_authenticated);
        self
    }

    pub fn auth_loading(mut self, is_auth_loading: bool) -> Self {
        self.is_auth_loading = Some(is_auth_loading);
        self
    }

    pub fn auth_stable(mut self, is_auth_stable: bool) -> Self {
        self.is_auth_stable = Some(is_auth_stable);
        self
    }

    pub fn setup_loading(mut self, is_setup_loading: bool) -> Self {
        self.is_setup_loading = Some(is_setup_loading);
        self
    }

    pub fn setup_path(mut self, setup_path: Option<&str>) -> Self {
        self.setup_path = Some(setup_path.map(str::to_string));
        self
    }

    pub fn last_known_path(mut self, last_known_path: Option<&str>) -> Self {
        self.last_known_path = Some(last_known_path.map(str::to_string));
        self
    }
}

impl NavigationContext {
    /// Merge `patch` and return the names of the fields whose value changed.
    pub fn merge(&mut self, patch: ContextPatch) -> Vec<String> {
        let mut changed = Vec::new();

        fn set<T: PartialEq>(slot: &mut T, value: Option<T>, name: &str, changed: &mut Vec<String>) {
            if let Some(value) = value {
                if *slot != value {
                    *slot = value;
                    changed.push(name.to_string());
                }
            }
        }

        set(&mut self.pathname, patch.pathname, "pathname", &mut changed);
        set(&mut self.is_authenticated, patch.is_authenticated, "isAuthenticated", &mut changed);
        set(&mut self.is_auth_loading, patch.is_auth_loading, "isAuthLoading", &mut changed);
        set(&mut self.is_auth_stable, patch.is_auth_stable, "isAuthStable", &mut changed);
        set(&mut self.is_setup_loading, patch.is_setup_loading, "isSetupLoading", &mut changed);
        set(&mut self.setup_path, patch.setup_path, "setupPath", &mut changed);
        set(&mut self.last_known_path, patch.last_known_path, "lastKnownPath", &mut changed);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_reports_only_changed_fields() {
        let mut ctx = NavigationContext::default();
        let changed = ctx.merge(
            ContextPatch::default()
                .pathname("/dashboard")
                .auth_loading(true)
                .last_known_path(None),
        );
        assert_eq!(changed, vec!["pathname".to_string()]);
        assert_eq!(ctx.pathname, "/dashboard");
    }

    #[test]
    fn merge_can_clear_optional_fields() {
        let mut ctx = NavigationContext {
            setup_path: Some("/getting-started".into()),
            ..NavigationContext::default()
        };
        let changed = ctx.merge(ContextPatch::default().setup_path(None));
        assert_eq!(changed, vec!["setupPath".to_string()]);
        assert_eq!(ctx.setup_path, None);
    }

    #[test]
    fn command_serializes_with_action_tag() {
        let json = serde_json::to_value(SideEffectCommand::NavigateAndJournal {
            target_path: "/login".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "action": "navigateAndJournal", "targetPath": "/login" })
        );
    }
}
