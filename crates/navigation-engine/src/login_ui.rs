//! Login page presentation machine.
//!
//! Answers "what should the login screen show" from three flags. No side
//! effects; the only memory is the last input, so repeating it is a no-op.

use rust_fsm::*;
use serde::Serialize;
use tracing::debug;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub login_presentation(Idle)

    Idle => {
        Evaluate => Evaluating
    },
    ShowingForm => {
        Evaluate => Evaluating
    },
    Finalizing => {
        Evaluate => Evaluating
    },
    Evaluating => {
        Finalize => Finalizing,
        ShowForm => ShowingForm,
        Dismiss => Idle
    }
}

use login_presentation::Input as LoginUiInput;
use login_presentation::State as LoginUiState;
use login_presentation::StateMachine as LoginUiMachine;

/// What the login screen renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoginView {
    Idle,
    ShowingForm,
    /// Signed in (or signing in) on the login page; a redirect is coming.
    Finalizing,
}

impl LoginView {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginView::Idle => "idle",
            LoginView::ShowingForm => "showingForm",
            LoginView::Finalizing => "finalizing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginUiInputs {
    pub is_authenticated: bool,
    pub is_logging_in: bool,
    pub is_on_login_page: bool,
}

pub struct LoginPresentationMachine {
    fsm: LoginUiMachine,
    last: Option<LoginUiInputs>,
}

impl Default for LoginPresentationMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginPresentationMachine {
    pub fn new() -> Self {
        Self {
            fsm: LoginUiMachine::new(),
            last: None,
        }
    }

    pub fn view(&self) -> LoginView {
        match self.fsm.state() {
            LoginUiState::ShowingForm => LoginView::ShowingForm,
            LoginUiState::Finalizing => LoginView::Finalizing,
            LoginUiState::Idle | LoginUiState::Evaluating => LoginView::Idle,
        }
    }

    /// `EVALUATE`. Returns the resulting view and whether it changed.
    pub fn evaluate(&mut self, inputs: LoginUiInputs) -> (LoginView, bool) {
        if self.last == Some(inputs) {
            return (self.view(), false);
        }
        self.last = Some(inputs);

        let before = self.view();
        let outcome = if inputs.is_on_login_page && (inputs.is_authenticated || inputs.is_logging_in) {
            LoginUiInput::Finalize
        } else if inputs.is_on_login_page {
            LoginUiInput::ShowForm
        } else {
            LoginUiInput::Dismiss
        };

        // Every state accepts Evaluate and Evaluating accepts every outcome.
        if self.fsm.consume(&LoginUiInput::Evaluate).is_err() || self.fsm.consume(&outcome).is_err() {
            debug!(?outcome, "login presentation rejected input");
        }

        let after = self.view();
        (after, after != before)
    }
}
