//! Behavioural tests for the auth engine.
//!
//! - `transitions.rs` - every transition of the session machine, driven synchronously
//! - `safety.rs`      - trust rules: safety, no-flap, stale completions, diagnostics isolation
//! - `service.rs`     - the tokio interpreter: snapshots, observers, coalescing, timeouts

mod transitions;

use crate::coalesce::SessionClient;
use crate::fsm::AuthState;
use crate::gateway::{ConfirmedReply, RpcReply};
use crate::machine::{ActorCompletion, ActorOutcome, AuthEvent, AuthSessionMachine, InvocationId, Step};
use crate::testing::{self, ScriptedGateway};
use serde_json::json;
use std::sync::Arc;

fn client() -> SessionClient {
    SessionClient::new(Arc::new(ScriptedGateway::new()))
}

fn confirmed(reply: RpcReply) -> ConfirmedReply {
    ConfirmedReply {
        reply,
        canary: json!({ "ok": true }),
    }
}

fn invocation(step: &Step) -> InvocationId {
    step.invoke.as_ref().expect("step should invoke an actor").id
}

/// Complete the actor started by `step`.
fn finish(machine: &mut AuthSessionMachine, step: &Step, outcome: ActorOutcome) -> Step {
    machine.complete(ActorCompletion {
        invocation: invocation(step),
        outcome,
    })
}

fn entered(step: &Step) -> Vec<AuthState> {
    step.transitions.iter().map(|t| t.to).collect()
}

fn signed_in(email: &str) -> AuthSessionMachine {
    let mut machine = AuthSessionMachine::new();
    let step = machine.handle(AuthEvent::ClientReady(client()));
    finish(
        &mut machine,
        &step,
        ActorOutcome::Status(Ok(testing::authenticated(email))),
    );
    assert_eq!(machine.state(), AuthState::Stable);
    machine
}

fn signed_out() -> AuthSessionMachine {
    let mut machine = AuthSessionMachine::new();
    let step = machine.handle(AuthEvent::ClientReady(client()));
    finish(&mut machine, &step, ActorOutcome::Status(Ok(testing::unauthenticated())));
    assert_eq!(machine.state(), AuthState::Unauthenticated);
    machine
}
