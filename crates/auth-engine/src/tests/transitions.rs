//! Transition-by-transition behaviour of the session machine.

use super::*;
use crate::error::{ErrorCode, GatewayError};
use crate::machine::ActorRequest;
use crate::status::{Credentials, StatusPayload};

#[test]
fn cold_start_with_live_session_reaches_stable() {
    let mut machine = AuthSessionMachine::new();
    let step = machine.handle(AuthEvent::ClientReady(client()));
    assert_eq!(entered(&step), vec![AuthState::Checking]);
    assert_eq!(step.invoke.as_ref().unwrap().request, ActorRequest::CheckStatus);

    let done = finish(
        &mut machine,
        &step,
        ActorOutcome::Status(Ok(testing::authenticated("ada@example.test"))),
    );

    assert_eq!(
        entered(&done),
        vec![AuthState::EvaluatingInitialSession, AuthState::Stable]
    );
    assert_eq!(done.transitions[0].event.as_deref(), Some("done.invoke.checkStatus"));
    assert_eq!(done.transitions[1].event, None);
    assert!(done.invoke.is_none());

    let session = machine.session();
    assert!(session.is_authenticated);
    assert_eq!(
        session.user.as_ref().unwrap().email.as_deref(),
        Some("ada@example.test")
    );
    assert_eq!(session.error_code, None);
}

#[test]
fn cold_start_with_expired_token_refreshes_first() {
    let mut machine = AuthSessionMachine::new();
    let step = machine.handle(AuthEvent::ClientReady(client()));
    let evaluated = finish(&mut machine, &step, ActorOutcome::Status(Ok(testing::refresh_needed())));

    assert_eq!(
        entered(&evaluated),
        vec![AuthState::EvaluatingInitialSession, AuthState::InitialRefreshing]
    );
    assert_eq!(
        evaluated.invoke.as_ref().unwrap().request,
        ActorRequest::RefreshAndCanary
    );

    let refreshed = finish(
        &mut machine,
        &evaluated,
        ActorOutcome::Refreshed(Ok(confirmed(testing::authenticated("ada@example.test")))),
    );
    assert_eq!(entered(&refreshed), vec![AuthState::Stable]);
    assert!(refreshed.signal_change);
    assert!(refreshed.canary_confirmed);
    assert!(!machine.session().expired_access_token_call_refresh);
}

#[test]
fn cold_start_without_session_is_unauthenticated() {
    let machine = signed_out();
    assert_eq!(machine.session().error_code, None);
    assert!(!machine.session().is_authenticated);
}

#[test]
fn status_failure_during_check_sets_rpc_error() {
    let mut machine = AuthSessionMachine::new();
    let step = machine.handle(AuthEvent::ClientReady(client()));
    let failed = finish(&mut machine, &step, ActorOutcome::Status(Err(testing::transport_error())));

    assert_eq!(entered(&failed), vec![AuthState::Unauthenticated]);
    assert_eq!(failed.transitions[0].event.as_deref(), Some("error.invoke.checkStatus"));
    assert_eq!(machine.session().error_code, Some(ErrorCode::RpcError));
}

#[test]
fn initial_refresh_failure_keeps_parsed_payload() {
    let mut machine = AuthSessionMachine::new();
    let step = machine.handle(AuthEvent::ClientReady(client()));
    let evaluated = finish(&mut machine, &step, ActorOutcome::Status(Ok(testing::refresh_needed())));

    let payload = StatusPayload {
        is_authenticated: false,
        error_code: Some("REFRESH_TOKEN_EXPIRED".into()),
        ..StatusPayload::default()
    };
    let failed = finish(
        &mut machine,
        &evaluated,
        ActorOutcome::Refreshed(Err(GatewayError::Rejected {
            error_code: payload.error_code.clone(),
            payload: Some(payload),
        })),
    );

    assert_eq!(entered(&failed), vec![AuthState::Unauthenticated]);
    let session = machine.session();
    assert_eq!(session.error_code, Some(ErrorCode::InitialRefreshFailed));
    assert!(!session.is_authenticated);
    assert!(!session.expired_access_token_call_refresh);
    assert!(!failed.signal_change);
}

#[test]
fn initial_refresh_without_session_is_a_failure() {
    let mut machine = AuthSessionMachine::new();
    let step = machine.handle(AuthEvent::ClientReady(client()));
    let evaluated = finish(&mut machine, &step, ActorOutcome::Status(Ok(testing::refresh_needed())));
    finish(
        &mut machine,
        &evaluated,
        ActorOutcome::Refreshed(Ok(confirmed(testing::unauthenticated()))),
    );

    assert_eq!(machine.state(), AuthState::Unauthenticated);
    assert_eq!(machine.session().error_code, Some(ErrorCode::InitialRefreshFailed));
}

#[test]
fn revalidation_outcomes() {
    let mut machine = signed_in("ada@example.test");
    let check = machine.handle(AuthEvent::Check);
    assert_eq!(entered(&check), vec![AuthState::Revalidating]);
    let ok = finish(
        &mut machine,
        &check,
        ActorOutcome::Status(Ok(testing::authenticated("ada@example.test"))),
    );
    assert_eq!(entered(&ok), vec![AuthState::Stable]);

    let check = machine.handle(AuthEvent::Check);
    let gone = finish(&mut machine, &check, ActorOutcome::Status(Ok(testing::unauthenticated())));
    assert_eq!(entered(&gone), vec![AuthState::Unauthenticated]);
    assert!(machine.session().user.is_none());
    assert_eq!(machine.session().error_code, None);
}

#[test]
fn revalidation_failure_sets_rpc_error() {
    let mut machine = signed_in("ada@example.test");
    let check = machine.handle(AuthEvent::Check);
    finish(
        &mut machine,
        &check,
        ActorOutcome::Status(Err(GatewayError::Status {
            status: 502,
            body: String::new(),
        })),
    );

    assert_eq!(machine.state(), AuthState::Unauthenticated);
    assert!(!machine.session().is_authenticated);
    assert_eq!(machine.session().error_code, Some(ErrorCode::RpcError));
}

#[test]
fn background_refresh_outcomes() {
    let mut machine = signed_in("ada@example.test");
    let refresh = machine.handle(AuthEvent::Refresh);
    assert_eq!(entered(&refresh), vec![AuthState::BackgroundRefreshing]);
    let ok = finish(
        &mut machine,
        &refresh,
        ActorOutcome::Refreshed(Ok(confirmed(testing::authenticated("ada@example.test")))),
    );
    assert_eq!(entered(&ok), vec![AuthState::Stable]);
    assert!(ok.signal_change);

    let refresh = machine.handle(AuthEvent::Refresh);
    finish(
        &mut machine,
        &refresh,
        ActorOutcome::Refreshed(Ok(confirmed(testing::unauthenticated()))),
    );
    assert_eq!(machine.state(), AuthState::Unauthenticated);
    assert_eq!(machine.session().error_code, None);
}

#[test]
fn background_refresh_failure_sets_error_code() {
    let mut machine = signed_in("ada@example.test");
    let refresh = machine.handle(AuthEvent::Refresh);
    finish(
        &mut machine,
        &refresh,
        ActorOutcome::Refreshed(Err(GatewayError::Canary("reset".into()))),
    );

    assert_eq!(machine.state(), AuthState::Unauthenticated);
    assert_eq!(
        machine.session().error_code,
        Some(ErrorCode::BackgroundRefreshFailed)
    );
}

#[test]
fn login_clears_previous_error_and_succeeds() {
    let mut machine = AuthSessionMachine::new();
    let step = machine.handle(AuthEvent::ClientReady(client()));
    finish(&mut machine, &step, ActorOutcome::Status(Err(testing::transport_error())));
    assert_eq!(machine.session().error_code, Some(ErrorCode::RpcError));

    let login = machine.handle(AuthEvent::Login(Credentials::new("ada@example.test", "pw")));
    assert_eq!(entered(&login), vec![AuthState::LoggingIn]);
    assert_eq!(machine.session().error_code, None);
    assert_eq!(
        login.invoke.as_ref().unwrap().request,
        ActorRequest::LoginAndCanary(Credentials::new("ada@example.test", "pw"))
    );

    let done = finish(
        &mut machine,
        &login,
        ActorOutcome::LoggedIn(Ok(confirmed(testing::authenticated("ada@example.test")))),
    );
    assert_eq!(entered(&done), vec![AuthState::Stable]);
    assert!(done.signal_change);
    assert!(done.canary_confirmed);
    assert_eq!(done.transitions[0].event.as_deref(), Some("done.invoke.loginAndCanary"));
}

#[test]
fn login_failure_codes() {
    let cases = [
        (testing::rejected("WRONG_PASSWORD"), "LOGIN_WRONG_PASSWORD"),
        (testing::transport_error(), "LOGIN_UNKNOWN_FAILURE"),
        (GatewayError::Canary("reset".into()), "LOGIN_UNKNOWN_FAILURE"),
    ];

    for (error, expected) in cases {
        let mut machine = signed_out();
        let login = machine.handle(AuthEvent::Login(Credentials::new("ada@example.test", "pw")));
        finish(&mut machine, &login, ActorOutcome::LoggedIn(Err(error)));

        assert_eq!(machine.state(), AuthState::Unauthenticated);
        assert_eq!(
            machine.session().error_code.as_ref().map(ToString::to_string).as_deref(),
            Some(expected)
        );
    }
}

#[test]
fn logout_sets_one_shot_flag_until_acknowledged() {
    let mut machine = signed_in("ada@example.test");
    let logout = machine.handle(AuthEvent::Logout);
    assert_eq!(entered(&logout), vec![AuthState::LoggingOut]);

    let done = finish(&mut machine, &logout, ActorOutcome::LoggedOut(Ok(testing::unauthenticated())));
    assert_eq!(entered(&done), vec![AuthState::Unauthenticated]);
    assert!(done.signal_change);
    assert!(machine.session().just_logged_out);
    assert!(machine.session().user.is_none());

    let ack = machine.handle(AuthEvent::AckLogoutCleanup);
    assert!(ack.transitions.is_empty());
    assert!(!machine.session().just_logged_out);
    assert_eq!(machine.state(), AuthState::Unauthenticated);
}

#[test]
fn logout_failure_keeps_session() {
    let mut machine = signed_in("ada@example.test");
    let logout = machine.handle(AuthEvent::Logout);
    finish(&mut machine, &logout, ActorOutcome::LoggedOut(Err(testing::transport_error())));

    assert_eq!(machine.state(), AuthState::Stable);
    assert!(machine.session().is_authenticated);
    assert_eq!(machine.session().error_code, Some(ErrorCode::LogoutError));
}

#[test]
fn client_swap_while_authenticated_keeps_session() {
    let mut machine = signed_in("ada@example.test");
    let unready = machine.handle(AuthEvent::ClientUnready);

    assert_eq!(entered(&unready), vec![AuthState::ReInitializing]);
    assert!(machine.session().is_authenticated);
    assert!(machine.client().is_none());

    let ready = machine.handle(AuthEvent::ClientReady(client()));
    assert_eq!(entered(&ready), vec![AuthState::Checking]);
    assert!(ready.invoke.is_some());
}

#[test]
fn client_unready_while_signed_out_resets_session() {
    let mut machine = signed_out();
    let login = machine.handle(AuthEvent::Login(Credentials::new("ada@example.test", "pw")));
    finish(&mut machine, &login, ActorOutcome::LoggedIn(Err(testing::rejected("WRONG_PASSWORD"))));
    assert!(machine.session().error_code.is_some());
    let logged = machine.session().response_log.len();
    assert_eq!(logged, 1);

    machine.handle(AuthEvent::ClientUnready);

    assert_eq!(machine.state(), AuthState::Uninitialized);
    assert_eq!(machine.session().error_code, None);
    assert_eq!(machine.session().response_log.len(), logged);
}

#[test]
fn events_outside_their_states_are_ignored() {
    let mut machine = AuthSessionMachine::new();
    assert!(machine.handle(AuthEvent::Check).is_empty());
    assert!(machine.handle(AuthEvent::Logout).is_empty());
    assert_eq!(machine.state(), AuthState::Uninitialized);

    let mut machine = signed_in("ada@example.test");
    let step = machine.handle(AuthEvent::Login(Credentials::new("x@example.test", "pw")));
    assert!(step.is_empty());
    assert_eq!(machine.state(), AuthState::Stable);
}

#[test]
fn check_during_revalidation_is_absorbed() {
    let mut machine = signed_in("ada@example.test");
    let first = machine.handle(AuthEvent::Check);
    let active = machine.active_invocation();

    let again = machine.handle(AuthEvent::Check);
    assert!(again.is_empty());
    assert_eq!(machine.active_invocation(), active);

    let done = finish(
        &mut machine,
        &first,
        ActorOutcome::Status(Ok(testing::authenticated("ada@example.test"))),
    );
    assert_eq!(entered(&done), vec![AuthState::Stable]);
}

#[test]
fn refresh_during_revalidation_escalates() {
    let mut machine = signed_in("ada@example.test");
    machine.handle(AuthEvent::Check);
    let refresh = machine.handle(AuthEvent::Refresh);

    assert_eq!(entered(&refresh), vec![AuthState::BackgroundRefreshing]);
    assert_eq!(
        refresh.invoke.as_ref().unwrap().request,
        ActorRequest::RefreshAndCanary
    );
}

#[test]
fn every_stable_state_accepts_logout() {
    for event in [AuthEvent::Check, AuthEvent::Refresh] {
        let mut machine = signed_in("ada@example.test");
        machine.handle(event);
        let logout = machine.handle(AuthEvent::Logout);
        assert_eq!(entered(&logout), vec![AuthState::LoggingOut]);
    }
}
