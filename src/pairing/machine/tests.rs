use super::*;
use crate::pairing::status::{ConnectionState, format_phone};

fn config() -> PairingConfig {
    PairingConfig::default()
}

fn session(qr: &str) -> PairingSession {
    let mut s = PairingSession::new(qr);
    s.instance_name = Some("tenet-1".into());
    s
}

fn connected(phone: &str) -> ConnectionStatus {
    ConnectionStatus {
        state: ConnectionState::Connected,
        phone_number: Some(phone.into()),
        profile_name: Some("Loja".into()),
        profile_picture_url: None,
        instance_name: Some("tenet-1".into()),
    }
}

fn waiting() -> ConnectionStatus {
    ConnectionStatus {
        state: ConnectionState::Connecting,
        ..ConnectionStatus::not_configured()
    }
}

fn transport() -> PairingError {
    PairingError::Transport("connection refused".into())
}

/// Machine already in `Connecting` with QR "abc".
fn connecting(config: &PairingConfig) -> PairingMachine {
    let mut m = PairingMachine::new(config);
    let t = m.begin_request_pairing().unwrap();
    let effect = m
        .complete_request_pairing(t, Ok(PairingOutcome::AwaitingScan(session("abc"))))
        .unwrap();
    assert_eq!(effect, Effect::StartPolling);
    m
}

#[test]
fn request_pairing_shows_qr_and_full_countdown() {
    let m = connecting(&config());
    let snap = m.snapshot();
    assert_eq!(snap.phase, PairingPhase::Connecting);
    assert_eq!(snap.qr.as_deref(), Some("abc"));
    assert_eq!(snap.countdown, Some(45));
    assert!(!snap.expired);
    assert!(!snap.loading);
    assert_eq!(snap.instance_name.as_deref(), Some("tenet-1"));
}

#[test]
fn connected_poll_clears_session_and_stops_polling() {
    let mut m = connecting(&config());
    let t = m.begin_poll().unwrap();
    assert_eq!(
        m.complete_poll(t, Ok(connected("5511999999999"))),
        Effect::StopPolling
    );

    assert!(matches!(m.state(), PairingState::Connected { .. }));
    let snap = m.snapshot();
    assert_eq!(snap.phase, PairingPhase::Connected);
    assert!(snap.qr.is_none());
    assert!(snap.countdown.is_none());
    let phone = snap.status.unwrap().phone_number.unwrap();
    assert_eq!(format_phone(&phone).as_deref(), Some("+5511999999999"));
}

#[test]
fn waiting_poll_keeps_connecting() {
    let mut m = connecting(&config());
    let t = m.begin_poll().unwrap();
    assert_eq!(m.complete_poll(t, Ok(waiting())), Effect::None);
    assert_eq!(m.phase(), PairingPhase::Connecting);
}

#[test]
fn request_pairing_failure_keeps_state_and_message() {
    let mut m = PairingMachine::new(&config());
    let t = m.begin_request_pairing().unwrap();
    assert!(m.is_loading());
    let err = m
        .complete_request_pairing(
            t,
            Err(PairingError::Server {
                status: 400,
                detail: "Erro ao criar instância".into(),
            }),
        )
        .unwrap_err();

    assert_eq!(err.user_message(), "Erro ao criar instância");
    assert_eq!(m.phase(), PairingPhase::Unconfigured);
    assert!(!m.is_loading());
    assert_eq!(m.snapshot().error.as_deref(), Some("Erro ao criar instância"));
}

#[test]
fn already_connected_outcome_goes_straight_to_connected() {
    let mut m = PairingMachine::new(&config());
    let t = m.begin_request_pairing().unwrap();
    let effect = m
        .complete_request_pairing(
            t,
            Ok(PairingOutcome::AlreadyConnected(connected("5511"))),
        )
        .unwrap();
    assert_eq!(effect, Effect::StopPolling);
    assert_eq!(m.phase(), PairingPhase::Connected);
}

#[test]
fn request_pairing_rejected_while_connecting_or_connected() {
    let mut m = connecting(&config());
    let err = m.begin_request_pairing().unwrap_err();
    assert_eq!(err.to_string(), "cannot request pairing while connecting");

    let t = m.begin_poll().unwrap();
    m.complete_poll(t, Ok(connected("1")));
    assert!(m.begin_request_pairing().is_err());
}

#[test]
fn disconnect_rejected_unless_connected() {
    let m = PairingMachine::new(&config());
    let err = m.request_disconnect().unwrap_err();
    assert!(matches!(err, PairingError::InvalidTransition { .. }));

    let m = connecting(&config());
    assert!(m.request_disconnect().is_err());
}

#[test]
fn two_step_disconnect_returns_to_unconfigured() {
    let mut m = connecting(&config());
    let t = m.begin_poll().unwrap();
    m.complete_poll(t, Ok(connected("1")));

    let confirmation = m.request_disconnect().unwrap();
    let t = m.begin_disconnect(confirmation).unwrap();
    assert_eq!(m.complete_disconnect(t, Ok(())).unwrap(), Effect::StopPolling);
    assert_eq!(m.phase(), PairingPhase::Unconfigured);
    assert!(m.snapshot().status.is_none());

    // Can pair again after a disconnect
    assert!(m.begin_request_pairing().is_ok());
}

#[test]
fn disconnect_failure_stays_connected() {
    let mut m = PairingMachine::new(&config());
    let t = m.begin_probe();
    m.complete_probe(t, Ok(connected("1"))).unwrap();

    let t = m.begin_disconnect(m.request_disconnect().unwrap()).unwrap();
    assert!(m.complete_disconnect(t, Err(transport())).is_err());
    assert_eq!(m.phase(), PairingPhase::Connected);
    assert!(m.last_error().unwrap().contains("Could not reach the server"));
}

#[test]
fn outdated_disconnect_confirmation_is_rejected() {
    let mut m = PairingMachine::new(&config());
    let t = m.begin_probe();
    m.complete_probe(t, Ok(connected("1"))).unwrap();
    let confirmation = m.request_disconnect().unwrap();

    // Connection re-established in between
    let t = m.begin_probe();
    m.complete_probe(t, Ok(connected("2"))).unwrap();

    let err = m.begin_disconnect(confirmation).unwrap_err();
    assert!(matches!(err, PairingError::InvalidTransition { .. }));
    assert!(!m.is_loading());
}

#[test]
fn poll_issued_before_refresh_is_stale() {
    let mut m = connecting(&config());
    let poll = m.begin_poll().unwrap();
    let refresh = m.begin_refresh_qr().unwrap();

    // Old poll lands first, claims connected: dropped
    assert_eq!(m.complete_poll(poll, Ok(connected("1"))), Effect::Stale);
    assert_eq!(m.phase(), PairingPhase::Connecting);

    assert_eq!(
        m.complete_refresh_qr(refresh, Ok(session("def"))).unwrap(),
        Effect::RestartCountdown
    );
    assert_eq!(m.snapshot().qr.as_deref(), Some("def"));
}

#[test]
fn poll_completing_after_refresh_is_stale() {
    let mut m = connecting(&config());
    let poll = m.begin_poll().unwrap();
    let refresh = m.begin_refresh_qr().unwrap();
    m.complete_refresh_qr(refresh, Ok(session("def"))).unwrap();

    assert_eq!(m.complete_poll(poll, Err(transport())), Effect::Stale);
    assert_eq!(m.poll_failures(), 0);
}

#[test]
fn older_poll_superseded_by_newer_poll() {
    let mut m = connecting(&config());
    let first = m.begin_poll().unwrap();
    let second = m.begin_poll().unwrap();
    assert_eq!(m.complete_poll(first, Ok(connected("1"))), Effect::Stale);
    assert_eq!(m.complete_poll(second, Ok(waiting())), Effect::None);
    assert!(first.seq() < second.seq());
}

#[test]
fn refresh_during_connected_poll_is_dropped() {
    let mut m = connecting(&config());
    let refresh = m.begin_refresh_qr().unwrap();
    let poll = m.begin_poll().unwrap();
    m.complete_poll(poll, Ok(connected("1")));

    assert_eq!(
        m.complete_refresh_qr(refresh, Ok(session("def"))).unwrap(),
        Effect::Stale
    );
    assert_eq!(m.phase(), PairingPhase::Connected);
    assert!(m.snapshot().qr.is_none());
    assert!(!m.is_loading());
}

#[test]
fn refresh_keeps_instance_name_and_resets_countdown() {
    let mut m = connecting(&config());
    for _ in 0..10 {
        m.tick_countdown();
    }
    assert_eq!(m.snapshot().countdown, Some(35));

    let t = m.begin_refresh_qr().unwrap();
    m.complete_refresh_qr(t, Ok(PairingSession::new("def")))
        .unwrap();
    let snap = m.snapshot();
    assert_eq!(snap.countdown, Some(45));
    assert_eq!(snap.instance_name.as_deref(), Some("tenet-1"));
}

#[test]
fn refresh_failure_keeps_old_qr() {
    let mut m = connecting(&config());
    let t = m.begin_refresh_qr().unwrap();
    let err = m
        .complete_refresh_qr(t, Err(PairingError::Unavailable("not yet".into())))
        .unwrap_err();
    assert_eq!(err.to_string(), "not yet");
    assert_eq!(m.snapshot().qr.as_deref(), Some("abc"));
}

#[test]
fn refresh_rejected_outside_connecting() {
    let mut m = PairingMachine::new(&config());
    assert!(m.begin_refresh_qr().is_err());
}

#[test]
fn poll_rejected_outside_connecting() {
    let mut m = PairingMachine::new(&config());
    assert!(m.begin_poll().is_err());
}

#[test]
fn consecutive_poll_failures_give_up() {
    let cfg = PairingConfig {
        max_poll_failures: 3,
        ..config()
    };
    let mut m = connecting(&cfg);
    for n in 1..3 {
        let t = m.begin_poll().unwrap();
        assert_eq!(
            m.complete_poll(t, Err(transport())),
            Effect::PollFailed { consecutive: n }
        );
    }
    let t = m.begin_poll().unwrap();
    assert_eq!(m.complete_poll(t, Err(transport())), Effect::StopPolling);

    let snap = m.snapshot();
    assert_eq!(snap.phase, PairingPhase::GaveUp);
    assert_eq!(snap.give_up, Some(GiveUpReason::PollFailures(3)));
    assert!(snap.qr.is_none());
    assert!(snap.error.is_some());

    // GaveUp is left through a new pairing request
    assert!(m.begin_request_pairing().is_ok());
}

#[test]
fn successful_poll_resets_failure_count() {
    let mut m = connecting(&config());
    let t = m.begin_poll().unwrap();
    m.complete_poll(t, Err(transport()));
    assert_eq!(m.poll_failures(), 1);
    let t = m.begin_poll().unwrap();
    m.complete_poll(t, Ok(waiting()));
    assert_eq!(m.poll_failures(), 0);
}

#[test]
fn countdown_expiry_keeps_polling_by_default() {
    let mut m = connecting(&config());
    for _ in 0..44 {
        assert_eq!(m.tick_countdown(), Effect::None);
    }
    assert_eq!(m.tick_countdown(), Effect::CountdownExpired);
    // Past zero: nothing left to count
    assert_eq!(m.tick_countdown(), Effect::Stale);

    let snap = m.snapshot();
    assert_eq!(snap.phase, PairingPhase::Connecting);
    assert!(snap.expired);
    assert_eq!(snap.countdown, Some(0));
    assert_eq!(
        snap.countdown_label().as_deref(),
        Some("QR code expired, generate a new one")
    );
    assert!(m.begin_poll().is_ok());
}

#[test]
fn countdown_expiry_can_stop_polling() {
    let cfg = PairingConfig {
        qr_ttl_secs: 2,
        expiry_policy: ExpiryPolicy::StopPolling,
        ..config()
    };
    let mut m = connecting(&cfg);
    m.tick_countdown();
    assert_eq!(m.tick_countdown(), Effect::StopPolling);
    assert_eq!(m.snapshot().give_up, Some(GiveUpReason::Expired));
}

#[test]
fn countdown_tick_outside_connecting_is_noop() {
    let mut m = PairingMachine::new(&config());
    assert_eq!(m.tick_countdown(), Effect::Stale);
    assert_eq!(m.phase(), PairingPhase::Unconfigured);
}

#[test]
fn deadline_gives_up_only_while_connecting() {
    let mut m = PairingMachine::new(&config());
    assert_eq!(m.give_up(GiveUpReason::Deadline), Effect::Stale);

    let mut m = connecting(&config());
    assert_eq!(m.give_up(GiveUpReason::Deadline), Effect::StopPolling);
    assert_eq!(m.snapshot().give_up, Some(GiveUpReason::Deadline));
}

#[test]
fn probe_on_mount_detects_existing_connection() {
    let mut m = PairingMachine::new(&config());
    let t = m.begin_probe();
    m.complete_probe(t, Ok(connected("5511999999999"))).unwrap();
    assert_eq!(m.phase(), PairingPhase::Connected);

    let t = m.begin_probe();
    m.complete_probe(t, Ok(ConnectionStatus::not_configured()))
        .unwrap();
    assert_eq!(m.phase(), PairingPhase::Unconfigured);
}

#[test]
fn probe_superseded_by_command() {
    let mut m = PairingMachine::new(&config());
    let probe = m.begin_probe();
    let _pairing = m.begin_request_pairing().unwrap();
    assert_eq!(
        m.complete_probe(probe, Ok(connected("1"))).unwrap(),
        Effect::Stale
    );
    assert_eq!(m.phase(), PairingPhase::Unconfigured);
}

#[test]
fn probe_does_not_interrupt_pairing() {
    let mut m = connecting(&config());
    let t = m.begin_probe();
    m.complete_probe(t, Ok(waiting())).unwrap();
    assert_eq!(m.phase(), PairingPhase::Connecting);
}

#[test]
fn teardown_drops_session_and_in_flight_results() {
    let mut m = connecting(&config());
    let poll = m.begin_poll().unwrap();
    let refresh = m.begin_refresh_qr().unwrap();
    m.teardown();

    assert_eq!(m.phase(), PairingPhase::Unconfigured);
    assert!(m.snapshot().qr.is_none());
    assert!(!m.is_loading());
    assert_eq!(m.complete_poll(poll, Ok(connected("1"))), Effect::Stale);
    assert_eq!(
        m.complete_refresh_qr(refresh, Ok(session("x"))).unwrap(),
        Effect::Stale
    );
}
