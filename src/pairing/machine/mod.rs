//! Connection state machine for WhatsApp device pairing.
//!
//! The machine is plain synchronous state. Every network-backed trigger is
//! split in two: `begin_*` validates the transition and hands out a
//! [`Ticket`], the caller performs the request without holding any lock, and
//! `complete_*` applies the result only if the ticket is still current.
//!
//! A ticket goes stale when a newer request of the same kind was issued or
//! when the machine changed state (the epoch moved) in between. Poll tickets
//! additionally go stale when any user command was issued after them.

use super::countdown::Countdown;
use super::initiator::{PairingOutcome, PairingSession};
use super::status::ConnectionStatus;
use crate::config::{ExpiryPolicy, PairingConfig};
use crate::errors::{PairingError, PairingResult};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GiveUpReason {
    /// Too many consecutive status checks failed.
    PollFailures(u32),
    /// The poll deadline elapsed without a scan.
    Deadline,
    /// The QR expired and the expiry policy stops polling.
    Expired,
}

impl fmt::Display for GiveUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PollFailures(n) => write!(f, "{} consecutive status checks failed", n),
            Self::Deadline => write!(f, "timed out waiting for the QR code to be scanned"),
            Self::Expired => write!(f, "QR code expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Unconfigured,
    Connecting {
        session: PairingSession,
        countdown: Countdown,
        poll_failures: u32,
    },
    Connected {
        status: ConnectionStatus,
    },
    GaveUp {
        reason: GiveUpReason,
    },
}

impl PairingState {
    pub fn phase(&self) -> PairingPhase {
        match self {
            Self::Unconfigured => PairingPhase::Unconfigured,
            Self::Connecting { .. } => PairingPhase::Connecting,
            Self::Connected { .. } => PairingPhase::Connected,
            Self::GaveUp { .. } => PairingPhase::GaveUp,
        }
    }
}

/// Fieldless view of [`PairingState`] for rendering and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingPhase {
    Unconfigured,
    Connecting,
    Connected,
    GaveUp,
}

impl fmt::Display for PairingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "unconfigured"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::GaveUp => write!(f, "gave up"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TicketKind {
    Command,
    Poll,
    Probe,
}

/// Proof that a request was issued by this machine, stamped with its
/// sequence number and the epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    epoch: u64,
    kind: TicketKind,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// First half of the two-step disconnect. Only valid for the connection it
/// was issued for.
#[derive(Debug, PartialEq, Eq)]
pub struct DisconnectConfirmation {
    epoch: u64,
}

/// What the driver of the machine has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Entered `Connecting`: start the poll loop and the countdown.
    StartPolling,
    /// New QR while connecting: restart the countdown, keep polling.
    RestartCountdown,
    /// Left `Connecting`: cancel both background loops.
    StopPolling,
    /// A status check failed; back off before the next one.
    PollFailed { consecutive: u32 },
    /// The countdown reached zero and polling continues.
    CountdownExpired,
    /// The result belonged to a superseded request and was dropped.
    Stale,
}

/// Render-ready copy of the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingSnapshot {
    pub phase: PairingPhase,
    pub qr: Option<String>,
    pub pairing_code: Option<String>,
    pub instance_name: Option<String>,
    pub countdown: Option<u32>,
    pub expired: bool,
    pub status: Option<ConnectionStatus>,
    pub give_up: Option<GiveUpReason>,
    pub poll_failures: u32,
    pub error: Option<String>,
    pub loading: bool,
}

impl PairingSnapshot {
    pub fn countdown_label(&self) -> Option<String> {
        let remaining = self.countdown?;
        Some(if self.expired {
            "QR code expired, generate a new one".to_string()
        } else {
            format!("Expires in {}s", remaining)
        })
    }
}

pub struct PairingMachine {
    state: PairingState,
    qr_ttl_secs: u32,
    max_poll_failures: u32,
    expiry_policy: ExpiryPolicy,
    next_seq: u64,
    epoch: u64,
    /// Latest command ticket still awaiting its result.
    pending_command: Option<u64>,
    /// Sequence of the most recently issued command, answered or not.
    last_command_seq: u64,
    latest_poll: u64,
    latest_probe: u64,
    last_status: Option<ConnectionStatus>,
    last_error: Option<String>,
}

impl PairingMachine {
    pub fn new(config: &PairingConfig) -> Self {
        Self {
            state: PairingState::Unconfigured,
            qr_ttl_secs: config.qr_ttl_secs,
            max_poll_failures: config.max_poll_failures.max(1),
            expiry_policy: config.expiry_policy,
            next_seq: 0,
            epoch: 0,
            pending_command: None,
            last_command_seq: 0,
            latest_poll: 0,
            latest_probe: 0,
            last_status: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> &PairingState {
        &self.state
    }

    pub fn phase(&self) -> PairingPhase {
        self.state.phase()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_command.is_some()
    }

    pub fn poll_failures(&self) -> u32 {
        match &self.state {
            PairingState::Connecting { poll_failures, .. } => *poll_failures,
            _ => 0,
        }
    }

    fn issue(&mut self, kind: TicketKind) -> Ticket {
        self.next_seq += 1;
        let ticket = Ticket {
            seq: self.next_seq,
            epoch: self.epoch,
            kind,
        };
        match kind {
            TicketKind::Command => {
                self.pending_command = Some(ticket.seq);
                self.last_command_seq = ticket.seq;
            }
            TicketKind::Poll => self.latest_poll = ticket.seq,
            TicketKind::Probe => self.latest_probe = ticket.seq,
        }
        ticket
    }

    fn transition(&mut self, next: PairingState) {
        let from = self.state.phase();
        let to = next.phase();
        self.state = next;
        self.epoch += 1;
        if from != to {
            info!("pairing state: {} -> {}", from, to);
        }
    }

    fn invalid(&self, action: &'static str) -> PairingError {
        PairingError::InvalidTransition {
            action,
            state: self.state.phase().to_string(),
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        match ticket.kind {
            TicketKind::Command => self.pending_command == Some(ticket.seq),
            TicketKind::Poll => {
                self.latest_poll == ticket.seq && self.last_command_seq < ticket.seq
            }
            TicketKind::Probe => {
                self.latest_probe == ticket.seq && self.last_command_seq < ticket.seq
            }
        }
    }

    /// Returns true when the command result must be dropped.
    fn settle_command(&mut self, ticket: &Ticket, action: &str) -> bool {
        if self.is_current(ticket) {
            self.pending_command = None;
            false
        } else {
            debug!("dropping stale {} result (seq {})", action, ticket.seq);
            if self.pending_command == Some(ticket.seq) {
                self.pending_command = None;
            }
            true
        }
    }

    fn record_error(&mut self, err: &PairingError) {
        self.last_error = Some(err.user_message());
    }

    // -- request_pairing ---------------------------------------------------

    pub fn begin_request_pairing(&mut self) -> PairingResult<Ticket> {
        match self.state {
            PairingState::Unconfigured | PairingState::GaveUp { .. } => {
                self.last_error = None;
                Ok(self.issue(TicketKind::Command))
            }
            _ => Err(self.invalid("request pairing")),
        }
    }

    pub fn complete_request_pairing(
        &mut self,
        ticket: Ticket,
        result: PairingResult<PairingOutcome>,
    ) -> PairingResult<Effect> {
        if self.settle_command(&ticket, "request pairing") {
            return Ok(Effect::Stale);
        }
        match result {
            Ok(PairingOutcome::AwaitingScan(session)) => {
                self.transition(PairingState::Connecting {
                    session,
                    countdown: Countdown::start(self.qr_ttl_secs),
                    poll_failures: 0,
                });
                Ok(Effect::StartPolling)
            }
            Ok(PairingOutcome::AlreadyConnected(status)) => {
                self.last_status = Some(status.clone());
                self.transition(PairingState::Connected { status });
                Ok(Effect::StopPolling)
            }
            Err(e) => {
                warn!("pairing request failed: {}", e);
                self.record_error(&e);
                Err(e)
            }
        }
    }

    // -- refresh_qr --------------------------------------------------------

    pub fn begin_refresh_qr(&mut self) -> PairingResult<Ticket> {
        match self.state {
            PairingState::Connecting { .. } => {
                self.last_error = None;
                Ok(self.issue(TicketKind::Command))
            }
            _ => Err(self.invalid("refresh the QR code")),
        }
    }

    pub fn complete_refresh_qr(
        &mut self,
        ticket: Ticket,
        result: PairingResult<PairingSession>,
    ) -> PairingResult<Effect> {
        if self.settle_command(&ticket, "refresh QR") {
            return Ok(Effect::Stale);
        }
        let mut fresh = match result {
            Ok(session) => session,
            Err(e) => {
                warn!("QR refresh failed: {}", e);
                self.record_error(&e);
                return Err(e);
            }
        };
        let PairingState::Connecting {
            session,
            poll_failures,
            ..
        } = &self.state
        else {
            return Ok(Effect::Stale);
        };
        if fresh.instance_name.is_none() {
            fresh.instance_name = session.instance_name.clone();
        }
        let poll_failures = *poll_failures;
        self.transition(PairingState::Connecting {
            session: fresh,
            countdown: Countdown::start(self.qr_ttl_secs),
            poll_failures,
        });
        Ok(Effect::RestartCountdown)
    }

    // -- polling -----------------------------------------------------------

    pub fn begin_poll(&mut self) -> PairingResult<Ticket> {
        match self.state {
            PairingState::Connecting { .. } => Ok(self.issue(TicketKind::Poll)),
            _ => Err(self.invalid("poll")),
        }
    }

    /// Apply a status check. Failures never surface as errors; they are
    /// counted and end in `GaveUp` once the limit is reached.
    pub fn complete_poll(
        &mut self,
        ticket: Ticket,
        result: PairingResult<ConnectionStatus>,
    ) -> Effect {
        if !self.is_current(&ticket) {
            debug!("dropping stale poll result (seq {})", ticket.seq);
            return Effect::Stale;
        }
        let PairingState::Connecting {
            poll_failures,
            session,
            ..
        } = &mut self.state
        else {
            return Effect::Stale;
        };
        match result {
            Ok(status) if status.is_connected() => {
                info!(
                    "paired {} after {:.1}s",
                    status.display_phone().unwrap_or_default(),
                    session.created_at.elapsed().as_secs_f64()
                );
                self.last_status = Some(status.clone());
                self.last_error = None;
                self.transition(PairingState::Connected { status });
                Effect::StopPolling
            }
            Ok(status) => {
                *poll_failures = 0;
                self.last_status = Some(status);
                Effect::None
            }
            Err(e) => {
                *poll_failures += 1;
                let consecutive = *poll_failures;
                debug!("status check failed ({} in a row): {}", consecutive, e);
                if consecutive >= self.max_poll_failures {
                    let reason = GiveUpReason::PollFailures(consecutive);
                    warn!("giving up on pairing: {}", reason);
                    self.last_error = Some(e.user_message());
                    self.transition(PairingState::GaveUp { reason });
                    Effect::StopPolling
                } else {
                    Effect::PollFailed { consecutive }
                }
            }
        }
    }

    // -- disconnect --------------------------------------------------------

    /// Ask for confirmation. Only valid while connected; nothing is sent.
    pub fn request_disconnect(&self) -> PairingResult<DisconnectConfirmation> {
        match self.state {
            PairingState::Connected { .. } => Ok(DisconnectConfirmation { epoch: self.epoch }),
            _ => Err(self.invalid("disconnect")),
        }
    }

    pub fn begin_disconnect(
        &mut self,
        confirmation: DisconnectConfirmation,
    ) -> PairingResult<Ticket> {
        if !matches!(self.state, PairingState::Connected { .. }) {
            return Err(self.invalid("disconnect"));
        }
        if confirmation.epoch != self.epoch {
            return Err(self.invalid("disconnect with an outdated confirmation"));
        }
        self.last_error = None;
        Ok(self.issue(TicketKind::Command))
    }

    pub fn complete_disconnect(
        &mut self,
        ticket: Ticket,
        result: PairingResult<()>,
    ) -> PairingResult<Effect> {
        if self.settle_command(&ticket, "disconnect") {
            return Ok(Effect::Stale);
        }
        match result {
            Ok(()) => {
                self.last_status = None;
                self.transition(PairingState::Unconfigured);
                Ok(Effect::StopPolling)
            }
            Err(e) => {
                warn!("disconnect failed: {}", e);
                self.record_error(&e);
                Err(e)
            }
        }
    }

    // -- status probe ------------------------------------------------------

    /// Status check outside of pairing (on mount or on demand).
    pub fn begin_probe(&mut self) -> Ticket {
        self.issue(TicketKind::Probe)
    }

    /// Applies a probe while idle or connected; a running pairing attempt is
    /// left to the poll loop.
    pub fn complete_probe(
        &mut self,
        ticket: Ticket,
        result: PairingResult<ConnectionStatus>,
    ) -> PairingResult<Effect> {
        if !self.is_current(&ticket) {
            debug!("dropping stale probe result (seq {})", ticket.seq);
            return Ok(Effect::Stale);
        }
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                self.record_error(&e);
                return Err(e);
            }
        };
        self.last_status = Some(status.clone());
        match (self.state.phase(), status.is_connected()) {
            (PairingPhase::Unconfigured | PairingPhase::Connected, true) => {
                self.transition(PairingState::Connected { status });
            }
            (PairingPhase::Connected, false) => {
                self.transition(PairingState::Unconfigured);
            }
            _ => {}
        }
        Ok(Effect::None)
    }

    // -- timers ------------------------------------------------------------

    /// One countdown second.
    pub fn tick_countdown(&mut self) -> Effect {
        let PairingState::Connecting { countdown, .. } = &mut self.state else {
            return Effect::Stale;
        };
        if countdown.is_expired() {
            return Effect::Stale;
        }
        if !countdown.tick() {
            return Effect::None;
        }
        info!("QR code expired");
        match self.expiry_policy {
            ExpiryPolicy::KeepPolling => Effect::CountdownExpired,
            ExpiryPolicy::StopPolling => self.give_up(GiveUpReason::Expired),
        }
    }

    /// Abandon the current pairing attempt. No-op outside `Connecting`.
    pub fn give_up(&mut self, reason: GiveUpReason) -> Effect {
        if !matches!(self.state, PairingState::Connecting { .. }) {
            return Effect::Stale;
        }
        warn!("giving up on pairing: {}", reason);
        self.transition(PairingState::GaveUp { reason });
        Effect::StopPolling
    }

    /// Drop any pairing session and invalidate everything in flight.
    pub fn teardown(&mut self) {
        if matches!(self.state, PairingState::Connecting { .. }) {
            self.transition(PairingState::Unconfigured);
        } else {
            self.epoch += 1;
        }
        self.pending_command = None;
    }

    pub fn snapshot(&self) -> PairingSnapshot {
        let mut snap = PairingSnapshot {
            phase: self.state.phase(),
            qr: None,
            pairing_code: None,
            instance_name: self
                .last_status
                .as_ref()
                .and_then(|s| s.instance_name.clone()),
            countdown: None,
            expired: false,
            status: self.last_status.clone(),
            give_up: None,
            poll_failures: self.poll_failures(),
            error: self.last_error.clone(),
            loading: self.is_loading(),
        };
        match &self.state {
            PairingState::Unconfigured => {}
            PairingState::Connecting {
                session, countdown, ..
            } => {
                snap.qr = Some(session.qr_payload.clone());
                snap.pairing_code = session.pairing_code.clone();
                snap.instance_name = session
                    .instance_name
                    .clone()
                    .or(snap.instance_name.take());
                snap.countdown = Some(countdown.remaining());
                snap.expired = countdown.is_expired();
            }
            PairingState::Connected { status } => {
                snap.status = Some(status.clone());
                snap.instance_name = status.instance_name.clone().or(snap.instance_name.take());
            }
            PairingState::GaveUp { reason } => snap.give_up = Some(*reason),
        }
        snap
    }
}

#[cfg(test)]
mod tests;
