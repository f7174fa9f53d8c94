//! WhatsApp device pairing: QR issuance, status polling and disconnect.
//!
//! [`PairingController`] is the entry point for views. The lower layers
//! ([`PairingMachine`], [`StatusProber`], [`PairingInitiator`]) are public for
//! callers that want to drive the flow themselves.

pub mod controller;
pub mod countdown;
pub mod initiator;
pub mod machine;
pub mod scheduler;
pub mod status;

#[cfg(test)]
pub(crate) mod mock;

pub use controller::{PairingController, wait_for_phase};
pub use countdown::Countdown;
pub use initiator::{PairingInitiator, PairingOutcome, PairingSession, decode_qr_payload};
pub use machine::{
    DisconnectConfirmation, Effect, GiveUpReason, PairingMachine, PairingPhase, PairingSnapshot,
    PairingState, Ticket,
};
pub use scheduler::PollSchedule;
pub use status::{ConnectionState, ConnectionStatus, StatusProber, format_phone, normalize_state};
