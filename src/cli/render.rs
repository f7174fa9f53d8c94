//! Plain-text rendering of pairing and session state for the terminal.

use crate::pairing::{ConnectionStatus, GiveUpReason, PairingPhase, PairingSnapshot};
use crate::session::SessionContext;
use std::fmt::Write;

const CHECK: &str = "\u{2713}";
const CROSS: &str = "\u{2717}";

pub fn describe_status(status: &ConnectionStatus) -> String {
    let mut out = String::new();
    let mark = if status.is_connected() { CHECK } else { CROSS };
    let _ = writeln!(out, "WhatsApp: {} {}", status.state, mark);
    if let Some(phone) = status.display_phone() {
        let _ = writeln!(out, "Phone: {}", phone);
    }
    if let Some(name) = &status.profile_name {
        let _ = writeln!(out, "Profile: {}", name);
    }
    if let Some(instance) = &status.instance_name {
        let _ = writeln!(out, "Instance: {}", instance);
    }
    out.trim_end().to_string()
}

pub fn connected_message(snap: &PairingSnapshot) -> String {
    let Some(status) = &snap.status else {
        return format!("{} WhatsApp connected", CHECK);
    };
    let mut line = format!("{} WhatsApp connected", CHECK);
    if let Some(phone) = status.display_phone() {
        let _ = write!(line, " as {}", phone);
    }
    if let Some(name) = &status.profile_name {
        let _ = write!(line, " ({})", name);
    }
    line
}

pub fn gave_up_message(snap: &PairingSnapshot) -> String {
    let reason = snap
        .give_up
        .map_or_else(|| "pairing stopped".to_string(), |r| r.to_string());
    let mut msg = format!("Stopped waiting for the scan: {}", reason);
    if let (Some(GiveUpReason::PollFailures(_)), Some(err)) = (snap.give_up, &snap.error) {
        let _ = write!(msg, " (last error: {})", err);
    }
    msg.push_str(". Run `sdrlink connect` to try again.");
    msg
}

/// One status line for the waiting screen.
pub fn waiting_line(snap: &PairingSnapshot) -> Option<String> {
    if snap.phase != PairingPhase::Connecting {
        return None;
    }
    let mut line = snap.countdown_label()?;
    if snap.poll_failures > 0 {
        let _ = write!(line, " | status check failed {}x, retrying", snap.poll_failures);
    }
    Some(line)
}

pub fn describe_session(session: &SessionContext) -> String {
    if !session.is_authenticated() {
        return "Not logged in. Run `sdrlink login`.".to_string();
    }
    let mut out = String::new();
    match session.user() {
        Some(user) => {
            let _ = writeln!(
                out,
                "Logged in as {} ({})",
                user.name.as_deref().unwrap_or(&user.email),
                user.role
            );
            let _ = writeln!(out, "Email: {}", user.email);
        }
        None => {
            let _ = writeln!(out, "Authenticated with a configured token");
        }
    }
    match session.scope() {
        Some(scope) => {
            let _ = writeln!(out, "Acting on: {}", scope);
        }
        None => {
            let _ = writeln!(out, "Acting on: (no agency selected)");
        }
    }
    out.trim_end().to_string()
}
