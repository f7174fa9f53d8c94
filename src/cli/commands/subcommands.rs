use super::AppContext;
use crate::api::{HttpApiClient, InstanceApi};
use crate::cli::render;
use crate::config::credentials::{OVERRIDE_ENV_VARS, detect_override};
use crate::pairing::{
    PairingController, PairingPhase, PairingSnapshot, StatusProber, decode_qr_payload,
};
use crate::session::{AgencyScope, SessionContext, SessionStore};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

pub(super) fn confirm(question: &str) -> Result<bool> {
    print!("{} (y/N): ", question);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let password = input.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("password is required");
    }
    Ok(password)
}

pub(super) async fn login(
    ctx: &mut AppContext,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password()?,
    };

    let client = HttpApiClient::new(&ctx.config.api, SessionContext::default())?;
    let resp = client.login(email, &password).await?;
    let session = SessionContext::from_login(resp.access_token, resp.user);
    ctx.store.save(&session)?;
    info!("logged in as {}", email);

    println!("\u{2713} Logged in");
    println!("{}", render::describe_session(&session));
    ctx.session = session;
    Ok(())
}

pub(super) fn logout(store: &SessionStore) -> Result<()> {
    if store.clear()? {
        println!("\u{2713} Logged out");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

pub(super) async fn whoami(ctx: &mut AppContext) -> Result<()> {
    if ctx.session.is_authenticated() && ctx.session.user().is_none() {
        let user = ctx.client()?.me().await?;
        let mut refreshed = SessionContext::from_login(ctx.session.token(), user);
        if let Some(agency) = ctx.session.agency_header() {
            refreshed.pin_agency(agency);
        }
        ctx.session = refreshed;
    }
    println!("{}", render::describe_session(&ctx.session));
    for env in OVERRIDE_ENV_VARS {
        if detect_override(env) {
            println!("  ({} is set and overrides the config)", env);
        }
    }
    Ok(())
}

pub(super) fn agency(ctx: &mut AppContext, id: Option<String>) -> Result<()> {
    ctx.require_login()?;

    let Some(id) = id else {
        match ctx.session.scope() {
            Some(scope) => println!("Acting on: {}", scope),
            None => println!("No agency selected."),
        }
        return Ok(());
    };

    let scope = AgencyScope::from(id.trim().to_string());
    ctx.session.select_scope(scope)?;
    ctx.store.save(&ctx.session)?;
    if let Some(scope) = ctx.session.scope() {
        println!("\u{2713} Now acting on {}", scope);
    }
    Ok(())
}

pub(super) async fn status(ctx: &AppContext, json: bool) -> Result<()> {
    ctx.require_login()?;
    ctx.session.require_agency()?;

    let prober = StatusProber::new(Arc::new(ctx.client()?));
    let status = prober.probe().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", render::describe_status(&status));
    }
    Ok(())
}

pub(super) async fn connect<R>(
    ctx: &AppContext,
    instance_name: Option<String>,
    qr_out: Option<PathBuf>,
    input: R,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    ctx.require_login()?;
    ctx.session.require_agency()?;

    let mut pairing = ctx.config.pairing.clone();
    if instance_name.is_some() {
        pairing.instance_name = instance_name;
    }
    let api: Arc<dyn InstanceApi> = Arc::new(ctx.client()?);
    let controller = PairingController::new(api, &pairing);

    // A failed status check still lets the user ask for a QR code.
    match controller.mount().await {
        Ok(snap) if snap.phase == PairingPhase::Connected => {
            println!("{}", render::connected_message(&snap));
            println!("Run `sdrlink disconnect` first to link a different number.");
            return Ok(());
        }
        Ok(_) => {}
        Err(e) => warn!("status check failed, requesting a QR code anyway: {}", e),
    }

    let mut rx = controller.subscribe();
    let snap = controller.request_pairing().await?;
    rx.mark_unchanged();
    if snap.phase == PairingPhase::Connected {
        println!("{}", render::connected_message(&snap));
        return Ok(());
    }

    show_qr(&snap, qr_out.as_deref())?;
    println!("Scan with WhatsApp: Settings > Linked Devices > Link a Device");
    println!("Type r + Enter for a new QR code, q + Enter to quit.\n");

    let outcome = wait_for_scan(&controller, &mut rx, input, qr_out.as_deref(), snap.qr).await;
    controller.shutdown().await;
    outcome
}

async fn wait_for_scan<R>(
    controller: &PairingController,
    rx: &mut tokio::sync::watch::Receiver<PairingSnapshot>,
    input: R,
    qr_out: Option<&Path>,
    mut shown_qr: Option<String>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut stdin_open = true;
    let mut last_line: Option<String> = None;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snap = rx.borrow_and_update().clone();
                match snap.phase {
                    PairingPhase::Connected => {
                        println!("\n{}", render::connected_message(&snap));
                        return Ok(());
                    }
                    PairingPhase::GaveUp => {
                        println!();
                        anyhow::bail!(render::gave_up_message(&snap));
                    }
                    PairingPhase::Unconfigured => return Ok(()),
                    PairingPhase::Connecting => {
                        if snap.qr.is_some() && snap.qr != shown_qr {
                            println!();
                            show_qr(&snap, qr_out)?;
                            shown_qr = snap.qr.clone();
                        }
                        let line = render::waiting_line(&snap);
                        if line != last_line
                            && let Some(text) = &line
                        {
                            print!("\r{:<72}", text);
                            std::io::stdout().flush()?;
                        }
                        last_line = line;
                    }
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("failed to read input")? {
                    Some(input) if input.trim().eq_ignore_ascii_case("r") => {
                        if let Err(e) = controller.refresh_qr().await {
                            println!("\n{}", e.user_message());
                        }
                    }
                    Some(input) if input.trim().eq_ignore_ascii_case("q") => {
                        println!("Cancelled.");
                        return Ok(());
                    }
                    Some(_) => {}
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nCancelled.");
                return Ok(());
            }
        }
    }
}

/// Print the QR in the terminal when the raw pairing code is known, and
/// write the PNG when asked to (or when there is no other way to show it).
fn show_qr(snap: &PairingSnapshot, qr_out: Option<&Path>) -> Result<()> {
    let Some(payload) = &snap.qr else {
        return Ok(());
    };

    let printed = snap
        .pairing_code
        .as_deref()
        .is_some_and(print_terminal_qr);

    let target = match qr_out {
        Some(path) => Some(path.to_path_buf()),
        None if !printed => Some(crate::utils::get_sdrlink_home()?.join("qr.png")),
        None => None,
    };
    if let Some(path) = target {
        let png = decode_qr_payload(payload)?;
        crate::utils::atomic_write(&path, png)?;
        println!("QR code image written to {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "terminal-qr")]
fn print_terminal_qr(code: &str) -> bool {
    match qr2term::print_qr(code) {
        Ok(()) => true,
        Err(e) => {
            warn!("qr2term failed: {}, falling back to qrcode crate", e);
            match qrcode::QrCode::new(code) {
                Ok(qr) => {
                    let rendered = qr
                        .render::<char>()
                        .quiet_zone(false)
                        .module_dimensions(2, 1)
                        .build();
                    println!("{}", rendered);
                    true
                }
                Err(e2) => {
                    warn!("failed to render QR code: {}", e2);
                    false
                }
            }
        }
    }
}

#[cfg(not(feature = "terminal-qr"))]
fn print_terminal_qr(_code: &str) -> bool {
    false
}

pub(super) async fn disconnect(ctx: &AppContext, yes: bool) -> Result<()> {
    ctx.require_login()?;
    ctx.session.require_agency()?;

    let api: Arc<dyn InstanceApi> = Arc::new(ctx.client()?);
    let controller = PairingController::new(api, &ctx.config.pairing);
    let snap = controller.mount().await?;
    if snap.phase != PairingPhase::Connected {
        println!("WhatsApp is not connected.");
        return Ok(());
    }

    let confirmation = controller.request_disconnect().await?;
    let phone = snap
        .status
        .as_ref()
        .and_then(crate::pairing::ConnectionStatus::display_phone)
        .unwrap_or_else(|| "this number".to_string());
    if !yes && !confirm(&format!("Disconnect {}?", phone))? {
        println!("Cancelled.");
        return Ok(());
    }

    controller.confirm_disconnect(confirmation).await?;
    println!("\u{2713} WhatsApp disconnected");
    Ok(())
}

pub(super) async fn token(ctx: &AppContext) -> Result<()> {
    ctx.require_login()?;
    ctx.session.require_agency()?;

    let resp = ctx.client()?.token().await?;
    match resp.token {
        Some(token) if !token.is_empty() => println!("{}", token),
        _ => {
            let msg = resp
                .message
                .unwrap_or_else(|| "no instance token available".to_string());
            anyhow::bail!(msg);
        }
    }
    Ok(())
}

pub(super) async fn health(ctx: &AppContext) -> Result<()> {
    ctx.require_login()?;
    ctx.session.require_agency()?;

    let resp = ctx.client()?.health().await?;
    if resp.healthy {
        println!("\u{2713} Instance healthy");
    } else {
        let reason = resp.reason.unwrap_or_else(|| "unknown".to_string());
        warn!("instance unhealthy: {}", reason);
        println!("\u{2717} Instance unhealthy: {}", reason);
    }
    Ok(())
}
