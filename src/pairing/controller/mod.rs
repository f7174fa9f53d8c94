//! The pairing controller: one state machine plus its two background loops,
//! shared by every view.
//!
//! Views read [`PairingSnapshot`]s from [`PairingController::subscribe`] and
//! call the async triggers. Network requests run without the state lock held;
//! results are applied through the machine's ticket checks, so late answers
//! cannot overwrite newer state.

use super::initiator::PairingInitiator;
use super::machine::{
    DisconnectConfirmation, Effect, GiveUpReason, PairingMachine, PairingPhase, PairingSnapshot,
};
use super::scheduler::PollSchedule;
use super::status::StatusProber;
use crate::api::InstanceApi;
use crate::config::PairingConfig;
use crate::errors::PairingResult;
use crate::utils::task_tracker::TaskTracker;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, info};

const POLL_TASK: &str = "pairing-poll";
const COUNTDOWN_TASK: &str = "pairing-countdown";

struct Inner {
    api: Arc<dyn InstanceApi>,
    machine: Mutex<PairingMachine>,
    prober: StatusProber,
    initiator: PairingInitiator,
    schedule: PollSchedule,
    tasks: TaskTracker,
    tx: watch::Sender<PairingSnapshot>,
}

impl Inner {
    fn publish(&self, machine: &PairingMachine) {
        self.tx.send_replace(machine.snapshot());
    }

    /// One status check, without touching the background loops.
    async fn poll_once(&self) -> PairingResult<Effect> {
        let ticket = self.machine.lock().await.begin_poll()?;
        let result = self.prober.probe().await;
        let mut machine = self.machine.lock().await;
        let effect = machine.complete_poll(ticket, result);
        if effect != Effect::Stale {
            self.publish(&machine);
        }
        Ok(effect)
    }

    async fn give_up(&self, reason: GiveUpReason) -> Effect {
        let mut machine = self.machine.lock().await;
        let effect = machine.give_up(reason);
        if effect != Effect::Stale {
            self.publish(&machine);
        }
        effect
    }

    async fn tick_countdown(&self) -> Effect {
        let mut machine = self.machine.lock().await;
        let effect = machine.tick_countdown();
        if effect != Effect::Stale {
            self.publish(&machine);
        }
        effect
    }
}

/// Drives the pairing flow for one tenant.
///
/// Dropping the controller (or calling [`shutdown`](Self::shutdown)) cancels
/// the poll and countdown loops.
pub struct PairingController {
    inner: Arc<Inner>,
}

impl PairingController {
    pub fn new(api: Arc<dyn InstanceApi>, config: &PairingConfig) -> Self {
        let machine = PairingMachine::new(config);
        let (tx, _) = watch::channel(machine.snapshot());
        Self {
            inner: Arc::new(Inner {
                machine: Mutex::new(machine),
                prober: StatusProber::new(api.clone()),
                initiator: PairingInitiator::new(api.clone(), config.instance_name.clone()),
                api,
                schedule: PollSchedule::from_config(config),
                tasks: TaskTracker::new(),
                tx,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PairingSnapshot> {
        self.inner.tx.subscribe()
    }

    pub fn snapshot(&self) -> PairingSnapshot {
        self.inner.tx.borrow().clone()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.tasks.is_running(POLL_TASK)
    }

    /// Fetch the current status once. Call when a view opens.
    pub async fn mount(&self) -> PairingResult<PairingSnapshot> {
        let ticket = self.inner.machine.lock().await.begin_probe();
        let result = self.inner.prober.probe().await;
        {
            let mut machine = self.inner.machine.lock().await;
            let outcome = machine.complete_probe(ticket, result);
            self.inner.publish(&machine);
            outcome?;
        }
        Ok(self.snapshot())
    }

    /// Ask the backend for a QR code and start waiting for the scan.
    pub async fn request_pairing(&self) -> PairingResult<PairingSnapshot> {
        let ticket = {
            let mut machine = self.inner.machine.lock().await;
            let ticket = machine.begin_request_pairing()?;
            self.inner.publish(&machine);
            ticket
        };
        let result = self.inner.initiator.initiate().await;
        let effect = {
            let mut machine = self.inner.machine.lock().await;
            let effect = machine.complete_request_pairing(ticket, result);
            self.inner.publish(&machine);
            effect?
        };
        self.apply(effect);
        Ok(self.snapshot())
    }

    /// Replace the displayed QR and restart its countdown.
    pub async fn refresh_qr(&self) -> PairingResult<PairingSnapshot> {
        let ticket = {
            let mut machine = self.inner.machine.lock().await;
            let ticket = machine.begin_refresh_qr()?;
            self.inner.publish(&machine);
            ticket
        };
        let result = self.inner.initiator.regenerate().await;
        let effect = {
            let mut machine = self.inner.machine.lock().await;
            let effect = machine.complete_refresh_qr(ticket, result);
            self.inner.publish(&machine);
            effect?
        };
        self.apply(effect);
        Ok(self.snapshot())
    }

    /// Run a single status check now. The poll loop calls the same logic on
    /// its schedule.
    pub async fn poll_tick(&self) -> PairingResult<Effect> {
        let effect = self.inner.poll_once().await?;
        self.apply(effect);
        Ok(effect)
    }

    /// First step of disconnecting; nothing is sent yet.
    pub async fn request_disconnect(&self) -> PairingResult<DisconnectConfirmation> {
        self.inner.machine.lock().await.request_disconnect()
    }

    pub async fn confirm_disconnect(
        &self,
        confirmation: DisconnectConfirmation,
    ) -> PairingResult<PairingSnapshot> {
        let ticket = {
            let mut machine = self.inner.machine.lock().await;
            let ticket = machine.begin_disconnect(confirmation)?;
            self.inner.publish(&machine);
            ticket
        };
        let result = self.inner.api.disconnect().await;
        let effect = {
            let mut machine = self.inner.machine.lock().await;
            let effect = machine.complete_disconnect(ticket, result);
            self.inner.publish(&machine);
            effect?
        };
        self.apply(effect);
        Ok(self.snapshot())
    }

    /// Stop both loops and drop any pending pairing session.
    pub async fn shutdown(&self) {
        self.inner.tasks.cancel_all();
        let mut machine = self.inner.machine.lock().await;
        machine.teardown();
        self.inner.publish(&machine);
        debug!("pairing controller shut down");
    }

    fn apply(&self, effect: Effect) {
        match effect {
            Effect::StartPolling => {
                let schedule = self.inner.schedule;
                self.inner
                    .tasks
                    .spawn(POLL_TASK, poll_loop(Arc::downgrade(&self.inner), schedule));
                self.start_countdown();
                info!(
                    "waiting for QR scan (polling every {}s)",
                    schedule.interval.as_secs()
                );
            }
            Effect::RestartCountdown => self.start_countdown(),
            Effect::StopPolling => {
                self.inner.tasks.cancel(POLL_TASK);
                self.inner.tasks.cancel(COUNTDOWN_TASK);
            }
            Effect::None
            | Effect::PollFailed { .. }
            | Effect::CountdownExpired
            | Effect::Stale => {}
        }
    }

    fn start_countdown(&self) {
        self.inner
            .tasks
            .spawn(COUNTDOWN_TASK, countdown_loop(Arc::downgrade(&self.inner)));
    }
}

impl Drop for PairingController {
    fn drop(&mut self) {
        self.inner.tasks.cancel_all();
    }
}

async fn poll_loop(inner: Weak<Inner>, schedule: PollSchedule) {
    let started = Instant::now();
    let mut delay = schedule.interval;
    loop {
        if let Some(deadline) = schedule.deadline {
            let left = deadline.saturating_sub(started.elapsed());
            tokio::time::sleep(delay.min(left)).await;
        } else {
            tokio::time::sleep(delay).await;
        }
        let Some(inner) = inner.upgrade() else {
            return;
        };

        if let Some(deadline) = schedule.deadline
            && started.elapsed() >= deadline
        {
            if inner.give_up(GiveUpReason::Deadline).await == Effect::StopPolling {
                inner.tasks.cancel(COUNTDOWN_TASK);
            }
            return;
        }

        match inner.poll_once().await {
            Ok(Effect::StopPolling) => {
                inner.tasks.cancel(COUNTDOWN_TASK);
                return;
            }
            Ok(Effect::PollFailed { consecutive }) => {
                delay = schedule.next_delay(consecutive);
                debug!("next status check in {:?}", delay);
            }
            Ok(_) => delay = schedule.interval,
            Err(e) => {
                debug!("poll loop stopping: {}", e);
                return;
            }
        }
    }
}

async fn countdown_loop(inner: Weak<Inner>) {
    let second = Duration::from_secs(1);
    let mut ticker = tokio::time::interval_at(Instant::now() + second, second);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match inner.tick_countdown().await {
            Effect::None => {}
            Effect::StopPolling => {
                inner.tasks.cancel(POLL_TASK);
                return;
            }
            _ => return,
        }
    }
}

/// Wait until the snapshot reaches one of `phases` or the controller is gone.
pub async fn wait_for_phase(
    rx: &mut watch::Receiver<PairingSnapshot>,
    phases: &[PairingPhase],
) -> Option<PairingSnapshot> {
    rx.wait_for(|snap| phases.contains(&snap.phase))
        .await
        .ok()
        .map(|snap| snap.clone())
}
