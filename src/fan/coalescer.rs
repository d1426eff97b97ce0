use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::translator::{translate, SpeedTiers};
use super::{FanError, FanField, FanUpdate, IntentState, Result, StateSink};
use crate::ir::WaveformCatalog;
use crate::serial::IrTransmitter;

/// Wait between the last change of a field and the resulting IR command
pub const DEBOUNCE_TIME: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerSettings {
    pub debounce: Duration,
    pub tiers: SpeedTiers,
}

impl Default for CoalescerSettings {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE_TIME,
            tiers: SpeedTiers::default(),
        }
    }
}

/// Collapses bursts of intent updates into as few IR commands as possible.
///
/// `apply_update` writes the new value immediately, so readers always see the
/// latest intent. Each field has its own debounce timer; a new update replaces
/// the pending timer of its field. When a timer fires the background task
/// evaluates the full current state against the last dispatched one and sends
/// at most one waveform. Dispatches never overlap. Dropping the handle settles
/// whatever is still pending without waiting for the timers.
pub struct UpdateCoalescer {
    current_tx: watch::Sender<IntentState>,
    update_tx: mpsc::UnboundedSender<FanField>,
    dispatched_rx: watch::Receiver<IntentState>,
    task: JoinHandle<()>,
}

impl UpdateCoalescer {
    /// `initial` seeds both the current and the last dispatched state
    pub fn spawn(
        initial: IntentState,
        catalog: Arc<WaveformCatalog>,
        transmitter: IrTransmitter,
        sink: Arc<dyn StateSink>,
        settings: CoalescerSettings,
    ) -> Self {
        let (current_tx, current_rx) = watch::channel(initial);
        let (dispatched_tx, dispatched_rx) = watch::channel(initial);
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let actor = CoalescerActor {
            current_rx,
            update_rx,
            previous: initial,
            dispatched_tx,
            pending: DebounceTable::default(),
            catalog,
            transmitter,
            sink,
            settings,
        };
        let task = tokio::spawn(actor.run());

        Self {
            current_tx,
            update_tx,
            dispatched_rx,
            task,
        }
    }

    pub fn apply_update(&self, update: FanUpdate) -> Result<()> {
        self.current_tx.send_modify(|state| state.apply(update));
        self.update_tx
            .send(update.field())
            .map_err(|_| FanError::CoalescerStopped)
    }

    pub fn current(&self) -> IntentState {
        *self.current_tx.borrow()
    }

    /// State evaluated by the most recent settle
    pub fn last_dispatched(&self) -> IntentState {
        *self.dispatched_rx.borrow()
    }

    /// Stop accepting updates and wait until pending fields have been settled
    pub async fn shutdown(self) {
        let Self { update_tx, task, .. } = self;
        drop(update_tx);
        if let Err(e) = task.await {
            log::error!("Update coalescer task failed: {}", e);
        }
    }
}

/// One optional deadline per field
#[derive(Debug, Default)]
struct DebounceTable {
    slots: [Option<Instant>; FanField::COUNT],
}

impl DebounceTable {
    fn arm(&mut self, field: FanField, deadline: Instant) {
        self.slots[field.index()] = Some(deadline);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().flatten().min().copied()
    }

    fn earliest(&self) -> Option<(FanField, Instant)> {
        [FanField::On, FanField::Speed]
            .into_iter()
            .filter_map(|f| self.slots[f.index()].map(|at| (f, at)))
            .min_by_key(|(_, at)| *at)
    }

    /// Clear and return the earliest field whose deadline has passed
    fn take_due(&mut self, now: Instant) -> Option<FanField> {
        match self.earliest() {
            Some((field, at)) if at <= now => {
                self.slots[field.index()] = None;
                Some(field)
            }
            _ => None,
        }
    }

    /// Clear and return the earliest armed field, due or not
    fn take_next(&mut self) -> Option<FanField> {
        let (field, _) = self.earliest()?;
        self.slots[field.index()] = None;
        Some(field)
    }
}

struct CoalescerActor {
    current_rx: watch::Receiver<IntentState>,
    update_rx: mpsc::UnboundedReceiver<FanField>,
    previous: IntentState,
    dispatched_tx: watch::Sender<IntentState>,
    pending: DebounceTable,
    catalog: Arc<WaveformCatalog>,
    transmitter: IrTransmitter,
    sink: Arc<dyn StateSink>,
    settings: CoalescerSettings,
}

impl CoalescerActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                field = self.update_rx.recv() => match field {
                    Some(field) => self.rearm(field),
                    None => {
                        self.flush().await;
                        break;
                    }
                },
                _ = debounce_deadline(self.pending.next_deadline()) => {
                    loop {
                        // Updates that arrived during a dispatch replace their timers first
                        while let Ok(field) = self.update_rx.try_recv() {
                            self.rearm(field);
                        }
                        match self.pending.take_due(Instant::now()) {
                            Some(field) => self.settle(field).await,
                            None => break,
                        }
                    }
                }
            }
        }
        log::debug!("Update coalescer stopped");
    }

    /// Settle every armed field now, earliest first
    async fn flush(&mut self) {
        while let Some(field) = self.pending.take_next() {
            log::debug!("Flushing pending {:?} update", field);
            self.settle(field).await;
        }
    }

    fn rearm(&mut self, field: FanField) {
        self.pending.arm(field, Instant::now() + self.settings.debounce);
    }

    async fn settle(&mut self, field: FanField) {
        let current = *self.current_rx.borrow();
        log::debug!("{:?} settled: {:?} (previous {:?})", field, current, self.previous);

        self.sink.store(&current).await;

        if let Some(signal) = translate(&current, &self.previous, &self.settings.tiers) {
            let waveform = self.catalog.signal(signal);
            log::info!("Fan {:?} -> sending {}", current, waveform.name);
            if let Err(e) = self.transmitter.send(waveform).await {
                log::debug!("Dispatch of {} ended early: {}", waveform.name, e);
            }
        }

        self.previous = current;
        self.dispatched_tx.send_replace(current);
    }
}

async fn debounce_deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
