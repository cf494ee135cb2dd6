//! Poll loop
//!
//! Each tick reads every readable device on its own worker thread and
//! waits at most the configured timeout; a device that does not answer in
//! time keeps its last values marked stale while its siblings update.
//! A worker that outlives its tick is not replaced until it finishes.
//! Overlapping ticks are discarded rather than queued. Planning and
//! applying take the same lock, so writes never interleave with a poll.

use crate::config::Config;
use crate::domain::{Category, DesiredState, Device, DeviceCollection, ParamName, ParamValue};
use crate::error::{AppError, ServiceError};
use crate::services::applier::{ApplyReport, PlanApplier};
use crate::services::planner::{apply_to_model, plan_write, WritePlan};
use crate::services::reader::read;
use crate::services::snapshot::{CollectionSnapshot, SnapshotSlot};
use crate::sysfs::ControlFs;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Granularity of the stop-flag check while sleeping
const STOP_POLL: Duration = Duration::from_millis(50);

/// Configuration for the poller
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval between ticks
    pub interval: Duration,
    /// Per-device read timeout
    pub read_timeout: Duration,
    /// Categories refreshed every tick (Static is cached after the first)
    pub categories: Vec<Category>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            read_timeout: Duration::from_millis(1000),
            categories: vec![Category::Static, Category::Dynamic, Category::State],
        }
    }
}

impl From<&Config> for PollConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.general.interval(),
            read_timeout: config.general.read_timeout(),
            ..Default::default()
        }
    }
}

/// State guarded by the poll lock
#[derive(Debug)]
struct PollState {
    devices: DeviceCollection,
    last_sample: BTreeMap<u32, Instant>,
    /// Worker of the last tick per card, kept until it finishes
    workers: BTreeMap<u32, JoinHandle<()>>,
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Devices a worker was started for
    pub spawned: Vec<u32>,
    /// Devices read successfully
    pub updated: Vec<u32>,
    /// Devices that timed out or whose worker failed
    pub stale: Vec<u32>,
}

/// Polls a device collection and publishes snapshots
pub struct Poller {
    fs: Arc<dyn ControlFs>,
    state: Mutex<PollState>,
    slot: Arc<SnapshotSlot>,
    stop: Arc<AtomicBool>,
    ticks: AtomicU64,
    config: PollConfig,
}

impl Poller {
    /// Create a poller over a discovered collection
    pub fn new(fs: Arc<dyn ControlFs>, devices: DeviceCollection, config: PollConfig) -> Self {
        let slot = Arc::new(SnapshotSlot::new(CollectionSnapshot::new(0, devices.clone())));
        Self {
            fs,
            state: Mutex::new(PollState {
                devices,
                last_sample: BTreeMap::new(),
                workers: BTreeMap::new(),
            }),
            slot,
            stop: Arc::new(AtomicBool::new(false)),
            ticks: AtomicU64::new(0),
            config,
        }
    }

    /// Mailbox consumers read snapshots from
    pub fn snapshots(&self) -> Arc<SnapshotSlot> {
        Arc::clone(&self.slot)
    }

    /// Flag that ends `run` between ticks
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, PollState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run one tick, or return `Busy` if another tick holds the lock
    pub fn tick(&self) -> Result<TickReport, ServiceError> {
        let mut state = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                log::debug!("Poll tick skipped: previous tick still running");
                return Err(ServiceError::Busy);
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let mut report = TickReport {
            tick,
            ..Default::default()
        };

        let state = &mut *state;
        let (tx, rx) = mpsc::channel::<Device>();
        let mut pending: Vec<u32> = Vec::new();
        for device in state.devices.readable() {
            let index = device.card_index;
            if let Some(worker) = state.workers.remove(&index) {
                if !worker.is_finished() {
                    log::debug!("card{}: previous read still blocked", index);
                    state.workers.insert(index, worker);
                    report.stale.push(index);
                    continue;
                }
                if worker.join().is_err() {
                    log::warn!("card{}: poll worker panicked", index);
                }
            }
            let mut copy = device.clone();
            let fs = Arc::clone(&self.fs);
            let tx = tx.clone();
            let categories = self.config.categories.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("poll-card{}", index))
                .spawn(move || {
                    for category in categories {
                        read(fs.as_ref(), &mut copy, category);
                    }
                    // receiver may be gone after a timeout
                    let _ = tx.send(copy);
                });
            match spawned {
                Ok(worker) => {
                    state.workers.insert(index, worker);
                    report.spawned.push(index);
                    pending.push(index);
                }
                Err(e) => {
                    log::warn!("card{}: cannot start poll worker: {}", index, e);
                    report.stale.push(index);
                }
            }
        }
        drop(tx);

        let deadline = Instant::now() + self.config.read_timeout;
        while !pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(mut device) => {
                    let index = device.card_index;
                    pending.retain(|i| *i != index);
                    let now = Instant::now();
                    let previous = state.last_sample.insert(index, now);
                    integrate_energy(&mut device, previous.map(|p| now - p));
                    if let Some(slot) = state.devices.get_mut(index) {
                        *slot = device;
                    }
                    report.updated.push(index);
                }
                Err(_) => break,
            }
        }

        for index in pending {
            log::warn!("card{}: read timed out, values are stale", index);
            report.stale.push(index);
        }
        for index in &report.stale {
            if let Some(device) = state.devices.get_mut(*index) {
                device.mark_stale();
            }
            state.last_sample.remove(index);
        }
        report.stale.sort_unstable();

        self.slot
            .publish(CollectionSnapshot::new(tick, state.devices.clone()));
        Ok(report)
    }

    /// Poll until stopped, calling `on_tick` with each new snapshot
    pub fn run<F>(&self, mut on_tick: F)
    where
        F: FnMut(&CollectionSnapshot),
    {
        while !self.is_stopped() {
            match self.tick() {
                Ok(report) => {
                    if !report.stale.is_empty() {
                        log::debug!("Tick {}: stale cards {:?}", report.tick, report.stale);
                    }
                    on_tick(&self.slot.latest());
                }
                Err(e) => log::debug!("{}", e),
            }
            self.sleep_interval();
        }
        log::info!("Poller stopped after {} ticks", self.ticks.load(Ordering::SeqCst));
    }

    /// Run the poll loop on a background thread
    pub fn spawn(self: Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("poller".into())
            .spawn(move || self.run(|_| {}))
    }

    fn sleep_interval(&self) {
        let wake = Instant::now() + self.config.interval;
        while !self.is_stopped() {
            let left = wake.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            std::thread::sleep(left.min(STOP_POLL));
        }
    }

    /// Run `f` with exclusive access to the collection
    pub fn with_devices<R>(&self, f: impl FnOnce(&mut DeviceCollection) -> R) -> R {
        f(&mut self.lock().devices)
    }

    /// Plan writes for one card under the poll lock
    pub fn plan(
        &self,
        card: u32,
        desired: &DesiredState,
        force: bool,
    ) -> Result<WritePlan, AppError> {
        let state = self.lock();
        let device = state
            .devices
            .get(card)
            .ok_or(AppError::CardNotFound(card))?;
        Ok(plan_write(device, desired, force))
    }

    /// Apply a plan under the poll lock and record the applied writes
    pub fn apply(&self, plan: &WritePlan, applier: &PlanApplier) -> ApplyReport {
        let mut state = self.lock();
        let report = applier.apply(self.fs.as_ref(), plan);
        if !applier.is_dry_run() {
            if let Some(device) = state.devices.get_mut(plan.card_index) {
                apply_to_model(device, &report.applied_plan());
            }
        }
        report
    }
}

/// Accumulate energy (Wh) from the fresh power reading
fn integrate_energy(device: &mut Device, elapsed: Option<Duration>) {
    if !device.capabilities.is_readable(ParamName::Energy) {
        return;
    }
    let Some(power) = device
        .params
        .get(ParamName::Power)
        .and_then(|c| c.fresh_value())
        .and_then(ParamValue::as_f64)
    else {
        device.params.mark_stale(ParamName::Energy);
        return;
    };

    let previous = device
        .params
        .get(ParamName::Energy)
        .and_then(|c| c.value())
        .and_then(ParamValue::as_f64);
    let energy = match (previous, elapsed) {
        (Some(wh), Some(dt)) => wh + power * dt.as_secs_f64() / 3600.0,
        (Some(wh), None) => wh,
        (None, _) => 0.0,
    };
    if let Err(e) = device.params.set(ParamName::Energy, ParamValue::Float(energy)) {
        log::warn!("card{}: {}", device.card_index, e);
    }
}
