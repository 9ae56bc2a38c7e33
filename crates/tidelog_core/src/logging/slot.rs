//! Shared state of one logging configuration.

use crate::config::LoggingType;
use crate::logging::backend::BackendLogger;
use crate::logging::destination::LogDestination;
use crate::logging::mode::LoggingMode;
use crate::logging::recovery::RecoveryStats;
use crate::types::WorkerId;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Everything guarded by the slot lock.
#[derive(Default)]
pub(crate) struct SlotState {
    pub(crate) mode: LoggingMode,
    pub(crate) loggers: HashMap<WorkerId, Arc<BackendLogger>>,
    /// Removed loggers that still had unflushed records.
    pub(crate) retired: Vec<Arc<BackendLogger>>,
    pub(crate) recovery_requested: bool,
    pub(crate) flush_requested: bool,
    /// The frontend logger stopped on an error and will not advance.
    pub(crate) halted: bool,
    /// The log manager was dropped without `end_logging`.
    pub(crate) abandoned: bool,
    pub(crate) redo_all: bool,
    pub(crate) destination: Option<LogDestination>,
    pub(crate) last_recovery: Option<RecoveryStats>,
}

impl SlotState {
    /// Clears per-run state before a new frontend logger starts.
    fn reset_for_run(&mut self) {
        self.mode = LoggingMode::Invalid;
        self.loggers.clear();
        self.retired.clear();
        self.recovery_requested = false;
        self.flush_requested = false;
        self.halted = false;
        self.abandoned = false;
        self.redo_all = false;
        self.last_recovery = None;
    }

    /// Every logger the frontend must drain: registered and retired.
    pub(crate) fn drain_targets(&mut self) -> Vec<Arc<BackendLogger>> {
        let mut loggers: Vec<_> = self.loggers.values().cloned().collect();
        loggers.append(&mut self.retired);
        loggers
    }
}

/// One logging configuration: mode, logger set and frontend thread.
///
/// Mode and logger set share one lock; `cond` is notified on every mode
/// change, flush request and halt.
pub(crate) struct Slot {
    pub(crate) logging_type: LoggingType,
    pub(crate) state: Mutex<SlotState>,
    pub(crate) cond: Condvar,
    pub(crate) frontend: Mutex<Option<JoinHandle<()>>>,
}

impl Slot {
    pub(crate) fn new(logging_type: LoggingType) -> Self {
        Self {
            logging_type,
            state: Mutex::new(SlotState::default()),
            cond: Condvar::new(),
            frontend: Mutex::new(None),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock()
    }

    pub(crate) fn mode(&self) -> LoggingMode {
        self.state.lock().mode
    }

    pub(crate) fn reset_for_run(&self) {
        self.state.lock().reset_for_run();
    }

    /// Moves to `next` and wakes every waiter.
    pub(crate) fn set_mode(&self, next: LoggingMode) {
        let mut state = self.state.lock();
        debug_assert!(
            state.mode.can_advance_to(next),
            "illegal mode change {} -> {}",
            state.mode,
            next
        );
        info!(
            logging_type = %self.logging_type,
            from = %state.mode,
            to = %next,
            "logging mode changed"
        );
        state.mode = next;
        self.cond.notify_all();
    }

    /// Asks the frontend logger to run a collection round now. Returns
    /// `false` if it has halted and no round will run.
    pub(crate) fn request_flush(&self) -> bool {
        let mut state = self.state.lock();
        if state.halted {
            return false;
        }
        state.flush_requested = true;
        self.cond.notify_all();
        true
    }

    /// Marks the frontend halted and wakes every mode and flush waiter.
    pub(crate) fn halt(&self) {
        let loggers = {
            let mut state = self.state.lock();
            state.halted = true;
            self.cond.notify_all();
            state.drain_targets()
        };
        debug!(logging_type = %self.logging_type, loggers = loggers.len(), "failing backend loggers");
        for logger in loggers {
            logger.fail();
        }
    }
}
