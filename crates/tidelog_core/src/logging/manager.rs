//! Log manager: per-configuration mode state machine and frontend threads.

use crate::config::{LoggingConfig, LoggingType};
use crate::logging::backend::BackendLogger;
use crate::logging::destination::LogDestination;
use crate::logging::frontend::FrontendLogger;
use crate::logging::mode::LoggingMode;
use crate::logging::recovery::{RecoveryStats, ReplayTarget};
use crate::logging::slot::Slot;
use crate::types::WorkerId;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Coordinates logging for every [`LoggingType`].
///
/// Each configuration has its own slot: a mode, the set of backend loggers
/// keyed by worker, and at most one frontend logger thread. Mode changes are
/// signalled through a condition variable bound to the slot.
///
/// Dropping the manager without [`LogManager::end_logging`] stops the
/// frontend threads without a final drain, which is how tests model a crash.
pub struct LogManager {
    config: LoggingConfig,
    target: Arc<dyn ReplayTarget>,
    slots: [Arc<Slot>; 2],
}

impl LogManager {
    /// Creates a manager whose frontend loggers replay into `target`.
    pub fn new(config: LoggingConfig, target: Arc<dyn ReplayTarget>) -> Self {
        Self {
            config,
            target,
            slots: LoggingType::ALL.map(|t| Arc::new(Slot::new(t))),
        }
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    fn slot(&self, logging_type: LoggingType) -> &Arc<Slot> {
        match logging_type {
            LoggingType::Aries => &self.slots[0],
            LoggingType::Peloton => &self.slots[1],
        }
    }

    /// Overrides where `logging_type` writes its log. Takes effect at the
    /// next [`Self::start_standby_mode`].
    pub fn set_log_destination(&self, logging_type: LoggingType, destination: LogDestination) {
        self.slot(logging_type).lock().destination = Some(destination);
    }

    /// Launches the frontend logger of `logging_type`.
    ///
    /// Returns once the thread is spawned; it moves the mode to STANDBY
    /// and opens the log. Returns `false` without changing anything if a
    /// frontend logger for this type is still running, or if the thread
    /// cannot be spawned.
    pub fn start_standby_mode(&self, logging_type: LoggingType) -> bool {
        let slot = self.slot(logging_type);
        let mut frontend = slot.frontend.lock();

        if let Some(handle) = frontend.as_ref() {
            if !handle.is_finished() {
                warn!(%logging_type, "frontend logger already running");
                return false;
            }
        }
        if let Some(handle) = frontend.take() {
            if handle.join().is_err() {
                error!(%logging_type, "previous frontend logger panicked");
            }
        }

        slot.reset_for_run();
        let destination = slot
            .lock()
            .destination
            .clone()
            .unwrap_or_else(|| LogDestination::File(self.config.log_path(logging_type)));

        let logger = FrontendLogger::new(
            Arc::clone(slot),
            destination,
            Arc::clone(&self.target),
            self.config.flush_interval,
        );
        let spawned = thread::Builder::new()
            .name(format!("tidelog-frontend-{logging_type}"))
            .spawn(move || logger.run());

        match spawned {
            Ok(handle) => {
                info!(%logging_type, "frontend logger started");
                *frontend = Some(handle);
                true
            }
            Err(e) => {
                error!(%logging_type, error = %e, "failed to spawn frontend logger");
                false
            }
        }
    }

    /// Waits until `logging_type` has reached `target` or a later mode.
    ///
    /// With `blocking == false` the current mode is checked once. A blocking
    /// wait returns `false` if the frontend logger halts before reaching
    /// `target`.
    pub fn wait_for_mode(&self, target: LoggingMode, blocking: bool, logging_type: LoggingType) -> bool {
        let slot = self.slot(logging_type);
        let mut state = slot.lock();

        while state.mode < target {
            if !blocking || state.halted || state.abandoned {
                return false;
            }
            slot.cond.wait(&mut state);
        }
        true
    }

    /// Lets the frontend logger leave STANDBY and replay its log.
    ///
    /// Does nothing unless the mode is STANDBY.
    pub fn start_recovery_mode(&self, logging_type: LoggingType) {
        let slot = self.slot(logging_type);
        let mut state = slot.lock();

        if state.mode != LoggingMode::Standby {
            debug!(%logging_type, mode = %state.mode, "recovery not started, not in standby");
            return;
        }
        state.recovery_requested = true;
        slot.cond.notify_all();
    }

    /// Stops logging gracefully.
    ///
    /// Moves LOGGING to TERMINATE, waits (at most `shutdown_timeout`) for the
    /// frontend logger to drain every backend logger and reach SLEEP, then
    /// joins it. Returns `false` if the mode was not LOGGING, the frontend
    /// logger halted, or the wait timed out.
    pub fn end_logging(&self, logging_type: LoggingType) -> bool {
        let slot = self.slot(logging_type);
        let deadline = Instant::now() + self.config.shutdown_timeout;

        {
            let mut state = slot.lock();
            if state.mode != LoggingMode::Logging || state.halted {
                warn!(%logging_type, mode = %state.mode, halted = state.halted, "cannot end logging");
                return false;
            }
            state.mode = LoggingMode::Terminate;
            info!(%logging_type, from = %LoggingMode::Logging, to = %LoggingMode::Terminate, "logging mode changed");
            slot.cond.notify_all();

            while state.mode < LoggingMode::Sleep {
                if state.halted {
                    return false;
                }
                if slot.cond.wait_until(&mut state, deadline).timed_out() && state.mode < LoggingMode::Sleep {
                    error!(%logging_type, "frontend logger did not finish before the shutdown timeout");
                    return false;
                }
            }
        }

        if let Some(handle) = slot.frontend.lock().take() {
            if handle.join().is_err() {
                error!(%logging_type, "frontend logger panicked");
                return false;
            }
        }
        true
    }

    /// Number of frontend logger threads still running.
    #[must_use]
    pub fn active_frontend_logger_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| {
                slot.frontend
                    .lock()
                    .as_ref()
                    .is_some_and(|handle| !handle.is_finished())
            })
            .count()
    }

    /// Returns the calling worker's backend logger, registering it on first
    /// use.
    pub fn get_backend_logger(&self, logging_type: LoggingType) -> Arc<BackendLogger> {
        let slot = self.slot(logging_type);
        let worker = WorkerId::current();
        let mut state = slot.lock();

        Arc::clone(state.loggers.entry(worker).or_insert_with(|| {
            debug!(%logging_type, ?worker, "backend logger registered");
            Arc::new(BackendLogger::new(logging_type, worker, Arc::downgrade(slot)))
        }))
    }

    /// Unregisters `logger`. Records it still holds are flushed by the next
    /// collection round.
    pub fn remove_backend_logger(&self, logger: &Arc<BackendLogger>) {
        let slot = self.slot(logger.logging_type());
        let mut state = slot.lock();

        let registered = state
            .loggers
            .get(&logger.worker())
            .is_some_and(|current| Arc::ptr_eq(current, logger));
        if !registered {
            return;
        }
        state.loggers.remove(&logger.worker());

        if state.mode == LoggingMode::Logging && logger.has_unflushed() {
            debug!(logging_type = %logger.logging_type(), "retiring backend logger with unflushed records");
            state.retired.push(Arc::clone(logger));
        }
    }

    /// Whether `logging_type` currently accepts records.
    #[must_use]
    pub fn is_in_logging_mode(&self, logging_type: LoggingType) -> bool {
        self.mode(logging_type) == LoggingMode::Logging
    }

    /// Current mode of `logging_type`.
    #[must_use]
    pub fn mode(&self, logging_type: LoggingType) -> LoggingMode {
        self.slot(logging_type).mode()
    }

    /// Statistics of the last completed replay of `logging_type` in the
    /// current run.
    #[must_use]
    pub fn last_recovery(&self, logging_type: LoggingType) -> Option<RecoveryStats> {
        self.slot(logging_type).lock().last_recovery.clone()
    }

    /// Makes the next recovery apply every tuple record, committed or not.
    ///
    /// Starting a frontend logger clears the flag, so set it after
    /// [`Self::start_standby_mode`].
    #[cfg(any(test, feature = "testing"))]
    pub fn set_test_redo_all_logs(&self, logging_type: LoggingType, redo_all: bool) {
        self.slot(logging_type).lock().redo_all = redo_all;
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        for slot in &self.slots {
            {
                let mut state = slot.lock();
                state.abandoned = true;
                slot.cond.notify_all();
            }
            if let Some(handle) = slot.frontend.lock().take() {
                let _ = handle.join();
            }
            let loggers = slot.lock().drain_targets();
            for logger in loggers {
                logger.fail();
            }
        }
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("config", &self.config)
            .field("aries", &self.mode(LoggingType::Aries))
            .field("peloton", &self.mode(LoggingType::Peloton))
            .finish()
    }
}
