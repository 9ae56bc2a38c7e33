//! Frontend logger: the single writer of one configuration's log.

use crate::error::LogResult;
use crate::logging::backend::BackendLogger;
use crate::logging::destination::LogDestination;
use crate::logging::mode::LoggingMode;
use crate::logging::recovery::{RecoveryStats, ReplayTarget, Replayer};
use crate::logging::slot::Slot;
use crate::wal::encode_frame_into;
use std::sync::Arc;
use std::time::Duration;
use tidelog_storage::LogDevice;
use tracing::{debug, error, info, warn};

/// Owns the log device from STANDBY to SLEEP and runs on its own thread.
pub(crate) struct FrontendLogger {
    slot: Arc<Slot>,
    destination: LogDestination,
    target: Arc<dyn ReplayTarget>,
    flush_interval: Duration,
    batch: Vec<u8>,
}

/// What the logging loop does after a collection round.
enum Round {
    Continue,
    Finished,
    Abandoned,
}

impl FrontendLogger {
    pub(crate) fn new(
        slot: Arc<Slot>,
        destination: LogDestination,
        target: Arc<dyn ReplayTarget>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            slot,
            destination,
            target,
            flush_interval,
            batch: Vec::new(),
        }
    }

    /// Thread body.
    pub(crate) fn run(mut self) {
        let logging_type = self.slot.logging_type;
        self.slot.set_mode(LoggingMode::Standby);

        let mut device = match self.destination.open() {
            Ok(device) => device,
            Err(e) => {
                error!(
                    %logging_type,
                    destination = %self.destination.describe(),
                    error = %e,
                    "failed to open log, staying in standby"
                );
                self.slot.halt();
                return;
            }
        };
        info!(
            %logging_type,
            destination = %self.destination.describe(),
            size = device.len(),
            "log opened"
        );

        let Some(redo_all) = self.wait_for_recovery_request() else {
            debug!(%logging_type, "abandoned in standby");
            return;
        };

        self.slot.set_mode(LoggingMode::Recovery);
        match self.recover(device.as_mut(), redo_all) {
            Ok(stats) => {
                self.target.finish_replay(&stats);
                self.slot.lock().last_recovery = Some(stats);
            }
            Err(e) => {
                error!(%logging_type, error = %e, "recovery failed, staying in recovery");
                self.slot.halt();
                return;
            }
        }
        self.slot.set_mode(LoggingMode::Logging);

        loop {
            match self.round(device.as_mut()) {
                Ok(Round::Continue) => {}
                Ok(Round::Finished) => break,
                Ok(Round::Abandoned) => {
                    debug!(%logging_type, "abandoned while logging");
                    return;
                }
                Err(e) => {
                    error!(%logging_type, error = %e, "log write failed, frontend logger halted");
                    self.slot.halt();
                    return;
                }
            }
        }

        self.slot.lock().loggers.clear();
        self.slot.set_mode(LoggingMode::Sleep);
    }

    /// Blocks in STANDBY until recovery is requested. Returns the redo-all
    /// flag, or `None` if the manager went away first.
    fn wait_for_recovery_request(&self) -> Option<bool> {
        let mut state = self.slot.lock();
        loop {
            if state.abandoned {
                return None;
            }
            if state.recovery_requested {
                return Some(state.redo_all);
            }
            self.slot.cond.wait(&mut state);
        }
    }

    fn recover(&self, device: &mut dyn LogDevice, redo_all: bool) -> LogResult<RecoveryStats> {
        let stats = Replayer::new()
            .redo_all(redo_all)
            .replay(&*device, self.target.as_ref())?;

        if stats.truncated_bytes > 0 {
            warn!(
                logging_type = %self.slot.logging_type,
                offset = stats.valid_end,
                bytes = stats.truncated_bytes,
                "truncating torn log tail"
            );
            device.truncate(stats.valid_end)?;
        }
        Ok(stats)
    }

    /// One collection round: wait for the interval or a request, drain every
    /// backend logger, write and sync.
    fn round(&mut self, device: &mut dyn LogDevice) -> LogResult<Round> {
        let (loggers, terminating) = {
            let mut state = self.slot.lock();
            if !state.flush_requested && !state.abandoned && state.mode == LoggingMode::Logging {
                self.slot.cond.wait_for(&mut state, self.flush_interval);
            }
            if state.abandoned {
                return Ok(Round::Abandoned);
            }
            state.flush_requested = false;
            (state.drain_targets(), state.mode == LoggingMode::Terminate)
        };

        if let Err(e) = self.flush(device, &loggers, terminating) {
            // Retired loggers are no longer reachable through the slot.
            for logger in &loggers {
                logger.fail();
            }
            return Err(e);
        }

        if terminating {
            info!(
                logging_type = %self.slot.logging_type,
                loggers = loggers.len(),
                "final drain complete"
            );
            Ok(Round::Finished)
        } else {
            Ok(Round::Continue)
        }
    }

    fn flush(
        &mut self,
        device: &mut dyn LogDevice,
        loggers: &[Arc<BackendLogger>],
        closing: bool,
    ) -> LogResult<()> {
        self.batch.clear();
        let mut drained = Vec::with_capacity(loggers.len());
        let mut records = 0usize;

        for logger in loggers {
            let (collected, upto) = if closing {
                logger.close_and_collect()
            } else {
                logger.collect()
            };
            if collected.is_empty() {
                continue;
            }
            records += collected.len();
            for record in &collected {
                encode_frame_into(record, &mut self.batch)?;
            }
            drained.push((logger, upto));
        }

        if self.batch.is_empty() {
            return Ok(());
        }

        device.append(&self.batch)?;
        device.sync()?;
        debug!(
            logging_type = %self.slot.logging_type,
            records,
            bytes = self.batch.len(),
            "flushed batch"
        );

        for (logger, upto) in drained {
            logger.mark_flushed(upto);
        }
        Ok(())
    }
}
