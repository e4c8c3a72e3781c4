//! The measurement workflow state machine.
//!
//! Guides a session through an optional rest countdown, three readings with
//! mandatory cooldowns between them, validation, averaging and a single
//! durable write of the result. All transitions happen in reaction to
//! discrete events: a user intent or a 1-second tick.

use crate::config::ProtocolConfig;
use crate::store::RecordStore;
use crate::timer::{Clock, TimerEvent, TimerService, TimerSlot, TimerStore};
use crate::types::{Field, Inputs, SavedRecord};
use crate::validate::validate;
use crate::{Measurement, Result};

/// One discrete phase of the workflow
///
/// Each variant carries exactly the data valid in that phase, so states like
/// "cooldown while done" are unrepresentable.
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    /// Asking whether the user already rested five minutes
    PrepQuestion,
    /// Rest countdown running
    PrepWait { remaining: u32 },
    /// Collecting reading `index` (0-2); `cooldown > 0` means inputs are
    /// locked until the inter-measurement wait elapses
    Measuring { index: usize, cooldown: u32 },
    /// Session complete; the persisted average
    Done { record: SavedRecord },
}

/// The measurement session state machine
///
/// Owns the countdown service and the record store; the presentation layer
/// feeds it intents and a 1 Hz tick and renders the state it exposes.
pub struct Workflow<C: Clock, T: TimerStore, R: RecordStore> {
    stage: Stage,
    measurements: Vec<Measurement>,
    inputs: Inputs,
    error: Option<String>,
    status: Option<String>,
    /// Average retained after a failed write so a re-triggered save can
    /// re-attempt the same record
    pending: Option<SavedRecord>,
    timers: TimerService<C, T>,
    store: R,
    prep_seconds: u32,
    cooldown_seconds: u32,
}

impl<C: Clock, T: TimerStore, R: RecordStore> Workflow<C, T, R> {
    pub fn new(timers: TimerService<C, T>, store: R, protocol: &ProtocolConfig) -> Self {
        Self {
            stage: Stage::PrepQuestion,
            measurements: Vec::new(),
            inputs: Inputs::default(),
            error: None,
            status: None,
            pending: None,
            timers,
            store,
            prep_seconds: protocol.prep_seconds,
            cooldown_seconds: protocol.cooldown_seconds,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Readings accepted so far in this session
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// A computed average is waiting for a retried write
    pub fn has_pending_save(&self) -> bool {
        self.pending.is_some()
    }

    /// Pick up a rest countdown persisted by an earlier process
    ///
    /// Measurements are transient, so a session interrupted mid-cooldown
    /// starts over; any stale cooldown anchor is discarded.
    pub fn resume(&mut self) -> Result<()> {
        self.timers.discard(TimerSlot::Cooldown)?;
        if self.stage == Stage::PrepQuestion {
            if let Some(remaining) = self.timers.resume(TimerSlot::Prep)? {
                self.stage = Stage::PrepWait { remaining };
            }
        }
        Ok(())
    }

    /// User confirmed they already rested; measurements begin immediately
    pub fn confirm_rested(&mut self) {
        if self.stage == Stage::PrepQuestion {
            self.begin_session();
        }
    }

    /// User asked for the rest countdown before measuring
    pub fn start_rest(&mut self) -> Result<()> {
        if self.stage == Stage::PrepQuestion {
            self.timers.start(TimerSlot::Prep, self.prep_seconds)?;
            self.stage = Stage::PrepWait {
                remaining: self.prep_seconds,
            };
        }
        Ok(())
    }

    /// Update one input buffer; ignored while inputs are locked
    pub fn set_field(&mut self, field: Field, value: String) {
        let Stage::Measuring { cooldown: 0, .. } = &self.stage else {
            return;
        };
        self.inputs.set(field, value);

        // A correction that makes the form valid clears the error eagerly
        if self.error.is_some()
            && self.inputs.all_filled()
            && validate(&self.inputs.to_measurement()).is_none()
        {
            self.error = None;
        }
    }

    /// The save control is live: editable stage, all fields present, or a
    /// failed write waiting to be retried
    pub fn can_save(&self) -> bool {
        match self.stage {
            Stage::Measuring { cooldown: 0, .. } => {
                self.pending.is_some() || self.inputs.all_filled()
            }
            _ => false,
        }
    }

    /// Accept the current reading, or retry a failed final write
    pub fn save_measurement(&mut self) -> Result<()> {
        let (index, cooldown) = match &self.stage {
            Stage::Measuring { index, cooldown } => (*index, *cooldown),
            _ => return Ok(()),
        };
        if cooldown > 0 {
            return Ok(());
        }

        // The average was already computed; only the write is outstanding
        if let Some(record) = self.pending.take() {
            self.persist(record);
            return Ok(());
        }

        if !self.inputs.all_filled() {
            return Ok(());
        }

        self.error = None;
        let measurement = self.inputs.to_measurement();
        if let Some(message) = validate(&measurement) {
            self.error = Some(format!("✗ Invalid values: {}", message));
            return Ok(());
        }

        self.measurements.push(measurement);
        self.status = None;
        tracing::info!(
            "Accepted reading {} of 3: {}/{} pulse {}",
            index + 1,
            measurement.systolic,
            measurement.diastolic,
            measurement.pulse
        );

        if index < 2 {
            self.timers.start(TimerSlot::Cooldown, self.cooldown_seconds)?;
            self.stage = Stage::Measuring {
                index,
                cooldown: self.cooldown_seconds,
            };
        } else {
            // Third reading: no cooldown, average and persist immediately
            let record = SavedRecord::average_of(&self.measurements, self.timers.now());
            self.persist(record);
        }
        Ok(())
    }

    /// Advance countdowns by polling the active slot; call once per second
    pub fn tick(&mut self) -> Result<()> {
        match self.stage {
            Stage::PrepWait { .. } => match self.timers.poll(TimerSlot::Prep)? {
                Some(TimerEvent::Tick(remaining)) => {
                    self.stage = Stage::PrepWait { remaining };
                }
                Some(TimerEvent::Expired) => self.begin_session(),
                None => {}
            },
            Stage::Measuring { index, cooldown } if cooldown > 0 => {
                match self.timers.poll(TimerSlot::Cooldown)? {
                    Some(TimerEvent::Tick(remaining)) => {
                        self.stage = Stage::Measuring {
                            index,
                            cooldown: remaining,
                        };
                    }
                    Some(TimerEvent::Expired) => {
                        // Unlock for the next reading
                        self.inputs.clear();
                        self.stage = Stage::Measuring {
                            index: index + 1,
                            cooldown: 0,
                        };
                    }
                    None => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Stop all countdowns; durable anchors stay behind for a later resume
    pub fn teardown(&mut self) {
        self.timers.cancel_all();
    }

    fn begin_session(&mut self) {
        self.measurements.clear();
        self.inputs.clear();
        self.error = None;
        self.stage = Stage::Measuring {
            index: 0,
            cooldown: 0,
        };
    }

    /// At-most-once durable write: success finishes the session, failure is
    /// surfaced and the record kept for a user-triggered retry
    fn persist(&mut self, record: SavedRecord) {
        match self.store.add_record(&record) {
            Ok(id) => {
                let saved = SavedRecord {
                    id: Some(id),
                    ..record
                };
                tracing::info!("Saved record {} ({}/{} pulse {})", id, saved.systolic, saved.diastolic, saved.pulse);
                self.inputs.clear();
                self.status = Some("✓ Record saved to history".into());
                self.stage = Stage::Done { record: saved };
            }
            Err(e) => {
                tracing::warn!("Record write failed: {}", e);
                self.status = Some(format!("✗ Failed to save record: {}", e));
                self.pending = Some(record);
            }
        }
    }
}
