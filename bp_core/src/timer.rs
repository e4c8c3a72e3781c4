//! Wall-clock-anchored countdown timers.
//!
//! The moment a countdown starts, its absolute end time is persisted in a
//! durable key-value file. Every poll recomputes the remaining seconds from
//! that anchor instead of decrementing a counter, so a countdown is immune to
//! tick drift, missed ticks and process restarts. The rest timer and the
//! inter-measurement cooldown are separate slots in the same store and never
//! run simultaneously.

use crate::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Source of wall-clock time, injectable for tests
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The two countdown slots of the measurement protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerSlot {
    /// Five-minute rest before the first reading
    Prep,
    /// Mandatory wait between successive readings
    Cooldown,
}

impl TimerSlot {
    /// Durable key for this slot's persisted end time
    fn key(self) -> &'static str {
        match self {
            TimerSlot::Prep => "prep_end_time",
            TimerSlot::Cooldown => "cooldown_end_time",
        }
    }

    fn index(self) -> usize {
        match self {
            TimerSlot::Prep => 0,
            TimerSlot::Cooldown => 1,
        }
    }
}

/// Durable key-value state for persisted countdown anchors
///
/// End times are absolute epoch milliseconds. Exactly one writer (the active
/// timer service) touches these keys.
pub trait TimerStore {
    fn load(&self, slot: TimerSlot) -> Result<Option<i64>>;
    fn save(&mut self, slot: TimerSlot, end_ms: i64) -> Result<()>;
    fn clear(&mut self, slot: TimerSlot) -> Result<()>;
}

/// File-backed timer store with locking and atomic replacement
///
/// The file holds a small JSON map of slot key to end time. A corrupted or
/// missing file reads as empty; writes go through a locked temp file that is
/// renamed over the original.
pub struct FileTimerStore {
    path: PathBuf,
}

impl FileTimerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> Result<HashMap<String, i64>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read_result = reader.read_to_string(&mut contents);
        file.unlock()?;
        read_result?;

        match serde_json::from_str(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse timer state {:?}: {}. Treating as empty.",
                    self.path,
                    e
                );
                Ok(HashMap::new())
            }
        }
    }

    fn write_map(&self, map: &HashMap<String, i64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "timer state path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(map)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path)
            .map_err(|e| crate::Error::Io(e.error))?;
        Ok(())
    }
}

impl TimerStore for FileTimerStore {
    fn load(&self, slot: TimerSlot) -> Result<Option<i64>> {
        Ok(self.read_map()?.get(slot.key()).copied())
    }

    fn save(&mut self, slot: TimerSlot, end_ms: i64) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(slot.key().to_string(), end_ms);
        self.write_map(&map)
    }

    fn clear(&mut self, slot: TimerSlot) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(slot.key()).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// What a poll of an armed slot observed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// Countdown still running, with remaining whole seconds
    Tick(u32),
    /// Countdown reached zero; reported exactly once per started countdown
    Expired,
}

/// Countdown coordinator over a clock and a durable anchor store
///
/// Single-threaded and poll-driven: the owner calls [`TimerService::poll`]
/// once per second for the slot it cares about and reacts to the returned
/// event. Starting a slot that is already running replaces the previous
/// countdown, so duplicate tickers cannot exist.
pub struct TimerService<C: Clock, S: TimerStore> {
    clock: C,
    store: S,
    armed: [bool; 2],
}

impl<C: Clock, S: TimerStore> TimerService<C, S> {
    pub fn new(clock: C, store: S) -> Self {
        Self {
            clock,
            store,
            armed: [false; 2],
        }
    }

    /// Current wall-clock time, from the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Start (or restart) a countdown for a slot
    ///
    /// Persists `now + duration` as the slot's absolute end time before the
    /// slot is considered running.
    pub fn start(&mut self, slot: TimerSlot, duration_secs: u32) -> Result<()> {
        let end_ms = self.clock.now().timestamp_millis() + i64::from(duration_secs) * 1000;
        self.store.save(slot, end_ms)?;
        self.armed[slot.index()] = true;
        tracing::debug!("Started {:?} countdown of {}s", slot, duration_secs);
        Ok(())
    }

    /// Re-arm a slot from a persisted anchor after a restart
    ///
    /// Returns the remaining seconds if the anchor is still in the future.
    /// An absent or already-elapsed anchor yields `None` and is cleared.
    pub fn resume(&mut self, slot: TimerSlot) -> Result<Option<u32>> {
        match self.store.load(slot)? {
            Some(end_ms) => {
                let remaining = remaining_secs(end_ms, self.clock.now().timestamp_millis());
                if remaining > 0 {
                    self.armed[slot.index()] = true;
                    tracing::info!("Resumed {:?} countdown with {}s left", slot, remaining);
                    Ok(Some(remaining))
                } else {
                    self.store.clear(slot)?;
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    pub fn is_active(&self, slot: TimerSlot) -> bool {
        self.armed[slot.index()]
    }

    /// Remaining whole seconds for a slot, zero when not running
    pub fn remaining(&self, slot: TimerSlot) -> Result<u32> {
        if !self.armed[slot.index()] {
            return Ok(0);
        }
        match self.store.load(slot)? {
            Some(end_ms) => Ok(remaining_secs(end_ms, self.clock.now().timestamp_millis())),
            None => Ok(0),
        }
    }

    /// Poll an armed slot, recomputing remaining time from the stored anchor
    ///
    /// Expiry disarms the slot and removes its anchor, so it fires exactly
    /// once no matter how many ticks were missed.
    pub fn poll(&mut self, slot: TimerSlot) -> Result<Option<TimerEvent>> {
        if !self.armed[slot.index()] {
            return Ok(None);
        }

        let Some(end_ms) = self.store.load(slot)? else {
            self.armed[slot.index()] = false;
            return Ok(None);
        };

        let remaining = remaining_secs(end_ms, self.clock.now().timestamp_millis());
        if remaining == 0 {
            self.armed[slot.index()] = false;
            self.store.clear(slot)?;
            tracing::debug!("{:?} countdown expired", slot);
            Ok(Some(TimerEvent::Expired))
        } else {
            Ok(Some(TimerEvent::Tick(remaining)))
        }
    }

    /// Stop ticking a slot without touching its durable anchor
    ///
    /// The anchor stays behind so a later [`TimerService::resume`] can pick
    /// the countdown back up.
    pub fn cancel(&mut self, slot: TimerSlot) {
        self.armed[slot.index()] = false;
    }

    /// Stop ticking a slot and remove its durable anchor
    pub fn discard(&mut self, slot: TimerSlot) -> Result<()> {
        self.armed[slot.index()] = false;
        self.store.clear(slot)
    }

    /// Cancel all slots; used on teardown so no ticker outlives its owner
    pub fn cancel_all(&mut self) {
        self.armed = [false; 2];
    }
}

fn remaining_secs(end_ms: i64, now_ms: i64) -> u32 {
    // ceil((end - now) / 1000), clamped at zero
    let delta = (end_ms - now_ms).max(0);
    ((delta + 999) / 1000) as u32
}
