//! Per-minute rates of monotonic counters, tracked across invocations.
//!
//! Each evaluation of a rate variable compares the current counter reading
//! with the sample stored by the previous run, publishes the per-minute
//! rate, and stores the current reading for the next run.
//!
//! ```text
//! NoPriorSample ──(first observation)──┐
//!       │                              ▼
//!       └────(stored sample)──▶ PriorSampleLoaded
//!                                      │ compute
//!                                      ▼
//!                                RateComputed ──(store ok)──▶ SampleStored
//! ```
//!
//! - Elapsed time is counted in whole minutes and floored to one minute.
//! - A counter that went down since the last sample (a reset, typically a
//!   restart of the monitored process) yields a rate of zero.
//! - State file problems never fail the evaluation. They are returned as
//!   warnings and degrade the rate to a first observation.
//! - A state file that cannot be read is left untouched, so the samples of
//!   every other variable survive.

pub mod store;

use jmxeval_types::Decimal;
use tracing::{debug, trace, warn};

pub use store::{StateFile, StateStore, StateStoreError, StoreLock};

/// Variables whose name contains this marker are tracked as rates.
pub const RATE_MARKER: &str = "PerMinute";

/// Fractional digits of a published rate.
pub const RATE_SCALE: u32 = 2;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Check whether a variable is a per-minute rate of a counter.
pub fn is_rate_variable(variable: &str) -> bool {
    variable.contains(RATE_MARKER)
}

/// A counter reading and when it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub value: i64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// Where a rate computation got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateState {
    /// Nothing usable was stored for the variable.
    NoPriorSample,
    /// The previous sample (or the current one, on first observation).
    PriorSampleLoaded(Sample),
    /// Rate computed but the new sample could not be stored.
    RateComputed(Decimal),
    /// Rate computed and the new sample stored.
    SampleStored(Decimal),
}

/// Result of tracking one counter reading.
#[must_use = "a reading carries state file warnings that should be reported"]
#[derive(Debug)]
pub struct RateReading {
    /// The rate to publish.
    pub rate: Decimal,
    /// The stored sample the rate was computed against, `None` on a first
    /// observation.
    pub prior: Option<Sample>,
    /// Final state: `SampleStored` unless the store failed.
    pub state: RateState,
    /// Recoverable state file problems met along the way.
    pub warnings: Vec<StateStoreError>,
}

/// Whole minutes between two timestamps, never less than one.
pub fn elapsed_minutes(prior_ms: i64, now_ms: i64) -> i64 {
    now_ms
        .saturating_sub(prior_ms)
        .div_euclid(MILLIS_PER_MINUTE)
        .max(1)
}

/// Per-minute rate between two samples.
///
/// Rounded half-up to [`RATE_SCALE`] digits; zero when the counter went
/// down. Saturates if the rate does not fit.
pub fn compute_rate(prior: Sample, current: Sample) -> Decimal {
    if current.value < prior.value {
        return Decimal::zero(RATE_SCALE);
    }

    let delta = current.value.saturating_sub(prior.value);
    let minutes = elapsed_minutes(prior.timestamp_ms, current.timestamp_ms);

    Decimal::from_ratio(delta, minutes, RATE_SCALE)
        .unwrap_or_else(|| Decimal::new(i64::MAX, RATE_SCALE))
}

/// Converts counter readings into rates using the state file.
#[derive(Debug, Clone)]
pub struct RateTracker {
    store: StateStore,
}

impl RateTracker {
    /// Create a tracker persisting samples in `store`.
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Track a counter reading for `variable` taken at `now_ms`.
    ///
    /// Loads the previous sample, computes the rate, and stores the current
    /// reading, all under the store's lock. Nothing is stored when the file
    /// exists but could not be read.
    pub fn track(&self, variable: &str, current: i64, now_ms: i64) -> RateReading {
        let mut warnings = Vec::new();
        let current = Sample {
            value: current,
            timestamp_ms: now_ms,
        };

        let _lock = match self.store.lock() {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(variable, "{}; continuing without lock", e);
                warnings.push(e);
                None
            }
        };

        // Load
        let (mut file, writable) = match self.store.load() {
            Ok(file) => (file, true),
            Err(e) => {
                warn!(variable, "{}; not storing sample", e);
                warnings.push(e);
                (StateFile::default(), false)
            }
        };

        let stored = match file.sample(variable) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(variable, "{}", e);
                warnings.push(e);
                None
            }
        };

        let mut state = match stored {
            Some(sample) => RateState::PriorSampleLoaded(sample),
            None => RateState::NoPriorSample,
        };
        trace!(variable, ?state, "loaded");

        let prior = match state {
            RateState::PriorSampleLoaded(sample) => sample,
            // First observation: compare the reading with itself.
            _ => {
                state = RateState::PriorSampleLoaded(current);
                current
            }
        };

        // Compute
        let rate = compute_rate(prior, current);
        state = RateState::RateComputed(rate);
        debug!(
            variable,
            prior = prior.value,
            prior_ts = prior.timestamp_ms,
            current = current.value,
            %rate,
            "computed rate"
        );

        // Store
        if writable {
            file.set_sample(variable, current);
            match self.store.save(&file) {
                Ok(()) => state = RateState::SampleStored(rate),
                Err(e) => {
                    warn!(variable, "{}", e);
                    warnings.push(e);
                }
            }
        }
        trace!(variable, ?state, "done");

        RateReading {
            rate,
            prior: stored,
            state,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    const T: i64 = 1_760_000_000_000;

    fn sample(value: i64, timestamp_ms: i64) -> Sample {
        Sample {
            value,
            timestamp_ms,
        }
    }

    fn tracker(dir: &TempDir) -> RateTracker {
        RateTracker::new(StateStore::new(dir.path().join("state/statefile.txt")))
    }

    #[test]
    fn rate_variables_are_recognized_by_name() {
        assert!(is_rate_variable("RequestsPerMinute"));
        assert!(is_rate_variable("GcPerMinuteCount"));
        assert!(!is_rate_variable("HeapUsed"));
        assert!(!is_rate_variable("requestsperminute"));
    }

    #[test]
    fn elapsed_is_floored_to_one_minute() {
        assert_eq!(elapsed_minutes(T, T), 1);
        assert_eq!(elapsed_minutes(T, T + 59_999), 1);
        assert_eq!(elapsed_minutes(T, T + 120_000), 2);
        assert_eq!(elapsed_minutes(T, T + 179_999), 2);
        // Clock went backwards.
        assert_eq!(elapsed_minutes(T, T - 600_000), 1);
    }

    #[test]
    fn rate_divides_delta_by_whole_minutes() {
        let rate = compute_rate(sample(100, T - 120_000), sample(220, T));
        assert_eq!(rate.to_string(), "60.00");
    }

    #[test]
    fn rate_rounds_half_up() {
        // 1 over 8 minutes = 0.125
        let rate = compute_rate(sample(0, T - 8 * 60_000), sample(1, T));
        assert_eq!(rate.to_string(), "0.13");
        // 10 over 3 minutes = 3.333...
        let rate = compute_rate(sample(0, T - 3 * 60_000), sample(10, T));
        assert_eq!(rate.to_string(), "3.33");
    }

    #[test]
    fn counter_reset_yields_zero() {
        let rate = compute_rate(sample(300, T - 60_000), sample(50, T));
        assert!(rate.is_zero());
        assert_eq!(rate.to_string(), "0.00");
    }

    #[test]
    fn rate_matches_formula_over_a_grid() {
        for prior in [0_i64, 7, 100, 12_345] {
            for delta in [0_i64, 1, 5, 99, 1_000] {
                for minutes in [1_i64, 2, 3, 7, 60] {
                    let rate = compute_rate(
                        sample(prior, T - minutes * 60_000),
                        sample(prior + delta, T),
                    );
                    let expected = Decimal::from_ratio(delta, minutes, 2).unwrap();
                    assert_eq!(rate, expected, "prior={prior} delta={delta} minutes={minutes}");
                    assert!(rate.unscaled() >= 0);
                }
            }
        }
    }

    #[test]
    fn first_observation_yields_zero_and_stores_sample() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let reading = tracker.track("RequestsPerMinute", 500, T);
        assert!(reading.rate.is_zero());
        assert_eq!(reading.prior, None);
        assert_eq!(reading.state, RateState::SampleStored(reading.rate));
        assert!(reading.warnings.is_empty());

        let stored = tracker.store().load().unwrap();
        assert_eq!(
            stored.sample("RequestsPerMinute").unwrap(),
            Some(sample(500, T))
        );
    }

    #[test]
    fn second_observation_uses_stored_sample() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let _ = tracker.track("RequestsPerMinute", 100, T - 120_000);
        let reading = tracker.track("RequestsPerMinute", 220, T);

        assert_eq!(reading.rate.to_string(), "60.00");
        assert_eq!(reading.prior, Some(sample(100, T - 120_000)));
    }

    #[test]
    fn immediate_rerun_with_unchanged_counter_is_zero() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let _ = tracker.track("RequestsPerMinute", 100, T);
        let reading = tracker.track("RequestsPerMinute", 100, T + 5);
        assert!(reading.rate.is_zero());
        assert_eq!(reading.prior, Some(sample(100, T)));
    }

    #[test]
    fn malformed_sample_is_treated_as_first_observation() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let path = tracker.store().path().to_path_buf();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "RequestsPerMinute=lots\nRequestsPerMinute_timestamp=1\n",
        )
        .unwrap();

        let reading = tracker.track("RequestsPerMinute", 42, T);
        assert!(reading.rate.is_zero());
        assert_eq!(reading.prior, None);
        assert!(matches!(
            reading.warnings.as_slice(),
            [StateStoreError::MalformedSample { .. }]
        ));

        // Overwritten with a good sample.
        let stored = tracker.store().load().unwrap();
        assert_eq!(stored.sample("RequestsPerMinute").unwrap(), Some(sample(42, T)));
    }

    #[test]
    fn other_variables_are_preserved() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let _ = tracker.track("RequestsPerMinute", 1, T);
        let _ = tracker.track("ErrorsPerMinute", 2, T);

        let stored = tracker.store().load().unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored.sample("RequestsPerMinute").unwrap(), Some(sample(1, T)));
        assert_eq!(stored.sample("ErrorsPerMinute").unwrap(), Some(sample(2, T)));
    }

    #[test]
    fn unusable_store_still_yields_rate() {
        let dir = TempDir::new().unwrap();
        // Parent "directory" is a regular file, so nothing can be created below it.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let tracker = RateTracker::new(StateStore::new(blocker.join("statefile.txt")));

        let reading = tracker.track("RequestsPerMinute", 10, T);
        assert!(reading.rate.is_zero());
        assert_eq!(reading.state, RateState::RateComputed(reading.rate));
        assert!(reading
            .warnings
            .iter()
            .any(|w| matches!(w, StateStoreError::Read { .. })));
        assert!(reading
            .warnings
            .iter()
            .any(|w| matches!(w, StateStoreError::Lock { .. })));
    }

    #[test]
    fn stray_non_utf8_byte_keeps_other_samples() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let path = tracker.store().path().to_path_buf();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            b"#comment \xff\nErrorsPerMinute=4\nErrorsPerMinute_timestamp=1\n",
        )
        .unwrap();

        let reading = tracker.track("RequestsPerMinute", 10, 1_000_000);
        assert!(reading.warnings.is_empty(), "{:?}", reading.warnings);
        assert_eq!(reading.state, RateState::SampleStored(reading.rate));

        let stored = tracker.store().load().unwrap();
        assert_eq!(stored.sample("ErrorsPerMinute").unwrap(), Some(sample(4, 1)));
        assert_eq!(
            stored.sample("RequestsPerMinute").unwrap(),
            Some(sample(10, 1_000_000))
        );
    }

    #[test]
    fn unreadable_state_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be: reading fails, nothing is written.
        let path = dir.path().join("statefile.txt");
        fs::create_dir(&path).unwrap();
        let tracker = RateTracker::new(StateStore::new(&path));

        let reading = tracker.track("RequestsPerMinute", 10, T);
        assert!(reading.rate.is_zero());
        assert_eq!(reading.prior, None);
        assert_eq!(reading.state, RateState::RateComputed(reading.rate));
        assert!(matches!(
            reading.warnings.as_slice(),
            [StateStoreError::Read { .. }]
        ));
        assert!(path.is_dir());
    }

    #[test]
    fn concurrent_trackers_do_not_lose_entries() {
        const THREADS: i64 = 8;
        const ROUNDS: i64 = 25;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/statefile.txt");

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let path = path.clone();
                thread::spawn(move || {
                    // Each thread opens the file on its own, like separate runs.
                    let tracker = RateTracker::new(StateStore::new(&path));
                    let own = format!("Thread{}PerMinute", t);
                    for round in 0..ROUNDS {
                        let now = T + round * 60_000;
                        let reading = tracker.track(&own, round, now);
                        assert!(reading.warnings.is_empty(), "{:?}", reading.warnings);
                        if round > 0 {
                            // The previous round's sample was not overwritten.
                            assert_eq!(reading.prior, Some(sample(round - 1, now - 60_000)));
                            assert_eq!(reading.rate.to_string(), "1.00");
                        }

                        let shared = tracker.track("SharedPerMinute", t * ROUNDS + round, now);
                        assert!(shared.warnings.is_empty(), "{:?}", shared.warnings);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stored = StateFile::parse(&fs::read_to_string(&path).unwrap());
        assert_eq!(stored.len(), 2 * (THREADS as usize + 1));
        for t in 0..THREADS {
            assert_eq!(
                stored.sample(&format!("Thread{}PerMinute", t)).unwrap(),
                Some(sample(ROUNDS - 1, T + (ROUNDS - 1) * 60_000))
            );
        }
        assert!(stored.sample("SharedPerMinute").unwrap().is_some());
    }
}
