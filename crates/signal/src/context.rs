use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use common::{Candle, IndicatorSnapshot, Timeframe};

/// Cached latest snapshot per confirming timeframe.
///
/// Higher-timeframe values are cached snapshots read, not recomputed, at the
/// primary timeframe's bar close; a missing, unformed, or stale entry
/// suppresses the signal rather than substituting a default.
#[derive(Debug, Default)]
pub struct HigherTfCache {
    entries: HashMap<Timeframe, CachedSnapshot>,
}

#[derive(Debug)]
struct CachedSnapshot {
    snapshot: IndicatorSnapshot,
    bar_close: DateTime<Utc>,
}

/// A cached bar is considered stale once this many bar durations have
/// passed since its close (the feed has skipped at least one bar).
const STALE_AFTER_BARS: i32 = 2;

impl HigherTfCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest snapshot for a confirming timeframe.
    pub fn update(&mut self, timeframe: Timeframe, snapshot: IndicatorSnapshot, bar_close: DateTime<Utc>) {
        self.entries.insert(timeframe, CachedSnapshot { snapshot, bar_close });
    }

    /// Fetch the cached snapshot for `timeframe` if it is formed and not
    /// stale as of `now` (the primary bar's close time).
    pub fn fresh(&self, timeframe: Timeframe, now: DateTime<Utc>) -> Option<&IndicatorSnapshot> {
        let entry = self.entries.get(&timeframe)?;
        if !entry.snapshot.formed {
            return None;
        }
        let max_age: Duration = timeframe.duration() * STALE_AFTER_BARS;
        if now - entry.bar_close > max_age {
            return None;
        }
        Some(&entry.snapshot)
    }
}

/// The finite, immutable history prefix a detector sees at one primary-
/// timeframe bar close. `bars` and `indicators` are parallel, oldest first;
/// the last element is the bar that just finished.
pub struct DetectorContext<'a> {
    pub bars: &'a [Candle],
    pub indicators: &'a [IndicatorSnapshot],
    pub higher_tf: &'a HigherTfCache,
    /// Close time of the bar that triggered this evaluation.
    pub now: DateTime<Utc>,
    /// Instrument pip size, for deviation filters expressed in points.
    pub pip: f64,
}

impl<'a> DetectorContext<'a> {
    /// Index of the decision bar after applying the signal-bar delay, or
    /// `None` when the history is too short. `signal_bar = 0` is the bar
    /// that just finished, `1` the one before it.
    pub fn decision_index(&self, signal_bar: usize) -> Option<usize> {
        self.bars.len().checked_sub(1 + signal_bar)
    }
}
