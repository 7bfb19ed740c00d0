use tracing::{debug, warn};

use super::bus::{Notification, Observer};

/// Running score for the current attempt; only moved by SCORE_CHANGE deltas.
#[derive(Debug, Default)]
pub struct ScoreLedger {
    total: i64,
}

impl ScoreLedger {
    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn reset(&mut self) {
        self.total = 0;
    }
}

impl Observer for ScoreLedger {
    fn on_notify(&mut self, notification: &Notification, _follow_ups: &mut Vec<Notification>) {
        if let Notification::ScoreChange(delta) = notification {
            self.total = self.total.saturating_add(*delta);
            debug!(delta, total = self.total, "score_changed");
        }
    }
}

/// Success bookkeeping for one attempt at one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttemptProgress {
    successes: u32,
    success_criteria: u32,
    maximum_score: u32,
}

impl AttemptProgress {
    pub fn new(success_criteria: u32, maximum_score: u32) -> Self {
        Self {
            successes: 0,
            success_criteria,
            maximum_score,
        }
    }

    pub fn successes(&self) -> u32 {
        self.successes
    }

    pub fn success_criteria(&self) -> u32 {
        self.success_criteria
    }

    pub fn maximum_score(&self) -> u32 {
        self.maximum_score
    }

    pub fn is_complete(&self) -> bool {
        self.successes >= self.success_criteria
    }

    pub fn register_success(&mut self) {
        self.successes = self.successes.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.successes = 0;
    }

    pub fn completion_rate(&self) -> f64 {
        if self.maximum_score == 0 {
            return 0.0;
        }
        f64::from(self.successes) / f64::from(self.maximum_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medal {
    None,
    Bronze,
    Silver,
    Gold,
}

impl Medal {
    pub fn for_completion_rate(rate: f64) -> Self {
        if rate >= 1.0 {
            Medal::Gold
        } else if rate >= 0.5 {
            Medal::Silver
        } else if rate > 0.0 {
            Medal::Bronze
        } else {
            Medal::None
        }
    }
}

/// Best-ever results for a single map.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapRecord {
    high_score: i64,
    completion_rate: f64,
}

impl MapRecord {
    pub fn high_score(&self) -> i64 {
        self.high_score
    }

    pub fn completion_rate(&self) -> f64 {
        self.completion_rate
    }

    pub fn medal(&self) -> Medal {
        Medal::for_completion_rate(self.completion_rate)
    }
}

/// In-memory records for every map in the loaded map set.
#[derive(Debug, Clone, Default)]
pub struct MapRecordTable {
    records: Vec<MapRecord>,
}

impl MapRecordTable {
    pub fn new(map_count: usize) -> Self {
        Self {
            records: vec![MapRecord::default(); map_count],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, map_index: usize) -> Option<&MapRecord> {
        self.records.get(map_index)
    }

    pub fn high_score(&self, map_index: usize) -> i64 {
        self.record(map_index).map_or(0, MapRecord::high_score)
    }

    pub fn completion_rate(&self, map_index: usize) -> f64 {
        self.record(map_index).map_or(0.0, MapRecord::completion_rate)
    }

    pub fn apply_score(&mut self, map_index: usize, score: i64) {
        match self.records.get_mut(map_index) {
            Some(record) => {
                record.high_score = record.high_score.max(score);
                debug!(map_index, score, high_score = record.high_score, "high_score_applied");
            }
            None => warn!(map_index, "map_record_missing"),
        }
    }

    pub fn record_completion(&mut self, map_index: usize, progress: &AttemptProgress) {
        match self.records.get_mut(map_index) {
            Some(record) => {
                record.completion_rate = record.completion_rate.max(progress.completion_rate());
            }
            None => warn!(map_index, "map_record_missing"),
        }
    }
}
