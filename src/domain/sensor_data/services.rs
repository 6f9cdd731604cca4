use super::entities::{Reading, SensorId, TimeRange, Timestamp};
use crate::domain::logging::LogComponent;
use crate::domain::view_state::SensorSelection;
use crate::log_debug;
use std::collections::HashSet;

/// What happened to a single streamed reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    /// `(source, timestamp)` already present; first arrival wins.
    Duplicate,
    /// Source not selected at arrival time (late frame from an old target).
    Deselected,
}

/// Domain service - owns the canonical series.
///
/// Invariants after every call:
/// * readings are sorted by `(timestamp, source)`, hence non-decreasing in time;
/// * no two readings share `(source, timestamp)`.
#[derive(Debug, Clone, Default)]
pub struct DataMerger {
    series: Vec<Reading>,
    index: HashSet<(SensorId, Timestamp)>,
}

fn order_key(reading: &Reading) -> (Timestamp, &SensorId) {
    (reading.timestamp(), reading.source_id())
}

impl DataMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_stream(&mut self, reading: Reading, selection: &SensorSelection) -> IngestOutcome {
        if !selection.contains(reading.source_id()) {
            log_debug!(
                LogComponent::Domain("DataMerger"),
                "Discarding frame for deselected sensor {}",
                reading.source_id()
            );
            return IngestOutcome::Deselected;
        }
        if !self.index.insert(reading.key()) {
            return IngestOutcome::Duplicate;
        }

        let position = self.series.partition_point(|existing| order_key(existing) < order_key(&reading));
        self.series.insert(position, reading);
        IngestOutcome::Inserted
    }

    /// Adds every reading not already present and returns how many were added.
    /// Existing entries are never replaced.
    pub fn ingest_batch(&mut self, readings: Vec<Reading>) -> usize {
        let mut fresh: Vec<Reading> =
            readings.into_iter().filter(|reading| self.index.insert(reading.key())).collect();
        if fresh.is_empty() {
            return 0;
        }
        let added = fresh.len();
        fresh.sort_by(|a, b| order_key(a).cmp(&order_key(b)));

        // Both sides are sorted: merge linearly instead of re-sorting the series.
        let existing = std::mem::take(&mut self.series);
        let mut merged = Vec::with_capacity(existing.len() + fresh.len());
        let mut left = existing.into_iter().peekable();
        let mut right = fresh.into_iter().peekable();
        loop {
            let take_left = match (left.peek(), right.peek()) {
                (Some(a), Some(b)) => order_key(a) <= order_key(b),
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_left { left.next() } else { right.next() };
            merged.extend(next);
        }
        self.series = merged;
        added
    }

    /// Drops readings of sensors that are no longer selected.
    pub fn retain_sources(&mut self, selection: &SensorSelection) -> usize {
        self.retain(|reading| selection.contains(reading.source_id()))
    }

    /// Drops readings outside `range`.
    pub fn retain_range(&mut self, range: &TimeRange) -> usize {
        self.retain(|reading| range.contains(reading.timestamp()))
    }

    fn retain(&mut self, keep: impl Fn(&Reading) -> bool) -> usize {
        let before = self.series.len();
        let index = &mut self.index;
        self.series.retain(|reading| {
            let kept = keep(reading);
            if !kept {
                index.remove(&reading.key());
            }
            kept
        });
        before - self.series.len()
    }

    pub fn clear(&mut self) {
        self.series.clear();
        self.index.clear();
    }

    pub fn readings(&self) -> &[Reading] {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn latest_for(&self, sensor: &SensorId) -> Option<&Reading> {
        self.series.iter().rev().find(|reading| reading.source_id() == sensor)
    }
}
