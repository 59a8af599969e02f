//! Append-only tick log plus the derived indices the pipeline consults:
//! `last_triggered`, `fired_ever`, and the trailing idle-tick counter.

use std::collections::{BTreeMap, BTreeSet};

use contracts::TickRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TickHistory {
    records: Vec<TickRecord>,
    last_triggered: BTreeMap<String, u64>,
    fired_ever: BTreeSet<String>,
    idle_tick_count: u64,
}

impl TickHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    pub fn next_tick_index(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn last_triggered(&self, storylet_id: &str) -> Option<u64> {
        self.last_triggered.get(storylet_id).copied()
    }

    pub fn has_fired(&self, storylet_id: &str) -> bool {
        self.fired_ever.contains(storylet_id)
    }

    /// Consecutive trailing ticks that selected zero non-fallback storylets.
    pub fn idle_tick_count(&self) -> u64 {
        self.idle_tick_count
    }

    /// Occurrences of any of the given tags among the selected storylets of
    /// the last `window` records.
    pub fn tag_hits(&self, tags: &[String], window: u64) -> u64 {
        if window == 0 || tags.is_empty() {
            return 0;
        }
        let start = self.records.len().saturating_sub(window as usize);
        let mut hits = 0;
        for record in &self.records[start..] {
            for selected in &record.selected {
                for tag in &selected.tags {
                    if tags.iter().any(|candidate| candidate == tag) {
                        hits += 1;
                    }
                }
            }
        }
        hits
    }

    /// Append a completed record and refresh every derived index. The record
    /// must carry the next tick index; history is never rewritten.
    pub fn append(&mut self, record: TickRecord) {
        debug_assert_eq!(record.tick_index, self.next_tick_index());
        for selected in &record.selected {
            self.last_triggered
                .insert(selected.storylet_id.clone(), record.tick_index);
            self.fired_ever.insert(selected.storylet_id.clone());
        }
        self.idle_tick_count = record.idle_tick_count_after;
        self.records.push(record);
    }
}
