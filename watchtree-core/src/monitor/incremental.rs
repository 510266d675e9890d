//! Keyed secondary accumulators for delta sampling.

use std::collections::HashMap;

use watchtree_types::{MonitorKind, Sample};

use super::node::{Payload, Usage};

#[derive(Debug, Clone)]
struct Incremental {
    payload: Payload,
    usage: Usage,
    /// Last install, sample or update (ms); drives purging.
    touched: u64,
}

impl Incremental {
    fn fresh(kind: MonitorKind, now: u64) -> Self {
        Self {
            payload: Payload::of_kind(kind),
            usage: Usage::since(now),
            touched: now,
        }
    }
}

/// Accumulators of one monitor, by caller-supplied key.
#[derive(Debug, Default)]
pub(crate) struct Incrementals {
    entries: HashMap<String, Incremental>,
}

impl Incrementals {
    /// Mirrors an update into every accumulator.
    pub(crate) fn apply(&mut self, now: u64, mut update: impl FnMut(&mut Payload)) {
        for entry in self.entries.values_mut() {
            update(&mut entry.payload);
            entry.usage.touch(now);
            entry.touched = now;
        }
    }

    /// Samples the accumulator for `key` and replaces it with a fresh one.
    /// `None` if the key is unknown.
    pub(crate) fn take_sample(
        &mut self,
        key: &str,
        name: Option<&str>,
        note: Option<&str>,
        now: u64,
    ) -> Option<Sample> {
        let entry = self.entries.get_mut(key)?;
        let sample = entry.payload.sample(
            name.map(str::to_string),
            note.map(str::to_string),
            entry.usage,
        );
        *entry = Incremental::fresh(entry.payload.kind(), now);
        Some(sample)
    }

    pub(crate) fn install(&mut self, key: &str, kind: MonitorKind, now: u64) {
        self.entries
            .insert(key.to_string(), Incremental::fresh(kind, now));
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes accumulators untouched since `threshold`; returns how many.
    pub(crate) fn purge_older_than(&mut self, threshold: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.touched >= threshold);
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
