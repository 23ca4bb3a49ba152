// Copyright 2025 Ramble Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Profiling
//!
//! The profile sink buffers timed and counted events keyed by scope
//! strings (the `;`-separated `@…` schema) and flushes them as a log file
//! when the run completes. Frequency counters are per-iteration atomic
//! buckets keyed by rule profile text; the bucket vector grows under a
//! short exclusive section, increments take the shared lock only.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::core::Result;

/// One recorded profile event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileEvent {
    /// A configuration record.
    Config { key: String, value: String },
    /// A named point in time, in microseconds since the sink started.
    Time { key: String, micros: u128 },
    /// A measured duration with the loop iteration it belongs to.
    Duration {
        key: String,
        micros: u128,
        iteration: usize,
    },
    /// A counted quantity with the loop iteration it belongs to.
    Quantity {
        key: String,
        value: usize,
        iteration: usize,
    },
    /// A non-recursive join-size estimate.
    NonRecursiveCount { key: String, value: f64 },
    /// A recursive join-size estimate with its iteration.
    RecursiveCount {
        key: String,
        value: f64,
        iteration: usize,
    },
}

/// Buffered event recorder.
///
/// A disabled sink ignores every event, so call sites need no guards
/// beyond the ones that avoid computing expensive event payloads.
pub struct ProfileSink {
    enabled: bool,
    path: Option<PathBuf>,
    started: Mutex<Option<Instant>>,
    events: Mutex<Vec<ProfileEvent>>,
}

impl ProfileSink {
    /// A sink that records into memory and flushes to `path`.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        ProfileSink {
            enabled: true,
            path: Some(path.into()),
            started: Mutex::new(None),
            events: Mutex::new(Vec::new()),
        }
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        ProfileSink {
            enabled: false,
            path: None,
            started: Mutex::new(None),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start the run clock.
    pub fn start_timer(&self) {
        if self.enabled {
            *self.started.lock() = Some(Instant::now());
        }
    }

    fn elapsed(&self) -> Duration {
        self.started
            .lock()
            .map(|s| s.elapsed())
            .unwrap_or_default()
    }

    pub fn config(&self, key: impl Into<String>, value: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.events.lock().push(ProfileEvent::Config {
            key: key.into(),
            value: value.into(),
        });
    }

    /// A named point in time, e.g. `@time;starttime`.
    pub fn time_event(&self, key: impl Into<String>) {
        if !self.enabled {
            return;
        }
        let micros = self.elapsed().as_micros();
        self.events.lock().push(ProfileEvent::Time {
            key: key.into(),
            micros,
        });
    }

    pub fn duration_event(&self, key: impl Into<String>, elapsed: Duration, iteration: usize) {
        if !self.enabled {
            return;
        }
        self.events.lock().push(ProfileEvent::Duration {
            key: key.into(),
            micros: elapsed.as_micros(),
            iteration,
        });
    }

    pub fn quantity_event(&self, key: impl Into<String>, value: usize, iteration: usize) {
        if !self.enabled {
            return;
        }
        self.events.lock().push(ProfileEvent::Quantity {
            key: key.into(),
            value,
            iteration,
        });
    }

    pub fn non_recursive_count_event(&self, key: impl Into<String>, value: f64) {
        if !self.enabled {
            return;
        }
        self.events.lock().push(ProfileEvent::NonRecursiveCount {
            key: key.into(),
            value,
        });
    }

    pub fn recursive_count_event(&self, key: impl Into<String>, value: f64, iteration: usize) {
        if !self.enabled {
            return;
        }
        self.events.lock().push(ProfileEvent::RecursiveCount {
            key: key.into(),
            value,
            iteration,
        });
    }

    /// Snapshot of the buffered events.
    pub fn events(&self) -> Vec<ProfileEvent> {
        self.events.lock().clone()
    }

    /// Write the buffered events to the configured path.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        self.write_to(path)
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let mut out = std::fs::File::create(path)?;
        for event in self.events.lock().iter() {
            match event {
                ProfileEvent::Config { key, value } => {
                    writeln!(out, "@config;{key};{value}")?;
                }
                ProfileEvent::Time { key, micros } => {
                    writeln!(out, "{key};{micros}")?;
                }
                ProfileEvent::Duration {
                    key,
                    micros,
                    iteration,
                } => {
                    writeln!(out, "{key};{iteration};{micros}")?;
                }
                ProfileEvent::Quantity {
                    key,
                    value,
                    iteration,
                } => {
                    writeln!(out, "{key};{iteration};{value}")?;
                }
                ProfileEvent::NonRecursiveCount { key, value } => {
                    writeln!(out, "{key};{value}")?;
                }
                ProfileEvent::RecursiveCount {
                    key,
                    value,
                    iteration,
                } => {
                    writeln!(out, "{key};{iteration};{value}")?;
                }
            }
        }
        Ok(())
    }
}

/// Per-iteration rule firing counters.
///
/// Incrementing takes the shared lock and an atomic add; only growing a
/// bucket vector for a new iteration takes the exclusive lock.
#[derive(Default)]
pub struct FrequencyCounters {
    buckets: RwLock<FxHashMap<String, Vec<AtomicUsize>>>,
}

impl FrequencyCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a key with one empty bucket.
    pub fn register(&self, key: &str) {
        let mut buckets = self.buckets.write();
        buckets
            .entry(key.to_string())
            .or_insert_with(|| vec![AtomicUsize::new(0)]);
    }

    /// Bump the counter for `key` at `iteration`.
    pub fn bump(&self, key: &str, iteration: usize) {
        {
            let buckets = self.buckets.read();
            if let Some(counters) = buckets.get(key) {
                if let Some(counter) = counters.get(iteration) {
                    counter.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }

        let mut buckets = self.buckets.write();
        let counters = buckets.entry(key.to_string()).or_default();
        while counters.len() <= iteration {
            counters.push(AtomicUsize::new(0));
        }
        counters[iteration].fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters as (key, per-iteration counts).
    pub fn snapshot(&self) -> Vec<(String, Vec<usize>)> {
        let buckets = self.buckets.read();
        let mut out: Vec<(String, Vec<usize>)> = buckets
            .iter()
            .map(|(key, counters)| {
                (
                    key.clone(),
                    counters.iter().map(|c| c.load(Ordering::Relaxed)).collect(),
                )
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Per-relation read counters, pre-registered before the run.
#[derive(Default)]
pub struct ReadCounters {
    counts: RwLock<FxHashMap<String, AtomicUsize>>,
}

impl ReadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, relation: &str) {
        self.counts
            .write()
            .entry(relation.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
    }

    pub fn bump(&self, relation: &str) {
        {
            let counts = self.counts.read();
            if let Some(count) = counts.get(relation) {
                count.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.counts
            .write()
            .entry(relation.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Vec<(String, usize)> {
        let counts = self.counts.read();
        let mut out: Vec<(String, usize)> = counts
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_sink_records_nothing() {
        let sink = ProfileSink::disabled();
        sink.config("k", "v");
        sink.quantity_event("@size;r", 3, 0);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_events_are_buffered_in_order() {
        let sink = ProfileSink::to_file("/dev/null");
        sink.start_timer();
        sink.config("threads", "4");
        sink.time_event("@time;starttime");
        sink.quantity_event("@relation-reads;edge", 7, 0);

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            ProfileEvent::Config {
                key: "threads".to_string(),
                value: "4".to_string()
            }
        );
        assert!(matches!(&events[2], ProfileEvent::Quantity { key, value: 7, .. }
            if key == "@relation-reads;edge"));
    }

    #[test]
    fn test_frequency_bump_and_grow() {
        let counters = FrequencyCounters::new();
        counters.register("rule1");
        counters.bump("rule1", 0);
        counters.bump("rule1", 0);
        counters.bump("rule1", 3);
        counters.bump("rule2", 1);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], ("rule1".to_string(), vec![2, 0, 0, 1]));
        assert_eq!(snapshot[1], ("rule2".to_string(), vec![0, 1]));
    }

    #[test]
    fn test_read_counters() {
        let reads = ReadCounters::new();
        reads.register("edge");
        reads.bump("edge");
        reads.bump("edge");
        reads.bump("path");
        assert_eq!(
            reads.snapshot(),
            vec![("edge".to_string(), 2), ("path".to_string(), 1)]
        );
    }
}
