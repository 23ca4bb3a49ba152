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

//! Engine configuration

use std::path::PathBuf;

/// Chunks issued per worker thread by parallel tuple loops. The
/// oversubscription smooths stragglers across uneven chunks.
pub const DEFAULT_CHUNK_OVERSUBSCRIPTION: usize = 20;

/// Runtime configuration of an engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads for parallel tuple loops. 0 selects the host's
    /// available parallelism.
    pub num_threads: usize,
    /// Write a profile log here when the run completes.
    pub profile_path: Option<PathBuf>,
    /// Record per-iteration rule frequencies (needs profiling).
    pub profile_frequency: bool,
    /// Echo rule activity to stderr.
    pub verbose: bool,
    /// Partition target multiplier for parallel loops.
    pub chunk_oversubscription: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            profile_path: None,
            profile_frequency: false,
            verbose: false,
            chunk_oversubscription: DEFAULT_CHUNK_OVERSUBSCRIPTION,
        }
    }
}

impl EngineConfig {
    /// Single-threaded defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker thread count (0 = all available cores).
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Enable profiling into the given log file.
    pub fn with_profile(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_path = Some(path.into());
        self
    }

    /// Also record per-iteration rule frequencies.
    pub fn with_profile_frequency(mut self) -> Self {
        self.profile_frequency = true;
        self
    }

    /// Echo rule activity to stderr.
    pub fn with_verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// The resolved worker count.
    pub fn resolved_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.num_threads
        }
    }
}
