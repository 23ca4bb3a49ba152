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

//! Compiled regex cache
//!
//! MATCH constraints with dynamic patterns compile through this cache;
//! constant patterns are compiled once at shadow-generation time and
//! bypass it. An invalid pattern is cached as `None` so repeated
//! evaluations skip recompilation.

use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;

/// Patterns kept before the cache is cleared.
const MAX_CACHE_SIZE: usize = 10_000;

/// Anchor a pattern so matching covers the full subject string.
pub fn compile_full_match(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).ok()
}

/// Thread-safe cache of compiled patterns.
pub struct RegexCache {
    cache: RwLock<FxHashMap<String, Option<Regex>>>,
}

impl RegexCache {
    pub fn new() -> Self {
        RegexCache {
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Get or compile a full-match pattern. `None` means the pattern does
    /// not compile; the caller decides how to warn.
    pub fn get_or_compile(&self, pattern: &str) -> Option<Regex> {
        if let Some(entry) = self.cache.read().get(pattern) {
            return entry.clone();
        }

        let compiled = compile_full_match(pattern);

        let mut cache = self.cache.write();
        if cache.len() >= MAX_CACHE_SIZE {
            cache.clear();
        }
        cache.insert(pattern.to_string(), compiled.clone());
        compiled
    }

    /// True if the pattern was seen before (compiling or not).
    pub fn is_cached(&self, pattern: &str) -> bool {
        self.cache.read().contains_key(pattern)
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_is_anchored() {
        let re = compile_full_match("ab+").unwrap();
        assert!(re.is_match("abb"));
        assert!(!re.is_match("xabb"));
        assert!(!re.is_match("abbx"));
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = RegexCache::new();
        assert!(!cache.is_cached("a.c"));
        let re = cache.get_or_compile("a.c").unwrap();
        assert!(re.is_match("abc"));
        assert!(cache.is_cached("a.c"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_pattern_cached_as_none() {
        let cache = RegexCache::new();
        assert!(cache.get_or_compile("[unclosed").is_none());
        // Second lookup hits the cached failure.
        assert!(cache.get_or_compile("[unclosed").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_alternation_stays_grouped() {
        // The non-capturing group keeps `a|b` from anchoring only one arm.
        let re = compile_full_match("a|b").unwrap();
        assert!(re.is_match("a"));
        assert!(re.is_match("b"));
        assert!(!re.is_match("ab"));
    }
}
