//! Explicit, passed-by-reference run configuration. The original
//! implementation this was distilled from threaded a handful of globals
//! through the fuzzing loop; SPEC_FULL.md's design notes call for replacing
//! that with a single struct handed to `Traversal`/`FuzzEngine` instead.

use std::time::Duration;

use dfuzzer_value::RandomSource;

use crate::suppression::SuppressionFilter;

/// §5 Ordering: RNG state (the interesting-string replay table, the growing
/// length cursors) is global to the run, not per-method — only each
/// method's own iteration counter resets between methods. `random` is built
/// once for the whole run and shared by every `FuzzEngine::run_method` call
/// through this struct, rather than rebuilt per method.
pub struct Context<'a> {
    pub min_iterations: u64,
    pub max_iterations: u64,
    pub max_string_bytes: usize,
    pub max_rss_kib: Option<i64>,
    pub external_command: Option<String>,
    pub seed: Option<u64>,
    pub call_timeout: Duration,
    pub suppressions: &'a dyn SuppressionFilter,
    pub random: RandomSource,
}

impl<'a> Context<'a> {
    /// Builds the run's single `RandomSource` from `seed` (or the wall clock,
    /// if unset) so callers outside this crate never construct one directly.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        min_iterations: u64,
        max_iterations: u64,
        max_string_bytes: usize,
        max_rss_kib: Option<i64>,
        external_command: Option<String>,
        seed: Option<u64>,
        call_timeout: Duration,
        suppressions: &'a dyn SuppressionFilter,
    ) -> Self {
        let random = match seed {
            Some(seed) => RandomSource::new(seed, max_string_bytes),
            None => RandomSource::from_wall_clock(max_string_bytes),
        };
        Self {
            min_iterations,
            max_iterations,
            max_string_bytes,
            max_rss_kib,
            external_command,
            seed,
            call_timeout,
            suppressions,
            random,
        }
    }

    pub fn clamp_iterations(&self, floor: u64) -> u64 {
        floor.clamp(self.min_iterations, self.max_iterations)
    }
}
