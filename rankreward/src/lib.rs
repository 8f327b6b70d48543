//! Rank-encoded reward composition for reinforcement-learning agents.
//!
//! A reward is built from terms `param * base^rank`: a term one rank higher
//! outweighs any normalized term below it, so priorities are expressed by
//! rank instead of by hand-tuned weights. Each term also has a sign-preserving
//! log form for feeding networks a compressed signal.
//!
//! # Components
//!
//! - **AtomicReward** (`atomic`): one immutable `(rank, param, base)` term
//!   with cached raw value and derived log value.
//! - **RewardCollection** (`collection`): the terms of one evaluation, built
//!   with chainable `add` / `add_value`, with raw and log totals and named
//!   lookup.
//! - **RewardTrace** (`trace`): sliding window of collection snapshots that
//!   exports per-component arrays and folds back into a collection under an
//!   aggregation policy (`aggregate`).
//!
//! Folding a per-step trace and pushing the result into a per-game trace (and
//! again into a per-episode trace) gives multi-resolution summaries.
//!
//! # Ambient pieces
//!
//! - `config`: construction-time settings with `RANKREWARD_*` overrides
//! - `telemetry`: JSONL snapshot sinks and reader
//! - `error`: `RewardError` / `RewardResult`

pub mod aggregate;
pub mod atomic;
pub mod collection;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod trace;

// --- Re-exports for ergonomic external use ---------------------------------

pub use aggregate::{AggregationMode, Reducer};
pub use atomic::{AtomicReward, DEFAULT_BASE};
pub use collection::{decompose, RewardCollection, VarScale, NEAR_ZERO};
pub use config::RewardConfig;
pub use error::{RewardError, RewardResult};
pub use telemetry::{read_snapshot_log, JsonlSink, NoopSink, SnapshotSink};
pub use trace::{RewardTrace, TraceArrays, TraceSnapshot};

// --- End-to-end composition tests --------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// base=10; 500 fixed + 1000 scaled by (5/10)*1.5 gives 500 + 750.
    #[test]
    fn speed_scenario_totals() {
        let mut mgr = RewardCollection::new(10).unwrap();
        mgr.add_value(500.0, None, Some("base"))
            .unwrap()
            .add_value(
                1000.0,
                Some(VarScale::new(5.0).with_max(10.0).with_mul(1.5)),
                Some("speed"),
            )
            .unwrap();

        assert!((mgr.total_raw() - 1250.0).abs() < 1e-9);
        assert!((mgr["speed"] - 750.0).abs() < 1e-9);
        assert!((mgr["base"] - 500.0).abs() < 1e-9);

        let speed = mgr.iter().find(|r| r.name() == Some("speed")).unwrap();
        assert_eq!(speed.rank(), 3);
        assert!((speed.param() - 0.75).abs() < 1e-12);
    }

    /// Per-term compression keeps more structure than compressing the sum.
    #[test]
    fn total_log_is_not_log_of_total() {
        let mut mgr = RewardCollection::default();
        mgr.add(3, 1.0, None, None).unwrap();
        mgr.add(0, 1.0, None, None).unwrap();

        let per_term = (1001.0f64).log10() + (2.0f64).log10();
        let of_total = (mgr.total_raw() + 1.0).log10();
        assert!((mgr.total_log() - per_term).abs() < 1e-12);
        assert!((mgr.total_log() - of_total).abs() > 0.1);
    }

    #[test]
    fn higher_rank_dominates() {
        for base in [2u32, 3, 10, 16] {
            let high = AtomicReward::new(4, 1.0, base, None).unwrap();
            let low = AtomicReward::new(3, 1.0, base, None).unwrap();
            assert!(high.raw().abs() > low.raw().abs());
        }
    }
}
