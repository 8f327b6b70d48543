// src/trace.rs
//
// RewardTrace: a sliding window of collection snapshots.
//
// Each push records {raw_total, log_total, named} for one collection. The
// window can be exported as parallel arrays for inspection, or folded back
// into a single RewardCollection under an aggregation policy. Folding a
// fine-grained trace and pushing the result into a coarser one is how the
// step -> game -> episode hierarchy is built.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregationMode, Reducer};
use crate::atomic::DEFAULT_BASE;
use crate::collection::RewardCollection;
use crate::config::RewardConfig;
use crate::error::{check_base, RewardError, RewardResult};

/// Summary of one collection at the moment it was pushed.
///
/// This is also the persisted record format (one JSON object per record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    /// `total_raw()` of the source collection.
    pub raw_total: f64,
    /// `total_log()` of the source collection.
    pub log_total: f64,
    /// Raw value per name; same-name terms are summed.
    #[serde(default)]
    pub named: BTreeMap<String, f64>,
}

impl TraceSnapshot {
    pub fn from_collection(collection: &RewardCollection) -> Self {
        Self {
            raw_total: collection.total_raw(),
            log_total: collection.total_log(),
            named: collection.named_totals(),
        }
    }

    /// Value recorded for `name`, `0.0` when absent.
    pub fn named_or_zero(&self, name: &str) -> f64 {
        self.named.get(name).copied().unwrap_or(0.0)
    }
}

/// Parallel per-snapshot series exported by [`RewardTrace::arrays`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceArrays {
    pub raw: Vec<f64>,
    pub log: Vec<f64>,
    /// One series per name seen anywhere in the window, `0.0` where absent.
    pub named: BTreeMap<String, Vec<f64>>,
}

impl TraceArrays {
    /// Series by key. `"raw"` and `"log"` take precedence over a component
    /// of the same name.
    pub fn get(&self, key: &str) -> Option<&[f64]> {
        match key {
            "raw" => Some(&self.raw),
            "log" => Some(&self.log),
            name => self.named.get(name).map(Vec::as_slice),
        }
    }

    /// Number of snapshots covered by each series.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Flatten into one map. Components named `"raw"` or `"log"` are shadowed
    /// by the totals.
    pub fn into_map(self) -> BTreeMap<String, Vec<f64>> {
        let mut map = self.named;
        map.insert("raw".to_string(), self.raw);
        map.insert("log".to_string(), self.log);
        map
    }
}

/// Bounded FIFO history of [`TraceSnapshot`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardTrace {
    buf: VecDeque<TraceSnapshot>,
    maxlen: Option<usize>,
    base: u32,
    mode: AggregationMode,
}

impl Default for RewardTrace {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RewardTrace {
    /// Trace keeping at most `maxlen` snapshots (`None` = unbounded).
    /// `Some(0)` is rejected.
    pub fn new(maxlen: Option<usize>) -> RewardResult<Self> {
        if maxlen == Some(0) {
            return Err(RewardError::invalid("maxlen", "must be positive"));
        }
        Ok(Self {
            buf: VecDeque::new(),
            maxlen,
            base: DEFAULT_BASE,
            mode: AggregationMode::Avg,
        })
    }

    pub fn unbounded() -> Self {
        Self {
            buf: VecDeque::new(),
            maxlen: None,
            base: DEFAULT_BASE,
            mode: AggregationMode::Avg,
        }
    }

    /// Trace sized, based and folded according to a config.
    pub fn with_config(cfg: &RewardConfig) -> RewardResult<Self> {
        Ok(Self::new(cfg.trace_maxlen)?
            .with_base(cfg.base)?
            .with_aggregation(cfg.aggregation))
    }

    /// Set the mode used by [`to_reward_mgr`](Self::to_reward_mgr).
    pub fn with_aggregation(mut self, mode: AggregationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the base used for collections produced by folding.
    pub fn with_base(mut self, base: u32) -> RewardResult<Self> {
        self.base = check_base(base)?;
        Ok(self)
    }

    pub fn maxlen(&self) -> Option<usize> {
        self.maxlen
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn aggregation(&self) -> AggregationMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Snapshots, oldest first.
    pub fn snapshots(&self) -> impl Iterator<Item = &TraceSnapshot> + '_ {
        self.buf.iter()
    }

    /// Most recently pushed snapshot.
    pub fn latest(&self) -> Option<&TraceSnapshot> {
        self.buf.back()
    }

    /// Record a snapshot of `collection`, evicting the oldest when full.
    pub fn push(&mut self, collection: &RewardCollection) -> &mut Self {
        self.push_snapshot(TraceSnapshot::from_collection(collection))
    }

    /// Append an already-built snapshot, evicting the oldest when full.
    pub fn push_snapshot(&mut self, snapshot: TraceSnapshot) -> &mut Self {
        if let Some(maxlen) = self.maxlen {
            while self.buf.len() >= maxlen {
                if let Some(evicted) = self.buf.pop_front() {
                    tracing::trace!(
                        maxlen,
                        evicted_raw = evicted.raw_total,
                        "reward trace full; evicted oldest snapshot"
                    );
                }
            }
        }
        self.buf.push_back(snapshot);
        self
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) -> &mut Self {
        self.buf.clear();
        self
    }

    /// Names observed in any buffered snapshot, sorted.
    pub fn names(&self) -> BTreeSet<&str> {
        self.buf
            .iter()
            .flat_map(|s| s.named.keys().map(String::as_str))
            .collect()
    }

    /// Per-snapshot series of `name`, `0.0` where the name is absent.
    pub fn series(&self, name: &str) -> Vec<f64> {
        self.buf.iter().map(|s| s.named_or_zero(name)).collect()
    }

    /// Export the window as parallel arrays. No side effects.
    pub fn arrays(&self) -> TraceArrays {
        TraceArrays {
            raw: self.buf.iter().map(|s| s.raw_total).collect(),
            log: self.buf.iter().map(|s| s.log_total).collect(),
            named: self
                .names()
                .into_iter()
                .map(|name| (name.to_owned(), self.series(name)))
                .collect(),
        }
    }

    /// Fold the window with the trace's aggregation mode (arithmetic mean
    /// unless configured otherwise).
    pub fn to_reward_mgr(&self) -> RewardResult<RewardCollection> {
        self.fold(self.mode)
    }

    /// Fold the window with a built-in aggregation mode.
    pub fn fold(&self, mode: AggregationMode) -> RewardResult<RewardCollection> {
        self.fold_with(&mode)
    }

    /// Fold the window into a fresh collection.
    ///
    /// Every observed name is reduced over its full-length series (missing
    /// entries count as `0.0`) and added via `add_value`, in name order.
    /// Fails with [`RewardError::EmptyTrace`] when there is nothing to fold.
    pub fn fold_with<R: Reducer + ?Sized>(&self, reducer: &R) -> RewardResult<RewardCollection> {
        if self.buf.is_empty() {
            return Err(RewardError::EmptyTrace);
        }

        let mut folded = RewardCollection::new(self.base)?;
        for name in self.names() {
            let aggregate = reducer.reduce(&self.series(name));
            folded.add_value(aggregate, None, Some(name))?;
        }

        tracing::debug!(
            snapshots = self.buf.len(),
            components = folded.len(),
            raw_total = folded.total_raw(),
            "folded reward trace"
        );
        Ok(folded)
    }

    /// Fold this trace and push the result into a coarser `target`.
    pub fn compress_into(
        &self,
        target: &mut RewardTrace,
        mode: AggregationMode,
    ) -> RewardResult<&Self> {
        let folded = self.fold(mode)?;
        target.push(&folded);
        Ok(self)
    }

    /// Snapshots as persisted records, oldest first. Capacity is not included.
    pub fn serialize(&self) -> Vec<TraceSnapshot> {
        self.buf.iter().cloned().collect()
    }

    /// Rebuild a trace from records. The result is unbounded.
    pub fn deserialize(records: Vec<TraceSnapshot>) -> Self {
        Self {
            buf: records.into(),
            maxlen: None,
            base: DEFAULT_BASE,
            mode: AggregationMode::Avg,
        }
    }

    /// Rebuild a trace with an explicit capacity, keeping the most recent
    /// `maxlen` records.
    pub fn deserialize_bounded(
        records: Vec<TraceSnapshot>,
        maxlen: usize,
    ) -> RewardResult<Self> {
        let mut trace = Self::new(Some(maxlen))?;
        for record in records {
            trace.push_snapshot(record);
        }
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(values: &[(&str, f64)]) -> RewardCollection {
        let mut mgr = RewardCollection::default();
        for (name, value) in values {
            mgr.add_value(*value, None, Some(name)).unwrap();
        }
        mgr
    }

    #[test]
    fn zero_maxlen_rejected() {
        assert!(matches!(
            RewardTrace::new(Some(0)),
            Err(RewardError::InvalidArgument { field: "maxlen", .. })
        ));
        assert!(RewardTrace::new(None).is_ok());
        assert!(RewardTrace::unbounded().with_base(1).is_err());
    }

    #[test]
    fn push_sums_same_name_within_collection() {
        let mut mgr = RewardCollection::default();
        mgr.add_value(30.0, None, Some("x")).unwrap();
        mgr.add_value(12.0, None, Some("x")).unwrap();
        mgr.add_value(5.0, None, None).unwrap();

        let mut trace = RewardTrace::unbounded();
        trace.push(&mgr);

        let snap = trace.latest().unwrap();
        assert!((snap.named_or_zero("x") - 42.0).abs() < 1e-9);
        assert!((snap.raw_total - 47.0).abs() < 1e-9);
        assert_eq!(snap.named.len(), 1);
        // single-collection lookup still reports the most recent term
        assert!((mgr.get("x").unwrap() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn window_evicts_oldest() {
        let mut trace = RewardTrace::new(Some(2)).unwrap();
        trace
            .push(&step(&[("a", 1.0)]))
            .push(&step(&[("a", 2.0)]))
            .push(&step(&[("a", 3.0)]));

        assert_eq!(trace.len(), 2);
        let arrays = trace.arrays();
        assert_eq!(arrays.raw, vec![2.0, 3.0]);
        assert_eq!(arrays.get("a"), Some(&[2.0, 3.0][..]));
    }

    #[test]
    fn arrays_fill_missing_names_with_zero() {
        let mut trace = RewardTrace::unbounded();
        trace.push(&step(&[("a", 1.0)]));
        trace.push(&step(&[("b", 4.0)]));

        let arrays = trace.arrays();
        assert_eq!(arrays.len(), 2);
        assert_eq!(arrays.named["a"], vec![1.0, 0.0]);
        assert_eq!(arrays.named["b"], vec![0.0, 4.0]);
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn arrays_of_empty_trace_are_empty() {
        let arrays = RewardTrace::unbounded().arrays();
        assert!(arrays.is_empty());
        assert!(arrays.named.is_empty());
    }

    #[test]
    fn totals_shadow_components_in_flat_map() {
        let mut trace = RewardTrace::unbounded();
        trace.push(&step(&[("raw", 5.0), ("speed", 2.0)]));

        let arrays = trace.arrays();
        assert_eq!(arrays.get("raw"), Some(&[7.0][..]));
        assert_eq!(arrays.named["raw"], vec![5.0]);

        let map = arrays.into_map();
        assert_eq!(map["raw"], vec![7.0]);
        assert_eq!(map["speed"], vec![2.0]);
        assert!(map.contains_key("log"));
    }

    #[test]
    fn fold_averages_over_window_length() {
        let mut trace = RewardTrace::unbounded();
        trace.push(&step(&[("x", 10.0)]));
        trace.push(&step(&[("x", 20.0), ("y", 30.0)]));

        let folded = trace.to_reward_mgr().unwrap();
        assert!((folded.get("x").unwrap() - 15.0).abs() < 1e-9);
        // "y" is absent in the first snapshot and counts as 0.0
        assert!((folded.get("y").unwrap() - 15.0).abs() < 1e-9);
        let names: Vec<_> = folded.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec![Some("x"), Some("y")]);
    }

    #[test]
    fn fold_max_and_min() {
        let mut trace = RewardTrace::unbounded();
        trace.push(&step(&[("x", 10.0)]));
        trace.push(&step(&[("x", -40.0)]));
        trace.push(&step(&[("x", 25.0)]));

        let max = trace.fold(AggregationMode::Max).unwrap();
        let min = trace.fold(AggregationMode::Min).unwrap();
        assert!((max["x"] - 25.0).abs() < 1e-9);
        assert!((min["x"] + 40.0).abs() < 1e-9);
    }

    #[test]
    fn configured_mode_drives_to_reward_mgr() {
        let cfg = RewardConfig {
            trace_maxlen: Some(8),
            aggregation: AggregationMode::Max,
            ..RewardConfig::default()
        };
        let mut trace = RewardTrace::with_config(&cfg).unwrap();
        assert_eq!(trace.maxlen(), Some(8));
        assert_eq!(trace.aggregation(), AggregationMode::Max);

        trace.push(&step(&[("x", 10.0)]));
        trace.push(&step(&[("x", 30.0)]));
        let folded = trace.to_reward_mgr().unwrap();
        assert!((folded["x"] - 30.0).abs() < 1e-9);
        assert_eq!(RewardTrace::unbounded().aggregation(), AggregationMode::Avg);
    }

    #[test]
    fn fold_with_custom_reducer() {
        let mut trace = RewardTrace::unbounded();
        trace.push(&step(&[("x", 10.0)]));
        trace.push(&step(&[("x", 30.0)]));

        let sum = |values: &[f64]| values.iter().sum::<f64>();
        let folded = trace.fold_with(&sum).unwrap();
        assert!((folded["x"] - 40.0).abs() < 1e-9);
    }

    #[test]
    fn empty_fold_is_an_error() {
        let trace = RewardTrace::unbounded();
        assert_eq!(trace.to_reward_mgr(), Err(RewardError::EmptyTrace));

        let mut coarse = RewardTrace::unbounded();
        assert!(trace.compress_into(&mut coarse, AggregationMode::Avg).is_err());
        assert!(coarse.is_empty());
    }

    #[test]
    fn fold_does_not_touch_buffer() {
        let mut trace = RewardTrace::new(Some(4)).unwrap();
        trace.push(&step(&[("x", 3.0)]));
        let before = trace.clone();

        let mut folded = trace.to_reward_mgr().unwrap();
        folded.add_value(99.0, None, Some("x")).unwrap();
        assert_eq!(trace, before);
    }

    #[test]
    fn fold_uses_trace_base() {
        let mut trace = RewardTrace::unbounded().with_base(2).unwrap();
        trace.push(&step(&[("x", 16.0)]));
        let folded = trace.to_reward_mgr().unwrap();
        assert_eq!(folded.base(), 2);
        let term = folded.iter().next().unwrap();
        assert_eq!(term.rank(), 4);
        assert!((term.raw() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn compress_into_pushes_one_snapshot() {
        let mut steps = RewardTrace::unbounded();
        let mut games = RewardTrace::unbounded();
        steps.push(&step(&[("x", 2.0)]));
        steps.push(&step(&[("x", 4.0)]));

        steps
            .compress_into(&mut games, AggregationMode::Avg)
            .unwrap()
            .compress_into(&mut games, AggregationMode::Max)
            .unwrap();

        assert_eq!(games.len(), 2);
        let arrays = games.arrays();
        assert!((arrays.named["x"][0] - 3.0).abs() < 1e-9);
        assert!((arrays.named["x"][1] - 4.0).abs() < 1e-9);
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn serialize_round_trip() {
        let mut trace = RewardTrace::new(Some(3)).unwrap();
        trace.push(&step(&[("a", 1.5), ("b", -250.0)]));
        trace.push(&step(&[("a", 12.0)]));

        let records = trace.serialize();
        let json = serde_json::to_string(&records).unwrap();
        let back: Vec<TraceSnapshot> = serde_json::from_str(&json).unwrap();
        let restored = RewardTrace::deserialize(back);

        assert_eq!(restored.serialize(), records);
        assert_eq!(restored.arrays(), trace.arrays());
        assert_eq!(restored.maxlen(), None);
    }

    #[test]
    fn deserialize_bounded_keeps_most_recent() {
        let records: Vec<TraceSnapshot> = (1..=5)
            .map(|i| TraceSnapshot {
                raw_total: i as f64,
                log_total: 0.0,
                named: BTreeMap::new(),
            })
            .collect();

        let trace = RewardTrace::deserialize_bounded(records.clone(), 2).unwrap();
        assert_eq!(trace.maxlen(), Some(2));
        assert_eq!(trace.arrays().raw, vec![4.0, 5.0]);
        assert!(RewardTrace::deserialize_bounded(records, 0).is_err());
    }

    #[test]
    fn snapshot_record_field_names() {
        let snap = TraceSnapshot {
            raw_total: 1.0,
            log_total: 0.5,
            named: BTreeMap::from([("speed".to_string(), 1.0)]),
        };
        let json = serde_json::to_string(&snap).unwrap();
        assert_eq!(
            json,
            r#"{"raw_total":1.0,"log_total":0.5,"named":{"speed":1.0}}"#
        );

        let bare: TraceSnapshot =
            serde_json::from_str(r#"{"raw_total":2.0,"log_total":0.0}"#).unwrap();
        assert!(bare.named.is_empty());
    }
}
