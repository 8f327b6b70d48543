// src/collection.rs
//
// RewardCollection: the ordered set of reward terms produced by one
// evaluation (typically one environment step).
//
// Terms are added either by explicit (rank, param) or by a target raw value
// that is decomposed into (rank, param) automatically. Either way an optional
// VarScale rescales param by (var / max_var) * mul before the term is built.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use crate::atomic::{log_base, pow_base, AtomicReward, DEFAULT_BASE};
use crate::config::RewardConfig;
use crate::error::{check_base, RewardError, RewardResult};

/// Magnitudes below this decompose to `(rank 0, param 0.0)`.
pub const NEAR_ZERO: f64 = 1e-9;

/// Variable-driven rescaling applied to a term's param.
///
/// `param' = param * (var / max_var) * mul`. `var` is not clamped, so values
/// outside `[0, max_var]` scale param outside `[-mul, mul] * param`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarScale {
    pub var: f64,
    pub max_var: f64,
    pub mul: f64,
}

impl VarScale {
    /// `var` against the default `max_var = 1.0`, `mul = 1.0`.
    pub fn new(var: f64) -> Self {
        Self {
            var,
            max_var: 1.0,
            mul: 1.0,
        }
    }

    pub fn with_max(mut self, max_var: f64) -> Self {
        self.max_var = max_var;
        self
    }

    pub fn with_mul(mut self, mul: f64) -> Self {
        self.mul = mul;
        self
    }

    /// Multiplicative factor for param. Fails when `max_var == 0`.
    pub fn factor(&self) -> RewardResult<f64> {
        if self.max_var == 0.0 {
            return Err(RewardError::invalid("max_var", "must be non-zero"));
        }
        Ok((self.var / self.max_var) * self.mul)
    }
}

/// Split a target raw value into `(rank, param)` with `value ≈ param * base^rank`.
///
/// `rank = max(0, floor(log_base(|value| / base)) + 1)` keeps `|param|` in
/// `[1, base)` for `|value| >= 1` and `rank >= 0` always. Magnitudes below
/// [`NEAR_ZERO`] give `(0, 0.0)`; non-finite values pass through as
/// `(0, value)`. Fails when `base < 2`.
///
/// The logarithm estimate is corrected against exact integer powers, so a
/// value sitting on a power of the base lands on that rank.
pub fn decompose(value: f64, base: u32) -> RewardResult<(i32, f64)> {
    let base = check_base(base)?;
    let magnitude = value.abs();
    if !magnitude.is_finite() {
        return Ok((0, value));
    }
    if magnitude < NEAR_ZERO {
        return Ok((0, 0.0));
    }

    let estimate = log_base(magnitude / f64::from(base), base).floor() + 1.0;
    let mut rank = (estimate as i32).max(0);
    while rank > 0 && pow_base(base, rank) > magnitude {
        rank -= 1;
    }
    while pow_base(base, rank + 1) <= magnitude {
        rank += 1;
    }

    Ok((rank, value / pow_base(base, rank)))
}

/// Ordered, append-only (until cleared) collection of reward terms.
///
/// Names are opaque and may repeat. Single-name lookup ([`get`](Self::get),
/// indexing) returns the most recently inserted match; per-name summation is
/// done by [`named_totals`](Self::named_totals), which is what a trace
/// snapshot records.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardCollection {
    base: u32,
    entries: Vec<AtomicReward>,
    render_diagnostics: bool,
}

impl Default for RewardCollection {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            entries: Vec::new(),
            render_diagnostics: true,
        }
    }
}

impl RewardCollection {
    /// Empty collection decomposing values in `base`. Fails when `base < 2`.
    pub fn new(base: u32) -> RewardResult<Self> {
        Ok(Self {
            base: check_base(base)?,
            ..Self::default()
        })
    }

    /// Empty collection using the config's base and diagnostics flag.
    pub fn with_config(cfg: &RewardConfig) -> RewardResult<Self> {
        Ok(Self::new(cfg.base)?.with_render_diagnostics(cfg.render_diagnostics))
    }

    /// Toggle the full per-term breakdown in `Display` for this instance.
    pub fn with_render_diagnostics(mut self, enabled: bool) -> Self {
        self.render_diagnostics = enabled;
        self
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn render_diagnostics(&self) -> bool {
        self.render_diagnostics
    }

    /// Append a term with an explicit rank and param.
    ///
    /// With `scale`, param is multiplied by [`VarScale::factor`] first. On
    /// error nothing is appended.
    pub fn add(
        &mut self,
        rank: i32,
        param: f64,
        scale: Option<VarScale>,
        name: Option<&str>,
    ) -> RewardResult<&mut Self> {
        let param = match scale {
            Some(scale) => param * scale.factor()?,
            None => param,
        };
        let reward = AtomicReward::new(rank, param, self.base, name)?;
        self.entries.push(reward);
        Ok(self)
    }

    /// Append a term whose raw value is `value`, decomposed with [`decompose`].
    ///
    /// Scaling applies to the decomposed param, exactly as in [`add`](Self::add).
    pub fn add_value(
        &mut self,
        value: f64,
        scale: Option<VarScale>,
        name: Option<&str>,
    ) -> RewardResult<&mut Self> {
        let (rank, param) = decompose(value, self.base)?;
        self.add(rank, param, scale, name)
    }

    /// Sum of raw values in insertion order.
    pub fn total_raw(&self) -> f64 {
        self.entries.iter().map(AtomicReward::raw).sum()
    }

    /// Sum of per-term log values. This is not `log(total_raw)`: each term is
    /// compressed before summing.
    pub fn total_log(&self) -> f64 {
        self.entries.iter().map(AtomicReward::log).sum()
    }

    /// Raw value of the most recently inserted term called `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.find(name).map(AtomicReward::raw)
    }

    fn find(&self, name: &str) -> Option<&AtomicReward> {
        self.entries.iter().rev().find(|r| r.name() == Some(name))
    }

    /// Raw value per name, summing terms that share a name.
    pub fn named_totals(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for reward in &self.entries {
            if let Some(name) = reward.name() {
                *totals.entry(name.to_owned()).or_insert(0.0) += reward.raw();
            }
        }
        totals
    }

    /// Term with the highest rank; the earliest one on ties.
    pub fn highest_priority(&self) -> Option<&AtomicReward> {
        let mut best: Option<&AtomicReward> = None;
        for reward in &self.entries {
            if best.map_or(true, |b| reward.rank() > b.rank()) {
                best = Some(reward);
            }
        }
        best
    }

    /// Term with the lowest rank; the earliest one on ties.
    pub fn lowest_priority(&self) -> Option<&AtomicReward> {
        let mut best: Option<&AtomicReward> = None;
        for reward in &self.entries {
            if best.map_or(true, |b| reward.rank() < b.rank()) {
                best = Some(reward);
            }
        }
        best
    }

    /// Remove every term. Idempotent.
    pub fn clear(&mut self) -> &mut Self {
        self.entries.clear();
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtomicReward> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a RewardCollection {
    type Item = &'a AtomicReward;
    type IntoIter = std::slice::Iter<'a, AtomicReward>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Named lookup, most recent insertion wins.
///
/// # Panics
///
/// Panics if no term carries `name`; use [`RewardCollection::get`] otherwise.
impl Index<&str> for RewardCollection {
    type Output = f64;

    fn index(&self, name: &str) -> &f64 {
        match self.find(name) {
            Some(reward) => reward.raw_ref(),
            None => panic!("no reward named {name:?} in collection"),
        }
    }
}

impl fmt::Display for RewardCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.render_diagnostics {
            return write!(f, "<RewardCollection n={}>", self.entries.len());
        }
        f.write_str("<RewardCollection ")?;
        for (i, reward) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", reward)?;
        }
        write!(
            f,
            " raw={:.1} log={:.3}>",
            self.total_raw(),
            self.total_log()
        )
    }
}
