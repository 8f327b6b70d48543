// src/atomic.rs
//
// AtomicReward: one reward term encoded as (rank, param, base).
//
// raw = param * base^rank
// log = sign(raw) * log_base(|raw| + 1)
//
// The rank is what lets a higher-priority term dominate every lower-priority
// term without hand-tuned weights: one rank step is one factor of `base`.

use std::fmt;

use crate::error::{check_base, RewardResult};

/// Default exponent base for rewards, collections and traces.
pub const DEFAULT_BASE: u32 = 10;

/// Logarithm of `x` in an integer base.
///
/// Bases 2 and 10 go through the dedicated intrinsics so that exact powers
/// come out exact.
pub(crate) fn log_base(x: f64, base: u32) -> f64 {
    match base {
        2 => x.log2(),
        10 => x.log10(),
        b => x.ln() / f64::from(b).ln(),
    }
}

/// `base^rank` as f64. Negative ranks give fractional powers.
pub(crate) fn pow_base(base: u32, rank: i32) -> f64 {
    f64::from(base).powi(rank)
}

/// Immutable reward term.
///
/// Two rewards with the same `(rank, param, base, name)` compare equal and
/// are interchangeable.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicReward {
    rank: i32,
    param: f64,
    base: u32,
    name: Option<String>,
    raw: f64,
}

impl AtomicReward {
    /// Build a reward term. Fails when `base < 2`.
    pub fn new(rank: i32, param: f64, base: u32, name: Option<&str>) -> RewardResult<Self> {
        let base = check_base(base)?;
        Ok(Self {
            rank,
            param,
            base,
            name: name.map(str::to_owned),
            raw: param * pow_base(base, rank),
        })
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    pub fn param(&self) -> f64 {
        self.param
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Uncompressed contribution, `param * base^rank`.
    pub fn raw(&self) -> f64 {
        self.raw
    }

    pub(crate) fn raw_ref(&self) -> &f64 {
        &self.raw
    }

    /// Sign-preserving log compression of [`raw`](Self::raw).
    ///
    /// The `+1` offset keeps a zero raw value at zero.
    pub fn log(&self) -> f64 {
        let magnitude = log_base(self.raw.abs() + 1.0, self.base);
        if self.raw < 0.0 {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl fmt::Display for AtomicReward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{:.3})", self.rank, self.param)?;
        if let Some(name) = &self.name {
            write!(f, "'{}'", name)?;
        }
        write!(f, "={:.1}", self.raw)
    }
}
