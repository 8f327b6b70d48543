// src/config.rs
//
// Construction-time configuration for collections and traces.
//
// Everything that shapes instance behaviour lives here and is handed to
// constructors explicitly; there is no process-wide switch. Environment
// overrides (RANKREWARD_*) are resolved once, by from_env_or_default().

use std::env;

use crate::aggregate::AggregationMode;
use crate::atomic::DEFAULT_BASE;
use crate::error::{check_base, RewardError, RewardResult};

pub const ENV_BASE: &str = "RANKREWARD_BASE";
pub const ENV_TRACE_MAXLEN: &str = "RANKREWARD_TRACE_MAXLEN";
pub const ENV_RENDER_DIAGNOSTICS: &str = "RANKREWARD_RENDER_DIAGNOSTICS";
pub const ENV_AGGREGATION: &str = "RANKREWARD_AGGREGATION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardConfig {
    /// Exponent base for reward terms and value decomposition (>= 2).
    pub base: u32,
    /// Sliding-window capacity for traces; `None` is unbounded.
    pub trace_maxlen: Option<usize>,
    /// Render the per-term breakdown when a collection is displayed.
    pub render_diagnostics: bool,
    /// Default reducer used by trace folds.
    pub aggregation: AggregationMode,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            trace_maxlen: None,
            render_diagnostics: true,
            aggregation: AggregationMode::Avg,
        }
    }
}

impl RewardConfig {
    /// Check `base >= 2` and `trace_maxlen != Some(0)`.
    pub fn validate(&self) -> RewardResult<()> {
        check_base(self.base)?;
        if self.trace_maxlen == Some(0) {
            return Err(RewardError::invalid("maxlen", "must be positive"));
        }
        Ok(())
    }

    /// Defaults with environment overrides applied:
    ///
    ///   - RANKREWARD_BASE               (u32, >= 2)
    ///   - RANKREWARD_TRACE_MAXLEN       (usize; empty or 0 = unbounded)
    ///   - RANKREWARD_RENDER_DIAGNOSTICS (1/0, true/false, on/off, yes/no)
    ///   - RANKREWARD_AGGREGATION        (avg | max | min)
    ///
    /// Any variable that fails to parse is ignored with a warning.
    pub fn from_env_or_default() -> Self {
        let mut cfg = RewardConfig::default();

        if let Ok(raw) = env::var(ENV_BASE) {
            match raw.trim().parse::<u32>().ok().filter(|b| check_base(*b).is_ok()) {
                Some(v) => {
                    cfg.base = v;
                    tracing::info!(var = ENV_BASE, value = v, "config override applied");
                }
                None => {
                    tracing::warn!(
                        var = ENV_BASE,
                        raw = %raw,
                        default = cfg.base,
                        "could not parse as integer base >= 2; using default"
                    );
                }
            }
        }

        if let Ok(raw) = env::var(ENV_TRACE_MAXLEN) {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                cfg.trace_maxlen = None;
            } else {
                match trimmed.parse::<usize>() {
                    Ok(0) => {
                        cfg.trace_maxlen = None;
                        tracing::info!(var = ENV_TRACE_MAXLEN, "config override applied: unbounded");
                    }
                    Ok(v) => {
                        cfg.trace_maxlen = Some(v);
                        tracing::info!(var = ENV_TRACE_MAXLEN, value = v, "config override applied");
                    }
                    Err(_) => {
                        tracing::warn!(
                            var = ENV_TRACE_MAXLEN,
                            raw = %raw,
                            "could not parse as usize; using default"
                        );
                    }
                }
            }
        }

        if let Ok(raw) = env::var(ENV_RENDER_DIAGNOSTICS) {
            match parse_flag(&raw) {
                Some(v) => {
                    cfg.render_diagnostics = v;
                    tracing::info!(var = ENV_RENDER_DIAGNOSTICS, value = v, "config override applied");
                }
                None => {
                    tracing::warn!(
                        var = ENV_RENDER_DIAGNOSTICS,
                        raw = %raw,
                        default = cfg.render_diagnostics,
                        "could not parse as flag; using default"
                    );
                }
            }
        }

        if let Ok(raw) = env::var(ENV_AGGREGATION) {
            match AggregationMode::parse(&raw) {
                Some(mode) => {
                    cfg.aggregation = mode;
                    tracing::info!(var = ENV_AGGREGATION, value = mode.as_str(), "config override applied");
                }
                None => {
                    tracing::warn!(
                        var = ENV_AGGREGATION,
                        raw = %raw,
                        default = cfg.aggregation.as_str(),
                        "unknown aggregation mode; using default"
                    );
                }
            }
        }

        cfg
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
