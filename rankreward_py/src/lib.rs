// rankreward_py/src/lib.rs
//
// Python bindings for rankreward.
//
// Exposes the reward algebra to Python training loops:
// - Reward:      one immutable (rank, param, base, name) term
// - RewardMgr:   per-step collection with chainable add / add_value
// - RewardTrace: sliding window of snapshots with arrays() and folding
//
// Keyword defaults mirror the Rust API (max_var=1.0, mul=1.0, base=10).
// Every RewardError surfaces as ValueError.

use std::collections::BTreeMap;

use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use rankreward::{
    decompose as rust_decompose, AggregationMode, AtomicReward, RewardCollection, RewardError,
    RewardTrace as RustRewardTrace, TraceSnapshot, VarScale, DEFAULT_BASE,
};

fn to_py_err(err: RewardError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn parse_mode(mode: &str) -> PyResult<AggregationMode> {
    mode.parse::<AggregationMode>().map_err(to_py_err)
}

/// Python ints can be negative; map them onto the `Option<usize>` capacity.
fn parse_maxlen(maxlen: Option<i64>) -> PyResult<Option<usize>> {
    match maxlen {
        None => Ok(None),
        Some(n) if n <= 0 => Err(to_py_err(RewardError::InvalidArgument {
            field: "maxlen",
            message: format!("must be positive, got {n}"),
        })),
        Some(n) => usize::try_from(n)
            .map(Some)
            .map_err(|_| PyValueError::new_err(format!("maxlen {n} does not fit in usize"))),
    }
}

fn scale_from(var: Option<f64>, max_var: f64, mul: f64) -> Option<VarScale> {
    var.map(|v| VarScale::new(v).with_max(max_var).with_mul(mul))
}

fn snapshot_to_dict(py: Python<'_>, snapshot: &TraceSnapshot) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("raw_total", snapshot.raw_total)?;
    dict.set_item("log_total", snapshot.log_total)?;
    dict.set_item("named", snapshot.named.clone())?;
    Ok(dict.into())
}

fn snapshot_from_dict(record: &Bound<'_, PyDict>) -> PyResult<TraceSnapshot> {
    let field = |key: &str| -> PyResult<f64> {
        record
            .get_item(key)?
            .ok_or_else(|| PyKeyError::new_err(format!("snapshot record missing '{key}'")))?
            .extract::<f64>()
    };
    let named = match record.get_item("named")? {
        Some(value) => value.extract::<BTreeMap<String, f64>>()?,
        None => BTreeMap::new(),
    };
    Ok(TraceSnapshot {
        raw_total: field("raw_total")?,
        log_total: field("log_total")?,
        named,
    })
}

/// One reward term.
#[pyclass(name = "Reward", frozen)]
#[derive(Clone)]
pub struct PyReward {
    inner: AtomicReward,
}

#[pymethods]
impl PyReward {
    /// Create a reward term.
    ///
    /// Args:
    ///     rank: Priority level (may be negative)
    ///     param: Signed magnitude
    ///     base: Exponent base, >= 2 (default: 10)
    ///     name: Optional component name
    #[new]
    #[pyo3(signature = (rank, param, base=DEFAULT_BASE, name=None))]
    fn new(rank: i32, param: f64, base: u32, name: Option<String>) -> PyResult<Self> {
        let inner = AtomicReward::new(rank, param, base, name.as_deref()).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn rank(&self) -> i32 {
        self.inner.rank()
    }

    #[getter]
    fn param(&self) -> f64 {
        self.inner.param()
    }

    #[getter]
    fn base(&self) -> u32 {
        self.inner.base()
    }

    #[getter]
    fn name(&self) -> Option<String> {
        self.inner.name().map(str::to_owned)
    }

    #[getter]
    fn raw(&self) -> f64 {
        self.inner.raw()
    }

    #[getter]
    fn log(&self) -> f64 {
        self.inner.log()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

/// Per-step reward collection.
#[pyclass(name = "RewardMgr")]
pub struct PyRewardMgr {
    inner: RewardCollection,
}

#[pymethods]
impl PyRewardMgr {
    #[new]
    #[pyo3(signature = (base=DEFAULT_BASE, render_diagnostics=true))]
    fn new(base: u32, render_diagnostics: bool) -> PyResult<Self> {
        let inner = RewardCollection::new(base)
            .map_err(to_py_err)?
            .with_render_diagnostics(render_diagnostics);
        Ok(Self { inner })
    }

    /// Add a term by rank and param. Returns self for chaining.
    ///
    /// With `var`, param is scaled by (var / max_var) * mul first.
    #[pyo3(signature = (rank, param, var=None, max_var=1.0, mul=1.0, name=None))]
    fn add<'py>(
        mut slf: PyRefMut<'py, Self>,
        rank: i32,
        param: f64,
        var: Option<f64>,
        max_var: f64,
        mul: f64,
        name: Option<String>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        slf.inner
            .add(rank, param, scale_from(var, max_var, mul), name.as_deref())
            .map_err(to_py_err)?;
        Ok(slf)
    }

    /// Add a term by target raw value (decomposed into rank and param).
    /// Returns self for chaining.
    #[pyo3(signature = (value, var=None, max_var=1.0, mul=1.0, name=None))]
    fn add_value<'py>(
        mut slf: PyRefMut<'py, Self>,
        value: f64,
        var: Option<f64>,
        max_var: f64,
        mul: f64,
        name: Option<String>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        slf.inner
            .add_value(value, scale_from(var, max_var, mul), name.as_deref())
            .map_err(to_py_err)?;
        Ok(slf)
    }

    fn total_raw(&self) -> f64 {
        self.inner.total_raw()
    }

    fn total_log(&self) -> f64 {
        self.inner.total_log()
    }

    fn highest_priority(&self) -> Option<PyReward> {
        self.inner
            .highest_priority()
            .map(|r| PyReward { inner: r.clone() })
    }

    fn lowest_priority(&self) -> Option<PyReward> {
        self.inner
            .lowest_priority()
            .map(|r| PyReward { inner: r.clone() })
    }

    /// Terms in insertion order.
    fn entries(&self) -> Vec<PyReward> {
        self.inner
            .iter()
            .map(|r| PyReward { inner: r.clone() })
            .collect()
    }

    fn clear(mut slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        slf.inner.clear();
        slf
    }

    #[getter]
    fn base(&self) -> u32 {
        self.inner.base()
    }

    /// Raw value of the most recent term with this name.
    fn __getitem__(&self, name: String) -> PyResult<f64> {
        self.inner
            .get(&name)
            .ok_or_else(|| PyKeyError::new_err(name))
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

/// Sliding window of reward snapshots.
#[pyclass(name = "RewardTrace")]
pub struct PyRewardTrace {
    inner: RustRewardTrace,
}

#[pymethods]
impl PyRewardTrace {
    /// Create a trace.
    ///
    /// Args:
    ///     maxlen: Window capacity, positive; None for unbounded (default)
    ///     base: Base for collections produced by folding (default: 10)
    #[new]
    #[pyo3(signature = (maxlen=None, base=DEFAULT_BASE))]
    fn new(maxlen: Option<i64>, base: u32) -> PyResult<Self> {
        let inner = RustRewardTrace::new(parse_maxlen(maxlen)?)
            .and_then(|t| t.with_base(base))
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Snapshot a RewardMgr. Returns self for chaining.
    fn push<'py>(
        mut slf: PyRefMut<'py, Self>,
        mgr: PyRef<'_, PyRewardMgr>,
    ) -> PyRefMut<'py, Self> {
        slf.inner.push(&mgr.inner);
        slf
    }

    /// Dict of lists: "raw", "log", and one entry per component name.
    fn arrays(&self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        let dict = PyDict::new_bound(py);
        for (key, series) in self.inner.arrays().into_map() {
            dict.set_item(key, series)?;
        }
        Ok(dict.into())
    }

    /// Fold the window into a new RewardMgr ("avg", "max" or "min").
    #[pyo3(signature = (mode="avg"))]
    fn to_reward_mgr(&self, mode: &str) -> PyResult<PyRewardMgr> {
        let inner = self.inner.fold(parse_mode(mode)?).map_err(to_py_err)?;
        Ok(PyRewardMgr { inner })
    }

    /// Fold the window and push the result into `target`. Returns self for
    /// chaining.
    #[pyo3(signature = (target, mode="avg"))]
    fn compress_into<'py>(
        slf: PyRef<'py, Self>,
        mut target: PyRefMut<'_, PyRewardTrace>,
        mode: &str,
    ) -> PyResult<PyRef<'py, Self>> {
        slf.inner
            .compress_into(&mut target.inner, parse_mode(mode)?)
            .map_err(to_py_err)?;
        Ok(slf)
    }

    fn clear(mut slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        slf.inner.clear();
        slf
    }

    #[getter]
    fn maxlen(&self) -> Option<usize> {
        self.inner.maxlen()
    }

    /// Snapshot records, oldest first. Capacity is not included.
    fn serialize(&self, py: Python<'_>) -> PyResult<Vec<Py<PyDict>>> {
        self.inner
            .snapshots()
            .map(|s| snapshot_to_dict(py, s))
            .collect()
    }

    /// Rebuild a trace from records; unbounded unless `maxlen` is given.
    #[staticmethod]
    #[pyo3(signature = (records, maxlen=None))]
    fn deserialize(records: Vec<Bound<'_, PyDict>>, maxlen: Option<i64>) -> PyResult<Self> {
        let records = records
            .iter()
            .map(snapshot_from_dict)
            .collect::<PyResult<Vec<_>>>()?;
        let inner = match parse_maxlen(maxlen)? {
            Some(n) => RustRewardTrace::deserialize_bounded(records, n).map_err(to_py_err)?,
            None => RustRewardTrace::deserialize(records),
        };
        Ok(Self { inner })
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}

/// Split a value into (rank, param) the way add_value does.
#[pyfunction]
#[pyo3(signature = (value, base=DEFAULT_BASE))]
fn decompose(value: f64, base: u32) -> PyResult<(i32, f64)> {
    rust_decompose(value, base).map_err(to_py_err)
}

/// Python module definition.
#[pymodule]
fn rankreward_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyReward>()?;
    m.add_class::<PyRewardMgr>()?;
    m.add_class::<PyRewardTrace>()?;
    m.add_function(wrap_pyfunction!(decompose, m)?)?;
    Ok(())
}
