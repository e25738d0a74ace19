use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::core::{Job, Recommendation, SimilarJob};
use crate::error::MatchingError;
use crate::location::{Coordinates, NearbyJob};
use crate::{JobId, MatchingEngine as RustMatchingEngine, RankingOutcome, WorkerId};

fn to_py_err(e: MatchingError) -> PyErr {
    match e {
        MatchingError::JobNotFound(_) | MatchingError::SkillNotFound(_) => {
            PyErr::new::<pyo3::exceptions::PyKeyError, _>(e.to_string())
        }
        MatchingError::InvalidInput(_) => PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()),
        e => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()),
    }
}

/// Python wrapper for MatchingEngine
#[pyclass]
struct MatchingEngine {
    engine: Arc<RustMatchingEngine>,
    runtime: Arc<Runtime>,
}

#[pymethods]
impl MatchingEngine {
    #[new]
    fn new(db_path: String) -> PyResult<Self> {
        let runtime = Arc::new(
            Runtime::new().map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()))?,
        );

        let engine = runtime
            .block_on(RustMatchingEngine::new(&db_path))
            .map_err(to_py_err)?;

        Ok(Self {
            engine: Arc::new(engine),
            runtime,
        })
    }

    /// Job recommendations for a worker
    fn recommend(&self, worker_id: i64, limit: Option<usize>) -> PyResult<PyObject> {
        let limit = limit.unwrap_or(self.engine.config().ranking.default_top_n);
        let engine = self.engine.clone();
        let outcome = self
            .runtime
            .block_on(async move { engine.get_job_recommendations(WorkerId(worker_id), limit).await })
            .map_err(to_py_err)?;

        Python::with_gil(|py| outcome_to_py(py, &outcome, recommendation_to_py))
    }

    /// Jobs similar to a reference job
    fn similar_jobs(&self, job_id: i64, limit: Option<usize>) -> PyResult<PyObject> {
        let limit = limit.unwrap_or(self.engine.config().ranking.similar_limit);
        let engine = self.engine.clone();
        let outcome = self
            .runtime
            .block_on(async move { engine.get_similar_jobs(JobId(job_id), limit).await })
            .map_err(to_py_err)?;

        Python::with_gil(|py| outcome_to_py(py, &outcome, similar_to_py))
    }

    /// Open jobs around a point, nearest first
    fn nearby_jobs(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
        limit: Option<usize>,
    ) -> PyResult<Vec<PyObject>> {
        let location = &self.engine.config().location;
        let radius_km = radius_km.unwrap_or(location.default_radius_km);
        let limit = limit.unwrap_or(location.default_limit);
        let center = Coordinates::new(latitude, longitude).map_err(to_py_err)?;

        let engine = self.engine.clone();
        let nearby = self
            .runtime
            .block_on(async move { engine.nearby_jobs(center, radius_km, limit).await })
            .map_err(to_py_err)?;

        Python::with_gil(|py| nearby.iter().map(|n| nearby_to_py(py, n)).collect())
    }

    /// Most used skill tags as (tag, count) pairs
    fn top_skills(&self, limit: Option<usize>) -> PyResult<Vec<(String, u64)>> {
        let limit = limit.unwrap_or(self.engine.config().skills.top_limit);
        let engine = self.engine.clone();
        let tags = self
            .runtime
            .block_on(async move { engine.top_skills(limit).await })
            .map_err(to_py_err)?;

        Ok(tags.into_iter().map(|t| (t.tag, t.count)).collect())
    }

    /// Refit the ranker on current open jobs; returns how many were used
    fn retrain(&self) -> PyResult<usize> {
        let engine = self.engine.clone();
        self.runtime
            .block_on(async move { engine.retrain_ranker().await })
            .map_err(to_py_err)
    }
}

fn job_to_py(py: Python, job: &Job) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    dict.set_item("id", job.id.0)?;
    dict.set_item("title", &job.title)?;
    dict.set_item("description", &job.description)?;
    dict.set_item("tags", &job.tags)?;
    dict.set_item("status", job.status.as_str())?;
    dict.set_item("created_at", job.created_at.to_rfc3339())?;
    dict.set_item("latitude", job.location.map(|l| l.latitude))?;
    dict.set_item("longitude", job.location.map(|l| l.longitude))?;
    Ok(dict.into())
}

fn recommendation_to_py(py: Python, rec: &Recommendation) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    dict.set_item("job", job_to_py(py, &rec.job)?)?;
    dict.set_item("score", rec.score)?;
    dict.set_item("matching_skills", &rec.matching_skills)?;
    Ok(dict.into())
}

fn similar_to_py(py: Python, similar: &SimilarJob) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    dict.set_item("job", job_to_py(py, &similar.job)?)?;
    dict.set_item("score", similar.score)?;
    Ok(dict.into())
}

fn nearby_to_py(py: Python, nearby: &NearbyJob) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    dict.set_item("job", job_to_py(py, &nearby.job)?)?;
    dict.set_item("distance_km", nearby.distance_km)?;
    Ok(dict.into())
}

/// `{"results": [...], "degraded": bool, "reason": str | None}`
fn outcome_to_py<T>(
    py: Python,
    outcome: &RankingOutcome<T>,
    item: fn(Python, &T) -> PyResult<PyObject>,
) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    let results: PyResult<Vec<PyObject>> = outcome.as_slice().iter().map(|x| item(py, x)).collect();
    dict.set_item("results", results?)?;
    dict.set_item("degraded", outcome.is_degraded())?;
    dict.set_item("reason", outcome.reason())?;
    Ok(dict.into())
}

/// Python module
#[pymodule]
fn kaamconnect_matcher(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<MatchingEngine>()?;
    m.add("__version__", crate::VERSION)?;
    Ok(())
}
