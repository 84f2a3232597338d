use ant_colony_core::colony::Colony;
use ant_colony_core::config::SimConfig;
use ant_colony_core::evolution::EvolutionEngine;
use ant_colony_core::pheromone::Channel;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(value_error)
}

fn parse_channel(name: &str) -> PyResult<Channel> {
    match name {
        "to_food" => Ok(Channel::ToFood),
        "to_home" => Ok(Channel::ToHome),
        "danger" => Ok(Channel::Danger),
        other => Err(PyValueError::new_err(format!(
            "unknown channel {other:?}; expected to_food, to_home or danger"
        ))),
    }
}

/// Python handle on a colony. Complex views are exchanged as JSON strings.
#[pyclass(name = "Colony")]
struct PyColony {
    inner: Colony,
}

#[pymethods]
impl PyColony {
    #[new]
    #[pyo3(signature = (config_json=None, pool_json=None))]
    fn new(config_json: Option<&str>, pool_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => serde_json::from_str::<SimConfig>(json).map_err(value_error)?,
            None => SimConfig::default(),
        };
        config.validate().map_err(value_error)?;
        let engine = EvolutionEngine::restore_from_json(pool_json, &config);
        let inner = Colony::try_with_evolution(config, engine).map_err(value_error)?;
        Ok(Self { inner })
    }

    /// Advance one tick and return the tick report as JSON.
    fn tick(&mut self) -> PyResult<String> {
        to_json(&self.inner.tick())
    }

    /// Advance `n` ticks; returns the number of generations that advanced.
    fn tick_many(&mut self, n: u64) -> u64 {
        (0..n).filter(|_| self.inner.tick().generation_advanced).count() as u64
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn regenerate_obstacles(&mut self) {
        self.inner.regenerate_obstacles();
    }

    fn add_food_source(&mut self, x: f64, y: f64, amount: u32) -> u32 {
        self.inner.add_food_source([x, y], amount)
    }

    #[getter]
    fn tick_index(&self) -> u64 {
        self.inner.tick_index()
    }

    #[getter]
    fn generation(&self) -> u64 {
        self.inner.evolution().generation()
    }

    #[getter]
    fn population(&self) -> usize {
        self.inner.population()
    }

    fn stats_json(&self) -> PyResult<String> {
        to_json(&self.inner.stats())
    }

    /// Recent learning samples, oldest first.
    fn history_json(&self) -> PyResult<String> {
        let history: Vec<_> = self.inner.history().collect();
        to_json(&history)
    }

    fn agents_json(&self) -> PyResult<String> {
        to_json(&self.inner.agent_snapshots())
    }

    fn food_json(&self) -> PyResult<String> {
        to_json(&self.inner.food_sources())
    }

    fn obstacles_json(&self) -> PyResult<String> {
        to_json(&self.inner.obstacles().obstacles())
    }

    fn config_json(&self) -> PyResult<String> {
        to_json(self.inner.config())
    }

    /// Grid size as `(columns, rows)`.
    fn field_dims(&self) -> (usize, usize) {
        self.inner.field().dims()
    }

    /// Row-major intensities of one channel.
    fn field_layer(&self, channel: &str) -> PyResult<Vec<f32>> {
        Ok(self.inner.field().layer(parse_channel(channel)?).to_vec())
    }

    /// Serialized elite pool for persistence.
    fn export_pool(&self) -> PyResult<String> {
        self.inner.evolution().to_json().map_err(value_error)
    }

    /// Replace the elite pool. Unlike startup loading, bad data is an error.
    fn import_pool(&mut self, json: &str) -> PyResult<()> {
        let engine = EvolutionEngine::from_json(json, self.inner.config()).map_err(value_error)?;
        self.inner.replace_evolution(engine).map_err(value_error)
    }
}

#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pyfunction]
fn default_config_json() -> PyResult<String> {
    to_json(&SimConfig::default())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(default_config_json, m)?)?;
    m.add_class::<PyColony>()?;
    Ok(())
}
