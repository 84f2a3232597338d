pub mod agent;
pub mod colony;
pub mod config;
pub mod constants;
pub mod evolution;
pub mod fitness;
pub mod food;
pub mod genome;
pub mod geom;
pub mod maze;
pub mod nn;
pub mod obstacle;
pub mod perception;
pub mod pheromone;
pub mod policy;
pub mod rng;
pub mod spatial;

pub use colony::{Colony, ColonyInitError, ColonyStats, LearningSample, TickReport};
pub use config::SimConfig;
pub use evolution::{EvolutionEngine, PoolSnapshot};
