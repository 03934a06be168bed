mod settings;
mod solver;

pub use settings::{Settings, DEFAULT_GROUP_NAME};
pub use solver::{load_config, SecretKeySelector, SolverConfig};
