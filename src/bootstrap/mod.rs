pub mod config;
pub mod run;
pub mod tracing;

pub use config::{load_config, resolve_config};
pub use run::{run_pairing, run_setup};
