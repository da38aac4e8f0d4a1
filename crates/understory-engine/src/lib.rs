//! Understory Engine: coarsening engine, data sources, and exploration sessions

pub mod engine;
pub mod source;
pub mod session;


#[cfg(test)]
pub mod test_utils;

pub use engine::{Applied, Engine, EngineBuilder, Exploration, LimitCheck};
pub use source::{DataSource, MemorySource};
pub use session::{Explorer, spawn_detector};
