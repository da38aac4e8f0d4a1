//! Understory Core: working-set model, communities, and sibling bucketing

pub mod model;
pub mod error;
pub mod config;
pub mod community;
pub mod entity;
pub mod bucket;


pub use model::{NodeId, EdgeId, Payload, NodeRecord, EdgeRecord, NodePage, Counters, Node, Edge, Endpoints, Reason};
pub use error::{Error, Result};
pub use config::EngineConfig;
pub use community::{Community, Placement, Detachment, Severed, DissolveInfo};
pub use entity::Visible;
pub use bucket::{Bucket, Bucketer};
