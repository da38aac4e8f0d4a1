//! Understory Detector: incremental directed modularity over the rendered plain graph

pub mod error;
pub mod mirror;
pub mod modularity;
pub mod protocol;
pub mod worker;


pub use error::DetectorError;
pub use mirror::DetectorMirror;
pub use modularity::{ModularityJoiner, Partition};
pub use protocol::{Command, CommandName, Outcome, Response};
pub use worker::{DetectorHandle, DetectorWorker, channel};
