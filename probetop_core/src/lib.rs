//! probetop_core: samples CPU, thermal, fan, memory, disk, process and
//! network counters on independent cadences and publishes them as one
//! consistent snapshot.

pub mod config;
pub mod delta;
pub mod engine;
pub mod error;
pub mod history;
pub mod parse;
pub mod processes;
pub mod sampler;
pub mod sensors;
pub mod source;
pub mod state;
pub mod types;

pub use config::{Category, EngineConfig, Rate};
pub use engine::Engine;
pub use error::{EngineError, ReadError};
pub use history::{DisplayScale, HistoryBuffer};
pub use processes::ProcessQuery;
pub use source::{LinuxSource, SystemSource};
pub use state::SnapshotStore;
pub use types::{ProcessRecord, Snapshot, SortColumn};
