pub mod config;
pub mod error;
pub mod memory;
pub mod pool;
pub mod record;
pub mod rounds;
pub mod setup;
pub mod worker;

pub use config::{FileConfig, Overrides, SoakConfig};
pub use error::{Result, SoakError};
pub use memory::{
    CountingAllocator, HeapSnapshot, HeapStats, MemorySample, MemorySampler, Sampler,
};
pub use pool::create_pool;
pub use record::{PhoneEntry, Record, ResultSet};
pub use rounds::{RoundCoordinator, RunSummary, WORKERS_PER_ROUND};
pub use setup::reset_schema;
pub use worker::{PgQueryWorker, QueryWorker};
