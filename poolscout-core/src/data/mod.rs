//! Data acquisition, projection and storage

pub mod geckoterminal;
pub mod projection;
pub mod provider;
pub mod schema;
pub mod store;

pub use geckoterminal::GeckoTerminalProvider;
pub use projection::{project, project_all, BatchPolicy, ProjectedBatch, ProjectionError};
pub use provider::{FetchError, PoolProvider, RawPoolRecord, TrendingInterval, TrendingQuery};
pub use schema::{DecimalValue, ProjectedPoolRecord, TableRow, COLUMNS};
pub use store::{PoolTable, ReadError, TableMeta, WriteError};
