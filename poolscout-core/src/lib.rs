//! PoolScout Core: trending-pool acquisition, projection and tabular storage.
//!
//! This crate contains the data half of the pipeline:
//! - `PoolProvider` trait and the GeckoTerminal trending-pools provider
//! - Projection of raw provider records into the fixed pool schema
//! - CSV tabular store with read-after-write reload and a metadata sidecar

pub mod data;

pub use data::{
    project, project_all, BatchPolicy, FetchError, GeckoTerminalProvider, PoolProvider,
    PoolTable, ProjectedBatch, ProjectedPoolRecord, ProjectionError, RawPoolRecord, ReadError,
    TableMeta, TableRow, TrendingInterval, TrendingQuery, WriteError,
};
