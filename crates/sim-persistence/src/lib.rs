//! sim-persistence: the concrete Postgres `SnapshotSink` and CSV export for
//! the §6 persistence contract.
//!
//! Modules:
//! - `pg`: the Diesel-backed sink over `twin_state_snapshots`.
//! - `migrations`: embedded Diesel migration runner.
//! - `config`: `.env`-derived connection configuration.
//! - `schema`: the `twin_state_snapshots` Diesel table.
//! - `csv_export`: single-metric time-series CSV export.

pub mod config;
pub mod csv_export;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::init_dotenv;
pub use csv_export::metric_time_series_csv;
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgPool, PgSnapshotSink, PoolProvider, SnapshotRow};
