//! Postgres (Diesel) implementation of `sim_core::SnapshotSink` over the §6
//! `twin_state_snapshots` schema.

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use serde_json::Value;

use chrono::{DateTime, Utc};
use log::warn;

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::twin_state_snapshots;

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Abstracts connection checkout so tests can substitute a fake pool
/// without linking r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = twin_state_snapshots)]
struct NewSnapshotRow<'a> {
    run_id: &'a str,
    step_number: i64,
    wall_clock: DateTime<Utc>,
    state: &'a Value,
    description: &'a str,
    metrics: &'a Value,
}

#[derive(Queryable, Debug)]
pub struct SnapshotRow {
    pub run_id: String,
    pub step_number: i64,
    pub wall_clock: DateTime<Utc>,
    pub state: Value,
    pub description: String,
    pub metrics: Value,
}

fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected") || m.contains("could not serialize access due to concurrent update") || m.contains("connection closed") || m.contains("connection refused") || m.contains("timeout")
        }
        _ => false,
    }
}

/// Up to 3 retries with a 15/30/45ms backoff, matching the engine's other
/// I/O boundary (the Postgres sink is the only place the kernel's otherwise
/// synchronous step loop touches the network).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
where F: FnMut() -> Result<T, PersistenceError> {
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * (attempts + 1) as u64;
                warn!("retryable persistence error (attempt {}): {e} -> sleeping {delay_ms}ms", attempts + 1);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Concrete `SnapshotSink` (§6) writing one row per snapshot.
pub struct PgSnapshotSink<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgSnapshotSink<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// All snapshots for one run, ordered by step — the `(run_id,
    /// step_number)` range query §6 asks for.
    pub fn list(&self, run_id: &str) -> Result<Vec<SnapshotRow>, PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            twin_state_snapshots::table.filter(twin_state_snapshots::run_id.eq(run_id)).order(twin_state_snapshots::step_number.asc()).load(&mut conn).map_err(PersistenceError::from)
        })
    }
}

impl<P: ConnectionProvider> sim_core::SnapshotSink for PgSnapshotSink<P> {
    fn write_snapshot(&self, run_id: &str, step: i64, wall_clock: DateTime<Utc>, state: Value, metrics: Value, description: &str) -> Result<(), sim_core::SimError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            let row = NewSnapshotRow { run_id, step_number: step, wall_clock, state: &state, description, metrics: &metrics };
            diesel::insert_into(twin_state_snapshots::table).values(&row).execute(&mut conn).map(|_| ()).map_err(PersistenceError::from)
        })
        .map_err(sim_core::SimError::from)
    }
}

/// Builds an r2d2 pool and runs pending migrations against it.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1).max(validated_min);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min)).max_size(validated_max).build(manager).map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Loads `.env`, reads `DbConfig`, and builds an already-migrated pool.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
