//! PostgreSQL-backed metadata store and scheduling coordinator for Conveyor.
//!
//! Persists and serves the state a pipeline needs to decide what to build
//! next: resource versions discovered by checks (with causal `check_order`
//! ranking), the inputs and outputs of each build, per-job candidate input
//! mappings, a cached version-graph snapshot for the external resolver, and
//! a per-pipeline scheduling lock.

pub mod build_io;
pub mod dashboard;
pub mod error;
pub mod lock;
pub mod pipeline;
pub mod snapshot;
pub mod store;
pub mod versions;

pub use build_io::MappingKind;
pub use dashboard::DashboardJob;
pub use error::{DbError, DbResult};
pub use lock::SchedulingLock;
pub use pipeline::{BuildRecord, JobRecord, Pipeline, ResourceRecord};
pub use store::{Store, TeamRecord};
pub use versions::ResourceVersionsPage;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
