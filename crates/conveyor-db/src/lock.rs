//! The per-pipeline scheduling lock: a minimum re-schedule interval check
//! paired with an advisory lock, so at most one scheduling pass runs per
//! pipeline at a time.

use std::time::Duration;

use sqlx::{Connection, PgConnection};
use tracing::{info, warn};
use uuid::Uuid;

use crate::DbResult;
use crate::pipeline::Pipeline;

/// Advisory-lock class for pipeline scheduling locks.
const SCHEDULING_LOCK_CLASS: i32 = 1;

/// Advisory locks take integer keys; use the id's leading bytes. A
/// collision merely serializes two pipelines' scheduling passes.
fn advisory_key(pipeline_id: Uuid) -> i32 {
    let bytes = pipeline_id.as_bytes();
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// A held scheduling lock. The advisory lock lives on a dedicated session
/// owned by this guard, so dropping the guard (on any exit path) closes the
/// session and the server releases the lock; call [`release`] to let go of
/// it promptly.
///
/// [`release`]: SchedulingLock::release
pub struct SchedulingLock {
    conn: Option<PgConnection>,
    key: i32,
    pipeline: String,
}

impl SchedulingLock {
    /// Explicitly unlock and close the session.
    pub async fn release(mut self) -> DbResult<()> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query("SELECT pg_advisory_unlock($1, $2)")
                .bind(SCHEDULING_LOCK_CLASS)
                .bind(self.key)
                .execute(&mut conn)
                .await?;
            conn.close().await?;
            info!(pipeline = %self.pipeline, "released scheduling lock");
        }
        Ok(())
    }
}

impl Drop for SchedulingLock {
    fn drop(&mut self) {
        // The session closes with the connection, which releases the
        // advisory lock server-side.
        if self.conn.is_some() {
            warn!(pipeline = %self.pipeline, "scheduling lock dropped without release");
        }
    }
}

impl Pipeline {
    /// Try to start a scheduling pass. Two-phase gate: within a transaction,
    /// advance `last_scheduled` only if more than `interval` has elapsed
    /// since the previous pass (zero rows affected means the interval has
    /// not elapsed); then take the pipeline's advisory lock on a dedicated
    /// session. If the lock is held elsewhere the transaction is rolled
    /// back, leaving `last_scheduled` untouched. Returns `None` when not
    /// acquired.
    pub async fn acquire_scheduling_lock(
        &self,
        interval: Duration,
    ) -> DbResult<Option<SchedulingLock>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE pipelines
             SET last_scheduled = now()
             WHERE id = $1 AND now() - last_scheduled > make_interval(secs => $2)",
        )
        .bind(self.id)
        .bind(interval.as_secs_f64())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(None);
        }

        // The lock outlives the transaction, so it gets its own session
        // rather than one recycled through the pool.
        let mut conn = self.pool.acquire().await?.detach();
        let key = advisory_key(self.id);

        let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1, $2)")
            .bind(SCHEDULING_LOCK_CLASS)
            .bind(key)
            .fetch_one(&mut conn)
            .await?;
        if !acquired {
            conn.close().await?;
            // tx drops here, rolling back the timestamp advance.
            return Ok(None);
        }

        match tx.commit().await {
            Ok(()) => {
                info!(pipeline = %self.name, "acquired scheduling lock");
                Ok(Some(SchedulingLock {
                    conn: Some(conn),
                    key,
                    pipeline: self.name.clone(),
                }))
            }
            Err(err) => {
                // Partial state must never be committed; give the lock back
                // and surface the failure.
                let _ = sqlx::query("SELECT pg_advisory_unlock($1, $2)")
                    .bind(SCHEDULING_LOCK_CLASS)
                    .bind(key)
                    .execute(&mut conn)
                    .await;
                let _ = conn.close().await;
                Err(err.into())
            }
        }
    }
}
