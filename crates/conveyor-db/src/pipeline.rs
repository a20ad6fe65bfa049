//! Pipeline handles and row records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use conveyor_core::{BuildStatus, EntityId, PipelineConfig};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::snapshot::GraphCache;
use crate::{DbError, DbResult};

/// A resource row within a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub name: String,
    pub active: bool,
    pub check_error: Option<String>,
}

/// A job row within a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub name: String,
    pub active: bool,
    pub build_number_seq: i64,
    pub inputs_determined: bool,
}

/// A build row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BuildRecord {
    pub id: Uuid,
    /// Name unique within the job, generated from the job's build sequence
    /// (or the global one-off sequence).
    pub name: String,
    pub job_id: Option<Uuid>,
    pub pipeline_id: Option<Uuid>,
    pub team_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: BuildStatus,
    pub manually_triggered: bool,
    pub reap_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PipelineRow {
    pub id: Uuid,
    pub name: String,
    pub team_id: Uuid,
    pub team_name: String,
    pub groups: serde_json::Value,
    pub version: i64,
    pub paused: bool,
    pub public: bool,
}

pub(crate) const PIPELINES_QUERY: &str = "
    SELECT p.id, p.name, p.team_id, t.name AS team_name,
           p.groups, p.version, p.paused, p.public
    FROM pipelines p
    JOIN teams t ON t.id = p.team_id
";

#[derive(Debug, sqlx::FromRow)]
struct PendingBuildRow {
    #[sqlx(flatten)]
    build: BuildRecord,
    job_name: String,
}

/// A handle to one pipeline. Owns the connection pool and the pipeline's
/// version-graph snapshot cache; all store operations hang off this type.
pub struct Pipeline {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) team_id: Uuid,
    pub(crate) team_name: String,
    pub(crate) groups: serde_json::Value,
    pub(crate) config_version: i64,
    pub(crate) paused: bool,
    pub(crate) public: bool,
    pub(crate) pool: PgPool,
    pub(crate) cache: Mutex<GraphCache>,
}

impl Pipeline {
    pub(crate) fn from_row(row: PipelineRow, pool: PgPool) -> Self {
        Self {
            id: row.id,
            name: row.name,
            team_id: row.team_id,
            team_name: row.team_name,
            groups: row.groups,
            config_version: row.version,
            paused: row.paused,
            public: row.public,
            pool,
            cache: Mutex::new(GraphCache::new()),
        }
    }

    pub fn id(&self) -> EntityId {
        EntityId::from_uuid(self.id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn team_id(&self) -> EntityId {
        EntityId::from_uuid(self.team_id)
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    pub fn groups(&self) -> &serde_json::Value {
        &self.groups
    }

    /// Monotonic config version used for compare-and-swap in [`set_config`].
    ///
    /// [`set_config`]: Pipeline::set_config
    pub fn config_version(&self) -> i64 {
        self.config_version
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn public(&self) -> bool {
        self.public
    }

    /// Re-read the pipeline row, refreshing the handle's cached fields.
    /// Returns false when the row is gone.
    pub async fn reload(&mut self) -> DbResult<bool> {
        let row = sqlx::query_as::<_, PipelineRow>(&format!("{PIPELINES_QUERY} WHERE p.id = $1"))
            .bind(self.id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(false);
        };

        self.name = row.name;
        self.team_id = row.team_id;
        self.team_name = row.team_name;
        self.groups = row.groups;
        self.config_version = row.version;
        self.paused = row.paused;
        self.public = row.public;
        Ok(true)
    }

    /// Read the paused flag directly from the store, bypassing the handle's
    /// cached copy.
    pub async fn check_paused(&self) -> DbResult<bool> {
        let paused = sqlx::query_scalar::<_, bool>("SELECT paused FROM pipelines WHERE id = $1")
            .bind(self.id)
            .fetch_one(&self.pool)
            .await?;
        Ok(paused)
    }

    pub async fn pause(&mut self) -> DbResult<()> {
        self.set_flag("paused", true).await?;
        self.paused = true;
        Ok(())
    }

    pub async fn unpause(&mut self) -> DbResult<()> {
        self.set_flag("paused", false).await?;
        self.paused = false;
        Ok(())
    }

    pub async fn expose(&mut self) -> DbResult<()> {
        self.set_flag("public", true).await?;
        self.public = true;
        Ok(())
    }

    pub async fn hide(&mut self) -> DbResult<()> {
        self.set_flag("public", false).await?;
        self.public = false;
        Ok(())
    }

    async fn set_flag(&self, column: &str, value: bool) -> DbResult<()> {
        let rows = sqlx::query(&format!("UPDATE pipelines SET {column} = $2 WHERE id = $1"))
            .bind(self.id)
            .bind(value)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows != 1 {
            return Err(DbError::Consistency { rows });
        }
        Ok(())
    }

    pub async fn rename(&mut self, name: &str) -> DbResult<()> {
        let rows = sqlx::query("UPDATE pipelines SET name = $2 WHERE id = $1")
            .bind(self.id)
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows != 1 {
            return Err(DbError::Consistency { rows });
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Apply a pipeline definition: bump the config version by
    /// compare-and-swap against `expected_version`, then reconcile resource
    /// and job rows (insert new, reactivate kept, deactivate dropped) in one
    /// transaction. A concurrent definition change surfaces as
    /// [`DbError::Conflict`].
    pub async fn set_config(
        &mut self,
        config: &PipelineConfig,
        expected_version: i64,
    ) -> DbResult<()> {
        let groups = serde_json::to_value(&config.groups)?;

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "UPDATE pipelines SET version = version + 1, groups = $3
             WHERE id = $1 AND version = $2",
        )
        .bind(self.id)
        .bind(expected_version)
        .bind(&groups)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(DbError::Conflict(format!(
                "pipeline '{}' config changed since version {expected_version}",
                self.name
            )));
        }

        sqlx::query("UPDATE resources SET active = false WHERE pipeline_id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;
        for resource in &config.resources {
            sqlx::query(
                "INSERT INTO resources (id, pipeline_id, name, active)
                 VALUES ($1, $2, $3, true)
                 ON CONFLICT (pipeline_id, name) DO UPDATE SET active = true",
            )
            .bind(Uuid::now_v7())
            .bind(self.id)
            .bind(&resource.name)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE jobs SET active = false WHERE pipeline_id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;
        for job in &config.jobs {
            sqlx::query(
                "INSERT INTO jobs (id, pipeline_id, name, active)
                 VALUES ($1, $2, $3, true)
                 ON CONFLICT (pipeline_id, name) DO UPDATE SET active = true",
            )
            .bind(Uuid::now_v7())
            .bind(self.id)
            .bind(&job.name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.config_version = expected_version + 1;
        self.groups = groups;
        Ok(())
    }

    /// Destroy the pipeline: delete its build-event history and its row in
    /// one transaction; children cascade with the row.
    pub async fn destroy(self) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM build_events
             WHERE build_id IN (SELECT id FROM builds WHERE pipeline_id = $1)",
        )
        .bind(self.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pipelines WHERE id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(pipeline = %self.name, "destroyed pipeline");
        Ok(())
    }

    /// Record (or clear) the last check error for a resource.
    pub async fn set_resource_check_error(
        &self,
        resource_id: EntityId,
        error: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE resources SET check_error = $2 WHERE id = $1")
            .bind(resource_id.as_uuid())
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn resource(&self, name: &str) -> DbResult<Option<ResourceRecord>> {
        let record = sqlx::query_as::<_, ResourceRecord>(
            "SELECT * FROM resources WHERE pipeline_id = $1 AND name = $2",
        )
        .bind(self.id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn resources(&self) -> DbResult<Vec<ResourceRecord>> {
        let records = sqlx::query_as::<_, ResourceRecord>(
            "SELECT * FROM resources WHERE pipeline_id = $1 ORDER BY name",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Look up an active job by name.
    pub async fn job(&self, name: &str) -> DbResult<Option<JobRecord>> {
        let record = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE pipeline_id = $1 AND name = $2 AND active",
        )
        .bind(self.id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// All active jobs, in creation order.
    pub async fn jobs(&self) -> DbResult<Vec<JobRecord>> {
        let records = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE pipeline_id = $1 AND active ORDER BY id",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Create a pending build for a job, naming it by atomically bumping the
    /// job's build sequence.
    pub async fn create_job_build(&self, job_name: &str) -> DbResult<BuildRecord> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (Uuid, i64)>(
            "UPDATE jobs SET build_number_seq = build_number_seq + 1
             WHERE name = $1 AND pipeline_id = $2
             RETURNING id, build_number_seq",
        )
        .bind(job_name)
        .bind(self.id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((job_id, build_number)) = row else {
            return Err(DbError::NotFound(format!("job '{job_name}'")));
        };

        let build = sqlx::query_as::<_, BuildRecord>(
            "INSERT INTO builds (id, name, job_id, pipeline_id, team_id, status, manually_triggered)
             VALUES ($1, $2, $3, $4, $5, 'pending', true)
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(build_number.to_string())
        .bind(job_id)
        .bind(self.id)
        .bind(self.team_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(build)
    }

    /// Create a pending build owned by the team directly, named from the
    /// global one-off sequence.
    pub async fn create_one_off_build(&self) -> DbResult<BuildRecord> {
        let build = sqlx::query_as::<_, BuildRecord>(
            "INSERT INTO builds (id, name, pipeline_id, team_id, status)
             VALUES ($1, nextval('one_off_name')::text, $2, $3, 'pending')
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(self.id)
        .bind(self.team_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(build)
    }

    /// All pending builds of active jobs, grouped by job name.
    pub async fn get_all_pending_builds(&self) -> DbResult<HashMap<String, Vec<BuildRecord>>> {
        let rows = sqlx::query_as::<_, PendingBuildRow>(
            "SELECT b.*, j.name AS job_name
             FROM builds b
             JOIN jobs j ON j.id = b.job_id
             WHERE b.status = 'pending' AND j.active AND b.pipeline_id = $1
             ORDER BY b.id",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;

        let mut builds: HashMap<String, Vec<BuildRecord>> = HashMap::new();
        for row in rows {
            builds.entry(row.job_name).or_default().push(row.build);
        }
        Ok(builds)
    }

    /// Builds that consumed the given version as an input.
    pub async fn get_builds_with_version_as_input(
        &self,
        version_id: EntityId,
    ) -> DbResult<Vec<BuildRecord>> {
        let builds = sqlx::query_as::<_, BuildRecord>(
            "SELECT DISTINCT b.*
             FROM builds b
             JOIN build_inputs bi ON bi.build_id = b.id
             WHERE bi.versioned_resource_id = $1
             ORDER BY b.id",
        )
        .bind(version_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(builds)
    }

    /// Builds that produced the given version as an output.
    pub async fn get_builds_with_version_as_output(
        &self,
        version_id: EntityId,
    ) -> DbResult<Vec<BuildRecord>> {
        let builds = sqlx::query_as::<_, BuildRecord>(
            "SELECT DISTINCT b.*
             FROM builds b
             JOIN build_outputs bo ON bo.build_id = b.id
             WHERE bo.versioned_resource_id = $1
             ORDER BY b.id",
        )
        .bind(version_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(builds)
    }

    /// Delete the event history of the given builds and stamp their
    /// `reap_time`, in one transaction.
    pub async fn delete_build_events(&self, build_ids: &[EntityId]) -> DbResult<()> {
        if build_ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = build_ids.iter().map(|id| *id.as_uuid()).collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM build_events WHERE build_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE builds SET reap_time = now() WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
