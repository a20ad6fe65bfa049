//! Root store handle: teams and pipeline creation/lookup.

use conveyor_core::EntityId;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::pipeline::{PIPELINES_QUERY, Pipeline, PipelineRow};
use crate::{DbError, DbResult};

/// A team row. Teams own pipelines and one-off builds.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamRecord {
    pub id: Uuid,
    pub name: String,
}

/// The root factory for pipeline handles.
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_team(&self, name: &str) -> DbResult<TeamRecord> {
        let team = sqlx::query_as::<_, TeamRecord>(
            "INSERT INTO teams (id, name) VALUES ($1, $2) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(team)
    }

    pub async fn create_pipeline(&self, team_id: EntityId, name: &str) -> DbResult<Pipeline> {
        let pipeline_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO pipelines (id, name, team_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(team_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        let row =
            sqlx::query_as::<_, PipelineRow>(&format!("{PIPELINES_QUERY} WHERE p.id = $1"))
                .bind(pipeline_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(Pipeline::from_row(row, self.pool.clone()))
    }

    /// Look up a pipeline by team and name.
    pub async fn find_pipeline(
        &self,
        team_name: &str,
        pipeline_name: &str,
    ) -> DbResult<Option<Pipeline>> {
        let row = sqlx::query_as::<_, PipelineRow>(&format!(
            "{PIPELINES_QUERY} WHERE t.name = $1 AND p.name = $2"
        ))
        .bind(team_name)
        .bind(pipeline_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Pipeline::from_row(row, self.pool.clone())))
    }

    /// Like [`find_pipeline`], but absence is an error.
    ///
    /// [`find_pipeline`]: Store::find_pipeline
    pub async fn pipeline(&self, team_name: &str, pipeline_name: &str) -> DbResult<Pipeline> {
        self.find_pipeline(team_name, pipeline_name)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("pipeline '{team_name}/{pipeline_name}'")))
    }
}
