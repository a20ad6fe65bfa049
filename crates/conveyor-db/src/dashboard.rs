//! Per-job dashboard state: next build, latest finished build, and the
//! transition build where the job's outcome last changed character.

use std::collections::HashMap;

use conveyor_core::BuildStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DbResult;
use crate::pipeline::{BuildRecord, JobRecord, Pipeline};

/// Dashboard state for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardJob {
    pub job: JobRecord,
    /// Latest started build, else latest pending build.
    pub next_build: Option<BuildRecord>,
    /// Latest build with a terminal status.
    pub finished_build: Option<BuildRecord>,
    /// The first finished build whose status differs from its immediate
    /// predecessor's; the job's very first build when no transition has
    /// ever occurred.
    pub transition_build: Option<BuildRecord>,
}

impl Pipeline {
    /// Compute dashboard state for every active job. Any failed lookup
    /// aborts the whole computation; a partial dashboard is never returned.
    pub async fn dashboard(&self) -> DbResult<Vec<DashboardJob>> {
        let jobs = self.jobs().await?;

        let started = self
            .last_job_builds_where(&format!("b.status = '{}'", BuildStatus::Started))
            .await?;
        let pending = self
            .last_job_builds_where(&format!("b.status = '{}'", BuildStatus::Pending))
            .await?;
        let finished = self
            .last_job_builds_where(&format!(
                "b.status NOT IN ('{}', '{}')",
                BuildStatus::Pending,
                BuildStatus::Started
            ))
            .await?;
        let transitions = self.transition_builds().await?;

        Ok(assemble_dashboard(
            jobs,
            started,
            pending,
            finished,
            transitions,
        ))
    }

    /// The latest build per job among builds satisfying `condition`. Ids are
    /// UUIDv7, so the highest id per job is the most recently created build;
    /// `DISTINCT ON` with a descending id order picks it (Postgres has no
    /// `max(uuid)` aggregate).
    async fn last_job_builds_where(
        &self,
        condition: &str,
    ) -> DbResult<HashMap<Uuid, BuildRecord>> {
        let builds = sqlx::query_as::<_, BuildRecord>(&format!(
            "SELECT DISTINCT ON (b.job_id) b.*
             FROM builds b
             JOIN jobs j ON j.id = b.job_id
             WHERE j.pipeline_id = $1 AND {condition}
             ORDER BY b.job_id, b.id DESC"
        ))
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(by_job_id(builds))
    }

    /// Per job, the first finished build whose status differs from the one
    /// immediately preceding it, computed with a window over the per-job
    /// finished-build sequence; jobs with no transition fall back to their
    /// very first build.
    async fn transition_builds(&self) -> DbResult<HashMap<Uuid, BuildRecord>> {
        let transitions = sqlx::query_as::<_, BuildRecord>(&format!(
            "WITH finished AS (
                SELECT b.*,
                       LAG(b.status) OVER (PARTITION BY b.job_id ORDER BY b.id) AS prev_status
                FROM builds b
                JOIN jobs j ON j.id = b.job_id
                WHERE j.pipeline_id = $1 AND b.status NOT IN ('{}', '{}')
             )
             SELECT DISTINCT ON (job_id)
                    id, name, job_id, pipeline_id, team_id, status,
                    manually_triggered, reap_time, created_at
             FROM finished
             WHERE prev_status IS NOT NULL AND status IS DISTINCT FROM prev_status
             ORDER BY job_id, id ASC",
            BuildStatus::Pending,
            BuildStatus::Started
        ))
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_job = by_job_id(transitions);

        let first_builds = sqlx::query_as::<_, BuildRecord>(
            "SELECT DISTINCT ON (b.job_id) b.*
             FROM builds b
             JOIN jobs j ON j.id = b.job_id
             WHERE j.pipeline_id = $1
             ORDER BY b.job_id, b.id ASC",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;

        for build in first_builds {
            if let Some(job_id) = build.job_id {
                by_job.entry(job_id).or_insert(build);
            }
        }

        Ok(by_job)
    }
}

fn by_job_id(builds: Vec<BuildRecord>) -> HashMap<Uuid, BuildRecord> {
    builds
        .into_iter()
        .filter_map(|build| build.job_id.map(|job_id| (job_id, build)))
        .collect()
}

fn assemble_dashboard(
    jobs: Vec<JobRecord>,
    mut started: HashMap<Uuid, BuildRecord>,
    mut pending: HashMap<Uuid, BuildRecord>,
    mut finished: HashMap<Uuid, BuildRecord>,
    mut transitions: HashMap<Uuid, BuildRecord>,
) -> Vec<DashboardJob> {
    jobs.into_iter()
        .map(|job| {
            let next_build = started
                .remove(&job.id)
                .or_else(|| pending.remove(&job.id));
            DashboardJob {
                next_build,
                finished_build: finished.remove(&job.id),
                transition_build: transitions.remove(&job.id),
                job,
            }
        })
        .collect()
}
