//! Integration tests against a live PostgreSQL instance.
//!
//! Set `DATABASE_URL` (directly or via `.env`) to run them; without it every
//! test skips. Each test works in its own uniquely named team and pipeline,
//! so the suite can run against a shared database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use conveyor_core::{
    BuildInput, BuildStatus, EntityId, InputVersion, JobConfig, MetadataField, Page,
    PipelineConfig, ResourceConfig, Version, VersionedResource,
};
use conveyor_db::{DbError, MappingKind, Pipeline, Store};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = conveyor_db::create_pool(&url).await.expect("connect");
    conveyor_db::run_migrations(&pool).await.expect("migrate");
    Some(pool)
}

struct Fixture {
    pool: PgPool,
    store: Store,
    pipeline: Pipeline,
}

impl Fixture {
    async fn new(pool: PgPool, prefix: &str) -> Self {
        let store = Store::new(pool.clone());
        let suffix = Uuid::new_v4().simple().to_string();

        let team = store
            .create_team(&format!("{prefix}-team-{suffix}"))
            .await
            .expect("create team");
        let mut pipeline = store
            .create_pipeline(EntityId::from_uuid(team.id), &format!("{prefix}-{suffix}"))
            .await
            .expect("create pipeline");

        pipeline
            .set_config(&default_config(), pipeline.config_version())
            .await
            .expect("set config");

        Self {
            pool,
            store,
            pipeline,
        }
    }

    async fn latest_modified_time(&self, resource_name: &str) -> DateTime<Utc> {
        self.pipeline
            .get_latest_versioned_resource(resource_name)
            .await
            .expect("latest")
            .expect("some version")
            .modified_time
    }

    async fn set_build_status(&self, build_id: Uuid, status: BuildStatus) {
        sqlx::query("UPDATE builds SET status = $2 WHERE id = $1")
            .bind(build_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .expect("set status");
    }
}

fn default_config() -> PipelineConfig {
    PipelineConfig {
        groups: Vec::new(),
        resources: vec![
            ResourceConfig {
                name: "repo".to_string(),
                resource_type: "git".to_string(),
            },
            ResourceConfig {
                name: "image".to_string(),
                resource_type: "registry".to_string(),
            },
        ],
        jobs: vec![
            JobConfig {
                name: "unit".to_string(),
            },
            JobConfig {
                name: "deploy".to_string(),
            },
        ],
    }
}

fn repo_config() -> ResourceConfig {
    ResourceConfig {
        name: "repo".to_string(),
        resource_type: "git".to_string(),
    }
}

fn version(r: &str) -> Version {
    Version::new().with("ref", r)
}

fn repo_vr(r: &str, metadata: Vec<MetadataField>) -> VersionedResource {
    VersionedResource {
        resource: "repo".to_string(),
        resource_type: "git".to_string(),
        version: version(r),
        metadata,
    }
}

#[tokio::test]
async fn resaving_an_identical_version_is_a_no_op() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "idempotent").await;

    f.pipeline
        .save_versions(&repo_config(), &[version("v1")])
        .await
        .unwrap();
    let first = f
        .pipeline
        .get_latest_versioned_resource("repo")
        .await
        .unwrap()
        .unwrap();

    f.pipeline
        .save_versions(&repo_config(), &[version("v1")])
        .await
        .unwrap();
    let second = f
        .pipeline
        .get_latest_versioned_resource("repo")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.check_order, first.check_order);
    assert_eq!(second.modified_time, first.modified_time);

    let page = f
        .pipeline
        .get_resource_versions("repo", Page::first(100))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page.versions.len(), 1);
}

#[tokio::test]
async fn check_order_ranks_versions_by_discovery_recency() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "check-order").await;

    for v in ["v1", "v2", "v3"] {
        f.pipeline
            .save_versions(&repo_config(), &[version(v)])
            .await
            .unwrap();
    }
    f.pipeline
        .save_versions(&repo_config(), &[version("v4"), version("v5")])
        .await
        .unwrap();

    let page = f
        .pipeline
        .get_resource_versions("repo", Page::first(100))
        .await
        .unwrap()
        .unwrap();
    let orders: Vec<i64> = page.versions.iter().map(|v| v.check_order).collect();
    assert_eq!(orders, vec![5, 4, 3, 2, 1]);

    // Re-discovering an old version must not re-rank it.
    f.pipeline
        .save_versions(&repo_config(), &[version("v2")])
        .await
        .unwrap();
    let latest = f
        .pipeline
        .get_latest_versioned_resource("repo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.versioned_resource.version, version("v5"));
    assert_eq!(latest.check_order, 5);
}

#[tokio::test]
async fn metadata_refresh_moves_modified_time_only_when_it_differs() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "metadata").await;

    f.pipeline
        .save_versions(&repo_config(), &[version("v1")])
        .await
        .unwrap();
    let build = f.pipeline.create_job_build("unit").await.unwrap();
    let build_id = EntityId::from_uuid(build.id);
    let t0 = f.latest_modified_time("repo").await;

    let metadata = vec![MetadataField {
        name: "committer".to_string(),
        value: "alice".to_string(),
    }];
    let input = BuildInput {
        name: "repo".to_string(),
        versioned_resource: repo_vr("v1", metadata.clone()),
        first_occurrence: true,
    };

    f.pipeline.save_build_input(build_id, &input).await.unwrap();
    let t1 = f.latest_modified_time("repo").await;
    assert!(t1 > t0, "new metadata must move modified_time");

    let latest = f
        .pipeline
        .get_latest_versioned_resource("repo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.versioned_resource.metadata, metadata);

    // Identical metadata again: nothing moves.
    f.pipeline.save_build_input(build_id, &input).await.unwrap();
    let t2 = f.latest_modified_time("repo").await;
    assert_eq!(t2, t1);
}

#[tokio::test]
async fn pagination_round_trips_the_whole_history() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "pagination").await;

    for v in ["v1", "v2", "v3", "v4", "v5"] {
        f.pipeline
            .save_versions(&repo_config(), &[version(v)])
            .await
            .unwrap();
    }

    let unbounded = f
        .pipeline
        .get_resource_versions("repo", Page::first(100))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unbounded.versions.len(), 5);
    assert!(unbounded.pagination.previous.is_none());
    assert!(unbounded.pagination.next.is_none());

    let mut walked = Vec::new();
    let mut page = Page::first(2);
    loop {
        let result = f
            .pipeline
            .get_resource_versions("repo", page)
            .await
            .unwrap()
            .unwrap();
        walked.extend(result.versions);
        match result.pagination.next {
            Some(next) => page = next,
            None => break,
        }
    }

    let walked_ids: Vec<EntityId> = walked.iter().map(|v| v.id).collect();
    let unbounded_ids: Vec<EntityId> = unbounded.versions.iter().map(|v| v.id).collect();
    assert_eq!(walked_ids, unbounded_ids);

    // The previous cursor from the middle page re-reads the newer rows.
    let middle = f
        .pipeline
        .get_resource_versions(
            "repo",
            Page {
                since: Some(unbounded.versions[1].id),
                ..Page::first(2)
            },
        )
        .await
        .unwrap()
        .unwrap();
    let previous = middle.pagination.previous.unwrap();
    let newer = f
        .pipeline
        .get_resource_versions("repo", previous)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        newer.versions.first().map(|v| v.id),
        Some(unbounded.versions[0].id)
    );
}

#[tokio::test]
async fn missing_resources_are_distinct_from_empty_histories() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "not-found").await;

    assert!(
        f.pipeline
            .get_resource_versions("no-such-resource", Page::first(10))
            .await
            .unwrap()
            .is_none()
    );

    let empty = f
        .pipeline
        .get_resource_versions("repo", Page::first(10))
        .await
        .unwrap()
        .unwrap();
    assert!(empty.versions.is_empty());
    assert!(empty.pagination.previous.is_none());
    assert!(empty.pagination.next.is_none());
}

#[tokio::test]
async fn disabled_versions_are_hidden_from_by_value_lookup_only() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "disabled").await;

    f.pipeline
        .save_versions(&repo_config(), &[version("a"), version("b")])
        .await
        .unwrap();

    let page = f
        .pipeline
        .get_resource_versions("repo", Page::first(10))
        .await
        .unwrap()
        .unwrap();
    let b = &page.versions[0];
    let a = &page.versions[1];
    assert_eq!(a.versioned_resource.version, version("a"));

    f.pipeline.disable_versioned_resource(a.id).await.unwrap();

    let latest = f
        .pipeline
        .get_latest_versioned_resource("repo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, b.id);

    assert!(
        f.pipeline
            .get_versioned_resource_by_version(&version("a"), "repo")
            .await
            .unwrap()
            .is_none()
    );

    // The latest lookup deliberately ignores the enabled flag.
    f.pipeline.disable_versioned_resource(b.id).await.unwrap();
    let still_latest = f
        .pipeline
        .get_latest_versioned_resource("repo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_latest.id, b.id);
    assert!(!still_latest.enabled);
    assert!(
        f.pipeline
            .get_versioned_resource_by_version(&version("b"), "repo")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn toggling_an_unknown_version_is_a_consistency_error() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "toggle").await;

    let err = f
        .pipeline
        .disable_versioned_resource(EntityId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Consistency { rows: 0 }));
}

#[tokio::test]
async fn inputs_deduplicate_but_outputs_do_not() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "build-io").await;

    let build = f.pipeline.create_job_build("unit").await.unwrap();
    let build_id = EntityId::from_uuid(build.id);

    let input = BuildInput {
        name: "repo".to_string(),
        versioned_resource: repo_vr("v1", Vec::new()),
        first_occurrence: true,
    };
    f.pipeline.save_build_input(build_id, &input).await.unwrap();
    f.pipeline.save_build_input(build_id, &input).await.unwrap();

    let input_rows =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM build_inputs WHERE build_id = $1")
            .bind(build.id)
            .fetch_one(&f.pool)
            .await
            .unwrap();
    assert_eq!(input_rows, 1);

    let vr = repo_vr("v1", Vec::new());
    f.pipeline
        .save_build_output(build_id, &vr, true)
        .await
        .unwrap();
    f.pipeline
        .save_build_output(build_id, &vr, true)
        .await
        .unwrap();

    let output_rows =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM build_outputs WHERE build_id = $1")
            .bind(build.id)
            .fetch_one(&f.pool)
            .await
            .unwrap();
    assert_eq!(output_rows, 2);
}

#[tokio::test]
async fn unknown_resources_fail_build_io_hard() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "build-io-missing").await;

    let build = f.pipeline.create_job_build("unit").await.unwrap();
    let vr = VersionedResource {
        resource: "no-such-resource".to_string(),
        resource_type: "git".to_string(),
        version: version("v1"),
        metadata: Vec::new(),
    };

    let err = f
        .pipeline
        .save_build_output(EntityId::from_uuid(build.id), &vr, false)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

#[tokio::test]
async fn job_input_mapping_reconciles_idempotently() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "mapping").await;

    f.pipeline
        .save_versions(&repo_config(), &[version("v1"), version("v2")])
        .await
        .unwrap();
    let page = f
        .pipeline
        .get_resource_versions("repo", Page::first(10))
        .await
        .unwrap()
        .unwrap();
    let (v2, v1) = (page.versions[0].id, page.versions[1].id);

    let mapping = HashMap::from([(
        "repo".to_string(),
        InputVersion {
            version_id: v1,
            first_occurrence: true,
        },
    )]);

    f.pipeline
        .save_job_input_mapping(MappingKind::Next, &mapping, "unit")
        .await
        .unwrap();
    let job = f.pipeline.job("unit").await.unwrap().unwrap();
    assert!(job.inputs_determined);

    let rows_once = next_mapping_rows(&f.pool, job.id).await;
    f.pipeline
        .save_job_input_mapping(MappingKind::Next, &mapping, "unit")
        .await
        .unwrap();
    let rows_twice = next_mapping_rows(&f.pool, job.id).await;
    assert_eq!(rows_once, rows_twice);

    // A changed mapping replaces exactly the changed entry.
    let changed = HashMap::from([(
        "repo".to_string(),
        InputVersion {
            version_id: v2,
            first_occurrence: true,
        },
    )]);
    f.pipeline
        .save_job_input_mapping(MappingKind::Next, &changed, "unit")
        .await
        .unwrap();
    let rows_changed = next_mapping_rows(&f.pool, job.id).await;
    assert_eq!(rows_changed.len(), 1);
    assert_eq!(rows_changed[0].1, *v2.as_uuid());

    let inputs = f
        .pipeline
        .get_job_build_inputs(MappingKind::Next, "unit")
        .await
        .unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].versioned_resource.version, version("v2"));

    // The independent table is untouched by next-mapping writes.
    let independent = f
        .pipeline
        .get_job_build_inputs(MappingKind::Independent, "unit")
        .await
        .unwrap();
    assert!(independent.is_empty());
}

async fn next_mapping_rows(pool: &PgPool, job_id: Uuid) -> Vec<(String, Uuid, bool)> {
    sqlx::query_as::<_, (String, Uuid, bool)>(
        "SELECT input_name, version_id, first_occurrence
         FROM next_build_inputs
         WHERE job_id = $1
         ORDER BY input_name",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn scheduling_lock_enforces_interval_and_exclusion() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "lock").await;

    let lock = f
        .pipeline
        .acquire_scheduling_lock(Duration::ZERO)
        .await
        .unwrap()
        .expect("first acquisition");

    let scheduled_after_first = last_scheduled(&f.pool, *f.pipeline.id().as_uuid()).await;

    // Held elsewhere: not acquired, and the interval check is rolled back.
    let contended = f
        .pipeline
        .acquire_scheduling_lock(Duration::ZERO)
        .await
        .unwrap();
    assert!(contended.is_none());
    assert_eq!(
        last_scheduled(&f.pool, *f.pipeline.id().as_uuid()).await,
        scheduled_after_first
    );

    lock.release().await.unwrap();

    // Released, but the minimum interval has not elapsed.
    let too_soon = f
        .pipeline
        .acquire_scheduling_lock(Duration::from_secs(3600))
        .await
        .unwrap();
    assert!(too_soon.is_none());
    assert_eq!(
        last_scheduled(&f.pool, *f.pipeline.id().as_uuid()).await,
        scheduled_after_first
    );

    let reacquired = f
        .pipeline
        .acquire_scheduling_lock(Duration::ZERO)
        .await
        .unwrap()
        .expect("reacquire after release");
    reacquired.release().await.unwrap();
}

async fn last_scheduled(pool: &PgPool, pipeline_id: Uuid) -> DateTime<Utc> {
    sqlx::query_scalar::<_, DateTime<Utc>>("SELECT last_scheduled FROM pipelines WHERE id = $1")
        .bind(pipeline_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn versions_graph_is_cached_until_a_source_table_moves() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "snapshot").await;

    f.pipeline
        .save_versions(&repo_config(), &[version("v1")])
        .await
        .unwrap();

    let first = f.pipeline.load_versions_graph().await.unwrap();
    let second = f.pipeline.load_versions_graph().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.resource_versions.len(), 1);
    assert!(first.job_ids.contains_key("unit"));
    assert!(first.resource_ids.contains_key("repo"));

    // A build output invalidates the cache and appears in the rebuild.
    let build = f.pipeline.create_job_build("unit").await.unwrap();
    f.set_build_status(build.id, BuildStatus::Succeeded).await;
    f.pipeline
        .save_build_output(
            EntityId::from_uuid(build.id),
            &repo_vr("v1", Vec::new()),
            true,
        )
        .await
        .unwrap();

    let rebuilt = f.pipeline.load_versions_graph().await.unwrap();
    assert!(!Arc::ptr_eq(&second, &rebuilt));
    assert_eq!(rebuilt.build_outputs.len(), 1);
    assert_eq!(
        rebuilt.build_outputs[0].build_id,
        EntityId::from_uuid(build.id)
    );

    // Disabled versions drop out of the graph.
    let latest = f
        .pipeline
        .get_latest_versioned_resource("repo")
        .await
        .unwrap()
        .unwrap();
    f.pipeline
        .disable_versioned_resource(latest.id)
        .await
        .unwrap();
    let without_disabled = f.pipeline.load_versions_graph().await.unwrap();
    assert!(without_disabled.resource_versions.is_empty());
    assert!(without_disabled.build_outputs.is_empty());
}

#[tokio::test]
async fn transition_build_is_the_first_status_change() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "transition").await;

    let mut builds = Vec::new();
    for status in [
        BuildStatus::Succeeded,
        BuildStatus::Succeeded,
        BuildStatus::Failed,
        BuildStatus::Succeeded,
    ] {
        let build = f.pipeline.create_job_build("unit").await.unwrap();
        f.set_build_status(build.id, status).await;
        builds.push(build);
        // Keep ids strictly creation-ordered.
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    // A job whose outcome never changed falls back to its first build.
    let steady = f.pipeline.create_job_build("deploy").await.unwrap();
    f.set_build_status(steady.id, BuildStatus::Succeeded).await;

    let dashboard = f.pipeline.dashboard().await.unwrap();
    assert_eq!(dashboard.len(), 2);

    let unit = dashboard
        .iter()
        .find(|entry| entry.job.name == "unit")
        .unwrap();
    assert_eq!(
        unit.transition_build.as_ref().unwrap().id,
        builds[2].id,
        "transition is the first build whose status differs from its predecessor"
    );
    assert_eq!(unit.finished_build.as_ref().unwrap().id, builds[3].id);
    assert!(unit.next_build.is_none());

    let deploy = dashboard
        .iter()
        .find(|entry| entry.job.name == "deploy")
        .unwrap();
    assert_eq!(deploy.transition_build.as_ref().unwrap().id, steady.id);
}

#[tokio::test]
async fn dashboard_prefers_started_builds_as_next() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "dashboard-next").await;

    let pending = f.pipeline.create_job_build("unit").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let started = f.pipeline.create_job_build("unit").await.unwrap();
    f.set_build_status(started.id, BuildStatus::Started).await;

    let dashboard = f.pipeline.dashboard().await.unwrap();
    let unit = dashboard
        .iter()
        .find(|entry| entry.job.name == "unit")
        .unwrap();
    assert_eq!(unit.next_build.as_ref().unwrap().id, started.id);
    assert!(unit.finished_build.is_none());

    // With the started build finished, the pending one becomes next.
    f.set_build_status(started.id, BuildStatus::Errored).await;
    let dashboard = f.pipeline.dashboard().await.unwrap();
    let unit = dashboard
        .iter()
        .find(|entry| entry.job.name == "unit")
        .unwrap();
    assert_eq!(unit.next_build.as_ref().unwrap().id, pending.id);
    assert_eq!(unit.finished_build.as_ref().unwrap().id, started.id);

    // Several pending builds: the most recently created one wins.
    tokio::time::sleep(Duration::from_millis(2)).await;
    let newer_pending = f.pipeline.create_job_build("unit").await.unwrap();
    let dashboard = f.pipeline.dashboard().await.unwrap();
    let unit = dashboard
        .iter()
        .find(|entry| entry.job.name == "unit")
        .unwrap();
    assert_eq!(unit.next_build.as_ref().unwrap().id, newer_pending.id);
}

#[tokio::test]
async fn builds_are_named_by_the_job_sequence() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "build-names").await;

    let first = f.pipeline.create_job_build("unit").await.unwrap();
    let second = f.pipeline.create_job_build("unit").await.unwrap();
    assert_eq!(first.name, "1");
    assert_eq!(second.name, "2");
    assert_eq!(first.status, BuildStatus::Pending);

    let pending = f.pipeline.get_all_pending_builds().await.unwrap();
    assert_eq!(pending.get("unit").map(Vec::len), Some(2));

    let one_off = f.pipeline.create_one_off_build().await.unwrap();
    assert!(one_off.job_id.is_none());
    assert!(!one_off.name.is_empty());
}

#[tokio::test]
async fn set_config_is_compare_and_swap() {
    let Some(pool) = test_pool().await else { return };
    let mut f = Fixture::new(pool, "config-cas").await;

    let stale = f.pipeline.config_version() - 1;
    let err = f
        .pipeline
        .set_config(&default_config(), stale)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    // A successful apply deactivates dropped resources; their history stops
    // being served.
    f.pipeline
        .save_versions(&repo_config(), &[version("v1")])
        .await
        .unwrap();
    let mut without_repo = default_config();
    without_repo.resources.retain(|r| r.name != "repo");
    let current = f.pipeline.config_version();
    f.pipeline.set_config(&without_repo, current).await.unwrap();
    assert_eq!(f.pipeline.config_version(), current + 1);

    assert!(
        f.pipeline
            .get_resource_versions("repo", Page::first(10))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn destroy_removes_the_pipeline_and_its_history() {
    let Some(pool) = test_pool().await else { return };
    let f = Fixture::new(pool, "destroy").await;

    let team_name = f.pipeline.team_name().to_string();
    let pipeline_name = f.pipeline.name().to_string();

    let build = f.pipeline.create_job_build("unit").await.unwrap();
    sqlx::query("INSERT INTO build_events (build_id, event_id, type, payload) VALUES ($1, 0, 'log', 'hello')")
        .bind(build.id)
        .execute(&f.pool)
        .await
        .unwrap();

    f.pipeline.destroy().await.unwrap();

    assert!(
        f.store
            .find_pipeline(&team_name, &pipeline_name)
            .await
            .unwrap()
            .is_none()
    );
    let events =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM build_events WHERE build_id = $1")
            .bind(build.id)
            .fetch_one(&f.pool)
            .await
            .unwrap();
    assert_eq!(events, 0);
}
