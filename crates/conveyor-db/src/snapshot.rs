//! The version-graph snapshot builder, cached per pipeline handle and
//! invalidated by a cross-table freshness timestamp.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use conveyor_core::{
    BuildInputEntry, BuildOutputEntry, EntityId, ResourceVersionEntry, VersionsGraph,
};
use tracing::debug;
use uuid::Uuid;

use crate::DbResult;
use crate::pipeline::Pipeline;

/// The snapshot cache owned by one pipeline handle. Keyed by the freshness
/// timestamp captured when the graph was built; no process-wide state.
#[derive(Debug, Default)]
pub(crate) struct GraphCache {
    entry: Option<(DateTime<Utc>, Arc<VersionsGraph>)>,
}

impl GraphCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The cached graph, if it was captured at exactly this freshness token.
    fn get(&self, token: DateTime<Utc>) -> Option<Arc<VersionsGraph>> {
        match &self.entry {
            Some((cached_at, graph)) if *cached_at == token => Some(Arc::clone(graph)),
            _ => None,
        }
    }

    fn put(&mut self, token: DateTime<Utc>, graph: Arc<VersionsGraph>) {
        self.entry = Some((token, graph));
    }
}

impl Pipeline {
    /// Materialize the pipeline's version graph for the external resolver.
    ///
    /// The freshness token is the newest `modified_time` across the
    /// pipeline's build outputs, build inputs and versioned resources; when
    /// it matches the cached snapshot's capture token the cached `Arc` is
    /// returned without touching the store again.
    pub async fn load_versions_graph(&self) -> DbResult<Arc<VersionsGraph>> {
        let token = self.latest_modified_time().await?;

        let mut cache = self.cache.lock().await;
        if let Some(graph) = cache.get(token) {
            debug!(pipeline = %self.name, %token, "versions graph cache hit");
            return Ok(graph);
        }

        let mut graph = VersionsGraph::default();

        let outputs = sqlx::query_as::<_, (Uuid, i64, Uuid, Uuid, Uuid)>(
            "SELECT v.id, v.check_order, r.id, o.build_id, b.job_id
             FROM build_outputs o
             JOIN builds b ON b.id = o.build_id
             JOIN versioned_resources v ON v.id = o.versioned_resource_id
             JOIN resources r ON r.id = v.resource_id
             WHERE v.enabled AND b.status = 'succeeded' AND b.job_id IS NOT NULL
               AND r.pipeline_id = $1",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;
        for (version_id, check_order, resource_id, build_id, job_id) in outputs {
            graph.build_outputs.push(BuildOutputEntry {
                version_id: EntityId::from_uuid(version_id),
                check_order,
                resource_id: EntityId::from_uuid(resource_id),
                build_id: EntityId::from_uuid(build_id),
                job_id: EntityId::from_uuid(job_id),
            });
        }

        let inputs = sqlx::query_as::<_, (Uuid, i64, Uuid, Uuid, Uuid, String)>(
            "SELECT v.id, v.check_order, r.id, i.build_id, b.job_id, i.input_name
             FROM build_inputs i
             JOIN builds b ON b.id = i.build_id
             JOIN versioned_resources v ON v.id = i.versioned_resource_id
             JOIN resources r ON r.id = v.resource_id
             WHERE v.enabled AND b.job_id IS NOT NULL AND r.pipeline_id = $1",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;
        for (version_id, check_order, resource_id, build_id, job_id, input_name) in inputs {
            graph.build_inputs.push(BuildInputEntry {
                version_id: EntityId::from_uuid(version_id),
                check_order,
                resource_id: EntityId::from_uuid(resource_id),
                build_id: EntityId::from_uuid(build_id),
                job_id: EntityId::from_uuid(job_id),
                input_name,
            });
        }

        let versions = sqlx::query_as::<_, (Uuid, i64, Uuid)>(
            "SELECT v.id, v.check_order, r.id
             FROM versioned_resources v
             JOIN resources r ON r.id = v.resource_id
             WHERE v.enabled AND r.pipeline_id = $1",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;
        for (version_id, check_order, resource_id) in versions {
            graph.resource_versions.push(ResourceVersionEntry {
                version_id: EntityId::from_uuid(version_id),
                check_order,
                resource_id: EntityId::from_uuid(resource_id),
            });
        }

        let jobs =
            sqlx::query_as::<_, (String, Uuid)>("SELECT name, id FROM jobs WHERE pipeline_id = $1")
                .bind(self.id)
                .fetch_all(&self.pool)
                .await?;
        for (name, id) in jobs {
            graph.job_ids.insert(name, EntityId::from_uuid(id));
        }

        let resources = sqlx::query_as::<_, (String, Uuid)>(
            "SELECT name, id FROM resources WHERE pipeline_id = $1",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;
        for (name, id) in resources {
            graph.resource_ids.insert(name, EntityId::from_uuid(id));
        }

        debug!(
            pipeline = %self.name,
            %token,
            outputs = graph.build_outputs.len(),
            inputs = graph.build_inputs.len(),
            versions = graph.resource_versions.len(),
            "rebuilt versions graph"
        );

        let graph = Arc::new(graph);
        cache.put(token, Arc::clone(&graph));
        Ok(graph)
    }

    /// The newest `modified_time` across the three tables feeding the graph.
    async fn latest_modified_time(&self) -> DbResult<DateTime<Utc>> {
        let latest = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT GREATEST(
                (SELECT COALESCE(MAX(o.modified_time), 'epoch'::timestamptz)
                 FROM build_outputs o
                 JOIN versioned_resources v ON v.id = o.versioned_resource_id
                 JOIN resources r ON r.id = v.resource_id
                 WHERE r.pipeline_id = $1),
                (SELECT COALESCE(MAX(i.modified_time), 'epoch'::timestamptz)
                 FROM build_inputs i
                 JOIN versioned_resources v ON v.id = i.versioned_resource_id
                 JOIN resources r ON r.id = v.resource_id
                 WHERE r.pipeline_id = $1),
                (SELECT COALESCE(MAX(v.modified_time), 'epoch'::timestamptz)
                 FROM versioned_resources v
                 JOIN resources r ON r.id = v.resource_id
                 WHERE r.pipeline_id = $1)
             )",
        )
        .bind(self.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }
}
