//! The versioned-resource store: idempotent ingestion with causal
//! `check_order` ranking, cursor pagination, point lookups and
//! enable/disable toggling.

use chrono::{DateTime, Utc};
use conveyor_core::{
    EntityId, MetadataField, Page, Pagination, ResourceConfig, SavedVersionedResource, Version,
    VersionedResource,
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::pipeline::Pipeline;
use crate::{DbError, DbResult};

/// One page of a resource's version history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceVersionsPage {
    pub versions: Vec<SavedVersionedResource>,
    pub pagination: Pagination,
}

#[derive(Debug, sqlx::FromRow)]
struct VersionedResourceRow {
    id: Uuid,
    enabled: bool,
    #[sqlx(rename = "type")]
    resource_type: String,
    version: String,
    metadata: String,
    modified_time: DateTime<Utc>,
    check_order: i64,
    resource_name: String,
}

impl VersionedResourceRow {
    fn into_saved(self) -> DbResult<SavedVersionedResource> {
        Ok(SavedVersionedResource {
            id: EntityId::from_uuid(self.id),
            enabled: self.enabled,
            modified_time: self.modified_time,
            check_order: self.check_order,
            versioned_resource: VersionedResource {
                resource: self.resource_name,
                resource_type: self.resource_type,
                version: serde_json::from_str(&self.version)?,
                metadata: serde_json::from_str(&self.metadata)?,
            },
        })
    }
}

const VERSIONED_RESOURCES_QUERY: &str = "
    SELECT v.id, v.enabled, v.type, v.version, v.metadata, v.modified_time, v.check_order,
           r.name AS resource_name
    FROM versioned_resources v
    JOIN resources r ON r.id = v.resource_id
    WHERE v.resource_id = $1";

impl Pipeline {
    /// Persist versions discovered by a check, oldest first, in one
    /// transaction. Re-discovering a known `(type, version)` tuple is a
    /// no-op apart from a metadata refresh when the reported metadata is
    /// non-empty and differs from what is stored; only newly discovered
    /// versions are ranked at the top of their group.
    pub async fn save_versions(
        &self,
        config: &ResourceConfig,
        versions: &[Version],
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let resource_id = resource_id_by_name(&mut tx, self.id, &config.name).await?;

        for version in versions {
            let vr = VersionedResource {
                resource: config.name.clone(),
                resource_type: config.resource_type.clone(),
                version: version.clone(),
                metadata: Vec::new(),
            };

            let (_, created) = save_versioned_resource(&mut tx, resource_id, &vr).await?;
            if created {
                bump_check_order(
                    &mut tx,
                    resource_id,
                    &config.resource_type,
                    &version.canonical_json()?,
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// A page of the resource's version history, ordered by `check_order`
    /// descending. Returns `None` when the resource does not exist or is
    /// inactive; an existing resource with no versions yields an empty page.
    pub async fn get_resource_versions(
        &self,
        resource_name: &str,
        page: Page,
    ) -> DbResult<Option<ResourceVersionsPage>> {
        let resource_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM resources WHERE name = $1 AND pipeline_id = $2 AND active",
        )
        .bind(resource_name)
        .bind(self.id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(resource_id) = resource_id else {
            return Ok(None);
        };

        // Cursor precedence mirrors the wire contract: until, since, to, from.
        let rows = if let Some(until) = page.until {
            sqlx::query_as::<_, VersionedResourceRow>(&format!(
                "SELECT sub.* FROM (
                    {VERSIONED_RESOURCES_QUERY}
                    AND v.check_order > (SELECT check_order FROM versioned_resources WHERE id = $2)
                    ORDER BY v.check_order ASC
                    LIMIT $3
                 ) sub
                 ORDER BY sub.check_order DESC"
            ))
            .bind(resource_id)
            .bind(until.as_uuid())
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?
        } else if let Some(since) = page.since {
            sqlx::query_as::<_, VersionedResourceRow>(&format!(
                "{VERSIONED_RESOURCES_QUERY}
                 AND v.check_order < (SELECT check_order FROM versioned_resources WHERE id = $2)
                 ORDER BY v.check_order DESC
                 LIMIT $3"
            ))
            .bind(resource_id)
            .bind(since.as_uuid())
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?
        } else if let Some(to) = page.to {
            sqlx::query_as::<_, VersionedResourceRow>(&format!(
                "SELECT sub.* FROM (
                    {VERSIONED_RESOURCES_QUERY}
                    AND v.check_order >= (SELECT check_order FROM versioned_resources WHERE id = $2)
                    ORDER BY v.check_order ASC
                    LIMIT $3
                 ) sub
                 ORDER BY sub.check_order DESC"
            ))
            .bind(resource_id)
            .bind(to.as_uuid())
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?
        } else if let Some(from) = page.from {
            sqlx::query_as::<_, VersionedResourceRow>(&format!(
                "{VERSIONED_RESOURCES_QUERY}
                 AND v.check_order <= (SELECT check_order FROM versioned_resources WHERE id = $2)
                 ORDER BY v.check_order DESC
                 LIMIT $3"
            ))
            .bind(resource_id)
            .bind(from.as_uuid())
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, VersionedResourceRow>(&format!(
                "{VERSIONED_RESOURCES_QUERY}
                 ORDER BY v.check_order DESC
                 LIMIT $2"
            ))
            .bind(resource_id)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?
        };

        let versions = rows
            .into_iter()
            .map(VersionedResourceRow::into_saved)
            .collect::<DbResult<Vec<_>>>()?;

        if versions.is_empty() {
            return Ok(Some(ResourceVersionsPage {
                versions,
                pagination: Pagination::default(),
            }));
        }

        let (max_order, min_order) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(MAX(check_order), 0), COALESCE(MIN(check_order), 0)
             FROM versioned_resources
             WHERE resource_id = $1",
        )
        .bind(resource_id)
        .fetch_one(&self.pool)
        .await?;

        let first = &versions[0];
        let last = &versions[versions.len() - 1];
        let pagination = compute_pagination(
            (first.id, first.check_order),
            (last.id, last.check_order),
            min_order,
            max_order,
            page.limit,
        );

        Ok(Some(ResourceVersionsPage {
            versions,
            pagination,
        }))
    }

    /// The version with the highest `check_order`, enabled or not.
    pub async fn get_latest_versioned_resource(
        &self,
        resource_name: &str,
    ) -> DbResult<Option<SavedVersionedResource>> {
        let row = sqlx::query_as::<_, VersionedResourceRow>(
            "SELECT v.id, v.enabled, v.type, v.version, v.metadata, v.modified_time,
                    v.check_order, r.name AS resource_name
             FROM versioned_resources v
             JOIN resources r ON r.id = v.resource_id
             WHERE r.name = $1 AND r.pipeline_id = $2
             ORDER BY v.check_order DESC
             LIMIT 1",
        )
        .bind(resource_name)
        .bind(self.id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(VersionedResourceRow::into_saved).transpose()
    }

    /// Point lookup by exact version-blob equality, among enabled versions
    /// only.
    pub async fn get_versioned_resource_by_version(
        &self,
        version: &Version,
        resource_name: &str,
    ) -> DbResult<Option<SavedVersionedResource>> {
        let row = sqlx::query_as::<_, VersionedResourceRow>(
            "SELECT v.id, v.enabled, v.type, v.version, v.metadata, v.modified_time,
                    v.check_order, r.name AS resource_name
             FROM versioned_resources v
             JOIN resources r ON r.id = v.resource_id
             WHERE v.version = $1 AND r.name = $2 AND r.pipeline_id = $3 AND v.enabled",
        )
        .bind(version.canonical_json()?)
        .bind(resource_name)
        .bind(self.id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(VersionedResourceRow::into_saved).transpose()
    }

    /// Include the version in resolution again.
    pub async fn enable_versioned_resource(&self, version_id: EntityId) -> DbResult<()> {
        self.toggle_versioned_resource(version_id, true).await
    }

    /// Exclude the version from resolution.
    pub async fn disable_versioned_resource(&self, version_id: EntityId) -> DbResult<()> {
        self.toggle_versioned_resource(version_id, false).await
    }

    async fn toggle_versioned_resource(&self, version_id: EntityId, enable: bool) -> DbResult<()> {
        let rows = sqlx::query(
            "UPDATE versioned_resources SET enabled = $2, modified_time = now() WHERE id = $1",
        )
        .bind(version_id.as_uuid())
        .bind(enable)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows != 1 {
            return Err(DbError::Consistency { rows });
        }
        Ok(())
    }
}

/// Resolve a resource id by name within the pipeline; absence is a hard
/// error on write paths.
pub(crate) async fn resource_id_by_name(
    conn: &mut PgConnection,
    pipeline_id: Uuid,
    name: &str,
) -> DbResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM resources WHERE name = $1 AND pipeline_id = $2")
        .bind(name)
        .bind(pipeline_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("resource '{name}'")))
}

/// Idempotent upsert of a `(resource, type, version)` tuple. A concurrent
/// duplicate insert is absorbed by the conflict clause; the desired end
/// state (row exists) is reached either way. Returns the saved row and
/// whether this call created it.
pub(crate) async fn save_versioned_resource(
    conn: &mut PgConnection,
    resource_id: Uuid,
    vr: &VersionedResource,
) -> DbResult<(SavedVersionedResource, bool)> {
    let version_json = vr.version.canonical_json()?;
    let metadata_json = serde_json::to_string(&vr.metadata)?;

    let created = sqlx::query(
        "INSERT INTO versioned_resources (id, resource_id, type, version, metadata)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (resource_id, type, version) DO NOTHING",
    )
    .bind(Uuid::now_v7())
    .bind(resource_id)
    .bind(&vr.resource_type)
    .bind(&version_json)
    .bind(&metadata_json)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        != 0;

    // Metadata is replaced wholesale on re-discovery, but only when it is
    // non-empty and actually differs; `modified_time` moves only then.
    if !vr.metadata.is_empty() {
        sqlx::query(
            "UPDATE versioned_resources
             SET metadata = $4, modified_time = now()
             WHERE resource_id = $1 AND type = $2 AND version = $3
               AND metadata IS DISTINCT FROM $4",
        )
        .bind(resource_id)
        .bind(&vr.resource_type)
        .bind(&version_json)
        .bind(&metadata_json)
        .execute(&mut *conn)
        .await?;
    }

    let (id, enabled, metadata, modified_time, check_order) =
        sqlx::query_as::<_, (Uuid, bool, String, DateTime<Utc>, i64)>(
            "SELECT id, enabled, metadata, modified_time, check_order
             FROM versioned_resources
             WHERE resource_id = $1 AND type = $2 AND version = $3",
        )
        .bind(resource_id)
        .bind(&vr.resource_type)
        .bind(&version_json)
        .fetch_one(&mut *conn)
        .await?;

    let metadata: Vec<MetadataField> = serde_json::from_str(&metadata)?;

    Ok((
        SavedVersionedResource {
            id: EntityId::from_uuid(id),
            enabled,
            modified_time,
            check_order,
            versioned_resource: VersionedResource {
                metadata,
                ..vr.clone()
            },
        },
        created,
    ))
}

/// Rank a newly created version at the top of its `(resource_id, type)`
/// group. The parent resource row is locked first so concurrent bumps for
/// one group serialize and cannot pick the same `max + 1`.
pub(crate) async fn bump_check_order(
    conn: &mut PgConnection,
    resource_id: Uuid,
    resource_type: &str,
    version_json: &str,
) -> DbResult<()> {
    sqlx::query("SELECT 1 FROM resources WHERE id = $1 FOR UPDATE")
        .bind(resource_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "WITH max_checkorder AS (
            SELECT MAX(check_order) AS co
            FROM versioned_resources
            WHERE resource_id = $1 AND type = $2
         )
         UPDATE versioned_resources v
         SET check_order = mc.co + 1
         FROM max_checkorder mc
         WHERE v.resource_id = $1 AND v.type = $2 AND v.version = $3
           AND v.check_order <= mc.co",
    )
    .bind(resource_id)
    .bind(resource_type)
    .bind(version_json)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Compute the neighboring-page cursors from the first and last returned
/// rows' `(id, check_order)` against the group's global bounds.
fn compute_pagination(
    first: (EntityId, i64),
    last: (EntityId, i64),
    min_order: i64,
    max_order: i64,
    limit: i64,
) -> Pagination {
    let mut pagination = Pagination::default();

    if first.1 < max_order {
        pagination.previous = Some(Page {
            until: Some(first.0),
            limit,
            ..Page::default()
        });
    }

    if last.1 > min_order {
        pagination.next = Some(Page {
            since: Some(last.0),
            limit,
            ..Page::default()
        });
    }

    pagination
}
