//! The build I/O recorder: which versions a build consumed and produced,
//! and reconciliation of per-job candidate input mappings.


use conveyor_core::{
    BuildInput, EntityId, InputMapping, InputVersion, MetadataField, Version, VersionedResource,
};
use uuid::Uuid;

use crate::pipeline::Pipeline;
use crate::versions::{bump_check_order, resource_id_by_name, save_versioned_resource};
use crate::{DbError, DbResult};

/// Which candidate-input table a mapping targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// Inputs considered without regard to other jobs' in-flight
    /// resolutions.
    Independent,
    /// The mapping that determines the next build to actually run.
    Next,
}

impl MappingKind {
    fn table(self) -> &'static str {
        match self {
            MappingKind::Independent => "independent_build_inputs",
            MappingKind::Next => "next_build_inputs",
        }
    }
}

impl Pipeline {
    /// Record a version consumed by a build. Re-recording the same input is
    /// a no-op, not an error.
    pub async fn save_build_input(&self, build_id: EntityId, input: &BuildInput) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let resource_id =
            resource_id_by_name(&mut tx, self.id, &input.versioned_resource.resource).await?;
        let (saved, _) =
            save_versioned_resource(&mut tx, resource_id, &input.versioned_resource).await?;

        sqlx::query(
            "INSERT INTO build_inputs (build_id, versioned_resource_id, input_name, first_occurrence)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (build_id, versioned_resource_id, input_name) DO NOTHING",
        )
        .bind(build_id.as_uuid())
        .bind(saved.id.as_uuid())
        .bind(&input.name)
        .bind(input.first_occurrence)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Record a version produced by a build. Outputs are never deduplicated;
    /// a retried build legitimately re-asserts the same output.
    pub async fn save_build_output(
        &self,
        build_id: EntityId,
        vr: &VersionedResource,
        explicit: bool,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let resource_id = resource_id_by_name(&mut tx, self.id, &vr.resource).await?;
        let (saved, created) = save_versioned_resource(&mut tx, resource_id, vr).await?;
        if created {
            bump_check_order(
                &mut tx,
                resource_id,
                &vr.resource_type,
                &vr.version.canonical_json()?,
            )
            .await?;
        }

        sqlx::query(
            "INSERT INTO build_outputs (id, build_id, versioned_resource_id, explicit)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::now_v7())
        .bind(build_id.as_uuid())
        .bind(saved.id.as_uuid())
        .bind(explicit)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Reconcile a job's persisted candidate-input table against a freshly
    /// computed mapping with a minimal set-diff: entries absent from or
    /// changed in the new mapping are deleted, new or changed ones inserted.
    /// Writing the `Next` mapping also flips the job's `inputs_determined`
    /// flag. Applying the same mapping twice is a no-op.
    pub async fn save_job_input_mapping(
        &self,
        kind: MappingKind,
        mapping: &InputMapping,
        job_name: &str,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let job_id = match kind {
            MappingKind::Independent => {
                sqlx::query_scalar::<_, Uuid>(
                    "SELECT id FROM jobs WHERE name = $1 AND pipeline_id = $2",
                )
                .bind(job_name)
                .bind(self.id)
                .fetch_optional(&mut *tx)
                .await?
            }
            MappingKind::Next => {
                sqlx::query_scalar::<_, Uuid>(
                    "UPDATE jobs SET inputs_determined = true
                     WHERE name = $1 AND pipeline_id = $2
                     RETURNING id",
                )
                .bind(job_name)
                .bind(self.id)
                .fetch_optional(&mut *tx)
                .await?
            }
        }
        .ok_or_else(|| DbError::NotFound(format!("job '{job_name}'")))?;

        let table = kind.table();

        let old_rows = sqlx::query_as::<_, (String, Uuid, bool)>(&format!(
            "SELECT input_name, version_id, first_occurrence FROM {table} WHERE job_id = $1"
        ))
        .bind(job_id)
        .fetch_all(&mut *tx)
        .await?;

        let old_mapping: InputMapping = old_rows
            .into_iter()
            .map(|(name, version_id, first_occurrence)| {
                (
                    name,
                    InputVersion {
                        version_id: EntityId::from_uuid(version_id),
                        first_occurrence,
                    },
                )
            })
            .collect();

        let (deletes, inserts) = mapping_diff(&old_mapping, mapping);

        for input_name in deletes {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE job_id = $1 AND input_name = $2"
            ))
            .bind(job_id)
            .bind(input_name)
            .execute(&mut *tx)
            .await?;
        }

        for (input_name, input_version) in inserts {
            sqlx::query(&format!(
                "INSERT INTO {table} (job_id, input_name, version_id, first_occurrence)
                 VALUES ($1, $2, $3, $4)"
            ))
            .bind(job_id)
            .bind(input_name)
            .bind(input_version.version_id.as_uuid())
            .bind(input_version.first_occurrence)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Read back a job's candidate inputs joined with their versions, as the
    /// scheduler consumes them.
    pub async fn get_job_build_inputs(
        &self,
        kind: MappingKind,
        job_name: &str,
    ) -> DbResult<Vec<BuildInput>> {
        let table = kind.table();

        let rows = sqlx::query_as::<_, (String, bool, String, String, String, String)>(&format!(
            "SELECT i.input_name, i.first_occurrence, r.name, v.type, v.version, v.metadata
             FROM {table} i
             JOIN jobs j ON j.id = i.job_id
             JOIN versioned_resources v ON v.id = i.version_id
             JOIN resources r ON r.id = v.resource_id
             WHERE j.name = $1 AND j.pipeline_id = $2
             ORDER BY i.input_name"
        ))
        .bind(job_name)
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(input_name, first_occurrence, resource, resource_type, version, metadata)| {
                    let version: Version = serde_json::from_str(&version)?;
                    let metadata: Vec<MetadataField> = serde_json::from_str(&metadata)?;
                    Ok(BuildInput {
                        name: input_name,
                        versioned_resource: VersionedResource {
                            resource,
                            resource_type,
                            version,
                            metadata,
                        },
                        first_occurrence,
                    })
                },
            )
            .collect()
    }
}

/// The minimal change set turning `old` into `new`: names to delete
/// (absent or changed), entries to insert (new or changed).
fn mapping_diff<'a>(
    old: &'a InputMapping,
    new: &'a InputMapping,
) -> (Vec<&'a str>, Vec<(&'a str, InputVersion)>) {
    let mut deletes = Vec::new();
    for (input_name, old_version) in old {
        if new.get(input_name) != Some(old_version) {
            deletes.push(input_name.as_str());
        }
    }

    let mut inserts = Vec::new();
    for (input_name, input_version) in new {
        if old.get(input_name) != Some(input_version) {
            inserts.push((input_name.as_str(), *input_version));
        }
    }

    (deletes, inserts)
}
