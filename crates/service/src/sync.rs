//! Reconciliation between the registry and the object store.
//!
//! Records left in an ambiguous state by an interrupted operation are
//! resolved using the object store as ground truth: a record whose content
//! exists is settled, a record whose content is missing is removed.
//!
//! The listing is a point-in-time snapshot. A sync racing an upload for the
//! same user can remove the upload's record, and two syncs for one user are
//! not excluded from running together. Callers serialize both.

use crate::error::ServiceResult;
use futures::TryStreamExt;
use scrivener_core::file::user_prefix;
use scrivener_metadata::MetadataStore;
use scrivener_metadata::models::FileRow;
use scrivener_storage::ObjectStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Ids to settle and ids to remove.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub unlock: Vec<Uuid>,
    pub delete: Vec<Uuid>,
}

/// Split ambiguous records by whether their object key is present.
///
/// A record without an object key never matches, so an empty listing
/// removes every record.
pub fn plan<'a, I>(ambiguous: I, present: &HashSet<String>) -> SyncPlan
where
    I: IntoIterator<Item = (Uuid, Option<&'a str>)>,
{
    let mut plan = SyncPlan::default();
    for (file_id, object_key) in ambiguous {
        match object_key {
            Some(key) if present.contains(key) => plan.unlock.push(file_id),
            _ => plan.delete.push(file_id),
        }
    }
    plan
}

/// Result of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    NothingToDo,
    Reconciled { unlocked: u64, deleted: u64 },
}

/// Runs sync passes for one user at a time.
pub struct Reconciler {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
}

impl Reconciler {
    pub fn new(metadata: Arc<dyn MetadataStore>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { metadata, storage }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn sync(&self, user_id: Uuid) -> ServiceResult<SyncOutcome> {
        let ambiguous: Vec<FileRow> = self.metadata.list_ambiguous_files(user_id).await?;
        if ambiguous.is_empty() {
            tracing::debug!("nothing to reconcile");
            return Ok(SyncOutcome::NothingToDo);
        }

        let present: HashSet<String> = self
            .storage
            .list_stream(&user_prefix(user_id))
            .await?
            .try_collect()
            .await?;

        let plan = plan(
            ambiguous
                .iter()
                .map(|row| (row.file_id, row.object_key.as_deref())),
            &present,
        );

        let unlocked = if plan.unlock.is_empty() {
            0
        } else {
            self.metadata.unlock_files(user_id, &plan.unlock).await?
        };
        let deleted = if plan.delete.is_empty() {
            0
        } else {
            self.metadata.delete_files(user_id, &plan.delete).await?
        };

        tracing::info!(
            ambiguous = ambiguous.len(),
            listed = present.len(),
            unlocked,
            deleted,
            "sync complete"
        );
        Ok(SyncOutcome::Reconciled { unlocked, deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_matched_and_unmatched() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let plan = plan(
            [(a, Some("u/1")), (b, None), (c, Some("u/2"))],
            &keys(&["u/1", "u/3"]),
        );
        assert_eq!(plan.unlock, vec![a]);
        assert_eq!(plan.delete, vec![b, c]);
    }

    #[test]
    fn test_empty_listing_deletes_everything() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let plan = plan([(a, Some("u/1")), (b, None)], &HashSet::new());
        assert!(plan.unlock.is_empty());
        assert_eq!(plan.delete, vec![a, b]);
    }

    #[test]
    fn test_no_records_yields_empty_plan() {
        let plan = plan(std::iter::empty(), &keys(&["u/1"]));
        assert_eq!(plan, SyncPlan::default());
    }

    #[test]
    fn test_outcome_json() {
        let json = serde_json::to_value(SyncOutcome::Reconciled {
            unlocked: 1,
            deleted: 2,
        })
        .unwrap();
        assert_eq!(json["outcome"], "reconciled");
        assert_eq!(json["deleted"], 2);
    }
}
