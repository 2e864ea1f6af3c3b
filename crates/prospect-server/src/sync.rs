//! Push apply and pull delta
//!
//! One `process` call handles a full `/sync` exchange. Pushed records are
//! authorized and validated individually; a record that fails is dropped
//! with a warning and the rest of the batch continues. The pusher gets no
//! per-record outcome, only the 200 response.

use std::collections::HashMap;

use prospect_core::models::{Actor, RecordId};
use prospect_core::protocol::{canonical_id, ChangeSet, SyncChanges, SyncRequest, SyncResponse};

use crate::error::AppError;
use crate::policy::{allows, Operation};
use crate::store::ServerStore;

pub fn process(
    store: &ServerStore,
    actor: Actor,
    request: &SyncRequest,
) -> Result<SyncResponse, AppError> {
    let now = chrono::Utc::now().timestamp_millis();
    let watermark = request.last_pulled_at.unwrap_or(0);

    apply_changes(store, actor, &request.changes, now)?;

    let changes = compute_delta(store, watermark)?;
    // The cursor never moves backwards, even across clock skew
    let timestamp = now.max(watermark);

    tracing::info!(
        actor = %actor.id,
        pushed = request.changes.record_count(),
        pulled = changes.record_count(),
        timestamp,
        "sync exchange complete"
    );

    Ok(SyncResponse { changes, timestamp })
}

/// Apply order puts referenced records before their referents, so a batch
/// may carry a category, a lead closing with it, and a call log for the
/// lead all at once.
fn apply_changes(
    store: &ServerStore,
    actor: Actor,
    changes: &SyncChanges,
    now: i64,
) -> Result<(), AppError> {
    let mut id_map: HashMap<RecordId, RecordId> = HashMap::new();

    for category in &changes.categories.created {
        let canonical = canonical_id(actor.id, category.id);
        id_map.insert(category.id, canonical);

        if !allows(actor.role, Operation::CreateCategory) {
            tracing::warn!(record = %category.id, role = %actor.role, "dropping category create");
            continue;
        }

        let mut record = category.clone();
        record.id = canonical;
        record.created_by = actor.id;
        record.created_at = clamp_timestamp(record.created_at, now);
        record.updated_at = clamp_timestamp(record.updated_at, now);
        store.insert_category_if_absent(&record)?;
    }

    for lead in &changes.leads.created {
        let canonical = canonical_id(actor.id, lead.id);
        id_map.insert(lead.id, canonical);

        if !allows(actor.role, Operation::CreateLead) {
            tracing::warn!(record = %lead.id, role = %actor.role, "dropping lead create");
            continue;
        }

        let mut record = lead.clone();
        record.id = canonical;
        record.created_by = actor.id;
        record.category_id = record.category_id.map(|id| translate(&id_map, id));
        if let Err(error) = record.validate_closure() {
            tracing::warn!(record = %canonical, %error, "dropping invalid lead create");
            continue;
        }
        if let Some(category_id) = record.category_id {
            if store.get_category(category_id)?.is_none() {
                tracing::warn!(record = %canonical, category = %category_id, "dropping lead create with unknown category");
                continue;
            }
        }
        record.created_at = clamp_timestamp(record.created_at, now);
        record.updated_at = clamp_timestamp(record.updated_at, now);
        store.insert_lead_if_absent(&record)?;
    }

    for lead in &changes.leads.updated {
        let id = translate(&id_map, lead.id);
        let Some(existing) = store.get_lead(id)? else {
            tracing::warn!(record = %id, "dropping update for unknown or deleted lead");
            continue;
        };

        let mut record = lead.clone();
        record.id = id;
        record.category_id = record.category_id.map(|cid| translate(&id_map, cid));
        if let Err(error) = record.validate_closure() {
            tracing::warn!(record = %id, %error, "dropping invalid lead update");
            continue;
        }

        let closing_with = match record.category_id.filter(|_| record.is_closed()) {
            Some(category_id) => match store.get_category(category_id)? {
                Some(category) => Some(category.kind),
                None => {
                    tracing::warn!(record = %id, category = %category_id, "dropping close with unknown category");
                    continue;
                }
            },
            None => None,
        };
        if !allows(actor.role, Operation::UpdateLead { closing_with }) {
            tracing::warn!(record = %id, role = %actor.role, ?closing_with, "dropping lead update");
            continue;
        }

        record.created_by = existing.created_by;
        store.update_lead(&record, now)?;
    }

    for log in &changes.call_logs.created {
        let canonical = canonical_id(actor.id, log.id);

        if !allows(actor.role, Operation::CreateCallLog) {
            tracing::warn!(record = %log.id, role = %actor.role, "dropping call log create");
            continue;
        }

        let mut record = log.clone();
        record.id = canonical;
        record.lead_id = translate(&id_map, record.lead_id);
        record.called_by = actor.id;
        if !store.lead_exists(record.lead_id)? {
            tracing::warn!(record = %canonical, lead = %record.lead_id, "dropping call log for unknown lead");
            continue;
        }
        record.call_date = clamp_timestamp(record.call_date, now);
        record.created_at = clamp_timestamp(record.created_at, now);
        record.updated_at = clamp_timestamp(record.updated_at, now);
        store.insert_call_log_if_absent(&record)?;
    }

    for id in &changes.leads.deleted {
        if !allows(actor.role, Operation::DeleteLead) {
            tracing::warn!(record = %id, role = %actor.role, "dropping lead delete");
            continue;
        }
        store.tombstone_lead(translate(&id_map, *id), now)?;
    }

    // Call log deletes are accepted by the transport but have no effect
    if !changes.call_logs.deleted.is_empty() {
        tracing::debug!(
            count = changes.call_logs.deleted.len(),
            "ignoring call log deletes"
        );
    }

    for id in &changes.categories.deleted {
        if !allows(actor.role, Operation::DeleteCategory) {
            tracing::warn!(record = %id, role = %actor.role, "dropping category delete");
            continue;
        }
        store.tombstone_category(translate(&id_map, *id), now)?;
    }

    Ok(())
}

fn compute_delta(store: &ServerStore, watermark: i64) -> Result<SyncChanges, AppError> {
    Ok(SyncChanges {
        leads: partition(
            store.leads_changed_since(watermark)?,
            |lead| lead.created_at,
            watermark,
            store.deleted_ids_since("leads", watermark)?,
        ),
        call_logs: partition(
            store.call_logs_changed_since(watermark)?,
            |log| log.created_at,
            watermark,
            store.deleted_ids_since("call_logs", watermark)?,
        ),
        categories: partition(
            store.categories_changed_since(watermark)?,
            |category| category.created_at,
            watermark,
            store.deleted_ids_since("categories", watermark)?,
        ),
    })
}

/// Each changed row lands in exactly one of created/updated, split on
/// whether it came into existence after the client's cursor
fn partition<T>(
    rows: Vec<T>,
    created_at: impl Fn(&T) -> i64,
    watermark: i64,
    deleted: Vec<RecordId>,
) -> ChangeSet<T> {
    let mut set = ChangeSet {
        deleted,
        ..ChangeSet::default()
    };
    for row in rows {
        if created_at(&row) > watermark {
            set.created.push(row);
        } else {
            set.updated.push(row);
        }
    }
    set
}

fn translate(id_map: &HashMap<RecordId, RecordId>, id: RecordId) -> RecordId {
    id_map.get(&id).copied().unwrap_or(id)
}

const fn clamp_timestamp(hint: i64, now: i64) -> i64 {
    if hint <= 0 {
        now
    } else {
        hint
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use prospect_core::models::{Category, CategoryType, Lead, LeadStatus, Role};

    use super::*;

    fn setup() -> ServerStore {
        ServerStore::open_in_memory().unwrap()
    }

    fn actor(role: Role) -> Actor {
        Actor {
            id: RecordId::new(),
            role,
        }
    }

    fn sample_lead(created_by: RecordId) -> Lead {
        Lead::new(
            "Asha Traders",
            "Mumbai",
            "9876543210",
            "9876543210",
            None,
            created_by,
        )
    }

    fn push_of(changes: SyncChanges, last_pulled_at: Option<i64>) -> SyncRequest {
        SyncRequest {
            changes,
            last_pulled_at,
        }
    }

    #[test]
    fn test_admin_create_lands_under_canonical_id() {
        let store = setup();
        let admin = actor(Role::Admin);
        let lead = sample_lead(admin.id);

        let request = push_of(
            SyncChanges {
                leads: ChangeSet {
                    created: vec![lead.clone()],
                    ..Default::default()
                },
                ..Default::default()
            },
            None,
        );
        let response = process(&store, admin, &request).unwrap();

        let canonical = canonical_id(admin.id, lead.id);
        assert!(store.get_lead(canonical).unwrap().is_some());
        assert!(store.get_lead(lead.id).unwrap().is_none());
        assert!(response.timestamp > 0);
    }

    #[test]
    fn test_repeated_push_does_not_duplicate() {
        let store = setup();
        let admin = actor(Role::Admin);
        let lead = sample_lead(admin.id);

        let request = push_of(
            SyncChanges {
                leads: ChangeSet {
                    created: vec![lead.clone()],
                    ..Default::default()
                },
                ..Default::default()
            },
            None,
        );
        process(&store, admin, &request).unwrap();
        process(&store, admin, &request).unwrap();

        assert_eq!(store.leads_changed_since(0).unwrap().len(), 1);
    }

    #[test]
    fn test_editor_create_is_dropped_silently() {
        let store = setup();
        let editor = actor(Role::Editor);
        let lead = sample_lead(editor.id);

        let request = push_of(
            SyncChanges {
                leads: ChangeSet {
                    created: vec![lead],
                    ..Default::default()
                },
                ..Default::default()
            },
            None,
        );
        let response = process(&store, editor, &request).unwrap();

        // 200 with an empty delta, no per-record error surfaces
        assert!(store.leads_changed_since(0).unwrap().is_empty());
        assert!(response.changes.leads.is_empty());
    }

    #[test]
    fn test_editor_close_requires_converted_category() {
        let store = setup();
        let admin = actor(Role::Admin);
        let editor = actor(Role::Editor);

        let lead = sample_lead(admin.id);
        store.insert_lead_if_absent(&lead).unwrap();
        let converted = Category::new("Won", CategoryType::Converted, admin.id);
        let rejected = Category::new("Lost", CategoryType::Rejected, admin.id);
        store.insert_category_if_absent(&converted).unwrap();
        store.insert_category_if_absent(&rejected).unwrap();

        let mut closed = lead.clone();
        closed.close(rejected.id, editor.id);
        let request = push_of(
            SyncChanges {
                leads: ChangeSet {
                    updated: vec![closed.clone()],
                    ..Default::default()
                },
                ..Default::default()
            },
            Some(0),
        );
        process(&store, editor, &request).unwrap();
        assert_eq!(
            store.get_lead(lead.id).unwrap().unwrap().status,
            LeadStatus::Open
        );

        closed.close(converted.id, editor.id);
        let request = push_of(
            SyncChanges {
                leads: ChangeSet {
                    updated: vec![closed],
                    ..Default::default()
                },
                ..Default::default()
            },
            Some(0),
        );
        process(&store, editor, &request).unwrap();
        assert_eq!(
            store.get_lead(lead.id).unwrap().unwrap().status,
            LeadStatus::Closed
        );
    }

    #[test]
    fn test_batch_forward_references_resolve() {
        let store = setup();
        let admin = actor(Role::Admin);

        let lead = sample_lead(admin.id);
        let log = prospect_core::models::CallLog::new(lead.id, admin.id, "intro call", None);
        let request = push_of(
            SyncChanges {
                leads: ChangeSet {
                    created: vec![lead.clone()],
                    ..Default::default()
                },
                call_logs: ChangeSet {
                    created: vec![log],
                    ..Default::default()
                },
                ..Default::default()
            },
            None,
        );
        process(&store, admin, &request).unwrap();

        let logs = store.call_logs_changed_since(0).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].lead_id, canonical_id(admin.id, lead.id));
    }

    #[test]
    fn test_delta_partitions_on_client_cursor() {
        let store = setup();
        let admin = actor(Role::Admin);

        let mut old = sample_lead(admin.id);
        old.created_at = 100;
        old.updated_at = 100;
        store.insert_lead_if_absent(&old).unwrap();
        store.update_lead(&old, 500).unwrap();

        let mut fresh = sample_lead(admin.id);
        fresh.created_at = 400;
        fresh.updated_at = 400;
        store.insert_lead_if_absent(&fresh).unwrap();

        let delta = compute_delta(&store, 300).unwrap();
        assert_eq!(delta.leads.created.len(), 1);
        assert_eq!(delta.leads.created[0].id, fresh.id);
        assert_eq!(delta.leads.updated.len(), 1);
        assert_eq!(delta.leads.updated[0].id, old.id);
    }

    #[test]
    fn test_tombstones_appear_in_delta() {
        let store = setup();
        let admin = actor(Role::Admin);

        let lead = sample_lead(admin.id);
        store.insert_lead_if_absent(&lead).unwrap();

        let request = push_of(
            SyncChanges {
                leads: ChangeSet {
                    deleted: vec![lead.id],
                    ..Default::default()
                },
                ..Default::default()
            },
            Some(0),
        );
        let response = process(&store, admin, &request).unwrap();
        assert_eq!(response.changes.leads.deleted, vec![lead.id]);

        // Viewers cannot delete
        let other = sample_lead(admin.id);
        store.insert_lead_if_absent(&other).unwrap();
        let request = push_of(
            SyncChanges {
                leads: ChangeSet {
                    deleted: vec![other.id],
                    ..Default::default()
                },
                ..Default::default()
            },
            Some(0),
        );
        process(&store, actor(Role::Viewer), &request).unwrap();
        assert!(store.get_lead(other.id).unwrap().is_some());
    }

    #[test]
    fn test_timestamp_never_below_cursor() {
        let store = setup();
        let admin = actor(Role::Admin);

        let future = chrono::Utc::now().timestamp_millis() + 60_000;
        let response = process(
            &store,
            admin,
            &push_of(SyncChanges::default(), Some(future)),
        )
        .unwrap();
        assert_eq!(response.timestamp, future);
    }
}
