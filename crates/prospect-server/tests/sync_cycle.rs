//! Full client/server sync cycles driven in-process.
//!
//! The client engine talks to the server service through a transport that
//! skips HTTP; the "token" is the account email, looked up like the real
//! bearer path does after verification.

use std::sync::Arc;

use tokio::sync::Mutex;

use prospect_core::db::{
    AuthSession, CategoryRepository, ChangeTracker, Database, LeadRepository,
    SqliteCategoryRepository, SqliteLeadRepository, SqliteSessionRepository, SessionRepository,
};
use prospect_core::models::{Actor, Category, CategoryType, Lead, LeadStatus, RecordId, Role};
use prospect_core::protocol::{SyncRequest, SyncResponse};
use prospect_core::sync::{SyncEngine, SyncTransport};
use prospect_core::{Error, Result};

use prospect_server::store::{ServerStore, User};
use prospect_server::sync as server_sync;

struct LocalTransport {
    store: Arc<Mutex<ServerStore>>,
}

impl SyncTransport for LocalTransport {
    async fn exchange(&self, token: &str, request: &SyncRequest) -> Result<SyncResponse> {
        let store = self.store.lock().await;
        let user = store
            .user_by_email(token)
            .map_err(|error| Error::Api(error.to_string()))?
            .ok_or_else(|| Error::Api("Unauthorized: unknown user (401)".to_string()))?;

        let actor = Actor {
            id: user.id,
            role: user.role,
        };
        server_sync::process(&store, actor, request).map_err(|error| Error::Api(error.to_string()))
    }
}

fn server() -> Arc<Mutex<ServerStore>> {
    Arc::new(Mutex::new(ServerStore::open_in_memory().unwrap()))
}

async fn register(store: &Arc<Mutex<ServerStore>>, email: &str, role: Role) -> User {
    let now = chrono::Utc::now().timestamp_millis();
    let user = User {
        id: RecordId::new(),
        email: email.to_string(),
        password_hash: String::new(),
        name: email.to_string(),
        role,
        created_at: now,
        updated_at: now,
    };
    store.lock().await.create_user(&user).unwrap();
    user
}

fn client_for(user: &User) -> Database {
    let db = Database::open_in_memory().unwrap();
    SqliteSessionRepository::new(db.connection())
        .store_session(&AuthSession {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            token: user.email.clone(),
        })
        .unwrap();
    db
}

fn engine_for(store: &Arc<Mutex<ServerStore>>) -> SyncEngine<LocalTransport> {
    SyncEngine::new(LocalTransport {
        store: store.clone(),
    })
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

// Millisecond timestamps tie too easily back to back
fn tick() {
    std::thread::sleep(std::time::Duration::from_millis(5));
}

#[tokio::test]
async fn created_lead_reaches_second_client() {
    let server = server();
    let admin = register(&server, "admin@example.com", Role::Admin).await;
    let editor = register(&server, "editor@example.com", Role::Editor).await;

    let admin_db = client_for(&admin);
    let editor_db = client_for(&editor);
    let engine = engine_for(&server);

    let lead = sample_lead(admin.id);
    SqliteLeadRepository::new(admin_db.connection())
        .create(&lead)
        .unwrap();
    let outcome = engine.run_sync(&admin_db).await.unwrap();
    assert_eq!(outcome.pushed, 1);

    let outcome = engine.run_sync(&editor_db).await.unwrap();
    assert_eq!(outcome.pulled, 1);

    let pulled = SqliteLeadRepository::new(editor_db.connection())
        .list()
        .unwrap();
    assert_eq!(pulled.len(), 1);
    assert_eq!(pulled[0].name, "Asha Traders");
    // Both replicas converge on the canonical id
    let local = SqliteLeadRepository::new(admin_db.connection())
        .list()
        .unwrap();
    assert_eq!(local[0].id, pulled[0].id);
}

#[tokio::test]
async fn re_running_a_cycle_pushes_nothing_new() {
    let server = server();
    let admin = register(&server, "admin@example.com", Role::Admin).await;
    let admin_db = client_for(&admin);
    let engine = engine_for(&server);

    SqliteLeadRepository::new(admin_db.connection())
        .create(&sample_lead(admin.id))
        .unwrap();
    engine.run_sync(&admin_db).await.unwrap();

    let outcome = engine.run_sync(&admin_db).await.unwrap();
    assert_eq!(outcome.pushed, 0);
    assert_eq!(server.lock().await.leads_changed_since(0).unwrap().len(), 1);
    assert!(ChangeTracker::new(admin_db.connection())
        .pending()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn editor_close_obeys_category_policy() {
    let server = server();
    let admin = register(&server, "admin@example.com", Role::Admin).await;
    let editor = register(&server, "editor@example.com", Role::Editor).await;

    let admin_db = client_for(&admin);
    let editor_db = client_for(&editor);
    let engine = engine_for(&server);

    // Admin seeds one lead and both category kinds
    let lead = sample_lead(admin.id);
    SqliteLeadRepository::new(admin_db.connection())
        .create(&lead)
        .unwrap();
    let categories = SqliteCategoryRepository::new(admin_db.connection());
    categories
        .create(&Category::new("Won", CategoryType::Converted, admin.id))
        .unwrap();
    categories
        .create(&Category::new("Lost", CategoryType::Rejected, admin.id))
        .unwrap();
    engine.run_sync(&admin_db).await.unwrap();
    tick();

    engine.run_sync(&editor_db).await.unwrap();
    let editor_leads = SqliteLeadRepository::new(editor_db.connection());
    let editor_categories = SqliteCategoryRepository::new(editor_db.connection());
    let mut pulled = editor_leads.list().unwrap().remove(0);
    let lost = editor_categories
        .list()
        .unwrap()
        .into_iter()
        .find(|category| category.kind == CategoryType::Rejected)
        .unwrap();
    let won = editor_categories
        .list()
        .unwrap()
        .into_iter()
        .find(|category| category.kind == CategoryType::Converted)
        .unwrap();

    // Rejected close is dropped server-side; admin still sees the lead open
    pulled.close(lost.id, editor.id);
    editor_leads.update(&pulled).unwrap();
    engine.run_sync(&editor_db).await.unwrap();
    tick();
    engine.run_sync(&admin_db).await.unwrap();
    let admin_view = SqliteLeadRepository::new(admin_db.connection())
        .list()
        .unwrap()
        .remove(0);
    assert_eq!(admin_view.status, LeadStatus::Open);
    tick();

    // Converted close lands and propagates
    let mut pulled = editor_leads.list().unwrap().remove(0);
    pulled.close(won.id, editor.id);
    editor_leads.update(&pulled).unwrap();
    engine.run_sync(&editor_db).await.unwrap();
    tick();
    engine.run_sync(&admin_db).await.unwrap();
    let admin_view = SqliteLeadRepository::new(admin_db.connection())
        .list()
        .unwrap()
        .remove(0);
    assert_eq!(admin_view.status, LeadStatus::Closed);
    assert_eq!(admin_view.category_id, Some(won.id));
}

#[tokio::test]
async fn later_push_wins_and_loser_converges() {
    let server = server();
    let admin = register(&server, "admin@example.com", Role::Admin).await;
    let editor = register(&server, "editor@example.com", Role::Editor).await;

    let admin_db = client_for(&admin);
    let editor_db = client_for(&editor);
    let engine = engine_for(&server);

    let lead = sample_lead(admin.id);
    SqliteLeadRepository::new(admin_db.connection())
        .create(&lead)
        .unwrap();
    engine.run_sync(&admin_db).await.unwrap();
    engine.run_sync(&editor_db).await.unwrap();
    tick();

    // Both edit the same field offline; the editor pushes second
    let admin_leads = SqliteLeadRepository::new(admin_db.connection());
    let editor_leads = SqliteLeadRepository::new(editor_db.connection());
    let mut admin_copy = admin_leads.list().unwrap().remove(0);
    admin_copy.note = Some("priced at 40k".to_string());
    admin_leads.update(&admin_copy).unwrap();
    let mut editor_copy = editor_leads.list().unwrap().remove(0);
    editor_copy.note = Some("priced at 45k".to_string());
    editor_leads.update(&editor_copy).unwrap();

    engine.run_sync(&admin_db).await.unwrap();
    tick();
    engine.run_sync(&editor_db).await.unwrap();
    tick();
    engine.run_sync(&admin_db).await.unwrap();

    let converged = admin_leads.list().unwrap().remove(0);
    assert_eq!(converged.note.as_deref(), Some("priced at 45k"));
}

#[tokio::test]
async fn tombstone_propagates_to_peer() {
    let server = server();
    let admin = register(&server, "admin@example.com", Role::Admin).await;
    let editor = register(&server, "editor@example.com", Role::Editor).await;

    let admin_db = client_for(&admin);
    let editor_db = client_for(&editor);
    let engine = engine_for(&server);

    SqliteLeadRepository::new(admin_db.connection())
        .create(&sample_lead(admin.id))
        .unwrap();
    engine.run_sync(&admin_db).await.unwrap();
    engine.run_sync(&editor_db).await.unwrap();
    tick();

    let admin_leads = SqliteLeadRepository::new(admin_db.connection());
    let id = admin_leads.list().unwrap().remove(0).id;
    admin_leads.delete(id).unwrap();
    engine.run_sync(&admin_db).await.unwrap();
    tick();

    let outcome = engine.run_sync(&editor_db).await.unwrap();
    assert_eq!(outcome.pulled, 1);
    assert!(SqliteLeadRepository::new(editor_db.connection())
        .list()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn viewer_changes_are_dropped_without_failing_the_cycle() {
    let server = server();
    let admin = register(&server, "admin@example.com", Role::Admin).await;
    let viewer = register(&server, "viewer@example.com", Role::Viewer).await;

    let admin_db = client_for(&admin);
    let viewer_db = client_for(&viewer);
    let engine = engine_for(&server);

    SqliteLeadRepository::new(admin_db.connection())
        .create(&sample_lead(admin.id))
        .unwrap();
    engine.run_sync(&admin_db).await.unwrap();
    engine.run_sync(&viewer_db).await.unwrap();
    tick();

    let viewer_leads = SqliteLeadRepository::new(viewer_db.connection());
    let id = viewer_leads.list().unwrap().remove(0).id;
    viewer_leads.delete(id).unwrap();
    // Viewers may also not create leads
    SqliteLeadRepository::new(viewer_db.connection())
        .create(&sample_lead(viewer.id))
        .unwrap();

    let outcome = engine.run_sync(&viewer_db).await.unwrap();
    assert_eq!(outcome.pushed, 2);

    // Server state is untouched: one live lead, nothing new
    let store = server.lock().await;
    let live = store.leads_changed_since(0).unwrap();
    assert_eq!(live.len(), 1);
    assert!(store.deleted_ids_since("leads", 0).unwrap().is_empty());
}

#[tokio::test]
async fn watermark_advances_across_cycles() {
    let server = server();
    let admin = register(&server, "admin@example.com", Role::Admin).await;
    let admin_db = client_for(&admin);
    let engine = engine_for(&server);

    let first = engine.run_sync(&admin_db).await.unwrap();
    tick();
    let second = engine.run_sync(&admin_db).await.unwrap();

    assert!(second.watermark >= first.watermark);
    let sessions = SqliteSessionRepository::new(admin_db.connection());
    assert_eq!(sessions.last_pulled_at().unwrap(), Some(second.watermark));
}
