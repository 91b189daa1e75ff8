//! Lifecycle operations for membership resources

use std::sync::Arc;

use crate::lock::KeyedLockManager;
use crate::schema::DriftDetection;

use super::Membership;
use super::error::{MembershipError, MembershipResult};
use super::import::parse_import_id;
use super::reconcile::{Presence, Reconciliation, reconcile};
use super::remote::{MembershipList, ParentStore, fetch_parent};

/// Outcome of an `ensure_present` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// State to track; its identifier is the item value
    pub membership: Membership,
    pub reconciliation: Reconciliation,
}

/// Sequences fetch → reconcile → replace for one list attribute
///
/// All calls for the same parent id are serialized through the shared
/// [`KeyedLockManager`], from the fetch until the replace has returned.
/// Calls for different parents run concurrently.
pub struct MembershipOrchestrator<S: ParentStore> {
    store: Arc<S>,
    locks: Arc<KeyedLockManager>,
    list: MembershipList<S::Parent>,
}

impl<S: ParentStore> MembershipOrchestrator<S> {
    /// Memberships are never re-read from the remote side
    pub const DRIFT_DETECTION: DriftDetection = DriftDetection::Disabled;

    pub fn new(
        store: Arc<S>,
        locks: Arc<KeyedLockManager>,
        list: MembershipList<S::Parent>,
    ) -> Self {
        Self { store, locks, list }
    }

    pub fn list_name(&self) -> &'static str {
        self.list.name
    }

    /// Make sure `value` is in the parent's list (create and update)
    ///
    /// A missing parent is an error. If the write-back fails nothing is
    /// returned to track, so prior state is left as it was.
    pub async fn ensure_present(&self, parent_id: &str, value: &str) -> MembershipResult<Applied> {
        let reconciliation = {
            let _guard = self.locks.acquire(parent_id).await;
            self.apply(parent_id, value, Presence::Present).await?
        };

        Ok(Applied {
            membership: Membership::new(parent_id, value),
            reconciliation,
        })
    }

    /// Make sure `value` is not in the parent's list (delete)
    ///
    /// A missing parent counts as success: there is nothing left to remove.
    pub async fn ensure_absent(&self, parent_id: &str, value: &str) -> MembershipResult<Reconciliation> {
        let _guard = self.locks.acquire(parent_id).await;

        match self.apply(parent_id, value, Presence::Absent).await {
            Err(MembershipError::ParentNotFound { .. }) => {
                log::warn!(
                    "parent object {} no longer exists, treating {} {} as removed",
                    parent_id,
                    self.list.name,
                    value
                );
                Ok(Reconciliation::Unchanged)
            }
            other => other,
        }
    }

    /// Read path. Does not contact the remote API and returns `tracked` as is.
    pub fn verify(&self, tracked: &Membership) -> Membership {
        tracked.clone()
    }

    /// Build tracked state from a `"<parent_id>/<item_value>"` id
    pub fn import(&self, import_id: &str) -> MembershipResult<Membership> {
        parse_import_id(import_id)
    }

    /// One locked cycle; the caller must hold the parent's lock
    async fn apply(
        &self,
        parent_id: &str,
        value: &str,
        presence: Presence,
    ) -> MembershipResult<Reconciliation> {
        let mut parent = fetch_parent(self.store.as_ref(), parent_id).await?;

        let reconciliation = reconcile((self.list.items)(&mut parent), value, presence);
        if !reconciliation.is_mutated() {
            match presence {
                Presence::Present => log::info!(
                    "parent object {} already has {} {}",
                    parent_id,
                    self.list.name,
                    value
                ),
                Presence::Absent => log::info!(
                    "parent object {} does not have {} {}",
                    parent_id,
                    self.list.name,
                    value
                ),
            }
            return Ok(reconciliation);
        }

        self.store
            .replace(parent_id, &parent)
            .await
            .map_err(|source| MembershipError::Remote {
                parent_id: parent_id.to_string(),
                source,
            })?;

        log::info!(
            "{} {} {} on parent object {}",
            match presence {
                Presence::Present => "added",
                Presence::Absent => "removed",
            },
            self.list.name,
            value,
            parent_id
        );
        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{ParentObject, RemoteError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, Default)]
    struct FakeApp {
        id: String,
        label: String,
        redirect_uris: Vec<String>,
        logout_uris: Vec<String>,
    }

    impl ParentObject for FakeApp {
        fn remote_id(&self) -> &str {
            &self.id
        }
    }

    fn redirect_uris(app: &mut FakeApp) -> &mut Vec<String> {
        &mut app.redirect_uris
    }

    fn logout_uris(app: &mut FakeApp) -> &mut Vec<String> {
        &mut app.logout_uris
    }

    const REDIRECTS: MembershipList<FakeApp> = MembershipList {
        name: "redirect_uris",
        items: redirect_uris,
    };

    const LOGOUTS: MembershipList<FakeApp> = MembershipList {
        name: "post_logout_redirect_uris",
        items: logout_uris,
    };

    /// In-memory parent store with knobs for races and failures
    #[derive(Default)]
    struct FakeStore {
        apps: Mutex<HashMap<String, FakeApp>>,
        replaced: Mutex<Vec<Vec<String>>>,
        replace_calls: AtomicUsize,
        fail_replace: AtomicBool,
        fetch_delay: Option<Duration>,
    }

    impl FakeStore {
        fn with_app(id: &str, uris: &[&str]) -> Self {
            let store = Self::default();
            store.insert(id, uris);
            store
        }

        fn insert(&self, id: &str, uris: &[&str]) {
            self.apps.lock().unwrap().insert(
                id.to_string(),
                FakeApp {
                    id: id.to_string(),
                    label: format!("{} label", id),
                    redirect_uris: uris.iter().map(|s| s.to_string()).collect(),
                    logout_uris: Vec::new(),
                },
            );
        }

        fn app(&self, id: &str) -> FakeApp {
            self.apps.lock().unwrap().get(id).cloned().unwrap()
        }

        fn uris(&self, id: &str) -> Vec<String> {
            self.app(id).redirect_uris
        }
    }

    #[async_trait]
    impl ParentStore for FakeStore {
        type Parent = FakeApp;

        async fn fetch(&self, parent_id: &str) -> Result<Option<FakeApp>, RemoteError> {
            let app = self.apps.lock().unwrap().get(parent_id).cloned();
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(app)
        }

        async fn replace(&self, parent_id: &str, parent: &FakeApp) -> Result<(), RemoteError> {
            self.replace_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_replace.load(Ordering::SeqCst) {
                return Err(RemoteError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            self.replaced
                .lock()
                .unwrap()
                .push(parent.redirect_uris.clone());
            self.apps
                .lock()
                .unwrap()
                .insert(parent_id.to_string(), parent.clone());
            Ok(())
        }
    }

    fn setup(store: FakeStore) -> (Arc<FakeStore>, MembershipOrchestrator<FakeStore>) {
        let store = Arc::new(store);
        let orchestrator = MembershipOrchestrator::new(
            Arc::clone(&store),
            Arc::new(KeyedLockManager::new()),
            REDIRECTS,
        );
        (store, orchestrator)
    }

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn present_appends_and_writes_full_list() {
        let (store, orchestrator) = setup(FakeStore::with_app("app1", &["a", "b"]));

        let applied = orchestrator.ensure_present("app1", "c").await.unwrap();

        assert_eq!(applied.reconciliation, Reconciliation::Mutated);
        assert_eq!(applied.membership.identifier(), "c");
        assert_eq!(applied.membership.parent_id, "app1");
        assert_eq!(*store.replaced.lock().unwrap(), vec![list(&["a", "b", "c"])]);
    }

    #[tokio::test]
    async fn present_existing_item_skips_write() {
        let (store, orchestrator) = setup(FakeStore::with_app("app1", &["a", "b"]));

        let applied = orchestrator.ensure_present("app1", "a").await.unwrap();

        assert_eq!(applied.reconciliation, Reconciliation::Unchanged);
        assert_eq!(applied.membership.identifier(), "a");
        assert_eq!(store.replace_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn present_twice_adds_once() {
        let (store, orchestrator) = setup(FakeStore::with_app("app1", &["a"]));

        orchestrator.ensure_present("app1", "b").await.unwrap();
        orchestrator.ensure_present("app1", "b").await.unwrap();

        assert_eq!(store.uris("app1"), list(&["a", "b"]));
        assert_eq!(store.replace_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_missing_item_skips_write() {
        let (store, orchestrator) = setup(FakeStore::with_app("app1", &["a"]));

        let result = orchestrator.ensure_absent("app1", "b").await.unwrap();

        assert_eq!(result, Reconciliation::Unchanged);
        assert_eq!(store.replace_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.uris("app1"), list(&["a"]));
    }

    #[tokio::test]
    async fn missing_parent_fails_present_but_not_absent() {
        let (store, orchestrator) = setup(FakeStore::default());

        let result = orchestrator.ensure_absent("gone", "a").await.unwrap();
        assert_eq!(result, Reconciliation::Unchanged);

        let err = orchestrator.ensure_present("gone", "a").await.unwrap_err();
        assert!(matches!(err, MembershipError::ParentNotFound { parent_id } if parent_id == "gone"));
        assert_eq!(store.replace_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn parent_without_id_is_treated_as_missing() {
        let store = FakeStore::default();
        store.apps.lock().unwrap().insert(
            "app1".to_string(),
            FakeApp {
                redirect_uris: list(&["a"]),
                ..Default::default()
            },
        );
        let (_, orchestrator) = setup(store);

        let err = orchestrator.ensure_present("app1", "b").await.unwrap_err();
        assert!(matches!(err, MembershipError::ParentNotFound { .. }));
        assert!(orchestrator.ensure_absent("app1", "a").await.is_ok());
    }

    #[tokio::test]
    async fn round_trip_preserves_order_and_other_settings() {
        let (store, orchestrator) = setup(FakeStore::with_app("app1", &["z", "a", "m"]));
        let before = store.app("app1");

        orchestrator.ensure_present("app1", "new").await.unwrap();
        assert_eq!(store.uris("app1"), list(&["z", "a", "m", "new"]));

        orchestrator.ensure_absent("app1", "new").await.unwrap();
        let after = store.app("app1");
        assert_eq!(after.redirect_uris, before.redirect_uris);
        assert_eq!(after.label, before.label);
    }

    #[tokio::test]
    async fn failed_write_is_surfaced_and_lock_released() {
        let (store, orchestrator) = setup(FakeStore::with_app("app1", &["a"]));
        store.fail_replace.store(true, Ordering::SeqCst);

        let err = orchestrator.ensure_present("app1", "b").await.unwrap_err();
        match err {
            MembershipError::Remote { parent_id, source } => {
                assert_eq!(parent_id, "app1");
                assert!(matches!(source, RemoteError::Api { status: 503, .. }));
            }
            other => panic!("Expected Remote error, got {:?}", other),
        }
        assert_eq!(store.uris("app1"), list(&["a"]));

        store.fail_replace.store(false, Ordering::SeqCst);
        let retry = tokio::time::timeout(
            Duration::from_secs(1),
            orchestrator.ensure_present("app1", "b"),
        )
        .await
        .expect("lock should have been released");
        assert!(retry.is_ok());
        assert_eq!(store.uris("app1"), list(&["a", "b"]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_presents_on_one_parent_lose_nothing() {
        let store = FakeStore {
            fetch_delay: Some(Duration::from_millis(5)),
            ..Default::default()
        };
        store.insert("app1", &[]);
        let (store, orchestrator) = setup(store);
        let orchestrator = Arc::new(orchestrator);

        let mut handles = Vec::new();
        for i in 0..12 {
            let orchestrator = Arc::clone(&orchestrator);
            handles.push(tokio::spawn(async move {
                orchestrator
                    .ensure_present("app1", &format!("https://host/cb{}", i))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut uris = store.uris("app1");
        uris.sort();
        let mut expected: Vec<String> = (0..12).map(|i| format!("https://host/cb{}", i)).collect();
        expected.sort();
        assert_eq!(uris, expected);
        assert_eq!(store.replace_calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn other_parents_are_not_blocked() {
        let store = FakeStore::with_app("app1", &[]);
        store.insert("app2", &[]);
        let store = Arc::new(store);
        let locks = Arc::new(KeyedLockManager::new());
        let orchestrator =
            MembershipOrchestrator::new(Arc::clone(&store), Arc::clone(&locks), REDIRECTS);

        let _held = locks.acquire("app1").await;
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            orchestrator.ensure_present("app2", "x"),
        )
        .await;

        assert!(result.is_ok(), "app2 must not wait for app1's lock");
        assert_eq!(store.uris("app2"), list(&["x"]));
    }

    #[tokio::test]
    async fn value_change_is_a_new_membership() {
        let (store, orchestrator) = setup(FakeStore::with_app("app1", &["old"]));

        let applied = orchestrator.ensure_present("app1", "new").await.unwrap();

        assert_eq!(applied.membership.identifier(), "new");
        // Removing the old value is a separate delete, driven by the plan.
        assert_eq!(store.uris("app1"), list(&["old", "new"]));
        orchestrator.ensure_absent("app1", "old").await.unwrap();
        assert_eq!(store.uris("app1"), list(&["new"]));
    }

    #[tokio::test]
    async fn lists_are_independent() {
        let store = Arc::new(FakeStore::with_app("app1", &["shared"]));
        let locks = Arc::new(KeyedLockManager::new());
        let redirects =
            MembershipOrchestrator::new(Arc::clone(&store), Arc::clone(&locks), REDIRECTS);
        let logouts = MembershipOrchestrator::new(Arc::clone(&store), locks, LOGOUTS);

        logouts.ensure_present("app1", "shared").await.unwrap();
        redirects.ensure_absent("app1", "shared").await.unwrap();

        let app = store.app("app1");
        assert!(app.redirect_uris.is_empty());
        assert_eq!(app.logout_uris, list(&["shared"]));
        assert_eq!(logouts.list_name(), "post_logout_redirect_uris");
    }

    #[tokio::test]
    async fn verify_and_import_do_not_touch_remote() {
        let (store, orchestrator) = setup(FakeStore::default());

        let imported = orchestrator.import("app123/https://host/callback").unwrap();
        assert_eq!(imported, Membership::new("app123", "https://host/callback"));
        assert_eq!(orchestrator.verify(&imported), imported);
        assert_eq!(store.replace_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            MembershipOrchestrator::<FakeStore>::DRIFT_DETECTION,
            DriftDetection::Disabled
        );
    }
}
