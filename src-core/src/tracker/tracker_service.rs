use chrono::Utc;
use log::{debug, error, warn};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::errors::{Error, Result, SubscriptionError};
use crate::expenses::expenses_model::{Expense, ExpenseDocument, ExpenseUpdate, NewExpense};
use crate::expenses::expenses_service::ExpenseService;
use crate::expenses::expenses_traits::{
    ExpenseRepositoryTrait, ExpenseServiceTrait, RepositoryPush,
};
use crate::expenses::CategoryFilter;
use crate::insights::insights_service as insights;
use crate::insights::SpendingSummary;
use crate::session::SessionProviderTrait;
use crate::tracker::tracker_model::{ExpenseFilter, TrackerView, ViewState};

/// Filtered list memoized by the composite key (list generation, filter).
struct CachedList {
    generation: u64,
    filter: ExpenseFilter,
    filtered: Vec<Expense>,
}

/// Aggregates memoized by list generation alone; they cover the full
/// list, so the filter never invalidates them.
struct CachedSummary {
    generation: u64,
    summary: SpendingSummary,
}

struct TrackerState {
    view_state: ViewState,
    owner_id: Option<String>,
    expenses: Vec<Expense>,
    quarantined: usize,
    last_error: Option<String>,
    filter: ExpenseFilter,
    generation: u64,
    list_cache: Option<CachedList>,
    summary_cache: Option<CachedSummary>,
    subscription: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
}

/// Holds the live expense list, kept in sync through the repository's
/// snapshot stream, derives the filtered view and aggregates, and
/// dispatches write intents. The repository stays the source of truth:
/// writes are never applied locally, the next push reflects them.
pub struct TrackerService {
    repository: Arc<dyn ExpenseRepositoryTrait>,
    session: Arc<dyn SessionProviderTrait>,
    expense_service: ExpenseService,
    inner: Arc<RwLock<TrackerState>>,
}

impl TrackerService {
    pub fn new(
        repository: Arc<dyn ExpenseRepositoryTrait>,
        session: Arc<dyn SessionProviderTrait>,
    ) -> Arc<Self> {
        Arc::new(TrackerService {
            expense_service: ExpenseService::new(Arc::clone(&repository)),
            repository,
            session,
            inner: Arc::new(RwLock::new(TrackerState {
                view_state: ViewState::Unauthenticated,
                owner_id: None,
                expenses: Vec::new(),
                quarantined: 0,
                last_error: None,
                filter: ExpenseFilter::default(),
                generation: 0,
                list_cache: None,
                summary_cache: None,
                subscription: None,
                watcher: None,
            })),
        })
    }

    /// Begins following the session: applies the current identity, then
    /// reacts to every identity change until `stop` is called.
    pub fn start(&self) {
        let mut identities = self.session.watch_identity();
        connect_identity(&self.repository, &self.inner, self.session.current_identity());

        let repository = Arc::clone(&self.repository);
        let inner = Arc::clone(&self.inner);
        let watcher = tokio::spawn(async move {
            while identities.changed().await.is_ok() {
                let identity = identities.borrow_and_update().clone();
                connect_identity(&repository, &inner, identity);
            }
        });
        self.inner.write().unwrap().watcher = Some(watcher);
    }

    /// Tears down the identity watcher and any open subscription.
    pub fn stop(&self) {
        let mut state = self.inner.write().unwrap();
        if let Some(watcher) = state.watcher.take() {
            watcher.abort();
        }
        if let Some(subscription) = state.subscription.take() {
            subscription.abort();
        }
    }

    /// Reacts to the identity appearing, disappearing or switching.
    pub fn handle_identity(&self, identity: Option<String>) {
        connect_identity(&self.repository, &self.inner, identity);
    }

    /// Replaces the live list with a record set pushed for `owner_id`.
    /// Dropped when that owner is no longer the current one.
    pub fn apply_snapshot(&self, owner_id: &str, documents: Vec<ExpenseDocument>) {
        apply_snapshot_to(&self.inner, owner_id, documents);
    }

    /// Surfaces a stream failure without touching the cached list.
    /// Dropped when `owner_id` is no longer the current owner.
    pub fn apply_subscription_error(&self, owner_id: &str, message: String) {
        apply_subscription_error_to(&self.inner, owner_id, message);
    }

    pub fn set_search_term(&self, search_term: impl Into<String>) {
        self.inner.write().unwrap().filter.search_term = search_term.into();
    }

    pub fn set_category_filter(&self, category: CategoryFilter) {
        self.inner.write().unwrap().filter.category = category;
    }

    /// Current state, filtered list and aggregates. The filtered list is
    /// recomputed when the list generation, search term or category
    /// filter changed; the aggregates only when the generation changed,
    /// since they always cover the full list.
    pub fn view(&self) -> TrackerView {
        let mut state = self.inner.write().unwrap();

        let list_stale = match &state.list_cache {
            Some(cache) => cache.generation != state.generation || cache.filter != state.filter,
            None => true,
        };
        if list_stale {
            let filtered = insights::filter_expenses(
                &state.expenses,
                &state.filter.search_term,
                state.filter.category,
            );
            state.list_cache = Some(CachedList {
                generation: state.generation,
                filter: state.filter.clone(),
                filtered,
            });
        }

        let summary_stale = match &state.summary_cache {
            Some(cache) => cache.generation != state.generation,
            None => true,
        };
        if summary_stale {
            let summary = insights::summarize(&state.expenses, Utc::now().date_naive());
            state.summary_cache = Some(CachedSummary {
                generation: state.generation,
                summary,
            });
        }

        let expenses = state
            .list_cache
            .as_ref()
            .map(|cache| cache.filtered.clone())
            .unwrap_or_default();
        let summary = state
            .summary_cache
            .as_ref()
            .map(|cache| cache.summary.clone())
            .unwrap_or_default();
        TrackerView {
            state: state.view_state,
            last_error: state.last_error.clone(),
            expenses,
            summary,
            quarantined_documents: state.quarantined,
        }
    }

    /// Dispatches a create intent. The local list is not touched; the
    /// next snapshot push reflects the write.
    pub async fn add_expense(&self, new_expense: NewExpense) -> Result<Expense> {
        let owner_id = self.current_owner()?;
        self.expense_service.add_expense(&owner_id, new_expense).await
    }

    pub async fn update_expense(&self, update: ExpenseUpdate) -> Result<Expense> {
        let owner_id = self.current_owner()?;
        self.expense_service.update_expense(&owner_id, update).await
    }

    pub async fn delete_expense(&self, expense_id: &str) -> Result<usize> {
        let owner_id = self.current_owner()?;
        self.expense_service
            .delete_expense(&owner_id, expense_id)
            .await
    }

    fn current_owner(&self) -> Result<String> {
        self.inner
            .read()
            .unwrap()
            .owner_id
            .clone()
            .ok_or(Error::Unauthenticated)
    }
}

/// Applies an identity change: disposes the previous subscription, then
/// either resets to `Unauthenticated` or opens an owner-scoped stream and
/// spawns its listener.
fn connect_identity(
    repository: &Arc<dyn ExpenseRepositoryTrait>,
    inner: &Arc<RwLock<TrackerState>>,
    identity: Option<String>,
) {
    let mut state = inner.write().unwrap();

    // At most one live subscription; dispose the previous one before
    // anything else happens for the new identity.
    if let Some(subscription) = state.subscription.take() {
        subscription.abort();
    }
    state.list_cache = None;
    state.summary_cache = None;

    match identity {
        None => {
            debug!("session ended, discarding cached expenses");
            state.view_state = ViewState::Unauthenticated;
            state.owner_id = None;
            state.expenses.clear();
            state.quarantined = 0;
            state.last_error = None;
            state.generation += 1;
        }
        Some(owner_id) => {
            state.view_state = ViewState::Loading;
            state.owner_id = Some(owner_id.clone());
            state.last_error = None;
            match repository.subscribe(&owner_id) {
                Ok(mut subscription) => {
                    let listener_state = Arc::clone(inner);
                    // Tag every delivery with the owner this stream was
                    // opened for. Aborting the task only lands at an await
                    // point, so a push already past `recv()` can arrive
                    // after an identity switch; the tag lets the apply
                    // side drop it.
                    let listener_owner = owner_id.clone();
                    state.subscription = Some(tokio::spawn(async move {
                        loop {
                            match subscription.receiver.recv().await {
                                Ok(RepositoryPush::Snapshot(documents)) => {
                                    apply_snapshot_to(&listener_state, &listener_owner, documents);
                                }
                                Ok(RepositoryPush::Error(message)) => {
                                    apply_subscription_error_to(
                                        &listener_state,
                                        &listener_owner,
                                        message,
                                    );
                                }
                                Err(RecvError::Lagged(skipped)) => {
                                    // Every push is a full replace, so a
                                    // missed one costs nothing.
                                    warn!("snapshot stream lagged, skipped {} pushes", skipped);
                                }
                                Err(RecvError::Closed) => {
                                    let interrupted = SubscriptionError::Interrupted(
                                        "snapshot stream closed".to_string(),
                                    );
                                    apply_subscription_error_to(
                                        &listener_state,
                                        &listener_owner,
                                        interrupted.to_string(),
                                    );
                                    break;
                                }
                            }
                        }
                    }));
                }
                Err(e) => {
                    error!("failed to subscribe for owner {}: {}", owner_id, e);
                    state.view_state = ViewState::Error;
                    state.last_error = Some(e.to_string());
                }
            }
        }
    }
}

/// Replaces the live list with a record set pushed for `owner_id`.
/// Malformed documents are quarantined at this boundary and never reach
/// the aggregates.
fn apply_snapshot_to(
    inner: &RwLock<TrackerState>,
    owner_id: &str,
    documents: Vec<ExpenseDocument>,
) {
    let mut expenses = Vec::with_capacity(documents.len());
    let mut quarantined = 0usize;
    for document in &documents {
        match Expense::from_document(document) {
            Ok(expense) => expenses.push(expense),
            Err(e) => {
                warn!("quarantining malformed document: {}", e);
                quarantined += 1;
            }
        }
    }
    insights::sort_by_created_desc(&mut expenses);

    let mut state = inner.write().unwrap();
    if state.owner_id.as_deref() != Some(owner_id) {
        // The session ended or switched owners while this push was in
        // flight; it belongs to a disposed subscription.
        debug!("dropping snapshot for {}, no longer the current owner", owner_id);
        return;
    }
    debug!(
        "snapshot applied: {} expenses, {} quarantined",
        expenses.len(),
        quarantined
    );
    state.expenses = expenses;
    state.quarantined = quarantined;
    state.generation += 1;
    state.view_state = ViewState::Ready;
    state.last_error = None;
}

/// Surfaces a stream failure for `owner_id`. Cached expenses are kept so
/// the last good view stays usable.
fn apply_subscription_error_to(inner: &RwLock<TrackerState>, owner_id: &str, message: String) {
    let mut state = inner.write().unwrap();
    if state.owner_id.as_deref() != Some(owner_id) {
        debug!("dropping stream error for {}, no longer the current owner", owner_id);
        return;
    }
    error!("expense subscription failed for {}: {}", owner_id, message);
    state.view_state = ViewState::Error;
    state.last_error = Some(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationError;
    use crate::expenses::expenses_traits::SnapshotSubscription;
    use crate::expenses::Category;
    use crate::session::LocalSessionProvider;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Repository double whose pushes are driven by the test.
    struct StubRepository {
        sender: broadcast::Sender<RepositoryPush>,
        subscribe_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    impl StubRepository {
        fn new() -> Self {
            StubRepository {
                sender: broadcast::channel(16).0,
                subscribe_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExpenseRepositoryTrait for StubRepository {
        fn subscribe(&self, _owner_id: &str) -> Result<SnapshotSubscription> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SnapshotSubscription {
                receiver: self.sender.subscribe(),
            })
        }

        async fn create(&self, owner_id: &str, new_expense: NewExpense) -> Result<Expense> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Expense {
                id: "stub-id".to_string(),
                title: new_expense.title.clone(),
                amount: new_expense.amount,
                category: new_expense.category,
                date: new_expense.effective_date(),
                owner_id: owner_id.to_string(),
                created_at: Some(Utc::now()),
            })
        }

        async fn update(&self, owner_id: &str, update: ExpenseUpdate) -> Result<Expense> {
            Ok(Expense {
                id: update.id,
                title: update.title,
                amount: update.amount,
                category: update.category,
                date: update.date,
                owner_id: owner_id.to_string(),
                created_at: Some(Utc::now()),
            })
        }

        async fn delete(&self, _owner_id: &str, _expense_id: &str) -> Result<usize> {
            Ok(1)
        }
    }

    /// Repository double that cannot open a stream.
    struct FailingRepository;

    #[async_trait]
    impl ExpenseRepositoryTrait for FailingRepository {
        fn subscribe(&self, owner_id: &str) -> Result<SnapshotSubscription> {
            Err(SubscriptionError::OpenFailed(format!("no store for {}", owner_id)).into())
        }

        async fn create(&self, _owner_id: &str, _new_expense: NewExpense) -> Result<Expense> {
            unreachable!()
        }

        async fn update(&self, _owner_id: &str, _update: ExpenseUpdate) -> Result<Expense> {
            unreachable!()
        }

        async fn delete(&self, _owner_id: &str, _expense_id: &str) -> Result<usize> {
            unreachable!()
        }
    }

    fn tracker_with_stub() -> (Arc<StubRepository>, Arc<TrackerService>) {
        let repository = Arc::new(StubRepository::new());
        let session = Arc::new(LocalSessionProvider::new());
        let tracker = TrackerService::new(repository.clone(), session);
        (repository, tracker)
    }

    fn sample_document(id: &str, title: &str, amount: Decimal) -> ExpenseDocument {
        Expense {
            id: id.to_string(),
            title: title.to_string(),
            amount,
            category: Category::Food,
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            owner_id: "user-1".to_string(),
            created_at: Some(Utc::now()),
        }
        .to_document()
    }

    fn sample_new_expense(title: &str) -> NewExpense {
        NewExpense {
            id: None,
            title: title.to_string(),
            amount: dec!(4.50),
            category: Category::Food,
            date: NaiveDate::from_ymd_opt(2024, 1, 5),
        }
    }

    #[tokio::test]
    async fn session_lifecycle_drives_the_state_machine() {
        let (_repository, tracker) = tracker_with_stub();
        assert_eq!(tracker.view().state, ViewState::Unauthenticated);

        tracker.handle_identity(Some("user-1".to_string()));
        assert_eq!(tracker.view().state, ViewState::Loading);

        tracker.apply_snapshot("user-1", vec![sample_document("e-1", "Coffee", dec!(4.50))]);
        let ready = tracker.view();
        assert_eq!(ready.state, ViewState::Ready);
        assert_eq!(ready.summary.transaction_count, 1);

        // A stream failure surfaces but keeps the cached list.
        tracker.apply_subscription_error("user-1", "stream interrupted".to_string());
        let failed = tracker.view();
        assert_eq!(failed.state, ViewState::Error);
        assert_eq!(failed.last_error.as_deref(), Some("stream interrupted"));
        assert_eq!(failed.summary.transaction_count, 1);

        // Sign-out discards everything.
        tracker.handle_identity(None);
        let signed_out = tracker.view();
        assert_eq!(signed_out.state, ViewState::Unauthenticated);
        assert!(signed_out.expenses.is_empty());
        assert_eq!(signed_out.summary.transaction_count, 0);
    }

    #[tokio::test]
    async fn subscribe_failure_moves_straight_to_error() {
        let session = Arc::new(LocalSessionProvider::new());
        let tracker = TrackerService::new(Arc::new(FailingRepository), session);

        tracker.handle_identity(Some("user-1".to_string()));
        let view = tracker.view();
        assert_eq!(view.state, ViewState::Error);
        assert!(view
            .last_error
            .as_deref()
            .unwrap()
            .contains("no store for user-1"));
    }

    #[tokio::test]
    async fn identity_change_disposes_the_previous_subscription() {
        let (repository, tracker) = tracker_with_stub();

        tracker.handle_identity(Some("user-1".to_string()));
        tracker.handle_identity(Some("user-2".to_string()));
        assert_eq!(repository.subscribe_calls.load(Ordering::SeqCst), 2);

        // The aborted listener drops its receiver; only the live one stays.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(repository.sender.receiver_count(), 1);

        tracker.stop();
    }

    #[tokio::test]
    async fn pushes_from_a_replaced_identity_are_dropped() {
        let (_repository, tracker) = tracker_with_stub();

        tracker.handle_identity(Some("alice".to_string()));
        tracker.handle_identity(Some("bob".to_string()));

        // A listener already past `recv()` when the switch landed still
        // delivers the old owner's records; they must not reach bob's
        // view.
        tracker.apply_snapshot("alice", vec![sample_document("a-1", "Groceries", dec!(30.00))]);
        let view = tracker.view();
        assert_eq!(view.state, ViewState::Loading);
        assert!(view.expenses.is_empty());

        tracker.apply_snapshot("bob", vec![sample_document("b-1", "Taxi", dec!(12.00))]);
        let view = tracker.view();
        assert_eq!(view.state, ViewState::Ready);
        assert_eq!(view.expenses.len(), 1);
        assert_eq!(view.expenses[0].title, "Taxi");
    }

    #[tokio::test]
    async fn stale_stream_errors_do_not_resurrect_a_closed_session() {
        let (_repository, tracker) = tracker_with_stub();

        tracker.handle_identity(Some("alice".to_string()));
        tracker.handle_identity(None);
        tracker.apply_subscription_error("alice", "stream interrupted".to_string());

        let view = tracker.view();
        assert_eq!(view.state, ViewState::Unauthenticated);
        assert!(view.last_error.is_none());
    }

    #[tokio::test]
    async fn malformed_documents_are_quarantined_not_aggregated() {
        let (_repository, tracker) = tracker_with_stub();
        tracker.handle_identity(Some("user-1".to_string()));

        let malformed = ExpenseDocument {
            id: "bad-1".to_string(),
            data: json!({ "title": "Mystery", "amount": "???", "category": "Food",
                          "date": "2024-01-05", "ownerId": "user-1" }),
        };
        tracker.apply_snapshot("user-1", vec![
            sample_document("e-1", "Coffee", dec!(4.50)),
            malformed,
        ]);

        let view = tracker.view();
        assert_eq!(view.quarantined_documents, 1);
        assert_eq!(view.summary.transaction_count, 1);
        assert_eq!(view.summary.total_spending, dec!(4.50));
    }

    #[tokio::test]
    async fn writes_require_a_session_and_valid_input() {
        let (repository, tracker) = tracker_with_stub();

        let unauthenticated = tracker.add_expense(sample_new_expense("Coffee")).await;
        assert!(matches!(unauthenticated, Err(Error::Unauthenticated)));
        assert_eq!(repository.create_calls.load(Ordering::SeqCst), 0);

        tracker.handle_identity(Some("user-1".to_string()));
        tracker.apply_snapshot("user-1", Vec::new());

        let invalid = tracker.add_expense(sample_new_expense("   ")).await;
        assert!(matches!(
            invalid,
            Err(Error::Validation(ValidationError::MissingField(_)))
        ));
        assert_eq!(repository.create_calls.load(Ordering::SeqCst), 0);

        tracker.add_expense(sample_new_expense("Coffee")).await.unwrap();
        assert_eq!(repository.create_calls.load(Ordering::SeqCst), 1);

        // No optimistic mutation: the list stays empty until a push lands.
        assert_eq!(tracker.view().summary.transaction_count, 0);
    }

    #[test]
    fn view_is_memoized_until_list_or_filter_changes() {
        let repository = Arc::new(StubRepository::new());
        let session = Arc::new(LocalSessionProvider::new());
        let tracker = TrackerService::new(repository, session);
        tracker.inner.write().unwrap().owner_id = Some("user-1".to_string());

        tracker.apply_snapshot("user-1", vec![sample_document("e-1", "Coffee", dec!(4.50))]);
        assert_eq!(tracker.view().summary.transaction_count, 1);

        // Mutate the live list without bumping the generation; a memoized
        // view must not notice.
        tracker.inner.write().unwrap().expenses.clear();
        assert_eq!(tracker.view().summary.transaction_count, 1);

        // Changing the search term recomputes only the filtered list; the
        // aggregates stay keyed to the list generation alone.
        tracker.set_search_term("anything");
        let recomputed = tracker.view();
        assert!(recomputed.expenses.is_empty());
        assert_eq!(recomputed.summary.transaction_count, 1);

        // A fresh snapshot invalidates both.
        tracker.set_search_term("");
        tracker.apply_snapshot("user-1", vec![
            sample_document("e-1", "Coffee", dec!(4.50)),
            sample_document("e-2", "Bus", dec!(2.00)),
        ]);
        let replaced = tracker.view();
        assert_eq!(replaced.expenses.len(), 2);
        assert_eq!(replaced.summary.transaction_count, 2);
    }

    #[test]
    fn filtered_list_narrows_while_summary_covers_everything() {
        let repository = Arc::new(StubRepository::new());
        let session = Arc::new(LocalSessionProvider::new());
        let tracker = TrackerService::new(repository, session);
        tracker.inner.write().unwrap().owner_id = Some("user-1".to_string());

        let mut bus = Expense::from_document(&sample_document("e-2", "Bus", dec!(2.00))).unwrap();
        bus.category = Category::Transport;
        tracker.apply_snapshot("user-1", vec![
            sample_document("e-1", "Coffee", dec!(4.50)),
            bus.to_document(),
        ]);
        tracker.set_category_filter(CategoryFilter::Only(Category::Transport));

        let view = tracker.view();
        assert_eq!(view.expenses.len(), 1);
        assert_eq!(view.expenses[0].title, "Bus");
        assert_eq!(view.summary.transaction_count, 2);
        assert_eq!(view.summary.total_spending, dec!(6.50));
    }
}
