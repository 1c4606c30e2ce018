use std::sync::Arc;
use std::time::Duration;

use spendwise_core::expenses::InMemoryExpenseRepository;
use spendwise_core::session::LocalSessionProvider;
use spendwise_core::tracker::{TrackerService, TrackerView};

pub fn build_tracker() -> (
    Arc<InMemoryExpenseRepository>,
    Arc<LocalSessionProvider>,
    Arc<TrackerService>,
) {
    let repository = Arc::new(InMemoryExpenseRepository::new());
    let session = Arc::new(LocalSessionProvider::new());
    let tracker = TrackerService::new(repository.clone(), session.clone());
    (repository, session, tracker)
}

/// Polls the tracker until the view satisfies the predicate. Writes are
/// fire-and-forget and land via the next snapshot push, so tests wait for
/// the push instead of assuming it already arrived.
pub async fn wait_until(
    tracker: &Arc<TrackerService>,
    description: &str,
    predicate: impl Fn(&TrackerView) -> bool,
) -> TrackerView {
    for _ in 0..400 {
        let view = tracker.view();
        if predicate(&view) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "timed out waiting until {}; last view: {:?}",
        description,
        tracker.view()
    );
}
