use std::sync::Arc;

use docsearch_index::QueryEngine;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::reducer::{Generation, Outcome, SessionReducer, SessionState};

struct Shared {
    reducer: Mutex<SessionReducer>,
    state_tx: watch::Sender<SessionState>,
}

impl Shared {
    /// Runs `f` against the reducer and publishes the resulting state while
    /// still holding the lock, so subscribers observe transitions in order.
    fn update<R>(&self, f: impl FnOnce(&mut SessionReducer) -> R) -> R {
        let mut reducer = self.reducer.lock();
        let out = f(&mut reducer);
        if reducer.state() != &*self.state_tx.borrow() {
            self.state_tx.send_replace(reducer.state().clone());
        }
        out
    }
}

/// Drives one search box.
///
/// Each submitted query gets a new [`Generation`] and runs on its own task;
/// finished searches report `(generation, outcome)` over a channel to a
/// single driver task that feeds them through the [`SessionReducer`]. A
/// superseded search is never aborted (its shard fetch may be shared with a
/// newer query); its outcome is simply discarded on arrival.
pub struct SearchSession {
    engine: Arc<QueryEngine>,
    shared: Arc<Shared>,
    outcomes: mpsc::UnboundedSender<(Generation, Outcome)>,
    handle: Handle,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("section", &self.engine.section())
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl SearchSession {
    /// Creates a session whose searches run on `handle`.
    pub fn new(engine: Arc<QueryEngine>, handle: Handle) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let shared = Arc::new(Shared {
            reducer: Mutex::new(SessionReducer::new()),
            state_tx,
        });

        let (outcomes, mut outcome_rx) = mpsc::unbounded_channel::<(Generation, Outcome)>();
        let driver = Arc::clone(&shared);
        handle.spawn(async move {
            while let Some((generation, outcome)) = outcome_rx.recv().await {
                driver.update(|reducer| reducer.apply(generation, outcome));
            }
            tracing::trace!("search session driver stopped");
        });

        Self {
            engine,
            shared,
            outcomes,
            handle,
        }
    }

    /// Creates a session on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn on_current_runtime(engine: Arc<QueryEngine>) -> Self {
        Self::new(engine, Handle::current())
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    /// Submits the current text of the search box. Results arrive through
    /// [`subscribe`](Self::subscribe) or
    /// [`subscribe_results`](Self::subscribe_results).
    pub fn submit_query(&self, text: &str) {
        let Some((generation, query)) = self.shared.update(|reducer| reducer.issue(text)) else {
            return;
        };

        let engine = Arc::clone(&self.engine);
        let outcomes = self.outcomes.clone();
        self.handle.spawn(async move {
            let outcome = Outcome::from_search(engine.search(&query).await);
            // The driver only stops once every sender is gone.
            let _ = outcomes.send((generation, outcome));
        });
    }

    /// Empties the search box; in-flight searches become stale.
    pub fn clear(&self) {
        self.shared.update(SessionReducer::clear);
    }

    pub fn snapshot(&self) -> SessionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Newest generation issued so far.
    pub fn latest_generation(&self) -> Generation {
        self.shared.reducer.lock().latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Calls `handler` with every visible state change, on a runtime task.
    /// Dropping the returned [`Subscription`] stops delivery.
    pub fn subscribe_results<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(&SessionState) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let task = self.handle.spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                handler(&state);
            }
        });
        Subscription { task }
    }
}

/// Handle returned by [`SearchSession::subscribe_results`].
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
