//! Serialized state container for the live [`ApplicationContext`].

use std::sync::Arc;

use parking_lot::RwLock;
use shared::snapshot::ApplicationSnapshot;
use tokio::sync::broadcast;
use tracing::debug;

use crate::context::ApplicationContext;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum StoreAction {
    /// Install the given context verbatim.
    Replace(Arc<ApplicationContext>),
    /// Shallow-merge a snapshot over the current state.
    MergeState(ApplicationSnapshot),
}

impl StoreAction {
    fn label(&self) -> &'static str {
        match self {
            StoreAction::Replace(_) => "replace",
            StoreAction::MergeState(_) => "merge_state",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Uninitialized,
    Active,
}

/// Pure transition function behind [`Store::dispatch`].
///
/// A merge replaces `instances` and `hierarchy` wholesale. The previous
/// template survives only when the incoming one is empty.
pub fn reduce(current: &Arc<ApplicationContext>, action: StoreAction) -> Arc<ApplicationContext> {
    match action {
        StoreAction::Replace(context) => context,
        StoreAction::MergeState(incoming) => {
            let template = if incoming.template.is_empty() {
                current.state.template.clone()
            } else {
                incoming.template
            };
            Arc::new(ApplicationContext {
                state: ApplicationSnapshot {
                    template,
                    instances: incoming.instances,
                    hierarchy: incoming.hierarchy,
                },
                engine: current.engine.clone(),
            })
        }
    }
}

struct StoreState {
    context: Arc<ApplicationContext>,
    phase: StorePhase,
}

pub struct Store {
    inner: RwLock<StoreState>,
    events: broadcast::Sender<Arc<ApplicationContext>>,
}

impl Store {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(StoreState {
                context: Arc::new(ApplicationContext::empty()),
                phase: StorePhase::Uninitialized,
            }),
            events,
        }
    }

    pub fn current(&self) -> Arc<ApplicationContext> {
        Arc::clone(&self.inner.read().context)
    }

    pub fn phase(&self) -> StorePhase {
        self.inner.read().phase
    }

    /// Applies `action`, commits the result and notifies subscribers under
    /// the write lock, in commit order.
    pub fn dispatch(&self, action: StoreAction) -> Arc<ApplicationContext> {
        let label = action.label();
        let is_replace = matches!(action, StoreAction::Replace(_));

        let mut guard = self.inner.write();
        let next = reduce(&guard.context, action);
        guard.context = Arc::clone(&next);
        if is_replace {
            guard.phase = StorePhase::Active;
        }
        debug!(
            action = label,
            template = %next.state.template,
            instances = next.state.instances.len(),
            "store: committed action"
        );
        let _ = self.events.send(Arc::clone(&next));
        next
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ApplicationContext>> {
        self.events.subscribe()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
