use std::{
    fmt,
    sync::{Arc, Weak},
};

use shared::snapshot::ApplicationSnapshot;

use crate::engine::{ForestEngine, NoopEngine};

/// The application state paired with the engine that owns it.
///
/// Contexts are shared behind `Arc` and never mutated; every store action
/// produces a new one.
#[derive(Debug, Clone)]
pub struct ApplicationContext {
    pub state: ApplicationSnapshot,
    pub engine: EngineRef,
}

impl ApplicationContext {
    pub fn new(state: ApplicationSnapshot, engine: EngineRef) -> Self {
        Self { state, engine }
    }

    pub fn empty() -> Self {
        Self::new(ApplicationSnapshot::empty(), EngineRef::detached())
    }
}

impl PartialEq for ApplicationContext {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state && self.engine.ptr_eq(&other.engine)
    }
}

/// Non-owning handle from a context back to its engine.
#[derive(Clone)]
pub struct EngineRef(Weak<dyn ForestEngine>);

impl EngineRef {
    /// A reference that resolves to [`NoopEngine`].
    pub fn detached() -> Self {
        let weak: Weak<dyn ForestEngine> = Weak::<NoopEngine>::new();
        Self(weak)
    }

    pub fn attach<E: ForestEngine + 'static>(engine: &Arc<E>) -> Self {
        let weak: Weak<E> = Arc::downgrade(engine);
        Self(weak)
    }

    pub fn is_attached(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Resolves the engine, falling back to [`NoopEngine`] once it is gone.
    pub fn upgrade(&self) -> Arc<dyn ForestEngine> {
        self.0
            .upgrade()
            .unwrap_or_else(|| Arc::new(NoopEngine) as Arc<dyn ForestEngine>)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EngineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRef")
            .field("attached", &self.is_attached())
            .finish()
    }
}
