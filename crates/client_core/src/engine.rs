use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shared::snapshot::ApplicationSnapshot;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    config::ClientSettings,
    context::{ApplicationContext, EngineRef},
    error::EngineError,
    normalize::find_dangling_references,
    store::{Store, StoreAction, StorePhase},
    transport::Transport,
    view_context::ViewContext,
};

type EngineResult = Result<Option<Arc<ApplicationContext>>, EngineError>;

/// Entry point UI code talks to.
///
/// `Ok(None)` from `navigate` or `invoke_command` means the server produced
/// no update and the current context is unchanged.
#[async_trait]
pub trait ForestEngine: Send + Sync {
    fn current_context(&self) -> Arc<ApplicationContext>;
    fn subscribe(&self) -> broadcast::Receiver<Arc<ApplicationContext>>;
    async fn invoke_command(
        &self,
        instance_id: &str,
        command: &str,
        arg: Value,
    ) -> EngineResult;
    async fn navigate(&self, template: &str) -> EngineResult;
}

/// Engine bound to contexts that have no live engine behind them.
pub struct NoopEngine;

#[async_trait]
impl ForestEngine for NoopEngine {
    fn current_context(&self) -> Arc<ApplicationContext> {
        Arc::new(ApplicationContext::empty())
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<ApplicationContext>> {
        let (_, rx) = broadcast::channel(1);
        rx
    }

    async fn invoke_command(
        &self,
        _instance_id: &str,
        _command: &str,
        _arg: Value,
    ) -> EngineResult {
        Ok(None)
    }

    async fn navigate(&self, _template: &str) -> EngineResult {
        Err(EngineError::Detached)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub reject_dangling_references: bool,
}

impl From<&ClientSettings> for EngineOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            reject_dangling_references: settings.reject_dangling_references,
        }
    }
}

pub struct Engine<T: Transport + 'static> {
    transport: T,
    store: Store,
    options: EngineOptions,
}

impl<T: Transport + 'static> Engine<T> {
    pub fn new(transport: T) -> Arc<Self> {
        Self::with_options(transport, EngineOptions::default())
    }

    /// Builds the engine and binds the store's first context to it.
    pub fn with_options(transport: T, options: EngineOptions) -> Arc<Self> {
        let engine = Arc::new(Self {
            transport,
            store: Store::new(),
            options,
        });
        let bootstrap = ApplicationContext::new(
            ApplicationSnapshot::empty(),
            EngineRef::attach(&engine),
        );
        engine
            .store
            .dispatch(StoreAction::Replace(Arc::new(bootstrap)));
        engine
    }

    pub fn phase(&self) -> StorePhase {
        self.store.phase()
    }

    pub fn view_context(&self, instance_id: &str) -> Option<ViewContext> {
        let context = self.store.current();
        context
            .state
            .instance(instance_id)
            .map(|view| ViewContext::new(view, context.engine.clone()))
    }

    /// Runs [`ForestEngine::invoke_command`] on the tokio runtime and returns
    /// without waiting for the server.
    pub fn spawn_invoke_command(
        self: &Arc<Self>,
        instance_id: impl Into<String>,
        command: impl Into<String>,
        arg: Value,
    ) -> JoinHandle<EngineResult> {
        let engine = Arc::clone(self);
        let instance_id = instance_id.into();
        let command = command.into();
        tokio::spawn(async move { engine.invoke_command(&instance_id, &command, arg).await })
    }

    fn check_references(&self, snapshot: &ApplicationSnapshot) -> Result<(), EngineError> {
        let dangling = find_dangling_references(snapshot);
        if dangling.is_empty() {
            return Ok(());
        }
        for reference in &dangling {
            warn!(
                owner = %reference.owner,
                region = %reference.region,
                missing = %reference.missing,
                template = %snapshot.template,
                "engine: region references missing instance"
            );
        }
        if self.options.reject_dangling_references {
            return Err(EngineError::DanglingReferences(dangling));
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Transport + 'static> ForestEngine for Engine<T> {
    fn current_context(&self) -> Arc<ApplicationContext> {
        self.store.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<ApplicationContext>> {
        self.store.subscribe()
    }

    async fn invoke_command(
        &self,
        instance_id: &str,
        command: &str,
        arg: Value,
    ) -> EngineResult {
        let snapshot = match self.transport.invoke_command(instance_id, command, &arg).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                warn!(instance_id, command, "engine: command produced no update");
                return Ok(None);
            }
            Err(err) => {
                warn!(instance_id, command, error = %err, "engine: command failed");
                return Err(err.into());
            }
        };
        self.check_references(&snapshot)?;

        let merged = self.store.dispatch(StoreAction::MergeState(snapshot));
        info!(
            instance_id,
            command,
            template = %merged.state.template,
            instances = merged.state.instances.len(),
            "engine: merged command result"
        );
        Ok(Some(merged))
    }

    async fn navigate(&self, template: &str) -> EngineResult {
        let before = self.store.current();
        let snapshot = match self.transport.navigate(template).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                warn!(template, "engine: navigation produced no update");
                return Ok(None);
            }
            Err(err) => {
                warn!(template, error = %err, "engine: navigation failed");
                return Err(err.into());
            }
        };
        self.check_references(&snapshot)?;

        let context = Arc::new(ApplicationContext::new(snapshot, before.engine.clone()));
        self.store
            .dispatch(StoreAction::Replace(Arc::clone(&context)));
        info!(
            template,
            resolved = %context.state.template,
            roots = context.state.roots().len(),
            "engine: navigated"
        );
        Ok(Some(context))
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
