//! View-scoped access to a single instance and the commands it declares.

use std::{collections::BTreeMap, sync::Arc};

use serde_json::Value;
use shared::domain::{Command, InstanceId, ViewInstance};
use tokio::task::JoinHandle;

use crate::{
    context::{ApplicationContext, EngineRef},
    error::EngineError,
};

#[derive(Debug, Clone)]
pub struct ViewContext {
    pub instance_id: InstanceId,
    pub name: String,
    pub model: Value,
    pub links: Vec<String>,
    pub regions: BTreeMap<String, Vec<InstanceId>>,
    commands: BTreeMap<String, Command>,
    engine: EngineRef,
}

impl ViewContext {
    pub fn new(view: &ViewInstance, engine: EngineRef) -> Self {
        Self {
            instance_id: view.instance_id.clone(),
            name: view.name.clone(),
            model: view.model.clone(),
            links: view.links.clone(),
            regions: view.regions.clone(),
            commands: view.commands.clone(),
            engine,
        }
    }

    /// Resolves a declared command, or `None` if this view does not declare it.
    pub fn command(&self, command: &str) -> Option<CommandHandle> {
        let declared = self.commands.get(command)?;
        Some(CommandHandle {
            name: declared.name.clone(),
            instance_id: self.instance_id.clone(),
            engine: self.engine.clone(),
        })
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}

/// A declared command bound to its instance and engine.
#[derive(Debug, Clone)]
pub struct CommandHandle {
    pub name: String,
    pub instance_id: InstanceId,
    engine: EngineRef,
}

impl CommandHandle {
    pub async fn invoke(
        &self,
        arg: Option<Value>,
    ) -> Result<Option<Arc<ApplicationContext>>, EngineError> {
        self.engine
            .upgrade()
            .invoke_command(
                self.instance_id.as_str(),
                &self.name,
                arg.unwrap_or(Value::Null),
            )
            .await
    }

    /// Fire-and-forget variant of [`CommandHandle::invoke`].
    pub fn dispatch(
        &self,
        arg: Option<Value>,
    ) -> JoinHandle<Result<Option<Arc<ApplicationContext>>, EngineError>> {
        let handle = self.clone();
        tokio::spawn(async move { handle.invoke(arg).await })
    }
}

#[cfg(test)]
#[path = "tests/view_context_tests.rs"]
mod tests;
