use std::{borrow::Borrow, collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(InstanceId);

/// Reference to a server-side action declared by a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One server-rendered view node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewInstance {
    pub instance_id: InstanceId,
    pub name: String,
    #[serde(default)]
    pub model: Value,
    #[serde(default)]
    pub regions: BTreeMap<String, Vec<InstanceId>>,
    #[serde(default)]
    pub commands: BTreeMap<String, Command>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl ViewInstance {
    pub fn new(instance_id: impl Into<InstanceId>, name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            model: Value::Null,
            regions: BTreeMap::new(),
            commands: BTreeMap::new(),
            links: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: Value) -> Self {
        self.model = model;
        self
    }

    pub fn with_region<I, S>(mut self, region: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<InstanceId>,
    {
        self.regions.insert(
            region.into(),
            children.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        let command = command.into();
        self.commands
            .insert(command.clone(), Command::new(command));
        self
    }

    /// Every id referenced by any of this view's regions, in region order.
    pub fn child_ids(&self) -> impl Iterator<Item = &InstanceId> {
        self.regions.values().flatten()
    }
}
