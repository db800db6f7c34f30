use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::{InstanceId, ViewInstance};

/// Hierarchy key holding the ids no region owns.
pub const ROOT_REGION: &str = "";

/// Normalized, flat representation of a server-rendered view tree.
///
/// `instances` iterates in payload order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub template: String,
    pub instances: IndexMap<InstanceId, ViewInstance>,
    pub hierarchy: IndexMap<String, Vec<InstanceId>>,
}

impl ApplicationSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty() && self.instances.is_empty() && self.hierarchy.is_empty()
    }

    pub fn roots(&self) -> &[InstanceId] {
        self.hierarchy
            .get(ROOT_REGION)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn instance(&self, instance_id: &str) -> Option<&ViewInstance> {
        self.instances.get(instance_id)
    }

    /// Instances listed in `region` of `instance_id`. Ids without a matching
    /// instance are skipped.
    pub fn children<'a>(
        &'a self,
        instance_id: &str,
        region: &str,
    ) -> impl Iterator<Item = &'a ViewInstance> + 'a {
        self.instance(instance_id)
            .and_then(|view| view.regions.get(region))
            .into_iter()
            .flatten()
            .filter_map(move |child| self.instances.get(child))
    }

    pub fn root_instances(&self) -> impl Iterator<Item = &ViewInstance> + '_ {
        self.roots()
            .iter()
            .filter_map(move |id| self.instances.get(id))
    }
}
