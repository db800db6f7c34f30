//! Flattens a server payload into an [`ApplicationSnapshot`].

use std::collections::HashSet;

use indexmap::IndexMap;
use shared::{
    domain::InstanceId,
    protocol::ForestResult,
    snapshot::{ApplicationSnapshot, ROOT_REGION},
};

/// A region entry pointing at an instance the snapshot does not contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub owner: InstanceId,
    pub region: String,
    pub missing: InstanceId,
}

/// Builds the instance map and root hierarchy for `raw`.
///
/// `instances` keeps payload order. Duplicate instance ids are last-write-wins
/// but keep the position of their first occurrence. Ids referenced by any
/// region are children; everything else is a root, in payload order. Region
/// ids missing from the payload are left out of the hierarchy; use
/// [`find_dangling_references`] to surface them.
///
/// Children are taken from the deduplicated views only, so a region on an
/// overwritten duplicate does not demote its ids from the root list.
pub fn normalize(raw: ForestResult) -> ApplicationSnapshot {
    let mut instances: IndexMap<InstanceId, _> = IndexMap::with_capacity(raw.views.len());
    for view in raw.views {
        instances.insert(view.instance_id.clone(), view);
    }

    let roots: Vec<InstanceId> = {
        let children: HashSet<&InstanceId> = instances
            .values()
            .flat_map(|view| view.child_ids())
            .collect();
        instances
            .keys()
            .filter(|id| !children.contains(id))
            .cloned()
            .collect()
    };

    ApplicationSnapshot {
        template: raw.path,
        instances,
        hierarchy: IndexMap::from([(ROOT_REGION.to_string(), roots)]),
    }
}

/// Lists region entries with no matching instance, in instance then region
/// order.
pub fn find_dangling_references(snapshot: &ApplicationSnapshot) -> Vec<DanglingReference> {
    let mut dangling = Vec::new();
    for view in snapshot.instances.values() {
        for (region, ids) in &view.regions {
            for id in ids {
                if !snapshot.instances.contains_key(id) {
                    dangling.push(DanglingReference {
                        owner: view.instance_id.clone(),
                        region: region.clone(),
                        missing: id.clone(),
                    });
                }
            }
        }
    }
    dangling
}

#[cfg(test)]
#[path = "tests/normalize_tests.rs"]
mod tests;
