use serde::{Deserialize, Serialize};

use crate::domain::ViewInstance;

/// Response body returned by both navigation and command endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForestResult {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub views: Vec<ViewInstance>,
}

impl ForestResult {
    pub fn new(path: impl Into<String>, views: Vec<ViewInstance>) -> Self {
        Self {
            path: path.into(),
            views,
        }
    }
}
