//! External backend scoping configuration

use serde::{Deserialize, Serialize};

/// Identifiers that scope the two external collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Scope identifier of the metrics backend (required)
    pub instance_id: String,
    /// Target collection of the estimate store (required)
    pub table_name: String,
}

impl BackendSettings {
    pub fn new(instance_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            table_name: table_name.into(),
        }
    }

    /// Strip stray whitespace picked up from deployment templates
    pub fn normalized(mut self) -> Self {
        self.instance_id = self.instance_id.trim().to_string();
        self.table_name = self.table_name.trim().to_string();
        self
    }
}
