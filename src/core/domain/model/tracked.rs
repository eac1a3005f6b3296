//! Per-resource state persisted between reconciler invocations.

use crate::core::domain::error::ProvisionResult;
use crate::core::domain::model::{resource::ObservedServer, storage::BackupRule};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Correlates the boot disk with its configuration.
///
/// The remote device list cannot tell a cloned template apart from any other
/// attached storage, so the boot disk UUID captured at creation is the only
/// reliable key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateIdentity {
    /// Storage UUID of the cloned boot disk.
    pub id: String,
    /// Source template reference as configured.
    pub storage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_rule: Option<BackupRule>,
}

/// Tracked attributes of one managed server.
///
/// An empty `id` means the resource does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<ObservedServer>,
}

impl TrackedServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    /// Drops everything tracked, the resource is gone.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Loads tracked state from a JSON file, empty when the file is missing.
    pub async fn load(path: impl AsRef<Path>) -> ProvisionResult<Self> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes tracked state as pretty-printed JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> ProvisionResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
