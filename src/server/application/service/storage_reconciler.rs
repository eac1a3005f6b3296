use crate::core::{
    domain::{
        error::ProvisionResult,
        model::{
            resource::StorageDevice,
            server::{AttachStorageRequest, DetachStorageRequest, ServerDetails},
        },
    },
    infrastructure::server_api::ServerApi,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Attach/detach actions turning one set of additional devices into another.
///
/// A device changed in any field is detached and attached again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageDelta {
    pub to_detach: Vec<StorageDevice>,
    pub to_attach: Vec<StorageDevice>,
}

impl StorageDelta {
    pub fn compute(previous: &BTreeSet<StorageDevice>, desired: &BTreeSet<StorageDevice>) -> Self {
        Self {
            to_detach: previous.difference(desired).cloned().collect(),
            to_attach: desired.difference(previous).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_detach.is_empty() && self.to_attach.is_empty()
    }
}

/// Applies a `StorageDelta` to a stopped server.
pub struct StorageReconciler<'a> {
    api: &'a dyn ServerApi,
}

impl<'a> StorageReconciler<'a> {
    pub fn new(api: &'a dyn ServerApi) -> Self {
        Self { api }
    }

    /// Runs every detach, then every attach.
    ///
    /// Devices no longer present on `live` are skipped. The first failure
    /// aborts; actions already issued stay applied.
    pub async fn apply(
        &self,
        server_uuid: &str,
        live: &ServerDetails,
        delta: &StorageDelta,
    ) -> ProvisionResult<()> {
        for device in &delta.to_detach {
            if live.storage_device(&device.storage).is_none() {
                debug!(
                    storage = %device.storage,
                    "Storage already detached, skipping"
                );
                continue;
            }
            info!(storage = %device.storage, address = %device.address, "Detaching storage");
            self.api
                .detach_storage(&DetachStorageRequest {
                    server_uuid: server_uuid.to_string(),
                    address: device.address.clone(),
                })
                .await?;
        }

        for device in &delta.to_attach {
            info!(storage = %device.storage, address = %device.address, "Attaching storage");
            self.api
                .attach_storage(&AttachStorageRequest {
                    server_uuid: server_uuid.to_string(),
                    address: device.address.clone(),
                    storage_uuid: device.storage.clone(),
                    device_type: Some(device.device_type),
                })
                .await?;
        }

        Ok(())
    }
}
