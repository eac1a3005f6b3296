//! Remote operations the reconciler depends on.

use crate::core::domain::{
    error::ProvisionResult,
    model::{
        server::{
            AttachStorageRequest, CreateServerRequest, DetachStorageRequest, ModifyServerRequest,
            ServerDetails, StopServerRequest, WaitForServerStateRequest,
        },
        storage::{ModifyStorageRequest, StorageDetails},
    },
};
use async_trait::async_trait;

/// Typed access to the remote server and storage API.
///
/// Every call is at-most-once: implementations do not retry mutations on
/// their own, except for storage deletion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn create_server(&self, request: &CreateServerRequest) -> ProvisionResult<ServerDetails>;

    /// Fails with `ProvisionError::NotFound` when the server does not exist.
    async fn get_server_details(&self, uuid: &str) -> ProvisionResult<ServerDetails>;

    async fn modify_server(&self, request: &ModifyServerRequest) -> ProvisionResult<ServerDetails>;

    async fn delete_server(&self, uuid: &str) -> ProvisionResult<()>;

    async fn start_server(&self, uuid: &str) -> ProvisionResult<ServerDetails>;

    async fn stop_server(&self, request: &StopServerRequest) -> ProvisionResult<ServerDetails>;

    /// Requires the server to be stopped.
    async fn attach_storage(&self, request: &AttachStorageRequest)
    -> ProvisionResult<ServerDetails>;

    /// Requires the server to be stopped.
    async fn detach_storage(&self, request: &DetachStorageRequest)
    -> ProvisionResult<ServerDetails>;

    async fn modify_storage(&self, request: &ModifyStorageRequest)
    -> ProvisionResult<StorageDetails>;

    async fn delete_storage(&self, uuid: &str) -> ProvisionResult<()>;

    /// Public and private templates visible to the account.
    async fn list_templates(&self) -> ProvisionResult<Vec<StorageDetails>>;

    /// Polls until the server reaches the desired state.
    ///
    /// Fails with `ProvisionError::Timeout` once the request's timeout
    /// elapses. The remote action may still complete afterwards.
    async fn wait_for_server_state(
        &self,
        request: &WaitForServerStateRequest,
    ) -> ProvisionResult<ServerDetails>;
}
