//! `ServerApi` implementation over the UpCloud 1.3 REST API.

use crate::core::domain::{
    config::ProvisionerConfig,
    error::{ProvisionError, ProvisionResult},
    model::{
        server::{
            AttachStorageRequest, CreateInterface, CreateServerRequest, CreateStorageDevice,
            DetachStorageRequest, ModifyServerRequest, ServerDetails, StopServerRequest,
            WaitForServerStateRequest,
        },
        storage::{BackupRule, BackupRuleChange, ModifyStorageRequest, StorageDetails},
    },
};
use crate::core::infrastructure::{api_client::ApiClient, retry::with_retry, server_api::ServerApi};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ServerDetails,
}

#[derive(Debug, Deserialize)]
struct StorageEnvelope {
    storage: StorageDetails,
}

#[derive(Debug, Deserialize)]
struct StorageListEnvelope {
    storages: StorageList,
}

#[derive(Debug, Default, Deserialize)]
struct StorageList {
    #[serde(default)]
    storage: Vec<StorageDetails>,
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn backup_rule_body(rule: &BackupRule) -> Value {
    json!({
        "interval": rule.interval.as_str(),
        "time": rule.time,
        "retention": rule.retention.to_string(),
    })
}

fn storage_device_body(device: &CreateStorageDevice) -> Value {
    let mut body = Map::new();
    body.insert("action".into(), json!(device.action.as_str()));
    body.insert("storage".into(), json!(device.storage));
    if let Some(title) = &device.title {
        body.insert("title".into(), json!(title));
    }
    if let Some(size) = device.size {
        body.insert("size".into(), json!(size.to_string()));
    }
    if let Some(address) = &device.address {
        body.insert("address".into(), json!(address));
    }
    if let Some(device_type) = device.device_type {
        body.insert("type".into(), json!(device_type.as_str()));
    }
    if let Some(rule) = &device.backup_rule {
        body.insert("backup_rule".into(), backup_rule_body(rule));
    }
    Value::Object(body)
}

fn interface_body(interface: &CreateInterface) -> Value {
    let mut address = Map::new();
    address.insert("family".into(), json!(interface.family.as_str()));
    if let Some(ip) = &interface.address {
        address.insert("address".into(), json!(ip));
    }

    let mut body = Map::new();
    body.insert("type".into(), json!(interface.interface_type.as_str()));
    if let Some(network) = &interface.network {
        body.insert("network".into(), json!(network));
    }
    body.insert(
        "ip_addresses".into(),
        json!({ "ip_address": [Value::Object(address)] }),
    );
    body.insert(
        "source_ip_filtering".into(),
        json!(yes_no(interface.source_ip_filtering)),
    );
    body.insert("bootable".into(), json!(yes_no(interface.bootable)));
    Value::Object(body)
}

/// Wire body of `POST /server`.
pub(crate) fn create_server_body(request: &CreateServerRequest) -> Value {
    let mut server = Map::new();
    server.insert("zone".into(), json!(request.zone));
    server.insert("title".into(), json!(request.title));
    server.insert("hostname".into(), json!(request.hostname));

    if let Some(plan) = &request.plan {
        server.insert("plan".into(), json!(plan));
    } else {
        if let Some(cpu) = request.core_number {
            server.insert("core_number".into(), json!(cpu.to_string()));
        }
        if let Some(mem) = request.memory_amount {
            server.insert("memory_amount".into(), json!(mem.to_string()));
        }
    }

    server.insert("firewall".into(), json!(on_off(request.firewall)));
    server.insert("metadata".into(), json!(yes_no(request.metadata)));

    if let Some(user_data) = &request.user_data {
        server.insert("user_data".into(), json!(user_data));
    }
    if let Some(login) = &request.login_user {
        server.insert(
            "login_user".into(),
            json!({
                "username": login.username,
                "create_password": yes_no(login.create_password),
                "ssh_keys": { "ssh_key": login.ssh_keys },
            }),
        );
    }
    if let Some(delivery) = request.password_delivery {
        server.insert("password_delivery".into(), json!(delivery.as_str()));
    }

    let devices: Vec<Value> = request.storage_devices.iter().map(storage_device_body).collect();
    server.insert(
        "storage_devices".into(),
        json!({ "storage_device": devices }),
    );

    let interfaces: Vec<Value> = request.interfaces.iter().map(interface_body).collect();
    server.insert(
        "networking".into(),
        json!({ "interfaces": { "interface": interfaces } }),
    );

    json!({ "server": Value::Object(server) })
}

/// Wire body of `PUT /server/{uuid}`. Only set fields are sent.
pub(crate) fn modify_server_body(request: &ModifyServerRequest) -> Value {
    let mut server = Map::new();
    if let Some(hostname) = &request.hostname {
        server.insert("hostname".into(), json!(hostname));
    }
    if let Some(firewall) = request.firewall {
        server.insert("firewall".into(), json!(on_off(firewall)));
    }
    if let Some(metadata) = request.metadata {
        server.insert("metadata".into(), json!(yes_no(metadata)));
    }
    if let Some(plan) = &request.plan {
        server.insert("plan".into(), json!(plan));
    }
    if let Some(cpu) = request.core_number {
        server.insert("core_number".into(), json!(cpu.to_string()));
    }
    if let Some(mem) = request.memory_amount {
        server.insert("memory_amount".into(), json!(mem.to_string()));
    }
    json!({ "server": Value::Object(server) })
}

/// Wire body of `PUT /storage/{uuid}`.
pub(crate) fn modify_storage_body(request: &ModifyStorageRequest) -> Value {
    let mut storage = Map::new();
    if let Some(size) = request.size {
        storage.insert("size".into(), json!(size.to_string()));
    }
    if let Some(title) = &request.title {
        storage.insert("title".into(), json!(title));
    }
    match &request.backup_rule {
        Some(BackupRuleChange::Set(rule)) => {
            storage.insert("backup_rule".into(), backup_rule_body(rule));
        }
        Some(BackupRuleChange::Clear) => {
            storage.insert("backup_rule".into(), json!(""));
        }
        None => {}
    }
    json!({ "storage": Value::Object(storage) })
}

/// Remote service backed by the UpCloud HTTP API.
#[derive(Debug, Clone)]
pub struct UpCloudService {
    client: ApiClient,
    config: ProvisionerConfig,
}

impl UpCloudService {
    pub fn new(client: ApiClient, config: ProvisionerConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }
}

#[async_trait]
impl ServerApi for UpCloudService {
    async fn create_server(&self, request: &CreateServerRequest) -> ProvisionResult<ServerDetails> {
        let body = create_server_body(request);
        let envelope: ServerEnvelope = self.client.post("server", &body).await?;
        info!(
            uuid = %envelope.server.uuid,
            title = %envelope.server.title,
            "Server created"
        );
        Ok(envelope.server)
    }

    async fn get_server_details(&self, uuid: &str) -> ProvisionResult<ServerDetails> {
        let envelope: ServerEnvelope = self.client.get(&format!("server/{}", uuid)).await?;
        Ok(envelope.server)
    }

    async fn modify_server(&self, request: &ModifyServerRequest) -> ProvisionResult<ServerDetails> {
        let body = modify_server_body(request);
        let envelope: ServerEnvelope = self
            .client
            .put(&format!("server/{}", request.uuid), &body)
            .await?;
        Ok(envelope.server)
    }

    async fn delete_server(&self, uuid: &str) -> ProvisionResult<()> {
        self.client.delete(&format!("server/{}", uuid)).await
    }

    async fn start_server(&self, uuid: &str) -> ProvisionResult<ServerDetails> {
        let envelope: ServerEnvelope = self
            .client
            .post_empty(&format!("server/{}/start", uuid))
            .await?;
        Ok(envelope.server)
    }

    async fn stop_server(&self, request: &StopServerRequest) -> ProvisionResult<ServerDetails> {
        let body = json!({
            "stop_server": {
                "stop_type": request.stop_type.as_str(),
                "timeout": request.timeout.as_secs().to_string(),
            }
        });
        let envelope: ServerEnvelope = self
            .client
            .post(&format!("server/{}/stop", request.uuid), &body)
            .await?;
        Ok(envelope.server)
    }

    async fn attach_storage(
        &self,
        request: &AttachStorageRequest,
    ) -> ProvisionResult<ServerDetails> {
        let mut device = Map::new();
        if let Some(device_type) = request.device_type {
            device.insert("type".into(), json!(device_type.as_str()));
        }
        device.insert("address".into(), json!(request.address));
        device.insert("storage".into(), json!(request.storage_uuid));

        let envelope: ServerEnvelope = self
            .client
            .post(
                &format!("server/{}/storage/attach", request.server_uuid),
                &json!({ "storage_device": Value::Object(device) }),
            )
            .await?;
        Ok(envelope.server)
    }

    async fn detach_storage(
        &self,
        request: &DetachStorageRequest,
    ) -> ProvisionResult<ServerDetails> {
        let envelope: ServerEnvelope = self
            .client
            .post(
                &format!("server/{}/storage/detach", request.server_uuid),
                &json!({ "storage_device": { "address": request.address } }),
            )
            .await?;
        Ok(envelope.server)
    }

    async fn modify_storage(
        &self,
        request: &ModifyStorageRequest,
    ) -> ProvisionResult<StorageDetails> {
        let body = modify_storage_body(request);
        let envelope: StorageEnvelope = self
            .client
            .put(&format!("storage/{}", request.uuid), &body)
            .await?;
        Ok(envelope.storage)
    }

    async fn delete_storage(&self, uuid: &str) -> ProvisionResult<()> {
        let path = format!("storage/{}", uuid);
        // The storage can stay busy for a moment after its server is deleted.
        // Only busy and transport errors are retried.
        with_retry(self.config.retry, ProvisionError::is_transient, || {
            self.client.delete(&path)
        })
        .await
    }

    async fn list_templates(&self) -> ProvisionResult<Vec<StorageDetails>> {
        let envelope: StorageListEnvelope = self.client.get("storage/template").await?;
        Ok(envelope.storages.storage)
    }

    async fn wait_for_server_state(
        &self,
        request: &WaitForServerStateRequest,
    ) -> ProvisionResult<ServerDetails> {
        let deadline = Instant::now() + request.timeout;
        loop {
            let details = self.get_server_details(&request.uuid).await?;
            if details.state == request.desired_state {
                debug!(uuid = %request.uuid, state = %details.state, "Server reached state");
                return Ok(details);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProvisionError::Timeout {
                    server_id: request.uuid.clone(),
                    state: request.desired_state,
                    timeout: request.timeout,
                });
            }

            debug!(
                uuid = %request.uuid,
                current = %details.state,
                desired = %request.desired_state,
                "Waiting for server state"
            );
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }
}
