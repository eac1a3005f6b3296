use crate::core::domain::{
    config::ProvisionerConfig,
    error::{ProvisionError, ValidationError},
    model::{
        resource::{DesiredServer, NetworkInterfaceConfig, StorageDevice, TemplateConfig},
        server::{
            CreateServerRequest, ModifyServerRequest, PowerState, ServerDetails, StorageAction,
        },
        storage::{BackupInterval, BackupRule, BackupRuleChange, ModifyStorageRequest, StorageDetails},
        tracked::{TemplateIdentity, TrackedServer},
    },
    value_object::{Hostname, StorageDeviceType, StorageSize},
};
use crate::core::infrastructure::server_api::MockServerApi;
use crate::server::application::service::lifecycle_service::{ServerLifecycle, observe};
use crate::tests::fixtures::{disk, server_details, server_with_devices};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

const SERVER: &str = "00798b85-efdc-41ca-8021-f6ef457b8531";
const BOOT: &str = "01f3286c-a5ea-4670-8121-d0b9767d625b";
const TEMPLATE_UUID: &str = "01000000-0000-4000-8000-000030240200";
const TEMPLATE_NAME: &str = "Ubuntu Server 24.04 LTS (Noble Numbat)";

/// Mutable remote server behind a `MockServerApi`, recording every call.
#[derive(Clone)]
struct Remote {
    server: Arc<Mutex<ServerDetails>>,
    calls: Arc<Mutex<Vec<String>>>,
    modified: Arc<Mutex<Option<ModifyServerRequest>>>,
    storage_modified: Arc<Mutex<Option<ModifyStorageRequest>>>,
    created: Arc<Mutex<Option<CreateServerRequest>>>,
}

impl Remote {
    fn new(details: ServerDetails) -> Self {
        Self {
            server: Arc::new(Mutex::new(details)),
            calls: Arc::default(),
            modified: Arc::default(),
            storage_modified: Arc::default(),
            created: Arc::default(),
        }
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn snapshot(&self) -> ServerDetails {
        self.server.lock().unwrap().clone()
    }

    fn set_state(&self, state: PowerState) -> ServerDetails {
        let mut server = self.server.lock().unwrap();
        server.state = state;
        server.clone()
    }

    fn api(&self) -> MockServerApi {
        let mut api = MockServerApi::new();

        let remote = self.clone();
        api.expect_list_templates().returning(move || {
            remote.log("list_templates");
            Ok(vec![template(TEMPLATE_NAME, TEMPLATE_UUID)])
        });

        let remote = self.clone();
        api.expect_create_server().returning(move |request| {
            remote.log("create");
            *remote.created.lock().unwrap() = Some(request.clone());
            let mut devices: Vec<_> = request
                .storage_devices
                .iter()
                .map(|device| match device.action {
                    StorageAction::Clone => disk(
                        BOOT,
                        device.address.as_deref().unwrap_or("virtio:0"),
                        device.size.unwrap_or(10),
                    ),
                    StorageAction::Attach => disk(
                        &device.storage,
                        device.address.as_deref().unwrap_or_default(),
                        10,
                    ),
                })
                .collect();
            devices.reverse();
            let mut server = remote.server.lock().unwrap();
            *server = server_with_devices(SERVER, PowerState::Maintenance, devices);
            Ok(server.clone())
        });

        let remote = self.clone();
        api.expect_get_server_details().returning(move |uuid| {
            remote.log("get");
            let server = remote.snapshot();
            if server.uuid == uuid {
                Ok(server)
            } else {
                Err(ProvisionError::NotFound(format!("server/{}", uuid)))
            }
        });

        let remote = self.clone();
        api.expect_stop_server().returning(move |_| {
            remote.log("stop");
            Ok(remote.set_state(PowerState::Maintenance))
        });

        let remote = self.clone();
        api.expect_start_server().returning(move |_| {
            remote.log("start");
            Ok(remote.set_state(PowerState::Maintenance))
        });

        let remote = self.clone();
        api.expect_wait_for_server_state().returning(move |request| {
            remote.log(format!("wait:{}", request.desired_state));
            Ok(remote.set_state(request.desired_state))
        });

        let remote = self.clone();
        api.expect_modify_server().returning(move |request| {
            remote.log("modify");
            *remote.modified.lock().unwrap() = Some(request.clone());
            Ok(remote.snapshot())
        });

        let remote = self.clone();
        api.expect_modify_storage().returning(move |request| {
            remote.log(format!("modify_storage:{}", request.uuid));
            *remote.storage_modified.lock().unwrap() = Some(request.clone());
            let mut server = remote.server.lock().unwrap();
            let device = server
                .storage_devices
                .storage_device
                .iter_mut()
                .find(|device| device.uuid == request.uuid)
                .ok_or_else(|| ProvisionError::NotFound(format!("storage/{}", request.uuid)))?;
            if let Some(size) = request.size {
                device.size = size;
            }
            let mut storage = template(&device.title, &device.uuid);
            storage.size = device.size;
            Ok(storage)
        });

        let remote = self.clone();
        api.expect_detach_storage().returning(move |request| {
            remote.log(format!("detach:{}", request.address));
            let mut server = remote.server.lock().unwrap();
            server
                .storage_devices
                .storage_device
                .retain(|device| device.address != request.address);
            Ok(server.clone())
        });

        let remote = self.clone();
        api.expect_attach_storage().returning(move |request| {
            remote.log(format!("attach:{}@{}", request.storage_uuid, request.address));
            let mut server = remote.server.lock().unwrap();
            server
                .storage_devices
                .storage_device
                .push(disk(&request.storage_uuid, &request.address, 10));
            Ok(server.clone())
        });

        let remote = self.clone();
        api.expect_delete_server().returning(move |_| {
            remote.log("delete_server");
            Ok(())
        });

        let remote = self.clone();
        api.expect_delete_storage().returning(move |uuid| {
            remote.log(format!("delete_storage:{}", uuid));
            Ok(())
        });

        api
    }
}

fn template(title: &str, uuid: &str) -> StorageDetails {
    StorageDetails {
        uuid: uuid.to_string(),
        title: title.to_string(),
        size: 4,
        storage_type: "template".to_string(),
        state: "online".to_string(),
        tier: None,
        zone: None,
    }
}

fn lifecycle(api: MockServerApi) -> ServerLifecycle {
    ServerLifecycle::new(Arc::new(api), ProvisionerConfig::default())
}

fn desired() -> DesiredServer {
    DesiredServer::new(Hostname::new("web1").unwrap(), "fi-hel1")
        .with_interface(NetworkInterfaceConfig::public())
        .with_template(TemplateConfig::new(TEMPLATE_NAME).with_address("virtio:0"))
}

fn identity() -> TemplateIdentity {
    TemplateIdentity {
        id: BOOT.to_string(),
        storage: TEMPLATE_NAME.to_string(),
        backup_rule: None,
    }
}

/// A tracked server as a previous apply would have left it.
fn tracked_for(details: &ServerDetails) -> TrackedServer {
    TrackedServer {
        id: Some(details.uuid.clone()),
        template: Some(identity()),
        observed: Some(observe(details, Some(&identity()))),
    }
}

fn device(storage: &str, address: &str) -> StorageDevice {
    StorageDevice::new(storage, address, StorageDeviceType::Disk)
}

#[tokio::test]
async fn test_create_tracks_boot_disk_among_additional_devices() {
    let remote = Remote::new(server_details("unrelated", PowerState::Stopped));
    let lifecycle = lifecycle(remote.api());
    let desired = desired()
        .with_storage_device(device("data-1", "virtio:1"))
        .with_storage_device(device("data-2", "virtio:2"));

    let mut tracked = TrackedServer::default();
    let observed = lifecycle.create(&desired, &mut tracked).await.unwrap();

    assert_eq!(
        remote.calls(),
        ["list_templates", "create", "wait:started", "get"]
    );
    let request = remote.created.lock().unwrap().clone().unwrap();
    assert_eq!(request.storage_devices[0].storage, TEMPLATE_UUID);

    assert_eq!(tracked.id(), Some(SERVER));
    assert_eq!(tracked.template.as_ref().unwrap().id, BOOT);
    assert_eq!(tracked.template.as_ref().unwrap().storage, TEMPLATE_NAME);
    assert_eq!(tracked.observed.as_ref(), Some(&observed));

    let template = observed.template.unwrap();
    assert_eq!(template.id, BOOT);
    assert_eq!(template.address, "virtio:0");
    assert_eq!(
        observed.storage_devices,
        BTreeSet::from([device("data-1", "virtio:1"), device("data-2", "virtio:2")])
    );
}

#[tokio::test]
async fn test_create_timeout_keeps_server_tracked() {
    let mut api = MockServerApi::new();
    api.expect_list_templates().never();
    api.expect_create_server().times(1).returning(|_| {
        Ok(server_with_devices(
            SERVER,
            PowerState::Maintenance,
            vec![disk(BOOT, "virtio:0", 10)],
        ))
    });
    api.expect_wait_for_server_state().times(1).returning(|request| {
        Err(ProvisionError::Timeout {
            server_id: request.uuid.clone(),
            state: request.desired_state,
            timeout: request.timeout,
        })
    });
    api.expect_get_server_details().never();

    let desired = DesiredServer::new(Hostname::new("web1").unwrap(), "fi-hel1")
        .with_interface(NetworkInterfaceConfig::public())
        .with_template(TemplateConfig::new(TEMPLATE_UUID));
    let mut tracked = TrackedServer::default();

    let err = lifecycle(api)
        .create(&desired, &mut tracked)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(tracked.id(), Some(SERVER));
    assert_eq!(tracked.template.unwrap().id, BOOT);
    assert!(tracked.observed.is_none());
}

#[tokio::test]
async fn test_create_rejects_tracked_server() {
    let mut api = MockServerApi::new();
    api.expect_create_server().never();

    let mut tracked = TrackedServer {
        id: Some(SERVER.to_string()),
        ..TrackedServer::default()
    };
    let err = lifecycle(api)
        .create(&desired(), &mut tracked)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Validation { .. }));
}

#[tokio::test]
async fn test_create_rejects_invalid_input_before_remote_calls() {
    let api = MockServerApi::new();
    let desired = DesiredServer::new(Hostname::new("web1").unwrap(), "fi-hel1");

    let mut tracked = TrackedServer::default();
    let err = lifecycle(api)
        .create(&desired, &mut tracked)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Validation { .. }));
    assert!(!tracked.exists());
}

#[tokio::test]
async fn test_update_sends_plan_instead_of_cpu_and_mem() {
    let details = server_with_devices(SERVER, PowerState::Started, vec![disk(BOOT, "virtio:0", 10)]);
    let remote = Remote::new(details.clone());
    let mut tracked = tracked_for(&details);

    let desired = desired().with_plan("2xCPU-4GB").with_resources(4, 8192);
    lifecycle(remote.api())
        .update(&desired, &mut tracked)
        .await
        .unwrap();

    let modify = remote.modified.lock().unwrap().clone().unwrap();
    assert_eq!(modify.plan.as_deref(), Some("2xCPU-4GB"));
    assert_eq!(modify.core_number, None);
    assert_eq!(modify.memory_amount, None);
    assert_eq!(modify.firewall, Some(false));

    assert_eq!(
        remote.calls(),
        [
            "get",
            "get",
            "stop",
            "wait:stopped",
            "modify",
            "get",
            "start",
            "wait:started",
            "get",
        ]
    );
}

#[tokio::test]
async fn test_update_detaches_before_attaching() {
    let details = server_with_devices(
        SERVER,
        PowerState::Started,
        vec![
            disk(BOOT, "virtio:0", 10),
            disk("A", "virtio:1", 10),
            disk("B", "virtio:2", 10),
        ],
    );
    let remote = Remote::new(details.clone());
    let mut tracked = tracked_for(&details);

    let desired = desired()
        .with_storage_device(device("B", "virtio:2"))
        .with_storage_device(device("C", "virtio:3"));
    let observed = lifecycle(remote.api())
        .update(&desired, &mut tracked)
        .await
        .unwrap();

    let calls = remote.calls();
    let detach = calls.iter().position(|c| c == "detach:virtio:1").unwrap();
    let attach = calls.iter().position(|c| c == "attach:C@virtio:3").unwrap();
    let modify = calls.iter().position(|c| c == "modify").unwrap();
    let start = calls.iter().position(|c| c == "start").unwrap();
    assert!(modify < detach && detach < attach && attach < start);
    assert!(!calls.iter().any(|c| c.starts_with("detach:virtio:2")));

    assert_eq!(
        observed.storage_devices,
        BTreeSet::from([device("B", "virtio:2"), device("C", "virtio:3")])
    );
    assert_eq!(observed.template.unwrap().id, BOOT);
    assert_eq!(tracked.observed.unwrap().storage_devices.len(), 2);
}

#[tokio::test]
async fn test_update_resizes_and_moves_boot_disk() {
    let details = server_with_devices(SERVER, PowerState::Stopped, vec![disk(BOOT, "virtio:0", 10)]);
    let remote = Remote::new(details.clone());
    let mut tracked = tracked_for(&details);

    let rule = BackupRule::new(BackupInterval::Daily, "0300", 7).unwrap();
    let desired = DesiredServer::new(Hostname::new("web1").unwrap(), "fi-hel1")
        .with_interface(NetworkInterfaceConfig::public())
        .with_template(
            TemplateConfig::new(TEMPLATE_NAME)
                .with_address("scsi:0")
                .with_size(StorageSize::new(30).unwrap())
                .with_backup_rule(rule.clone()),
        );

    let observed = lifecycle(remote.api())
        .update(&desired, &mut tracked)
        .await
        .unwrap();

    let calls = remote.calls();
    let modify = calls
        .iter()
        .position(|c| c == &format!("modify_storage:{}", BOOT))
        .unwrap();
    let detach = calls.iter().position(|c| c == "detach:virtio:0").unwrap();
    let attach = calls
        .iter()
        .position(|c| c == &format!("attach:{}@scsi:0", BOOT))
        .unwrap();
    assert!(modify < detach && detach < attach);
    assert!(!calls.contains(&"stop".to_string()));

    let template = observed.template.unwrap();
    assert_eq!(template.address, "scsi:0");
    assert_eq!(template.backup_rule, Some(rule.clone()));
    assert_eq!(tracked.template.unwrap().backup_rule, Some(rule));
}

#[tokio::test]
async fn test_update_clears_removed_backup_rule() {
    let details = server_with_devices(SERVER, PowerState::Stopped, vec![disk(BOOT, "virtio:0", 10)]);
    let remote = Remote::new(details.clone());
    let mut tracked = tracked_for(&details);
    let rule = BackupRule::new(BackupInterval::Daily, "0300", 7).unwrap();
    if let Some(template) = tracked.template.as_mut() {
        template.backup_rule = Some(rule);
    }

    lifecycle(remote.api())
        .update(&desired(), &mut tracked)
        .await
        .unwrap();

    let request = remote.storage_modified.lock().unwrap().clone().unwrap();
    assert_eq!(request.uuid, BOOT);
    assert_eq!(request.backup_rule, Some(BackupRuleChange::Clear));
    assert_eq!(tracked.template.unwrap().backup_rule, None);
}

#[tokio::test]
async fn test_update_refuses_immutable_changes() {
    let details = server_with_devices(SERVER, PowerState::Started, vec![disk(BOOT, "virtio:0", 10)]);
    let mut tracked = tracked_for(&details);
    let before = tracked.clone();

    let mut desired = desired();
    desired.zone = "de-fra1".to_string();

    let err = lifecycle(MockServerApi::new())
        .update(&desired, &mut tracked)
        .await
        .unwrap_err();

    match err {
        ProvisionError::Validation {
            source: ValidationError::ConstraintViolation(message),
        } => assert!(message.contains("zone")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(tracked, before);
}

#[tokio::test]
async fn test_failed_update_leaves_server_stopped() {
    let details = server_with_devices(SERVER, PowerState::Stopped, vec![disk(BOOT, "virtio:0", 10)]);
    let mut tracked = tracked_for(&details);
    let before = tracked.clone();

    let mut api = MockServerApi::new();
    let live = details.clone();
    api.expect_get_server_details()
        .returning(move |_| Ok(live.clone()));
    api.expect_modify_server().times(1).returning(|_| {
        Err(ProvisionError::Api {
            status: 409,
            code: "SERVER_STATE_ILLEGAL".to_string(),
            message: "The server is not in a state that allows this action.".to_string(),
        })
    });
    api.expect_start_server().never();

    let err = lifecycle(api)
        .update(&desired().with_plan("2xCPU-4GB"), &mut tracked)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Api { status: 409, .. }));
    assert_eq!(tracked, before);
}

#[tokio::test]
async fn test_update_requires_created_server() {
    let err = lifecycle(MockServerApi::new())
        .update(&desired(), &mut TrackedServer::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_refresh_drops_deleted_server() {
    let mut api = MockServerApi::new();
    api.expect_get_server_details()
        .times(1)
        .returning(|uuid| Err(ProvisionError::NotFound(format!("server/{}", uuid))));

    let details = server_with_devices(SERVER, PowerState::Started, vec![disk(BOOT, "virtio:0", 10)]);
    let mut tracked = tracked_for(&details);

    let observed = lifecycle(api).refresh(&mut tracked).await.unwrap();
    assert!(observed.is_none());
    assert!(!tracked.exists());
    assert!(tracked.template.is_none());
}

#[tokio::test]
async fn test_refresh_keeps_tracking_on_other_errors() {
    let mut api = MockServerApi::new();
    api.expect_get_server_details()
        .returning(|_| Err(ProvisionError::Connection("connection reset".to_string())));

    let mut tracked = TrackedServer {
        id: Some(SERVER.to_string()),
        ..TrackedServer::default()
    };
    let err = lifecycle(api).refresh(&mut tracked).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Connection(_)));
    assert_eq!(tracked.id(), Some(SERVER));
}

#[tokio::test]
async fn test_delete_stops_then_deletes_server_and_boot_disk() {
    let details = server_with_devices(SERVER, PowerState::Started, vec![disk(BOOT, "virtio:0", 10)]);
    let remote = Remote::new(details.clone());
    let mut tracked = tracked_for(&details);

    lifecycle(remote.api()).delete(&mut tracked).await.unwrap();

    assert_eq!(
        remote.calls(),
        [
            "get".to_string(),
            "stop".to_string(),
            "wait:stopped".to_string(),
            "delete_server".to_string(),
            format!("delete_storage:{}", BOOT),
        ]
    );
    assert_eq!(tracked, TrackedServer::default());
}

#[tokio::test]
async fn test_delete_can_resume_after_storage_failure() {
    let details = server_with_devices(SERVER, PowerState::Stopped, vec![disk(BOOT, "virtio:0", 10)]);
    let mut tracked = tracked_for(&details);

    let mut api = MockServerApi::new();
    api.expect_get_server_details()
        .returning(move |_| Ok(details.clone()));
    api.expect_stop_server().never();
    api.expect_delete_server().times(1).returning(|_| Ok(()));
    api.expect_delete_storage().times(1).returning(|_| {
        Err(ProvisionError::Api {
            status: 409,
            code: "STORAGE_IN_USE".to_string(),
            message: "The storage is still attached.".to_string(),
        })
    });

    let err = lifecycle(api).delete(&mut tracked).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Api { .. }));
    assert!(!tracked.exists());
    assert_eq!(tracked.template.as_ref().unwrap().id, BOOT);

    let mut api = MockServerApi::new();
    api.expect_get_server_details().never();
    api.expect_delete_server().never();
    api.expect_delete_storage()
        .withf(|uuid| uuid == BOOT)
        .times(1)
        .returning(|_| Ok(()));

    lifecycle(api).delete(&mut tracked).await.unwrap();
    assert_eq!(tracked, TrackedServer::default());
}

#[tokio::test]
async fn test_delete_treats_missing_boot_disk_as_deleted() {
    let details = server_with_devices(SERVER, PowerState::Stopped, vec![disk(BOOT, "virtio:0", 10)]);
    let mut tracked = tracked_for(&details);

    let mut api = MockServerApi::new();
    api.expect_get_server_details()
        .returning(move |_| Ok(details.clone()));
    api.expect_delete_server().times(1).returning(|_| Ok(()));
    api.expect_delete_storage()
        .withf(|uuid| uuid == BOOT)
        .times(1)
        .returning(|uuid| Err(ProvisionError::NotFound(format!("storage/{}", uuid))));

    lifecycle(api).delete(&mut tracked).await.unwrap();
    assert_eq!(tracked, TrackedServer::default());
}
