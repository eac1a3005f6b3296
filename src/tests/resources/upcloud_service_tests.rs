use crate::core::domain::{
    config::{ApiCredentials, ProvisionerConfig},
    error::ProvisionError,
    model::{
        server::{
            AttachStorageRequest, ModifyServerRequest, PowerState, StopServerRequest, StopType,
            WaitForServerStateRequest,
        },
        storage::{BackupRuleChange, ModifyStorageRequest},
    },
    value_object::{ApiPassword, ApiUrl, ApiUsername, StorageDeviceType},
};
use crate::core::infrastructure::{
    api_client::ApiClient, server_api::ServerApi, upcloud_service::UpCloudService,
};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_partial_json, method, path},
};

const SERVER: &str = "00798b85-efdc-41ca-8021-f6ef457b8531";

fn create_test_service(server_url: &str, config: ProvisionerConfig) -> UpCloudService {
    let credentials = ApiCredentials::new(
        ApiUsername::new_unchecked("testuser".to_string()),
        ApiPassword::new_unchecked("testpass".to_string()),
    );
    let client = ApiClient::new(ApiUrl::new(server_url).unwrap(), credentials, &config).unwrap();
    UpCloudService::new(client, config)
}

fn fast_config() -> ProvisionerConfig {
    ProvisionerConfig::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_retry(2, Duration::from_millis(10))
}

fn server_body(state: &str) -> Value {
    json!({
        "server": {
            "uuid": SERVER,
            "hostname": "web1",
            "title": "web1 (managed by upcloud_provisioner)",
            "zone": "fi-hel1",
            "core_number": "1",
            "memory_amount": "1024",
            "plan": "1xCPU-1GB",
            "firewall": "off",
            "metadata": "no",
            "state": state,
            "networking": {"interfaces": {"interface": []}},
            "storage_devices": {
                "storage_device": [{
                    "address": "virtio:0",
                    "storage": "01f3286c-a5ea-4670-8121-d0b9767d625b",
                    "storage_size": 10,
                    "storage_title": "web1 boot disk",
                    "type": "disk"
                }]
            }
        }
    })
}

#[tokio::test]
async fn test_get_server_details_success() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("GET"))
        .and(path(format!("/server/{}", SERVER)))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("started")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let details = service.get_server_details(SERVER).await.unwrap();
    assert_eq!(details.state, PowerState::Started);
    assert_eq!(details.plan.as_deref(), Some("1xCPU-1GB"));
    assert_eq!(details.storage_devices()[0].size, 10);
}

#[tokio::test]
async fn test_get_missing_server_is_not_found() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("GET"))
        .and(path("/server/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "error_code": "SERVER_NOT_FOUND",
                "error_message": "The server gone does not exist."
            }
        })))
        .mount(&mock_server)
        .await;

    let err = service.get_server_details("gone").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_stop_server_sends_stop_type_and_timeout() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("POST"))
        .and(path(format!("/server/{}/stop", SERVER)))
        .and(body_json(json!({
            "stop_server": {"stop_type": "soft", "timeout": "60"}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(server_body("maintenance")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let details = service
        .stop_server(&StopServerRequest {
            uuid: SERVER.to_string(),
            stop_type: StopType::Soft,
            timeout: Duration::from_secs(60),
        })
        .await
        .unwrap();
    assert_eq!(details.state, PowerState::Maintenance);
}

#[tokio::test]
async fn test_start_server_posts_without_body() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("POST"))
        .and(path(format!("/server/{}/start", SERVER)))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("started")))
        .expect(1)
        .mount(&mock_server)
        .await;

    service.start_server(SERVER).await.unwrap();
}

#[tokio::test]
async fn test_modify_server_sends_only_set_fields() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("PUT"))
        .and(path(format!("/server/{}", SERVER)))
        .and(body_json(json!({
            "server": {"hostname": "web2", "firewall": "on", "plan": "2xCPU-4GB"}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(server_body("stopped")))
        .expect(1)
        .mount(&mock_server)
        .await;

    service
        .modify_server(&ModifyServerRequest {
            uuid: SERVER.to_string(),
            hostname: Some("web2".to_string()),
            firewall: Some(true),
            plan: Some("2xCPU-4GB".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_attach_storage_body() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("POST"))
        .and(path(format!("/server/{}/storage/attach", SERVER)))
        .and(body_json(json!({
            "storage_device": {"type": "disk", "address": "virtio:1", "storage": "data-1"}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(server_body("stopped")))
        .expect(1)
        .mount(&mock_server)
        .await;

    service
        .attach_storage(&AttachStorageRequest {
            server_uuid: SERVER.to_string(),
            address: "virtio:1".to_string(),
            storage_uuid: "data-1".to_string(),
            device_type: Some(StorageDeviceType::Disk),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_modify_storage_returns_storage() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("PUT"))
        .and(path("/storage/boot"))
        .and(body_partial_json(json!({"storage": {"size": "30"}})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "storage": {
                "uuid": "boot",
                "title": "web1 boot disk",
                "size": 30,
                "type": "normal",
                "state": "maintenance",
                "tier": "maxiops",
                "zone": "fi-hel1"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = service
        .modify_storage(&ModifyStorageRequest {
            uuid: "boot".to_string(),
            size: Some(30),
            title: Some("web1 boot disk".to_string()),
            backup_rule: None,
        })
        .await
        .unwrap();
    assert_eq!(storage.size, 30);
    assert_eq!(storage.storage_type, "normal");
}

#[tokio::test]
async fn test_modify_storage_sends_empty_backup_rule_to_clear() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("PUT"))
        .and(path("/storage/boot"))
        .and(body_json(json!({"storage": {"backup_rule": ""}})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "storage": {
                "uuid": "boot",
                "title": "web1 boot disk",
                "size": 10,
                "type": "normal",
                "state": "online"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    service
        .modify_storage(&ModifyStorageRequest {
            uuid: "boot".to_string(),
            size: None,
            title: None,
            backup_rule: Some(BackupRuleChange::Clear),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_templates() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("GET"))
        .and(path("/storage/template"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "storages": {
                "storage": [
                    {
                        "uuid": "01000000-0000-4000-8000-000020070100",
                        "title": "Debian GNU/Linux 12 (Bookworm)",
                        "size": "4",
                        "type": "template",
                        "state": "online"
                    },
                    {
                        "uuid": "01000000-0000-4000-8000-000030240200",
                        "title": "Ubuntu Server 24.04 LTS (Noble Numbat)",
                        "size": 4,
                        "type": "template",
                        "state": "online"
                    }
                ]
            }
        })))
        .mount(&mock_server)
        .await;

    let templates = service.list_templates().await.unwrap();
    assert_eq!(templates.len(), 2);
    assert_eq!(templates[0].size, 4);
    assert_eq!(templates[1].title, "Ubuntu Server 24.04 LTS (Noble Numbat)");
}

#[tokio::test]
async fn test_wait_polls_until_state_reached() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("GET"))
        .and(path(format!("/server/{}", SERVER)))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("maintenance")))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/server/{}", SERVER)))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("stopped")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let details = service
        .wait_for_server_state(&WaitForServerStateRequest {
            uuid: SERVER.to_string(),
            desired_state: PowerState::Stopped,
            timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();
    assert_eq!(details.state, PowerState::Stopped);
}

#[tokio::test]
async fn test_wait_times_out() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("GET"))
        .and(path(format!("/server/{}", SERVER)))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("maintenance")))
        .mount(&mock_server)
        .await;

    let err = service
        .wait_for_server_state(&WaitForServerStateRequest {
            uuid: SERVER.to_string(),
            desired_state: PowerState::Started,
            timeout: Duration::from_millis(50),
        })
        .await
        .unwrap_err();

    match err {
        ProvisionError::Timeout {
            server_id, state, ..
        } => {
            assert_eq!(server_id, SERVER);
            assert_eq!(state, PowerState::Started);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_storage_retries_until_detached() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("DELETE"))
        .and(path("/storage/boot"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "error_code": "STORAGE_ATTACHED",
                "error_message": "The storage is currently attached to a server."
            }
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/boot"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    service.delete_storage("boot").await.unwrap();
}

#[tokio::test]
async fn test_delete_storage_gives_up_after_retries() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(
        &mock_server.uri(),
        fast_config().with_retry(1, Duration::from_millis(10)),
    );

    Mock::given(method("DELETE"))
        .and(path("/storage/boot"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "error_code": "STORAGE_ATTACHED",
                "error_message": "The storage is currently attached to a server."
            }
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let err = service.delete_storage("boot").await.unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Api { status: 409, ref code, .. } if code == "STORAGE_ATTACHED"
    ));
}

#[tokio::test]
async fn test_delete_storage_does_not_retry_missing_storage() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("DELETE"))
        .and(path("/storage/boot"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "error_code": "STORAGE_NOT_FOUND",
                "error_message": "The storage boot does not exist."
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = service.delete_storage("boot").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_server() {
    let mock_server = MockServer::start().await;
    let service = create_test_service(&mock_server.uri(), fast_config());

    Mock::given(method("DELETE"))
        .and(path(format!("/server/{}", SERVER)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    service.delete_server(SERVER).await.unwrap();
}
