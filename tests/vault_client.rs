use serde_json::{Map, json};
use vaultboot::Error;
use vaultboot::client::VaultClient;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_data() -> Map<String, serde_json::Value> {
    let mut data = Map::new();
    data.insert("host".to_string(), json!("db1"));
    data.insert("port".to_string(), json!(5432));
    data
}

#[tokio::test]
async fn status_reports_initialized_and_sealed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sys/seal-status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "initialized": true, "sealed": false })),
        )
        .mount(&server)
        .await;

    let client = VaultClient::new(&server.uri()).expect("client init should succeed");
    let status = client.status().await.expect("status should succeed");
    assert!(status.initialized);
    assert!(!status.sealed);
}

#[tokio::test]
async fn initialize_on_initialized_backend_fails_loudly() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/init"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "errors": ["Vault is already initialized"] })),
        )
        .mount(&server)
        .await;

    let client = VaultClient::new(&server.uri()).expect("client init should succeed");
    let err = client.initialize(5, 3).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyInitialized));
}

#[tokio::test]
async fn initialize_captures_keys_and_root_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/init"))
        .and(body_json(json!({ "secret_shares": 5, "secret_threshold": 3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": ["k1", "k2", "k3", "k4", "k5"],
            "root_token": "hvs.root"
        })))
        .mount(&server)
        .await;

    let client = VaultClient::new(&server.uri()).expect("client init should succeed");
    let response = client.initialize(5, 3).await.expect("initialize");
    assert_eq!(response.keys.len(), 5);
    assert_eq!(response.root_token, "hvs.root");
}

#[tokio::test]
async fn enable_kv_mount_maps_existing_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/mounts/dev"))
        .and(header("X-Vault-Token", "root-token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "errors": ["path is already in use at dev/"] })),
        )
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());
    let err = client.enable_kv_mount("dev", 2).await.unwrap_err();
    assert!(matches!(err, Error::MountExists(name) if name == "dev"));
}

#[tokio::test]
async fn write_secret_uses_kv_v2_data_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/dev/data/postgres/config"))
        .and(header("X-Vault-Token", "root-token"))
        .and(body_json(json!({ "data": { "host": "db1", "port": 5432 } })))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());
    client
        .write_secret("dev", "postgres/config", &sample_data())
        .await
        .expect("write_secret should succeed");
}

#[tokio::test]
async fn write_secret_without_token_fails_before_sending() {
    let server = MockServer::start().await;

    let client = VaultClient::new(&server.uri()).expect("client init should succeed");
    let err = client
        .write_secret("dev", "postgres/config", &sample_data())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenMissing));
}

#[tokio::test]
async fn read_secret_returns_latest_version_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/dev/data/postgres/config"))
        .and(header("X-Vault-Token", "root-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "data": { "host": "db1", "port": 5432 },
                "metadata": { "version": 2, "deletion_time": "" }
            }
        })))
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());
    let data = client
        .read_secret("dev", "postgres/config")
        .await
        .expect("read_secret should succeed")
        .expect("secret should be present");
    assert_eq!(data, sample_data());
}

#[tokio::test]
async fn read_secret_absent_path_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/dev/data/never-written"))
        .and(header("X-Vault-Token", "root-token"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());
    let data = client
        .read_secret("dev", "never-written")
        .await
        .expect("read_secret should succeed");
    assert!(data.is_none());
}

#[tokio::test]
async fn read_secret_soft_deleted_version_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/dev/data/postgres/config"))
        .and(header("X-Vault-Token", "root-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "data": null,
                "metadata": { "version": 3, "deletion_time": "2024-05-01T00:00:00Z" }
            }
        })))
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());
    let data = client
        .read_secret("dev", "postgres/config")
        .await
        .expect("read_secret should succeed");
    assert!(data.is_none());
}

#[tokio::test]
async fn list_secrets_returns_child_keys() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/dev/metadata/"))
        .and(query_param("list", "true"))
        .and(header("X-Vault-Token", "root-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "keys": ["postgres/", "redis/"] } })),
        )
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());
    let keys = client
        .list_secrets("dev", "")
        .await
        .expect("list_secrets should succeed");
    assert_eq!(keys, vec!["postgres/".to_string(), "redis/".to_string()]);
}

#[tokio::test]
async fn list_secrets_unknown_prefix_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/dev/metadata/missing"))
        .and(query_param("list", "true"))
        .and(header("X-Vault-Token", "root-token"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());
    let keys = client
        .list_secrets("dev", "missing")
        .await
        .expect("list_secrets should succeed");
    assert!(keys.is_empty());
}

#[tokio::test]
async fn policy_write_sends_full_replacement_rules() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/policies/acl/dev_postgres"))
        .and(header("X-Vault-Token", "root-token"))
        .and(body_json(json!({ "policy": "path \"dev/*\" {\n  capabilities = [\"read\"]\n}\n" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/policies/acl/dev_postgres"))
        .and(header("X-Vault-Token", "root-token"))
        .and(body_json(json!({ "policy": "path \"dev/*\" {\n  capabilities = [\"read\", \"list\"]\n}\n" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());

    // Each write carries the complete rule set; the backend keeps only the
    // most recent body, so the second call replaces the first outright.
    client
        .create_or_update_policy("dev_postgres", "path \"dev/*\" {\n  capabilities = [\"read\"]\n}\n")
        .await
        .expect("first policy write");
    client
        .create_or_update_policy(
            "dev_postgres",
            "path \"dev/*\" {\n  capabilities = [\"read\", \"list\"]\n}\n",
        )
        .await
        .expect("second policy write");
}

#[tokio::test]
async fn create_userpass_binds_policies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/userpass/users/operator"))
        .and(header("X-Vault-Token", "root-token"))
        .and(body_json(
            json!({ "password": "hunter2", "token_policies": ["dev_postgres"] }),
        ))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).expect("client init should succeed");
    client.set_token("root-token".to_string());
    client
        .create_userpass("operator", "hunter2", &["dev_postgres".to_string()])
        .await
        .expect("create_userpass should succeed");
}
