use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Thin typed wrapper over the backend's v1 HTTP API.
///
/// Starts unauthenticated; `set_token` switches it to authenticated mode.
/// Every method is a single blocking round trip from the caller's view.
#[derive(Debug, Clone)]
pub struct VaultClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BackendStatus {
    pub initialized: bool,
    pub sealed: bool,
}

#[derive(Debug, Deserialize)]
pub struct InitResponse {
    #[serde(default)]
    pub keys: Vec<String>,
    pub root_token: String,
}

#[derive(Deserialize)]
struct SecretEnvelope {
    data: SecretData,
}

#[derive(Deserialize)]
struct SecretData {
    // null for soft-deleted versions
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct ListEnvelope {
    data: ListData,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

impl VaultClient {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        })
    }

    /// Installs the root credential. All later calls send it as the token
    /// header; the pre-authentication state is gone after this.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Queries initialization and seal state. Never cached; callers re-query
    /// before every decision that depends on it.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success response.
    pub async fn status(&self) -> Result<BackendStatus> {
        let (status, text) = self.get("sys/seal-status", false).await?;
        parse_body(status, &text)
    }

    /// One-time initialization with a `shares`/`threshold` secret-sharing
    /// scheme. Must not be retried on an initialized backend.
    ///
    /// # Errors
    /// Returns `AlreadyInitialized` if the backend rejects a second
    /// initialization, or an API error otherwise.
    pub async fn initialize(&self, shares: u8, threshold: u8) -> Result<InitResponse> {
        #[derive(Serialize)]
        struct InitRequest {
            secret_shares: u8,
            secret_threshold: u8,
        }
        let (status, text) = self
            .post(
                "sys/init",
                &InitRequest {
                    secret_shares: shares,
                    secret_threshold: threshold,
                },
                false,
            )
            .await?;
        if !status.is_success() && text.contains("already initialized") {
            return Err(Error::AlreadyInitialized);
        }
        parse_body(status, &text)
    }

    /// Submits a single unseal share and reports the resulting seal state.
    ///
    /// # Errors
    /// Returns an error on transport failure or backend rejection.
    pub async fn submit_unseal_share(&self, key: &str) -> Result<BackendStatus> {
        #[derive(Serialize)]
        struct UnsealRequest<'a> {
            key: &'a str,
        }
        let (status, text) = self.post("sys/unseal", &UnsealRequest { key }, false).await?;
        parse_body(status, &text)
    }

    /// Enables an auth method of the given kind at its default path.
    ///
    /// # Errors
    /// Returns an API error on rejection, including "already in use".
    pub async fn enable_auth_method(&self, kind: &str) -> Result<()> {
        #[derive(Serialize)]
        struct AuthRequest<'a> {
            #[serde(rename = "type")]
            auth_type: &'a str,
        }
        let (status, text) = self
            .post(
                &format!("sys/auth/{kind}"),
                &AuthRequest { auth_type: kind },
                true,
            )
            .await?;
        expect_success(status, text)
    }

    /// Enables a versioned KV mount at `path`.
    ///
    /// # Errors
    /// Returns `MountExists` when the mount path is already in use, which
    /// callers may treat as success, or an API error otherwise.
    pub async fn enable_kv_mount(&self, path: &str, version: u8) -> Result<()> {
        #[derive(Serialize)]
        struct MountRequest<'a> {
            #[serde(rename = "type")]
            mount_type: &'a str,
            options: MountOptions,
        }
        #[derive(Serialize)]
        struct MountOptions {
            version: String,
        }
        let (status, text) = self
            .post(
                &format!("sys/mounts/{path}"),
                &MountRequest {
                    mount_type: "kv",
                    options: MountOptions {
                        version: version.to_string(),
                    },
                },
                true,
            )
            .await?;
        if status == StatusCode::BAD_REQUEST && text.contains("already in use") {
            return Err(Error::MountExists(path.to_string()));
        }
        expect_success(status, text)
    }

    /// Writes a secret at `{mount}/data/{path}` (KV v2). Always creates a new
    /// version; `data` fully replaces the prior value.
    ///
    /// # Errors
    /// Returns an error on transport failure or backend rejection.
    pub async fn write_secret(
        &self,
        mount: &str,
        path: &str,
        data: &Map<String, Value>,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct KvRequest<'a> {
            data: &'a Map<String, Value>,
        }
        let (status, text) = self
            .post(&format!("{mount}/data/{path}"), &KvRequest { data }, true)
            .await?;
        expect_success(status, text)
    }

    /// Reads the latest non-deleted version of a secret. Missing paths and
    /// soft-deleted versions both come back as `None`.
    ///
    /// # Errors
    /// Returns an error on transport failure or an unexpected API response.
    pub async fn read_secret(&self, mount: &str, path: &str) -> Result<Option<Map<String, Value>>> {
        let (status, text) = self.get(&format!("{mount}/data/{path}"), true).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: SecretEnvelope = parse_body(status, &text)?;
        Ok(envelope.data.data)
    }

    /// Lists immediate child keys under `prefix` in a mount.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success response other
    /// than not-found, which yields an empty list.
    pub async fn list_secrets(&self, mount: &str, prefix: &str) -> Result<Vec<String>> {
        let (status, text) = self
            .get(&format!("{mount}/metadata/{prefix}?list=true"), true)
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let envelope: ListEnvelope = parse_body(status, &text)?;
        Ok(envelope.data.keys)
    }

    /// Creates or replaces a named ACL policy. Pure overwrite, no merge.
    ///
    /// # Errors
    /// Returns an error on transport failure or backend rejection.
    pub async fn create_or_update_policy(&self, name: &str, policy: &str) -> Result<()> {
        #[derive(Serialize)]
        struct PolicyRequest<'a> {
            policy: &'a str,
        }
        let (status, text) = self
            .post(
                &format!("sys/policies/acl/{name}"),
                &PolicyRequest { policy },
                true,
            )
            .await?;
        expect_success(status, text)
    }

    /// Creates or updates a userpass login bound to the given policies.
    ///
    /// # Errors
    /// Returns an error on transport failure or backend rejection.
    pub async fn create_userpass(
        &self,
        username: &str,
        password: &str,
        policies: &[String],
    ) -> Result<()> {
        #[derive(Serialize)]
        struct UserRequest<'a> {
            password: &'a str,
            token_policies: &'a [String],
        }
        let (status, text) = self
            .post(
                &format!("auth/userpass/users/{username}"),
                &UserRequest {
                    password,
                    token_policies: policies,
                },
                true,
            )
            .await?;
        expect_success(status, text)
    }

    /// Checks whether the installed token is accepted by the backend.
    ///
    /// # Errors
    /// Returns an error on transport failure or an unexpected API response.
    pub async fn is_authenticated(&self) -> Result<bool> {
        let (status, text) = self.get("auth/token/lookup-self", true).await?;
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Ok(false);
        }
        expect_success(status, text)?;
        Ok(true)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    async fn get(&self, path: &str, use_token: bool) -> Result<(StatusCode, String)> {
        let mut request = self.client.get(self.endpoint(path));
        if use_token {
            request = request.header(VAULT_TOKEN_HEADER, self.require_token()?);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    async fn post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        use_token: bool,
    ) -> Result<(StatusCode, String)> {
        let mut request = self.client.post(self.endpoint(path)).json(body);
        if use_token {
            request = request.header(VAULT_TOKEN_HEADER, self.require_token()?);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(Error::TokenMissing)
    }
}

fn expect_success(status: StatusCode, text: String) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Api {
            status,
            message: text,
        })
    }
}

fn parse_body<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T> {
    if !status.is_success() {
        return Err(Error::Api {
            status,
            message: text.to_string(),
        });
    }
    Ok(serde_json::from_str(text)?)
}
