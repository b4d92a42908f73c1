use std::fmt;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::client::VaultClient;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::policy;

pub const INIT_SECRET_SHARES: u8 = 5;
pub const INIT_SECRET_THRESHOLD: u8 = 3;

const AUTH_METHODS: [&str; 2] = ["approle", "userpass"];

/// Unseal material captured from a successful initialization. Held in memory
/// only; persisting it is the operator's job. Debug output redacts the key
/// shares and root token.
#[derive(Clone)]
pub struct UnsealBundle {
    pub keys: Vec<String>,
    pub threshold: usize,
    pub root_token: String,
}

impl fmt::Debug for UnsealBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsealBundle")
            .field("keys", &format_args!("<{} shares redacted>", self.keys.len()))
            .field("threshold", &self.threshold)
            .field("root_token", &"<redacted>")
            .finish()
    }
}

/// Drives a backend instance from uninitialized/sealed to provisioned.
///
/// One session owns one client handle and at most one root credential. The
/// client's auth state is mutated exactly once, after unsealing; everything
/// downstream of that point uses the authenticated client.
pub struct Orchestrator {
    client: VaultClient,
    settings: Settings,
    bundle: Option<UnsealBundle>,
    root_token: Option<String>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(client: VaultClient, settings: Settings) -> Self {
        Self {
            client,
            settings,
            bundle: None,
            root_token: None,
        }
    }

    /// Unseal material from a first-run initialization, if this session
    /// performed one.
    #[must_use]
    pub fn unseal_bundle(&self) -> Option<&UnsealBundle> {
        self.bundle.as_ref()
    }

    /// Runs the bootstrap sequence: initialize if needed, unseal if needed,
    /// enable auth methods, then provision areas, secrets and policies from
    /// the loaded config.
    ///
    /// Initialization and unsealing are fatal on failure. Auth-method
    /// enablement, mount creation and policy writes are logged and skipped
    /// per item; a failed secret write aborts, since a missing service secret
    /// is a real provisioning gap.
    ///
    /// # Errors
    /// Returns `AlreadyInitialized`, `UnsealFailed`, `TokenMissing` or a
    /// transport/API error from a fatal step.
    pub async fn bootstrap(&mut self, resume_token: Option<String>) -> Result<()> {
        if let Some(token) = resume_token {
            self.root_token = Some(token);
        }

        let status = self.client.status().await?;
        info!(
            initialized = status.initialized,
            sealed = status.sealed,
            "backend status"
        );

        if !status.initialized {
            self.initialize().await?;
        }

        // Seal state is re-read, never carried over from before init.
        let status = self.client.status().await?;
        let was_sealed = status.sealed;
        if was_sealed {
            self.unseal().await?;
        }

        // The one auth-state mutation of this session; everything below runs
        // on the authenticated client.
        let token = self.root_token.clone().ok_or(Error::TokenMissing)?;
        self.client.set_token(token);
        match self.client.is_authenticated().await {
            Ok(authenticated) => info!(authenticated, "client switched to root credential"),
            Err(err) => warn!(%err, "token self-lookup failed"),
        }

        if was_sealed {
            for method in AUTH_METHODS {
                match self.client.enable_auth_method(method).await {
                    Ok(()) => info!(method, "auth method enabled"),
                    Err(err) => warn!(method, %err, "failed to enable auth method"),
                }
            }
        }

        self.provision().await
    }

    /// Adopts an externally supplied root credential for ad-hoc calls
    /// outside a bootstrap run.
    pub fn authenticate(&mut self, token: String) {
        self.root_token = Some(token.clone());
        self.client.set_token(token);
    }

    /// Reads the latest version of a secret; absent paths and soft-deleted
    /// versions return `None`.
    ///
    /// # Errors
    /// Returns a transport or API error.
    pub async fn read_secret(&self, area: &str, path: &str) -> Result<Option<Map<String, Value>>> {
        self.client.read_secret(area, path).await
    }

    /// Lists immediate child keys under a prefix. Best-effort: any backend
    /// error is logged and yields an empty list.
    pub async fn list_secrets(&self, area: &str, prefix: &str) -> Vec<String> {
        match self.client.list_secrets(area, prefix).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(area, prefix, %err, "failed to list secrets");
                Vec::new()
            }
        }
    }

    /// Creates a userpass login bound to the fixed read-only policy.
    ///
    /// # Errors
    /// Returns a transport or API error.
    pub async fn create_userpass(&self, username: &str, password: &str) -> Result<()> {
        let policies = vec![policy::read_only_policy().name];
        self.client
            .create_userpass(username, password, &policies)
            .await
    }

    async fn initialize(&mut self) -> Result<()> {
        info!(
            shares = INIT_SECRET_SHARES,
            threshold = INIT_SECRET_THRESHOLD,
            "initializing backend"
        );
        let response = self
            .client
            .initialize(INIT_SECRET_SHARES, INIT_SECRET_THRESHOLD)
            .await?;
        self.root_token = Some(response.root_token.clone());
        self.bundle = Some(UnsealBundle {
            keys: response.keys,
            threshold: usize::from(INIT_SECRET_THRESHOLD),
            root_token: response.root_token,
        });
        info!("backend initialized; unseal material held in memory only");
        Ok(())
    }

    async fn unseal(&self) -> Result<()> {
        let Some(bundle) = self.bundle.as_ref() else {
            // Resumed session against a sealed backend: no shares to submit.
            return Err(Error::UnsealFailed { submitted: 0 });
        };
        let count = bundle.threshold.min(bundle.keys.len());
        let shares = &bundle.keys[..count];
        let mut sealed = true;
        for key in shares {
            sealed = self.client.submit_unseal_share(key).await?.sealed;
        }
        if sealed {
            return Err(Error::UnsealFailed { submitted: count });
        }
        info!(submitted = count, "backend unsealed");
        Ok(())
    }

    async fn provision(&self) -> Result<()> {
        for (area, services) in &self.settings.infrastructure {
            if !self.ensure_area(area).await {
                continue;
            }
            for (service, data) in services {
                let path = format!("{service}/config");
                self.client.write_secret(area, &path, data).await?;
                info!(%area, %service, "service config written");
            }
            let policy = policy::read_only_policy();
            match self
                .client
                .create_or_update_policy(&policy.name, &policy.render_hcl())
                .await
            {
                Ok(()) => info!(%area, policy = %policy.name, "access policy written"),
                Err(err) => error!(%area, policy = %policy.name, %err, "failed to write policy"),
            }
        }
        Ok(())
    }

    /// Returns true once the KV v2 mount for `area` is known to exist, so
    /// secret writes into it are safe to issue.
    async fn ensure_area(&self, area: &str) -> bool {
        match self.client.enable_kv_mount(area, 2).await {
            Ok(()) => {
                info!(area, "kv v2 mount enabled");
                true
            }
            Err(Error::MountExists(_)) => {
                info!(area, "kv mount already present");
                true
            }
            Err(err) => {
                error!(area, %err, "failed to enable kv mount, skipping its services");
                false
            }
        }
    }
}
