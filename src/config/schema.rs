//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! Tuning sections deserialize from an optional TOML file; deployment values come
//! from the environment (see `loader.rs`).

use serde::{Deserialize, Serialize};

/// Root configuration for the control gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlConfig {
    /// Deployment values sourced from the environment.
    pub deployment: DeploymentConfig,

    /// Secrets backend connection and credential bootstrap.
    pub vault: VaultConfig,

    /// Managed certificate and self-signed fallback settings.
    pub tls: TlsConfig,

    /// Multiplexing listener settings.
    pub listener: ListenerConfig,

    /// Health endpoint settings.
    pub health: HealthConfig,

    /// Background worker settings.
    pub jobs: JobsConfig,
}

/// Values every deployment must provide.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Database connection string (consumed by the control-plane logic).
    pub database_url: String,

    /// Object-storage bucket name.
    pub s3_bucket: String,

    /// Whether a cloud session is available for DNS automation.
    pub use_cloud: bool,

    /// Serving domain, possibly a wildcard (`*.hub.example.com`).
    pub domain: String,

    /// Use the managed certificate system instead of the self-signed fallback.
    pub use_tls_manager: bool,

    /// Issue from the staging certificate authority.
    pub staging: bool,

    /// DNS zone to publish the serving domain in.
    pub zone_id: Option<String>,

    /// Token agents present when registering.
    pub register_token: String,

    /// Token operators present on the ops surface.
    pub ops_token: String,

    /// Optional geolocation (ASN) database path.
    pub asn_db_path: Option<String>,

    pub hub_access_key: Option<String>,
    pub hub_secret_key: Option<String>,

    /// Image tag reported to hubs.
    pub image_tag: Option<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            s3_bucket: String::new(),
            use_cloud: false,
            domain: String::new(),
            use_tls_manager: true,
            staging: false,
            zone_id: None,
            register_token: String::new(),
            ops_token: String::new(),
            asn_db_path: None,
            hub_access_key: None,
            hub_secret_key: None,
            image_tag: None,
        }
    }
}

impl std::fmt::Debug for DeploymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentConfig")
            .field("database_url", &redact(&self.database_url))
            .field("s3_bucket", &self.s3_bucket)
            .field("use_cloud", &self.use_cloud)
            .field("domain", &self.domain)
            .field("use_tls_manager", &self.use_tls_manager)
            .field("staging", &self.staging)
            .field("zone_id", &self.zone_id)
            .field("register_token", &redact(&self.register_token))
            .field("ops_token", &redact(&self.ops_token))
            .field("asn_db_path", &self.asn_db_path)
            .field("hub_access_key", &self.hub_access_key.as_deref().map(redact))
            .field("hub_secret_key", &self.hub_secret_key.as_deref().map(redact))
            .field("image_tag", &self.image_tag)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Secrets backend configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Backend address (e.g., "https://vault.internal:8200").
    pub address: String,

    /// Pre-provisioned token; skips the workload identity exchange when set.
    pub token: Option<String>,

    /// Upper bound on every backend call, in seconds.
    pub request_timeout_secs: u64,

    /// Mounted workload identity token.
    pub identity_token_path: String,

    /// Auth method mount used for the identity exchange.
    pub auth_mount: String,

    /// Role named in the identity exchange.
    pub role: String,

    /// Interval between self-renewals, in seconds.
    pub renew_interval_secs: u64,

    /// Lease extension requested on each renewal, in seconds.
    pub lease_increment_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "https://127.0.0.1:8200".to_string(),
            token: None,
            request_timeout_secs: 60,
            identity_token_path: "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string(),
            auth_mount: "kubernetes".to_string(),
            role: "horizon".to_string(),
            renew_interval_secs: 3600,
            lease_increment_secs: 86_400,
        }
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_deref().map(redact))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("identity_token_path", &self.identity_token_path)
            .field("auth_mount", &self.auth_mount)
            .field("role", &self.role)
            .field("renew_interval_secs", &self.renew_interval_secs)
            .field("lease_increment_secs", &self.lease_increment_secs)
            .finish()
    }
}

/// Upper bound on `self_signed_validity_days` (one century).
pub const MAX_SELF_SIGNED_VALIDITY_DAYS: u64 = 36_500;

/// Certificate lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Interval between refreshes from the managed system, in seconds.
    pub refresh_interval_secs: u64,

    /// Interval between renewal checks, in seconds.
    pub renew_check_interval_secs: u64,

    /// Renew when the current certificate expires within this many days.
    pub renew_before_days: u32,

    /// KV v2 mount holding issued material.
    pub kv_mount: String,

    /// Path prefix under the KV mount.
    pub kv_prefix: String,

    /// PKI mount for production issuance.
    pub pki_mount: String,

    /// PKI mount for staging issuance.
    pub staging_pki_mount: String,

    /// PKI role used for issuance.
    pub pki_role: String,

    /// Requested certificate TTL (backend duration syntax).
    pub issue_ttl: String,

    /// Common name of the self-signed fallback.
    pub self_signed_common_name: String,

    /// Validity of the self-signed fallback, in days. At most
    /// [`MAX_SELF_SIGNED_VALIDITY_DAYS`].
    pub self_signed_validity_days: u64,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 3600,
            renew_check_interval_secs: 12 * 3600,
            renew_before_days: 30,
            kv_mount: "secret".to_string(),
            kv_prefix: "hub-tls".to_string(),
            pki_mount: "pki".to_string(),
            staging_pki_mount: "pki-staging".to_string(),
            pki_role: "hub".to_string(),
            issue_ttl: "2160h".to_string(),
            self_signed_common_name: "127.0.0.1:24402".to_string(),
            self_signed_validity_days: 5 * 365,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Port to bind.
    pub port: u16,

    /// Close connections idle for this long, in seconds.
    pub idle_timeout_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl ListenerConfig {
    /// Combined `host:port` bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 24402,
            idle_timeout_secs: 120,
            shutdown_grace_secs: 10,
        }
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Start the health listener.
    pub enabled: bool,

    /// Health listener bind address.
    pub bind_address: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:24401".to_string(),
        }
    }
}

/// Background worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Queues the worker consumes.
    pub queues: Vec<String>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            queues: vec!["default".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = ControlConfig::default();
        assert_eq!(config.listener.port, 24402);
        assert_eq!(config.listener.idle_timeout_secs, 120);
        assert_eq!(config.vault.renew_interval_secs, 3600);
        assert_eq!(config.vault.lease_increment_secs, 86_400);
        assert_eq!(config.tls.refresh_interval_secs, 3600);
        assert_eq!(config.tls.self_signed_common_name, "127.0.0.1:24402");
        assert!(config.deployment.use_tls_manager);
        assert!(!config.deployment.use_cloud);
        assert_eq!(config.jobs.queues, vec!["default".to_string()]);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = ControlConfig::default();
        config.deployment.ops_token = "ops-secret".into();
        config.deployment.database_url = "postgres://user:pw@db/control".into();
        config.vault.token = Some("s.secret".into());

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("ops-secret"));
        assert!(!rendered.contains("pw@db"));
        assert!(!rendered.contains("s.secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ControlConfig = toml::from_str(
            r#"
            [listener]
            idle_timeout_secs = 30

            [tls]
            kv_prefix = "edge-tls"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.idle_timeout_secs, 30);
        assert_eq!(config.listener.port, 24402);
        assert_eq!(config.tls.kv_prefix, "edge-tls");
        assert_eq!(config.tls.pki_mount, "pki");
    }
}
