//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ControlConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse tuning sections from a TOML file without validating.
pub fn load_file(path: &Path) -> Result<ControlConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay deployment values from the environment.
///
/// `lookup` stands in for `std::env::var`; empty values count as unset. Returns the
/// values that were present but could not be parsed.
pub fn apply_env<F>(config: &mut ControlConfig, lookup: F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let mut errors = Vec::new();
    let deployment = &mut config.deployment;

    if let Some(v) = get("DATABASE_URL") {
        deployment.database_url = v;
    }
    if let Some(v) = get("S3_BUCKET") {
        deployment.s3_bucket = v;
    }
    if let Some(v) = get("HUB_DOMAIN") {
        deployment.domain = v;
    }
    if let Some(v) = get("REGISTER_TOKEN") {
        deployment.register_token = v;
    }
    if let Some(v) = get("OPS_TOKEN") {
        deployment.ops_token = v;
    }
    if let Some(v) = get("ZONE_ID") {
        deployment.zone_id = Some(v);
    }
    if let Some(v) = get("ASN_DB_PATH") {
        deployment.asn_db_path = Some(v);
    }
    if let Some(v) = get("HUB_ACCESS_KEY") {
        deployment.hub_access_key = Some(v);
    }
    if let Some(v) = get("HUB_SECRET_KEY") {
        deployment.hub_secret_key = Some(v);
    }
    if let Some(v) = get("HUB_IMAGE_TAG") {
        deployment.image_tag = Some(v);
    }

    // Toggles: the TLS manager is on unless explicitly "0"; staging is on when set at all;
    // the cloud session is opt-in.
    if let Some(v) = get("USE_TLS_MANAGER") {
        deployment.use_tls_manager = v != "0";
    }
    if let Some(v) = get("LETSENCRYPT_STAGING") {
        deployment.staging = !v.is_empty();
    }
    if let Some(v) = get("USE_AWS") {
        deployment.use_cloud = matches!(v.to_ascii_lowercase().as_str(), "1" | "true");
    }

    if let Some(v) = get("PORT") {
        match v.parse::<u16>() {
            Ok(port) => config.listener.port = port,
            Err(e) => errors.push(ValidationError::Invalid {
                key: "PORT",
                reason: format!("{:?}: {}", v, e),
            }),
        }
    }

    if let Some(v) = get("VAULT_ADDR") {
        config.vault.address = v;
    }
    if let Some(v) = get("VAULT_TOKEN") {
        config.vault.token = Some(v);
    }
    if let Some(v) = get("HEALTH_ADDR") {
        config.health.bind_address = v;
    }

    errors
}

/// Load the optional file, overlay the environment, and validate.
pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<ControlConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => ControlConfig::default(),
    };

    let mut errors = apply_env(&mut config, lookup);
    if let Err(mut semantic) = validate_config(&config) {
        errors.append(&mut semantic);
    }

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://db/control"),
        ("S3_BUCKET", "bucket"),
        ("HUB_DOMAIN", "*.hub.example.com"),
        ("REGISTER_TOKEN", "reg"),
        ("OPS_TOKEN", "ops"),
    ];

    #[test]
    fn loads_from_environment() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "8443"));
        pairs.push(("LETSENCRYPT_STAGING", "yes"));
        pairs.push(("HUB_IMAGE_TAG", "v1.2.3"));

        let config = load(None, env(&pairs)).unwrap();
        assert_eq!(config.listener.port, 8443);
        assert!(config.deployment.staging);
        assert!(config.deployment.use_tls_manager);
        assert_eq!(config.deployment.image_tag.as_deref(), Some("v1.2.3"));
        assert_eq!(config.deployment.domain, "*.hub.example.com");
    }

    #[test]
    fn default_port_when_unset() {
        let config = load(None, env(REQUIRED)).unwrap();
        assert_eq!(config.listener.port, 24402);
    }

    #[test]
    fn cloud_session_is_opt_in() {
        let config = load(None, env(REQUIRED)).unwrap();
        assert!(!config.deployment.use_cloud);

        let mut config = ControlConfig::default();
        apply_env(&mut config, env(&[("USE_AWS", "yes")]));
        assert!(!config.deployment.use_cloud, "only \"1\" or \"true\" enable it");
    }

    #[test]
    fn toggle_semantics() {
        let mut config = ControlConfig::default();
        apply_env(
            &mut config,
            env(&[("USE_TLS_MANAGER", "0"), ("USE_AWS", "true")]),
        );
        assert!(!config.deployment.use_tls_manager);
        assert!(config.deployment.use_cloud);

        let mut config = ControlConfig::default();
        apply_env(
            &mut config,
            env(&[("USE_TLS_MANAGER", "no"), ("USE_AWS", "0")]),
        );
        assert!(config.deployment.use_tls_manager, "only \"0\" disables the TLS manager");
        assert!(!config.deployment.use_cloud);
    }

    #[test]
    fn invalid_port_is_reported_with_missing_values() {
        let err = load(None, env(&[("PORT", "not-a-port")])).unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, ValidationError::Invalid { key: "PORT", .. })));
                assert!(errors.contains(&ValidationError::Missing("OPS_TOKEN")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn missing_zone_is_fatal_when_dns_automation_active() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("USE_AWS", "1"));
        let err = load(None, env(&pairs)).unwrap_err();
        assert!(err.to_string().contains("missing ZONE_ID"));
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nport = 9000\nidle_timeout_secs = 45\n\n[vault]\nrole = \"edge\""
        )
        .unwrap();

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "9443"));
        let config = load(Some(file.path()), env(&pairs)).unwrap();
        assert_eq!(config.listener.port, 9443);
        assert_eq!(config.listener.idle_timeout_secs, 45);
        assert_eq!(config.vault.role, "edge");
    }
}
