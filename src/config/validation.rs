//! Configuration validation.
//!
//! # Responsibilities
//! - Check that every required deployment value is present
//! - Check conditional requirements (zone id when DNS automation is active)
//! - Validate value ranges (intervals > 0, port valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControlConfig → Result<(), Vec<ValidationError>>
//! - Runs before anything else at startup

use thiserror::Error;

use crate::config::schema::{ControlConfig, MAX_SELF_SIGNED_VALIDITY_DAYS};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required value is absent or empty.
    #[error("missing {0}")]
    Missing(&'static str),

    /// A value is present but unusable.
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// A duration or count that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &ControlConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let deployment = &config.deployment;

    let required = [
        ("DATABASE_URL", &deployment.database_url),
        ("S3_BUCKET", &deployment.s3_bucket),
        ("HUB_DOMAIN", &deployment.domain),
        ("REGISTER_TOKEN", &deployment.register_token),
        ("OPS_TOKEN", &deployment.ops_token),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::Missing(key));
        }
    }

    if deployment.use_cloud && deployment.use_tls_manager {
        let zone_missing = deployment
            .zone_id
            .as_deref()
            .map(|z| z.trim().is_empty())
            .unwrap_or(true);
        if zone_missing {
            errors.push(ValidationError::Missing("ZONE_ID"));
        }
    }

    if deployment.domain.starts_with("*.") && deployment.domain.len() <= 2 {
        errors.push(ValidationError::Invalid {
            key: "HUB_DOMAIN",
            reason: "wildcard without a base domain".to_string(),
        });
    }

    if let Err(e) = url::Url::parse(&config.vault.address) {
        errors.push(ValidationError::Invalid {
            key: "VAULT_ADDR",
            reason: e.to_string(),
        });
    }

    if config.listener.port == 0 {
        errors.push(ValidationError::Zero("PORT"));
    }

    let positive = [
        ("listener.idle_timeout_secs", config.listener.idle_timeout_secs),
        ("vault.request_timeout_secs", config.vault.request_timeout_secs),
        ("vault.renew_interval_secs", config.vault.renew_interval_secs),
        ("vault.lease_increment_secs", config.vault.lease_increment_secs),
        ("tls.refresh_interval_secs", config.tls.refresh_interval_secs),
        ("tls.renew_check_interval_secs", config.tls.renew_check_interval_secs),
        ("tls.self_signed_validity_days", config.tls.self_signed_validity_days),
    ];
    for (key, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(key));
        }
    }

    if config.tls.self_signed_validity_days > MAX_SELF_SIGNED_VALIDITY_DAYS {
        errors.push(ValidationError::Invalid {
            key: "tls.self_signed_validity_days",
            reason: format!("must not exceed {MAX_SELF_SIGNED_VALIDITY_DAYS}"),
        });
    }

    if config.jobs.queues.iter().all(|q| q.trim().is_empty()) {
        errors.push(ValidationError::Missing("jobs.queues"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
