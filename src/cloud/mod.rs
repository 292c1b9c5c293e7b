//! Cloud session and DNS automation.
//!
//! # Responsibilities
//! - Resolve the cloud toggle into a session once at startup
//! - Point the serving domain's zone record at this process (one-time setup)
//!
//! # Design Decisions
//! - The zone API is a trait; the binary embeds no implementation, so enabling the
//!   toggle without one is a startup error rather than a silent no-op
//! - DNS setup only runs when a session exists and the certificate is managed

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors from cloud session setup and DNS automation.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The cloud toggle is on but no zone client was supplied.
    #[error("Cloud session enabled but no zone client is available")]
    Unavailable,

    /// DNS automation needs a zone identifier.
    #[error("ZONE_ID is required for DNS setup")]
    MissingZone,

    /// The zone API rejected the change.
    #[error("DNS update for {domain} in zone {zone_id} failed: {reason}")]
    Update {
        zone_id: String,
        domain: String,
        reason: String,
    },
}

/// Manages DNS records in a hosted zone.
#[async_trait]
pub trait ZoneClient: Send + Sync {
    /// Create or update the record for `domain` so it resolves to this process.
    async fn upsert_record(&self, zone_id: &str, domain: &str) -> Result<(), CloudError>;
}

/// Cloud capability resolved from the deployment toggle.
#[derive(Clone, Default)]
pub enum CloudSession {
    #[default]
    Disabled,
    Enabled(Arc<dyn ZoneClient>),
}

impl CloudSession {
    /// A zone client is only required when DNS setup will actually run, which is
    /// when the cloud toggle and the managed certificate are both on.
    pub fn resolve(
        enabled: bool,
        managed_certificate: bool,
        client: Option<Arc<dyn ZoneClient>>,
    ) -> Result<Self, CloudError> {
        match (enabled, client) {
            (false, _) => Ok(Self::Disabled),
            (true, Some(client)) => Ok(Self::Enabled(client)),
            (true, None) if managed_certificate => Err(CloudError::Unavailable),
            (true, None) => {
                tracing::info!(
                    "Cloud session requested without a zone client, DNS setup not needed"
                );
                Ok(Self::Disabled)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }
}

impl std::fmt::Debug for CloudSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("CloudSession::Disabled"),
            Self::Enabled(_) => f.write_str("CloudSession::Enabled"),
        }
    }
}

/// Run DNS setup when it applies. Returns whether a record was written.
///
/// Any failure is fatal to startup: serving under the wrong name defeats the
/// certificate obtained for it.
pub async fn setup_dns(
    session: &CloudSession,
    managed_certificate: bool,
    zone_id: Option<&str>,
    domain: &str,
) -> Result<bool, CloudError> {
    let CloudSession::Enabled(client) = session else {
        return Ok(false);
    };
    if !managed_certificate {
        return Ok(false);
    }

    let zone_id = zone_id.filter(|z| !z.is_empty()).ok_or(CloudError::MissingZone)?;
    client.upsert_record(zone_id, domain).await?;

    tracing::info!(zone_id, domain, "DNS record updated");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingZone {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ZoneClient for RecordingZone {
        async fn upsert_record(&self, zone_id: &str, domain: &str) -> Result<(), CloudError> {
            self.calls
                .lock()
                .unwrap()
                .push((zone_id.to_string(), domain.to_string()));
            if self.fail {
                return Err(CloudError::Update {
                    zone_id: zone_id.to_string(),
                    domain: domain.to_string(),
                    reason: "throttled".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn resolve_requires_client_only_for_managed_certificates() {
        assert!(!CloudSession::resolve(false, true, None).unwrap().is_enabled());
        assert!(matches!(
            CloudSession::resolve(true, true, None),
            Err(CloudError::Unavailable)
        ));

        let zone: Arc<dyn ZoneClient> = Arc::new(RecordingZone::default());
        assert!(CloudSession::resolve(true, true, Some(zone)).unwrap().is_enabled());
    }

    #[test]
    fn self_signed_deployments_start_without_zone_client() {
        let session = CloudSession::resolve(true, false, None).unwrap();
        assert!(!session.is_enabled());
    }

    #[tokio::test]
    async fn setup_runs_only_for_managed_certificates() {
        let zone = Arc::new(RecordingZone::default());
        let session = CloudSession::Enabled(zone.clone());

        assert!(!setup_dns(&session, false, Some("Z1"), "hub.example.com")
            .await
            .unwrap());
        assert!(!setup_dns(&CloudSession::Disabled, true, Some("Z1"), "hub.example.com")
            .await
            .unwrap());
        assert!(zone.calls.lock().unwrap().is_empty());

        assert!(setup_dns(&session, true, Some("Z1"), "hub.example.com")
            .await
            .unwrap());
        assert_eq!(
            zone.calls.lock().unwrap().as_slice(),
            &[("Z1".to_string(), "hub.example.com".to_string())]
        );
    }

    #[tokio::test]
    async fn setup_failures_propagate() {
        let session = CloudSession::Enabled(Arc::new(RecordingZone {
            fail: true,
            ..RecordingZone::default()
        }));
        assert!(matches!(
            setup_dns(&session, true, Some("Z1"), "hub.example.com").await,
            Err(CloudError::Update { .. })
        ));
        assert!(matches!(
            setup_dns(&session, true, None, "hub.example.com").await,
            Err(CloudError::MissingZone)
        ));
    }
}
