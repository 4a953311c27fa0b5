//! Target liveness probing.
//!
//! A probe is a plain `GET` against the target's health path with its own
//! short deadline. It never raises: every failure means "unhealthy".

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::resilience::transport::{OutboundRequest, Transport};

/// Answers "is this target reachable right now?".
#[derive(Clone)]
pub struct HealthProber {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// `true` only for a 2xx answer within the probe timeout.
    pub async fn check(&self, url: &str) -> bool {
        let request = OutboundRequest::get(url).with_header("user-agent", "calc-mesh-health-check");

        match time::timeout(self.timeout, self.transport.send(&request)).await {
            Ok(Ok(response)) => {
                let healthy = response.status.is_success();
                if !healthy {
                    tracing::warn!(url = %url, status = %response.status, "Health check failed: non-success status");
                }
                healthy
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(url = %url, timeout = ?self.timeout, "Health check failed: timeout");
                false
            }
        }
    }
}
