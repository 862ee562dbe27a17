//! An in-memory [`dlq_core::deployment_store::DeploymentStore`] fake.

use chrono::{DateTime, Utc};
use dlq_core::deployment_store::{DeploymentStore, DeploymentStoreError};
use dlq_core::model::DeploymentRef;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// In-memory [`DeploymentStore`] fake, keyed by service name.
#[derive(Clone, Default)]
pub struct InMemoryDeploymentStore {
    deployments: Arc<RwLock<HashMap<String, Vec<DeploymentRef>>>>,
}

impl InMemoryDeploymentStore {
    /// A store with no deployments recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deployment for `service`.
    pub fn seed(&self, service: &str, deployment: DeploymentRef) {
        self.deployments
            .write()
            .unwrap()
            .entry(service.to_string())
            .or_default()
            .push(deployment);
    }

    /// Remove every recorded deployment.
    pub fn clear(&self) {
        self.deployments.write().unwrap().clear();
    }
}

impl DeploymentStore for InMemoryDeploymentStore {
    fn recent_deployments(
        &self,
        service: &str,
        now: DateTime<Utc>,
        window_ms: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeploymentRef>, DeploymentStoreError>> + Send + '_>>
    {
        let service = service.to_string();
        Box::pin(async move {
            let window_start = now - chrono::Duration::milliseconds(window_ms);
            let deployments = self.deployments.read().unwrap();
            let mut matching: Vec<DeploymentRef> = deployments
                .get(&service)
                .map(|deployments| {
                    deployments
                        .iter()
                        .filter(|d| d.deployed_at >= window_start && d.deployed_at <= now)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            matching.sort_by_key(|d| std::cmp::Reverse(d.deployed_at));
            Ok(matching)
        })
    }
}
