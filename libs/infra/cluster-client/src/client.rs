// [libs/infra/cluster-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: CLUSTER CLIENT
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (L3)
 * RESPONSABILIDAD: EJECUCIÓN AUTENTICADA Y ACOTADA POR DEADLINE
 * =================================================================
 */

use crate::classify::classify_failure;
use crate::errors::ClientError;
use crate::policy::{check_request, ClusterRequest, RbacPolicy};
use crate::sanitize::sanitize_output;
use meridian_domain::execution::FailureKind;
use meridian_domain::identity::Identity;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct ClusterResponse {
    pub output: String,
    pub exit_code: i32,
}

pub struct ClusterCallFailure {
    pub message: String,
    pub kind: FailureKind,
}

/// Thin, RBAC-scoped wrapper around the cluster's management API.
/// `check_request` runs before any network call, so an unauthorized or
/// out-of-policy request never reaches the cluster.
pub struct ClusterClient {
    http: reqwest::Client,
    base_url: String,
}

impl ClusterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    #[instrument(skip(self, identity, policy, request), fields(verb = ?request.verb, resource_kind = %request.resource_kind))]
    pub async fn invoke(
        &self,
        identity: &Identity,
        policy: &RbacPolicy,
        request: ClusterRequest,
        deadline: Duration,
    ) -> Result<ClusterResponse, ClusterCallFailure> {
        check_request(identity, policy, &request).map_err(|e| ClusterCallFailure {
            kind: match &e {
                ClientError::Unauthorized(_) => FailureKind::Permission,
                ClientError::Forbidden(_) => FailureKind::Permission,
                ClientError::Transport(_) => FailureKind::Network,
                ClientError::Deadline => FailureKind::Timeout,
            },
            message: e.to_string(),
        })?;

        let call = self.execute_on_cluster(&request);
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(response)) => {
                info!("cluster call completed");
                Ok(response)
            }
            Ok(Err(message)) => {
                let kind = classify_failure(&message);
                warn!(%message, ?kind, "cluster call failed");
                Err(ClusterCallFailure {
                    message: sanitize_output(&message),
                    kind,
                })
            }
            Err(_) => {
                warn!("cluster call exceeded its deadline, cancelling in-flight work");
                Err(ClusterCallFailure {
                    message: "call exceeded its deadline".to_string(),
                    kind: FailureKind::Timeout,
                })
            }
        }
    }

    async fn execute_on_cluster(&self, request: &ClusterRequest) -> Result<ClusterResponse, String> {
        let body = serde_json::json!({
            "verb": request.verb,
            "resourceKind": request.resource_kind,
            "namespace": request.namespace,
            "replicas": request.replicas,
            "command": request.command_text,
        });

        let response = self
            .http
            .post(format!("{}/exec", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let text = response.text().await.map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("cluster returned status {status}: {text}"));
        }

        Ok(ClusterResponse {
            output: sanitize_output(&text),
            exit_code: 0,
        })
    }
}
