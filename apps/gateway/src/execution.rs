// [apps/gateway/src/execution.rs]
/*!
 * =================================================================
 * APARATO: EXECUTION ENGINE
 * CLASIFICACIÓN: APPLICATION SERVICE (L1-APP)
 * RESPONSABILIDAD: CICLO DE VIDA DE EJECUCIONES Y PLANES DE REVERSIÓN
 *
 * Ties the safety engine, the cluster client and the audit chain
 * together behind the five operations the gateway's HTTP and WebSocket
 * surfaces expose: Execute, RequestApproval, Cancel, CreateRollbackPlan
 * and ExecuteRollback.
 * =================================================================
 */

use crate::audit_buffer::AsyncAuditBuffer;
use crate::command_parser::{parse_command, ParsedCommand};
use crate::rollback::build_inverse_command;
use crate::ws_hub::{WsEvent, WsHub};
use chrono::{Duration as ChronoDuration, Utc};
use meridian_cluster_client::{check_request, ClusterClient, ClusterRequest, RbacPolicy, Verb};
use meridian_domain::audit::AuditEntry;
use meridian_domain::classification::{Classification, SafetyLevel};
use meridian_domain::execution::{Approval, Execution, ExecutionStatus, FailureKind, RollbackPlan, RollbackStatus, RollbackStep};
use meridian_domain::identity::Identity;
use meridian_safety::SafetyEngine;
use meridian_store::{AuditRepository, ExecutionRepository, RollbackRepository, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// How long a cancelled execution's in-flight cluster call is still given
/// to land before its result is given up on. The side effect already
/// dispatched to the cluster keeps running past this window regardless;
/// this only bounds how long `run_on_cluster` waits to record it.
const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("[EXEC_AUTH_FAULT]: {0}")]
    Unauthorized(String),

    #[error("[EXEC_BLOCKED]: command blocked -> {0:?}")]
    Blocked(Vec<String>),

    #[error("[EXEC_NOT_FOUND]: {0}")]
    NotFound(String),

    #[error("[EXEC_STATE_FAULT]: {0}")]
    InvalidState(String),

    #[error("[EXEC_ROLLBACK_FAULT]: {0}")]
    NoRollbackAvailable(String),

    #[error("[EXEC_PARSE_FAULT]: command could not be parsed into a cluster request")]
    UnparseableCommand,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Context that would otherwise be smuggled through thread-locals: who is
/// acting, under what session, and where the call originated from. Passed
/// explicitly through every operation so cancellation and audit always
/// agree on whose request this is.
#[derive(Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub session_id: Uuid,
    pub correlation_id: Uuid,
    pub namespace: String,
    pub cluster_context: String,
    pub address: String,
    pub agent: String,
    /// The natural-language query that produced `command`, if this request
    /// originated from synthesis. Empty for a directly-submitted command.
    pub query: String,
}

pub struct ExecutionEngine {
    executions: Arc<ExecutionRepository>,
    rollbacks: Arc<RollbackRepository>,
    audit: Arc<AuditRepository>,
    cluster: Arc<ClusterClient>,
    safety: Arc<SafetyEngine>,
    rbac_policy: Arc<RbacPolicy>,
    ws_hub: Arc<WsHub>,
    critical_namespaces: Vec<String>,
    call_deadline: Duration,
    cancellations: RwLock<HashMap<Uuid, Arc<Notify>>>,
    audit_buffer: Option<Arc<AsyncAuditBuffer>>,
}

impl ExecutionEngine {
    pub fn new(
        executions: Arc<ExecutionRepository>,
        rollbacks: Arc<RollbackRepository>,
        audit: Arc<AuditRepository>,
        cluster: Arc<ClusterClient>,
        safety: Arc<SafetyEngine>,
        rbac_policy: Arc<RbacPolicy>,
        ws_hub: Arc<WsHub>,
        critical_namespaces: Vec<String>,
        call_deadline: Duration,
        audit_buffer: Option<Arc<AsyncAuditBuffer>>,
    ) -> Self {
        Self {
            executions,
            rollbacks,
            audit,
            cluster,
            safety,
            rbac_policy,
            ws_hub,
            critical_namespaces,
            call_deadline,
            cancellations: RwLock::new(HashMap::new()),
            audit_buffer,
        }
    }

    #[instrument(skip(self, ctx), fields(owner = %ctx.identity.id))]
    pub async fn execute(self: &Arc<Self>, ctx: RequestContext, command: String) -> Result<Execution, ExecutionError> {
        let classification = self.safety.classify(
            &command,
            ctx.identity.environment,
            ctx.identity.role,
            Some(&ctx.namespace),
            &self.critical_namespaces,
        );

        if classification.is_blocked {
            self.append_audit(&ctx, &command, &classification, "failed").await?;
            return Err(ExecutionError::Blocked(classification.reasons));
        }

        let parsed = parse_command(&command).ok_or(ExecutionError::UnparseableCommand)?;
        let cluster_request = ClusterRequest {
            verb: parsed.verb,
            resource_kind: parsed.resource_kind.clone(),
            namespace: ctx.namespace.clone(),
            replicas: parsed.replicas,
            command_text: command.clone(),
        };

        if let Err(policy_err) = check_request(&ctx.identity, &self.rbac_policy, &cluster_request) {
            self.append_audit(&ctx, &command, &classification, "failed").await?;
            return Err(ExecutionError::Unauthorized(policy_err.to_string()));
        }

        let initial_status = if classification.requires_approval {
            ExecutionStatus::AwaitingApproval
        } else {
            ExecutionStatus::Pending
        };

        // A scale mutation needs the resource's current replica count
        // captured up front, or a later rollback plan has nothing to
        // restore. Best-effort: a probe failure never blocks the execution
        // itself, it just leaves the rollback plan without an inverse.
        let previous_replicas = if parsed.verb == Verb::Scale && parsed.replicas.is_some() {
            self.probe_current_replicas(&ctx, &parsed).await
        } else {
            None
        };

        let execution = Execution {
            id: Uuid::new_v4(),
            owner_id: ctx.identity.id,
            session_id: ctx.session_id,
            command: command.clone(),
            status: initial_status,
            output: None,
            exit_code: None,
            failure_kind: None,
            started_at: Utc::now(),
            completed_at: None,
            approved_by: None,
            rollback_plan_id: None,
            correlation_id: ctx.correlation_id,
            resource_name: parsed.resource_name.clone(),
            previous_replicas,
        };

        self.executions.insert(&execution).await?;

        if initial_status == ExecutionStatus::AwaitingApproval {
            // No terminal transition will follow until approval is granted
            // or denied, so this is the only audit row this execution gets
            // until then.
            self.append_audit(&ctx, &command, &classification, status_label(initial_status)).await?;
            self.ws_hub.publish(WsEvent::ApprovalRequested {
                execution_id: execution.id,
                requested_by: ctx.identity.id,
            });
            return Ok(execution);
        }

        self.begin_running(Arc::clone(self), execution.id, cluster_request, ctx).await
    }

    /// Issues a read-only `describe` call for the scaled resource and
    /// parses its current replica count out of the cluster's free-text
    /// output (`kubectl describe`-style `Replicas:` line). Returns `None`
    /// on any transport failure or unparseable output.
    async fn probe_current_replicas(&self, ctx: &RequestContext, parsed: &ParsedCommand) -> Option<u32> {
        let describe_request = ClusterRequest {
            verb: Verb::Describe,
            resource_kind: parsed.resource_kind.clone(),
            namespace: ctx.namespace.clone(),
            replicas: None,
            command_text: format!(
                "kubectl describe {} {}",
                parsed.resource_kind,
                parsed.resource_name.as_deref().unwrap_or("")
            ),
        };

        let response = self
            .cluster
            .invoke(&ctx.identity, &self.rbac_policy, describe_request, self.call_deadline)
            .await
            .ok()?;

        parse_replica_count(&response.output)
    }

    /// Queues an `AwaitingApproval` execution for an approver, or — when the
    /// caller already holds the `approve` permission (or is admin) — grants
    /// approval immediately and starts the run. A single operation serves
    /// both roles, matching the one approvals endpoint the surface exposes.
    #[instrument(skip(self, ctx))]
    pub async fn request_approval(
        self: &Arc<Self>,
        ctx: RequestContext,
        execution_id: Uuid,
        reason: String,
    ) -> Result<Approval, ExecutionError> {
        let execution = self.executions.get(execution_id).await?;
        if execution.status != ExecutionStatus::AwaitingApproval {
            return Err(ExecutionError::InvalidState(format!(
                "execution {execution_id} is not awaiting approval"
            )));
        }

        let is_approver = ctx.identity.role.is_admin() || ctx.identity.has_permission("approve");

        if !is_approver {
            self.append_audit(&ctx, &execution.command, &Classification::new(SafetyLevel::Warning), "approval_requested")
                .await?;
            return Ok(Approval {
                execution_id,
                reason,
                requested_at: Utc::now(),
                approved_by: None,
            });
        }

        self.executions.set_approved_by(execution_id, ctx.identity.id).await?;

        let parsed = parse_command(&execution.command).ok_or(ExecutionError::UnparseableCommand)?;
        let cluster_request = ClusterRequest {
            verb: parsed.verb,
            resource_kind: parsed.resource_kind,
            namespace: ctx.namespace.clone(),
            replicas: parsed.replicas,
            command_text: execution.command.clone(),
        };

        self.append_audit(&ctx, &execution.command, &Classification::new(SafetyLevel::Dangerous), "approved")
            .await?;

        let approver_id = ctx.identity.id;
        self.begin_running(Arc::clone(self), execution_id, cluster_request, ctx).await?;

        Ok(Approval {
            execution_id,
            reason,
            requested_at: Utc::now(),
            approved_by: Some(approver_id),
        })
    }

    /// Transitions `pending`/`awaitingApproval` to `running` and spawns the
    /// cluster call as a detached task so the HTTP response returns
    /// immediately with the execution in its new state.
    async fn begin_running(
        &self,
        engine: Arc<Self>,
        execution_id: Uuid,
        cluster_request: ClusterRequest,
        ctx: RequestContext,
    ) -> Result<Execution, ExecutionError> {
        self.executions
            .update_status(execution_id, ExecutionStatus::Running, None, None, None)
            .await?;
        self.ws_hub.publish(WsEvent::CommandStatusUpdate {
            execution_id,
            status: status_label(ExecutionStatus::Running).to_string(),
        });

        let notify = Arc::new(Notify::new());
        self.cancellations
            .write()
            .expect("cancellation registry lock poisoned")
            .insert(execution_id, Arc::clone(&notify));

        let deadline = self.call_deadline;
        tokio::spawn(async move {
            engine.run_on_cluster(execution_id, cluster_request, ctx, notify, deadline).await;
        });

        self.executions.get(execution_id).await.map_err(ExecutionError::from)
    }

    async fn run_on_cluster(
        self: Arc<Self>,
        execution_id: Uuid,
        cluster_request: ClusterRequest,
        ctx: RequestContext,
        cancel: Arc<Notify>,
        deadline: Duration,
    ) {
        let command_text = cluster_request.command_text.clone();
        let call = self.cluster.invoke(&ctx.identity, &self.rbac_policy, cluster_request, deadline);
        tokio::pin!(call);

        let (status, output, exit_code, failure_kind, cancelled_in_flight) = tokio::select! {
            result = &mut call => match result {
                Ok(response) => (ExecutionStatus::Completed, Some(response.output), Some(response.exit_code), None, false),
                Err(failure) => {
                    let terminal = if matches!(failure.kind, FailureKind::Timeout) {
                        ExecutionStatus::Timeout
                    } else {
                        ExecutionStatus::Failed
                    };
                    (terminal, Some(failure.message), None, Some(failure.kind), false)
                }
            },
            _ = cancel.notified() => {
                warn!(%execution_id, "execution cancelled while in flight");
                (ExecutionStatus::Cancelled, None, None, None, true)
            }
        };

        self.cancellations
            .write()
            .expect("cancellation registry lock poisoned")
            .remove(&execution_id);

        if let Err(err) = self
            .executions
            .update_status(execution_id, status, output.clone(), exit_code, failure_kind)
            .await
        {
            warn!(%execution_id, error = %err, "failed to persist execution terminal status");
        }

        // The row is already `cancelled`, but the cluster call we raced
        // against the cancellation is still running server-side. Give it a
        // grace period to land and patch the terminal row with whatever it
        // produced instead of leaving output/exit_code empty forever.
        if cancelled_in_flight {
            match tokio::time::timeout(CANCEL_GRACE_PERIOD, call).await {
                Ok(Ok(response)) => {
                    if let Err(err) = self
                        .executions
                        .attach_late_result(execution_id, Some(response.output), Some(response.exit_code))
                        .await
                    {
                        warn!(%execution_id, error = %err, "failed to attach late result to cancelled execution");
                    }
                }
                Ok(Err(failure)) => {
                    if let Err(err) = self
                        .executions
                        .attach_late_result(execution_id, Some(failure.message), None)
                        .await
                    {
                        warn!(%execution_id, error = %err, "failed to attach late failure to cancelled execution");
                    }
                }
                Err(_elapsed) => {
                    warn!(%execution_id, "in-flight call outlived the cancellation grace period, result discarded");
                }
            }
        }

        self.ws_hub.publish(WsEvent::CommandStatusUpdate {
            execution_id,
            status: status_label(status).to_string(),
        });

        let classification_status = status_label(status);
        let classification = Classification::new(if failure_kind.is_some() {
            SafetyLevel::Warning
        } else {
            SafetyLevel::Safe
        });
        if let Err(err) = self
            .append_audit(&ctx, &command_text, &classification, classification_status)
            .await
        {
            warn!(%execution_id, error = %err, "failed to append terminal audit entry");
        }

        info!(%execution_id, status = classification_status, "execution reached a terminal state");
    }

    /// Best-effort cancel: races the in-flight cluster call via the
    /// `Notify` registered when the execution started running. An
    /// execution with no registered cancellation handle has either already
    /// reached a terminal state or never left `pending`/`awaitingApproval`,
    /// both of which are cancelled synchronously here instead.
    #[instrument(skip(self))]
    pub async fn cancel(&self, execution_id: Uuid) -> Result<Execution, ExecutionError> {
        let execution = self.executions.get(execution_id).await?;
        if execution.status.is_terminal() {
            return Err(ExecutionError::InvalidState(format!(
                "execution {execution_id} has already reached a terminal state"
            )));
        }

        let handle = self
            .cancellations
            .read()
            .expect("cancellation registry lock poisoned")
            .get(&execution_id)
            .cloned();

        match handle {
            Some(notify) => notify.notify_one(),
            None => {
                self.executions
                    .update_status(execution_id, ExecutionStatus::Cancelled, None, None, None)
                    .await?;
                self.ws_hub.publish(WsEvent::CommandStatusUpdate {
                    execution_id,
                    status: status_label(ExecutionStatus::Cancelled).to_string(),
                });
            }
        }

        self.executions.get(execution_id).await.map_err(ExecutionError::from)
    }

    #[instrument(skip(self))]
    pub async fn create_rollback_plan(&self, execution_id: Uuid) -> Result<RollbackPlan, ExecutionError> {
        let execution = self.executions.get(execution_id).await?;
        if execution.status != ExecutionStatus::Completed {
            return Err(ExecutionError::InvalidState(
                "rollback plans can only be created for completed executions".to_string(),
            ));
        }

        let parsed = parse_command(&execution.command).ok_or(ExecutionError::UnparseableCommand)?;
        let inverse_command = build_inverse_command(
            &execution.command,
            &parsed.resource_kind,
            execution.resource_name.as_deref(),
            execution.previous_replicas,
        )
        .map_err(|e| ExecutionError::NoRollbackAvailable(e.to_string()))?;

        let now = Utc::now();
        let plan = RollbackPlan {
            id: Uuid::new_v4(),
            execution_id,
            steps: vec![RollbackStep {
                order: 1,
                command: inverse_command,
            }],
            status: RollbackStatus::Planned,
            created_at: now,
            expires_at: now + ChronoDuration::hours(RollbackPlan::DEFAULT_TTL_HOURS),
        };

        self.rollbacks.insert(&plan).await?;
        self.executions.attach_rollback_plan(execution_id, plan.id).await?;
        Ok(plan)
    }

    /// Runs every step in order as its own `Execution`, stopping at the
    /// first failure. `ctx` supplies the identity and session under which
    /// the rollback steps run — by convention, whoever invokes the
    /// rollback, not the original executor.
    #[instrument(skip(self, ctx))]
    pub async fn execute_rollback(self: &Arc<Self>, ctx: RequestContext, plan_id: Uuid) -> Result<RollbackPlan, ExecutionError> {
        let plan = self.rollbacks.get(plan_id).await?;
        if plan.status != RollbackStatus::Planned {
            return Err(ExecutionError::InvalidState(format!(
                "rollback plan {plan_id} is not in a runnable state"
            )));
        }
        if plan.is_expired(Utc::now()) {
            return Err(ExecutionError::InvalidState(format!("rollback plan {plan_id} has expired")));
        }

        for step in &plan.steps {
            let execution = self.execute(ctx.clone(), step.command.clone()).await?;
            if execution.status == ExecutionStatus::Failed || execution.status == ExecutionStatus::Timeout {
                return Err(ExecutionError::InvalidState(format!(
                    "rollback step {} failed, aborting remaining steps",
                    step.order
                )));
            }
        }

        self.rollbacks.mark_executed(plan_id).await?;
        self.rollbacks.get(plan_id).await.map_err(ExecutionError::from)
    }

    /// Records a synthesis-step audit entry carrying the original
    /// natural-language query, for callers (`/nlp/process`) that never
    /// reach `execute()` and therefore never go through the append calls
    /// above.
    pub async fn record_synthesis(
        &self,
        ctx: &RequestContext,
        command: &str,
        classification: &Classification,
    ) -> Result<(), ExecutionError> {
        self.append_audit(ctx, command, classification, "synthesized")
            .await
            .map_err(ExecutionError::from)
    }

    async fn append_audit(
        &self,
        ctx: &RequestContext,
        command: &str,
        classification: &Classification,
        status: &str,
    ) -> Result<(), StoreError> {
        let category = category_for(&ctx.identity, command);
        let risk_score = compute_risk_score(classification.level, status, &category);

        let entry = AuditEntry {
            id: 0,
            timestamp: Utc::now(),
            actor_id: ctx.identity.id,
            session_id: ctx.session_id,
            query: ctx.query.clone(),
            command: command.to_string(),
            classification: format!("{:?}", classification.level),
            status: status.to_string(),
            cluster_context: ctx.cluster_context.clone(),
            namespace_context: ctx.namespace.clone(),
            risk_score,
            checksum: String::new(),
            previous_checksum: String::new(),
            correlation_id: ctx.correlation_id,
            address: ctx.address.clone(),
            agent: ctx.agent.clone(),
            category,
        };

        match &self.audit_buffer {
            Some(buffer) => {
                buffer.submit(entry).await;
                Ok(())
            }
            None => {
                self.audit.append(entry).await?;
                Ok(())
            }
        }
    }
}

fn status_label(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::AwaitingApproval => "awaiting_approval",
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Cancelled => "cancelled",
        ExecutionStatus::Timeout => "timeout",
    }
}

/// Pulls a replica count out of a `kubectl describe`-style text block,
/// looking for a `Replicas: N` (or `Replicas:  N desired | ...`) line.
fn parse_replica_count(output: &str) -> Option<u32> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Replicas:")?;
        rest.trim().split_whitespace().next()?.parse().ok()
    })
}

fn category_for(identity: &Identity, command: &str) -> String {
    if identity.role.is_admin() {
        return "admin".to_string();
    }
    match parse_command(command) {
        Some(parsed) if parsed.verb.is_destructive() => "delete".to_string(),
        Some(parsed) if parsed.verb.is_write() => "write".to_string(),
        _ => "read".to_string(),
    }
}

/// Risk scoring contribution, computed the same way at append time as the
/// digest's stored inputs: level first, then status, then category, clamped
/// to 1.0.
fn compute_risk_score(level: SafetyLevel, status: &str, category: &str) -> f32 {
    let mut score = level.base_risk();
    if status == "failed" {
        score += 0.3;
    }
    if matches!(category, "admin" | "delete" | "write") {
        score += 0.2;
    }
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_domain::identity::{Environment, Role};
    use std::collections::HashSet;

    fn identity(role: Role) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            display_name: "tester".to_string(),
            role,
            permissions: HashSet::new(),
            environment: Environment::Dev,
        }
    }

    #[test]
    fn parses_replica_count_from_describe_output() {
        let output = "Name: payments\nReplicas:  4 desired | 4 updated | 4 available\n";
        assert_eq!(parse_replica_count(output), Some(4));
    }

    #[test]
    fn no_replica_line_returns_none() {
        assert_eq!(parse_replica_count("Name: payments\n"), None);
    }

    #[test]
    fn category_for_admin_is_always_admin() {
        let admin = identity(Role::Admin);
        assert_eq!(category_for(&admin, "kubectl get pods"), "admin");
    }

    #[test]
    fn category_for_destructive_verb_is_delete() {
        let operator = identity(Role::Operator);
        assert_eq!(category_for(&operator, "kubectl delete pod crashloop-5"), "delete");
    }

    #[test]
    fn category_for_mutating_verb_is_write() {
        let operator = identity(Role::Operator);
        assert_eq!(
            category_for(&operator, "kubectl scale deployment payments --replicas=4"),
            "write"
        );
    }

    #[test]
    fn category_for_read_only_verb_is_read() {
        let viewer = identity(Role::Viewer);
        assert_eq!(category_for(&viewer, "kubectl get pods"), "read");
    }

    #[test]
    fn risk_score_clamps_at_one() {
        let score = compute_risk_score(SafetyLevel::Dangerous, "failed", "delete");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn risk_score_sums_contributions_for_a_successful_safe_read() {
        let score = compute_risk_score(SafetyLevel::Safe, "completed", "read");
        assert_eq!(score, 0.0);
    }

    #[test]
    fn risk_score_for_warning_scale_meets_the_scenario_floor() {
        // §8 end-to-end scenario 2: a warning-level scale escalated to
        // dangerous by the production rule should clear a risk floor of 0.7.
        let score = compute_risk_score(SafetyLevel::Dangerous, "awaiting_approval", "write");
        assert!(score >= 0.7);
    }
}
