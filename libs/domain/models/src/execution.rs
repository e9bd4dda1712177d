// [libs/domain/models/src/execution.rs]
//! Execution lifecycle and rollback plans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    AwaitingApproval,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::Timeout
        )
    }

    /// Validates a transition against the execution state machine.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, AwaitingApproval)
                | (Pending, Running)
                | (AwaitingApproval, Running)
                | (AwaitingApproval, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, Timeout)
        )
    }
}

/// Deterministic classification of a downstream (cluster/transport) failure,
/// attached to both the `Execution` and its audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Permission,
    NotFound,
    Validation,
    Timeout,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub session_id: Uuid,
    pub command: String,
    pub status: ExecutionStatus,
    pub output: Option<String>,
    pub exit_code: Option<i32>,
    pub failure_kind: Option<FailureKind>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub rollback_plan_id: Option<Uuid>,
    pub correlation_id: Uuid,
    /// Resource name parsed out of `command` (e.g. `payments` in `kubectl
    /// scale deployment payments --replicas=4`), when one was present.
    pub resource_name: Option<String>,
    /// Replica count observed on the resource immediately before a scale
    /// mutation was applied, captured so a rollback plan can restore it.
    pub previous_replicas: Option<u32>,
}

impl Execution {
    /// Attempts the transition; returns `false` and leaves state untouched
    /// if the move is illegal per the state machine.
    pub fn transition(&mut self, next: ExecutionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    Planned,
    Executed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStep {
    pub order: u32,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub steps: Vec<RollbackStep>,
    pub status: RollbackStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RollbackPlan {
    /// Rollback plans are valid for 24h after creation.
    pub const DEFAULT_TTL_HOURS: i64 = 24;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Record of an approval request queued against an `AwaitingApproval`
/// execution. Not persisted in its own table — the execution's
/// `approved_by` field is the durable record; this is the shape returned
/// to the caller of `RequestApproval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub execution_id: Uuid,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionStatus::*;

    fn sample_execution(status: ExecutionStatus) -> Execution {
        Execution {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            command: "kubectl get pods".to_string(),
            status,
            output: None,
            exit_code: None,
            failure_kind: None,
            started_at: Utc::now(),
            completed_at: None,
            approved_by: None,
            rollback_plan_id: None,
            correlation_id: Uuid::new_v4(),
            resource_name: None,
            previous_replicas: None,
        }
    }

    #[test]
    fn legal_transitions_match_the_state_machine() {
        assert!(Pending.can_transition_to(AwaitingApproval));
        assert!(Pending.can_transition_to(Running));
        assert!(AwaitingApproval.can_transition_to(Running));
        assert!(AwaitingApproval.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Timeout));
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        assert!(!Pending.can_transition_to(Completed));
        assert!(!AwaitingApproval.can_transition_to(Pending));
        assert!(!Running.can_transition_to(AwaitingApproval));
        assert!(!Running.can_transition_to(Pending));
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        for terminal in [Completed, Failed, Cancelled, Timeout] {
            assert!(terminal.is_terminal());
            for next in [Pending, AwaitingApproval, Running, Completed, Failed, Cancelled, Timeout] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn transition_sets_completed_at_only_on_terminal_states() {
        let mut execution = sample_execution(Running);
        assert!(execution.transition(Completed));
        assert_eq!(execution.status, Completed);
        assert!(execution.completed_at.is_some());
    }

    #[test]
    fn transition_refuses_and_leaves_state_untouched_on_illegal_move() {
        let mut execution = sample_execution(Pending);
        assert!(!execution.transition(Completed));
        assert_eq!(execution.status, Pending);
        assert!(execution.completed_at.is_none());
    }

    #[test]
    fn rollback_plan_expiry_is_24h() {
        assert_eq!(RollbackPlan::DEFAULT_TTL_HOURS, 24);
        let now = Utc::now();
        let plan = RollbackPlan {
            id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            steps: vec![],
            status: RollbackStatus::Planned,
            created_at: now,
            expires_at: now + chrono::Duration::hours(24),
        };
        assert!(!plan.is_expired(now));
        assert!(plan.is_expired(now + chrono::Duration::hours(25)));
    }
}
