// [libs/infra/store/src/repositories/execution.rs]
/*!
 * =================================================================
 * APARATO: EXECUTION REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL CICLO DE VIDA DE EJECUCIONES
 * =================================================================
 */

use crate::client::StoreClient;
use crate::errors::StoreError;
use libsql::{params, Row};
use meridian_domain::execution::{Execution, ExecutionStatus, FailureKind};
use tracing::instrument;
use uuid::Uuid;

pub struct ExecutionRepository {
    client: StoreClient,
}

impl ExecutionRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, execution))]
    pub async fn insert(&self, execution: &Execution) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO executions (
                id, owner_id, session_id, command, status, output, exit_code, failure_kind,
                started_at, completed_at, approved_by, rollback_plan_id, correlation_id,
                resource_name, previous_replicas
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                execution.id.to_string(),
                execution.owner_id.to_string(),
                execution.session_id.to_string(),
                execution.command.clone(),
                status_to_str(execution.status).to_string(),
                execution.output.clone(),
                execution.exit_code,
                execution.failure_kind.map(failure_kind_to_str),
                execution.started_at.to_rfc3339(),
                execution.completed_at.map(|t| t.to_rfc3339()),
                execution.approved_by.map(|id| id.to_string()),
                execution.rollback_plan_id.map(|id| id.to_string()),
                execution.correlation_id.to_string(),
                execution.resource_name.clone(),
                execution.previous_replicas,
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Execution, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, owner_id, session_id, command, status, output, exit_code, failure_kind,
                        started_at, completed_at, approved_by, rollback_plan_id, correlation_id,
                        resource_name, previous_replicas
                 FROM executions WHERE id = ?1",
                params![id.to_string()],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("execution {id}")))?;
        map_execution_row(row)
    }

    /// Persists a new status, and any terminal-row fields a caller supplies
    /// alongside it. Late results that arrive after a `Cancelled` execution
    /// has already left the active set still land here, updating the
    /// terminal row's output/exit_code without attempting a further status
    /// transition.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: ExecutionStatus,
        output: Option<String>,
        exit_code: Option<i32>,
        failure_kind: Option<FailureKind>,
    ) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        let completed_at = if status.is_terminal() {
            Some(chrono::Utc::now().to_rfc3339())
        } else {
            None
        };
        conn.execute(
            "UPDATE executions SET status = ?2, output = ?3, exit_code = ?4, failure_kind = ?5, completed_at = COALESCE(?6, completed_at)
             WHERE id = ?1",
            params![
                id.to_string(),
                status_to_str(status).to_string(),
                output,
                exit_code,
                failure_kind.map(failure_kind_to_str),
                completed_at,
            ],
        )
        .await?;
        Ok(())
    }

    /// Patches a terminal row's output/exit_code in place without touching
    /// its status. Used when a cluster call outlives the cancellation that
    /// already marked its execution `cancelled`.
    #[instrument(skip(self))]
    pub async fn attach_late_result(&self, id: Uuid, output: Option<String>, exit_code: Option<i32>) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE executions SET output = COALESCE(?2, output), exit_code = COALESCE(?3, exit_code) WHERE id = ?1",
            params![id.to_string(), output, exit_code],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn attach_rollback_plan(&self, id: Uuid, rollback_plan_id: Uuid) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE executions SET rollback_plan_id = ?2 WHERE id = ?1",
            params![id.to_string(), rollback_plan_id.to_string()],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_approved_by(&self, id: Uuid, approver: Uuid) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE executions SET approved_by = ?2 WHERE id = ?1",
            params![id.to_string(), approver.to_string()],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Execution>, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, owner_id, session_id, command, status, output, exit_code, failure_kind,
                        started_at, completed_at, approved_by, rollback_plan_id, correlation_id,
                        resource_name, previous_replicas
                 FROM executions WHERE owner_id = ?1 ORDER BY started_at DESC",
                params![owner_id.to_string()],
            )
            .await?;
        let mut executions = Vec::new();
        while let Some(row) = rows.next().await? {
            executions.push(map_execution_row(row)?);
        }
        Ok(executions)
    }
}

fn map_execution_row(row: Row) -> Result<Execution, StoreError> {
    let id: String = row.get(0)?;
    let owner_id: String = row.get(1)?;
    let session_id: String = row.get(2)?;
    let command: String = row.get(3)?;
    let status: String = row.get(4)?;
    let output: Option<String> = row.get(5)?;
    let exit_code: Option<i64> = row.get(6)?;
    let failure_kind: Option<String> = row.get(7)?;
    let started_at: String = row.get(8)?;
    let completed_at: Option<String> = row.get(9)?;
    let approved_by: Option<String> = row.get(10)?;
    let rollback_plan_id: Option<String> = row.get(11)?;
    let correlation_id: String = row.get(12)?;
    let resource_name: Option<String> = row.get(13)?;
    let previous_replicas: Option<i64> = row.get(14)?;

    Ok(Execution {
        id: id.parse().map_err(|_| StoreError::Mapping("malformed execution id".into()))?,
        owner_id: owner_id.parse().map_err(|_| StoreError::Mapping("malformed owner_id".into()))?,
        session_id: session_id.parse().map_err(|_| StoreError::Mapping("malformed session_id".into()))?,
        command,
        status: str_to_status(&status)?,
        output,
        exit_code: exit_code.map(|v| v as i32),
        failure_kind: failure_kind.as_deref().map(str_to_failure_kind).transpose()?,
        started_at: started_at.parse().map_err(|_| StoreError::Mapping("malformed started_at".into()))?,
        completed_at: completed_at
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| StoreError::Mapping("malformed completed_at".into()))?,
        approved_by: approved_by
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| StoreError::Mapping("malformed approved_by".into()))?,
        rollback_plan_id: rollback_plan_id
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| StoreError::Mapping("malformed rollback_plan_id".into()))?,
        correlation_id: correlation_id
            .parse()
            .map_err(|_| StoreError::Mapping("malformed correlation_id".into()))?,
        resource_name,
        previous_replicas: previous_replicas.map(|v| v as u32),
    })
}

fn status_to_str(status: ExecutionStatus) -> &'static str {
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

fn str_to_status(value: &str) -> Result<ExecutionStatus, StoreError> {
    match value {
        "pending" => Ok(ExecutionStatus::Pending),
        "awaiting_approval" => Ok(ExecutionStatus::AwaitingApproval),
        "running" => Ok(ExecutionStatus::Running),
        "completed" => Ok(ExecutionStatus::Completed),
        "failed" => Ok(ExecutionStatus::Failed),
        "cancelled" => Ok(ExecutionStatus::Cancelled),
        "timeout" => Ok(ExecutionStatus::Timeout),
        other => Err(StoreError::Mapping(format!("unknown execution status {other}"))),
    }
}

fn failure_kind_to_str(kind: FailureKind) -> String {
    match kind {
        FailureKind::Network => "network",
        FailureKind::Permission => "permission",
        FailureKind::NotFound => "not_found",
        FailureKind::Validation => "validation",
        FailureKind::Timeout => "timeout",
        FailureKind::Unknown => "unknown",
    }
    .to_string()
}

fn str_to_failure_kind(value: &str) -> Result<FailureKind, StoreError> {
    match value {
        "network" => Ok(FailureKind::Network),
        "permission" => Ok(FailureKind::Permission),
        "not_found" => Ok(FailureKind::NotFound),
        "validation" => Ok(FailureKind::Validation),
        "timeout" => Ok(FailureKind::Timeout),
        "unknown" => Ok(FailureKind::Unknown),
        other => Err(StoreError::Mapping(format!("unknown failure kind {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreClient;

    async fn memory_repo() -> ExecutionRepository {
        let client = StoreClient::connect(":memory:", None).await.expect("in-memory datastore");
        ExecutionRepository::new(client)
    }

    fn sample_execution() -> Execution {
        Execution {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            command: "kubectl scale deployment payments --replicas=4".to_string(),
            status: ExecutionStatus::Pending,
            output: None,
            exit_code: None,
            failure_kind: None,
            started_at: chrono::Utc::now(),
            completed_at: None,
            approved_by: None,
            rollback_plan_id: None,
            correlation_id: Uuid::new_v4(),
            resource_name: Some("payments".to_string()),
            previous_replicas: Some(2),
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_every_field() {
        let repo = memory_repo().await;
        let execution = sample_execution();
        repo.insert(&execution).await.unwrap();

        let fetched = repo.get(execution.id).await.unwrap();
        assert_eq!(fetched.status, ExecutionStatus::Pending);
        assert_eq!(fetched.resource_name.as_deref(), Some("payments"));
        assert_eq!(fetched.previous_replicas, Some(2));
    }

    #[tokio::test]
    async fn update_status_sets_completed_at_only_for_terminal_states() {
        let repo = memory_repo().await;
        let execution = sample_execution();
        repo.insert(&execution).await.unwrap();

        repo.update_status(execution.id, ExecutionStatus::Running, None, None, None)
            .await
            .unwrap();
        assert!(repo.get(execution.id).await.unwrap().completed_at.is_none());

        repo.update_status(
            execution.id,
            ExecutionStatus::Completed,
            Some("scaled to 4".to_string()),
            Some(0),
            None,
        )
        .await
        .unwrap();
        let completed = repo.get(execution.id).await.unwrap();
        assert_eq!(completed.status, ExecutionStatus::Completed);
        assert_eq!(completed.output.as_deref(), Some("scaled to 4"));
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn attach_late_result_patches_output_without_changing_status() {
        let repo = memory_repo().await;
        let execution = sample_execution();
        repo.insert(&execution).await.unwrap();

        repo.update_status(execution.id, ExecutionStatus::Cancelled, None, None, None)
            .await
            .unwrap();
        repo.attach_late_result(execution.id, Some("scaled to 4".to_string()), Some(0))
            .await
            .unwrap();

        let fetched = repo.get(execution.id).await.unwrap();
        assert_eq!(fetched.status, ExecutionStatus::Cancelled);
        assert_eq!(fetched.output.as_deref(), Some("scaled to 4"));
        assert_eq!(fetched.exit_code, Some(0));
    }

    #[tokio::test]
    async fn attach_rollback_plan_and_set_approved_by() {
        let repo = memory_repo().await;
        let execution = sample_execution();
        repo.insert(&execution).await.unwrap();

        let plan_id = Uuid::new_v4();
        repo.attach_rollback_plan(execution.id, plan_id).await.unwrap();
        assert_eq!(repo.get(execution.id).await.unwrap().rollback_plan_id, Some(plan_id));

        let approver = Uuid::new_v4();
        repo.set_approved_by(execution.id, approver).await.unwrap();
        assert_eq!(repo.get(execution.id).await.unwrap().approved_by, Some(approver));
    }

    #[tokio::test]
    async fn list_by_owner_only_returns_that_owners_executions() {
        let repo = memory_repo().await;
        let mine = sample_execution();
        let mut someone_elses = sample_execution();
        someone_elses.owner_id = Uuid::new_v4();

        repo.insert(&mine).await.unwrap();
        repo.insert(&someone_elses).await.unwrap();

        let listed = repo.list_by_owner(mine.owner_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
    }
}
