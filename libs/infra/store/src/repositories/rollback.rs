// [libs/infra/store/src/repositories/rollback.rs]
/*!
 * =================================================================
 * APARATO: ROLLBACK PLAN REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (L3)
 * RESPONSABILIDAD: PERSISTENCIA DE PLANES DE REVERSIÓN
 * =================================================================
 */

use crate::client::StoreClient;
use crate::errors::StoreError;
use chrono::Utc;
use libsql::{params, Row};
use meridian_domain::execution::{RollbackPlan, RollbackStatus, RollbackStep};
use tracing::instrument;
use uuid::Uuid;

pub struct RollbackRepository {
    client: StoreClient,
}

impl RollbackRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, plan))]
    pub async fn insert(&self, plan: &RollbackPlan) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        let steps_json =
            serde_json::to_string(&plan.steps).map_err(|e| StoreError::Mapping(e.to_string()))?;
        conn.execute(
            "INSERT INTO rollback_plans (id, execution_id, steps_json, status, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                plan.id.to_string(),
                plan.execution_id.to_string(),
                steps_json,
                status_to_str(plan.status).to_string(),
                plan.created_at.to_rfc3339(),
                plan.expires_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<RollbackPlan, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, execution_id, steps_json, status, created_at, expires_at
                 FROM rollback_plans WHERE id = ?1",
                params![id.to_string()],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("rollback plan {id}")))?;
        map_rollback_row(row)
    }

    #[instrument(skip(self))]
    pub async fn mark_executed(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE rollback_plans SET status = 'executed' WHERE id = ?1",
            params![id.to_string()],
        )
        .await?;
        Ok(())
    }

    /// Marks any plan past its `expires_at` as expired, independent of
    /// whether it was ever executed. Run periodically by a background
    /// sweep so a stale plan is never offered for execution.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self) -> Result<u64, StoreError> {
        let conn = self.client.connection()?;
        let affected = conn
            .execute(
                "UPDATE rollback_plans SET status = 'expired' WHERE status = 'planned' AND expires_at < ?1",
                params![Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(affected)
    }
}

fn map_rollback_row(row: Row) -> Result<RollbackPlan, StoreError> {
    let id: String = row.get(0)?;
    let execution_id: String = row.get(1)?;
    let steps_json: String = row.get(2)?;
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let expires_at: String = row.get(5)?;

    let steps: Vec<RollbackStep> =
        serde_json::from_str(&steps_json).map_err(|e| StoreError::Mapping(e.to_string()))?;

    Ok(RollbackPlan {
        id: id.parse().map_err(|_| StoreError::Mapping("malformed rollback plan id".into()))?,
        execution_id: execution_id
            .parse()
            .map_err(|_| StoreError::Mapping("malformed execution_id".into()))?,
        steps,
        status: str_to_status(&status)?,
        created_at: created_at.parse().map_err(|_| StoreError::Mapping("malformed created_at".into()))?,
        expires_at: expires_at.parse().map_err(|_| StoreError::Mapping("malformed expires_at".into()))?,
    })
}

fn status_to_str(status: RollbackStatus) -> &'static str {
    match status {
        RollbackStatus::Planned => "planned",
        RollbackStatus::Executed => "executed",
        RollbackStatus::Expired => "expired",
    }
}

fn str_to_status(value: &str) -> Result<RollbackStatus, StoreError> {
    match value {
        "planned" => Ok(RollbackStatus::Planned),
        "executed" => Ok(RollbackStatus::Executed),
        "expired" => Ok(RollbackStatus::Expired),
        other => Err(StoreError::Mapping(format!("unknown rollback status {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreClient;

    async fn memory_repo() -> RollbackRepository {
        let client = StoreClient::connect(":memory:", None).await.expect("in-memory datastore");
        RollbackRepository::new(client)
    }

    fn sample_plan(expires_at: chrono::DateTime<Utc>) -> RollbackPlan {
        RollbackPlan {
            id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            steps: vec![RollbackStep {
                order: 1,
                command: "kubectl scale deployment payments --replicas=2".to_string(),
            }],
            status: RollbackStatus::Planned,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_steps_in_order() {
        let repo = memory_repo().await;
        let plan = sample_plan(Utc::now() + chrono::Duration::hours(24));
        repo.insert(&plan).await.unwrap();

        let fetched = repo.get(plan.id).await.unwrap();
        assert_eq!(fetched.status, RollbackStatus::Planned);
        assert_eq!(fetched.steps.len(), 1);
        assert_eq!(fetched.steps[0].order, 1);
    }

    #[tokio::test]
    async fn mark_executed_transitions_status() {
        let repo = memory_repo().await;
        let plan = sample_plan(Utc::now() + chrono::Duration::hours(24));
        repo.insert(&plan).await.unwrap();

        repo.mark_executed(plan.id).await.unwrap();
        let fetched = repo.get(plan.id).await.unwrap();
        assert_eq!(fetched.status, RollbackStatus::Executed);
    }

    #[tokio::test]
    async fn expire_stale_only_touches_planned_plans_past_their_expiry() {
        let repo = memory_repo().await;
        let stale = sample_plan(Utc::now() - chrono::Duration::hours(1));
        let fresh = sample_plan(Utc::now() + chrono::Duration::hours(1));
        let already_executed = sample_plan(Utc::now() - chrono::Duration::hours(1));
        repo.insert(&stale).await.unwrap();
        repo.insert(&fresh).await.unwrap();
        repo.insert(&already_executed).await.unwrap();
        repo.mark_executed(already_executed.id).await.unwrap();

        let affected = repo.expire_stale().await.unwrap();
        assert_eq!(affected, 1);

        assert_eq!(repo.get(stale.id).await.unwrap().status, RollbackStatus::Expired);
        assert_eq!(repo.get(fresh.id).await.unwrap().status, RollbackStatus::Planned);
        assert_eq!(repo.get(already_executed.id).await.unwrap().status, RollbackStatus::Executed);
    }
}
