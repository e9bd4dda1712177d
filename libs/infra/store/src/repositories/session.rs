// [libs/infra/store/src/repositories/session.rs]
/*!
 * =================================================================
 * APARATO: IDENTITY & SESSION REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE CUENTAS Y SESIONES AUTENTICADAS
 * =================================================================
 */

use crate::client::StoreClient;
use crate::errors::StoreError;
use chrono::{DateTime, Duration, Utc};
use libsql::params;
use meridian_crypto::password::{hash_password, verify_password};
use meridian_domain::identity::{Environment, Identity, Role, Session};
use std::collections::HashSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Consecutive failed logins after which the account enters a cooldown.
const MAX_CONSECUTIVE_FAILURES: i64 = 5;
const LOCKOUT_HOURS: i64 = 24;

pub struct SessionRepository {
    client: StoreClient,
}

impl SessionRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, password), fields(display_name))]
    pub async fn register(
        &self,
        display_name: &str,
        password: &str,
        role: Role,
        environment: Environment,
        permissions: HashSet<String>,
    ) -> Result<Identity, StoreError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        let password_hash = hash_password(password)
            .map_err(|e| StoreError::Mapping(format!("password hashing failed: {e}")))?;
        let permissions_json = serde_json::to_string(&permissions)
            .map_err(|e| StoreError::Mapping(e.to_string()))?;

        conn.execute(
            "INSERT INTO identities (id, display_name, role, permissions_json, environment, password_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                display_name.to_string(),
                role_to_str(role).to_string(),
                permissions_json,
                environment_to_str(environment).to_string(),
                password_hash,
            ],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                StoreError::Conflict(format!("display name {display_name} already registered"))
            } else {
                StoreError::Query(e)
            }
        })?;

        info!(%id, "identity registered");
        Ok(Identity {
            id,
            display_name: display_name.to_string(),
            role,
            permissions,
            environment,
        })
    }

    #[instrument(skip(self, password), fields(display_name))]
    pub async fn login(&self, display_name: &str, password: &str) -> Result<Identity, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, role, permissions_json, environment, password_hash, failed_login_count, cooldown_until
                 FROM identities WHERE display_name = ?1",
                params![display_name.to_string()],
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::InvalidCredentials)?;

        let id: String = row.get(0)?;
        let role_str: String = row.get(1)?;
        let permissions_json: String = row.get(2)?;
        let environment_str: String = row.get(3)?;
        let password_hash: String = row.get(4)?;
        let failed_login_count: i64 = row.get(5)?;
        let cooldown_until: Option<String> = row.get(6)?;

        if let Some(cooldown_raw) = &cooldown_until {
            let cooldown_at: DateTime<Utc> = cooldown_raw
                .parse()
                .map_err(|_| StoreError::Mapping("malformed cooldown_until".into()))?;
            if Utc::now() < cooldown_at {
                return Err(StoreError::AccountLockedOut(cooldown_raw.clone()));
            }
        }

        let verified = verify_password(password, &password_hash)
            .map_err(|e| StoreError::Mapping(format!("password verification failed: {e}")))?;

        if !verified {
            self.record_failed_login(display_name, failed_login_count + 1).await?;
            return Err(StoreError::InvalidCredentials);
        }

        conn.execute(
            "UPDATE identities SET failed_login_count = 0, cooldown_until = NULL, updated_at = CURRENT_TIMESTAMP
             WHERE display_name = ?1",
            params![display_name.to_string()],
        )
        .await?;

        let permissions: HashSet<String> = serde_json::from_str(&permissions_json)
            .map_err(|e| StoreError::Mapping(e.to_string()))?;

        Ok(Identity {
            id: id.parse().map_err(|_| StoreError::Mapping("malformed identity id".into()))?,
            display_name: display_name.to_string(),
            role: str_to_role(&role_str)?,
            permissions,
            environment: str_to_environment(&environment_str)?,
        })
    }

    /// Reconstructs the full `Identity` (including permissions) for a
    /// session's owner. `Session` itself only carries `role`/`environment`,
    /// snapshotted at issue time, so authenticated requests resolve the
    /// current permission set through here instead.
    #[instrument(skip(self))]
    pub async fn get_identity(&self, id: Uuid) -> Result<Identity, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT display_name, role, permissions_json, environment FROM identities WHERE id = ?1",
                params![id.to_string()],
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("identity {id}")))?;

        let display_name: String = row.get(0)?;
        let role_str: String = row.get(1)?;
        let permissions_json: String = row.get(2)?;
        let environment_str: String = row.get(3)?;

        let permissions: HashSet<String> =
            serde_json::from_str(&permissions_json).map_err(|e| StoreError::Mapping(e.to_string()))?;

        Ok(Identity {
            id,
            display_name,
            role: str_to_role(&role_str)?,
            permissions,
            environment: str_to_environment(&environment_str)?,
        })
    }

    async fn record_failed_login(&self, display_name: &str, new_count: i64) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        if new_count >= MAX_CONSECUTIVE_FAILURES {
            let cooldown_until = Utc::now() + Duration::hours(LOCKOUT_HOURS);
            warn!(display_name, "account locked after consecutive failed logins");
            conn.execute(
                "UPDATE identities SET failed_login_count = ?2, cooldown_until = ?3, updated_at = CURRENT_TIMESTAMP
                 WHERE display_name = ?1",
                params![display_name.to_string(), new_count, cooldown_until.to_rfc3339()],
            )
            .await?;
        } else {
            conn.execute(
                "UPDATE identities SET failed_login_count = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE display_name = ?1",
                params![display_name.to_string(), new_count],
            )
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_session(&self, identity: &Identity, ttl_hours: i64) -> Result<Session, StoreError> {
        let conn = self.client.connection()?;
        let session = Session {
            id: Uuid::new_v4(),
            owner_id: identity.id,
            role: identity.role,
            environment: identity.environment,
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(ttl_hours),
            last_seen_address: None,
            agent: None,
            revoked: false,
        };

        conn.execute(
            "INSERT INTO sessions (id, owner_id, role, environment, issued_at, expires_at, revoked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                session.id.to_string(),
                session.owner_id.to_string(),
                role_to_str(session.role).to_string(),
                environment_to_str(session.environment).to_string(),
                session.issued_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(session)
    }

    #[instrument(skip(self))]
    pub async fn get_session(&self, session_id: Uuid) -> Result<Session, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, owner_id, role, environment, issued_at, expires_at, last_seen_address, agent, revoked
                 FROM sessions WHERE id = ?1",
                params![session_id.to_string()],
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;

        map_session_row(row)
    }

    #[instrument(skip(self))]
    pub async fn revoke_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE sessions SET revoked = 1 WHERE id = ?1",
            params![session_id.to_string()],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn refresh_session(&self, session_id: Uuid, ttl_hours: i64) -> Result<Session, StoreError> {
        let conn = self.client.connection()?;
        let new_expiry = Utc::now() + Duration::hours(ttl_hours);
        conn.execute(
            "UPDATE sessions SET expires_at = ?2 WHERE id = ?1 AND revoked = 0",
            params![session_id.to_string(), new_expiry.to_rfc3339()],
        )
        .await?;
        self.get_session(session_id).await
    }

    /// Deletes sessions past their expiry (or revoked) and returns how many
    /// rows were reaped. Run periodically by a background sweep.
    #[instrument(skip(self))]
    pub async fn cleanup_expired(&self) -> Result<u64, StoreError> {
        let conn = self.client.connection()?;
        let affected = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1 OR revoked = 1",
                params![Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(affected)
    }
}

fn map_session_row(row: libsql::Row) -> Result<Session, StoreError> {
    let id: String = row.get(0)?;
    let owner_id: String = row.get(1)?;
    let role_str: String = row.get(2)?;
    let environment_str: String = row.get(3)?;
    let issued_at: String = row.get(4)?;
    let expires_at: String = row.get(5)?;
    let last_seen_address: Option<String> = row.get(6)?;
    let agent: Option<String> = row.get(7)?;
    let revoked: i64 = row.get(8)?;

    Ok(Session {
        id: id.parse().map_err(|_| StoreError::Mapping("malformed session id".into()))?,
        owner_id: owner_id.parse().map_err(|_| StoreError::Mapping("malformed owner id".into()))?,
        role: str_to_role(&role_str)?,
        environment: str_to_environment(&environment_str)?,
        issued_at: issued_at.parse().map_err(|_| StoreError::Mapping("malformed issued_at".into()))?,
        expires_at: expires_at.parse().map_err(|_| StoreError::Mapping("malformed expires_at".into()))?,
        last_seen_address,
        agent,
        revoked: revoked != 0,
    })
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Operator => "operator",
        Role::Developer => "developer",
        Role::Viewer => "viewer",
    }
}

fn str_to_role(value: &str) -> Result<Role, StoreError> {
    match value {
        "admin" => Ok(Role::Admin),
        "operator" => Ok(Role::Operator),
        "developer" => Ok(Role::Developer),
        "viewer" => Ok(Role::Viewer),
        other => Err(StoreError::Mapping(format!("unknown role {other}"))),
    }
}

fn environment_to_str(environment: Environment) -> &'static str {
    match environment {
        Environment::Dev => "dev",
        Environment::Staging => "staging",
        Environment::Production => "production",
    }
}

fn str_to_environment(value: &str) -> Result<Environment, StoreError> {
    match value {
        "dev" => Ok(Environment::Dev),
        "staging" => Ok(Environment::Staging),
        "production" => Ok(Environment::Production),
        other => Err(StoreError::Mapping(format!("unknown environment {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreClient;

    async fn memory_repo() -> SessionRepository {
        let client = StoreClient::connect(":memory:", None).await.expect("in-memory datastore");
        SessionRepository::new(client)
    }

    #[tokio::test]
    async fn register_then_login_round_trips_the_identity() {
        let repo = memory_repo().await;
        let registered = repo
            .register("alice", "correct-horse-battery-staple", Role::Operator, Environment::Dev, HashSet::new())
            .await
            .unwrap();

        let logged_in = repo.login("alice", "correct-horse-battery-staple").await.unwrap();
        assert_eq!(logged_in.id, registered.id);
        assert_eq!(logged_in.role, Role::Operator);
    }

    #[tokio::test]
    async fn duplicate_display_name_is_rejected() {
        let repo = memory_repo().await;
        repo.register("bob", "first-password-1", Role::Viewer, Environment::Dev, HashSet::new())
            .await
            .unwrap();
        let result = repo
            .register("bob", "second-password-2", Role::Viewer, Environment::Dev, HashSet::new())
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let repo = memory_repo().await;
        repo.register("carol", "the-real-password-9", Role::Viewer, Environment::Dev, HashSet::new())
            .await
            .unwrap();
        let result = repo.login("carol", "not-the-password").await;
        assert!(matches!(result, Err(StoreError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn five_consecutive_failures_lock_the_account_and_the_sixth_is_locked_out() {
        let repo = memory_repo().await;
        repo.register("dave", "the-real-password-9", Role::Viewer, Environment::Dev, HashSet::new())
            .await
            .unwrap();

        for _ in 0..5 {
            let result = repo.login("dave", "wrong-password").await;
            assert!(matches!(result, Err(StoreError::InvalidCredentials)));
        }

        // The sixth attempt (even with the correct password) finds the
        // account already in cooldown.
        let sixth = repo.login("dave", "the-real-password-9").await;
        assert!(matches!(sixth, Err(StoreError::AccountLockedOut(_))));
    }

    #[tokio::test]
    async fn successful_login_resets_the_failure_counter() {
        let repo = memory_repo().await;
        repo.register("erin", "the-real-password-9", Role::Viewer, Environment::Dev, HashSet::new())
            .await
            .unwrap();

        for _ in 0..3 {
            let _ = repo.login("erin", "wrong-password").await;
        }
        repo.login("erin", "the-real-password-9").await.unwrap();

        // Another 3 failures shouldn't trip the 5-failure lockout, since the
        // successful login above reset the counter to zero.
        for _ in 0..3 {
            let result = repo.login("erin", "wrong-password").await;
            assert!(matches!(result, Err(StoreError::InvalidCredentials)));
        }
    }

    #[tokio::test]
    async fn session_lifecycle_issue_revoke_and_cleanup() {
        let repo = memory_repo().await;
        let identity = repo
            .register("frank", "the-real-password-9", Role::Admin, Environment::Production, HashSet::new())
            .await
            .unwrap();

        let session = repo.create_session(&identity, 8).await.unwrap();
        assert!(!session.revoked);
        assert!(session.expires_at > session.issued_at);

        repo.revoke_session(session.id).await.unwrap();
        let revoked = repo.get_session(session.id).await.unwrap();
        assert!(revoked.revoked);

        // A revoked session is reaped by cleanup_expired regardless of its
        // expiry timestamp.
        let reaped = repo.cleanup_expired().await.unwrap();
        assert_eq!(reaped, 1);
        assert!(repo.get_session(session.id).await.is_err());
    }

    #[tokio::test]
    async fn refresh_extends_expiry_but_not_for_a_revoked_session() {
        let repo = memory_repo().await;
        let identity = repo
            .register("grace", "the-real-password-9", Role::Operator, Environment::Dev, HashSet::new())
            .await
            .unwrap();
        let session = repo.create_session(&identity, 1).await.unwrap();

        let refreshed = repo.refresh_session(session.id, 8).await.unwrap();
        assert!(refreshed.expires_at > session.expires_at);

        repo.revoke_session(session.id).await.unwrap();
        let before = repo.get_session(session.id).await.unwrap().expires_at;
        let after_attempt = repo.refresh_session(session.id, 24).await.unwrap();
        assert_eq!(after_attempt.expires_at, before);
    }

    #[tokio::test]
    async fn get_identity_reflects_the_live_permission_set() {
        let repo = memory_repo().await;
        let identity = repo
            .register("heidi", "the-real-password-9", Role::Developer, Environment::Staging, HashSet::new())
            .await
            .unwrap();

        let resolved = repo.get_identity(identity.id).await.unwrap();
        assert_eq!(resolved.display_name, "heidi");
        assert_eq!(resolved.role, Role::Developer);
    }
}
