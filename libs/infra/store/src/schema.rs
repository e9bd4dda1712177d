// [libs/infra/store/src/schema.rs]
/*!
 * =================================================================
 * APARATO: DATABASE SCHEMA
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA
 * =================================================================
 */

use crate::errors::StoreError;
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

const TABLES: &[(&str, &str)] = &[
    ("identities", r#"
        CREATE TABLE IF NOT EXISTS identities (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,
            permissions_json TEXT NOT NULL DEFAULT '[]',
            environment TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            failed_login_count INTEGER NOT NULL DEFAULT 0,
            cooldown_until DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(display_name)
        );
    "#),
    ("sessions", r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            role TEXT NOT NULL,
            environment TEXT NOT NULL,
            issued_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL,
            last_seen_address TEXT,
            agent TEXT,
            revoked INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("executions", r#"
        CREATE TABLE IF NOT EXISTS executions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            command TEXT NOT NULL,
            status TEXT NOT NULL,
            output TEXT,
            exit_code INTEGER,
            failure_kind TEXT,
            started_at DATETIME,
            completed_at DATETIME,
            approved_by TEXT,
            rollback_plan_id TEXT,
            correlation_id TEXT NOT NULL,
            resource_name TEXT,
            previous_replicas INTEGER
        );
    "#),
    ("rollback_plans", r#"
        CREATE TABLE IF NOT EXISTS rollback_plans (
            id TEXT PRIMARY KEY,
            execution_id TEXT NOT NULL,
            steps_json TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL
        );
    "#),
    ("audit_entries", r#"
        CREATE TABLE IF NOT EXISTS audit_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp DATETIME NOT NULL,
            actor_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            query TEXT NOT NULL,
            command TEXT NOT NULL,
            classification TEXT NOT NULL,
            status TEXT NOT NULL,
            cluster_context TEXT NOT NULL,
            namespace_context TEXT NOT NULL,
            risk_score REAL NOT NULL,
            checksum TEXT NOT NULL,
            previous_checksum TEXT NOT NULL,
            correlation_id TEXT NOT NULL,
            address TEXT NOT NULL,
            agent TEXT NOT NULL,
            category TEXT NOT NULL
        );
    "#),
    ("archive_batches", r#"
        CREATE TABLE IF NOT EXISTS archive_batches (
            id TEXT PRIMARY KEY,
            archived_through_id INTEGER NOT NULL,
            terminator_checksum TEXT NOT NULL,
            archived_at DATETIME NOT NULL
        );
    "#),
    ("audit_archive", r#"
        CREATE TABLE IF NOT EXISTS audit_archive (
            id INTEGER PRIMARY KEY,
            timestamp DATETIME NOT NULL,
            actor_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            query TEXT NOT NULL,
            command TEXT NOT NULL,
            classification TEXT NOT NULL,
            status TEXT NOT NULL,
            cluster_context TEXT NOT NULL,
            namespace_context TEXT NOT NULL,
            risk_score REAL NOT NULL,
            checksum TEXT NOT NULL,
            previous_checksum TEXT NOT NULL,
            correlation_id TEXT NOT NULL,
            address TEXT NOT NULL,
            agent TEXT NOT NULL,
            category TEXT NOT NULL,
            batch_id TEXT NOT NULL
        );
    "#),
    ("archive_session", r#"
        CREATE TABLE IF NOT EXISTS archive_session (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            active INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("schema_migrations", r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            identifier TEXT PRIMARY KEY,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_audit_actor_timestamp", "CREATE INDEX IF NOT EXISTS idx_audit_actor_timestamp ON audit_entries(actor_id, timestamp);"),
    ("idx_audit_classification_timestamp", "CREATE INDEX IF NOT EXISTS idx_audit_classification_timestamp ON audit_entries(classification, timestamp);"),
    ("idx_audit_status_timestamp", "CREATE INDEX IF NOT EXISTS idx_audit_status_timestamp ON audit_entries(status, timestamp);"),
    ("idx_sessions_owner", "CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id);"),
    ("idx_executions_owner", "CREATE INDEX IF NOT EXISTS idx_executions_owner ON executions(owner_id);"),
    ("idx_executions_session", "CREATE INDEX IF NOT EXISTS idx_executions_session ON executions(session_id);"),
    ("idx_rollback_expires", "CREATE INDEX IF NOT EXISTS idx_rollback_expires ON rollback_plans(expires_at);"),
];

/// Triggers that make the audit table append-only: any UPDATE aborts
/// unconditionally, and DELETE aborts unless `archive_session.active` is
/// set, the narrow gate `AuditRepository::archive_through` opens for the
/// span of its own transaction to move expired rows into `audit_archive`.
const TRIGGERS: &[(&str, &str)] = &[
    ("trg_audit_no_update", r#"
        CREATE TRIGGER IF NOT EXISTS trg_audit_no_update
        BEFORE UPDATE ON audit_entries
        BEGIN
            SELECT RAISE(ABORT, 'audit_entries is append-only: UPDATE rejected');
        END;
    "#),
    ("trg_audit_no_delete", r#"
        CREATE TRIGGER IF NOT EXISTS trg_audit_no_delete
        BEFORE DELETE ON audit_entries
        WHEN (SELECT active FROM archive_session WHERE id = 1) = 0
        BEGIN
            SELECT RAISE(ABORT, 'audit_entries is append-only: DELETE rejected outside an archive sweep');
        END;
    "#),
];

#[instrument(skip(connection))]
pub async fn apply_schema(connection: &Connection) -> Result<(), StoreError> {
    info!("applying datastore schema");
    create_tables(connection).await?;
    create_indexes(connection).await?;
    create_triggers(connection).await?;
    seed_archive_session(connection).await?;
    info!("schema is current");
    Ok(())
}

/// Ensures the single-row gate `trg_audit_no_delete` reads exists, so an
/// archive sweep on a fresh database has a row to flip rather than an
/// always-false subquery.
async fn seed_archive_session(db: &Connection) -> Result<(), StoreError> {
    db.execute(
        "INSERT OR IGNORE INTO archive_session (id, active) VALUES (1, 0)",
        (),
    )
    .await
    .map_err(|e| StoreError::Connection(format!("failed to seed archive_session: {e}")))?;
    Ok(())
}

async fn create_tables(db: &Connection) -> Result<(), StoreError> {
    for (name, sql) in TABLES {
        debug!(table = *name, "creating table");
        db.execute(sql, ()).await.map_err(|e| {
            StoreError::Connection(format!("failed to create table {name}: {e}"))
        })?;
    }
    Ok(())
}

async fn create_indexes(db: &Connection) -> Result<(), StoreError> {
    for (name, sql) in INDEXES {
        db.execute(sql, ()).await.map_err(|e| {
            StoreError::Connection(format!("failed to create index {name}: {e}"))
        })?;
    }
    Ok(())
}

async fn create_triggers(db: &Connection) -> Result<(), StoreError> {
    for (name, sql) in TRIGGERS {
        match db.execute(sql, ()).await {
            Ok(_) => debug!(trigger = *name, "trigger installed"),
            Err(e) => warn!(trigger = *name, error = %e, "trigger install skipped"),
        }
    }
    Ok(())
}
