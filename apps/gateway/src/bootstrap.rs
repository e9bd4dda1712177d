// [apps/gateway/src/bootstrap.rs]
/*!
 * =================================================================
 * APARATO: STARTUP INTEGRITY CERTIFICATION
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (L3)
 * RESPONSABILIDAD: VERIFICACIÓN DE LA CADENA DE AUDITORÍA ANTES DE
 *                  AUTORIZAR TRÁFICO OPERATIVO
 * =================================================================
 */

use crate::state::AppState;
use meridian_store::StoreError;
use tracing::{error, info, instrument};

/// Runs off the request path so the health endpoint can answer (in
/// `Maintenance`) while a large chain is still being walked.
pub struct Bootstrap;

impl Bootstrap {
    #[instrument(skip(state))]
    pub fn spawn_diagnostics(state: AppState) {
        tokio::spawn(async move {
            info!("verifying audit chain continuity before accepting traffic");
            match Self::verify_chain(&state).await {
                Ok(violations) if violations.is_empty() => {
                    info!("audit chain is intact, entering operational mode");
                    state.resume_operational();
                }
                Ok(violations) => {
                    let reason = format!("audit chain integrity violated: {} mismatched entr{}", violations.len(), if violations.len() == 1 { "y" } else { "ies" });
                    error!(reason, "startup certification failed");
                    state.enter_maintenance(reason);
                }
                Err(err) => {
                    let reason = format!("audit chain could not be verified: {err}");
                    error!(reason);
                    state.enter_maintenance(reason);
                }
            }
        });
    }

    /// Walks the live chain from its genesis anchor (the empty-string
    /// checksum recorded for the very first entry) through to whatever the
    /// latest row is. An empty chain trivially passes.
    async fn verify_chain(state: &AppState) -> Result<Vec<meridian_domain::audit::IntegrityViolation>, StoreError> {
        // `range`/`verify` bind ids as SQLite i64 parameters; `u64::MAX`
        // would wrap negative and match nothing, so cap at `i64::MAX`.
        state.audit.verify(1, i64::MAX as u64, "").await
    }
}
