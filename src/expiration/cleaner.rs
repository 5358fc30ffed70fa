use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::AppState;

/// Start the background task that reclaims expired session-cache entries.
///
/// Expired entries already read as absent, so this only frees storage.
pub fn start_session_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.sessions.sweep_interval_seconds);

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            run_sweep(&state).await;
        }
    })
}

/// One sweep pass. Returns how many entries were removed.
pub async fn run_sweep(state: &AppState) -> usize {
    debug!("Running session sweep");

    let db = state.db.clone();
    let now = state.clock.now();
    let result = tokio::task::spawn_blocking(move || db.delete_expired_sessions(now)).await;

    match result {
        Ok(Ok(count)) => {
            if count > 0 {
                debug!(sessions_cleaned = count, "Expired sessions cleaned");
            }
            count
        }
        Ok(Err(e)) => {
            error!(error = %e, "Failed to clean up expired sessions");
            0
        }
        Err(e) => {
            error!(error = %e, "Session sweep task panicked");
            0
        }
    }
}
