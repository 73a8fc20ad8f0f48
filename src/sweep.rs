use crate::state::{AppState, SWEEP_INTERVAL_SECS};
use std::time::Duration;

/// Spawn the background task that garbage-collects abandoned rooms.
///
/// A room is abandoned once it has neither a display nor a host attached and
/// has outlived the retention window; nobody is left to notify, so removal
/// is silent.
pub fn spawn_room_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        // The first tick completes immediately; skip it so a fresh server
        // doesn't sweep at startup.
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed = state.sweep_expired().await;
            if removed > 0 {
                tracing::info!(removed, "Swept abandoned rooms");
            }
        }
    });
}
