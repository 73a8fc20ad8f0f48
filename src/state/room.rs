//! Room registry: creation, lookup, and garbage collection

use super::{AppState, Room};
use crate::types::RoomCode;
use std::str::FromStr;

/// Rooms with no display and no host older than this are swept.
pub const ROOM_RETENTION_SECS: u64 = 3600;
/// How often the sweeper runs.
pub const SWEEP_INTERVAL_SECS: u64 = 3600;

impl AppState {
    /// Create a new room with a fresh code and default state.
    ///
    /// Codes are random; on the off chance of a collision we just draw again.
    pub async fn create_room(&self) -> RoomCode {
        let mut rooms = self.rooms.write().await;

        let code = loop {
            let candidate = RoomCode::generate();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        tracing::info!(room = %code, "Room created");
        rooms.insert(code.clone(), Room::new(code.clone()));
        code
    }

    /// Case-insensitive room lookup, returning the normalized code.
    pub async fn lookup_room(&self, raw_code: &str) -> Option<RoomCode> {
        let code = RoomCode::from_str(raw_code).ok()?;
        let rooms = self.rooms.read().await;
        rooms.contains_key(&code).then_some(code)
    }

    /// Snapshot of a room's game state, if the room exists.
    pub async fn game_state(&self, code: &RoomCode) -> Option<crate::types::GameState> {
        let rooms = self.rooms.read().await;
        rooms.get(code).map(|room| room.game.clone())
    }

    /// Remove abandoned rooms: older than the retention window with neither
    /// a display nor a host attached. Nobody is left to notify.
    pub async fn sweep_expired(&self) -> usize {
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(ROOM_RETENTION_SECS as i64);
        let mut rooms = self.rooms.write().await;

        let before = rooms.len();
        rooms.retain(|code, room| {
            let abandoned = room.display_conn.is_none()
                && room.host_conn.is_none()
                && room.created_at < cutoff;
            if abandoned {
                tracing::info!(room = %code, "Sweeping abandoned room");
            }
            !abandoned
        });

        before - rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_create_room_registers_default_state() {
        let state = state_with_password("pw");
        let code = state.create_room().await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.screen, crate::types::Screen::Qr);
        assert_eq!(game.team1_score, 0);
    }

    #[tokio::test]
    async fn test_lookup_room_case_insensitive() {
        let state = state_with_password("pw");
        let code = state.create_room().await;

        let lower = code.as_str().to_ascii_lowercase();
        assert_eq!(state.lookup_room(&lower).await, Some(code));
    }

    #[tokio::test]
    async fn test_lookup_room_missing() {
        let state = state_with_password("pw");
        assert!(state.lookup_room("ZZZZZZ").await.is_none());
        assert!(state.lookup_room("not a code").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_young_rooms() {
        let state = state_with_password("pw");
        state.create_room().await;

        assert_eq!(state.sweep_expired().await, 0);
        assert_eq!(state.rooms.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_aged_memberless_rooms() {
        let state = state_with_password("pw");
        let code = state.create_room().await;

        // Backdate past the retention window
        {
            let mut rooms = state.rooms.write().await;
            rooms.get_mut(&code).unwrap().created_at =
                chrono::Utc::now() - chrono::Duration::seconds(ROOM_RETENTION_SECS as i64 + 60);
        }

        assert_eq!(state.sweep_expired().await, 1);
        assert!(state.rooms.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_spares_rooms_with_members() {
        let state = state_with_password("pw");
        let code = state.create_room().await;
        let (conn_id, _rx) = connect(&state).await;

        {
            let mut rooms = state.rooms.write().await;
            let room = rooms.get_mut(&code).unwrap();
            room.created_at =
                chrono::Utc::now() - chrono::Duration::seconds(ROOM_RETENTION_SECS as i64 + 60);
            room.display_conn = Some(conn_id);
        }

        assert_eq!(state.sweep_expired().await, 0);
        assert_eq!(state.rooms.read().await.len(), 1);
    }
}
