//! Session and role management
//!
//! Binds connections to `(room, role)` and enforces the single rule of the
//! authorization model: exactly one host connection per room, and only that
//! connection may drive the game.

use super::AppState;
use crate::protocol::ServerMessage;
use crate::types::*;

/// Errors resolved at the session boundary. They never reach the state
/// machine; each maps to a user-facing reply on the issuing connection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Invalid password")]
    InvalidCredentials,
    #[error("Another host is already connected")]
    HostConflict,
    #[error("{0}")]
    Validation(String),
}

impl AppState {
    /// Explicit create-room call: makes a room and binds the caller as its
    /// display in one step.
    pub async fn create_room_for_display(&self, conn_id: &ConnectionId) -> Option<ServerMessage> {
        let code = self.create_room().await;

        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&code)?;
        room.display_conn = Some(conn_id.clone());

        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get_mut(conn_id) {
            conn.room = Some(code.clone());
            conn.role = Some(Role::Display);
        }

        tracing::info!(room = %room.code, "Display created room");
        Some(ServerMessage::RoomCreated {
            room_code: code,
            game_state: room.game.clone(),
        })
    }

    /// Attach a display to an existing room, replacing any previous display.
    pub async fn join_display(&self, conn_id: &ConnectionId, raw_code: &str) -> Option<ServerMessage> {
        let Some(code) = self.lookup_room(raw_code).await else {
            return Some(error_reply(SessionError::RoomNotFound));
        };

        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&code)?;

        let previous = room.display_conn.replace(conn_id.clone());

        let mut connections = self.connections.write().await;
        // The replaced display, if any, is no longer a member of the room.
        if let Some(prev_id) = previous.filter(|prev| prev != conn_id) {
            if let Some(prev_conn) = connections.get_mut(&prev_id) {
                prev_conn.room = None;
                prev_conn.role = None;
            }
        }
        if let Some(conn) = connections.get_mut(conn_id) {
            conn.room = Some(code.clone());
            conn.role = Some(Role::Display);
        }

        tracing::info!(room = %code, "Display joined");
        Some(ServerMessage::Joined {
            room_code: code,
            game_state: room.game.clone(),
        })
    }

    /// Authenticate a host against the shared secret.
    ///
    /// A conflicting live host produces a distinct failure that tells the
    /// caller a forced takeover is available.
    pub async fn authenticate_host(
        &self,
        conn_id: &ConnectionId,
        raw_code: &str,
        password: &str,
    ) -> Option<ServerMessage> {
        self.bind_host(conn_id, raw_code, password, false).await
    }

    /// Authenticate and forcibly evict any current host.
    pub async fn take_over_host(
        &self,
        conn_id: &ConnectionId,
        raw_code: &str,
        password: &str,
    ) -> Option<ServerMessage> {
        self.bind_host(conn_id, raw_code, password, true).await
    }

    async fn bind_host(
        &self,
        conn_id: &ConnectionId,
        raw_code: &str,
        password: &str,
        force: bool,
    ) -> Option<ServerMessage> {
        let Some(code) = self.lookup_room(raw_code).await else {
            return Some(auth_failure(SessionError::RoomNotFound));
        };

        if !self.host_auth.validate(password) {
            return Some(auth_failure(SessionError::InvalidCredentials));
        }

        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&code)?;

        let evicted = match &room.host_conn {
            Some(existing) if existing != conn_id => {
                if !force {
                    return Some(ServerMessage::HostAuthResult {
                        success: false,
                        error: Some(SessionError::HostConflict.to_string()),
                        can_take_over: Some(true),
                        game_state: None,
                    });
                }
                Some(existing.clone())
            }
            _ => None,
        };

        room.host_conn = Some(conn_id.clone());

        let mut connections = self.connections.write().await;
        if let Some(old_id) = evicted {
            if let Some(old_conn) = connections.get_mut(&old_id) {
                old_conn.room = None;
                old_conn.role = None;
                let _ = old_conn.tx.send(ServerMessage::HostDisconnected {
                    reason: "Another host took over".to_string(),
                });
            }
            tracing::info!(room = %code, "Host takeover");
        }
        if let Some(conn) = connections.get_mut(conn_id) {
            conn.room = Some(code.clone());
            conn.role = Some(Role::Host);
        }
        drop(connections);

        tracing::info!(room = %code, "Host authenticated");
        self.broadcast_room(room, ServerMessage::HostConnected).await;

        Some(ServerMessage::HostAuthResult {
            success: true,
            error: None,
            can_take_over: None,
            game_state: Some(room.game.clone()),
        })
    }

    /// Add a party player to a room's roster.
    pub async fn join_player(
        &self,
        conn_id: &ConnectionId,
        raw_code: &str,
        player_name: &str,
    ) -> Option<ServerMessage> {
        let name = player_name.trim();
        if name.is_empty() {
            return Some(player_error(SessionError::Validation(
                "Please enter your name".to_string(),
            )));
        }

        let Some(code) = self.lookup_room(raw_code).await else {
            return Some(player_error(SessionError::RoomNotFound));
        };

        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&code)?;

        let player = PartyPlayer {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            team: None,
            connected: true,
        };
        room.game.players.push(player.clone());
        room.player_conns.insert(player.id.clone(), conn_id.clone());

        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get_mut(conn_id) {
            conn.room = Some(code.clone());
            conn.role = Some(Role::Player);
            conn.player_id = Some(player.id.clone());
        }
        drop(connections);

        tracing::info!(room = %code, player = %player.name, "Player joined");
        self.broadcast_room(
            room,
            ServerMessage::PlayersUpdated {
                players: room.game.players.clone(),
            },
        )
        .await;

        Some(ServerMessage::PlayerJoined {
            player_id: player.id,
            game_state: room.game.clone(),
        })
    }

    /// Full-state pull; any room member may resynchronize at any time.
    pub async fn request_state(&self, conn_id: &ConnectionId) -> Option<ServerMessage> {
        let code = {
            let connections = self.connections.read().await;
            connections.get(conn_id)?.room.clone()?
        };
        let game_state = self.game_state(&code).await?;
        Some(ServerMessage::GameStateFull { game_state })
    }

    /// Room code of the room this connection hosts, or None.
    ///
    /// This is the whole authorization model: a host command from any
    /// connection that fails this check is silently dropped.
    pub async fn host_room(&self, conn_id: &ConnectionId) -> Option<RoomCode> {
        let connections = self.connections.read().await;
        let conn = connections.get(conn_id)?;
        if conn.role != Some(Role::Host) {
            return None;
        }
        conn.room.clone()
    }

    /// Transport-level disconnect: unbind from the room and notify whoever
    /// remains.
    pub async fn handle_disconnect(&self, conn_id: &ConnectionId) {
        let removed = self.connections.write().await.remove(conn_id);
        let Some(conn) = removed else { return };
        let Some(code) = conn.room else { return };

        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&code) else { return };

        match conn.role {
            Some(Role::Host) if room.host_conn.as_ref() == Some(conn_id) => {
                room.host_conn = None;
                tracing::info!(room = %code, "Host disconnected");
                self.broadcast_room(
                    room,
                    ServerMessage::HostDisconnected {
                        reason: "Host disconnected".to_string(),
                    },
                )
                .await;
            }
            Some(Role::Display) if room.display_conn.as_ref() == Some(conn_id) => {
                room.display_conn = None;
                tracing::info!(room = %code, "Display disconnected");
            }
            Some(Role::Player) => {
                if let Some(player_id) = conn.player_id {
                    room.game.players.retain(|p| p.id != player_id);
                    room.player_conns.remove(&player_id);
                    tracing::info!(room = %code, "Player disconnected");
                    self.broadcast_room(
                        room,
                        ServerMessage::PlayersUpdated {
                            players: room.game.players.clone(),
                        },
                    )
                    .await;
                }
            }
            _ => {}
        }
    }
}

fn auth_failure(err: SessionError) -> ServerMessage {
    ServerMessage::HostAuthResult {
        success: false,
        error: Some(err.to_string()),
        can_take_over: None,
        game_state: None,
    }
}

fn player_error(err: SessionError) -> ServerMessage {
    ServerMessage::PlayerError {
        message: err.to_string(),
    }
}

fn error_reply(err: SessionError) -> ServerMessage {
    ServerMessage::Error {
        code: "ROOM_NOT_FOUND".to_string(),
        msg: err.to_string(),
    }
}
