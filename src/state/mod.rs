mod answer;
mod game;
mod party;
mod room;
mod round;
mod session;

use crate::auth::HostAuth;
use crate::judge::AnswerJudge;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

pub use room::{ROOM_RETENTION_SECS, SWEEP_INTERVAL_SECS};

/// A live client connection and its room/role binding.
///
/// The binding starts empty; a join or authenticate message fills it in.
pub struct Connection {
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    pub room: Option<RoomCode>,
    pub role: Option<Role>,
    /// Roster identity for party players.
    pub player_id: Option<PlayerId>,
}

/// One game room: the authoritative state plus its attached connections.
///
/// Rooms are owned exclusively by [`AppState`]; every mutation goes through
/// an `AppState` method that holds the room registry's write lock for the
/// whole transition, so commands against a room are atomic.
pub struct Room {
    pub code: RoomCode,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub display_conn: Option<ConnectionId>,
    pub host_conn: Option<ConnectionId>,
    /// Roster identity -> connection, for unicasting to party players.
    pub player_conns: HashMap<PlayerId, ConnectionId>,
    pub game: GameState,
}

impl Room {
    fn new(code: RoomCode) -> Self {
        Self {
            code,
            created_at: chrono::Utc::now(),
            display_conn: None,
            host_conn: None,
            player_conns: HashMap::new(),
            game: GameState::new(),
        }
    }

    /// Every connection currently joined to this room.
    fn member_conns(&self) -> Vec<ConnectionId> {
        self.display_conn
            .iter()
            .chain(self.host_conn.iter())
            .chain(self.player_conns.values())
            .cloned()
            .collect()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomCode, Room>>>,
    pub connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
    pub judge: Option<Arc<dyn AnswerJudge>>,
    pub host_auth: Arc<HostAuth>,
}

impl AppState {
    pub fn new(host_auth: HostAuth) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            judge: None,
            host_auth: Arc::new(host_auth),
        }
    }

    pub fn new_with_judge(host_auth: HostAuth, judge: Arc<dyn AnswerJudge>) -> Self {
        Self {
            judge: Some(judge),
            ..Self::new(host_auth)
        }
    }

    /// Register a fresh, unbound connection. Called once per WebSocket.
    pub async fn register_connection(&self, tx: mpsc::UnboundedSender<ServerMessage>) -> ConnectionId {
        let id = ulid::Ulid::new().to_string();
        self.connections.write().await.insert(
            id.clone(),
            Connection {
                tx,
                room: None,
                role: None,
                player_id: None,
            },
        );
        id
    }

    /// Unicast to one connection. Send errors mean the peer is already gone
    /// and are ignored; disconnect cleanup handles the rest.
    pub async fn send_to(&self, conn_id: &ConnectionId, msg: ServerMessage) {
        let connections = self.connections.read().await;
        if let Some(conn) = connections.get(conn_id) {
            let _ = conn.tx.send(msg);
        }
    }

    /// Fan a message out to every member of a room.
    ///
    /// Callers hold the room registry lock, which keeps the fan-out ordered
    /// with respect to the transition that produced it.
    pub(crate) async fn broadcast_room(&self, room: &Room, msg: ServerMessage) {
        let members = room.member_conns();
        let connections = self.connections.read().await;
        for conn_id in members {
            if let Some(conn) = connections.get(&conn_id) {
                let _ = conn.tx.send(msg.clone());
            }
        }
    }

    /// Unicast to the room's host connection, if any.
    pub(crate) async fn send_to_room_host(&self, room: &Room, msg: ServerMessage) {
        if let Some(host_conn) = &room.host_conn {
            self.send_to(host_conn, msg).await;
        }
    }

    /// Unicast to a party player's connection, if still attached.
    pub(crate) async fn send_to_room_player(
        &self,
        room: &Room,
        player_id: &PlayerId,
        msg: ServerMessage,
    ) {
        if let Some(conn_id) = room.player_conns.get(player_id) {
            self.send_to(conn_id, msg).await;
        }
    }
}
