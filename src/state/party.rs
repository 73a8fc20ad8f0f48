//! Party mode: individual players on their own devices
//!
//! Layered on the same room aggregate. Players join a roster, get split into
//! two teams, and face off pairwise; the host still drives every transition,
//! players only submit answers when battle membership and turn ownership
//! allow it (enforced in the answer orchestrator).

use super::AppState;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Start a party game: assign teams, reset the board, open the first
    /// battle in face-off mode.
    pub async fn party_game_start(
        &self,
        code: &RoomCode,
        team1_name: Option<String>,
        team2_name: Option<String>,
        total_rounds: Option<u32>,
    ) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        if g.players.len() < 2 {
            tracing::warn!(room = %code, "Party game needs at least two players");
            return;
        }

        // Alternate roster order across the two teams
        for (i, player) in g.players.iter_mut().enumerate() {
            player.team = Some(if i % 2 == 0 { 1 } else { 2 });
        }

        let team1: Vec<PlayerId> = team_ids(&g.players, 1);
        let team2: Vec<PlayerId> = team_ids(&g.players, 2);
        g.battle_pairs = team1
            .into_iter()
            .zip(team2)
            .map(|(team1_player, team2_player)| BattlePair {
                team1_player,
                team2_player,
            })
            .collect();

        g.team1_name = team1_name
            .map(|n| n.trim().to_uppercase())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_TEAM1_NAME.to_string());
        g.team2_name = team2_name
            .map(|n| n.trim().to_uppercase())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_TEAM2_NAME.to_string());
        g.total_rounds = total_rounds
            .unwrap_or(DEFAULT_TOTAL_ROUNDS)
            .clamp(MIN_TOTAL_ROUNDS, MAX_TOTAL_ROUNDS);

        g.team1_score = 0;
        g.team2_score = 0;
        g.current_round = 1;
        g.screen = Screen::Game;
        g.current_question = None;
        g.revealed_answers.clear();
        g.strikes = 0;
        g.entry_log.clear();
        g.round_points_earned = 0;
        g.used_question_indices.clear();
        g.correct_guesses_this_round.clear();
        g.last_winning_team = None;
        g.last_points_awarded = 0;
        g.timer = TimerState::default();
        g.question_seq += 1;

        g.party_mode = true;
        g.current_battle_index = 0;
        g.current_turn_player = None;
        g.face_off_active = true;

        tracing::info!(room = %code, players = g.players.len(), "Party game started");

        let snapshot = g.clone();
        let players = g.players.clone();
        let battle = current_battle_players(g);
        self.broadcast_room(
            room,
            ServerMessage::PartyGameStarted {
                game_state: snapshot,
            },
        )
        .await;
        self.broadcast_room(room, ServerMessage::TeamsUpdated { players })
            .await;
        self.broadcast_room(
            room,
            ServerMessage::BattleStarted {
                players: battle,
                battle_index: 0,
                face_off: true,
            },
        )
        .await;
    }

    /// Hand the answering turn to one of the two battling players.
    pub async fn party_set_turn(&self, code: &RoomCode, player_id: &str) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        if !g.party_mode {
            return;
        }

        let in_battle = g
            .battle_pairs
            .get(g.current_battle_index)
            .map(|pair| pair.team1_player == player_id || pair.team2_player == player_id)
            .unwrap_or(false);
        if !in_battle {
            return;
        }

        g.current_turn_player = Some(player_id.to_string());
        g.face_off_active = false;

        self.broadcast_room(
            room,
            ServerMessage::TurnChanged {
                player_id: player_id.to_string(),
            },
        )
        .await;
    }

    /// Advance to the next battle pair (wrapping) and reopen the face-off.
    pub async fn party_next_battle(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        if !g.party_mode || g.battle_pairs.is_empty() {
            return;
        }

        g.current_battle_index = (g.current_battle_index + 1) % g.battle_pairs.len();
        g.current_turn_player = None;
        g.face_off_active = true;

        let battle_index = g.current_battle_index;
        let battle = current_battle_players(g);
        self.broadcast_room(
            room,
            ServerMessage::BattleStarted {
                players: battle,
                battle_index,
                face_off: true,
            },
        )
        .await;
    }
}

fn team_ids(players: &[PartyPlayer], team: u8) -> Vec<PlayerId> {
    players
        .iter()
        .filter(|p| p.team == Some(team))
        .map(|p| p.id.clone())
        .collect()
}

fn current_battle_players(g: &GameState) -> Vec<PartyPlayer> {
    let Some(pair) = g.battle_pairs.get(g.current_battle_index) else {
        return Vec::new();
    };
    g.players
        .iter()
        .filter(|p| p.id == pair.team1_player || p.id == pair.team2_player)
        .cloned()
        .collect()
}
