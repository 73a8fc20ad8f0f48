//! Host-driven game state transitions
//!
//! Every method here is invoked only after the dispatcher has resolved the
//! issuing connection to the room it hosts; the methods themselves assume
//! authorization and focus on keeping the state invariants.

use super::AppState;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Begin a new game: fresh scores and round counters, game screen.
    pub async fn start_game(
        &self,
        code: &RoomCode,
        team1_name: String,
        team2_name: String,
        total_rounds: u32,
    ) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        let team1 = normalize_team_name(team1_name, DEFAULT_TEAM1_NAME);
        let team2 = normalize_team_name(team2_name, DEFAULT_TEAM2_NAME);

        g.team1_name = team1;
        g.team2_name = team2;
        g.team1_score = 0;
        g.team2_score = 0;
        g.total_rounds = total_rounds.clamp(MIN_TOTAL_ROUNDS, MAX_TOTAL_ROUNDS);
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

        tracing::info!(room = %code, "Game started");
        let snapshot = g.clone();
        self.broadcast_room(room, ServerMessage::GameStarted { game_state: snapshot })
            .await;
    }

    /// Swap in a new question and clear all per-round state.
    ///
    /// The round counter only advances when the host asks for it and the cap
    /// has not been reached. The full question (answers included) goes to
    /// every role, matching the wire format the clients expect.
    pub async fn load_question(
        &self,
        code: &RoomCode,
        mut question: Question,
        increment_round: bool,
        question_index: Option<usize>,
    ) {
        if question.question.trim().is_empty() || question.answers.is_empty() {
            return;
        }
        question.sort_answers();

        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        if increment_round && g.current_round < g.total_rounds {
            g.current_round += 1;
        }

        if let Some(idx) = question_index {
            if !g.used_question_indices.contains(&idx) {
                g.used_question_indices.push(idx);
            }
        }

        g.current_question = Some(question.clone());
        g.revealed_answers.clear();
        g.strikes = 0;
        g.entry_log.clear();
        g.round_points_earned = 0;
        g.correct_guesses_this_round.clear();
        g.question_seq += 1;

        let (current_round, total_rounds) = (g.current_round, g.total_rounds);
        tracing::debug!(room = %code, round = current_round, "Question loaded");
        self.broadcast_room(
            room,
            ServerMessage::QuestionLoaded {
                question,
                current_round,
                total_rounds,
            },
        )
        .await;
    }

    /// Reveal one board answer. Idempotent: revealing an already-revealed
    /// index changes nothing and emits nothing.
    pub async fn reveal_answer(&self, code: &RoomCode, index: usize) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        let Some(question) = &g.current_question else { return };
        if index >= question.answers.len() || g.revealed_answers.contains(&index) {
            return;
        }

        g.revealed_answers.push(index);
        self.broadcast_room(room, ServerMessage::AnswerRevealed { index })
            .await;
    }

    pub async fn add_strike(&self, code: &RoomCode) {
        self.set_strikes(code, |strikes| (strikes + 1).min(MAX_STRIKES))
            .await;
    }

    pub async fn remove_strike(&self, code: &RoomCode) {
        self.set_strikes(code, |strikes| strikes.saturating_sub(1))
            .await;
    }

    async fn set_strikes(&self, code: &RoomCode, update: impl FnOnce(u32) -> u32) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        room.game.strikes = update(room.game.strikes);
        let strikes = room.game.strikes;
        self.broadcast_room(room, ServerMessage::StrikeUpdated { strikes })
            .await;
    }

    /// Add points to a team's score and remember the award for summaries.
    pub async fn award_points(&self, code: &RoomCode, team: u8, points: u32) {
        if team != 1 && team != 2 {
            return;
        }

        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        if team == 1 {
            g.team1_score += points;
        } else {
            g.team2_score += points;
        }
        g.last_winning_team = Some(team);
        g.last_points_awarded = points;

        let (team1_score, team2_score) = (g.team1_score, g.team2_score);
        self.broadcast_room(
            room,
            ServerMessage::PointsUpdated {
                team1_score,
                team2_score,
            },
        )
        .await;
    }

    /// Host-directed jump between the setup and game screens.
    pub async fn navigate(&self, code: &RoomCode, screen: Screen) {
        if !matches!(screen, Screen::Setup | Screen::Game) {
            return;
        }

        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        room.game.screen = screen;
        self.broadcast_room(room, ServerMessage::GameStateUpdate { screen })
            .await;
    }

    pub async fn clear_entry_log(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        room.game.entry_log.clear();
        self.broadcast_room(room, ServerMessage::EntryLogCleared).await;
    }

    /// Clear per-question state (reveals, strikes, log, round points) without
    /// touching round number or scores.
    pub async fn reset_round(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        g.revealed_answers.clear();
        g.strikes = 0;
        g.entry_log.clear();
        g.round_points_earned = 0;
        g.correct_guesses_this_round.clear();
        // Invalidates any judge verdict still in flight for this question
        g.question_seq += 1;

        self.broadcast_room(room, ServerMessage::RoundReset).await;
    }

    /// Reinitialize the whole game back to the setup screen. The party
    /// roster survives (those people are still connected); team assignments
    /// do not.
    pub async fn reset_game(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        let seq = room.game.question_seq + 1;
        let mut players = std::mem::take(&mut room.game.players);
        for player in &mut players {
            player.team = None;
        }

        room.game = GameState::new();
        room.game.screen = Screen::Setup;
        room.game.players = players;
        room.game.question_seq = seq;

        tracing::info!(room = %code, "Game reset");
        let snapshot = room.game.clone();
        self.broadcast_room(room, ServerMessage::GameReset { game_state: snapshot })
            .await;
    }

    /// End the game and show final scores.
    pub async fn end_game(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        room.game.screen = Screen::End;
        let g = &room.game;
        let msg = ServerMessage::GameEnded {
            team1_name: g.team1_name.clone(),
            team1_score: g.team1_score,
            team2_name: g.team2_name.clone(),
            team2_score: g.team2_score,
        };
        tracing::info!(room = %code, "Game ended");
        self.broadcast_room(room, msg).await;
    }

    // Timer sub-state machine. The countdown itself runs on the host's local
    // clock; the room only relays, so the timer is advisory display state and
    // never an enforced deadline.

    pub async fn timer_start(&self, code: &RoomCode, seconds: u32) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        room.game.timer = TimerState {
            running: true,
            configured_seconds: seconds,
            current_seconds: seconds,
        };
        self.broadcast_room(room, ServerMessage::TimerStarted { seconds })
            .await;
    }

    pub async fn timer_pause(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        room.game.timer.running = false;
        self.broadcast_room(room, ServerMessage::TimerPaused).await;
    }

    pub async fn timer_reset(&self, code: &RoomCode, seconds: u32) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        room.game.timer = TimerState {
            running: false,
            configured_seconds: seconds,
            current_seconds: seconds,
        };
        self.broadcast_room(room, ServerMessage::TimerReset { seconds })
            .await;
    }

    /// Countdown tick relayed from the host's clock.
    pub async fn timer_update(&self, code: &RoomCode, seconds: u32) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        room.game.timer.current_seconds = seconds;
        self.broadcast_room(room, ServerMessage::TimerTick { seconds })
            .await;
    }

    /// Terminal countdown signal, emitted once.
    pub async fn timer_finished(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        let timer = &mut room.game.timer;
        if !timer.running && timer.current_seconds == 0 {
            return;
        }
        timer.running = false;
        timer.current_seconds = 0;

        self.broadcast_room(room, ServerMessage::TimerTimesUp).await;
    }
}

fn normalize_team_name(name: String, default: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    async fn room_with_host(state: &AppState) -> RoomCode {
        let code = state.create_room().await;
        let (host, _rx) = connect(state).await;
        state.authenticate_host(&host, code.as_str(), "pw").await;
        code
    }

    fn fruit_question() -> Question {
        Question {
            question: "Name a fruit".to_string(),
            answers: vec![
                Answer { text: "Apple".to_string(), points: 40 },
                Answer { text: "Banana".to_string(), points: 30 },
            ],
        }
    }

    #[tokio::test]
    async fn test_start_game_resets_counters() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;

        // Dirty the state first
        {
            let mut rooms = state.rooms.write().await;
            let g = &mut rooms.get_mut(&code).unwrap().game;
            g.team1_score = 100;
            g.current_round = 5;
        }

        state
            .start_game(&code, "RED".to_string(), "BLUE".to_string(), 3)
            .await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.screen, Screen::Game);
        assert_eq!(game.current_round, 1);
        assert_eq!(game.team1_score, 0);
        assert_eq!(game.team2_score, 0);
        assert_eq!(game.team1_name, "RED");
        assert_eq!(game.team2_name, "BLUE");
        assert_eq!(game.total_rounds, 3);
    }

    #[tokio::test]
    async fn test_start_game_defaults_and_clamps() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;

        state.start_game(&code, "  ".to_string(), "blue".to_string(), 500).await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.team1_name, "TEAM 1");
        assert_eq!(game.team2_name, "BLUE");
        assert_eq!(game.total_rounds, MAX_TOTAL_ROUNDS);
    }

    #[tokio::test]
    async fn test_load_question_clears_round_state() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;
        state.start_game(&code, String::new(), String::new(), 3).await;

        {
            let mut rooms = state.rooms.write().await;
            let g = &mut rooms.get_mut(&code).unwrap().game;
            g.strikes = 2;
            g.round_points_earned = 70;
        }

        state.load_question(&code, fruit_question(), false, Some(4)).await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.strikes, 0);
        assert_eq!(game.round_points_earned, 0);
        assert!(game.revealed_answers.is_empty());
        assert!(game.entry_log.is_empty());
        assert_eq!(game.used_question_indices, vec![4]);
        assert!(game.current_question.is_some());
    }

    #[tokio::test]
    async fn test_load_question_round_increment_capped() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;
        state.start_game(&code, String::new(), String::new(), 2).await;

        state.load_question(&code, fruit_question(), true, None).await;
        assert_eq!(state.game_state(&code).await.unwrap().current_round, 2);

        // At the cap; must not advance further
        state.load_question(&code, fruit_question(), true, None).await;
        assert_eq!(state.game_state(&code).await.unwrap().current_round, 2);
    }

    #[tokio::test]
    async fn test_reveal_answer_idempotent() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;
        state.load_question(&code, fruit_question(), false, None).await;

        state.reveal_answer(&code, 0).await;
        state.reveal_answer(&code, 0).await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.revealed_answers, vec![0]);
    }

    #[tokio::test]
    async fn test_reveal_answer_rejects_out_of_range() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;
        state.load_question(&code, fruit_question(), false, None).await;

        state.reveal_answer(&code, 99).await;
        assert!(state.game_state(&code).await.unwrap().revealed_answers.is_empty());
    }

    #[tokio::test]
    async fn test_strikes_clamped() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;

        for _ in 0..5 {
            state.add_strike(&code).await;
        }
        assert_eq!(state.game_state(&code).await.unwrap().strikes, MAX_STRIKES);

        for _ in 0..5 {
            state.remove_strike(&code).await;
        }
        assert_eq!(state.game_state(&code).await.unwrap().strikes, 0);
    }

    #[tokio::test]
    async fn test_award_points_accumulates() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;

        state.award_points(&code, 1, 40).await;
        state.award_points(&code, 1, 30).await;
        state.award_points(&code, 2, 20).await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.team1_score, 70);
        assert_eq!(game.team2_score, 20);
        assert_eq!(game.last_winning_team, Some(2));
        assert_eq!(game.last_points_awarded, 20);
    }

    #[tokio::test]
    async fn test_award_points_invalid_team_ignored() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;

        state.award_points(&code, 3, 40).await;
        assert_eq!(state.game_state(&code).await.unwrap().team1_score, 0);
    }

    #[tokio::test]
    async fn test_navigate_between_setup_and_game() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;

        state.navigate(&code, Screen::Setup).await;
        assert_eq!(state.game_state(&code).await.unwrap().screen, Screen::Setup);

        state.navigate(&code, Screen::Game).await;
        assert_eq!(state.game_state(&code).await.unwrap().screen, Screen::Game);

        // End is not a navigation target
        state.navigate(&code, Screen::End).await;
        assert_eq!(state.game_state(&code).await.unwrap().screen, Screen::Game);
    }

    #[tokio::test]
    async fn test_reset_round_keeps_round_and_scores() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;
        state.start_game(&code, String::new(), String::new(), 5).await;
        state.load_question(&code, fruit_question(), true, None).await;
        state.reveal_answer(&code, 0).await;
        state.add_strike(&code).await;
        state.award_points(&code, 1, 40).await;

        state.reset_round(&code).await;

        let game = state.game_state(&code).await.unwrap();
        assert!(game.revealed_answers.is_empty());
        assert_eq!(game.strikes, 0);
        assert_eq!(game.round_points_earned, 0);
        assert_eq!(game.current_round, 2);
        assert_eq!(game.team1_score, 40);
        assert!(game.current_question.is_some());
    }

    #[tokio::test]
    async fn test_reset_game_returns_to_setup() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;
        state.start_game(&code, "RED".to_string(), "BLUE".to_string(), 3).await;
        state.award_points(&code, 1, 40).await;

        state.reset_game(&code).await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.screen, Screen::Setup);
        assert_eq!(game.team1_score, 0);
        assert_eq!(game.team1_name, "TEAM 1");
        assert!(game.current_question.is_none());
    }

    #[tokio::test]
    async fn test_reset_game_keeps_roster_clears_teams() {
        let state = state_with_password("pw");
        let code = state.create_room().await;
        let (player, _rx) = connect(&state).await;
        state.join_player(&player, code.as_str(), "Alice").await;

        {
            let mut rooms = state.rooms.write().await;
            rooms.get_mut(&code).unwrap().game.players[0].team = Some(1);
        }

        state.reset_game(&code).await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.players.len(), 1);
        assert!(game.players[0].team.is_none());
    }

    #[tokio::test]
    async fn test_end_game_broadcasts_final_scores() {
        let state = state_with_password("pw");
        let code = state.create_room().await;
        let (display, mut display_rx) = connect(&state).await;
        state.join_display(&display, code.as_str()).await;
        let (host, _host_rx) = connect(&state).await;
        state.authenticate_host(&host, code.as_str(), "pw").await;
        state.start_game(&code, "RED".to_string(), "BLUE".to_string(), 3).await;
        state.award_points(&code, 2, 55).await;
        drain(&mut display_rx);

        state.end_game(&code).await;

        let msgs = drain(&mut display_rx);
        assert!(msgs.iter().any(|msg| matches!(
            msg,
            ServerMessage::GameEnded { team2_score: 55, .. }
        )));
        assert_eq!(state.game_state(&code).await.unwrap().screen, Screen::End);
    }

    #[tokio::test]
    async fn test_timer_lifecycle() {
        let state = state_with_password("pw");
        let code = room_with_host(&state).await;

        state.timer_start(&code, 60).await;
        let timer = state.game_state(&code).await.unwrap().timer;
        assert!(timer.running);
        assert_eq!(timer.current_seconds, 60);

        state.timer_update(&code, 42).await;
        let timer = state.game_state(&code).await.unwrap().timer;
        assert_eq!(timer.current_seconds, 42);
        assert!(timer.running);

        state.timer_pause(&code).await;
        let timer = state.game_state(&code).await.unwrap().timer;
        assert!(!timer.running);
        assert_eq!(timer.current_seconds, 42);

        state.timer_reset(&code, 30).await;
        let timer = state.game_state(&code).await.unwrap().timer;
        assert!(!timer.running);
        assert_eq!(timer.current_seconds, 30);
        assert_eq!(timer.configured_seconds, 30);
    }

    #[tokio::test]
    async fn test_timer_times_up_fires_once() {
        let state = state_with_password("pw");
        let code = state.create_room().await;
        let (display, mut display_rx) = connect(&state).await;
        state.join_display(&display, code.as_str()).await;
        let (host, _host_rx) = connect(&state).await;
        state.authenticate_host(&host, code.as_str(), "pw").await;

        state.timer_start(&code, 5).await;
        drain(&mut display_rx);

        state.timer_finished(&code).await;
        state.timer_finished(&code).await;

        let times_up = drain(&mut display_rx)
            .iter()
            .filter(|msg| matches!(msg, ServerMessage::TimerTimesUp))
            .count();
        assert_eq!(times_up, 1);
    }
}
