//! Round completion: point award, summary emission, continuation

use super::AppState;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Award the round to a team and emit the round summary.
    ///
    /// The host sends its own view of the correct guesses; if that is missing
    /// or empty (client lost state mid-round) the server falls back to the
    /// guesses it tracked itself. The round counter is not advanced here;
    /// that happens when the host loads the next question.
    pub async fn end_round(
        &self,
        code: &RoomCode,
        team: u8,
        points: u32,
        correct_guesses: Option<Vec<CorrectGuess>>,
    ) {
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

        let guesses = match correct_guesses {
            Some(list) if !list.is_empty() => list,
            _ => g.correct_guesses_this_round.clone(),
        };

        let summary = build_summary(g, team, points, guesses);
        tracing::info!(room = %code, round = g.current_round, team, points, "Round ended");
        self.broadcast_room(room, summary).await;
    }

    /// Re-emit the round summary from server state, without awarding again.
    pub async fn show_round_summary(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &room.game;

        let team = g.last_winning_team.unwrap_or(1);
        let summary = build_summary(
            g,
            team,
            g.last_points_awarded,
            g.correct_guesses_this_round.clone(),
        );
        self.broadcast_room(room, summary).await;
    }

    /// Leave the summary screen: either on to the next round, or to the end
    /// screen with final scores when the last round just finished.
    pub async fn continue_from_summary(&self, code: &RoomCode) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };
        let g = &mut room.game;

        if g.current_round >= g.total_rounds {
            g.screen = Screen::End;
            let msg = ServerMessage::GameEnded {
                team1_name: g.team1_name.clone(),
                team1_score: g.team1_score,
                team2_name: g.team2_name.clone(),
                team2_score: g.team2_score,
            };
            tracing::info!(room = %code, "Final round complete");
            self.broadcast_room(room, msg).await;
        } else {
            self.broadcast_room(room, ServerMessage::RoundContinue).await;
        }
    }
}

fn build_summary(
    g: &GameState,
    team: u8,
    points: u32,
    correct_guesses: Vec<CorrectGuess>,
) -> ServerMessage {
    ServerMessage::RoundSummary {
        round_number: g.current_round,
        winning_team: team,
        winning_team_name: g.team_name(team).to_string(),
        points_awarded: points,
        correct_guesses,
        total_answers: g
            .current_question
            .as_ref()
            .map(|q| q.answers.len())
            .unwrap_or(0),
        strikes: g.strikes,
        team1_name: g.team1_name.clone(),
        team1_score: g.team1_score,
        team2_name: g.team2_name.clone(),
        team2_score: g.team2_score,
        current_round: g.current_round,
        total_rounds: g.total_rounds,
    }
}
