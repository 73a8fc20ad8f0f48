//! Answer-check orchestration
//!
//! The one transition with an external asynchronous dependency: a submitted
//! guess goes to the judge, and the verdict comes back after arbitrary time.
//! The snapshot taken before the call carries the question's sequence number;
//! a verdict that returns after the question changed is discarded instead of
//! mutating state it no longer describes.

use super::AppState;
use crate::judge::Verdict;
use crate::protocol::ServerMessage;
use crate::types::*;

/// Who submitted the guess being checked.
#[derive(Debug, Clone)]
enum Submitter {
    Host,
    Player { id: PlayerId, name: String },
}

impl AppState {
    /// Host-submitted guess.
    pub async fn check_answer(&self, code: &RoomCode, player_answer: &str) {
        self.run_answer_check(code.clone(), player_answer, Submitter::Host)
            .await;
    }

    /// Party-mode guess from a player's own connection. Enforces battle
    /// membership and turn ownership before anything reaches the judge.
    pub async fn player_submit_answer(&self, conn_id: &ConnectionId, player_answer: &str) {
        let (code, player_id) = {
            let connections = self.connections.read().await;
            let Some(conn) = connections.get(conn_id) else { return };
            if conn.role != Some(Role::Player) {
                return;
            }
            match (conn.room.clone(), conn.player_id.clone()) {
                (Some(code), Some(player_id)) => (code, player_id),
                _ => return,
            }
        };

        let player_name = {
            let rooms = self.rooms.read().await;
            let Some(room) = rooms.get(&code) else { return };
            let g = &room.game;

            if !g.party_mode {
                return;
            }

            let in_battle = g
                .battle_pairs
                .get(g.current_battle_index)
                .map(|pair| pair.team1_player == player_id || pair.team2_player == player_id)
                .unwrap_or(false);
            let my_turn = g.current_turn_player.as_deref() == Some(player_id.as_str());

            if !in_battle || !(g.face_off_active || my_turn) {
                let message = if in_battle {
                    "It's not your turn to answer yet!"
                } else {
                    "You're not in the current battle"
                };
                self.send_to_room_player(
                    room,
                    &player_id,
                    ServerMessage::PlayerNotYourTurn {
                        message: message.to_string(),
                    },
                )
                .await;
                return;
            }

            g.players
                .iter()
                .find(|p| p.id == player_id)
                .map(|p| p.name.clone())
                .unwrap_or_default()
        };

        self.run_answer_check(
            code,
            player_answer,
            Submitter::Player {
                id: player_id,
                name: player_name,
            },
        )
        .await;
    }

    async fn run_answer_check(&self, code: RoomCode, player_answer: &str, submitter: Submitter) {
        let answer = player_answer.trim().to_string();
        if answer.is_empty() {
            return;
        }

        // Snapshot the board; the judge call happens outside any lock.
        let Some((question, board, seq)) = ({
            let rooms = self.rooms.read().await;
            rooms.get(&code).and_then(|room| {
                let g = &room.game;
                g.current_question.as_ref().map(|q| {
                    (
                        q.question.clone(),
                        q.answers.iter().map(|a| a.text.clone()).collect::<Vec<_>>(),
                        g.question_seq,
                    )
                })
            })
        }) else {
            // No room or no question loaded: nothing to check.
            return;
        };

        let Some(judge) = self.judge.clone() else {
            self.emit_judge_failure(&code, "Answer checking is not configured", &submitter)
                .await;
            return;
        };

        tracing::debug!(room = %code, judge = judge.name(), "Checking answer");
        match judge.judge(&question, &board, &answer).await {
            Ok(verdict) => self.apply_verdict(&code, seq, &answer, verdict, &submitter).await,
            Err(e) => {
                tracing::warn!(room = %code, error = %e, "Judge call failed");
                self.emit_judge_failure(&code, &e.to_string(), &submitter).await;
            }
        }
    }

    /// Apply a judge verdict to the room, unless the question has changed
    /// underneath it.
    async fn apply_verdict(
        &self,
        code: &RoomCode,
        seq: u64,
        answer: &str,
        verdict: Verdict,
        submitter: &Submitter,
    ) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else { return };

        if room.game.question_seq != seq {
            tracing::debug!(room = %code, "Discarding stale judge verdict");
            return;
        }
        let Some(question) = room.game.current_question.clone() else { return };

        // The raw verdict is host-only; other roles see only the consequence.
        self.send_to_room_host(room, ServerMessage::answer_result(&verdict))
            .await;
        if let Submitter::Player { id, .. } = submitter {
            self.send_to_room_player(
                room,
                id,
                ServerMessage::PlayerAnswerResult {
                    matched: verdict.matched,
                    matched_answer: verdict.matched_answer.clone(),
                    error: None,
                },
            )
            .await;
        }

        let board_index = verdict.matched.then(|| {
            question
                .answers
                .iter()
                .position(|a| a.text.to_lowercase() == verdict.matched_answer.to_lowercase())
        });

        match board_index {
            // A match the board actually knows about
            Some(Some(index)) => {
                let already_revealed = room.game.revealed_answers.contains(&index);
                if !already_revealed {
                    let slot = &question.answers[index];
                    let g = &mut room.game;
                    g.revealed_answers.push(index);
                    g.round_points_earned += slot.points;
                    g.correct_guesses_this_round.push(CorrectGuess {
                        answer: slot.text.clone(),
                        points: slot.points,
                    });
                    let round_points_earned = g.round_points_earned;

                    self.broadcast_room(
                        room,
                        ServerMessage::AnswerCorrect {
                            index,
                            answer_text: slot.text.clone(),
                            points: slot.points,
                            round_points_earned,
                        },
                    )
                    .await;
                }
                // Already-revealed matches are informational only: the log
                // records the correct guess, but nothing is re-revealed and
                // no points are counted twice.
                self.append_log_entry(room, answer, true, submitter).await;
            }
            // Judge claimed a match for text that is not on the board, or no
            // match at all: both count as a miss.
            Some(None) | None => {
                room.game.strikes = (room.game.strikes + 1).min(MAX_STRIKES);
                let strikes = room.game.strikes;
                self.broadcast_room(room, ServerMessage::AnswerIncorrect { strikes })
                    .await;
                self.append_log_entry(room, answer, false, submitter).await;
            }
        }
    }

    async fn append_log_entry(
        &self,
        room: &mut super::Room,
        answer: &str,
        is_correct: bool,
        submitter: &Submitter,
    ) {
        let player_name = match submitter {
            Submitter::Host => None,
            Submitter::Player { name, .. } => Some(name.clone()),
        };

        room.game.entry_log.push(EntryLogEntry {
            entry: answer.to_string(),
            is_correct,
            player_name,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });

        let entry_log = room.game.entry_log.clone();
        self.broadcast_room(room, ServerMessage::EntryLogUpdated { entry_log })
            .await;
    }

    /// Judge unreachable or talking nonsense: tell the host (and the
    /// submitting player), touch nothing, let them retry.
    async fn emit_judge_failure(&self, code: &RoomCode, error: &str, submitter: &Submitter) {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(code) else { return };

        self.send_to_room_host(
            room,
            ServerMessage::AnswerError {
                error: error.to_string(),
            },
        )
        .await;

        if let Submitter::Player { id, .. } = submitter {
            self.send_to_room_player(
                room,
                id,
                ServerMessage::PlayerAnswerResult {
                    matched: false,
                    matched_answer: String::new(),
                    error: Some(error.to_string()),
                },
            )
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::auth::HostAuth;
    use crate::judge::{AnswerJudge, JudgeError, JudgeResult};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct MockJudge {
        verdict: Verdict,
    }

    #[async_trait]
    impl AnswerJudge for MockJudge {
        async fn judge(&self, _q: &str, _board: &[String], _a: &str) -> JudgeResult<Verdict> {
            Ok(self.verdict.clone())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct FailingJudge;

    #[async_trait]
    impl AnswerJudge for FailingJudge {
        async fn judge(&self, _q: &str, _board: &[String], _a: &str) -> JudgeResult<Verdict> {
            Err(JudgeError::ApiError("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn match_verdict(answer: &str) -> Verdict {
        Verdict {
            matched: true,
            matched_answer: answer.to_string(),
            confidence: "high".to_string(),
            reason: "close enough".to_string(),
        }
    }

    fn miss_verdict() -> Verdict {
        Verdict {
            matched: false,
            matched_answer: String::new(),
            confidence: "high".to_string(),
            reason: "not on the board".to_string(),
        }
    }

    fn state_with_judge(judge: impl AnswerJudge + 'static) -> AppState {
        AppState::new_with_judge(HostAuth::new(Some("pw".to_string())), Arc::new(judge))
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

    async fn game_room(state: &AppState) -> (RoomCode, tokio::sync::mpsc::UnboundedReceiver<ServerMessage>) {
        let code = state.create_room().await;
        let (host, host_rx) = connect(state).await;
        state.authenticate_host(&host, code.as_str(), "pw").await;
        state.start_game(&code, String::new(), String::new(), 3).await;
        state.load_question(&code, fruit_question(), false, None).await;
        (code, host_rx)
    }

    #[tokio::test]
    async fn test_correct_answer_reveals_and_scores() {
        let state = state_with_judge(MockJudge { verdict: match_verdict("Apple") });
        let (code, mut host_rx) = game_room(&state).await;
        drain(&mut host_rx);

        state.check_answer(&code, "apple").await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.revealed_answers, vec![0]);
        assert_eq!(game.round_points_earned, 40);
        assert_eq!(game.strikes, 0);
        assert_eq!(game.entry_log.len(), 1);
        assert!(game.entry_log[0].is_correct);
        assert_eq!(game.correct_guesses_this_round.len(), 1);

        let msgs = drain(&mut host_rx);
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::AnswerResult { matched: true, .. })));
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMessage::AnswerCorrect { index: 0, points: 40, round_points_earned: 40, .. }
        )));
    }

    #[tokio::test]
    async fn test_matched_answer_lookup_is_case_insensitive() {
        let state = state_with_judge(MockJudge { verdict: match_verdict("aPpLe") });
        let (code, _host_rx) = game_room(&state).await;

        state.check_answer(&code, "apple").await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.revealed_answers, vec![0]);
    }

    #[tokio::test]
    async fn test_incorrect_answer_strikes() {
        let state = state_with_judge(MockJudge { verdict: miss_verdict() });
        let (code, mut host_rx) = game_room(&state).await;
        drain(&mut host_rx);

        state.check_answer(&code, "zebra").await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.strikes, 1);
        assert!(game.revealed_answers.is_empty());
        assert_eq!(game.team1_score, 0);
        assert_eq!(game.entry_log.len(), 1);
        assert!(!game.entry_log[0].is_correct);

        let msgs = drain(&mut host_rx);
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::AnswerIncorrect { strikes: 1 })));
    }

    #[tokio::test]
    async fn test_already_revealed_match_does_not_double_count() {
        let state = state_with_judge(MockJudge { verdict: match_verdict("Apple") });
        let (code, _host_rx) = game_room(&state).await;

        state.check_answer(&code, "apple").await;
        state.check_answer(&code, "an apple").await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.revealed_answers, vec![0]);
        assert_eq!(game.round_points_earned, 40);
        assert_eq!(game.correct_guesses_this_round.len(), 1);
        // Both attempts still land in the log as correct
        assert_eq!(game.entry_log.len(), 2);
        assert!(game.entry_log.iter().all(|e| e.is_correct));
    }

    #[tokio::test]
    async fn test_match_not_on_board_counts_as_miss() {
        let state = state_with_judge(MockJudge { verdict: match_verdict("Mango") });
        let (code, _host_rx) = game_room(&state).await;

        state.check_answer(&code, "mango").await;

        let game = state.game_state(&code).await.unwrap();
        assert!(game.revealed_answers.is_empty());
        assert_eq!(game.strikes, 1);
    }

    #[tokio::test]
    async fn test_no_question_is_noop() {
        let state = state_with_judge(MockJudge { verdict: match_verdict("Apple") });
        let code = state.create_room().await;

        state.check_answer(&code, "apple").await;

        let game = state.game_state(&code).await.unwrap();
        assert!(game.entry_log.is_empty());
        assert_eq!(game.strikes, 0);
    }

    #[tokio::test]
    async fn test_judge_failure_leaves_state_untouched() {
        let state = state_with_judge(FailingJudge);
        let (code, mut host_rx) = game_room(&state).await;
        drain(&mut host_rx);

        state.check_answer(&code, "apple").await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.strikes, 0);
        assert!(game.entry_log.is_empty());
        assert!(game.revealed_answers.is_empty());

        let msgs = drain(&mut host_rx);
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::AnswerError { .. })));
    }

    #[tokio::test]
    async fn test_no_judge_configured_reports_error() {
        let state = state_with_password("pw");
        let code = state.create_room().await;
        let (host, mut host_rx) = connect(&state).await;
        state.authenticate_host(&host, code.as_str(), "pw").await;
        state.load_question(&code, fruit_question(), false, None).await;
        drain(&mut host_rx);

        state.check_answer(&code, "apple").await;

        let msgs = drain(&mut host_rx);
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::AnswerError { .. })));
    }

    #[tokio::test]
    async fn test_stale_verdict_discarded_after_new_question() {
        // The judge resolves against seq N; by then the host loaded a new
        // question, so the verdict must be dropped on the floor.
        let state = state_with_judge(MockJudge { verdict: match_verdict("Apple") });
        let (code, _host_rx) = game_room(&state).await;

        let seq = state.game_state(&code).await.unwrap().question_seq;
        state.load_question(&code, fruit_question(), false, None).await;

        state
            .apply_verdict(&code, seq, "apple", match_verdict("Apple"), &Submitter::Host)
            .await;

        let game = state.game_state(&code).await.unwrap();
        assert!(game.revealed_answers.is_empty());
        assert_eq!(game.round_points_earned, 0);
        assert!(game.entry_log.is_empty());
    }

    #[tokio::test]
    async fn test_player_submit_requires_turn() {
        let state = state_with_judge(MockJudge { verdict: match_verdict("Apple") });
        let code = state.create_room().await;

        let (p1, mut p1_rx) = connect(&state).await;
        let (p2, _p2_rx) = connect(&state).await;
        state.join_player(&p1, code.as_str(), "Alice").await;
        state.join_player(&p2, code.as_str(), "Bob").await;

        state.party_game_start(&code, None, None, None).await;
        state.load_question(&code, fruit_question(), false, None).await;

        // Face-off starts active; hand the turn to the team-2 player so the
        // team-1 player is out of turn.
        let game = state.game_state(&code).await.unwrap();
        let pair = game.battle_pairs[0].clone();
        state.party_set_turn(&code, &pair.team2_player).await;
        drain(&mut p1_rx);

        // p1 joined first -> team 1 -> not their turn now
        state.player_submit_answer(&p1, "apple").await;

        let msgs = drain(&mut p1_rx);
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::PlayerNotYourTurn { .. })));
        assert!(state.game_state(&code).await.unwrap().entry_log.is_empty());
    }

    #[tokio::test]
    async fn test_player_submit_during_face_off() {
        let state = state_with_judge(MockJudge { verdict: match_verdict("Apple") });
        let code = state.create_room().await;

        let (p1, mut p1_rx) = connect(&state).await;
        let (p2, _p2_rx) = connect(&state).await;
        state.join_player(&p1, code.as_str(), "Alice").await;
        state.join_player(&p2, code.as_str(), "Bob").await;

        state.party_game_start(&code, None, None, None).await;
        state.load_question(&code, fruit_question(), false, None).await;
        drain(&mut p1_rx);

        state.player_submit_answer(&p1, "apple").await;

        let game = state.game_state(&code).await.unwrap();
        assert_eq!(game.revealed_answers, vec![0]);
        assert_eq!(game.entry_log.len(), 1);
        assert_eq!(game.entry_log[0].player_name.as_deref(), Some("Alice"));

        let msgs = drain(&mut p1_rx);
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMessage::PlayerAnswerResult { matched: true, .. }
        )));
    }
}
