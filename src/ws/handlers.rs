//! Client message dispatch
//!
//! Join and authenticate messages resolve at the session boundary; everything
//! else is a host command. The authorization model is a single rule: a host
//! command from a connection that is not the bound host of its room is
//! silently dropped, with no reply that could leak room internals to a
//! spoofed sender.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionId;

/// Macro resolving the room this connection hosts, silently dropping the
/// command otherwise.
macro_rules! host_room {
    ($state:expr, $conn_id:expr) => {
        match $state.host_room($conn_id).await {
            Some(code) => code,
            None => {
                tracing::debug!(conn = %$conn_id, "Dropping host command from non-host");
                return None;
            }
        }
    };
}

/// Handle a client message, returning an optional unicast reply.
pub async fn handle_message(
    msg: ClientMessage,
    conn_id: &ConnectionId,
    state: &AppState,
) -> Option<ServerMessage> {
    match msg {
        // Session management
        ClientMessage::CreateRoom => state.create_room_for_display(conn_id).await,
        ClientMessage::DisplayJoin { room_code } => state.join_display(conn_id, &room_code).await,
        ClientMessage::HostAuthenticate { room_code, password } => {
            state.authenticate_host(conn_id, &room_code, &password).await
        }
        ClientMessage::HostTakeOver { room_code, password } => {
            state.take_over_host(conn_id, &room_code, &password).await
        }
        ClientMessage::PlayerJoin { room_code, player_name } => {
            state.join_player(conn_id, &room_code, &player_name).await
        }
        ClientMessage::RequestState => state.request_state(conn_id).await,

        // Host commands
        ClientMessage::StartGame {
            team1_name,
            team2_name,
            total_rounds,
        } => {
            let code = host_room!(state, conn_id);
            state.start_game(&code, team1_name, team2_name, total_rounds).await;
            None
        }
        ClientMessage::NewQuestion {
            question,
            increment_round,
            question_index,
        } => {
            let code = host_room!(state, conn_id);
            state
                .load_question(&code, question, increment_round, question_index)
                .await;
            None
        }
        ClientMessage::RevealAnswer { index } => {
            let code = host_room!(state, conn_id);
            state.reveal_answer(&code, index).await;
            None
        }
        ClientMessage::AddStrike => {
            let code = host_room!(state, conn_id);
            state.add_strike(&code).await;
            None
        }
        ClientMessage::RemoveStrike => {
            let code = host_room!(state, conn_id);
            state.remove_strike(&code).await;
            None
        }
        ClientMessage::AwardPoints { team, points } => {
            let code = host_room!(state, conn_id);
            state.award_points(&code, team, points).await;
            None
        }
        ClientMessage::CheckAnswer { player_answer } => {
            let code = host_room!(state, conn_id);
            // The judge may take arbitrary time; run it off the socket loop
            // so the host can keep issuing synchronous commands meanwhile.
            let state = state.clone();
            tokio::spawn(async move {
                state.check_answer(&code, &player_answer).await;
            });
            None
        }
        ClientMessage::EndRound {
            team,
            points,
            correct_guesses,
        } => {
            let code = host_room!(state, conn_id);
            state.end_round(&code, team, points, correct_guesses).await;
            None
        }
        ClientMessage::ShowRoundSummary => {
            let code = host_room!(state, conn_id);
            state.show_round_summary(&code).await;
            None
        }
        ClientMessage::ContinueFromSummary => {
            let code = host_room!(state, conn_id);
            state.continue_from_summary(&code).await;
            None
        }
        ClientMessage::ResetRound => {
            let code = host_room!(state, conn_id);
            state.reset_round(&code).await;
            None
        }
        ClientMessage::ResetGame => {
            let code = host_room!(state, conn_id);
            state.reset_game(&code).await;
            None
        }
        ClientMessage::EndGame => {
            let code = host_room!(state, conn_id);
            state.end_game(&code).await;
            None
        }
        ClientMessage::Navigate { screen } => {
            let code = host_room!(state, conn_id);
            state.navigate(&code, screen).await;
            None
        }
        ClientMessage::ClearEntryLog => {
            let code = host_room!(state, conn_id);
            state.clear_entry_log(&code).await;
            None
        }
        ClientMessage::TimerStart { seconds } => {
            let code = host_room!(state, conn_id);
            state.timer_start(&code, seconds).await;
            None
        }
        ClientMessage::TimerPause => {
            let code = host_room!(state, conn_id);
            state.timer_pause(&code).await;
            None
        }
        ClientMessage::TimerReset { seconds } => {
            let code = host_room!(state, conn_id);
            state.timer_reset(&code, seconds).await;
            None
        }
        ClientMessage::TimerUpdate { seconds } => {
            let code = host_room!(state, conn_id);
            state.timer_update(&code, seconds).await;
            None
        }
        ClientMessage::TimerFinished => {
            let code = host_room!(state, conn_id);
            state.timer_finished(&code).await;
            None
        }

        // Party mode
        ClientMessage::PlayerSubmitAnswer { player_answer } => {
            let state = state.clone();
            let conn_id = conn_id.clone();
            tokio::spawn(async move {
                state.player_submit_answer(&conn_id, &player_answer).await;
            });
            None
        }
        ClientMessage::PartyGameStart {
            team1_name,
            team2_name,
            total_rounds,
        } => {
            let code = host_room!(state, conn_id);
            state
                .party_game_start(&code, team1_name, team2_name, total_rounds)
                .await;
            None
        }
        ClientMessage::PartySetTurn { player_id } => {
            let code = host_room!(state, conn_id);
            state.party_set_turn(&code, &player_id).await;
            None
        }
        ClientMessage::PartyNextBattle => {
            let code = host_room!(state, conn_id);
            state.party_next_battle(&code).await;
            None
        }
    }
}
