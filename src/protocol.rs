use crate::judge::Verdict;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Messages clients send to the server.
///
/// Event names mirror the browser clients' socket events; payload fields are
/// camelCase on the wire. Anything that fails to parse is rejected at the
/// boundary and never reaches the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Explicit room creation (issued by a display that has no code yet).
    CreateRoom,
    #[serde(rename = "display:join")]
    DisplayJoin { room_code: String },
    #[serde(rename = "host:authenticate")]
    HostAuthenticate { room_code: String, password: String },
    #[serde(rename = "host:takeOver")]
    HostTakeOver { room_code: String, password: String },
    #[serde(rename = "player:join")]
    PlayerJoin { room_code: String, player_name: String },
    /// Full-state pull, used after reconnect to resynchronize.
    RequestState,

    // Host commands
    StartGame {
        team1_name: String,
        team2_name: String,
        total_rounds: u32,
    },
    NewQuestion {
        question: Question,
        increment_round: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        question_index: Option<usize>,
    },
    RevealAnswer { index: usize },
    AddStrike,
    RemoveStrike,
    AwardPoints { team: u8, points: u32 },
    CheckAnswer { player_answer: String },
    EndRound {
        team: u8,
        points: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correct_guesses: Option<Vec<CorrectGuess>>,
    },
    ShowRoundSummary,
    ContinueFromSummary,
    ResetRound,
    ResetGame,
    EndGame,
    Navigate { screen: Screen },
    ClearEntryLog,
    #[serde(rename = "timer:start")]
    TimerStart { seconds: u32 },
    #[serde(rename = "timer:pause")]
    TimerPause,
    #[serde(rename = "timer:reset")]
    TimerReset { seconds: u32 },
    /// Countdown tick relayed from the host's local clock.
    #[serde(rename = "timer:update")]
    TimerUpdate { seconds: u32 },
    #[serde(rename = "timer:finished")]
    TimerFinished,

    // Party mode
    #[serde(rename = "player:submitAnswer")]
    PlayerSubmitAnswer { player_answer: String },
    #[serde(rename = "partyGame:start")]
    PartyGameStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        team1_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        team2_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_rounds: Option<u32>,
    },
    #[serde(rename = "partyGame:setTurn")]
    PartySetTurn { player_id: PlayerId },
    #[serde(rename = "partyGame:nextBattle")]
    PartyNextBattle,
}

/// Messages the server sends to clients.
///
/// Unicast acks (`room:created`, `host:authResult`, `player:joined`,
/// `gameState:full`) go only to the requesting connection; `answer:result`
/// and `answer:error` go to the host connection alone. Everything else is
/// fanned out to every member of the room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "room:created")]
    RoomCreated {
        room_code: RoomCode,
        game_state: GameState,
    },
    Joined {
        room_code: RoomCode,
        game_state: GameState,
    },
    #[serde(rename = "host:authResult")]
    HostAuthResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        can_take_over: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_state: Option<GameState>,
    },
    #[serde(rename = "host:connected")]
    HostConnected,
    #[serde(rename = "host:disconnected")]
    HostDisconnected { reason: String },
    #[serde(rename = "gameState:full")]
    GameStateFull { game_state: GameState },
    #[serde(rename = "gameState:update")]
    GameStateUpdate { screen: Screen },
    #[serde(rename = "game:started")]
    GameStarted { game_state: GameState },
    #[serde(rename = "question:loaded")]
    QuestionLoaded {
        question: Question,
        current_round: u32,
        total_rounds: u32,
    },
    #[serde(rename = "answer:revealed")]
    AnswerRevealed { index: usize },
    /// Raw judge verdict, host only.
    #[serde(rename = "answer:result")]
    AnswerResult {
        #[serde(rename = "match")]
        matched: bool,
        matched_answer: String,
        confidence: String,
        reason: String,
    },
    #[serde(rename = "answer:correct")]
    AnswerCorrect {
        index: usize,
        answer_text: String,
        points: u32,
        round_points_earned: u32,
    },
    #[serde(rename = "answer:incorrect")]
    AnswerIncorrect { strikes: u32 },
    /// Judge failure, host only. State is untouched; the attempt may be retried.
    #[serde(rename = "answer:error")]
    AnswerError { error: String },
    #[serde(rename = "strike:updated")]
    StrikeUpdated { strikes: u32 },
    #[serde(rename = "points:updated")]
    PointsUpdated { team1_score: u32, team2_score: u32 },
    #[serde(rename = "timer:started")]
    TimerStarted { seconds: u32 },
    #[serde(rename = "timer:paused")]
    TimerPaused,
    #[serde(rename = "timer:reset")]
    TimerReset { seconds: u32 },
    #[serde(rename = "timer:tick")]
    TimerTick { seconds: u32 },
    #[serde(rename = "timer:timesUp")]
    TimerTimesUp,
    #[serde(rename = "entryLog:updated")]
    EntryLogUpdated { entry_log: Vec<EntryLogEntry> },
    #[serde(rename = "entryLog:cleared")]
    EntryLogCleared,
    #[serde(rename = "round:reset")]
    RoundReset,
    #[serde(rename = "round:summary")]
    RoundSummary {
        round_number: u32,
        winning_team: u8,
        winning_team_name: String,
        points_awarded: u32,
        correct_guesses: Vec<CorrectGuess>,
        total_answers: usize,
        strikes: u32,
        team1_name: String,
        team1_score: u32,
        team2_name: String,
        team2_score: u32,
        current_round: u32,
        total_rounds: u32,
    },
    #[serde(rename = "round:continue")]
    RoundContinue,
    #[serde(rename = "game:reset")]
    GameReset { game_state: GameState },
    #[serde(rename = "game:ended")]
    GameEnded {
        team1_name: String,
        team1_score: u32,
        team2_name: String,
        team2_score: u32,
    },

    // Party mode
    #[serde(rename = "player:joined")]
    PlayerJoined {
        player_id: PlayerId,
        game_state: GameState,
    },
    #[serde(rename = "player:error")]
    PlayerError { message: String },
    #[serde(rename = "player:answerResult")]
    PlayerAnswerResult {
        #[serde(rename = "match")]
        matched: bool,
        matched_answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "player:notYourTurn")]
    PlayerNotYourTurn { message: String },
    #[serde(rename = "players:updated")]
    PlayersUpdated { players: Vec<PartyPlayer> },
    #[serde(rename = "teams:updated")]
    TeamsUpdated { players: Vec<PartyPlayer> },
    #[serde(rename = "partyGame:started")]
    PartyGameStarted { game_state: GameState },
    #[serde(rename = "battle:started")]
    BattleStarted {
        players: Vec<PartyPlayer>,
        battle_index: usize,
        face_off: bool,
    },
    #[serde(rename = "turn:changed")]
    TurnChanged { player_id: PlayerId },

    Error { code: String, msg: String },
}

impl ServerMessage {
    /// Host-facing rendering of a judge verdict.
    pub fn answer_result(verdict: &Verdict) -> Self {
        ServerMessage::AnswerResult {
            matched: verdict.matched,
            matched_answer: verdict.matched_answer.clone(),
            confidence: verdict.confidence.clone(),
            reason: verdict.reason.clone(),
        }
    }
}
