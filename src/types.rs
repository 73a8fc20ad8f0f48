use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Opaque ID types for type safety
pub type ConnectionId = String;
pub type PlayerId = String;

/// Characters allowed in room codes. Visually ambiguous characters
/// (0/O, 1/I) are excluded so codes survive being read off a screen.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 6;

/// A six-character room code identifying one game session.
///
/// Codes are stored uppercase; parsing is case-insensitive so players can
/// type them however they like.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generates a new random code.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code: String = (0..ROOM_CODE_LEN)
            .map(|_| *ROOM_CODE_ALPHABET.choose(&mut rng).expect("alphabet is non-empty") as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid room code")]
pub struct InvalidRoomCode;

impl FromStr for RoomCode {
    type Err = InvalidRoomCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        if upper.len() != ROOM_CODE_LEN {
            return Err(InvalidRoomCode);
        }
        if !upper.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
            return Err(InvalidRoomCode);
        }
        Ok(Self(upper))
    }
}

impl Serialize for RoomCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RoomCode {
    fn deserialize<D>(deserializer: D) -> Result<RoomCode, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RoomCode::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Display,
    Host,
    Player,
}

/// Which screen the room is currently showing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Qr,
    Tutorial,
    Setup,
    Game,
    End,
}

/// One answer slot on the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub points: u32,
}

/// A survey question plus its board of answers.
///
/// Answers are kept sorted descending by points; indices are stable for the
/// lifetime of the loaded question because reveal and correct events address
/// answers by index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub question: String,
    pub answers: Vec<Answer>,
}

impl Question {
    /// Sorts the board descending by points. Called once when the question
    /// is loaded; never after indices have been handed out.
    pub fn sort_answers(&mut self) {
        self.answers.sort_by(|a, b| b.points.cmp(&a.points));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub running: bool,
    pub configured_seconds: u32,
    pub current_seconds: u32,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            running: false,
            configured_seconds: DEFAULT_TIMER_SECONDS,
            current_seconds: DEFAULT_TIMER_SECONDS,
        }
    }
}

/// One answer attempt recorded in the round's entry log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryLogEntry {
    pub entry: String,
    pub is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrectGuess {
    pub answer: String,
    pub points: u32,
}

/// A connected party-mode participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartyPlayer {
    pub id: PlayerId,
    pub name: String,
    /// 1 or 2 once teams have been assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<u8>,
    pub connected: bool,
}

/// A head-to-head pairing of two opposing players.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BattlePair {
    pub team1_player: PlayerId,
    pub team2_player: PlayerId,
}

pub const MAX_STRIKES: u32 = 3;
pub const MIN_TOTAL_ROUNDS: u32 = 1;
pub const MAX_TOTAL_ROUNDS: u32 = 50;
pub const DEFAULT_TOTAL_ROUNDS: u32 = 7;
pub const DEFAULT_TIMER_SECONDS: u32 = 30;
pub const DEFAULT_TEAM1_NAME: &str = "TEAM 1";
pub const DEFAULT_TEAM2_NAME: &str = "TEAM 2";

/// The authoritative per-room game state.
///
/// Every field here is broadcast wholesale in `gameState:full` snapshots, so
/// clients can reconcile after a reconnect without replaying deltas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub screen: Screen,
    pub team1_name: String,
    pub team2_name: String,
    pub team1_score: u32,
    pub team2_score: u32,
    pub total_rounds: u32,
    pub current_round: u32,
    pub current_question: Option<Question>,
    pub revealed_answers: Vec<usize>,
    pub strikes: u32,
    pub timer: TimerState,
    pub entry_log: Vec<EntryLogEntry>,
    pub round_points_earned: u32,
    pub used_question_indices: Vec<usize>,
    pub correct_guesses_this_round: Vec<CorrectGuess>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_winning_team: Option<u8>,
    pub last_points_awarded: u32,
    // Party mode
    pub party_mode: bool,
    pub players: Vec<PartyPlayer>,
    pub battle_pairs: Vec<BattlePair>,
    pub current_battle_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_turn_player: Option<PlayerId>,
    pub face_off_active: bool,
    /// Bumped every time the loaded question changes (new question, round
    /// reset, game reset). Late judge verdicts compare against this to know
    /// whether they still apply. Never sent on the wire.
    #[serde(skip)]
    pub question_seq: u64,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Qr,
            team1_name: DEFAULT_TEAM1_NAME.to_string(),
            team2_name: DEFAULT_TEAM2_NAME.to_string(),
            team1_score: 0,
            team2_score: 0,
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            current_round: 1,
            current_question: None,
            revealed_answers: Vec::new(),
            strikes: 0,
            timer: TimerState::default(),
            entry_log: Vec::new(),
            round_points_earned: 0,
            used_question_indices: Vec::new(),
            correct_guesses_this_round: Vec::new(),
            last_winning_team: None,
            last_points_awarded: 0,
            party_mode: false,
            players: Vec::new(),
            battle_pairs: Vec::new(),
            current_battle_index: 0,
            current_turn_player: None,
            face_off_active: false,
            question_seq: 0,
        }
    }

    pub fn team_name(&self, team: u8) -> &str {
        if team == 1 {
            &self.team1_name
        } else {
            &self.team2_name
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
