use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc, serde::ts_seconds};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    For,
    Against,
    Abstain,
}

impl FromStr for Choice {
    type Err = AppError;

    /// Accepts the English labels and the legacy Russian ones.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "for" | "за" => Ok(Choice::For),
            "against" | "против" => Ok(Choice::Against),
            "abstain" | "воздержался" => Ok(Choice::Abstain),
            _ => Err(AppError::InvalidChoice),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Choice::For => "for",
            Choice::Against => "against",
            Choice::Abstain => "abstain",
        };

        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    #[serde(rename = "for")]
    pub in_favour: usize,
    pub against: usize,
    pub abstain: usize,
}

impl Tally {
    pub fn record(&mut self, choice: Choice) {
        match choice {
            Choice::For => self.in_favour += 1,
            Choice::Against => self.against += 1,
            Choice::Abstain => self.abstain += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.in_favour + self.against + self.abstain
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Voting,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Active,
    Completed,
}

#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub contact: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct VotingRound {
    #[serde(skip)]
    pub round: u64,
    pub presenter_name: String,
    pub topic_title: String,
    pub topic_description: String,
    #[serde(with = "ts_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: RoundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Tally>,
}

pub struct TokenRecord {
    pub session_id: String,
    pub round: u64,
    pub member_name: String,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub voted_at: Option<DateTime<Utc>>,
}

/// A cast vote. Carries no member identity, only the keyed token hash.
pub struct VoteRecord {
    pub choice: Choice,
    pub timestamp: DateTime<Utc>,
    pub token_hash: String,
}

#[derive(Deserialize)]
pub struct CreateSession {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub members: Vec<Member>,
}

#[derive(Deserialize)]
pub struct StartVoting {
    pub presenter_name: String,
    pub topic_title: String,
    #[serde(default)]
    pub topic_description: String,
    pub duration_minutes: Option<u32>,
}

#[derive(Deserialize)]
pub struct VoteForm {
    pub token: String,
    pub choice: String,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub status: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct IssuedToken {
    pub member: String,
    pub contact: String,
    pub token: String,
    pub voting_url: String,
}

#[derive(Serialize)]
pub struct StartVotingResponse {
    pub status: &'static str,
    pub tokens: Vec<IssuedToken>,
    #[serde(with = "ts_seconds")]
    pub voting_ends_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct EndVotingResponse {
    pub status: &'static str,
    pub results: Tally,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub session: Session,
    pub voting: Option<VotingRound>,
    pub current_votes: Tally,
    pub total_members: usize,
}
