//! # Storage
//!
//! In-memory state of every session, round, token and vote.
//!
//! ## Layout
//!
//! - Sessions keyed by id. Each entry owns its member roster, the current round and the votes of that round
//! - Tokens keyed by the raw token string, pointing back to a session and a round number
//! - Votes hold the choice and a keyed token hash only, never the member
//!
//! ## Rounds
//!
//! - A session runs at most one round at a time
//! - Starting a new round after a completed one drops the old votes and tokens
//! - Every round gets a fresh number, so a late auto-close timer can tell its round is gone
//!
//! Every operation takes `now` explicitly. Handlers pass `Utc::now()`.
use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    error::AppError,
    models::{
        Choice, IssuedToken, Member, RoundStatus, Session, SessionStatus, Tally, TokenRecord,
        VoteRecord, VotingRound,
    },
    utils::{TokenHasher, generate_session_id, generate_token},
};

pub struct TokenPolicy {
    pub token_length: usize,
    pub expire_buffer_minutes: u32,
}

struct SessionEntry {
    session: Session,
    members: Vec<Member>,
    voting: Option<VotingRound>,
    votes: Vec<VoteRecord>,
}

impl SessionEntry {
    fn current_votes(&self) -> Tally {
        let mut tally = Tally::default();
        for vote in &self.votes {
            tally.record(vote.choice);
        }

        tally
    }
}

pub struct StartedVoting {
    pub round: VotingRound,
    pub tokens: Vec<IssuedToken>,
}

pub struct ClosedVoting {
    pub results: Tally,
    /// False when the round had already been closed earlier.
    pub just_closed: bool,
}

pub struct VoteReceipt {
    pub session_id: String,
    pub current_votes: Tally,
    pub total_members: usize,
}

pub struct SessionSnapshot {
    pub session: Session,
    pub voting: Option<VotingRound>,
    pub current_votes: Tally,
    pub total_members: usize,
}

pub enum BallotView {
    Used,
    Inactive,
    Open(VotingRound),
}

pub struct Storage {
    sessions: HashMap<String, SessionEntry>,
    tokens: HashMap<String, TokenRecord>,
    hasher: TokenHasher,
    policy: TokenPolicy,
    next_round: u64,
}

impl Storage {
    pub fn new(hasher: TokenHasher, policy: TokenPolicy) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            hasher,
            policy,
            next_round: 1,
        }
    }

    pub fn create_session(
        &mut self,
        title: String,
        description: String,
        members: Vec<Member>,
        now: DateTime<Utc>,
    ) -> Session {
        let session = Session {
            id: generate_session_id(),
            title,
            description,
            created_at: now,
            status: SessionStatus::Created,
        };

        self.sessions.insert(
            session.id.clone(),
            SessionEntry {
                session: session.clone(),
                members,
                voting: None,
                votes: Vec::new(),
            },
        );

        session
    }

    /// Opens a round and issues one token per member.
    pub fn start_voting(
        &mut self,
        session_id: &str,
        presenter_name: String,
        topic_title: String,
        topic_description: String,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<StartedVoting, AppError> {
        let entry = self
            .sessions
            .get_mut(session_id)
            .ok_or(AppError::SessionNotFound)?;

        if matches!(&entry.voting, Some(voting) if voting.status == RoundStatus::Active) {
            return Err(AppError::VotingAlreadyActive);
        }

        let round = self.next_round;
        self.next_round += 1;

        // Tokens and votes of a previous round never carry over.
        self.tokens.retain(|_, record| record.session_id != session_id);
        entry.votes.clear();

        let duration = TimeDelta::minutes(i64::from(duration_minutes));
        let end_time = now + duration;
        let expires_at = end_time + TimeDelta::minutes(i64::from(self.policy.expire_buffer_minutes));

        let mut tokens = Vec::with_capacity(entry.members.len());
        for member in &entry.members {
            let token = generate_token(self.policy.token_length);

            self.tokens.insert(
                token.clone(),
                TokenRecord {
                    session_id: session_id.to_string(),
                    round,
                    member_name: member.name.clone(),
                    used: false,
                    expires_at,
                    created_at: now,
                    voted_at: None,
                },
            );

            tokens.push(IssuedToken {
                member: member.name.clone(),
                contact: member.contact.clone(),
                voting_url: format!("/vote?token={token}"),
                token,
            });
        }

        let voting = VotingRound {
            round,
            presenter_name,
            topic_title,
            topic_description,
            start_time: now,
            end_time,
            duration_minutes,
            status: RoundStatus::Active,
            results: None,
        };

        entry.voting = Some(voting.clone());
        entry.session.status = SessionStatus::Voting;

        Ok(StartedVoting {
            round: voting,
            tokens,
        })
    }

    /// Closes the current round. Closing a completed round returns its stored results.
    pub fn end_voting(&mut self, session_id: &str) -> Result<ClosedVoting, AppError> {
        let round = self
            .sessions
            .get(session_id)
            .and_then(|entry| entry.voting.as_ref())
            .ok_or(AppError::VotingNotFound)?
            .round;

        self.close_round(session_id, round)
            .ok_or(AppError::VotingNotFound)
    }

    /// Closes `round` only if it is still the active round of the session.
    pub fn end_round(&mut self, session_id: &str, round: u64) -> Option<Tally> {
        match self.close_round(session_id, round) {
            Some(closed) if closed.just_closed => Some(closed.results),
            _ => None,
        }
    }

    fn close_round(&mut self, session_id: &str, round: u64) -> Option<ClosedVoting> {
        let entry = self.sessions.get_mut(session_id)?;
        let voting = entry.voting.as_mut().filter(|voting| voting.round == round)?;

        if let (RoundStatus::Completed, Some(results)) = (voting.status, voting.results) {
            return Some(ClosedVoting {
                results,
                just_closed: false,
            });
        }

        let mut results = Tally::default();
        for vote in &entry.votes {
            results.record(vote.choice);
        }

        // Members who never voted count as abstaining.
        let unused = self
            .tokens
            .values()
            .filter(|record| record.session_id == session_id && record.round == round)
            .filter(|record| !record.used)
            .count();
        results.abstain += unused;

        voting.status = RoundStatus::Completed;
        voting.results = Some(results);
        entry.session.status = SessionStatus::Completed;

        Some(ClosedVoting {
            results,
            just_closed: true,
        })
    }

    pub fn submit_vote(
        &mut self,
        token: &str,
        choice: &str,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt, AppError> {
        let record = self.tokens.get(token).ok_or(AppError::InvalidToken)?;

        if record.used {
            return Err(AppError::TokenUsed);
        }

        if now > record.expires_at {
            return Err(AppError::TokenExpired);
        }

        let session_id = record.session_id.clone();
        let round = record.round;

        let entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(AppError::VotingInactive)?;

        let active = entry
            .voting
            .as_ref()
            .is_some_and(|voting| voting.round == round && voting.status == RoundStatus::Active);
        if !active {
            return Err(AppError::VotingInactive);
        }

        let choice: Choice = choice.parse()?;

        entry.votes.push(VoteRecord {
            choice,
            timestamp: now,
            token_hash: self.hasher.hash(token),
        });

        if let Some(record) = self.tokens.get_mut(token) {
            record.used = true;
            record.voted_at = Some(now);
        }

        Ok(VoteReceipt {
            session_id,
            current_votes: entry.current_votes(),
            total_members: entry.members.len(),
        })
    }

    pub fn ballot(&self, token: &str) -> Result<BallotView, AppError> {
        let record = self.tokens.get(token).ok_or(AppError::InvalidToken)?;

        if record.used {
            return Ok(BallotView::Used);
        }

        let voting = self
            .sessions
            .get(&record.session_id)
            .and_then(|entry| entry.voting.as_ref())
            .filter(|voting| voting.round == record.round && voting.status == RoundStatus::Active);

        Ok(match voting {
            Some(voting) => BallotView::Open(voting.clone()),
            None => BallotView::Inactive,
        })
    }

    pub fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, AppError> {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or(AppError::SessionNotFound)?;

        Ok(SessionSnapshot {
            session: entry.session.clone(),
            voting: entry.voting.clone(),
            current_votes: entry.current_votes(),
            total_members: entry.members.len(),
        })
    }

    /// Hashes of the tokens behind the recorded votes of a session.
    pub fn vote_hashes(&self, session_id: &str) -> Vec<String> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.votes.iter().map(|vote| vote.token_hash.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> Storage {
        Storage::new(
            TokenHasher::new("test-secret").unwrap(),
            TokenPolicy {
                token_length: 32,
                expire_buffer_minutes: 5,
            },
        )
    }

    fn members(count: usize) -> Vec<Member> {
        (0..count)
            .map(|i| Member {
                name: format!("Member {i}"),
                contact: format!("member{i}@example.com"),
            })
            .collect()
    }

    fn open_round(storage: &mut Storage, count: usize, now: DateTime<Utc>) -> (String, StartedVoting) {
        let session = storage.create_session(
            "Board meeting".into(),
            "Quarterly".into(),
            members(count),
            now,
        );
        let started = storage
            .start_voting(
                &session.id,
                "Alice".into(),
                "Budget".into(),
                "Approve the budget".into(),
                5,
                now,
            )
            .unwrap();

        (session.id, started)
    }

    #[test]
    fn test_create_session() {
        let mut storage = storage();
        let now = Utc::now();
        let session = storage.create_session("T".into(), "D".into(), members(3), now);

        let snapshot = storage.snapshot(&session.id).unwrap();
        assert_eq!(snapshot.session.status, SessionStatus::Created);
        assert_eq!(snapshot.total_members, 3);
        assert!(snapshot.voting.is_none());
        assert_eq!(snapshot.current_votes, Tally::default());
    }

    #[test]
    fn test_start_voting_issues_one_token_per_member() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, started) = open_round(&mut storage, 4, now);

        assert_eq!(started.tokens.len(), 4);
        assert_eq!(started.round.end_time, now + TimeDelta::minutes(5));
        assert!(started.tokens[0].voting_url.starts_with("/vote?token="));
        assert_eq!(
            storage.snapshot(&session_id).unwrap().session.status,
            SessionStatus::Voting
        );
    }

    #[test]
    fn test_start_voting_unknown_session() {
        let mut storage = storage();
        let result = storage.start_voting("nope", "A".into(), "B".into(), "C".into(), 5, Utc::now());

        assert!(matches!(result, Err(AppError::SessionNotFound)));
    }

    #[test]
    fn test_start_voting_twice_conflicts() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, _) = open_round(&mut storage, 2, now);

        let result = storage.start_voting(&session_id, "A".into(), "B".into(), "C".into(), 5, now);
        assert!(matches!(result, Err(AppError::VotingAlreadyActive)));
    }

    #[test]
    fn test_vote_checks() {
        let mut storage = storage();
        let now = Utc::now();
        let (_, started) = open_round(&mut storage, 3, now);
        let token = &started.tokens[0].token;

        assert!(matches!(
            storage.submit_vote("missing", "for", now),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            storage.submit_vote(token, "perhaps", now),
            Err(AppError::InvalidChoice)
        ));

        let receipt = storage.submit_vote(token, "for", now).unwrap();
        assert_eq!(receipt.current_votes.in_favour, 1);
        assert_eq!(receipt.total_members, 3);

        assert!(matches!(
            storage.submit_vote(token, "against", now),
            Err(AppError::TokenUsed)
        ));

        // duration plus buffer
        let late = now + TimeDelta::minutes(11);
        assert!(matches!(
            storage.submit_vote(&started.tokens[1].token, "for", late),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn test_vote_after_close_is_inactive() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, started) = open_round(&mut storage, 2, now);

        storage.end_voting(&session_id).unwrap();

        assert!(matches!(
            storage.submit_vote(&started.tokens[0].token, "for", now),
            Err(AppError::VotingInactive)
        ));
    }

    #[test]
    fn test_votes_store_hash_only() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, started) = open_round(&mut storage, 1, now);
        let token = started.tokens[0].token.clone();

        storage.submit_vote(&token, "against", now).unwrap();

        let hashes = storage.vote_hashes(&session_id);
        assert_eq!(hashes.len(), 1);
        assert_ne!(hashes[0], token);
        assert_eq!(hashes[0], TokenHasher::new("test-secret").unwrap().hash(&token));
    }

    #[test]
    fn test_unused_tokens_abstain() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, started) = open_round(&mut storage, 5, now);

        storage.submit_vote(&started.tokens[0].token, "for", now).unwrap();
        storage.submit_vote(&started.tokens[1].token, "for", now).unwrap();
        storage.submit_vote(&started.tokens[2].token, "against", now).unwrap();

        let closed = storage.end_voting(&session_id).unwrap();
        assert!(closed.just_closed);
        assert_eq!(
            closed.results,
            Tally {
                in_favour: 2,
                against: 1,
                abstain: 2,
            }
        );
        assert_eq!(closed.results.total(), 5);

        let snapshot = storage.snapshot(&session_id).unwrap();
        assert_eq!(closed.results.total(), snapshot.total_members);
        assert_eq!(snapshot.session.status, SessionStatus::Completed);
        assert_eq!(snapshot.voting.unwrap().results, Some(closed.results));
    }

    #[test]
    fn test_end_voting_is_idempotent() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, _) = open_round(&mut storage, 2, now);

        let first = storage.end_voting(&session_id).unwrap();
        let second = storage.end_voting(&session_id).unwrap();

        assert!(!second.just_closed);
        assert_eq!(first.results, second.results);
    }

    #[test]
    fn test_end_voting_without_round() {
        let mut storage = storage();
        let session = storage.create_session("T".into(), "D".into(), members(1), Utc::now());

        assert!(matches!(
            storage.end_voting(&session.id),
            Err(AppError::VotingNotFound)
        ));
        assert!(matches!(
            storage.end_voting("missing"),
            Err(AppError::VotingNotFound)
        ));
    }

    #[test]
    fn test_stale_round_is_not_closed() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, first) = open_round(&mut storage, 2, now);

        storage.end_voting(&session_id).unwrap();
        let second = storage
            .start_voting(&session_id, "Bob".into(), "Next".into(), "".into(), 5, now)
            .unwrap();

        assert_eq!(storage.end_round(&session_id, first.round.round), None);
        assert!(storage.end_round(&session_id, second.round.round).is_some());
        assert_eq!(storage.end_round(&session_id, second.round.round), None);
    }

    #[test]
    fn test_new_round_invalidates_old_tokens() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, first) = open_round(&mut storage, 2, now);

        storage.submit_vote(&first.tokens[0].token, "for", now).unwrap();
        storage.end_voting(&session_id).unwrap();
        storage
            .start_voting(&session_id, "Bob".into(), "Next".into(), "".into(), 5, now)
            .unwrap();

        assert!(matches!(
            storage.submit_vote(&first.tokens[1].token, "for", now),
            Err(AppError::InvalidToken)
        ));
        assert_eq!(storage.snapshot(&session_id).unwrap().current_votes.total(), 0);
    }

    #[test]
    fn test_ballot_views() {
        let mut storage = storage();
        let now = Utc::now();
        let (session_id, started) = open_round(&mut storage, 2, now);

        assert!(matches!(storage.ballot("missing"), Err(AppError::InvalidToken)));
        assert!(matches!(
            storage.ballot(&started.tokens[0].token),
            Ok(BallotView::Open(_))
        ));

        storage.submit_vote(&started.tokens[0].token, "for", now).unwrap();
        assert!(matches!(
            storage.ballot(&started.tokens[0].token),
            Ok(BallotView::Used)
        ));

        storage.end_voting(&session_id).unwrap();
        assert!(matches!(
            storage.ballot(&started.tokens[1].token),
            Ok(BallotView::Inactive)
        ));
    }
}
