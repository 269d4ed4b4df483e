use std::{sync::Arc, time::Duration};

use axum::{
    Form, Json,
    extract::{
        Path, Query, State,
        rejection::{FormRejection, JsonRejection, QueryRejection},
    },
    response::Html,
};
use chrono::Utc;
use tokio::time::sleep;
use tracing::info;

use crate::{
    broadcast::{
        Audience, announce_results, vote_received, voting_started_for_admin,
        voting_started_for_projector,
    },
    error::AppError,
    models::{
        CreateSession, CreateSessionResponse, EndVotingResponse, StartVoting,
        StartVotingResponse, StatusResponse, TokenQuery, VoteForm, VoteResponse,
    },
    state::AppState,
    storage::BallotView,
};

pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSession>, JsonRejection>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let Json(payload) = payload?;
    let member_count = payload.members.len();

    let session = state.storage.write().await.create_session(
        payload.title,
        payload.description,
        payload.members,
        Utc::now(),
    );

    info!("Created session {} with {member_count} members", session.id);

    Ok(Json(CreateSessionResponse {
        session_id: session.id,
        status: "success",
    }))
}

pub async fn start_voting_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    payload: Result<Json<StartVoting>, JsonRejection>,
) -> Result<Json<StartVotingResponse>, AppError> {
    let Json(payload) = payload?;

    let duration_minutes = payload
        .duration_minutes
        .unwrap_or(state.config.default_voting_duration_minutes);
    if !state.config.voting_duration_range().contains(&duration_minutes) {
        return Err(AppError::InvalidDuration {
            min: state.config.min_voting_duration_minutes,
            max: state.config.max_voting_duration_minutes,
        });
    }

    // Events go out under the write lock so subscribers see them in state order.
    let mut storage = state.storage.write().await;
    let started = storage.start_voting(
        &session_id,
        payload.presenter_name,
        payload.topic_title,
        payload.topic_description,
        duration_minutes,
        Utc::now(),
    )?;

    state.hub.publish(
        Audience::Projector,
        &voting_started_for_projector(&session_id, &started.round),
    );
    state.hub.publish(
        Audience::Admin,
        &voting_started_for_admin(&session_id, started.tokens.len()),
    );
    drop(storage);

    tokio::spawn(close_after(
        state.clone(),
        session_id.clone(),
        started.round.round,
        Duration::from_secs(u64::from(duration_minutes) * 60),
    ));

    info!(
        "Started voting for session {session_id}, {} tokens, {duration_minutes} min",
        started.tokens.len()
    );

    Ok(Json(StartVotingResponse {
        status: "success",
        tokens: started.tokens,
        voting_ends_at: started.round.end_time,
    }))
}

/// Closes the round once its time is up, unless it was closed or replaced meanwhile.
pub async fn close_after(state: Arc<AppState>, session_id: String, round: u64, after: Duration) {
    sleep(after).await;

    let mut storage = state.storage.write().await;

    if let Some(results) = storage.end_round(&session_id, round) {
        announce_results(&state.hub, &session_id, &results);
        info!("Voting for session {session_id} timed out. Results: {results:?}");
    }
}

pub async fn end_voting_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<EndVotingResponse>, AppError> {
    let mut storage = state.storage.write().await;
    let closed = storage.end_voting(&session_id)?;

    if closed.just_closed {
        announce_results(&state.hub, &session_id, &closed.results);
        info!(
            "Ended voting for session {session_id}. Results: {:?}",
            closed.results
        );
    }
    drop(storage);

    Ok(Json(EndVotingResponse {
        status: "success",
        results: closed.results,
    }))
}

pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    form: Result<Form<VoteForm>, FormRejection>,
) -> Result<Json<VoteResponse>, AppError> {
    let Form(form) = form?;

    let mut storage = state.storage.write().await;
    let receipt = storage.submit_vote(&form.token, &form.choice, Utc::now())?;

    // Published before the lock is released, so tallies never arrive out of order.
    state.hub.publish(
        Audience::Admin,
        &vote_received(
            &receipt.session_id,
            &receipt.current_votes,
            receipt.total_members,
        ),
    );
    drop(storage);

    info!("Received a vote for session {}", receipt.session_id);

    Ok(Json(VoteResponse {
        status: "success",
        message: "Vote accepted",
    }))
}

pub async fn vote_page_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Result<Html<String>, AppError> {
    let Query(query) = query?;
    let view = state.storage.read().await.ballot(&query.token)?;

    let page = match view {
        BallotView::Used => state.pages.already_voted()?,
        BallotView::Inactive => state.pages.voting_inactive()?,
        BallotView::Open(round) => state.pages.ballot(&query.token, &round)?,
    };

    Ok(page)
}

pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let snapshot = state.storage.read().await.snapshot(&session_id)?;

    Ok(Json(StatusResponse {
        session: snapshot.session,
        voting: snapshot.voting,
        current_votes: snapshot.current_votes,
        total_members: snapshot.total_members,
    }))
}
