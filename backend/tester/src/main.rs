//! Plays one full round against a running server: session, start, votes, results.
use std::env;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

const CHOICES: [&str; 3] = ["for", "against", "abstain"];

#[derive(Deserialize)]
struct Created {
    session_id: String,
}

#[derive(Deserialize)]
struct Issued {
    member: String,
    token: String,
}

#[derive(Deserialize)]
struct Started {
    tokens: Vec<Issued>,
    voting_ends_at: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let members: usize = env::var("MEMBERS")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .context("MEMBERS must be a number")?;

    let client = Client::new();

    let roster: Vec<Value> = (1..=members)
        .map(|i| json!({ "name": format!("Member {i}"), "contact": format!("member{i}@example.com") }))
        .collect();

    let created: Created = client
        .post(format!("{base_url}/api/admin/create-session"))
        .json(&json!({ "title": "Tester session", "description": "Scripted round", "members": roster }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("Session: {}", created.session_id);

    let started: Started = client
        .post(format!("{base_url}/api/admin/start-voting/{}", created.session_id))
        .json(&json!({
            "presenter_name": "Tester",
            "topic_title": "Scripted topic",
            "topic_description": "Generated by the tester",
            "duration_minutes": 1
        }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!(
        "Issued {} tokens, voting ends at {}",
        started.tokens.len(),
        started.voting_ends_at
    );

    // Last member stays silent so the abstain fallback shows up in the results.
    let voters = started.tokens.len().saturating_sub(1);
    for (i, issued) in started.tokens.iter().take(voters).enumerate() {
        let choice = CHOICES[i % CHOICES.len()];

        let response = client
            .post(format!("{base_url}/api/vote"))
            .form(&[("token", issued.token.as_str()), ("choice", choice)])
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Vote for {} rejected: {}", issued.member, response.text().await?);
        }
        println!("{} voted {choice}", issued.member);
    }

    let results: Value = client
        .post(format!("{base_url}/api/admin/end-voting/{}", created.session_id))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("Results: {}", results["results"]);

    Ok(())
}
