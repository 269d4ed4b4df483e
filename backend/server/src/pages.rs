//! Server-rendered ballot pages.
//!
//! Templates are registered under `.html` names, so Tera autoescapes every value. The token is the one
//! value marked `safe`: it is inserted as a JSON string literal with `<` escaped.
use axum::response::Html;
use tera::{Context, Tera};

use crate::models::VotingRound;

const NOTICE: &str = "notice.html";
const BALLOT: &str = "ballot.html";

const NOTICE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Voting</title>
    <style>
        body { font-family: Arial, sans-serif; text-align: center; padding: 20px; background: #f0f2f5; }
        .container { max-width: 400px; margin: 0 auto; background: white; padding: 30px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
        .message { color: #666; font-size: 18px; }
    </style>
</head>
<body>
    <div class="container">
        <h2>{{ heading }}</h2>
        <p class="message">{{ message }}</p>
    </div>
</body>
</html>
"#;

const BALLOT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Voting - {{ round.topic_title }}</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 0; padding: 20px; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); min-height: 100vh; }
        .container { max-width: 400px; margin: 0 auto; background: white; padding: 30px; border-radius: 15px; box-shadow: 0 10px 30px rgba(0,0,0,0.2); }
        .header { margin-bottom: 30px; text-align: center; }
        .topic-title { color: #333; margin-bottom: 10px; font-size: 20px; font-weight: bold; }
        .presenter { color: #666; margin-bottom: 15px; }
        .description { color: #555; font-size: 14px; line-height: 1.4; margin-bottom: 20px; }
        .timer { background: #ff4757; color: white; padding: 10px; border-radius: 8px; font-size: 18px; font-weight: bold; margin-bottom: 30px; }
        .vote-buttons { display: flex; flex-direction: column; gap: 15px; }
        .vote-btn { padding: 15px; border: none; border-radius: 10px; font-size: 18px; font-weight: bold; cursor: pointer; text-transform: uppercase; }
        .vote-for { background: #2ed573; color: white; }
        .vote-against { background: #ff4757; color: white; }
        .vote-abstain { background: #ffa502; color: white; }
        .confirmation { display: none; text-align: center; padding: 20px; background: #f1f2f6; border-radius: 10px; margin-top: 20px; }
        .confirm-btn { background: #5352ed; color: white; margin-right: 10px; }
        .cancel-btn { background: #6c757d; color: white; }
        .success { display: none; text-align: center; color: #2ed573; font-size: 20px; font-weight: bold; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h2 class="topic-title">{{ round.topic_title }}</h2>
            <div class="presenter">Presenter: {{ round.presenter_name }}</div>
            <div class="description">{{ round.topic_description }}</div>
            <div class="timer" id="timer">Loading...</div>
        </div>

        <div id="voting-form">
            <div class="vote-buttons">
                <button class="vote-btn vote-for" data-choice="for" data-label="For">For</button>
                <button class="vote-btn vote-against" data-choice="against" data-label="Against">Against</button>
                <button class="vote-btn vote-abstain" data-choice="abstain" data-label="Abstain">Abstain</button>
            </div>

            <div class="confirmation" id="confirmation">
                <p>You selected: <strong id="selected-choice"></strong></p>
                <p>Confirm your vote?</p>
                <button class="vote-btn confirm-btn" id="confirm">Confirm</button>
                <button class="vote-btn cancel-btn" id="cancel">Cancel</button>
            </div>
        </div>

        <div class="success" id="success">
            <p>Your vote has been accepted.</p>
            <p>Thank you for taking part.</p>
        </div>
    </div>

    <script>
        const token = {{ token_json | safe }};
        const endTime = {{ round.end_time }} * 1000;
        let selectedChoice = '';

        function updateTimer() {
            const remaining = Math.max(0, endTime - Date.now());
            const minutes = Math.floor(remaining / 60000);
            const seconds = Math.floor((remaining % 60000) / 1000);
            const timer = document.getElementById('timer');

            if (remaining > 0) {
                timer.textContent = `Time left: ${minutes}:${seconds.toString().padStart(2, '0')}`;
            } else {
                timer.textContent = 'Voting time is over';
                timer.style.background = '#6c757d';
            }
        }

        setInterval(updateTimer, 1000);
        updateTimer();

        document.querySelectorAll('[data-choice]').forEach((button) => {
            button.addEventListener('click', () => {
                selectedChoice = button.dataset.choice;
                document.getElementById('selected-choice').textContent = button.dataset.label;
                document.getElementById('confirmation').style.display = 'block';
            });
        });

        document.getElementById('cancel').addEventListener('click', () => {
            selectedChoice = '';
            document.getElementById('confirmation').style.display = 'none';
        });

        document.getElementById('confirm').addEventListener('click', async () => {
            const body = new URLSearchParams({ token, choice: selectedChoice });

            try {
                const response = await fetch('/api/vote', { method: 'POST', body });

                if (response.ok) {
                    document.getElementById('voting-form').style.display = 'none';
                    document.getElementById('success').style.display = 'block';
                } else {
                    const error = await response.json();
                    alert('Error: ' + error.detail);
                }
            } catch (error) {
                alert('Connection error: ' + error.message);
            }
        });
    </script>
</body>
</html>
"#;


pub struct Pages {
    tera: Tera,
}

impl Pages {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates([(NOTICE, NOTICE_TEMPLATE), (BALLOT, BALLOT_TEMPLATE)])?;

        Ok(Self { tera })
    }

    fn notice(&self, heading: &str, message: &str) -> Result<Html<String>, tera::Error> {
        let mut context = Context::new();
        context.insert("heading", heading);
        context.insert("message", message);

        self.tera.render(NOTICE, &context).map(Html)
    }

    pub fn already_voted(&self) -> Result<Html<String>, tera::Error> {
        self.notice(
            "Voting finished",
            "You have already voted or the voting is over.",
        )
    }

    pub fn voting_inactive(&self) -> Result<Html<String>, tera::Error> {
        self.notice(
            "Voting is not active",
            "The voting has not started yet or is already over.",
        )
    }

    pub fn ballot(&self, token: &str, round: &VotingRound) -> Result<Html<String>, tera::Error> {
        // serde_json quotes the token, escaping keeps it inert inside <script>
        let token_json = serde_json::Value::from(token)
            .to_string()
            .replace('<', "\\u003c");

        let mut context = Context::new();
        context.insert("round", round);
        context.insert("token_json", &token_json);

        self.tera.render(BALLOT, &context).map(Html)
    }
}
