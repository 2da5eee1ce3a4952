//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::dispatch::{Intent, IntentOutcome};
use crate::domain::Question;
use crate::views::{ResultsView, SessionSnapshot};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Parse {
        text: String,
    },
    StartQuiz {
        text: String,
    },
    Snapshot {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Select {
        #[serde(rename = "sessionId")]
        session_id: String,
        position: usize,
        letter: char,
    },
    Check {
        #[serde(rename = "sessionId")]
        session_id: String,
        position: usize,
    },
    Advance {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Complete {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Retake {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Results {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    CloseQuiz {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Parsed {
        questions: Vec<Question>,
    },
    /// The text holds no quiz; render it as plain narrative.
    Narrative {
        text: String,
    },
    Quiz {
        #[serde(rename = "sessionId")]
        session_id: String,
        resumed: bool,
        snapshot: SessionSnapshot,
    },
    Snapshot {
        snapshot: SessionSnapshot,
    },
    Outcome {
        #[serde(rename = "sessionId")]
        session_id: String,
        outcome: IntentOutcome,
    },
    Results {
        results: ResultsView,
    },
    Closed {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Deserialize)]
pub struct TextIn {
    pub text: String,
}

#[derive(Serialize)]
pub struct ParseOut {
    pub questions: Vec<Question>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOut {
    pub is_quiz: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SessionSnapshot>,
}

#[derive(Deserialize)]
pub struct SelectIn {
    pub position: usize,
    pub letter: char,
}

#[derive(Deserialize)]
pub struct CheckIn {
    pub position: usize,
}

impl From<SelectIn> for Intent {
    fn from(s: SelectIn) -> Self {
        Intent::Select { position: s.position, letter: s.letter }
    }
}

impl From<CheckIn> for Intent {
    fn from(c: CheckIn) -> Self {
        Intent::Check { position: c.position }
    }
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub oracle: &'static str,
    pub sessions: usize,
}
