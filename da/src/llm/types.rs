//! LLM request/response types
//!
//! `GenerateRequest` is the provider-agnostic description of one call. The
//! wire types below model the Gemini `generateContent` endpoint.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single logical "generate text" request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Instructions for the model
    pub system_prompt: String,

    /// The actual question or task
    pub user_query: String,

    /// Earlier output the model should take into account
    pub prior_context: Option<String>,
}

impl GenerateRequest {
    pub fn new(system_prompt: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_query: user_query.into(),
            prior_context: None,
        }
    }

    /// Attach prior context; `None` or blank text leaves the request unchanged
    pub fn with_prior_context(mut self, context: Option<impl Into<String>>) -> Self {
        self.prior_context = context.map(Into::into).filter(|c: &String| !c.trim().is_empty());
        self
    }

    /// The conversation in order: system, optional assistant context, user
    pub fn conversation(&self) -> Vec<Message> {
        debug!(has_context = self.prior_context.is_some(), "GenerateRequest::conversation: called");
        let mut messages = vec![Message::system(&self.system_prompt)];
        if let Some(context) = &self.prior_context {
            messages.push(Message::assistant(context));
        }
        messages.push(Message::user(&self.user_query));
        messages
    }

    /// Build the outbound body
    ///
    /// The conversation is serialized as JSON text and carried as the single
    /// text part of the request.
    pub fn to_payload(&self) -> Result<GenerateContentRequest, serde_json::Error> {
        let serialized = serde_json::to_string(&self.conversation())?;
        debug!(payload_len = serialized.len(), "GenerateRequest::to_payload: serialized conversation");
        Ok(GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: serialized }],
            }],
        })
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
    User,
}

// Gemini wire types

/// Body of a `generateContent` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// Body of a successful `generateContent` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first candidate's first part, if it carries any
    pub fn first_text(&self) -> Option<&str> {
        let text = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .filter(|t| !t.trim().is_empty());
        debug!(found = text.is_some(), "GenerateContentResponse::first_text: called");
        text
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

/// Error envelope returned with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl ApiErrorBody {
    /// Parse an error body, `None` if it is not the structured envelope
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error)
    }
}
