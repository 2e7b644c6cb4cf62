//! Structured errors shared by the recorder, the player and the CLI

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MalformedRecording,
    ResolutionMismatch,
    InjectionFailure,
    InvalidParameter,
    ConcurrentSessionConflict,
    InvalidState,
    Unsupported,
    Io,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::MalformedRecording,
            format!("Malformed recording: {}", reason),
        )
    }

    pub fn resolution_mismatch(recorded: (u32, u32), current: (u32, u32)) -> Self {
        Self::new(
            ErrorCode::ResolutionMismatch,
            format!(
                "Recorded at {}x{}, current screen is {}x{}",
                recorded.0, recorded.1, current.0, current.1
            ),
        )
        .with_context(serde_json::json!({
            "recorded": { "width": recorded.0, "height": recorded.1 },
            "current": { "width": current.0, "height": current.1 },
        }))
    }

    pub fn injection_failed(action: &str, reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::InjectionFailure,
            format!("{} failed: {}", action, reason),
        )
    }

    pub fn invalid_parameter(name: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidParameter,
            format!("Invalid {}: {}", name, reason),
        )
    }

    pub fn concurrent_session(kind: &str) -> Self {
        Self::new(
            ErrorCode::ConcurrentSessionConflict,
            format!("A {} session is already active in this process", kind),
        )
        .with_suggestions(vec![format!("Stop or cancel the running {} first", kind)])
    }

    pub fn invalid_state(operation: &str, state: impl std::fmt::Debug) -> Self {
        Self::new(
            ErrorCode::InvalidState,
            format!("Cannot {} while {:?}", operation, state),
        )
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unsupported, message)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let e = Error::invalid_parameter("repeat count", "must be at least 1");
        assert_eq!(
            e.to_string(),
            "[InvalidParameter] Invalid repeat count: must be at least 1"
        );
    }

    #[test]
    fn mismatch_carries_both_resolutions() {
        let e = Error::resolution_mismatch((1920, 1080), (1280, 720));
        assert_eq!(e.code, ErrorCode::ResolutionMismatch);
        let ctx = e.context.unwrap();
        assert_eq!(ctx["recorded"]["width"], 1920);
        assert_eq!(ctx["current"]["height"], 720);
    }

    #[test]
    fn serializes_code_screaming_snake() {
        let e = Error::concurrent_session("recording");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["code"], "CONCURRENT_SESSION_CONFLICT");
        assert!(json.get("context").is_none());
    }
}
