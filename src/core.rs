use anyhow::Context;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;

/// A local media blob staged for one analysis invocation.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub bytes: Bytes,
    pub mime_type: String,
    pub display_name: String,
}

impl MediaAsset {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let display_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self {
            bytes: Bytes::from(bytes),
            mime_type,
            display_name,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Remote-side processing state of an uploaded file, as observed by the
/// readiness poller. Unknown state strings are treated as non-terminal and
/// keep the poll loop running; the service's intermediate vocabulary is not
/// documented, so only ACTIVE and FAILED terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Active,
    Failed,
    Processing,
}

impl FileState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => FileState::Processing,
        }
    }
}

/// Structured diagnosis produced by the model. The timestamp is stamped by
/// the caller after a successful analysis, never by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub diagnosis: String,
    pub confidence: u8,
    pub root_cause: String,
    #[serde(default)]
    pub fixes: Vec<String>,
    #[serde(default)]
    pub visual_evidence: Vec<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model", other)]
    Model,
}

impl Role {
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_states_are_non_terminal() {
        assert_eq!(FileState::parse("ACTIVE"), FileState::Active);
        assert_eq!(FileState::parse("FAILED"), FileState::Failed);
        assert_eq!(FileState::parse("PROCESSING"), FileState::Processing);
        assert_eq!(FileState::parse("STATE_UNSPECIFIED"), FileState::Processing);
        assert_eq!(FileState::parse(""), FileState::Processing);
    }

    #[test]
    fn unknown_roles_deserialize_as_model() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(turn.role, Role::Model);
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(turn.role, Role::User);
    }

    #[test]
    fn diagnosis_round_trips_camel_case() {
        let json = r#"{
            "diagnosis": "Worn drive belt",
            "confidence": 88,
            "rootCause": "Belt glazing from slippage",
            "fixes": ["Replace the belt"],
            "visualEvidence": ["Shiny belt surface"]
        }"#;
        let result: DiagnosisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.diagnosis, "Worn drive belt");
        assert_eq!(result.confidence, 88);
        assert!(result.timestamp.is_none());
        let text = serde_json::to_string(&result).unwrap();
        assert!(text.contains("rootCause"));
        assert!(text.contains("visualEvidence"));
        assert!(!text.contains("timestamp"));
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let result: DiagnosisResult = serde_json::from_str(
            r#"{"diagnosis":"No Machine Detected","confidence":99,"rootCause":"The frame shows a cat"}"#,
        )
        .unwrap();
        assert!(result.fixes.is_empty());
        assert!(result.visual_evidence.is_empty());
    }
}
