//! Gemini client workflow: resumable upload, readiness polling, diagnosis
//! generation, and follow-up chat. One invocation runs upload -> poll ->
//! generate strictly in sequence; every failure is fatal to that invocation
//! and retry is the caller's decision.

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::debug;

use crate::constants::{BASE_URL, MAX_POLL_ATTEMPTS, POLL_INTERVAL};
use crate::core::{ConversationTurn, DiagnosisResult, FileState, MediaAsset};
use crate::error::WorkflowError;
use crate::prompts::DIAGNOSIS_PROMPT;
use crate::telemetry::{RequestEvent, RunMonitor};
use crate::transport::{CancelToken, Delay, Transport, WireBody, WireRequest};

pub struct GeminiClient<T: Transport, D: Delay> {
    api_key: String,
    model: String,
    transport: T,
    delay: D,
    monitor: RunMonitor,
}

impl<T: Transport, D: Delay> GeminiClient<T, D> {
    pub fn new(api_key: String, model: String, transport: T, delay: D, monitor: RunMonitor) -> Self {
        Self {
            api_key,
            model,
            transport,
            delay,
            monitor,
        }
    }

    /// Full analysis entry point: upload the asset, wait for the remote file
    /// to become ACTIVE, then request the diagnosis. The caller stamps the
    /// result and owns persistence.
    pub async fn analyze(
        &self,
        asset: &MediaAsset,
        cancel: &CancelToken,
    ) -> Result<DiagnosisResult, WorkflowError> {
        let uri = self.upload(asset).await?;
        self.await_active(&uri, cancel).await?;
        self.request_diagnosis(&uri, &asset.mime_type).await
    }

    /// Two-phase resumable upload. Exactly two round-trips, no retry; returns
    /// the remote file URI, the only handle later phases need.
    pub async fn upload(&self, asset: &MediaAsset) -> Result<String, WorkflowError> {
        let start = WireRequest {
            method: Method::POST,
            url: format!("{BASE_URL}/upload/v1beta/files?key={}", self.api_key),
            headers: vec![
                ("X-Goog-Upload-Protocol", "resumable".to_string()),
                ("X-Goog-Upload-Command", "start".to_string()),
                (
                    "X-Goog-Upload-Header-Content-Length",
                    asset.len().to_string(),
                ),
                ("X-Goog-Upload-Header-Content-Type", asset.mime_type.clone()),
            ],
            body: WireBody::Json(json!({"file": {"display_name": asset.display_name}})),
        };
        let response = self.send("files.upload.start", start, WorkflowError::Upload).await?;
        if !response.status.is_success() {
            return Err(WorkflowError::Upload(format!(
                "failed to start upload: {}",
                status_text(response.status)
            )));
        }
        let session_url = response
            .header("x-goog-upload-url")
            .ok_or_else(|| WorkflowError::Upload("missing X-Goog-Upload-URL header".to_string()))?
            .to_string();

        let transfer = WireRequest {
            method: Method::POST,
            url: session_url,
            headers: vec![
                ("X-Goog-Upload-Protocol", "resumable".to_string()),
                ("X-Goog-Upload-Command", "upload, finalize".to_string()),
                ("X-Goog-Upload-Offset", "0".to_string()),
                ("Content-Length", asset.len().to_string()),
            ],
            body: WireBody::Bytes(asset.bytes.clone()),
        };
        let response = self
            .send("files.upload.finalize", transfer, WorkflowError::Upload)
            .await?;
        if !response.status.is_success() {
            return Err(WorkflowError::Upload(format!(
                "failed to upload file: {}",
                status_text(response.status)
            )));
        }
        let payload: Value = serde_json::from_slice(&response.body)
            .map_err(|err| WorkflowError::Upload(format!("decoding upload response: {err}")))?;
        let uri = payload
            .get("file")
            .and_then(|file| file.get("uri"))
            .and_then(|value| value.as_str())
            .ok_or_else(|| WorkflowError::Upload("upload response missing file.uri".to_string()))?
            .to_string();
        debug!(%uri, name = %asset.display_name, bytes = asset.len(), "file uploaded");
        Ok(uri)
    }

    /// Poll the file descriptor until the remote reports ACTIVE. Fixed
    /// 2-second interval, at most `MAX_POLL_ATTEMPTS` checks; FAILED and
    /// transport-level trouble are terminal, anything non-terminal sleeps
    /// and retries. The inter-poll sleep races the cancellation token.
    pub async fn await_active(
        &self,
        resource_uri: &str,
        cancel: &CancelToken,
    ) -> Result<(), WorkflowError> {
        let check_url = format!("{resource_uri}?key={}", self.api_key);
        for attempt in 0..MAX_POLL_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(WorkflowError::Cancelled);
            }
            let request = WireRequest {
                method: Method::GET,
                url: check_url.clone(),
                headers: Vec::new(),
                body: WireBody::Empty,
            };
            let response = self.send("files.get", request, WorkflowError::Poll).await?;
            if !response.status.is_success() {
                return Err(WorkflowError::Poll(format!(
                    "failed to check file state: {}",
                    status_text(response.status)
                )));
            }
            let payload: Value = serde_json::from_slice(&response.body)
                .map_err(|err| WorkflowError::Poll(format!("decoding file descriptor: {err}")))?;
            let raw_state = payload
                .get("state")
                .and_then(|value| value.as_str())
                .unwrap_or_default();
            match FileState::parse(raw_state) {
                FileState::Active => return Ok(()),
                FileState::Failed => {
                    return Err(WorkflowError::RemoteProcessing(
                        "file processing failed on server".to_string(),
                    ))
                }
                FileState::Processing => {
                    debug!(attempt, state = raw_state, "file not ready");
                    tokio::select! {
                        _ = self.delay.sleep(POLL_INTERVAL) => {}
                        _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
                    }
                }
            }
        }
        Err(WorkflowError::Timeout(MAX_POLL_ATTEMPTS))
    }

    /// One generation request referencing the uploaded file, parsed into a
    /// `DiagnosisResult`. A response that does not deserialize into the
    /// expected shape is a hard error; no repair, no partial result.
    pub async fn request_diagnosis(
        &self,
        resource_uri: &str,
        mime_type: &str,
    ) -> Result<DiagnosisResult, WorkflowError> {
        let body = json!({
            "contents": [{
                "parts": [
                    {"text": DIAGNOSIS_PROMPT},
                    {"file_data": {"mime_type": mime_type, "file_uri": resource_uri}},
                ]
            }]
        });
        let text = self.generate(body).await?;
        let cleaned = strip_code_fences(&text);
        let result: DiagnosisResult = serde_json::from_str(&cleaned).map_err(|err| {
            WorkflowError::Schema(format!("diagnosis payload is not valid JSON: {err}"))
        })?;
        validate_diagnosis(&result)?;
        Ok(result)
    }

    /// Conversational follow-up. History roles map onto the transport
    /// vocabulary (`user` stays `user`, anything else becomes `model`) and
    /// the new message is appended as the final user turn. The reply text is
    /// returned verbatim.
    pub async fn send_message(
        &self,
        history: &[ConversationTurn],
        message: &str,
        system_prompt: &str,
    ) -> Result<String, WorkflowError> {
        let mut contents: Vec<Value> = history
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role.wire_name(),
                    "parts": [{"text": turn.content}],
                })
            })
            .collect();
        contents.push(json!({"role": "user", "parts": [{"text": message}]}));
        let body = json!({
            "system_instruction": {"parts": [{"text": system_prompt}]},
            "contents": contents,
        });
        self.generate(body).await
    }

    async fn generate(&self, body: Value) -> Result<String, WorkflowError> {
        let request = WireRequest {
            method: Method::POST,
            url: format!(
                "{BASE_URL}/v1beta/models/{}:generateContent?key={}",
                self.model, self.api_key
            ),
            headers: Vec::new(),
            body: WireBody::Json(body),
        };
        let response = self
            .send("generateContent", request, WorkflowError::Generation)
            .await?;
        if !response.status.is_success() {
            // Prefer the remote-provided message over generic status text.
            let message = serde_json::from_slice::<Value>(&response.body)
                .ok()
                .and_then(|value| {
                    value
                        .get("error")
                        .and_then(|error| error.get("message"))
                        .and_then(|message| message.as_str())
                        .map(|message| message.to_string())
                })
                .unwrap_or_else(|| status_text(response.status));
            return Err(WorkflowError::Generation(format!(
                "generateContent failed ({}): {message}",
                response.status.as_u16()
            )));
        }
        let payload: Value = serde_json::from_slice(&response.body).map_err(|err| {
            WorkflowError::Generation(format!("decoding generateContent response: {err}"))
        })?;
        first_text_part(&payload)
            .map(|text| text.to_string())
            .ok_or_else(|| {
                WorkflowError::Generation("response carried no candidate text".to_string())
            })
    }

    async fn send(
        &self,
        operation: &str,
        request: WireRequest,
        wrap: fn(String) -> WorkflowError,
    ) -> Result<crate::transport::WireResponse, WorkflowError> {
        let started_at = OffsetDateTime::now_utc();
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|err| wrap(err.to_string()))?;
        self.monitor.record(RequestEvent {
            operation: operation.to_string(),
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            status: response.status.as_u16(),
        });
        Ok(response)
    }
}

fn first_text_part(payload: &Value) -> Option<&str> {
    payload
        .get("candidates")
        .and_then(|candidates| candidates.as_array())
        .and_then(|array| array.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array())
        .and_then(|array| array.first())
        .and_then(|part| part.get("text"))
        .and_then(|text| text.as_str())
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

fn validate_diagnosis(result: &DiagnosisResult) -> Result<(), WorkflowError> {
    if result.diagnosis.trim().is_empty() {
        return Err(WorkflowError::Schema(
            "diagnosis title is empty".to_string(),
        ));
    }
    if result.confidence > 100 {
        return Err(WorkflowError::Schema(format!(
            "confidence {} out of range 0-100",
            result.confidence
        )));
    }
    Ok(())
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(|reason| reason.to_string())
        .unwrap_or_else(|| status.to_string())
}
