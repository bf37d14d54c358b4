//! Completion client with a single degraded-shape fallback.
//!
//! Some Cortex model versions reject the structured options argument of
//! `COMPLETE`. The client first sends the temperature as a structured option;
//! when the service answers with one of the known "options not accepted"
//! signatures, it retries exactly once without options, carrying the
//! requested temperature as an annotation line at the top of the prompt.
//! Every other failure is returned as-is.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::ServiceError;

/// Error-message fragments meaning "this model/version does not accept the
/// structured options argument".
///
/// Matching on message text is brittle; keep every marker here so the set can
/// be swapped for typed error codes in one place.
const OPTIONS_REJECTED_SIGNATURES: [&str; 3] = [
    "COMPLETE$V6",
    "Invalid argument types",
    "needs to be a string literal",
];

/// Structured generation parameters sent alongside the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
}

/// Result of a successful completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub response: String,
}

/// Hosted completion endpoint.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete `prompt` with `model`. `options` is omitted from the request
    /// entirely when `None`.
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        options: Option<GenerationOptions>,
    ) -> Result<CompletionResponse, ServiceError>;
}

/// How a failed primary call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service refused the structured options; `signature` is the marker
    /// that matched.
    OptionsRejected { signature: &'static str },
    /// Anything else. Never retried.
    Other,
}

/// Classify a completion failure by its message text.
pub fn classify_failure(err: &ServiceError) -> FailureKind {
    classify_message(&err.message())
}

fn classify_message(message: &str) -> FailureKind {
    OPTIONS_REJECTED_SIGNATURES
        .into_iter()
        .find(|sig| message.contains(*sig))
        .map(|sig| FailureKind::OptionsRejected { signature: sig })
        .unwrap_or(FailureKind::Other)
}

/// Prefix `prompt` with the human-readable temperature annotation used by the
/// fallback request.
pub fn annotate_temperature(prompt: &str, temperature: f32) -> String {
    format!("[Température demandée: {temperature:?}]\n{prompt}")
}

/// Calls a [`CompletionService`], falling back once when structured options
/// are rejected.
#[derive(Clone)]
pub struct CompletionClient {
    service: Arc<dyn CompletionService>,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CompletionClient")
    }
}

impl CompletionClient {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Return the model's text for `prompt`.
    ///
    /// At most two service calls are made.
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn complete(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, ServiceError> {
        let primary = self
            .service
            .complete(model, prompt, Some(GenerationOptions { temperature }))
            .await;

        let err = match primary {
            Ok(res) => {
                info!(output_len = res.response.len(), "completion done");
                return Ok(res.response);
            }
            Err(err) => err,
        };

        let FailureKind::OptionsRejected { signature } = classify_failure(&err) else {
            return Err(err);
        };

        warn!(
            signature,
            error = %err,
            "structured options rejected; retrying with temperature in prompt"
        );
        let fallback_prompt = annotate_temperature(prompt, temperature);
        let res = self.service.complete(model, &fallback_prompt, None).await?;
        info!(output_len = res.response.len(), "completion done via fallback");
        Ok(res.response)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tracing_test::traced_test;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        model: String,
        prompt: String,
        options: Option<GenerationOptions>,
    }

    /// Replays scripted results and records every call it receives.
    #[derive(Default)]
    struct ScriptedService {
        script: Mutex<VecDeque<Result<CompletionResponse, ServiceError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedService {
        fn new(script: Vec<Result<&str, &str>>) -> Arc<Self> {
            let script = script
                .into_iter()
                .map(|r| {
                    r.map(|s| CompletionResponse { response: s.to_owned() })
                        .map_err(|m| ServiceError::Rejected(m.to_owned()))
                })
                .collect();
            Arc::new(Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(
            &self,
            model: &str,
            prompt: &str,
            options: Option<GenerationOptions>,
        ) -> Result<CompletionResponse, ServiceError> {
            self.calls.lock().unwrap().push(Call {
                model: model.to_owned(),
                prompt: prompt.to_owned(),
                options,
            });
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ServiceError::Rejected("script exhausted".into())))
        }
    }

    fn client(service: &Arc<ScriptedService>) -> CompletionClient {
        CompletionClient::new(service.clone())
    }

    #[tokio::test]
    async fn primary_success_makes_one_call_with_options() {
        let service = ScriptedService::new(vec![Ok("4")]);
        let out = client(&service)
            .complete("mistral-large", "2+2?", 0.7)
            .await
            .unwrap();

        assert_eq!(out, "4");
        assert_eq!(
            service.calls(),
            vec![Call {
                model: "mistral-large".into(),
                prompt: "2+2?".into(),
                options: Some(GenerationOptions { temperature: 0.7 }),
            }]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn invalid_argument_types_triggers_one_fallback() {
        let service = ScriptedService::new(vec![
            Err("SQL compilation error: Invalid argument types for function 'COMPLETE'"),
            Ok("fallback answer"),
        ]);
        let out = client(&service)
            .complete("llama3-8b", "PROMPT", 0.3)
            .await
            .unwrap();

        assert_eq!(out, "fallback answer");
        let calls = service.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].model, "llama3-8b");
        assert_eq!(calls[1].prompt, "[Température demandée: 0.3]\nPROMPT");
        assert_eq!(calls[1].options, None);
        assert!(logs_contain("structured options rejected"));
    }

    #[tokio::test]
    async fn each_signature_triggers_fallback() {
        for message in [
            "Unknown function SNOWFLAKE.CORTEX.COMPLETE$V6",
            "Invalid argument types for function",
            "argument 2 needs to be a string literal",
        ] {
            let service = ScriptedService::new(vec![Err(message), Ok("ok")]);
            let out = client(&service).complete("m", "p", 1.0).await.unwrap();
            assert_eq!(out, "ok", "{message}");
            assert_eq!(service.calls().len(), 2, "{message}");
            assert_eq!(service.calls()[1].options, None, "{message}");
        }
    }

    #[tokio::test]
    async fn unrecognised_failure_propagates_without_retry() {
        let service = ScriptedService::new(vec![
            Err("Authentication token has expired"),
            Ok("should never be used"),
        ]);
        let err = client(&service)
            .complete("mistral-large", "p", 0.7)
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Authentication token has expired");
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn fallback_failure_propagates_without_further_retry() {
        let service = ScriptedService::new(vec![
            Err("Invalid argument types"),
            Err("Invalid argument types"),
            Ok("never"),
        ]);
        let err = client(&service).complete("m", "p", 0.7).await.unwrap_err();

        assert_eq!(err.message(), "Invalid argument types");
        assert_eq!(service.calls().len(), 2);
    }

    #[test]
    fn classification_reports_the_matched_signature() {
        let err = ServiceError::Api {
            status: 422,
            message: "000904: needs to be a string literal".into(),
        };
        assert_eq!(
            classify_failure(&err),
            FailureKind::OptionsRejected {
                signature: "needs to be a string literal"
            }
        );
        assert_eq!(
            classify_failure(&ServiceError::Rejected("warehouse suspended".into())),
            FailureKind::Other
        );
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert_eq!(classify_message("invalid argument types"), FailureKind::Other);
    }

    #[test]
    fn annotation_keeps_a_decimal_point() {
        assert_eq!(annotate_temperature("P", 1.0), "[Température demandée: 1.0]\nP");
        assert_eq!(annotate_temperature("P", 0.0), "[Température demandée: 0.0]\nP");
        assert_eq!(annotate_temperature("P", 0.7), "[Température demandée: 0.7]\nP");
    }
}
