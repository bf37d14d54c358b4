//! Snowflake Cortex transport over the SQL REST API.
//!
//! Each completion is a single `SELECT SNOWFLAKE.CORTEX.COMPLETE(...)`
//! statement posted to `/api/v2/statements`. The prompt travels inside a
//! `$$ … $$` literal, so runs of dollar signs in the prompt are escaped
//! before embedding.
//! The result is the first cell of the first row.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::completion::{CompletionResponse, CompletionService, GenerationOptions};
use crate::error::ServiceError;

const STATEMENTS_PATH: &str = "/api/v2/statements";
const DEFAULT_TOKEN_TYPE: &str = "PROGRAMMATIC_ACCESS_TOKEN";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Escape `prompt` for embedding inside a `$$`-delimited literal.
///
/// Runs of two or more `$` have each dollar escaped, so `$$` becomes
/// `\$\$`. A lone `$` is kept as-is. A prompt ending in `$` gets a trailing
/// space so its last dollar cannot merge with the closing delimiter.
pub fn sanitize_prompt(prompt: &str) -> String {
    let mut out = String::with_capacity(prompt.len());
    let mut rest = prompt;
    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let run = tail.len() - tail.trim_start_matches('$').len();
        if run == 1 {
            out.push('$');
        } else {
            out.push_str(&"\\$".repeat(run));
        }
        rest = &tail[run..];
    }
    out.push_str(rest);
    if out.ends_with('$') {
        out.push(' ');
    }
    out
}

/// Quote `value` as a single-quoted SQL string literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Render the `COMPLETE` statement for one request.
///
/// With `options`, the temperature is passed as a third `PARSE_JSON`
/// argument; without, the call only carries model and prompt.
pub fn render_complete_statement(
    model: &str,
    prompt: &str,
    options: Option<GenerationOptions>,
) -> Result<String, ServiceError> {
    let model = quote_literal(model);
    let prompt = sanitize_prompt(prompt);
    let statement = match options {
        Some(opts) => {
            let json = serde_json::to_string(&opts)?;
            format!(
                "SELECT SNOWFLAKE.CORTEX.COMPLETE(\n    {model},\n    $${prompt}$$,\n    PARSE_JSON({})\n) AS RESPONSE;",
                quote_literal(&json)
            )
        }
        None => format!(
            "SELECT SNOWFLAKE.CORTEX.COMPLETE(\n    {model},\n    $${prompt}$$\n) AS RESPONSE;"
        ),
    };
    Ok(statement)
}

/// Extract the scalar `RESPONSE` cell from a SQL API result body.
pub fn parse_statement_response(body: &Value) -> Result<String, ServiceError> {
    let cell = body
        .get("data")
        .and_then(|rows| rows.get(0))
        .and_then(|row| row.get(0))
        .ok_or_else(|| ServiceError::MalformedResponse("result set has no rows".into()))?;

    match cell {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Err(ServiceError::MalformedResponse(
            "RESPONSE column is NULL".into(),
        )),
        other => Ok(other.to_string()),
    }
}

/// Message text from an error body, falling back to the HTTP reason phrase.
fn error_message(status: reqwest::StatusCode, raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .or_else(|| (!raw.trim().is_empty()).then(|| raw.trim().to_owned()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_owned()
        })
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
}

/// [`CompletionService`] backed by `SNOWFLAKE.CORTEX.COMPLETE`.
pub struct CortexSqlService {
    http: reqwest::Client,
    base_url: String,
    token: String,
    token_type: String,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    timeout_secs: u64,
}

impl std::fmt::Debug for CortexSqlService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CortexSqlService")
            .field("base_url", &self.base_url)
            .field("token_type", &self.token_type)
            .field("warehouse", &self.warehouse)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CortexSqlService`].
#[derive(Debug, Clone)]
pub struct CortexSqlServiceBuilder {
    base_url: String,
    token: String,
    token_type: String,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    timeout_secs: u64,
}

impl CortexSqlServiceBuilder {
    /// Token type sent in `X-Snowflake-Authorization-Token-Type`
    /// (default: `PROGRAMMATIC_ACCESS_TOKEN`).
    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    pub fn warehouse(mut self, warehouse: Option<String>) -> Self {
        self.warehouse = warehouse;
        self
    }

    pub fn role(mut self, role: Option<String>) -> Self {
        self.role = role;
        self
    }

    pub fn database(mut self, database: Option<String>) -> Self {
        self.database = database;
        self
    }

    pub fn schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// Statement timeout, also applied to the HTTP client (default: 120 s).
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<CortexSqlService, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;
        Ok(CortexSqlService {
            http,
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            token: self.token,
            token_type: self.token_type,
            warehouse: self.warehouse,
            role: self.role,
            database: self.database,
            schema: self.schema,
            timeout_secs: self.timeout_secs,
        })
    }
}

impl CortexSqlService {
    /// Start building a service for the account at `base_url`
    /// (e.g. `https://myorg-myaccount.snowflakecomputing.com`).
    pub fn builder(base_url: impl Into<String>, token: impl Into<String>) -> CortexSqlServiceBuilder {
        CortexSqlServiceBuilder {
            base_url: base_url.into(),
            token: token.into(),
            token_type: DEFAULT_TOKEN_TYPE.to_owned(),
            warehouse: None,
            role: None,
            database: None,
            schema: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    fn statements_url(&self) -> String {
        format!("{}{}", self.base_url, STATEMENTS_PATH)
    }
}

#[async_trait]
impl CompletionService for CortexSqlService {
    #[instrument(skip(self, prompt), fields(with_options = options.is_some()))]
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        options: Option<GenerationOptions>,
    ) -> Result<CompletionResponse, ServiceError> {
        let statement = render_complete_statement(model, prompt, options)?;
        let body = StatementRequest {
            statement: &statement,
            timeout: self.timeout_secs,
            warehouse: self.warehouse.as_deref(),
            role: self.role.as_deref(),
            database: self.database.as_deref(),
            schema: self.schema.as_deref(),
        };

        debug!(statement_len = statement.len(), "posting COMPLETE statement");

        let response = self
            .http
            .post(self.statements_url())
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.token_type)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if status == reqwest::StatusCode::ACCEPTED {
            return Err(ServiceError::MalformedResponse(
                "statement still running after timeout".into(),
            ));
        }
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: error_message(status, &raw),
            });
        }

        let value: Value = serde_json::from_str(&raw)?;
        let response = parse_statement_response(&value)?;
        debug!(output_len = response.len(), "COMPLETE statement returned");
        Ok(CompletionResponse { response })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn sanitize_escapes_dollar_delimiters() {
        assert_eq!(sanitize_prompt("a $$ b"), "a \\$\\$ b");
        assert_eq!(sanitize_prompt("a $$$ b"), "a \\$\\$\\$ b");
        assert_eq!(sanitize_prompt("price: 5$"), "price: 5$ ");
        assert_eq!(sanitize_prompt("plain"), "plain");
    }

    #[test]
    fn single_dollars_pass_through() {
        let prompt = "Combien coûte 5$ par mois ? echo $HOME";
        assert_eq!(sanitize_prompt(prompt), prompt);
        assert_eq!(sanitize_prompt("$a $b"), "$a $b");
    }

    #[test]
    fn sanitized_prompt_never_closes_the_literal_early() {
        for prompt in ["$$", "x$$$", "$$$$", "end$", "a$b$$c", "$", "x$$"] {
            let escaped = sanitize_prompt(prompt);
            let literal = format!("$${escaped}$$");
            let body = &literal[2..];
            let first_close = body.find("$$").unwrap();
            assert_eq!(first_close, body.len() - 2, "prompt {prompt:?} -> {literal}");
        }
    }

    #[test]
    fn statement_with_options_carries_parse_json() {
        let stmt = render_complete_statement(
            "mistral-large",
            "Hi",
            Some(GenerationOptions { temperature: 0.7 }),
        )
        .unwrap();
        assert!(stmt.contains("'mistral-large'"));
        assert!(stmt.contains("$$Hi$$"));
        assert!(stmt.contains(r#"PARSE_JSON('{"temperature":0.7}')"#));
        assert!(stmt.ends_with(") AS RESPONSE;"));
    }

    #[test]
    fn statement_without_options_has_two_arguments() {
        let stmt = render_complete_statement("llama3-8b", "Hi", None).unwrap();
        assert!(!stmt.contains("PARSE_JSON"));
        assert!(stmt.contains("$$Hi$$\n) AS RESPONSE;"));
    }

    #[test]
    fn model_identifier_is_quoted() {
        let stmt = render_complete_statement("it's\\odd", "p", None).unwrap();
        assert!(stmt.contains("'it''s\\\\odd'"));
    }

    #[test]
    fn response_cell_is_extracted() {
        let body = json!({
            "code": "090001",
            "message": "Statement executed successfully.",
            "data": [[" Bonjour ! "]],
        });
        assert_eq!(parse_statement_response(&body).unwrap(), " Bonjour ! ");
    }

    #[test]
    fn non_string_cell_is_stringified() {
        let body = json!({ "data": [[42]] });
        assert_eq!(parse_statement_response(&body).unwrap(), "42");
    }

    #[test]
    fn empty_result_is_malformed() {
        for body in [json!({ "data": [] }), json!({}), json!({ "data": [[null]] })] {
            assert!(matches!(
                parse_statement_response(&body),
                Err(ServiceError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn error_message_prefers_the_body_message_field() {
        let raw = r#"{"code":"002140","message":"SQL compilation error:\nInvalid argument types for function 'COMPLETE'","sqlState":"42601"}"#;
        let msg = error_message(reqwest::StatusCode::UNPROCESSABLE_ENTITY, raw);
        assert!(msg.contains("Invalid argument types"));
    }

    #[test]
    fn error_message_falls_back_to_text_then_reason() {
        assert_eq!(
            error_message(reqwest::StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(
            error_message(reqwest::StatusCode::UNAUTHORIZED, ""),
            "Unauthorized"
        );
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let svc = CortexSqlService::builder("https://acme.snowflakecomputing.com/", "t")
            .warehouse(Some("WH".into()))
            .build()
            .unwrap();
        assert_eq!(
            svc.statements_url(),
            "https://acme.snowflakecomputing.com/api/v2/statements"
        );
    }
}
