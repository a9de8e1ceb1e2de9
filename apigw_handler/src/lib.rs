mod store;

pub use store::{DynamoDbStore, RecordStore};

use serde_json::{Map, Value};
use std::env;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

const TABLE_NAME: &str = "TABLE_NAME";
const DYNAMODB_ENDPOINT: &str = "DYNAMODB_ENDPOINT";

pub const CONTENT_TYPE: &str = "application/json";
pub const SUCCESS_BODY: &str = r#"{"message": "Successfully inserted data!"}"#;
pub const ERROR_BODY: &str = r#"{"message": "Internal server error"}"#;

pub const DEFAULT_TITLE: &str = "The Amazing Spider-Man 2";
pub const DEFAULT_YEAR: &str = "2012";

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed request body: {0}")]
    Parse(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("failed to write record: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>)
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Parse(err.to_string())
    }
}

impl HandlerError {
    /// Name logged as `error_type`; the response never carries it.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Parse(_) => "ParseError",
            HandlerError::MissingField(_) => "MissingFieldError",
            HandlerError::InvalidField { .. } => "InvalidFieldError",
            HandlerError::Storage(_) => "StorageError"
        }
    }
}

/// Process-wide settings, read once at cold start.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub table_name: Option<String>,
    pub dynamodb_endpoint: Option<String>
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            table_name: non_empty_var(TABLE_NAME),
            dynamodb_endpoint: non_empty_var(DYNAMODB_ENDPOINT)
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub title: String,
    /// Decimal number kept as text, written with the DynamoDB `N` tag.
    pub year: String
}

impl Record {
    /// The record written when a request arrives without a body.
    pub fn placeholder() -> Record {
        Record {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            year: DEFAULT_YEAR.to_string()
        }
    }

    pub fn from_item(item: &Map<String, Value>) -> Result<Record, HandlerError> {
        let year = numeric("year", required(item, "year")?)?;
        let title = text(required(item, "title")?);
        let id = text(required(item, "id")?);
        Ok(Record { id, title, year })
    }
}

pub fn parse_item(body: &[u8]) -> Result<Map<String, Value>, HandlerError> {
    match serde_json::from_slice(body)? {
        Value::Object(item) => Ok(item),
        other => Err(HandlerError::Parse(
            format!("expected a JSON object, found {}", type_name(&other))
        ))
    }
}

fn required<'a>(
    item: &'a Map<String, Value>,
    field: &'static str
) -> Result<&'a Value, HandlerError> {
    item.get(field).ok_or(HandlerError::MissingField(field))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_owned(),
        other => other.to_string()
    }
}

// The value itself stays out of the reason, it ends up in the error log.
fn numeric(field: &'static str, value: &Value) -> Result<String, HandlerError> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(trimmed.to_string()),
                _ => Err(HandlerError::InvalidField {
                    field,
                    reason: String::from("string is not a number")
                })
            }
        }
        other => Err(HandlerError::InvalidField {
            field,
            reason: format!("expected a number, found {}", type_name(other))
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object"
    }
}

/// Caller metadata used only for the audit log line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAudit {
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub http_method: Option<String>
}

#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub body: Option<Vec<u8>>,
    pub audit: RequestAudit,
    pub request_id: String
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: &'static str
}

impl ApiResponse {
    pub fn success() -> ApiResponse {
        ApiResponse { status_code: 200, body: SUCCESS_BODY }
    }

    pub fn internal_error() -> ApiResponse {
        ApiResponse { status_code: 500, body: ERROR_BODY }
    }
}

pub struct Handler<S> {
    store: S,
    table_name: Option<String>
}

impl<S: RecordStore> Handler<S> {
    pub fn new(store: S, table_name: Option<String>) -> Handler<S> {
        Handler { store, table_name }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every failure is logged and collapsed into the generic 500 response.
    pub async fn handle(&self, invocation: &Invocation) -> ApiResponse {
        let audit = &invocation.audit;
        info!(
            event = "request_received",
            request_id = %invocation.request_id,
            source_ip = audit.source_ip.as_deref(),
            user_agent = audit.user_agent.as_deref(),
            http_method = audit.http_method.as_deref()
        );

        match self.insert(invocation.body.as_deref()).await {
            Ok(record) => {
                info!(
                    event = "dynamodb_write_success",
                    item_id = %record.id,
                    table = self.table_name.as_deref()
                );
                ApiResponse::success()
            }
            Err(e) => {
                error!(
                    event = "error",
                    error_type = e.kind(),
                    error_message = %e,
                    request_id = %invocation.request_id
                );
                ApiResponse::internal_error()
            }
        }
    }

    async fn insert(&self, body: Option<&[u8]>) -> Result<Record, HandlerError> {
        let record = match body.filter(|b| !b.is_empty()) {
            Some(body) => {
                let item = parse_item(body)?;
                let item_id = item.get("id").filter(|v| !v.is_null()).map(text);
                // only a summary, the payload itself may hold sensitive fields
                info!(
                    event = "processing_item",
                    item_id = item_id.as_deref(),
                    has_title = item.contains_key("title"),
                    has_year = item.contains_key("year")
                );
                Record::from_item(&item)?
            }
            None => {
                info!(event = "empty_payload_received");
                Record::placeholder()
            }
        };

        let table_name = self.table_name.as_deref().ok_or_else(|| {
            HandlerError::Storage(format!("{} is not configured", TABLE_NAME).into())
        })?;
        self.store.put_record(table_name, &record).await?;
        Ok(record)
    }
}
