//! Bolt protocol response messages.
//!
//! Response messages are sent from the server to the client.

use std::collections::HashMap;

use super::{check_field_count, tag};
use crate::bolt::packstream::{PackStreamError, Structure, Value};

/// All Bolt response messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltResponse {
    /// SUCCESS - Request completed successfully
    Success(SuccessMessage),
    /// RECORD - One result row
    Record(RecordMessage),
    /// FAILURE - Request failed
    Failure(FailureMessage),
    /// IGNORED - Request was ignored (connection in FAILED state)
    Ignored,
}

impl BoltResponse {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltResponse::Success(_) => tag::SUCCESS,
            BoltResponse::Record(_) => tag::RECORD,
            BoltResponse::Failure(_) => tag::FAILURE,
            BoltResponse::Ignored => tag::IGNORED,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltResponse::Success(_) => "SUCCESS",
            BoltResponse::Record(_) => "RECORD",
            BoltResponse::Failure(_) => "FAILURE",
            BoltResponse::Ignored => "IGNORED",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BoltResponse::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, BoltResponse::Failure(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, BoltResponse::Record(_))
    }

    /// Whether this response ends the exchange for the pending request.
    pub fn is_summary(&self) -> bool {
        !self.is_record()
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> Structure {
        match self {
            BoltResponse::Success(msg) => msg.to_structure(),
            BoltResponse::Record(msg) => msg.to_structure(),
            BoltResponse::Failure(msg) => msg.to_structure(),
            BoltResponse::Ignored => Structure::new(tag::IGNORED, vec![]),
        }
    }

    /// Parse from PackStream structure.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        check_field_count(s)?;
        match s.signature {
            tag::SUCCESS => Ok(BoltResponse::Success(SuccessMessage::from_structure(s)?)),
            tag::RECORD => Ok(BoltResponse::Record(RecordMessage::from_structure(s)?)),
            tag::FAILURE => Ok(BoltResponse::Failure(FailureMessage::from_structure(s)?)),
            tag::IGNORED => Ok(BoltResponse::Ignored),
            other => Err(PackStreamError::InvalidStructure(format!(
                "Not a response message: 0x{:02X}",
                other
            ))),
        }
    }
}

/// SUCCESS message - Request completed successfully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuccessMessage {
    /// Response metadata
    pub metadata: HashMap<String, Value>,
}

impl SuccessMessage {
    /// Create a new SUCCESS message with empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(metadata: HashMap<String, Value>) -> Self {
        Self { metadata }
    }

    /// Add metadata entry.
    pub fn add(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Server agent string (INIT response).
    pub fn server(&self) -> Option<&str> {
        self.get("server").and_then(|v| v.as_str())
    }

    /// Result field names (RUN response).
    pub fn fields(&self) -> Option<Vec<String>> {
        self.get("fields")?.as_list().map(|list| {
            list.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
    }

    pub fn result_available_after(&self) -> Option<i64> {
        self.get("result_available_after").and_then(|v| v.as_int())
    }

    pub fn result_consumed_after(&self) -> Option<i64> {
        self.get("result_consumed_after").and_then(|v| v.as_int())
    }

    /// Statement type ("r", "w", "rw", "s") from the streaming summary.
    pub fn statement_type(&self) -> Option<&str> {
        self.get("type").and_then(|v| v.as_str())
    }

    /// Update statistics from the streaming summary.
    pub fn stats(&self) -> Option<&HashMap<String, Value>> {
        self.get("stats").and_then(|v| v.as_map())
    }

    pub fn to_structure(&self) -> Structure {
        Structure::new(tag::SUCCESS, vec![Value::Map(self.metadata.clone())])
    }

    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        let metadata = s.fields[0]
            .as_map()
            .cloned()
            .ok_or_else(|| PackStreamError::InvalidStructure("SUCCESS metadata must be map".to_string()))?;
        Ok(Self { metadata })
    }
}

/// RECORD message - One result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMessage {
    /// Field values
    pub fields: Vec<Value>,
}

impl RecordMessage {
    pub fn new(fields: Vec<Value>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get field at index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    pub fn to_structure(&self) -> Structure {
        Structure::new(tag::RECORD, vec![Value::List(self.fields.clone())])
    }

    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        match &s.fields[0] {
            Value::List(list) => Ok(Self::new(list.clone())),
            _ => Err(PackStreamError::InvalidStructure("RECORD fields must be list".to_string())),
        }
    }
}

/// FAILURE message - Request failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureMessage {
    /// Server error code, e.g. "Neo.ClientError.Statement.SyntaxError"
    pub code: String,
    /// Error message
    pub message: String,
}

impl FailureMessage {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Get error classification from code ("ClientError", "TransientError", ...).
    pub fn classification(&self) -> &str {
        self.code.split('.').nth(1).unwrap_or("Unknown")
    }

    /// Get error category from code.
    pub fn category(&self) -> &str {
        self.code.split('.').nth(2).unwrap_or("Unknown")
    }

    pub fn is_client_error(&self) -> bool {
        self.classification() == "ClientError"
    }

    pub fn is_transient(&self) -> bool {
        self.classification() == "TransientError"
    }

    pub fn to_structure(&self) -> Structure {
        let mut metadata = HashMap::new();
        metadata.insert("code".to_string(), Value::String(self.code.clone()));
        metadata.insert("message".to_string(), Value::String(self.message.clone()));
        Structure::new(tag::FAILURE, vec![Value::Map(metadata)])
    }

    /// Parse from PackStream structure. Missing code or message read as empty.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        let metadata = s.fields[0]
            .as_map()
            .ok_or_else(|| PackStreamError::InvalidStructure("FAILURE metadata must be map".to_string()))?;
        let get = |key: &str| metadata.get(key).and_then(|v| v.as_str()).unwrap_or("");

        Ok(Self::new(get("code"), get("message")))
    }
}

impl std::fmt::Display for FailureMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
