//! Bolt protocol request messages.
//!
//! Request messages are sent from the client to the server.

use std::collections::HashMap;

use super::{check_field_count, tag};
use crate::bolt::packstream::{PackStreamError, Structure, Value};

/// Authentication token carried by INIT.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    /// Authentication scheme (e.g., "basic", "none")
    pub scheme: String,
    /// Principal (username)
    pub principal: Option<String>,
    /// Credentials (password)
    pub credentials: Option<String>,
    /// Realm
    pub realm: Option<String>,
}

impl AuthToken {
    /// Create a basic auth token.
    pub fn basic(principal: &str, credentials: &str) -> Self {
        Self {
            scheme: "basic".to_string(),
            principal: Some(principal.to_string()),
            credentials: Some(credentials.to_string()),
            realm: None,
        }
    }

    /// Create an anonymous auth token (no auth).
    pub fn none() -> Self {
        Self {
            scheme: "none".to_string(),
            principal: None,
            credentials: None,
            realm: None,
        }
    }

    /// Set the realm.
    pub fn with_realm(mut self, realm: &str) -> Self {
        self.realm = Some(realm.to_string());
        self
    }

    /// Convert to the PackStream map sent on the wire.
    pub fn to_map(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("scheme".to_string(), Value::String(self.scheme.clone()));
        if let Some(ref p) = self.principal {
            map.insert("principal".to_string(), Value::String(p.clone()));
        }
        if let Some(ref c) = self.credentials {
            map.insert("credentials".to_string(), Value::String(c.clone()));
        }
        if let Some(ref r) = self.realm {
            map.insert("realm".to_string(), Value::String(r.clone()));
        }
        map
    }

    /// Parse from a PackStream map. A missing scheme reads as "none".
    pub fn from_map(map: &HashMap<String, Value>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());
        Self {
            scheme: get("scheme").unwrap_or_else(|| "none".to_string()),
            principal: get("principal"),
            credentials: get("credentials"),
            realm: get("realm"),
        }
    }
}

impl Default for AuthToken {
    fn default() -> Self {
        Self::none()
    }
}

/// All Bolt v1 request messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltRequest {
    /// INIT - Authenticate and announce the client
    Init(InitMessage),
    /// RUN - Execute a statement
    Run(RunMessage),
    /// PULL_ALL - Stream all remaining records
    PullAll,
    /// DISCARD_ALL - Drop all remaining records
    DiscardAll,
    /// ACK_FAILURE - Acknowledge a failure and leave the FAILED state
    AckFailure,
    /// RESET - Abandon any work and return to READY
    Reset,
}

impl BoltRequest {
    /// Build an INIT request.
    pub fn init(user_agent: &str, auth: AuthToken) -> Self {
        BoltRequest::Init(InitMessage::new(user_agent, auth))
    }

    /// Build a RUN request.
    pub fn run(statement: &str, parameters: HashMap<String, Value>) -> Self {
        BoltRequest::Run(RunMessage::new(statement, parameters))
    }

    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltRequest::Init(_) => tag::INIT,
            BoltRequest::Run(_) => tag::RUN,
            BoltRequest::PullAll => tag::PULL_ALL,
            BoltRequest::DiscardAll => tag::DISCARD_ALL,
            BoltRequest::AckFailure => tag::ACK_FAILURE,
            BoltRequest::Reset => tag::RESET,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltRequest::Init(_) => "INIT",
            BoltRequest::Run(_) => "RUN",
            BoltRequest::PullAll => "PULL_ALL",
            BoltRequest::DiscardAll => "DISCARD_ALL",
            BoltRequest::AckFailure => "ACK_FAILURE",
            BoltRequest::Reset => "RESET",
        }
    }

    /// Whether this request clears the FAILED state.
    pub fn is_recovery(&self) -> bool {
        matches!(self, BoltRequest::AckFailure | BoltRequest::Reset)
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> Structure {
        match self {
            BoltRequest::Init(msg) => msg.to_structure(),
            BoltRequest::Run(msg) => msg.to_structure(),
            other => Structure::new(other.tag(), vec![]),
        }
    }

    /// Parse from PackStream structure.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        check_field_count(s)?;
        match s.signature {
            tag::INIT => Ok(BoltRequest::Init(InitMessage::from_structure(s)?)),
            tag::RUN => Ok(BoltRequest::Run(RunMessage::from_structure(s)?)),
            tag::PULL_ALL => Ok(BoltRequest::PullAll),
            tag::DISCARD_ALL => Ok(BoltRequest::DiscardAll),
            tag::ACK_FAILURE => Ok(BoltRequest::AckFailure),
            tag::RESET => Ok(BoltRequest::Reset),
            other => Err(PackStreamError::InvalidStructure(format!(
                "Not a request message: 0x{:02X}",
                other
            ))),
        }
    }
}

/// INIT message - Authenticate the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct InitMessage {
    /// User agent string
    pub user_agent: String,
    /// Authentication token
    pub auth: AuthToken,
}

impl InitMessage {
    /// Create a new INIT message.
    pub fn new(user_agent: &str, auth: AuthToken) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            auth,
        }
    }

    /// Convert to PackStream structure.
    ///
    /// A "none" token is sent as an empty map, which is how Bolt v1
    /// servers expect an unauthenticated INIT.
    pub fn to_structure(&self) -> Structure {
        let auth = if self.auth.scheme == "none" && self.auth.principal.is_none() {
            HashMap::new()
        } else {
            self.auth.to_map()
        };
        Structure::new(
            tag::INIT,
            vec![Value::String(self.user_agent.clone()), Value::Map(auth)],
        )
    }

    /// Parse from PackStream structure.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        let user_agent = s.fields[0]
            .as_str()
            .ok_or_else(|| PackStreamError::InvalidStructure("INIT user agent must be string".to_string()))?;
        let auth = s.fields[1]
            .as_map()
            .ok_or_else(|| PackStreamError::InvalidStructure("INIT auth must be map".to_string()))?;

        Ok(Self::new(user_agent, AuthToken::from_map(auth)))
    }
}

/// RUN message - Execute a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMessage {
    /// Statement text
    pub statement: String,
    /// Statement parameters
    pub parameters: HashMap<String, Value>,
}

impl RunMessage {
    /// Create a new RUN message.
    pub fn new(statement: &str, parameters: HashMap<String, Value>) -> Self {
        Self {
            statement: statement.to_string(),
            parameters,
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> Structure {
        Structure::new(
            tag::RUN,
            vec![
                Value::String(self.statement.clone()),
                Value::Map(self.parameters.clone()),
            ],
        )
    }

    /// Parse from PackStream structure.
    pub fn from_structure(s: &Structure) -> Result<Self, PackStreamError> {
        let statement = s.fields[0]
            .as_str()
            .ok_or_else(|| PackStreamError::InvalidStructure("RUN statement must be string".to_string()))?;
        let parameters = s.fields[1]
            .as_map()
            .cloned()
            .ok_or_else(|| PackStreamError::InvalidStructure("RUN parameters must be map".to_string()))?;

        Ok(Self::new(statement, parameters))
    }
}
