use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::{Result, SessionError};

/// Bye code reserved for the relay-to-direct handover notice
pub const HANDOVER_CODE: i64 = 101;

/// Bye code for a normal hangup
pub const NORMAL_HANGUP_CODE: i64 = 200;

/// The six message keywords of the WSP protocol
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    Invite,
    Ringing,
    Offer,
    Answer,
    IceCandidate,
    Bye,
}

impl Keyword {
    pub const ALL: [Keyword; 6] = [
        Keyword::Invite,
        Keyword::Ringing,
        Keyword::Offer,
        Keyword::Answer,
        Keyword::IceCandidate,
        Keyword::Bye,
    ];

    /// Wire spelling of the keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Invite => "invite",
            Keyword::Ringing => "ringing",
            Keyword::Offer => "offer",
            Keyword::Answer => "answer",
            Keyword::IceCandidate => "icecandidate",
            Keyword::Bye => "bye",
        }
    }

    /// Parse the wire spelling, `None` for anything unrecognized
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One party of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallParty {
    pub uri: String,
    /// Display name only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CallParty {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into(), name: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Content of an `invite` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub caller: CallParty,
    pub callee: CallParty,
}

impl Invitation {
    pub fn new(caller: CallParty, callee: CallParty) -> Self {
        Self { caller, callee }
    }
}

/// Content of a `bye` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByeReason {
    pub code: i64,
    #[serde(default)]
    pub description: String,
}

impl ByeReason {
    pub fn new(code: i64, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// The handover notice, `{code: 101, description: "Transferred"}`
    pub fn handover() -> Self {
        Self::new(HANDOVER_CODE, "Transferred")
    }

    pub fn normal_hangup() -> Self {
        Self::new(NORMAL_HANGUP_CODE, "User ended call normally")
    }

    pub fn is_handover(&self) -> bool {
        self.code == HANDOVER_CODE
    }
}

/// Session description, opaque to the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDescription(pub Value);

/// Connectivity candidate, opaque to the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(pub Value);

/// A decoded WSP message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub keyword: Keyword,
    pub content: Value,
    /// Reserved, carried through unchanged
    pub options: Option<Map<String, Value>>,
}

impl Message {
    pub fn new(keyword: Keyword, content: Value) -> Self {
        Self {
            keyword,
            content,
            options: None,
        }
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn invite(invitation: &Invitation) -> Self {
        Self::new(Keyword::Invite, to_value(invitation))
    }

    pub fn ringing() -> Self {
        Self::new(Keyword::Ringing, Value::Null)
    }

    pub fn offer(description: &SessionDescription) -> Self {
        Self::new(Keyword::Offer, description.0.clone())
    }

    pub fn answer(description: &SessionDescription) -> Self {
        Self::new(Keyword::Answer, description.0.clone())
    }

    pub fn ice_candidate(candidate: &Candidate) -> Self {
        Self::new(Keyword::IceCandidate, candidate.0.clone())
    }

    pub fn bye(reason: &ByeReason) -> Self {
        Self::new(Keyword::Bye, to_value(reason))
    }

    /// Parse the content into a keyword-specific shape
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.content).map_err(|e| {
            SessionError::malformed(format!("invalid {} content: {}", self.keyword, e))
        })
    }

    pub fn bye_reason(&self) -> Result<ByeReason> {
        if self.keyword != Keyword::Bye {
            return Err(SessionError::malformed(format!(
                "expected bye, got {}",
                self.keyword
            )));
        }
        self.content_as()
    }

    /// Whether this is a `bye` carrying the handover code
    pub fn is_handover_notice(&self) -> bool {
        self.bye_reason().map(|r| r.is_handover()).unwrap_or(false)
    }

    /// Encode to the JSON wire form
    pub fn encode(&self) -> String {
        super::encode(self.keyword, self.content.clone(), self.options.clone())
    }
}

// Invitation and ByeReason contain only strings and integers
fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
