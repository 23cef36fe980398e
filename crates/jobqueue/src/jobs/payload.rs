use crate::error::ProcessError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Job types shipped with the queue. The stored tag stays an open string,
/// so handlers can be registered for types not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    UserCreated,
    DataAnalysis,
    EmailNotification,
    DataExport,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::UserCreated,
        JobKind::DataAnalysis,
        JobKind::EmailNotification,
        JobKind::DataExport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::UserCreated => "user_created",
            JobKind::DataAnalysis => "data_analysis",
            JobKind::EmailNotification => "email_notification",
            JobKind::DataExport => "data_export",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown job type: {s}"))
    }
}

/// Stored payload: a loose bag of optional fields shared by every job type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub user_data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub validation_mode: String,
}

impl JobPayload {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserCreated {
    pub user_id: i64,
    pub user_data: Map<String, Value>,
    /// Properties outside the user schema, passed through untouched.
    pub additional_props: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataAnalysis {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailNotification {
    pub message: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataExport {
    pub message: String,
}

impl TryFrom<&JobPayload> for UserCreated {
    type Error = ProcessError;

    fn try_from(p: &JobPayload) -> Result<Self, Self::Error> {
        let user_id = p
            .user_id
            .ok_or_else(|| ProcessError::new("user_created payload is missing user_id"))?;
        Ok(Self {
            user_id,
            user_data: p.user_data.clone(),
            additional_props: p.additional_props.clone(),
        })
    }
}

impl From<&JobPayload> for DataAnalysis {
    fn from(p: &JobPayload) -> Self {
        Self {
            message: p.message.clone(),
        }
    }
}

impl From<&JobPayload> for EmailNotification {
    fn from(p: &JobPayload) -> Self {
        Self {
            message: p.message.clone(),
            recipients: p.recipients.clone(),
        }
    }
}

impl From<&JobPayload> for DataExport {
    fn from(p: &JobPayload) -> Self {
        Self {
            message: p.message.clone(),
        }
    }
}

/// Payload narrowed to the fields its job type actually uses.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedPayload {
    UserCreated(UserCreated),
    DataAnalysis(DataAnalysis),
    EmailNotification(EmailNotification),
    DataExport(DataExport),
    /// A type with no built-in shape; the raw payload is kept as is.
    Other(JobPayload),
}

impl TypedPayload {
    pub fn from_payload(job_type: &str, payload: &JobPayload) -> Result<Self, ProcessError> {
        let typed = match job_type.parse::<JobKind>() {
            Ok(JobKind::UserCreated) => TypedPayload::UserCreated(payload.try_into()?),
            Ok(JobKind::DataAnalysis) => TypedPayload::DataAnalysis(payload.into()),
            Ok(JobKind::EmailNotification) => TypedPayload::EmailNotification(payload.into()),
            Ok(JobKind::DataExport) => TypedPayload::DataExport(payload.into()),
            Err(_) => TypedPayload::Other(payload.clone()),
        };
        Ok(typed)
    }

    /// Free-form message, empty for types that carry none.
    pub fn message(&self) -> &str {
        match self {
            TypedPayload::UserCreated(_) => "",
            TypedPayload::DataAnalysis(p) => &p.message,
            TypedPayload::EmailNotification(p) => &p.message,
            TypedPayload::DataExport(p) => &p.message,
            TypedPayload::Other(p) => &p.message,
        }
    }
}
