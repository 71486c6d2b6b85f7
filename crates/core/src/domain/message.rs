use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Broadcast notice shown to the field force; `audience_role` narrows it to one role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoMessage {
    pub id: MessageId,
    pub title: String,
    pub body: String,
    pub audience_role: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl InfoMessage {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.map(|expires_at| expires_at > at).unwrap_or(true)
    }

    pub fn is_visible_to(&self, role: Option<&str>) -> bool {
        match (&self.audience_role, role) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(audience), Some(role)) => audience.eq_ignore_ascii_case(role.trim()),
        }
    }
}
