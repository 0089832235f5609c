use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for captured leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// Contact form payload posted from listing and marketing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSubmission {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub property_id: Option<String>,
    /// Portal account of a signed-in owner or tenant.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Stored lead with the request metadata used during gatekeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub lead_id: LeadId,
    pub submission: LeadSubmission,
    pub client_ip: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Response body returned to the form once a lead is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadReceipt {
    pub lead_id: LeadId,
    pub received_at: DateTime<Utc>,
}

impl LeadRecord {
    pub fn receipt(&self) -> LeadReceipt {
        LeadReceipt {
            lead_id: self.lead_id.clone(),
            received_at: self.received_at,
        }
    }
}
