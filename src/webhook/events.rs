//! Update-user webhook payloads and what to do with them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::oauth::to_local_identity;
use crate::users::UserDirectory;
use crate::Result;

/// Object type whose updates we act on
const USER_OBJECT_TYPE: &str = "user";

/// Field signalling the account was deleted at the provider
const DELETED_FIELD: &str = "deleted";

/// `true`, or the string `"true"` in any case. Anything else never deletes.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// One changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// Field name
    pub field: String,
    /// New value, as sent
    #[serde(default)]
    pub value: Value,
    /// Change time, as sent
    #[serde(default)]
    pub timestamp: Value,
}

/// Body of `POST /webhook/update-user`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookUpdateEvent {
    /// Kind of object that changed
    #[serde(alias = "objectType")]
    pub object_type: String,
    /// Provider external id of the object
    #[serde(alias = "externalId", alias = "externalID")]
    pub external_id: String,
    /// Changes in the order the provider reported them
    #[serde(default)]
    pub updates: Vec<FieldUpdate>,
}

/// What applying an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The mapped local user was deleted
    UserDeleted {
        /// Local identity that was removed
        local_id: String,
    },
    /// Nothing we act on
    Ignored,
}

impl WebhookUpdateEvent {
    fn is_user(&self) -> bool {
        self.object_type.eq_ignore_ascii_case(USER_OBJECT_TYPE)
    }

    fn requests_deletion(&self) -> bool {
        self.updates
            .iter()
            .any(|u| u.field.eq_ignore_ascii_case(DELETED_FIELD) && is_truthy(&u.value))
    }

    /// Apply the event against the user directory.
    ///
    /// # Errors
    ///
    /// Propagates the directory error when a deletion fails.
    pub async fn apply(&self, users: &dyn UserDirectory) -> Result<UpdateOutcome> {
        if !self.is_user() || !self.requests_deletion() {
            debug!(
                object_type = %self.object_type,
                updates = self.updates.len(),
                "Ignoring webhook update"
            );
            return Ok(UpdateOutcome::Ignored);
        }

        let local_id = to_local_identity(&self.external_id);
        users.delete_user(&local_id).await?;
        info!(local_id = %local_id, "Deleted user after provider deletion webhook");

        Ok(UpdateOutcome::UserDeleted { local_id })
    }
}

/// Lowercase hex SHA-256 of a request body, as carried in the token `hash` claim.
#[must_use]
pub fn body_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
