//! Wire types shared by the table facade, the ORM and the CLI

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name to wire value mapping
pub type Fields = Map<String, Value>;

/// A record as the service returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDict {
    /// Record id (`rec...`)
    pub id: String,
    /// ISO-8601 creation timestamp
    #[serde(rename = "createdTime", default)]
    pub created_time: String,
    /// Field values; empty fields are omitted by the service
    #[serde(default)]
    pub fields: Fields,
}

/// Result of deleting one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedRecord {
    /// Record id
    pub id: String,
    /// Whether the record was deleted
    pub deleted: bool,
}

/// One entry of a batch update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Record id
    pub id: String,
    /// Fields to write
    pub fields: Fields,
}

/// One entry of a batch upsert; records without an id are matched on key fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRecord {
    /// Record id, when already known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Fields to write
    pub fields: Fields,
}

/// Result of a batch upsert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    /// Ids of records that were created
    #[serde(default)]
    pub created_records: Vec<String>,
    /// Ids of records that were updated
    #[serde(default)]
    pub updated_records: Vec<String>,
    /// All affected records, in input order
    #[serde(default)]
    pub records: Vec<RecordDict>,
}

impl UpsertResult {
    /// Append the result of a later chunk
    pub fn extend(&mut self, other: UpsertResult) {
        self.created_records.extend(other.created_records);
        self.updated_records.extend(other.updated_records);
        self.records.extend(other.records);
    }
}

/// A user as it appears in collaborator fields and comment authors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    /// User id (`usr...`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Keys not modelled above, kept so values round-trip unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An entry of an attachments field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment id (`att...`), absent for new uploads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Download URL
    pub url: String,
    /// File name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Keys not modelled above (size, type, thumbnails...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Value of a barcode field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barcode {
    /// Encoded text
    pub text: String,
    /// Symbology, e.g. `upce`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Value of a button field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    /// Button label
    pub label: String,
    /// Target URL, when the button opens one
    #[serde(default)]
    pub url: Option<String>,
}

/// A user or group mentioned in a comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    /// User or group id
    pub id: String,
    /// `user` or `userGroup`
    #[serde(rename = "type")]
    pub kind: String,
    /// Name shown in the comment
    #[serde(default)]
    pub display_name: Option<String>,
    /// Email, when mentioning a user
    #[serde(default)]
    pub email: Option<String>,
}

/// A comment on a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Comment id (`com...`)
    pub id: String,
    /// Comment text; mentions appear as `@[usr...]`
    pub text: String,
    /// ISO-8601 creation timestamp
    pub created_time: String,
    /// ISO-8601 timestamp of the last edit
    #[serde(default)]
    pub last_updated_time: Option<String>,
    /// Mentioned users keyed by id
    #[serde(default)]
    pub mentioned: Option<std::collections::BTreeMap<String, Mention>>,
    /// Comment author
    pub author: Collaborator,
}

/// Identity behind the access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// User id
    pub id: String,
    /// Email, when the token has the `user.email:read` scope
    #[serde(default)]
    pub email: Option<String>,
    /// Scopes granted to the token
    #[serde(default)]
    pub scopes: Vec<String>,
}
