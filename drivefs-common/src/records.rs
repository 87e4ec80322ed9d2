use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Prefix shared by Drive-native document types (Docs, Sheets, ...).
/// These have no binary payload and must be exported.
pub const NATIVE_MIME_PREFIX: &str = "application/vnd.google-apps";

/// `kind` of a listing envelope. A record with this kind represents the
/// listed container itself and carries no ID.
pub const FILE_LIST_KIND: &str = "drive#fileList";

/// Raw file resource as returned by the remote store.
///
/// Unknown fields are kept in `extra` so a record survives a cache round
/// trip unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
    #[serde(default, with = "size_format", skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_links: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trashed: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteRecord {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME)
    }

    pub fn is_file_list(&self) -> bool {
        self.kind.as_deref() == Some(FILE_LIST_KIND)
    }

    /// True for Drive-native documents, which can only be exported.
    pub fn is_native_document(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|m| m.starts_with(NATIVE_MIME_PREFIX))
            .unwrap_or(false)
    }

    /// The parent used for containment walks. Items with several parents
    /// are walked through the first one.
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(rename = "type", default)]
    pub grantee_type: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Permission {
    /// Read access for anonymous users ("anyone with the link").
    pub fn grants_anonymous_read(&self) -> bool {
        self.grantee_type == "anyone" && self.role == "reader"
    }
}

/// Drive encodes int64 values as JSON strings. Accept either form, write
/// the string form back.
mod size_format {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(n)) => Ok(Some(n)),
            Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drive_file() {
        let json = serde_json::json!({
            "id": "1AbC",
            "kind": "drive#file",
            "mimeType": "image/png",
            "name": "logo.png",
            "parents": ["0Root"],
            "size": "2048",
            "modifiedTime": "2024-03-01T10:00:00.000Z",
            "permissions": [{"type": "anyone", "role": "reader", "id": "anyoneWithLink"}],
            "capabilities": {"canEdit": true},
            "imageMediaMetadata": {"width": 64, "height": 64},
        });
        let record: RemoteRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.id.as_deref(), Some("1AbC"));
        assert_eq!(record.size, Some(2048));
        assert_eq!(record.first_parent(), Some("0Root"));
        assert!(record.permissions[0].grants_anonymous_read());
        assert!(record.extra.contains_key("imageMediaMetadata"));
        assert!(!record.is_folder());
    }

    #[test]
    fn test_numeric_size_accepted() {
        let record: RemoteRecord =
            serde_json::from_value(serde_json::json!({"id": "x", "size": 12})).unwrap();
        assert_eq!(record.size, Some(12));
    }

    #[test]
    fn test_unknown_fields_survive_serialization() {
        let json = serde_json::json!({
            "id": "1AbC",
            "name": "a.txt",
            "size": "5",
            "contentHints": {"indexableText": "hello"},
        });
        let record: RemoteRecord = serde_json::from_value(json.clone()).unwrap();
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_native_document_detection() {
        let record = RemoteRecord {
            mime_type: Some("application/vnd.google-apps.spreadsheet".to_string()),
            ..Default::default()
        };
        assert!(record.is_native_document());

        let folder = RemoteRecord {
            mime_type: Some(FOLDER_MIME.to_string()),
            ..Default::default()
        };
        assert!(folder.is_folder());
        assert!(folder.is_native_document());
    }
}
