use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Title given to notes created through [`Note::new`].
pub const DEFAULT_TITLE: &str = "Untitled";

/// Number of body characters shown in list previews.
pub const PREVIEW_CHARS: usize = 100;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the reference date
/// Foundation uses when it encodes dates as plain numbers.
const REFERENCE_DATE_UNIX_SECS: f64 = 978_307_200.0;

/// A titled block of text, persisted as one JSON file per note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    #[schemars(with = "DateTime<Utc>")]
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// A fresh note with a random id, the default title, an empty body and
    /// the current time.
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    pub fn new_at(created_at: DateTime<Utc>) -> Self {
        Note {
            id: Uuid::new_v4(),
            title: DEFAULT_TITLE.to_string(),
            body: String::new(),
            created_at,
        }
    }

    /// File name of this note inside the notes directory: the upper-case
    /// hyphenated id followed by `.json`.
    pub fn file_name(&self) -> String {
        file_name_for(self.id)
    }

    /// First [`PREVIEW_CHARS`] characters of the body, with an ellipsis when
    /// the body was cut.
    pub fn preview(&self) -> String {
        let mut chars = self.body.chars();
        let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{}…", head)
        } else {
            head
        }
    }
}

impl Default for Note {
    fn default() -> Self {
        Note::new()
    }
}

pub fn file_name_for(id: Uuid) -> String {
    let mut buf = Uuid::encode_buffer();
    format!("{}.json", id.hyphenated().encode_upper(&mut buf))
}

/// JSON Schema describing a note file as written by the store.
pub fn note_file_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(Note);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}

/// Accept either an RFC 3339 string or a number of seconds since the
/// Foundation reference date.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Seconds(f64),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| de::Error::custom(format!("invalid createdAt {:?}: {}", text, e))),
        RawTimestamp::Seconds(secs) => from_reference_seconds(secs)
            .ok_or_else(|| de::Error::custom(format!("createdAt out of range: {}", secs))),
    }
}

fn from_reference_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let unix = secs + REFERENCE_DATE_UNIX_SECS;
    let whole = unix.floor();
    let nanos = (((unix - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_note_has_defaults() {
        let note = Note::new();
        assert_eq!(note.title, "Untitled");
        assert!(note.body.is_empty());
        assert_ne!(note.id, Note::new().id);
    }

    #[test]
    fn serializes_camel_case_keys() {
        let note = Note::new_at(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["createdAt"], "2024-03-01T09:30:00Z");
        assert_eq!(value["title"], "Untitled");
        assert_eq!(value["id"], note.id.to_string());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn timestamp_survives_round_trip_with_subsecond_precision() {
        let created = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let note = Note::new_at(created);
        let json = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn numeric_timestamp_uses_reference_date() {
        let json = r#"{
            "id": "5F1B6E0C-8E43-4C1A-9D62-2A3F4B5C6D7E",
            "title": "Keynote",
            "body": "Hello",
            "createdAt": 0
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(
            note.created_at,
            Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            note.id.to_string(),
            "5f1b6e0c-8e43-4c1a-9d62-2a3f4b5c6d7e"
        );
    }

    #[test]
    fn fractional_numeric_timestamp() {
        let json = r#"{"id":"5f1b6e0c-8e43-4c1a-9d62-2a3f4b5c6d7e","title":"t","body":"","createdAt":86400.5}"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(
            note.created_at,
            Utc.with_ymd_and_hms(2001, 1, 2, 0, 0, 0).unwrap() + chrono::Duration::milliseconds(500)
        );
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let json = r#"{"id":"5f1b6e0c-8e43-4c1a-9d62-2a3f4b5c6d7e","title":"t","body":"","createdAt":"yesterday"}"#;
        assert!(serde_json::from_str::<Note>(json).is_err());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let json = r#"{"id":"5f1b6e0c-8e43-4c1a-9d62-2a3f4b5c6d7e","title":"t","body":"b","createdAt":"2024-01-01T00:00:00Z","pinned":true}"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.body, "b");
    }

    #[test]
    fn file_name_is_upper_case_id() {
        let mut note = Note::new();
        note.id = Uuid::parse_str("5f1b6e0c-8e43-4c1a-9d62-2a3f4b5c6d7e").unwrap();
        assert_eq!(note.file_name(), "5F1B6E0C-8E43-4C1A-9D62-2A3F4B5C6D7E.json");
    }

    #[test]
    fn preview_truncates_long_bodies_on_char_boundaries() {
        let mut note = Note::new();
        note.body = "é".repeat(150);
        let preview = note.preview();
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));

        note.body = "short".to_string();
        assert_eq!(note.preview(), "short");

        note.body = "x".repeat(PREVIEW_CHARS);
        assert_eq!(note.preview(), "x".repeat(PREVIEW_CHARS));
    }

    #[test]
    fn written_notes_match_schema() {
        let schema = note_file_schema();
        let mut note = Note::new();
        note.body = "line one\nline two".to_string();
        let instance = serde_json::to_value(&note).unwrap();
        assert!(jsonschema::is_valid(&schema, &instance));

        let missing_title = serde_json::json!({
            "id": note.id.to_string(),
            "body": "",
            "createdAt": "2024-01-01T00:00:00Z",
        });
        assert!(!jsonschema::is_valid(&schema, &missing_title));
    }
}
