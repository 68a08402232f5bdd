use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::UserId;

/// Speaker of a conversation turn. Unrecognised roles are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    Human,
    Gpt,
    HumanNamed,
    GptNamed,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::Human => "human",
            Role::Gpt => "gpt",
            Role::HumanNamed => "human-named",
            Role::GptNamed => "gpt-named",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "system" => Role::System,
            "human" => Role::Human,
            "gpt" => Role::Gpt,
            "human-named" => Role::HumanNamed,
            "gpt-named" => Role::GptNamed,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        match r {
            Role::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversation turn. A missing speaker or a null text does not make the
/// turn unusable; fields beyond the known ones are kept in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "from", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(rename = "value", default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One dataset item. Fields the service does not interpret are carried in
/// `extra` and served back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "turn_prompt_hash")]
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(rename = "conversations")]
    pub conversation_turns: Vec<Turn>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A sample as served to one user, with progress metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServedSample {
    #[serde(flatten)]
    pub sample: Sample,
    pub total_available: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_last_sample: Option<bool>,
}

impl ServedSample {
    pub fn is_last(&self) -> bool {
        self.is_last_sample.unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(rename = "turn_prompt_hash")]
    pub content_hash: String,
    pub label: bool,
    #[serde(rename = "timestamp")]
    pub recorded_at: DateTime<Utc>,
}

/// Rating as submitted by a client, before validation.
///
/// `content_hash` is accepted as an alias of `turn_prompt_hash`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RatingSubmission {
    #[serde(rename = "turn_prompt_hash", alias = "content_hash", default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub label: Option<Value>,
    #[serde(rename = "timestamp", alias = "recorded_at", default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<Value>,
}

impl RatingSubmission {
    pub fn new(content_hash: impl Into<String>, label: bool) -> Self {
        Self {
            content_hash: Some(content_hash.into()),
            label: Some(Value::Bool(label)),
            recorded_at: None,
        }
    }

    /// Hash and label, or the reason the submission is unusable.
    pub fn validate(&self) -> crate::Result<(&str, bool)> {
        let hash = match self.content_hash.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => h,
            _ => return Err(crate::SurveyError::MissingFields),
        };
        match &self.label {
            None | Some(Value::Null) => Err(crate::SurveyError::MissingFields),
            Some(Value::Bool(b)) => Ok((hash, *b)),
            Some(_) => Err(crate::SurveyError::InvalidLabel),
        }
    }

    /// Client supplied timestamp, if it is a valid RFC 3339 instant.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.recorded_at.as_ref()?.as_str()?;
        DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserIndexPermutation {
    pub owner: UserId,
    pub indices: Vec<usize>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormatSupport {
    pub json: bool,
    pub parquet: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub name: String,
    pub total_samples: usize,
    #[serde(default = "json_only")]
    pub format_support: FormatSupport,
}

fn json_only() -> FormatSupport {
    FormatSupport { json: true, parquet: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sample_keeps_wire_names_and_extra_fields() {
        let raw = json!({
            "turn_prompt_hash": "abc",
            "model_name": "QwQ",
            "generation_settings": "temp=0.7",
            "conversations": [
                {"from": "system", "value": "be brief"},
                {"from": "gpt-named", "value": "hi", "name": "Ava"},
                {"from": "narrator", "value": "...", "weight": 0},
                {"from": "gpt", "value": null, "weight": 1, "loss_mask": [0, 1]}
            ]
        });
        let s: Sample = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(s.content_hash, "abc");
        assert_eq!(s.conversation_turns[1].role, Some(Role::GptNamed));
        assert_eq!(s.conversation_turns[1].name.as_deref(), Some("Ava"));
        assert_eq!(s.conversation_turns[2].role, Some(Role::Other("narrator".into())));
        assert_eq!(s.extra["generation_settings"], "temp=0.7");
        assert_eq!(s.conversation_turns[2].extra["weight"], 0);
        assert_eq!(s.conversation_turns[3].text, None);
        assert_eq!(s.conversation_turns[3].extra["loss_mask"], json!([0, 1]));
        assert_eq!(serde_json::to_value(&s).unwrap(), raw);
    }

    #[test]
    fn turn_without_speaker_is_kept() {
        let t: Turn = serde_json::from_value(json!({"value": "orphan", "weight": 2})).unwrap();
        assert_eq!(t.role, None);
        assert_eq!(t.text.as_deref(), Some("orphan"));
        assert_eq!(serde_json::to_value(&t).unwrap(), json!({"value": "orphan", "weight": 2}));
    }

    #[test]
    fn served_sample_flattens_metadata() {
        let served = ServedSample {
            sample: Sample {
                content_hash: "h".into(),
                dataset_name: None,
                model_name: None,
                conversation_turns: vec![],
                extra: Map::new(),
            },
            total_available: 2,
            is_last_sample: Some(true),
        };
        let v = serde_json::to_value(&served).unwrap();
        assert_eq!(v, json!({"turn_prompt_hash": "h", "conversations": [], "total_available": 2, "is_last_sample": true}));
        let back: ServedSample = serde_json::from_value(v).unwrap();
        assert_eq!(back, served);
    }

    #[test]
    fn submission_validation() {
        let ok: RatingSubmission = serde_json::from_value(json!({"content_hash": "h", "label": false})).unwrap();
        assert_eq!(ok.validate().unwrap(), ("h", false));

        let missing: RatingSubmission = serde_json::from_value(json!({"label": true})).unwrap();
        assert!(matches!(missing.validate(), Err(crate::SurveyError::MissingFields)));

        let empty = RatingSubmission::new("  ", true);
        assert!(matches!(empty.validate(), Err(crate::SurveyError::MissingFields)));

        let stringly: RatingSubmission =
            serde_json::from_value(json!({"turn_prompt_hash": "h", "label": "true"})).unwrap();
        assert!(matches!(stringly.validate(), Err(crate::SurveyError::InvalidLabel)));
    }

    #[test]
    fn submission_timestamp_parses_iso_strings_only() {
        let s: RatingSubmission = serde_json::from_value(
            json!({"turn_prompt_hash": "h", "label": true, "timestamp": "2024-03-01T10:00:00.000Z"}),
        )
        .unwrap();
        assert_eq!(s.timestamp().unwrap().to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let bad: RatingSubmission =
            serde_json::from_value(json!({"turn_prompt_hash": "h", "label": true, "timestamp": 12})).unwrap();
        assert!(bad.timestamp().is_none());
    }
}
