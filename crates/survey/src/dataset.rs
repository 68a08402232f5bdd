//! Dataset documents and their normalisation into samples.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::sha256_hex;
use crate::{DatasetInfo, FormatSupport, Result, Role, Sample, SurveyError};

/// Process-wide sample set. Built once at startup and never mutated.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub name: String,
    samples: Vec<Sample>,
}

/// What normalisation did to the raw items.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub items: u64,
    pub loaded: u64,
    pub hashes_filled: u64,
    pub skipped: u64,
    pub duplicate_hashes: u64,
    pub role_counts: BTreeMap<String, u64>,
    pub warnings: Vec<String>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self { name: name.into(), samples }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Normalise raw items: fill missing content hashes, drop items that do
    /// not describe a conversation.
    pub fn from_items(name: impl Into<String>, items: Vec<Value>) -> (Self, LoadReport) {
        let mut report = LoadReport::default();
        let mut samples = Vec::with_capacity(items.len());
        let mut seen = HashSet::new();

        for (i, item) in items.into_iter().enumerate() {
            report.items += 1;
            let item_no = i + 1;

            let Value::Object(mut obj) = item else {
                report.skipped += 1;
                report.warnings.push(format!("Item {item_no}: not a JSON object"));
                continue;
            };

            let has_hash = matches!(obj.get("turn_prompt_hash"), Some(Value::String(h)) if !h.is_empty());
            if !has_hash {
                let Some(conversations) = obj.get("conversations") else {
                    report.skipped += 1;
                    report.warnings.push(format!("Item {item_no}: missing conversations"));
                    continue;
                };
                let hash = content_hash(conversations);
                obj.insert("turn_prompt_hash".to_string(), Value::String(hash));
                report.hashes_filled += 1;
            }

            let sample: Sample = match serde_json::from_value(Value::Object(obj)) {
                Ok(s) => s,
                Err(e) => {
                    report.skipped += 1;
                    report.warnings.push(format!("Item {item_no}: {e}"));
                    continue;
                }
            };

            for turn in &sample.conversation_turns {
                let role = turn.role.as_ref().map_or("unknown", Role::as_str);
                *report.role_counts.entry(role.to_string()).or_default() += 1;
            }
            let answered = sample
                .conversation_turns
                .iter()
                .any(|t| matches!(t.role, Some(Role::Gpt | Role::GptNamed)));
            if !answered {
                report.warnings.push(format!("Item {item_no}: no model response"));
            }
            if !seen.insert(sample.content_hash.clone()) {
                report.duplicate_hashes += 1;
            }

            samples.push(sample);
        }

        report.loaded = samples.len() as u64;
        if report.duplicate_hashes > 0 {
            report.warnings.push(format!(
                "{} samples share a content hash; their ratings will be merged",
                report.duplicate_hashes
            ));
        }

        (Self::new(name, samples), report)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            name: self.name.clone(),
            total_samples: self.len(),
            format_support: FormatSupport { json: true, parquet: false },
        }
    }
}

/// SHA-256 over the compact JSON of the conversation turns, keys in the
/// order they appear in the source document.
pub fn content_hash(conversations: &Value) -> String {
    sha256_hex(conversations.to_string().as_bytes())
}

/// Split a dataset document into raw items.
///
/// Accepts a JSON array of items, a single conversation object, or a stream
/// of concatenated / newline-delimited objects.
pub fn parse_document(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    for value in serde_json::Deserializer::from_slice(bytes).into_iter::<Value>() {
        values.push(value.map_err(|e| SurveyError::InvalidDataset(format!("invalid JSON: {e}")))?);
    }

    if values.len() != 1 {
        return Ok(values);
    }
    match values.remove(0) {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) if obj.get("conversations").is_some() => Ok(vec![obj]),
        _ => Err(SurveyError::InvalidDataset(
            "expected an array of items or an object with conversations".to_string(),
        )),
    }
}
