use super::CatalogLoadError;
use crate::parser::{Template, positional};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// CADF outcome of the action a message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Pending,
    #[default]
    Unknown,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Pending => "pending",
            Outcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog document as written in the YAML file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CatalogDocument {
    #[serde(default, deserialize_with = "scalar_string_opt")]
    pub hmc_version: Option<String>,
    #[serde(default)]
    pub messages: Vec<RuleDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RuleDocument {
    #[serde(deserialize_with = "scalar_string")]
    pub number: String,
    pub message: String,
    pub action: String,
    pub outcome: Outcome,
    pub target_type: String,
    pub target_class: String,
    #[serde(default)]
    pub initiator_address_item: Option<usize>,
}

/// Highest positional placeholder index a catalog message may use.
pub const MAX_PLACEHOLDER_INDEX: usize = 255;

/// One classification rule with its message template precompiled.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRule {
    pub number: String,
    pub action: String,
    pub outcome: Outcome,
    pub target_type: String,
    pub target_class: String,
    pub initiator_address_item: Option<usize>,
    template: Template<usize>,
    arity: usize,
}

impl CatalogRule {
    pub(crate) fn from_document(doc: RuleDocument) -> Result<Self, CatalogLoadError> {
        let template = Template::compile(&doc.message, positional).map_err(|source| {
            CatalogLoadError::Template {
                number: doc.number.clone(),
                source,
            }
        })?;
        if let Some(index) = template
            .placeholders()
            .copied()
            .find(|index| *index > MAX_PLACEHOLDER_INDEX)
        {
            return Err(CatalogLoadError::PlaceholderIndex {
                number: doc.number,
                index,
            });
        }
        let arity = template
            .placeholders()
            .filter_map(|index| index.checked_add(1))
            .max()
            .unwrap_or(0);

        if let Some(item) = doc.initiator_address_item
            && !template.placeholders().any(|index| *index == item)
        {
            return Err(CatalogLoadError::InitiatorItem {
                number: doc.number,
                item,
            });
        }

        Ok(Self {
            number: doc.number,
            action: doc.action,
            outcome: doc.outcome,
            target_type: doc.target_type,
            target_class: doc.target_class,
            initiator_address_item: doc.initiator_address_item,
            template,
            arity,
        })
    }

    pub fn message(&self) -> &str {
        self.template.source()
    }

    /// Number of positional arguments, i.e. highest placeholder index + 1.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Pull the positional arguments out of a formatted message. Arguments that
    /// cannot be located are left empty.
    pub fn extract_args(&self, text: &str) -> Vec<String> {
        let mut args = vec![String::new(); self.arity];
        for (index, value) in self.template.placeholders().zip(self.template.split(text)) {
            args[*index] = value.to_string();
        }
        args
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Integer(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
        }
    }
}

// Message numbers and version tags are often written unquoted in YAML.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

fn scalar_string_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}
