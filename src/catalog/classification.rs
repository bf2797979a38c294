use super::{CatalogRule, Outcome};

/// Sentinel used for every CADF field of an unclassified entry.
pub const UNKNOWN: &str = "unknown";

/// Outcome of [`MessageCatalog::classify`](super::MessageCatalog::classify).
///
/// Borrows the matching rule from the catalog, so a classification never
/// outlives the catalog that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification<'c> {
    rule: Option<&'c CatalogRule>,
    args: Vec<String>,
    initiator_address: Option<String>,
}

impl<'c> Classification<'c> {
    pub fn classified(
        rule: &'c CatalogRule,
        args: Vec<String>,
        initiator_address: Option<String>,
    ) -> Self {
        Self {
            rule: Some(rule),
            args,
            initiator_address,
        }
    }

    pub fn unclassified(initiator_address: Option<String>) -> Self {
        Self {
            rule: None,
            args: Vec::new(),
            initiator_address,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.rule.is_some()
    }

    pub fn rule(&self) -> Option<&'c CatalogRule> {
        self.rule
    }

    pub fn action(&self) -> &str {
        self.rule.map_or(UNKNOWN, |rule| rule.action.as_str())
    }

    pub fn outcome(&self) -> Outcome {
        self.rule.map_or(Outcome::Unknown, |rule| rule.outcome)
    }

    pub fn target_type(&self) -> &str {
        self.rule.map_or(UNKNOWN, |rule| rule.target_type.as_str())
    }

    pub fn target_class(&self) -> &str {
        self.rule.map_or(UNKNOWN, |rule| rule.target_class.as_str())
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn initiator_address(&self) -> Option<&str> {
        self.initiator_address.as_deref()
    }
}
