//! Game variants: the option catalog a rule set offers and the concrete
//! choices a game was created with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Concrete option choices for one game, keyed by option name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variant(BTreeMap<String, String>);

impl Variant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One configurable option and its allowed values. The first value is the
/// default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantOption {
    pub name: String,
    pub values: Vec<String>,
}

impl VariantOption {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn default_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    #[error("unknown variant option {0:?}")]
    UnknownOption(String),

    #[error("value {value:?} is not allowed for variant option {option:?}")]
    InvalidValue { option: String, value: String },
}

/// The catalog of options a rule set accepts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariantCatalog {
    options: Vec<VariantOption>,
}

impl VariantCatalog {
    pub fn new(options: Vec<VariantOption>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &[VariantOption] {
        &self.options
    }

    /// Validates `variant` against the catalog and fills in defaults for
    /// every option it leaves unset.
    pub fn complete(&self, variant: &Variant) -> Result<Variant, VariantError> {
        for (key, value) in variant.iter() {
            let option = self
                .options
                .iter()
                .find(|o| o.name == key)
                .ok_or_else(|| VariantError::UnknownOption(key.to_string()))?;
            if !option.values.iter().any(|v| v == value) {
                return Err(VariantError::InvalidValue {
                    option: key.to_string(),
                    value: value.to_string(),
                });
            }
        }

        let mut completed = variant.clone();
        for option in &self.options {
            if completed.get(&option.name).is_none()
                && let Some(default) = option.default_value()
            {
                completed.insert(option.name.clone(), default);
            }
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> VariantCatalog {
        VariantCatalog::new(vec![
            VariantOption::new("TargetScore", ["100", "50"]),
            VariantOption::new("TurnTimer", ["off", "30s"]),
        ])
    }

    #[test]
    fn test_complete_fills_defaults() {
        let variant = catalog()
            .complete(&Variant::new().with("TargetScore", "50"))
            .unwrap();
        assert_eq!(variant.get("TargetScore"), Some("50"));
        assert_eq!(variant.get("TurnTimer"), Some("off"));
    }

    #[test]
    fn test_complete_rejects_unknown() {
        let err = catalog()
            .complete(&Variant::new().with("Color", "red"))
            .unwrap_err();
        assert_eq!(err, VariantError::UnknownOption("Color".into()));

        let err = catalog()
            .complete(&Variant::new().with("TargetScore", "7"))
            .unwrap_err();
        assert!(matches!(err, VariantError::InvalidValue { .. }));
    }
}
