use serde::{Deserialize, Serialize, Serializer};
use serde::ser::SerializeStruct;

/// Outcome of a full validation pass.
///
/// `is_valid()` is derived from `errors`, so the two can never disagree.
/// Warnings never affect validity.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationResult", 3)?;
        state.serialize_field("isValid", &self.is_valid())?;
        state.serialize_field("errors", &self.errors)?;
        state.serialize_field("warnings", &self.warnings)?;
        state.end()
    }
}

/// Outcome of checking a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickCheck {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl QuickCheck {
    pub fn valid() -> Self {
        QuickCheck {
            is_valid: true,
            error: None,
            warning: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        QuickCheck {
            is_valid: false,
            error: Some(message.into()),
            warning: None,
        }
    }

    pub fn with_warning(mut self, message: Option<String>) -> Self {
        self.warning = message;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_follows_errors() {
        let mut result = ValidationResult::new();
        result.warning("LTV above 95%");
        assert!(result.is_valid());
        result.error("Loan amount is required");
        assert!(!result.is_valid());
    }

    #[test]
    fn test_serialized_shape() {
        let mut result = ValidationResult::new();
        result.error("Property value is required");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["errors"][0], "Property value is required");
        assert!(json["warnings"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_quick_check_shape() {
        let json = serde_json::to_value(QuickCheck::valid()).unwrap();
        assert_eq!(json, serde_json::json!({ "isValid": true }));
    }
}
