use std::fmt;

use crate::values::InputBag;

type Predicate = dyn Fn(&InputBag) -> bool + Send + Sync;
type AdvisoryCheck = dyn Fn(&InputBag) -> Option<String> + Send + Sync;

/// A consistency rule spanning several fields.
///
/// The predicate returns `true` when the inputs are consistent. It is only
/// evaluated when every field it names is present in the bag.
///
/// ```rust
/// use calc_core::validation::CrossFieldRule;
/// use calc_core::values::Bag;
///
/// let rule = CrossFieldRule::new(
///     &["loanAmount", "propertyValue"],
///     "Loan amount cannot exceed property value",
///     |bag| bag.peek_number("loanAmount") <= bag.peek_number("propertyValue"),
/// );
/// let bag = Bag::new().with("loanAmount", 350_000.0).with("propertyValue", 300_000.0);
/// assert_eq!(rule.violation(&bag), Some("Loan amount cannot exceed property value"));
/// assert_eq!(rule.violation(&Bag::new()), None);
/// ```
pub struct CrossFieldRule {
    fields: Vec<String>,
    message: String,
    check: Box<Predicate>,
}

impl CrossFieldRule {
    pub fn new<F>(fields: &[&str], message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&InputBag) -> bool + Send + Sync + 'static,
    {
        CrossFieldRule {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            message: message.into(),
            check: Box::new(check),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn involves(&self, field_id: &str) -> bool {
        self.fields.iter().any(|f| f == field_id)
    }

    pub fn applies_to(&self, bag: &InputBag) -> bool {
        self.fields.iter().all(|f| bag.contains(f))
    }

    /// The rule's message if it applies and fails
    pub fn violation(&self, bag: &InputBag) -> Option<&str> {
        if self.applies_to(bag) && !(self.check)(bag) {
            Some(&self.message)
        } else {
            None
        }
    }
}

impl fmt::Debug for CrossFieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossFieldRule")
            .field("fields", &self.fields)
            .field("message", &self.message)
            .finish()
    }
}

/// A non-blocking check producing a warning message.
pub struct Advisory {
    fields: Vec<String>,
    check: Box<AdvisoryCheck>,
}

impl Advisory {
    pub fn new<F>(fields: &[&str], check: F) -> Self
    where
        F: Fn(&InputBag) -> Option<String> + Send + Sync + 'static,
    {
        Advisory {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            check: Box::new(check),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn involves(&self, field_id: &str) -> bool {
        self.fields.iter().any(|f| f == field_id)
    }

    pub fn warning(&self, bag: &InputBag) -> Option<String> {
        if self.fields.iter().all(|f| bag.contains(f)) {
            (self.check)(bag)
        } else {
            None
        }
    }
}

impl fmt::Debug for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisory").field("fields", &self.fields).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::Bag;

    #[test]
    fn test_rule_skipped_without_its_fields() {
        let rule = CrossFieldRule::new(&["a", "b"], "a must not exceed b", |bag| {
            bag.peek_number("a") <= bag.peek_number("b")
        });
        let partial = Bag::new().with("a", 10.0);
        assert!(!rule.applies_to(&partial));
        assert_eq!(rule.violation(&partial), None);
        assert!(rule.involves("b"));
        assert!(!rule.involves("c"));
    }

    #[test]
    fn test_advisory_warning() {
        let advisory = Advisory::new(&["ltv"], |bag| {
            bag.peek_number("ltv")
                .filter(|ltv| *ltv > 0.95)
                .map(|_| "LTV above 95%".to_string())
        });
        assert_eq!(advisory.warning(&Bag::new().with("ltv", 0.97)), Some("LTV above 95%".into()));
        assert_eq!(advisory.warning(&Bag::new().with("ltv", 0.5)), None);
        assert_eq!(advisory.warning(&Bag::new()), None);
    }
}
