//! Audience targeting.
//!
//! Conditions use three-valued logic: `Some(true)`, `Some(false)`, and `None` when the outcome is
//! unknown because the user did not supply an attribute the condition looks at.
use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Experiment, ProjectConfig};

/// User attributes supplied at decision time, keyed by attribute key.
///
/// Keys that are not declared in the datafile are ignored during targeting.
pub type UserAttributes = HashMap<String, String>;

/// A named, reusable targeting rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Audience {
    pub id: String,
    pub key: String,
    pub conditions: Condition,
}

impl Audience {
    pub fn evaluate(&self, attributes: &UserAttributes) -> Option<bool> {
        self.conditions.evaluate(attributes)
    }

    /// Only a definite match qualifies. An unknown outcome counts as a mismatch.
    pub fn matches(&self, attributes: &UserAttributes) -> bool {
        self.evaluate(attributes) == Some(true)
    }
}

/// Node of an audience condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    UserAttribute(UserAttributeCondition),
}

impl Condition {
    pub fn evaluate(&self, attributes: &UserAttributes) -> Option<bool> {
        match self {
            Condition::And(conditions) => {
                let mut unknown = false;
                for condition in conditions {
                    match condition.evaluate(attributes) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }

            Condition::Or(conditions) => {
                let mut unknown = false;
                for condition in conditions {
                    match condition.evaluate(attributes) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }

            Condition::Not(condition) => condition.evaluate(attributes).map(|value| !value),

            Condition::UserAttribute(condition) => condition.evaluate(attributes),
        }
    }
}

/// Leaf condition comparing a user attribute with an expected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttributeCondition {
    /// Attribute key.
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: String,
}

impl UserAttributeCondition {
    pub fn new(
        name: impl Into<String>,
        value_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        UserAttributeCondition {
            name: name.into(),
            value_type: value_type.into(),
            value: value.into(),
        }
    }

    /// Exact string match. Returns `None` if the attribute is missing.
    pub fn evaluate(&self, attributes: &UserAttributes) -> Option<bool> {
        attributes.get(&self.name).map(|value| *value == self.value)
    }
}

impl From<UserAttributeCondition> for Condition {
    fn from(value: UserAttributeCondition) -> Self {
        Condition::UserAttribute(value)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConditionParseError {
    #[error("conditions are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown condition operator {0:?}")]
    UnknownOperator(String),
    #[error("condition list must start with an operator")]
    MissingOperator,
    #[error("\"not\" condition requires an operand")]
    MissingOperand,
}

/// Parse the JSON-encoded condition string used by the datafile:
/// `["and", ["or", {"name": "browser", "type": "custom_dimension", "value": "firefox"}]]`.
impl FromStr for Condition {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(s)?;
        Condition::try_from(value)
    }
}

impl TryFrom<Value> for Condition {
    type Error = ConditionParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut list = match value {
            Value::Array(list) => list.into_iter(),
            leaf => {
                let leaf: UserAttributeCondition = serde_json::from_value(leaf)?;
                return Ok(leaf.into());
            }
        };

        let operator = match list.next() {
            Some(Value::String(operator)) => operator,
            _ => return Err(ConditionParseError::MissingOperator),
        };
        if !matches!(operator.as_str(), "and" | "or" | "not") {
            return Err(ConditionParseError::UnknownOperator(operator));
        }
        let mut operands = list
            .map(Condition::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        match operator.as_str() {
            "and" => Ok(Condition::And(operands)),
            "or" => Ok(Condition::Or(operands)),
            _ => {
                if operands.is_empty() {
                    return Err(ConditionParseError::MissingOperand);
                }
                Ok(Condition::Not(Box::new(operands.swap_remove(0))))
            }
        }
    }
}

impl ProjectConfig {
    /// Check whether the user passes the experiment's audience gate.
    ///
    /// An experiment without audiences admits everyone. Otherwise the user must match at least
    /// one of the referenced audiences. Attributes not declared in the datafile are invisible to
    /// conditions, and audience ids missing from the datafile never match.
    pub fn is_user_in_audience(&self, experiment: &Experiment, attributes: &UserAttributes) -> bool {
        if experiment.audience_ids.is_empty() {
            return true;
        }

        let attributes = self.filter_attributes(attributes);
        experiment.audience_ids.iter().any(|audience_id| {
            self.audience_by_id(audience_id)
                .is_some_and(|audience| audience.matches(&attributes))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Audience, Condition, ConditionParseError, UserAttributeCondition, UserAttributes};
    use crate::project_config::tests::valid_project_config;

    fn attrs(pairs: &[(&str, &str)]) -> UserAttributes {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }

    fn browser(value: &str) -> Condition {
        UserAttributeCondition::new("browser", "custom_dimension", value).into()
    }

    fn unknown() -> Condition {
        UserAttributeCondition::new("missing", "custom_dimension", "x").into()
    }

    fn not(condition: Condition) -> Condition {
        Condition::Not(Box::new(condition))
    }

    #[test]
    fn user_attribute_matches_exact_value() {
        let firefox = browser("firefox");
        assert_eq!(firefox.evaluate(&attrs(&[("browser", "firefox")])), Some(true));
        assert_eq!(firefox.evaluate(&attrs(&[("browser", "chrome")])), Some(false));
        assert_eq!(firefox.evaluate(&attrs(&[("browser", "Firefox")])), Some(false));
        assert_eq!(firefox.evaluate(&HashMap::new()), None);
    }

    #[test]
    fn and_condition() {
        let firefox = attrs(&[("browser", "firefox")]);

        assert_eq!(Condition::And(vec![]).evaluate(&firefox), Some(true));
        assert_eq!(
            Condition::And(vec![browser("firefox"), browser("firefox")]).evaluate(&firefox),
            Some(true)
        );
        // false wins over unknown
        assert_eq!(
            Condition::And(vec![unknown(), browser("chrome")]).evaluate(&firefox),
            Some(false)
        );
        assert_eq!(
            Condition::And(vec![browser("firefox"), unknown()]).evaluate(&firefox),
            None
        );
    }

    #[test]
    fn or_condition() {
        let firefox = attrs(&[("browser", "firefox")]);

        assert_eq!(Condition::Or(vec![]).evaluate(&firefox), Some(false));
        assert_eq!(
            Condition::Or(vec![browser("chrome"), browser("firefox")]).evaluate(&firefox),
            Some(true)
        );
        // true wins over unknown
        assert_eq!(
            Condition::Or(vec![unknown(), browser("firefox")]).evaluate(&firefox),
            Some(true)
        );
        assert_eq!(
            Condition::Or(vec![browser("chrome"), unknown()]).evaluate(&firefox),
            None
        );
        assert_eq!(
            Condition::Or(vec![browser("chrome"), browser("safari")]).evaluate(&firefox),
            Some(false)
        );
    }

    #[test]
    fn not_condition() {
        assert_eq!(
            not(browser("firefox")).evaluate(&attrs(&[("browser", "firefox")])),
            Some(false)
        );
        assert_eq!(
            not(browser("firefox")).evaluate(&attrs(&[("browser", "chrome")])),
            Some(true)
        );
        assert_eq!(not(browser("firefox")).evaluate(&HashMap::new()), None);
    }

    #[test]
    fn not_firefox_audience() {
        let audience = Audience {
            id: "1".to_owned(),
            key: "not_firefox_users".to_owned(),
            conditions: not(Condition::Or(vec![browser("firefox")])),
        };

        // attribute absent: every level is unknown, which does not qualify
        assert_eq!(audience.evaluate(&HashMap::new()), None);
        assert!(!audience.matches(&HashMap::new()));

        // firefox: leaf true, or true, not false
        assert_eq!(audience.evaluate(&attrs(&[("browser", "firefox")])), Some(false));
        assert!(!audience.matches(&attrs(&[("browser", "firefox")])));

        // chrome: leaf false, or false, not true
        assert_eq!(audience.evaluate(&attrs(&[("browser", "chrome")])), Some(true));
        assert!(audience.matches(&attrs(&[("browser", "chrome")])));
    }

    #[test]
    fn parse_nested_conditions() {
        let condition: Condition = r#"["and", ["or", ["not", {"name": "browser", "type": "custom_dimension", "value": "firefox"}]]]"#
            .parse()
            .unwrap();
        assert_eq!(
            condition,
            Condition::And(vec![Condition::Or(vec![not(browser("firefox"))])])
        );
    }

    #[test]
    fn parse_not_uses_first_operand() {
        let condition: Condition = r#"["not", {"name": "browser", "type": "custom_dimension", "value": "a"}, {"name": "browser", "type": "custom_dimension", "value": "b"}]"#
            .parse()
            .unwrap();
        assert_eq!(condition, not(browser("a")));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            r#"["xor", []]"#.parse::<Condition>(),
            Err(ConditionParseError::UnknownOperator(op)) if op == "xor"
        ));
        assert!(matches!(
            r#"["not"]"#.parse::<Condition>(),
            Err(ConditionParseError::MissingOperand)
        ));
        assert!(matches!(
            r#"[{"name": "a", "type": "b", "value": "c"}]"#.parse::<Condition>(),
            Err(ConditionParseError::MissingOperator)
        ));
        assert!(matches!(
            r#"["and", {"name": "a"}]"#.parse::<Condition>(),
            Err(ConditionParseError::Json(_))
        ));
        assert!(matches!(
            "not json".parse::<Condition>(),
            Err(ConditionParseError::Json(_))
        ));
    }

    #[test]
    fn experiment_audience_gate() {
        let config = valid_project_config();
        let etag1 = config.experiment_by_key("etag1").unwrap();

        assert!(config.is_user_in_audience(etag1, &attrs(&[("browser_type", "chrome")])));
        assert!(!config.is_user_in_audience(etag1, &attrs(&[("browser_type", "firefox")])));
        assert!(!config.is_user_in_audience(etag1, &HashMap::new()));
    }

    #[test]
    fn undeclared_attributes_are_unknown() {
        let config = valid_project_config();
        let etag1 = config.experiment_by_key("etag1").unwrap();

        // "browser" is not declared in the datafile, so the audience sees no attributes at all.
        assert!(!config.is_user_in_audience(etag1, &attrs(&[("browser", "chrome")])));
    }

    #[test]
    fn empty_audience_list_admits_everyone() {
        let config = valid_project_config();
        let mut experiment = config.experiment_by_key("etag1").unwrap().clone();
        experiment.audience_ids = vec![];

        assert!(config.is_user_in_audience(&experiment, &HashMap::new()));
        assert!(config.is_user_in_audience(&experiment, &attrs(&[("browser_type", "firefox")])));
    }

    #[test]
    fn missing_audience_never_matches() {
        let config = valid_project_config();
        let mut experiment = config.experiment_by_key("etag1").unwrap().clone();
        experiment.audience_ids = vec!["404".to_owned()];
        assert!(!config.is_user_in_audience(&experiment, &attrs(&[("browser_type", "chrome")])));

        // audiences are or-ed at the experiment level
        experiment.audience_ids.push("100".to_owned());
        assert!(config.is_user_in_audience(&experiment, &attrs(&[("browser_type", "chrome")])));
    }
}
