use std::{
    borrow::Cow,
    collections::HashMap,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::{condition::Audience, UserAttributes};

/// Immutable view of a loaded datafile with constant-time lookup indices.
///
/// A `ProjectConfig` is never modified after construction. Loading a new datafile produces a new
/// instance, so it can be shared between threads (usually behind an `Arc`) without locking.
///
/// All lookups return `None` for unknown keys. Deciding whether a miss should be logged or
/// reported is left to the caller.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    project: Project,
    groups: Vec<Group>,
    experiments: Vec<Experiment>,
    attributes: Vec<Attribute>,
    event_types: Vec<EventType>,
    audiences: Vec<Audience>,

    experiment_key_map: HashMap<String, usize>,
    experiment_id_map: HashMap<String, usize>,
    event_key_map: HashMap<String, usize>,
    attribute_key_map: HashMap<String, usize>,
    group_id_map: HashMap<String, usize>,
    audience_id_map: HashMap<String, usize>,
}

/// Project-level identifiers of a datafile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub account_id: String,
    pub project_id: String,
    pub version: String,
    pub revision: String,
}

/// An experiment: a set of variations, the traffic split between them, and who may enter.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub id: String,
    pub key: String,
    pub status: ExperimentStatus,
    /// Audiences the user must match (any of them). Empty means everyone matches.
    pub audience_ids: Vec<String>,
    pub variations: Vec<Variation>,
    /// User id to variation key overrides.
    pub forced_variations: HashMap<String, String>,
    /// Split of `[0, 10000)` between variation ids.
    pub traffic_allocation: Vec<TrafficAllocation>,
    /// Mutual exclusion group this experiment belongs to, if any.
    pub group_id: Option<String>,
}

impl Experiment {
    /// Only running experiments bucket users.
    pub fn is_running(&self) -> bool {
        self.status == ExperimentStatus::Running
    }

    pub fn variation_by_key(&self, key: &str) -> Option<&Variation> {
        self.variations.iter().find(|variation| variation.key == key)
    }

    pub fn variation_by_id(&self, id: &str) -> Option<&Variation> {
        self.variations.iter().find(|variation| variation.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentStatus {
    Running,
    #[serde(rename = "Not started")]
    NotStarted,
    Paused,
    Archived,
    /// Any status this SDK does not know about. Treated as not running.
    #[serde(other)]
    Other,
}

/// One arm of an experiment. Variations are compared by id.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Variation {
    pub id: String,
    pub key: String,
}

impl Variation {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Variation {
            id: id.into(),
            key: key.into(),
        }
    }

    /// Check variation key. Handy for branching on the result of a decision.
    pub fn is(&self, key: &str) -> bool {
        self.key == key
    }
}

impl PartialEq for Variation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for Variation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Upper bound of the bucket range assigned to an entity (a variation id or an experiment id).
///
/// Each range starts where the previous one in the sequence ended, so `end_of_range` values
/// must be strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficAllocation {
    pub entity_id: String,
    pub end_of_range: u32,
}

impl TrafficAllocation {
    pub fn new(entity_id: impl Into<String>, end_of_range: u32) -> Self {
        TrafficAllocation {
            entity_id: entity_id.into(),
            end_of_range,
        }
    }
}

/// A set of experiments sharing a traffic split.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: String,
    pub policy: GroupPolicy,
    pub experiment_ids: Vec<String>,
    /// Split of `[0, 10000)` between experiment ids. Only used by [`GroupPolicy::Random`].
    pub traffic_allocation: Vec<TrafficAllocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    /// Mutually exclusive: a user enters at most one experiment of the group.
    Random,
    /// Membership is informational; experiments bucket independently.
    Overlapping,
}

/// A targeting dimension recognized by the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub segment_id: Option<String>,
}

/// A conversion event and the experiments it is tracked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub experiment_ids: Vec<String>,
}

impl ProjectConfig {
    /// Build a configuration and its lookup indices.
    ///
    /// `experiments` must include group member experiments as well. If two entities share a
    /// key, the last one wins.
    pub fn new(
        project: Project,
        groups: Vec<Group>,
        experiments: Vec<Experiment>,
        attributes: Vec<Attribute>,
        event_types: Vec<EventType>,
        audiences: Vec<Audience>,
    ) -> ProjectConfig {
        ProjectConfig {
            experiment_key_map: index_by(&experiments, |e| &e.key),
            experiment_id_map: index_by(&experiments, |e| &e.id),
            event_key_map: index_by(&event_types, |e| &e.key),
            attribute_key_map: index_by(&attributes, |a| &a.key),
            group_id_map: index_by(&groups, |g| &g.id),
            audience_id_map: index_by(&audiences, |a| &a.id),
            project,
            groups,
            experiments,
            attributes,
            event_types,
            audiences,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn event_types(&self) -> &[EventType] {
        &self.event_types
    }

    pub fn audiences(&self) -> &[Audience] {
        &self.audiences
    }

    pub fn experiment_by_key(&self, key: &str) -> Option<&Experiment> {
        lookup(&self.experiments, &self.experiment_key_map, key)
    }

    pub fn experiment_by_id(&self, id: &str) -> Option<&Experiment> {
        lookup(&self.experiments, &self.experiment_id_map, id)
    }

    pub fn event_type_by_key(&self, key: &str) -> Option<&EventType> {
        lookup(&self.event_types, &self.event_key_map, key)
    }

    pub fn attribute_by_key(&self, key: &str) -> Option<&Attribute> {
        lookup(&self.attributes, &self.attribute_key_map, key)
    }

    pub fn group_by_id(&self, id: &str) -> Option<&Group> {
        lookup(&self.groups, &self.group_id_map, id)
    }

    pub fn audience_by_id(&self, id: &str) -> Option<&Audience> {
        lookup(&self.audiences, &self.audience_id_map, id)
    }

    /// Return keys of `attributes` that are not declared in the datafile.
    pub fn unknown_attribute_keys<'a>(&self, attributes: &'a UserAttributes) -> Vec<&'a str> {
        attributes
            .keys()
            .filter(|key| !self.attribute_key_map.contains_key(key.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Drop attributes that are not declared in the datafile.
    ///
    /// Borrows the input when every attribute is known.
    pub fn filter_attributes<'a>(&self, attributes: &'a UserAttributes) -> Cow<'a, UserAttributes> {
        if attributes
            .keys()
            .all(|key| self.attribute_key_map.contains_key(key.as_str()))
        {
            Cow::Borrowed(attributes)
        } else {
            Cow::Owned(
                attributes
                    .iter()
                    .filter(|(key, _)| self.attribute_key_map.contains_key(key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            )
        }
    }
}

fn index_by<T>(entities: &[T], key: impl Fn(&T) -> &String) -> HashMap<String, usize> {
    entities
        .iter()
        .enumerate()
        .map(|(i, entity)| (key(entity).clone(), i))
        .collect()
}

fn lookup<'a, T>(entities: &'a [T], index: &HashMap<String, usize>, key: &str) -> Option<&'a T> {
    index.get(key).and_then(|&i| entities.get(i))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{borrow::Cow, collections::HashMap};

    use super::*;
    use crate::condition::{Condition, UserAttributeCondition};

    /// Configuration mirroring `tests/data/valid-project-config.json`.
    pub(crate) fn valid_project_config() -> ProjectConfig {
        let forced = HashMap::from([
            ("testUser1".to_owned(), "e1_vtag1".to_owned()),
            ("testUser2".to_owned(), "e1_vtag2".to_owned()),
        ]);

        let experiments = vec![
            experiment(
                "223",
                "etag1",
                ExperimentStatus::Running,
                &["100"],
                &[("276", "vtag1"), ("277", "vtag2")],
                HashMap::new(),
                &[("276", 3500), ("277", 9000)],
                None,
            ),
            experiment(
                "118",
                "etag2",
                ExperimentStatus::NotStarted,
                &["100"],
                &[("278", "vtag3"), ("279", "vtag4")],
                HashMap::new(),
                &[("278", 4500), ("279", 9000)],
                None,
            ),
            experiment(
                "301",
                "group_etag2",
                ExperimentStatus::Running,
                &["100"],
                &[("282", "e2_vtag1"), ("283", "e2_vtag2")],
                HashMap::new(),
                &[("282", 5000), ("283", 10000)],
                Some("42"),
            ),
            experiment(
                "300",
                "group_etag1",
                ExperimentStatus::Running,
                &["100"],
                &[("280", "e1_vtag1"), ("281", "e1_vtag2")],
                forced.clone(),
                &[("280", 3000), ("281", 10000)],
                Some("42"),
            ),
            experiment(
                "302",
                "overlapping_etag1",
                ExperimentStatus::Running,
                &["100"],
                &[("284", "e1_vtag1"), ("285", "e1_vtag2")],
                forced,
                &[("284", 1500), ("285", 3000)],
                Some("43"),
            ),
        ];

        let groups = vec![
            Group {
                id: "42".to_owned(),
                policy: GroupPolicy::Random,
                experiment_ids: vec!["301".to_owned(), "300".to_owned()],
                traffic_allocation: vec![
                    TrafficAllocation::new("300", 3000),
                    TrafficAllocation::new("301", 9000),
                    TrafficAllocation::new("", 10000),
                ],
            },
            Group {
                id: "43".to_owned(),
                policy: GroupPolicy::Overlapping,
                experiment_ids: vec!["302".to_owned()],
                traffic_allocation: vec![],
            },
        ];

        let attributes = vec![Attribute {
            id: "134".to_owned(),
            key: "browser_type".to_owned(),
            segment_id: Some("185".to_owned()),
        }];

        let event_types = vec![
            event_type("971", "clicked_cart", &["223"]),
            event_type("098", "Total Revenue", &["223"]),
            event_type("099", "clicked_purchase", &["118", "223"]),
        ];

        let audiences = vec![Audience {
            id: "100".to_owned(),
            key: "not_firefox_users".to_owned(),
            conditions: Condition::And(vec![Condition::Or(vec![Condition::Not(Box::new(
                Condition::Or(vec![UserAttributeCondition::new(
                    "browser_type",
                    "custom_dimension",
                    "firefox",
                )
                .into()]),
            ))])]),
        }];

        ProjectConfig::new(
            Project {
                account_id: "789".to_owned(),
                project_id: "1234".to_owned(),
                version: "2".to_owned(),
                revision: "42".to_owned(),
            },
            groups,
            experiments,
            attributes,
            event_types,
            audiences,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn experiment(
        id: &str,
        key: &str,
        status: ExperimentStatus,
        audience_ids: &[&str],
        variations: &[(&str, &str)],
        forced_variations: HashMap<String, String>,
        traffic_allocation: &[(&str, u32)],
        group_id: Option<&str>,
    ) -> Experiment {
        Experiment {
            id: id.to_owned(),
            key: key.to_owned(),
            status,
            audience_ids: audience_ids.iter().map(|&id| id.to_owned()).collect(),
            variations: variations
                .iter()
                .map(|&(id, key)| Variation::new(id, key))
                .collect(),
            forced_variations,
            traffic_allocation: traffic_allocation
                .iter()
                .map(|&(entity_id, end)| TrafficAllocation::new(entity_id, end))
                .collect(),
            group_id: group_id.map(str::to_owned),
        }
    }

    fn event_type(id: &str, key: &str, experiment_ids: &[&str]) -> EventType {
        EventType {
            id: id.to_owned(),
            key: key.to_owned(),
            experiment_ids: experiment_ids.iter().map(|&id| id.to_owned()).collect(),
        }
    }

    #[test]
    fn lookups_by_key_and_id() {
        let config = valid_project_config();

        assert_eq!(config.experiment_by_key("etag1").unwrap().id, "223");
        assert_eq!(config.experiment_by_id("300").unwrap().key, "group_etag1");
        assert_eq!(config.event_type_by_key("clicked_purchase").unwrap().id, "099");
        assert_eq!(config.attribute_by_key("browser_type").unwrap().id, "134");
        assert_eq!(config.group_by_id("43").unwrap().policy, GroupPolicy::Overlapping);
        assert_eq!(config.audience_by_id("100").unwrap().key, "not_firefox_users");
    }

    #[test]
    fn lookup_misses_return_none() {
        let config = valid_project_config();

        assert!(config.experiment_by_key("unknown").is_none());
        assert!(config.experiment_by_id("unknown").is_none());
        assert!(config.event_type_by_key("unknown").is_none());
        assert!(config.attribute_by_key("unknown").is_none());
        assert!(config.group_by_id("unknown").is_none());
        assert!(config.audience_by_id("unknown").is_none());
    }

    #[test]
    fn variations_are_compared_by_id() {
        assert_eq!(Variation::new("1", "a"), Variation::new("1", "renamed"));
        assert_ne!(Variation::new("1", "a"), Variation::new("2", "a"));
        assert!(Variation::new("1", "a").is("a"));
    }

    #[test]
    fn experiment_variation_lookup() {
        let config = valid_project_config();
        let experiment = config.experiment_by_key("etag1").unwrap();

        assert_eq!(experiment.variation_by_key("vtag2").unwrap().id, "277");
        assert_eq!(experiment.variation_by_id("276").unwrap().key, "vtag1");
        assert!(experiment.variation_by_key("nope").is_none());
        assert!(experiment.is_running());
        assert!(!config.experiment_by_key("etag2").unwrap().is_running());
    }

    #[test]
    fn filter_attributes_borrows_when_all_known() {
        let config = valid_project_config();
        let attributes = HashMap::from([("browser_type".to_owned(), "chrome".to_owned())]);

        assert!(matches!(
            config.filter_attributes(&attributes),
            Cow::Borrowed(_)
        ));
        assert!(config.unknown_attribute_keys(&attributes).is_empty());
    }

    #[test]
    fn filter_attributes_drops_unknown_keys() {
        let config = valid_project_config();
        let attributes = HashMap::from([
            ("browser_type".to_owned(), "chrome".to_owned()),
            ("unknown_attribute".to_owned(), "dimension".to_owned()),
        ]);

        let filtered = config.filter_attributes(&attributes);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("browser_type").map(String::as_str), Some("chrome"));
        assert_eq!(
            config.unknown_attribute_keys(&attributes),
            vec!["unknown_attribute"]
        );
    }
}
