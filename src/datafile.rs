//! Datafile wire format and its compilation into [`ProjectConfig`].
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    condition::{Audience, Condition},
    project_config::{
        Attribute, EventType, Experiment, ExperimentStatus, Group, GroupPolicy, Project,
        ProjectConfig, TrafficAllocation, Variation,
    },
    Error, Result,
};

/// Datafile versions this SDK knows how to read.
pub const SUPPORTED_VERSIONS: &[&str] = &["1", "2"];

/// Datafile as served by the CDN.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatafileWire {
    pub account_id: String,
    pub project_id: String,
    pub version: String,
    pub revision: String,
    #[serde(default)]
    pub groups: Vec<TryParse<GroupWire>>,
    #[serde(default)]
    pub experiments: Vec<TryParse<ExperimentWire>>,
    #[serde(default)]
    pub attributes: Vec<TryParse<Attribute>>,
    #[serde(default)]
    pub events: Vec<TryParse<EventType>>,
    #[serde(default)]
    pub audiences: Vec<TryParse<AudienceWire>>,
}

/// `TryParse` allows an entity to fail parsing without failing the parsing of the whole datafile.
///
/// An experiment with an unexpected shape is skipped, and decisions for every other experiment
/// are still served.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentWire {
    pub id: String,
    pub key: String,
    pub status: ExperimentStatus,
    #[serde(default)]
    pub audience_ids: Vec<String>,
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub forced_variations: HashMap<String, String>,
    pub traffic_allocation: Vec<TrafficAllocation>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupWire {
    pub id: String,
    pub policy: GroupPolicy,
    pub experiments: Vec<TryParse<ExperimentWire>>,
    #[serde(default)]
    pub traffic_allocation: Vec<TrafficAllocation>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceWire {
    pub id: String,
    /// Audience key. The datafile calls it `name`.
    pub name: String,
    /// JSON-encoded condition tree, e.g. `["and", ["or", {"name": "browser", ...}]]`.
    pub conditions: String,
}

impl ProjectConfig {
    /// Parse a JSON datafile and build a new `ProjectConfig` from it.
    ///
    /// Individual entities that fail to parse are skipped with a warning. The datafile as a whole
    /// is rejected only if it is not valid JSON, misses project-level fields, or has an
    /// unsupported version.
    pub fn from_json(json: &[u8]) -> Result<ProjectConfig> {
        let datafile: DatafileWire = serde_json::from_slice(json).map_err(|err| {
            log::warn!(target: "optimizely", "failed to parse datafile: {err:?}");
            Error::from(err)
        })?;
        compile_datafile(datafile)
    }
}

fn compile_datafile(datafile: DatafileWire) -> Result<ProjectConfig> {
    if !SUPPORTED_VERSIONS.contains(&datafile.version.as_str()) {
        return Err(Error::UnsupportedDatafileVersion(datafile.version));
    }

    let project = Project {
        account_id: datafile.account_id,
        project_id: datafile.project_id,
        version: datafile.version,
        revision: datafile.revision,
    };

    let mut experiments = parsed(datafile.experiments, "experiment")
        .map(|experiment| compile_experiment(experiment, None))
        .collect::<Vec<_>>();

    let groups = parsed(datafile.groups, "group")
        .map(|group| {
            let members = parsed(group.experiments, "group experiment")
                .map(|experiment| compile_experiment(experiment, Some(&group.id)))
                .collect::<Vec<_>>();
            let experiment_ids = members.iter().map(|e| e.id.clone()).collect();
            experiments.extend(members);
            Group {
                id: group.id,
                policy: group.policy,
                experiment_ids,
                traffic_allocation: group.traffic_allocation,
            }
        })
        .collect::<Vec<_>>();

    let audiences = parsed(datafile.audiences, "audience")
        .filter_map(compile_audience)
        .collect();

    Ok(ProjectConfig::new(
        project,
        groups,
        experiments,
        parsed(datafile.attributes, "attribute").collect(),
        parsed(datafile.events, "event").collect(),
        audiences,
    ))
}

/// Drop entities that failed to parse, logging each of them.
fn parsed<T>(
    entities: Vec<TryParse<T>>,
    kind: &'static str,
) -> impl Iterator<Item = T> {
    entities.into_iter().filter_map(move |entity| match entity {
        TryParse::Parsed(entity) => Some(entity),
        TryParse::ParseFailed(value) => {
            log::warn!(target: "optimizely",
                       kind,
                       value:serde;
                       "skipping datafile entity that failed to parse");
            None
        }
    })
}

fn compile_experiment(experiment: ExperimentWire, group_id: Option<&String>) -> Experiment {
    Experiment {
        id: experiment.id,
        key: experiment.key,
        status: experiment.status,
        audience_ids: experiment.audience_ids,
        variations: experiment.variations,
        forced_variations: experiment.forced_variations,
        traffic_allocation: experiment.traffic_allocation,
        group_id: group_id.cloned(),
    }
}

fn compile_audience(audience: AudienceWire) -> Option<Audience> {
    match audience.conditions.parse::<Condition>() {
        Ok(conditions) => Some(Audience {
            id: audience.id,
            key: audience.name,
            conditions,
        }),
        Err(err) => {
            log::warn!(target: "optimizely",
                       audience_id:display = audience.id;
                       "skipping audience with invalid conditions: {err}");
            None
        }
    }
}
