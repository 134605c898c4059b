use chrono::{DateTime, Utc};
use derive_more::From;
use serde::Serialize;

use crate::{
    project_config::{EventType, Experiment, Project, Variation},
    ProjectConfig, UserAttributes,
};

/// Event produced by [`Client`](crate::Client) for the analytics backend.
#[derive(Debug, Clone, PartialEq, Serialize, From)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// A user was activated in an experiment.
    Impression(ImpressionEvent),
    /// A user triggered a tracked event.
    Conversion(ConversionEvent),
}

/// Sent when a user is activated in an experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpressionEvent {
    #[serde(flatten)]
    pub project: Project,
    pub experiment_id: String,
    pub experiment_key: String,
    pub variation_id: String,
    pub variation_key: String,
    pub user_id: String,
    pub user_features: Vec<UserFeature>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

/// Sent when a user triggers an event attached to experiments they are bucketed in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionEvent {
    #[serde(flatten)]
    pub project: Project,
    pub event_id: String,
    pub event_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_value: Option<i64>,
    pub user_id: String,
    pub user_features: Vec<UserFeature>,
    /// Variations the user is bucketed in for experiments attached to the event.
    pub layer_states: Vec<LayerState>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

/// A user attribute, tagged with the attribute id from the datafile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFeature {
    pub id: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerState {
    pub experiment_id: String,
    pub variation_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    pub client_engine: &'static str,
    pub client_version: &'static str,
}

impl Default for ClientMetadata {
    fn default() -> Self {
        ClientMetadata {
            client_engine: "rust-sdk",
            client_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

impl ImpressionEvent {
    pub(crate) fn new(
        config: &ProjectConfig,
        experiment: &Experiment,
        variation: &Variation,
        user_id: &str,
        attributes: &UserAttributes,
    ) -> Self {
        ImpressionEvent {
            project: config.project().clone(),
            experiment_id: experiment.id.clone(),
            experiment_key: experiment.key.clone(),
            variation_id: variation.id.clone(),
            variation_key: variation.key.clone(),
            user_id: user_id.to_owned(),
            user_features: user_features(config, attributes),
            timestamp: Utc::now(),
            client: ClientMetadata::default(),
        }
    }
}

impl ConversionEvent {
    pub(crate) fn new(
        config: &ProjectConfig,
        event_type: &EventType,
        user_id: &str,
        attributes: &UserAttributes,
        event_value: Option<i64>,
        layer_states: Vec<LayerState>,
    ) -> Self {
        ConversionEvent {
            project: config.project().clone(),
            event_id: event_type.id.clone(),
            event_key: event_type.key.clone(),
            event_value,
            user_id: user_id.to_owned(),
            user_features: user_features(config, attributes),
            layer_states,
            timestamp: Utc::now(),
            client: ClientMetadata::default(),
        }
    }
}

/// Attach datafile ids to attributes, dropping undeclared ones. Sorted by attribute key so that
/// payloads are stable.
fn user_features(config: &ProjectConfig, attributes: &UserAttributes) -> Vec<UserFeature> {
    let mut features = attributes
        .iter()
        .filter_map(|(key, value)| {
            config.attribute_by_key(key).map(|attribute| UserFeature {
                id: attribute.id.clone(),
                name: key.clone(),
                value: value.clone(),
            })
        })
        .collect::<Vec<_>>();
    features.sort_by(|a, b| a.name.cmp(&b.name));
    features
}

/// Receives events produced by the client. Delivery (batching, HTTP, retries) is up to the
/// implementation.
pub trait EventDispatcher {
    fn dispatch_event(&self, event: Event);
}

pub(crate) struct NoopEventDispatcher;
impl EventDispatcher for NoopEventDispatcher {
    fn dispatch_event(&self, _event: Event) {}
}

impl<T: Fn(Event)> EventDispatcher for T {
    fn dispatch_event(&self, event: Event) {
        self(event);
    }
}
