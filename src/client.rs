use std::{borrow::Cow, sync::Arc};

use crate::{
    configuration_store::ConfigurationStore,
    event::{ConversionEvent, Event, ImpressionEvent, LayerState},
    project_config::{Experiment, Variation},
    ClientConfig, Error, ErrorHandler, EventDispatcher, ExposureCache, ProjectConfig, Result,
    UserAttributes,
};

/// An Optimizely client.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// # Examples
/// ```
/// # use optimizely::{Client, ClientConfig};
/// let datafile = r#"{"accountId": "1", "projectId": "2", "version": "2", "revision": "1"}"#;
/// let client = Client::new(ClientConfig::new(datafile)).unwrap();
/// ```
pub struct Client<'a> {
    configuration_store: Arc<ConfigurationStore>,
    event_dispatcher: Box<dyn EventDispatcher + Send + Sync + 'a>,
    error_handler: Box<dyn ErrorHandler + Send + Sync + 'a>,
    exposures: ExposureCache,
    deduplicate_impressions: bool,
}

impl<'a> Client<'a> {
    /// Create a new `Client` using the specified configuration.
    ///
    /// Fails if the datafile cannot be parsed, has an unsupported version, or if `config` carries
    /// neither a datafile nor a project config.
    pub fn new(config: ClientConfig<'a>) -> Result<Self> {
        let project_config = match (config.project_config, config.datafile) {
            (Some(project_config), _) => project_config,
            (None, Some(datafile)) => Arc::new(ProjectConfig::from_json(datafile.as_bytes())?),
            (None, None) => {
                return Err(Error::InvalidConfiguration(
                    "either datafile or project_config must be set",
                ))
            }
        };

        log::info!(target: "optimizely",
                   account_id:display = project_config.project().account_id,
                   revision:display = project_config.project().revision;
                   "client initialized");

        Ok(Client {
            configuration_store: Arc::new(ConfigurationStore::new(project_config)),
            event_dispatcher: config.event_dispatcher,
            error_handler: config.error_handler,
            exposures: ExposureCache::new(),
            deduplicate_impressions: config.deduplicate_impressions,
        })
    }

    /// Decide a variation for the user and dispatch an impression event for it.
    ///
    /// Returns `Ok(None)` when the user gets no variation. An unknown experiment key is passed to
    /// the error handler.
    pub fn activate(
        &self,
        experiment_key: &str,
        user_id: &str,
        attributes: &UserAttributes,
    ) -> Result<Option<Variation>> {
        let configuration = self.configuration_store.get_configuration();

        let Some((experiment, variation)) =
            self.decide(&configuration, experiment_key, user_id, attributes)?
        else {
            log::info!(target: "optimizely",
                       experiment_key,
                       user_id;
                       "not activating user");
            return Ok(None);
        };

        if self.deduplicate_impressions
            && !self.exposures.record(user_id, &experiment.id, &variation.id)
        {
            log::debug!(target: "optimizely",
                        experiment_key,
                        user_id,
                        variation_key:display = variation.key;
                        "impression already dispatched");
            return Ok(Some(variation.clone()));
        }

        let attributes = configuration.filter_attributes(attributes);
        let event = ImpressionEvent::new(&configuration, experiment, variation, user_id, &attributes);

        log::info!(target: "optimizely",
                   experiment_key,
                   user_id,
                   variation_key:display = variation.key;
                   "activating user");
        self.dispatch(event.into());

        Ok(Some(variation.clone()))
    }

    /// Get the variation the user would be activated in, without dispatching anything.
    pub fn get_variation(
        &self,
        experiment_key: &str,
        user_id: &str,
        attributes: &UserAttributes,
    ) -> Result<Option<Variation>> {
        let configuration = self.configuration_store.get_configuration();

        let decision = self.decide(&configuration, experiment_key, user_id, attributes)?;

        Ok(decision.map(|(_experiment, variation)| variation.clone()))
    }

    /// Record a conversion for every experiment `event_key` is attached to and the user is
    /// bucketed in.
    ///
    /// Nothing is dispatched if the user is in none of them. An unknown event key is passed to
    /// the error handler.
    pub fn track(
        &self,
        event_key: &str,
        user_id: &str,
        attributes: &UserAttributes,
        event_value: Option<i64>,
    ) -> Result<()> {
        if !is_valid_user_id(user_id) {
            log::error!(target: "optimizely", event_key; "user id must not be empty");
            return Ok(());
        }

        let configuration = self.configuration_store.get_configuration();

        let Some(event_type) = configuration.event_type_by_key(event_key) else {
            log::error!(target: "optimizely", event_key, user_id; "event is not in the datafile");
            return self
                .error_handler
                .handle_error(Error::UnknownEventType(event_key.to_owned()));
        };

        let attributes = self.filter_attributes(&configuration, attributes);

        let layer_states = event_type
            .experiment_ids
            .iter()
            .filter_map(|experiment_id| {
                let experiment = configuration.experiment_by_id(experiment_id);
                if experiment.is_none() {
                    log::warn!(target: "optimizely",
                               event_key,
                               experiment_id:display = experiment_id;
                               "event refers to an experiment that is not in the datafile");
                }
                experiment
            })
            .filter_map(|experiment| {
                configuration
                    .decide(experiment, user_id, &attributes)
                    .map(|variation| LayerState {
                        experiment_id: experiment.id.clone(),
                        variation_id: variation.id.clone(),
                    })
            })
            .collect::<Vec<_>>();

        if layer_states.is_empty() {
            log::info!(target: "optimizely",
                       event_key,
                       user_id;
                       "user is not in any experiment of the event, not tracking");
            return Ok(());
        }

        let event = ConversionEvent::new(
            &configuration,
            event_type,
            user_id,
            &attributes,
            event_value,
            layer_states,
        );

        log::info!(target: "optimizely", event_key, user_id; "tracking event");
        self.dispatch(event.into());

        Ok(())
    }

    /// Replace the active configuration with one compiled from `datafile`.
    ///
    /// Decisions already in flight keep using the configuration they started with. On error the
    /// active configuration is left untouched.
    pub fn update_datafile(&self, datafile: &str) -> Result<()> {
        let project_config = ProjectConfig::from_json(datafile.as_bytes()).inspect_err(|err| {
            log::warn!(target: "optimizely", "failed to update datafile: {err}");
        })?;

        let previous = self
            .configuration_store
            .set_configuration(Arc::new(project_config));

        log::info!(target: "optimizely",
                   previous_revision:display = previous.project().revision,
                   revision:display = self.configuration_store.get_configuration().project().revision;
                   "datafile updated");

        Ok(())
    }

    /// Snapshot of the active project configuration.
    pub fn project_config(&self) -> Arc<ProjectConfig> {
        self.configuration_store.get_configuration()
    }

    /// Forget which impressions have been dispatched, so that the next activation of every user
    /// dispatches again.
    pub fn reset_exposures(&self) {
        self.exposures.clear();
    }

    fn decide<'c>(
        &self,
        configuration: &'c ProjectConfig,
        experiment_key: &str,
        user_id: &str,
        attributes: &UserAttributes,
    ) -> Result<Option<(&'c Experiment, &'c Variation)>> {
        if !is_valid_user_id(user_id) {
            log::error!(target: "optimizely", experiment_key; "user id must not be empty");
            return Ok(None);
        }

        let Some(experiment) = configuration.experiment_by_key(experiment_key) else {
            log::error!(target: "optimizely",
                        experiment_key,
                        user_id;
                        "experiment is not in the datafile");
            self.error_handler
                .handle_error(Error::UnknownExperiment(experiment_key.to_owned()))?;
            return Ok(None);
        };

        let attributes = self.filter_attributes(configuration, attributes);

        Ok(configuration
            .decide(experiment, user_id, &attributes)
            .map(|variation| (experiment, variation)))
    }

    fn filter_attributes<'b>(
        &self,
        configuration: &ProjectConfig,
        attributes: &'b UserAttributes,
    ) -> Cow<'b, UserAttributes> {
        let unknown_attributes = configuration.unknown_attribute_keys(attributes);
        if !unknown_attributes.is_empty() {
            log::warn!(target: "optimizely",
                       unknown_attributes:serde;
                       "ignoring attributes that are not in the datafile");
        }
        configuration.filter_attributes(attributes)
    }

    fn dispatch(&self, event: Event) {
        log::debug!(target: "optimizely", event:serde; "dispatching event");
        self.event_dispatcher.dispatch_event(event);
    }
}

fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.trim().is_empty()
}
