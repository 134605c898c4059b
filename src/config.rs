use std::sync::Arc;

use crate::{
    error_handler::NoOpErrorHandler, event::NoopEventDispatcher, Client, ErrorHandler,
    EventDispatcher, ProjectConfig, Result,
};

/// Configuration for [`Client`].
///
/// All fields are public. Start from [`ClientConfig::new`] or
/// [`ClientConfig::from_project_config`] and override what you need.
pub struct ClientConfig<'a> {
    /// Datafile JSON. Ignored when `project_config` is set.
    pub datafile: Option<String>,
    /// Pre-compiled project configuration.
    pub project_config: Option<Arc<ProjectConfig>>,
    /// Receives impression and conversion events.
    pub event_dispatcher: Box<dyn EventDispatcher + Send + Sync + 'a>,
    /// Decides whether non-fatal errors are swallowed or returned.
    pub error_handler: Box<dyn ErrorHandler + Send + Sync + 'a>,
    /// Dispatch at most one impression per (user, experiment, variation) until
    /// [`Client::reset_exposures`] is called.
    pub deduplicate_impressions: bool,
}

impl<'a> ClientConfig<'a> {
    /// Default value for [`ClientConfig::deduplicate_impressions`].
    pub const DEFAULT_DEDUPLICATE_IMPRESSIONS: bool = false;

    /// Create a default configuration from datafile JSON.
    ///
    /// ```
    /// # use optimizely::ClientConfig;
    /// let mut config = ClientConfig::new(r#"{"version": "2", "revision": "1"}"#);
    /// config.event_dispatcher = Box::new(|event: optimizely::Event| println!("{:?}", event));
    /// ```
    pub fn new(datafile: impl Into<String>) -> Self {
        ClientConfig {
            datafile: Some(datafile.into()),
            ..ClientConfig::empty()
        }
    }

    /// Create a default configuration around an already compiled [`ProjectConfig`].
    pub fn from_project_config(project_config: Arc<ProjectConfig>) -> Self {
        ClientConfig {
            project_config: Some(project_config),
            ..ClientConfig::empty()
        }
    }

    fn empty() -> Self {
        ClientConfig {
            datafile: None,
            project_config: None,
            event_dispatcher: Box::new(NoopEventDispatcher),
            error_handler: Box::new(NoOpErrorHandler),
            deduplicate_impressions: ClientConfig::DEFAULT_DEDUPLICATE_IMPRESSIONS,
        }
    }

    /// Create a new [`Client`] using this configuration.
    pub fn to_client(self) -> Result<Client<'a>> {
        Client::new(self)
    }
}
