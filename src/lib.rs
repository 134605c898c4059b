//! Rust SDK for Optimizely-style experimentation: deterministic targeting and bucketing of users
//! into experiment variations.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] built from a datafile, the JSON document that describes
//! experiments, audiences, mutual exclusion groups, and events of a project. For a user id and a
//! set of string attributes, the client decides which [`Variation`] of an experiment the user
//! gets, if any:
//!
//! 1. users with a forced variation get it directly;
//! 2. otherwise the user must match one of the experiment audiences;
//! 3. experiments in a mutually exclusive group admit only users the group buckets into them;
//! 4. finally the user is bucketed into a variation by hashing the user id.
//!
//! Decisions are pure functions of the datafile, user id, and attributes, so the same user always
//! gets the same variation without storing anything.
//!
//! An [`EventDispatcher`] should be provided to deliver impression and conversion events to your
//! analytics backend.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. A user not getting a variation is never an error;
//! [`ProjectConfig::decide_with_reason`] reports the [`NoAssignment`] reason when you need it.
//!
//! Requests for unknown experiment or event keys go to the configured [`ErrorHandler`], which
//! either swallows them ([`NoOpErrorHandler`], the default) or returns them
//! ([`RaiseErrorHandler`]).
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with target `optimizely`.
//! Consider integrating a `log`-compatible logger implementation for better visibility into SDK
//! operations.
//!
//! # Examples
//!
//! A runnable example lives in the `demos/simple` directory of the crate repository.

#![warn(rustdoc::missing_crate_level_docs)]

mod bucketer;
mod client;
mod condition;
mod config;
mod configuration_store;
mod datafile;
mod decision;
mod error;
mod error_handler;
mod event;
mod exposure;
mod project_config;
mod sharder;

pub use bucketer::{bucket_value, find_bucket, MAX_TRAFFIC_VALUE};
pub use client::Client;
pub use condition::{
    Audience, Condition, ConditionParseError, UserAttributeCondition, UserAttributes,
};
pub use config::ClientConfig;
pub use configuration_store::ConfigurationStore;
pub use datafile::SUPPORTED_VERSIONS;
pub use decision::NoAssignment;
pub use error::{Error, Result};
pub use error_handler::{ErrorHandler, NoOpErrorHandler, RaiseErrorHandler};
pub use event::{
    ClientMetadata, ConversionEvent, Event, EventDispatcher, ImpressionEvent, LayerState,
    UserFeature,
};
pub use exposure::ExposureCache;
pub use project_config::{
    Attribute, EventType, Experiment, ExperimentStatus, Group, GroupPolicy, Project,
    ProjectConfig, TrafficAllocation, Variation,
};
pub use sharder::{Murmur3Sharder, Sharder};
