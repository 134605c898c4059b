use serde::{Deserialize, Serialize};

use crate::{
    project_config::{Experiment, Variation},
    sharder::{Murmur3Sharder, Sharder},
    ProjectConfig, UserAttributes,
};

/// Reason a decision ended without a variation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NoAssignment {
    /// User id is empty or blank.
    #[error("user id is empty")]
    InvalidUserId,

    /// Experiment status is anything but running.
    #[error("experiment is not running")]
    ExperimentNotRunning,

    /// User does not match any of the experiment audiences.
    #[error("user does not match experiment audiences")]
    AudienceMismatch,

    /// User was bucketed into another experiment of a mutually exclusive group (or into none).
    #[error("user is excluded by mutual exclusion group")]
    ExcludedByGroup,

    /// Bucket value is past the last traffic allocation range.
    #[error("user is not in allocated traffic")]
    TrafficNotAllocated,

    /// Forced variation points at a variation key the experiment does not have.
    #[error("forced variation is not in the experiment")]
    UnknownForcedVariation,

    /// Traffic allocation points at a variation id the experiment does not have.
    #[error("allocated variation is not in the experiment")]
    UnknownVariation,

    /// Experiment refers to a group that is not in the datafile.
    #[error("experiment group is not in the datafile")]
    GroupNotFound,

    /// Traffic allocation ranges are not strictly increasing or exceed the bucketing space.
    #[error("traffic allocation is malformed")]
    MalformedTrafficAllocation,
}

impl NoAssignment {
    /// Return `true` if this is an expected outcome of targeting rather than a configuration
    /// defect that needs attention.
    pub fn is_normal(self) -> bool {
        match self {
            NoAssignment::InvalidUserId
            | NoAssignment::ExperimentNotRunning
            | NoAssignment::AudienceMismatch
            | NoAssignment::ExcludedByGroup
            | NoAssignment::TrafficNotAllocated => true,

            NoAssignment::UnknownForcedVariation
            | NoAssignment::UnknownVariation
            | NoAssignment::GroupNotFound
            | NoAssignment::MalformedTrafficAllocation => false,
        }
    }
}

impl ProjectConfig {
    /// Decide which variation of `experiment` the user gets, if any.
    ///
    /// The result depends only on the arguments: the same configuration, experiment, user id, and
    /// attributes always produce the same variation.
    pub fn decide<'a>(
        &self,
        experiment: &'a Experiment,
        user_id: &str,
        attributes: &UserAttributes,
    ) -> Option<&'a Variation> {
        self.decide_with_reason(experiment, user_id, attributes, &Murmur3Sharder)
            .ok()
    }

    /// Same as [`ProjectConfig::decide`] but reports why no variation was assigned.
    pub fn decide_with_reason<'a>(
        &self,
        experiment: &'a Experiment,
        user_id: &str,
        attributes: &UserAttributes,
        sharder: &impl Sharder,
    ) -> Result<&'a Variation, NoAssignment> {
        let result = self.decide_inner(experiment, user_id, attributes, sharder);

        match &result {
            Ok(variation) => {
                log::trace!(target: "optimizely",
                            experiment_key:display = experiment.key,
                            user_id,
                            variation_key:display = variation.key;
                            "decided variation");
            }
            Err(reason) if reason.is_normal() => {
                log::trace!(target: "optimizely",
                            experiment_key:display = experiment.key,
                            user_id;
                            "no variation assigned: {reason}");
            }
            Err(reason) => {
                log::warn!(target: "optimizely",
                           experiment_key:display = experiment.key,
                           user_id;
                           "no variation assigned because of invalid configuration: {reason}");
            }
        }

        result
    }

    fn decide_inner<'a>(
        &self,
        experiment: &'a Experiment,
        user_id: &str,
        attributes: &UserAttributes,
        sharder: &impl Sharder,
    ) -> Result<&'a Variation, NoAssignment> {
        if user_id.trim().is_empty() {
            return Err(NoAssignment::InvalidUserId);
        }

        if !experiment.is_running() {
            return Err(NoAssignment::ExperimentNotRunning);
        }

        if let Some(forced) = experiment.forced_variation(user_id) {
            return forced;
        }

        if !self.is_user_in_audience(experiment, attributes) {
            return Err(NoAssignment::AudienceMismatch);
        }

        self.bucket(experiment, user_id, sharder)
    }
}
