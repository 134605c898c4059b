//! Traffic allocation: forced variations, mutual exclusion groups, and hash bucketing.
use crate::{
    project_config::{Experiment, Group, GroupPolicy, TrafficAllocation, Variation},
    sharder::Sharder,
    NoAssignment, ProjectConfig,
};

/// Bucket values fall into `[0, MAX_TRAFFIC_VALUE)`.
pub const MAX_TRAFFIC_VALUE: u32 = 10_000;

/// Compute the bucket value of `bucketing_id` within the scope identified by `salt` (an experiment
/// id or a group id).
pub fn bucket_value(sharder: &impl Sharder, bucketing_id: &str, salt: &str) -> u32 {
    sharder.get_shard(format!("{bucketing_id}{salt}"), MAX_TRAFFIC_VALUE)
}

/// Find the entity whose range contains `bucket_value`.
///
/// Returns [`NoAssignment::TrafficNotAllocated`] if the value is past the last range and
/// [`NoAssignment::MalformedTrafficAllocation`] if ranges are not strictly increasing or exceed
/// [`MAX_TRAFFIC_VALUE`].
pub fn find_bucket(
    traffic_allocation: &[TrafficAllocation],
    bucket_value: u32,
) -> Result<&str, NoAssignment> {
    if !is_well_formed(traffic_allocation) {
        return Err(NoAssignment::MalformedTrafficAllocation);
    }

    traffic_allocation
        .iter()
        .find(|allocation| bucket_value < allocation.end_of_range)
        .map(|allocation| allocation.entity_id.as_str())
        .ok_or(NoAssignment::TrafficNotAllocated)
}

fn is_well_formed(traffic_allocation: &[TrafficAllocation]) -> bool {
    traffic_allocation
        .windows(2)
        .all(|pair| pair[0].end_of_range < pair[1].end_of_range)
        && traffic_allocation
            .last()
            .map_or(true, |last| last.end_of_range <= MAX_TRAFFIC_VALUE)
}

impl Experiment {
    /// Look up a forced variation for the user.
    ///
    /// Returns `None` if the user is not forced. A forced variation key that does not exist in the
    /// experiment yields [`NoAssignment::UnknownForcedVariation`].
    pub fn forced_variation(&self, user_id: &str) -> Option<Result<&Variation, NoAssignment>> {
        let variation_key = self.forced_variations.get(user_id)?;
        Some(
            self.variation_by_key(variation_key)
                .ok_or(NoAssignment::UnknownForcedVariation),
        )
    }

    /// Bucket the user into one of the experiment's variations, salting with the experiment id.
    pub fn bucket_variation(
        &self,
        bucketing_id: &str,
        sharder: &impl Sharder,
    ) -> Result<&Variation, NoAssignment> {
        let value = bucket_value(sharder, bucketing_id, &self.id);
        let variation_id = find_bucket(&self.traffic_allocation, value)?;
        self.variation_by_id(variation_id)
            .ok_or(NoAssignment::UnknownVariation)
    }
}

impl Group {
    /// Check whether the group lets the user into `experiment_id`.
    ///
    /// Overlapping groups admit everyone. Random groups bucket the user into at most one member
    /// experiment, salting with the group id. Landing on the empty placeholder entity means the
    /// user is in none of them.
    pub fn admits(
        &self,
        experiment_id: &str,
        bucketing_id: &str,
        sharder: &impl Sharder,
    ) -> Result<(), NoAssignment> {
        match self.policy {
            GroupPolicy::Overlapping => Ok(()),
            GroupPolicy::Random => {
                let value = bucket_value(sharder, bucketing_id, &self.id);
                match find_bucket(&self.traffic_allocation, value) {
                    Ok(entity_id) if entity_id == experiment_id => Ok(()),
                    Ok(_) | Err(NoAssignment::TrafficNotAllocated) => {
                        Err(NoAssignment::ExcludedByGroup)
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }
}

impl ProjectConfig {
    /// Bucket the user into a variation of `experiment`, applying mutual exclusion first.
    ///
    /// This does not check experiment status, forced variations, or audiences.
    pub fn bucket<'a>(
        &self,
        experiment: &'a Experiment,
        bucketing_id: &str,
        sharder: &impl Sharder,
    ) -> Result<&'a Variation, NoAssignment> {
        if let Some(group_id) = &experiment.group_id {
            let group = self
                .group_by_id(group_id)
                .ok_or(NoAssignment::GroupNotFound)?;
            group.admits(&experiment.id, bucketing_id, sharder)?;
        }

        experiment.bucket_variation(bucketing_id, sharder)
    }
}
