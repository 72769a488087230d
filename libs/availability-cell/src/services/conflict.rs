use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::repository::AvailabilityRepository;
use shared_models::error::SchedulingError;

/// Detects temporal overlap between a candidate availability window and a
/// provider's existing windows. The check is scoped per provider and per
/// calendar date; cancelled windows never conflict.
pub struct ConflictDetectionService {
    repository: Arc<dyn AvailabilityRepository>,
}

/// Two half-open intervals `[s1, e1)` and `[s2, e2)` overlap iff they share
/// at least one instant.
pub fn intervals_overlap(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && e1 > s2
}

impl ConflictDetectionService {
    pub fn new(repository: Arc<dyn AvailabilityRepository>) -> Self {
        Self { repository }
    }

    pub async fn has_conflict(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<bool, SchedulingError> {
        debug!(
            "checking conflicts for provider {} on {} between {} and {}",
            provider_id, date, start_time, end_time
        );

        let existing = self
            .repository
            .find_overlapping_windows(provider_id, date, start_time, end_time)
            .await?;

        // Cancelled windows never conflict; the overlap predicate is applied
        // over the fetched set regardless of how the store filtered.
        let conflicting = existing
            .iter()
            .filter(|w| {
                !w.is_cancelled()
                    && intervals_overlap(w.start_time, w.end_time, start_time, end_time)
            })
            .count();
        if conflicting > 0 {
            warn!(
                "conflict detected for provider {} on {}: {} overlapping window(s)",
                provider_id, date, conflicting
            );
        }
        Ok(conflicting > 0)
    }

    /// Rejects the candidate interval with a [`SchedulingError::Conflict`]
    /// when any non-cancelled window of the provider overlaps it on `date`.
    pub async fn ensure_no_conflict(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<(), SchedulingError> {
        if self
            .has_conflict(provider_id, date, start_time, end_time)
            .await?
        {
            return Err(SchedulingError::conflict(format!(
                "time slot overlaps with existing availability on {}",
                date
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn overlap_requires_a_shared_instant() {
        // Identical intervals.
        assert!(intervals_overlap(at(9, 0), at(10, 0), at(9, 0), at(10, 0)));
        // Contained.
        assert!(intervals_overlap(at(9, 0), at(10, 0), at(9, 15), at(9, 45)));
        // Partial from either side.
        assert!(intervals_overlap(at(9, 0), at(10, 0), at(9, 30), at(10, 30)));
        assert!(intervals_overlap(at(9, 0), at(10, 0), at(8, 30), at(9, 30)));
    }

    #[test]
    fn touching_boundaries_do_not_overlap() {
        assert!(!intervals_overlap(at(9, 0), at(10, 0), at(10, 0), at(11, 0)));
        assert!(!intervals_overlap(at(9, 0), at(10, 0), at(8, 0), at(9, 0)));
    }
}
