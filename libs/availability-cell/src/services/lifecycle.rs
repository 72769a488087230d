use std::sync::Arc;

use chrono::{NaiveTime, TimeZone, Utc};
use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::repository::AvailabilityRepository;
use shared_models::error::SchedulingError;
use shared_models::scheduling::{AppointmentSlot, SlotStatus};

use crate::models::UpdateSlotRequest;

/// Enforces the slot state machine and carries out booking, administrative
/// edits and (cascading) deletion of individual slots.
pub struct SlotLifecycleService {
    repository: Arc<dyn AvailabilityRepository>,
}

impl SlotLifecycleService {
    pub fn new(repository: Arc<dyn AvailabilityRepository>) -> Self {
        Self { repository }
    }

    /// All statuses a slot may move to from `current`. `Cancelled` and
    /// `Blocked` are terminal; re-opening means creating a new slot.
    pub fn valid_transitions(&self, current: SlotStatus) -> Vec<SlotStatus> {
        match current {
            SlotStatus::Available => vec![
                SlotStatus::Booked,
                SlotStatus::Cancelled,
                SlotStatus::Blocked,
            ],
            SlotStatus::Booked => vec![SlotStatus::Cancelled],
            SlotStatus::Cancelled => vec![],
            SlotStatus::Blocked => vec![],
        }
    }

    pub fn validate_status_transition(
        &self,
        current: SlotStatus,
        new: SlotStatus,
    ) -> Result<(), SchedulingError> {
        debug!("validating slot status transition {} -> {}", current, new);
        if !self.valid_transitions(current).contains(&new) {
            warn!("invalid slot status transition attempted: {} -> {}", current, new);
            return Err(SchedulingError::State {
                from: current,
                to: new,
            });
        }
        Ok(())
    }

    /// Book an available slot for a patient. The final arbitration is the
    /// repository's compare-and-swap; losing that race is a conflict, not a
    /// silent success.
    pub async fn book_slot(
        &self,
        slot_id: Uuid,
        patient_id: Uuid,
    ) -> Result<AppointmentSlot, SchedulingError> {
        let slot = self
            .repository
            .find_slot_by_id(slot_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("slot {}", slot_id)))?;

        // An already-booked slot is a lost race for this caller, not an
        // invalid transition; cancelled and blocked slots fail the machine.
        if slot.status == SlotStatus::Booked {
            return Err(SchedulingError::conflict(format!(
                "slot {} is already booked",
                slot_id
            )));
        }
        self.validate_status_transition(slot.status, SlotStatus::Booked)?;

        let reference = generate_booking_reference();
        let booked = self
            .repository
            .book_slot(slot_id, patient_id, &reference)
            .await?;

        info!(
            "slot {} booked for patient {} with reference {}",
            slot_id, patient_id, reference
        );
        Ok(booked)
    }

    /// Apply only the supplied fields. Status changes go through the state
    /// machine; `notes` writes through to the owning window, not the slot.
    pub async fn update_slot(
        &self,
        slot_id: Uuid,
        request: UpdateSlotRequest,
    ) -> Result<AppointmentSlot, SchedulingError> {
        let mut slot = self
            .repository
            .find_slot_by_id(slot_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("slot {}", slot_id)))?;

        if let Some(new_status) = request.status {
            if new_status == SlotStatus::Booked {
                return Err(SchedulingError::validation(
                    "booking requires a patient and reference; use the booking operation",
                ));
            }
            if new_status != slot.status {
                self.validate_status_transition(slot.status, new_status)?;
                slot.status = new_status;
            }
        }

        if let Some(start_time) = request.start_time {
            slot.slot_start_time = start_time;
        }
        if let Some(end_time) = request.end_time {
            slot.slot_end_time = end_time;
        }
        if slot.slot_end_time <= slot.slot_start_time {
            return Err(SchedulingError::validation(
                "slot end time must be after start time",
            ));
        }

        if let Some(notes) = request.notes {
            let mut window = self
                .repository
                .find_window_by_id(slot.availability_id)
                .await?
                .ok_or_else(|| {
                    SchedulingError::not_found(format!("window {}", slot.availability_id))
                })?;
            window.notes = Some(notes);
            window.updated_at = Utc::now();
            self.repository.save_window(window).await?;
        }

        self.repository.update_slot(slot).await
    }

    /// Delete a slot. With `cascade_recurring` on a recurring window, every
    /// slot of the provider starting in `[slot.start, recurrence_end_date)`
    /// is removed (the end date resolves to start-of-day UTC). The reason is
    /// retained by the store.
    pub async fn delete_slot(
        &self,
        slot_id: Uuid,
        cascade_recurring: bool,
        reason: Option<&str>,
    ) -> Result<usize, SchedulingError> {
        let slot = self
            .repository
            .find_slot_by_id(slot_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("slot {}", slot_id)))?;

        if slot.status == SlotStatus::Booked {
            warn!(
                "deleting booked slot {} (reference {:?}); treating as cancellation with audit",
                slot_id, slot.booking_reference
            );
        }

        if cascade_recurring {
            let window = self
                .repository
                .find_window_by_id(slot.availability_id)
                .await?
                .ok_or_else(|| {
                    SchedulingError::not_found(format!("window {}", slot.availability_id))
                })?;

            if window.is_recurring {
                if let Some(end_date) = window.recurrence_end_date {
                    let series_end = Utc.from_utc_datetime(&end_date.and_time(NaiveTime::MIN));
                    let series = self
                        .repository
                        .find_slots_in_range(
                            Some(slot.provider_id),
                            slot.slot_start_time,
                            series_end,
                        )
                        .await?;
                    let ids: Vec<Uuid> = series.iter().map(|s| s.id).collect();
                    let deleted = self.repository.delete_slots(&ids, reason).await?;
                    info!(
                        "cascade deleted {} slot(s) of recurring window {}",
                        deleted, window.id
                    );
                    return Ok(deleted);
                }
            }
        }

        self.repository.delete_slots(&[slot_id], reason).await
    }
}

fn generate_booking_reference() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("BK-{}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_reference_has_expected_shape() {
        let reference = generate_booking_reference();
        assert!(reference.starts_with("BK-"));
        assert_eq!(reference.len(), 11);
        assert!(reference[3..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn terminal_states_allow_no_transitions() {
        let service = SlotLifecycleService {
            repository: Arc::new(shared_database::memory::InMemoryStore::new()),
        };

        assert!(service.valid_transitions(SlotStatus::Cancelled).is_empty());
        assert!(service.valid_transitions(SlotStatus::Blocked).is_empty());

        let result = service.validate_status_transition(SlotStatus::Cancelled, SlotStatus::Available);
        assert!(matches!(result, Err(SchedulingError::State { .. })));
    }

    #[test]
    fn booked_slots_can_only_be_cancelled() {
        let service = SlotLifecycleService {
            repository: Arc::new(shared_database::memory::InMemoryStore::new()),
        };

        assert_eq!(
            service.valid_transitions(SlotStatus::Booked),
            vec![SlotStatus::Cancelled]
        );
        assert!(matches!(
            service.validate_status_transition(SlotStatus::Booked, SlotStatus::Blocked),
            Err(SchedulingError::State { .. })
        ));
    }
}
