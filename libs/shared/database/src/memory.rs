use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::error::SchedulingError;
use shared_models::provider::ProviderRecord;
use shared_models::scheduling::{AppointmentSlot, AvailabilityWindow, SlotStatus};

use crate::repository::{AvailabilityRepository, ProviderDirectory};

/// Reference implementation of [`AvailabilityRepository`] backed by process
/// memory. One mutex guards all state, so every operation runs in a
/// serializable region: the overlap re-check inside
/// `create_window_with_slots` and the booking compare-and-swap cannot
/// interleave with other writers.
///
/// Intended for tests and embedded use; a production deployment supplies a
/// database-backed implementation with equivalent transactional guarantees.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    windows: HashMap<Uuid, AvailabilityWindow>,
    slots: HashMap<Uuid, AppointmentSlot>,
    deletions: Vec<DeletionRecord>,
}

/// Audit entry retained for every slot deletion.
#[derive(Debug, Clone)]
pub struct DeletionRecord {
    pub slot_id: Uuid,
    pub reason: Option<String>,
    pub deleted_at: DateTime<Utc>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the deletion audit log.
    pub async fn deletion_log(&self) -> Vec<DeletionRecord> {
        self.state.lock().await.deletions.clone()
    }

    /// Number of stored slots, all statuses.
    pub async fn slot_count(&self) -> usize {
        self.state.lock().await.slots.len()
    }
}

/// Local calendar dates the slot batch lands on, resolved through the
/// window's timezone. Falls back to the window's declared date when the batch
/// is empty or the timezone fails to parse.
fn occurrence_dates(window: &AvailabilityWindow, slots: &[AppointmentSlot]) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = match window.timezone.parse::<Tz>() {
        Ok(tz) => slots
            .iter()
            .map(|slot| slot.slot_start_time.with_timezone(&tz).date_naive())
            .collect(),
        Err(_) => Vec::new(),
    };
    dates.push(window.date);
    dates.sort_unstable();
    dates.dedup();
    dates
}

fn intervals_overlap(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && e1 > s2
}

#[async_trait]
impl AvailabilityRepository for InMemoryStore {
    async fn find_overlapping_windows(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let state = self.state.lock().await;
        let mut matches: Vec<AvailabilityWindow> = state
            .windows
            .values()
            .filter(|w| {
                w.provider_id == provider_id
                    && w.date == date
                    && intervals_overlap(w.start_time, w.end_time, start_time, end_time)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|w| (w.start_time, w.id));
        Ok(matches)
    }

    async fn create_window_with_slots(
        &self,
        window: AvailabilityWindow,
        slots: Vec<AppointmentSlot>,
    ) -> Result<(AvailabilityWindow, Vec<AppointmentSlot>), SchedulingError> {
        let mut state = self.state.lock().await;

        // Re-run the overlap check inside the critical section; the caller's
        // earlier check may have raced another submission.
        for date in occurrence_dates(&window, &slots) {
            let conflict = state.windows.values().any(|w| {
                w.provider_id == window.provider_id
                    && w.date == date
                    && !w.is_cancelled()
                    && intervals_overlap(w.start_time, w.end_time, window.start_time, window.end_time)
            });
            if conflict {
                warn!(
                    "rejecting window for provider {} on {}: overlap detected at insert",
                    window.provider_id, date
                );
                return Err(SchedulingError::conflict(format!(
                    "availability overlaps an existing window on {}",
                    date
                )));
            }
        }

        debug!(
            "persisting window {} with {} slots",
            window.id,
            slots.len()
        );
        state.windows.insert(window.id, window.clone());
        for slot in &slots {
            state.slots.insert(slot.id, slot.clone());
        }
        Ok((window, slots))
    }

    async fn save_window(
        &self,
        window: AvailabilityWindow,
    ) -> Result<AvailabilityWindow, SchedulingError> {
        let mut state = self.state.lock().await;
        state.windows.insert(window.id, window.clone());
        Ok(window)
    }

    async fn save_slots(
        &self,
        slots: Vec<AppointmentSlot>,
    ) -> Result<Vec<AppointmentSlot>, SchedulingError> {
        let mut state = self.state.lock().await;
        for slot in &slots {
            state.slots.insert(slot.id, slot.clone());
        }
        Ok(slots)
    }

    async fn find_window_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<AvailabilityWindow>, SchedulingError> {
        Ok(self.state.lock().await.windows.get(&id).cloned())
    }

    async fn find_windows_in_range(
        &self,
        provider_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError> {
        let state = self.state.lock().await;
        let mut windows: Vec<AvailabilityWindow> = state
            .windows
            .values()
            .filter(|w| {
                w.provider_id == provider_id && w.date >= start_date && w.date <= end_date
            })
            .cloned()
            .collect();
        windows.sort_by_key(|w| (w.date, w.start_time, w.id));
        Ok(windows)
    }

    async fn find_slot_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<AppointmentSlot>, SchedulingError> {
        Ok(self.state.lock().await.slots.get(&id).cloned())
    }

    async fn find_slots_in_range(
        &self,
        provider_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AppointmentSlot>, SchedulingError> {
        let state = self.state.lock().await;
        let mut slots: Vec<AppointmentSlot> = state
            .slots
            .values()
            .filter(|s| {
                provider_id.map_or(true, |p| s.provider_id == p)
                    && s.slot_start_time >= start
                    && s.slot_start_time < end
            })
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.slot_start_time, s.id));
        Ok(slots)
    }

    async fn update_slot(
        &self,
        slot: AppointmentSlot,
    ) -> Result<AppointmentSlot, SchedulingError> {
        let mut state = self.state.lock().await;
        if !state.slots.contains_key(&slot.id) {
            return Err(SchedulingError::not_found(format!("slot {}", slot.id)));
        }
        state.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn book_slot(
        &self,
        slot_id: Uuid,
        patient_id: Uuid,
        booking_reference: &str,
    ) -> Result<AppointmentSlot, SchedulingError> {
        let mut state = self.state.lock().await;
        if state
            .slots
            .values()
            .any(|s| s.booking_reference.as_deref() == Some(booking_reference))
        {
            return Err(SchedulingError::conflict(format!(
                "booking reference {} is already in use",
                booking_reference
            )));
        }

        let slot = state
            .slots
            .get_mut(&slot_id)
            .ok_or_else(|| SchedulingError::not_found(format!("slot {}", slot_id)))?;

        // Conditional update: the equivalent of UPDATE .. WHERE status = 'available'.
        if slot.status != SlotStatus::Available {
            return Err(SchedulingError::conflict(format!(
                "slot {} is no longer available",
                slot_id
            )));
        }

        slot.status = SlotStatus::Booked;
        slot.patient_id = Some(patient_id);
        slot.booking_reference = Some(booking_reference.to_string());
        Ok(slot.clone())
    }

    async fn delete_slots(
        &self,
        slot_ids: &[Uuid],
        reason: Option<&str>,
    ) -> Result<usize, SchedulingError> {
        let mut state = self.state.lock().await;
        let mut deleted = 0;
        for slot_id in slot_ids {
            if state.slots.remove(slot_id).is_some() {
                deleted += 1;
                state.deletions.push(DeletionRecord {
                    slot_id: *slot_id,
                    reason: reason.map(|r| r.to_string()),
                    deleted_at: Utc::now(),
                });
            }
        }
        debug!("deleted {} of {} requested slots", deleted, slot_ids.len());
        Ok(deleted)
    }
}

/// In-memory [`ProviderDirectory`] used alongside [`InMemoryStore`].
#[derive(Default)]
pub struct InMemoryProviderDirectory {
    providers: Mutex<HashMap<Uuid, ProviderRecord>>,
}

impl InMemoryProviderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, provider: ProviderRecord) {
        self.providers.lock().await.insert(provider.id, provider);
    }
}

#[async_trait]
impl ProviderDirectory for InMemoryProviderDirectory {
    async fn find_by_id(
        &self,
        provider_id: Uuid,
    ) -> Result<Option<ProviderRecord>, SchedulingError> {
        Ok(self.providers.lock().await.get(&provider_id).cloned())
    }
}
