use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use shared_models::error::SchedulingError;
use shared_models::provider::ProviderRecord;
use shared_models::scheduling::{AppointmentSlot, AvailabilityWindow};

/// Storage contract consumed by the scheduling core. The core never touches
/// persistence mechanics directly; implementations decide how these queries
/// map onto a database.
///
/// Two operations carry the concurrency obligations of the engine:
///
/// * [`create_window_with_slots`](Self::create_window_with_slots) must be
///   atomic and must re-run the overlap check inside its transactional
///   boundary, so two concurrent submissions for the same provider, date and
///   time range cannot both succeed.
/// * [`book_slot`](Self::book_slot) must be a compare-and-swap from
///   `available` to `booked`; a lost race surfaces as
///   [`SchedulingError::Conflict`], never as silent success.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Windows of the provider declared on `date` whose local `[start, end)`
    /// interval overlaps the given one, regardless of window status.
    async fn find_overlapping_windows(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError>;

    /// Persist a window together with its full slot batch, all-or-nothing.
    /// Returns `Conflict` if another non-cancelled window of the provider
    /// overlaps the new one on any of the batch's occurrence dates.
    async fn create_window_with_slots(
        &self,
        window: AvailabilityWindow,
        slots: Vec<AppointmentSlot>,
    ) -> Result<(AvailabilityWindow, Vec<AppointmentSlot>), SchedulingError>;

    async fn save_window(
        &self,
        window: AvailabilityWindow,
    ) -> Result<AvailabilityWindow, SchedulingError>;

    /// Persist a slot batch on its own, outside the window-creation
    /// transaction. Window acceptance must go through
    /// [`create_window_with_slots`](Self::create_window_with_slots) instead.
    async fn save_slots(
        &self,
        slots: Vec<AppointmentSlot>,
    ) -> Result<Vec<AppointmentSlot>, SchedulingError>;

    async fn find_window_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<AvailabilityWindow>, SchedulingError>;

    /// Windows of the provider with `date` in `[start_date, end_date]`,
    /// ordered by date then start time.
    async fn find_windows_in_range(
        &self,
        provider_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<AvailabilityWindow>, SchedulingError>;

    async fn find_slot_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<AppointmentSlot>, SchedulingError>;

    /// Slots whose start instant lies in `[start, end)`, optionally scoped to
    /// one provider, ordered chronologically.
    async fn find_slots_in_range(
        &self,
        provider_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AppointmentSlot>, SchedulingError>;

    async fn update_slot(
        &self,
        slot: AppointmentSlot,
    ) -> Result<AppointmentSlot, SchedulingError>;

    /// Compare-and-swap booking: transitions the slot from `available` to
    /// `booked`, attaching patient and booking reference. `Conflict` when the
    /// slot is no longer available, `NotFound` when the id is unknown.
    async fn book_slot(
        &self,
        slot_id: Uuid,
        patient_id: Uuid,
        booking_reference: &str,
    ) -> Result<AppointmentSlot, SchedulingError>;

    /// Delete the given slots. The reason accompanies the deletion and must
    /// be retained by the store for audit.
    async fn delete_slots(
        &self,
        slot_ids: &[Uuid],
        reason: Option<&str>,
    ) -> Result<usize, SchedulingError>;
}

/// Read-only directory of providers; existence/activity checks and search
/// enrichment go through here.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn find_by_id(
        &self,
        provider_id: Uuid,
    ) -> Result<Option<ProviderRecord>, SchedulingError>;
}
