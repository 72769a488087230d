// libs/availability-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::scheduling::{
    AppointmentType, AvailabilityLocation, AvailabilityPricing, AvailabilityStatus,
    RecurrencePattern, SlotStatus,
};

// ==============================================================================
// AVAILABILITY CREATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub date: NaiveDate,
    /// Local wall time, "HH:MM".
    pub start_time: String,
    /// Local wall time, "HH:MM".
    pub end_time: String,
    /// IANA timezone id.
    pub timezone: String,
    pub slot_duration_minutes: Option<i32>,
    pub break_duration_minutes: Option<i32>,
    pub is_recurring: Option<bool>,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_end_date: Option<NaiveDate>,
    pub appointment_type: Option<AppointmentType>,
    pub max_appointments_per_slot: Option<i32>,
    pub location: Option<AvailabilityLocation>,
    pub pricing: Option<AvailabilityPricing>,
    pub notes: Option<String>,
    pub special_requirements: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityResponse {
    pub availability_id: Uuid,
    pub slots_created: usize,
    pub date_range: DateRange,
    pub total_appointments_available: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// ==============================================================================
// AVAILABILITY READ MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAvailabilityQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: Option<AvailabilityStatus>,
    pub appointment_type: Option<AppointmentType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAvailabilityResponse {
    pub provider_id: Uuid,
    pub availability_summary: AvailabilitySummary,
    pub availability: Vec<DayAvailability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySummary {
    pub total_slots: usize,
    pub available_slots: usize,
    pub booked_slots: usize,
    pub cancelled_slots: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub slots: Vec<SlotInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotInfo {
    pub slot_id: Uuid,
    /// Local wall time in the owning window's timezone, "HH:MM".
    pub start_time: String,
    pub end_time: String,
    pub status: SlotStatus,
    pub appointment_type: AppointmentType,
    pub location: Option<AvailabilityLocation>,
    pub pricing: Option<AvailabilityPricing>,
}

// ==============================================================================
// SLOT MUTATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<SlotStatus>,
    /// Written through to the owning window, not the slot.
    pub notes: Option<String>,
}

// ==============================================================================
// SEARCH MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilitySearchRequest {
    /// Single-date search; takes precedence over `start_date`/`end_date`.
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub specialization: Option<String>,
    /// Substring match against city, state or zip.
    pub location: Option<String>,
    pub appointment_type: Option<String>,
    pub insurance_accepted: Option<bool>,
    /// Inclusive ceiling on the base fee.
    pub max_price: Option<f64>,
    pub timezone: Option<String>,
    /// Defaults to true.
    pub available_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySearchResponse {
    pub search_criteria: SearchCriteria,
    /// Number of provider groups, not slot count.
    pub total_results: usize,
    pub results: Vec<ProviderSearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub date: Option<String>,
    pub specialization: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSearchResult {
    pub provider: ProviderInfo,
    pub available_slots: Vec<AvailableSlotInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub years_of_experience: Option<i32>,
    pub clinic_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotInfo {
    pub slot_id: Uuid,
    /// Local calendar date in the owning window's timezone.
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub appointment_type: AppointmentType,
    pub location: Option<AvailabilityLocation>,
    pub pricing: Option<AvailabilityPricing>,
    pub special_requirements: Vec<String>,
}

// ==============================================================================
// VALIDATION MODELS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct AvailabilityValidationRules {
    pub min_slot_duration_minutes: i32,
    pub max_slot_duration_minutes: i32,
    pub max_break_duration_minutes: i32,
    pub max_notes_length: usize,
    pub max_special_requirements: usize,
}

impl Default for AvailabilityValidationRules {
    fn default() -> Self {
        Self {
            min_slot_duration_minutes: 15,
            max_slot_duration_minutes: 480,
            max_break_duration_minutes: 120,
            max_notes_length: 500,
            max_special_requirements: 10,
        }
    }
}
