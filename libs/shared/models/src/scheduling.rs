use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

/// A provider-declared open interval on one calendar date, expanded into
/// discrete appointment slots on acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// IANA timezone id, e.g. "America/New_York".
    pub timezone: String,
    pub slot_duration_minutes: i32,
    pub break_duration_minutes: i32,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_end_date: Option<NaiveDate>,
    pub appointment_type: AppointmentType,
    pub max_appointments_per_slot: i32,
    pub current_appointments: i32,
    pub location: Option<AvailabilityLocation>,
    pub pricing: Option<AvailabilityPricing>,
    pub notes: Option<String>,
    pub special_requirements: Vec<String>,
    pub status: AvailabilityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    /// Half-open overlap against another local time interval on the same date.
    pub fn overlaps(&self, start_time: NaiveTime, end_time: NaiveTime) -> bool {
        self.start_time < end_time && self.end_time > start_time
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == AvailabilityStatus::Cancelled
    }
}

/// One bookable unit derived from an availability window. Start and end are
/// absolute instants, resolved through the owning window's timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub id: Uuid,
    pub availability_id: Uuid,
    pub provider_id: Uuid,
    pub slot_start_time: DateTime<Utc>,
    pub slot_end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub patient_id: Option<Uuid>,
    pub appointment_type: AppointmentType,
    /// Set exactly when `status` is `Booked`.
    pub booking_reference: Option<String>,
}

impl AppointmentSlot {
    pub fn duration_minutes(&self) -> i64 {
        (self.slot_end_time - self.slot_start_time).num_minutes()
    }
}

// ==============================================================================
// STATUS AND CLASSIFICATION ENUMS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Cancelled,
    Blocked,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Cancelled => write!(f, "cancelled"),
            SlotStatus::Blocked => write!(f, "blocked"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Booked,
    Cancelled,
    Blocked,
    Maintenance,
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityStatus::Available => write!(f, "available"),
            AvailabilityStatus::Booked => write!(f, "booked"),
            AvailabilityStatus::Cancelled => write!(f, "cancelled"),
            AvailabilityStatus::Blocked => write!(f, "blocked"),
            AvailabilityStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Consultation,
    FollowUp,
    Emergency,
    Telemedicine,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Consultation => write!(f, "consultation"),
            AppointmentType::FollowUp => write!(f, "follow_up"),
            AppointmentType::Emergency => write!(f, "emergency"),
            AppointmentType::Telemedicine => write!(f, "telemedicine"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Clinic,
    Hospital,
    Telemedicine,
    HomeVisit,
}

// ==============================================================================
// EMBEDDED VALUE OBJECTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityLocation {
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub address: String,
    pub room_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityPricing {
    pub base_fee: Option<f64>,
    pub insurance_accepted: bool,
    /// 3-letter uppercase code, e.g. "USD".
    pub currency: String,
}

impl Default for AvailabilityPricing {
    fn default() -> Self {
        Self {
            base_fee: None,
            insurance_accepted: false,
            currency: "USD".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_overlap_is_half_open() {
        let window = AvailabilityWindow {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            timezone: "UTC".to_string(),
            slot_duration_minutes: 30,
            break_duration_minutes: 0,
            is_recurring: false,
            recurrence_pattern: None,
            recurrence_end_date: None,
            appointment_type: AppointmentType::Consultation,
            max_appointments_per_slot: 1,
            current_appointments: 0,
            location: None,
            pricing: None,
            notes: None,
            special_requirements: vec![],
            status: AvailabilityStatus::Available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        // Touching boundaries do not overlap.
        assert!(!window.overlaps(
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap()
        ));
        assert!(!window.overlaps(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        ));
        // Any shared instant does.
        assert!(window.overlaps(
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 45, 0).unwrap()
        ));
        assert!(window.overlaps(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 1, 0).unwrap()
        ));
    }

    #[test]
    fn slot_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SlotStatus::Available).unwrap(),
            "\"available\""
        );
        assert_eq!(SlotStatus::Booked.to_string(), "booked");
    }
}
