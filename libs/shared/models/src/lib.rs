pub mod error;
pub mod provider;
pub mod scheduling;

pub use error::SchedulingError;
pub use provider::{ClinicAddress, ProviderRecord};
pub use scheduling::{
    AppointmentSlot, AppointmentType, AvailabilityLocation, AvailabilityPricing,
    AvailabilityStatus, AvailabilityWindow, LocationType, RecurrencePattern, SlotStatus,
};
