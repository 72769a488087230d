use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider record as exposed by the provider directory collaborator.
/// Provider lifecycle is out of scope; this is a read-only view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub years_of_experience: Option<i32>,
    pub clinic_address: ClinicAddress,
    pub is_active: bool,
}

impl ProviderRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl ClinicAddress {
    /// "City, State Zip" form used for location matching and display.
    pub fn location_string(&self) -> String {
        format!("{}, {} {}", self.city, self.state, self.zip)
    }
}
