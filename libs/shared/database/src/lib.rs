pub mod memory;
pub mod repository;

pub use memory::{InMemoryProviderDirectory, InMemoryStore};
pub use repository::{AvailabilityRepository, ProviderDirectory};
