use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::repository::{AvailabilityRepository, ProviderDirectory};
use shared_models::error::SchedulingError;
use shared_models::provider::ProviderRecord;
use shared_models::scheduling::{AppointmentSlot, AvailabilityWindow, SlotStatus};

use crate::models::{
    AvailabilitySearchRequest, AvailabilitySearchResponse, AvailableSlotInfo, ProviderInfo,
    ProviderSearchResult, SearchCriteria,
};

/// Patient-facing read-only search over bookable slots, grouped by provider.
/// Results may be stale by the time a booking is attempted; the booking
/// compare-and-swap is the authority.
pub struct AvailabilitySearchService {
    repository: Arc<dyn AvailabilityRepository>,
    providers: Arc<dyn ProviderDirectory>,
    search_window_days: i64,
}

impl AvailabilitySearchService {
    pub fn new(
        config: &AppConfig,
        repository: Arc<dyn AvailabilityRepository>,
        providers: Arc<dyn ProviderDirectory>,
    ) -> Self {
        Self {
            repository,
            providers,
            search_window_days: config.search_window_days,
        }
    }

    pub async fn search(
        &self,
        request: AvailabilitySearchRequest,
    ) -> Result<AvailabilitySearchResponse, SchedulingError> {
        let criteria = SearchCriteria {
            date: request.date.map(|d| d.to_string()),
            specialization: request.specialization.clone(),
            location: request.location.clone(),
        };

        // A single date wins over an explicit range; with neither, search the
        // configured default window starting today.
        let (start_date, end_date) = match request.date {
            Some(date) => (date, date),
            None => {
                let start = request
                    .start_date
                    .unwrap_or_else(|| Utc::now().date_naive());
                let end = request
                    .end_date
                    .unwrap_or(start + Duration::days(self.search_window_days));
                (start, end)
            }
        };
        if end_date < start_date {
            return Err(SchedulingError::validation(
                "end date must not precede start date",
            ));
        }

        let tz: Tz = match &request.timezone {
            Some(raw) => raw.parse().map_err(|_| {
                SchedulingError::validation(format!("invalid timezone {:?}", raw))
            })?,
            None => chrono_tz::UTC,
        };
        let search_start = day_start(start_date, tz)?;
        let search_end = day_start(end_date + Duration::days(1), tz)?;

        debug!(
            "searching slots between {} and {} (specialization={:?}, location={:?})",
            search_start, search_end, request.specialization, request.location
        );

        let available_only = request.available_only.unwrap_or(true);
        let mut candidates = self
            .repository
            .find_slots_in_range(None, search_start, search_end)
            .await?;
        candidates.retain(|slot| {
            if available_only {
                slot.status == SlotStatus::Available
            } else {
                slot.status != SlotStatus::Cancelled
            }
        });
        if let Some(wanted) = &request.appointment_type {
            candidates.retain(|slot| slot.appointment_type.to_string().eq_ignore_ascii_case(wanted));
        }

        // Group by provider; BTreeMap keeps the result order stable across
        // identical searches.
        let mut by_provider: BTreeMap<Uuid, Vec<AppointmentSlot>> = BTreeMap::new();
        for slot in candidates {
            by_provider.entry(slot.provider_id).or_default().push(slot);
        }

        let mut window_cache: HashMap<Uuid, AvailabilityWindow> = HashMap::new();
        let mut results = Vec::new();

        for (provider_id, slots) in by_provider {
            let Some(provider) = self.providers.find_by_id(provider_id).await? else {
                warn!("slots reference unknown provider {}; omitting", provider_id);
                continue;
            };

            // Provider-level filters eliminate the whole group.
            if let Some(wanted) = &request.specialization {
                if !provider.specialization.eq_ignore_ascii_case(wanted) {
                    continue;
                }
            }
            if let Some(wanted) = &request.location {
                if !matches_location(&provider, wanted) {
                    continue;
                }
            }

            let mut slot_infos = Vec::new();
            for slot in slots {
                let window = match self.window_for(&slot, &mut window_cache).await? {
                    Some(window) => window,
                    None => {
                        warn!("slot {} references missing window; omitting", slot.id);
                        continue;
                    }
                };

                // Slot-level filters eliminate individual slots.
                if let Some(wanted) = request.insurance_accepted {
                    let accepted = window
                        .pricing
                        .as_ref()
                        .map(|p| p.insurance_accepted == wanted);
                    if accepted != Some(true) {
                        continue;
                    }
                }
                if let Some(max_price) = request.max_price {
                    let affordable = window
                        .pricing
                        .as_ref()
                        .and_then(|p| p.base_fee)
                        .map(|fee| fee <= max_price);
                    if affordable != Some(true) {
                        continue;
                    }
                }

                slot_infos.push(render_slot(&slot, &window)?);
            }

            // A provider with no surviving slots is omitted entirely.
            if slot_infos.is_empty() {
                continue;
            }

            results.push(ProviderSearchResult {
                provider: ProviderInfo {
                    id: provider.id,
                    name: provider.full_name(),
                    specialization: provider.specialization.clone(),
                    years_of_experience: provider.years_of_experience,
                    clinic_address: format!(
                        "{}, {}, {}",
                        provider.clinic_address.street,
                        provider.clinic_address.city,
                        provider.clinic_address.state
                    ),
                },
                available_slots: slot_infos,
            });
        }

        Ok(AvailabilitySearchResponse {
            search_criteria: criteria,
            total_results: results.len(),
            results,
        })
    }

    async fn window_for(
        &self,
        slot: &AppointmentSlot,
        cache: &mut HashMap<Uuid, AvailabilityWindow>,
    ) -> Result<Option<AvailabilityWindow>, SchedulingError> {
        if let Some(window) = cache.get(&slot.availability_id) {
            return Ok(Some(window.clone()));
        }
        match self.repository.find_window_by_id(slot.availability_id).await? {
            Some(window) => {
                cache.insert(window.id, window.clone());
                Ok(Some(window))
            }
            None => Ok(None),
        }
    }
}

fn day_start(date: chrono::NaiveDate, tz: Tz) -> Result<DateTime<Utc>, SchedulingError> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|resolved| resolved.with_timezone(&Utc))
        .ok_or_else(|| {
            SchedulingError::validation(format!("date {} is not resolvable in {}", date, tz))
        })
}

/// Substring match against the clinic address: city, state, zip, or the
/// combined "City, State Zip" form, case-insensitively (zip matched verbatim).
fn matches_location(provider: &ProviderRecord, search: &str) -> bool {
    let needle = search.to_lowercase();
    let address = &provider.clinic_address;
    address.location_string().to_lowercase().contains(&needle)
        || address.city.to_lowercase().contains(&needle)
        || address.state.to_lowercase().contains(&needle)
        || address.zip.contains(search)
}

fn render_slot(
    slot: &AppointmentSlot,
    window: &AvailabilityWindow,
) -> Result<AvailableSlotInfo, SchedulingError> {
    let tz: Tz = window.timezone.parse().map_err(|_| {
        SchedulingError::Storage(format!("window {} has invalid timezone", window.id))
    })?;
    let local_start = slot.slot_start_time.with_timezone(&tz);
    let local_end = slot.slot_end_time.with_timezone(&tz);

    Ok(AvailableSlotInfo {
        slot_id: slot.id,
        date: local_start.date_naive().to_string(),
        start_time: local_start.format("%H:%M").to_string(),
        end_time: local_end.format("%H:%M").to_string(),
        appointment_type: slot.appointment_type,
        location: window.location.clone(),
        pricing: window.pricing.clone(),
        special_requirements: window.special_requirements.clone(),
    })
}
