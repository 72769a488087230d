use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::repository::{AvailabilityRepository, ProviderDirectory};
use shared_models::error::SchedulingError;
use shared_models::scheduling::{
    AppointmentSlot, AppointmentType, AvailabilityStatus, AvailabilityWindow, SlotStatus,
};

use crate::models::{
    AvailabilitySummary, AvailabilityValidationRules, CreateAvailabilityRequest,
    CreateAvailabilityResponse, DateRange, DayAvailability, GetAvailabilityQuery,
    GetAvailabilityResponse, SlotInfo,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::expansion::SlotExpansionService;

/// Orchestrates availability declaration: provider checks, input validation,
/// per-occurrence conflict detection, slot expansion and atomic persistence.
pub struct AvailabilityService {
    repository: Arc<dyn AvailabilityRepository>,
    providers: Arc<dyn ProviderDirectory>,
    expansion: SlotExpansionService,
    conflict: ConflictDetectionService,
    validation_rules: AvailabilityValidationRules,
}

impl AvailabilityService {
    pub fn new(
        config: &AppConfig,
        repository: Arc<dyn AvailabilityRepository>,
        providers: Arc<dyn ProviderDirectory>,
    ) -> Self {
        Self {
            expansion: SlotExpansionService::new(config),
            conflict: ConflictDetectionService::new(Arc::clone(&repository)),
            repository,
            providers,
            validation_rules: AvailabilityValidationRules::default(),
        }
    }

    /// Accept a declared window: validate, reject on overlap, expand into
    /// slots and persist window plus batch all-or-nothing.
    pub async fn create_availability(
        &self,
        provider_id: Uuid,
        request: CreateAvailabilityRequest,
    ) -> Result<CreateAvailabilityResponse, SchedulingError> {
        debug!("creating availability for provider {}", provider_id);

        let provider = self
            .providers
            .find_by_id(provider_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("provider {}", provider_id)))?;
        if !provider.is_active {
            return Err(SchedulingError::validation("provider is not active"));
        }

        let start_time = parse_local_time(&request.start_time)?;
        let end_time = parse_local_time(&request.end_time)?;
        if end_time <= start_time {
            return Err(SchedulingError::validation(
                "end time must be after start time",
            ));
        }
        request.timezone.parse::<Tz>().map_err(|_| {
            SchedulingError::validation(format!("invalid timezone {:?}", request.timezone))
        })?;

        let window = self.build_window(provider_id, start_time, end_time, &request)?;

        // Every occurrence date must be free before any slot is materialized;
        // the repository re-arbitrates inside its transactional boundary.
        for date in self.expansion.occurrence_dates(&window)? {
            self.conflict
                .ensure_no_conflict(provider_id, date, start_time, end_time)
                .await?;
        }

        let slots = self.expansion.expand(&window)?;
        let (window, slots) = self
            .repository
            .create_window_with_slots(window, slots)
            .await?;

        info!(
            "availability {} created for provider {} with {} slots",
            window.id,
            provider_id,
            slots.len()
        );

        Ok(CreateAvailabilityResponse {
            availability_id: window.id,
            slots_created: slots.len(),
            date_range: DateRange {
                start: window.date,
                end: window.recurrence_end_date.unwrap_or(window.date),
            },
            total_appointments_available: slots.len(),
        })
    }

    /// Provider-facing read: windows in the date range, grouped per day with
    /// their slots rendered in window-local wall time, plus status counts.
    pub async fn get_provider_availability(
        &self,
        provider_id: Uuid,
        query: GetAvailabilityQuery,
    ) -> Result<GetAvailabilityResponse, SchedulingError> {
        if self.providers.find_by_id(provider_id).await?.is_none() {
            return Err(SchedulingError::not_found(format!(
                "provider {}",
                provider_id
            )));
        }
        if query.end_date < query.start_date {
            return Err(SchedulingError::validation(
                "end date must not precede start date",
            ));
        }

        let mut windows = self
            .repository
            .find_windows_in_range(provider_id, query.start_date, query.end_date)
            .await?;
        if let Some(status) = query.status {
            windows.retain(|w| w.status == status);
        }
        if let Some(appointment_type) = query.appointment_type {
            windows.retain(|w| w.appointment_type == appointment_type);
        }

        let mut window_cache: HashMap<Uuid, AvailabilityWindow> =
            windows.iter().map(|w| (w.id, w.clone())).collect();

        let dates: BTreeMap<NaiveDate, ()> = windows.iter().map(|w| (w.date, ())).collect();

        let mut days = Vec::new();
        let mut summary = AvailabilitySummary {
            total_slots: 0,
            available_slots: 0,
            booked_slots: 0,
            cancelled_slots: 0,
        };

        for date in dates.keys() {
            let day_start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
            let day_end = day_start + Duration::days(1);
            let slots = self
                .repository
                .find_slots_in_range(Some(provider_id), day_start, day_end)
                .await?;

            let mut slot_infos = Vec::with_capacity(slots.len());
            for slot in slots {
                summary.total_slots += 1;
                match slot.status {
                    SlotStatus::Available => summary.available_slots += 1,
                    SlotStatus::Booked => summary.booked_slots += 1,
                    SlotStatus::Cancelled => summary.cancelled_slots += 1,
                    SlotStatus::Blocked => {}
                }
                if let Some(info) = self.render_slot(&slot, &mut window_cache).await? {
                    slot_infos.push(info);
                }
            }

            days.push(DayAvailability {
                date: *date,
                slots: slot_infos,
            });
        }

        Ok(GetAvailabilityResponse {
            provider_id,
            availability_summary: summary,
            availability: days,
        })
    }

    fn build_window(
        &self,
        provider_id: Uuid,
        start_time: NaiveTime,
        end_time: NaiveTime,
        request: &CreateAvailabilityRequest,
    ) -> Result<AvailabilityWindow, SchedulingError> {
        let rules = &self.validation_rules;

        let slot_duration = request.slot_duration_minutes.unwrap_or(30);
        if slot_duration < rules.min_slot_duration_minutes
            || slot_duration > rules.max_slot_duration_minutes
        {
            return Err(SchedulingError::validation(format!(
                "slot duration must be between {} and {} minutes",
                rules.min_slot_duration_minutes, rules.max_slot_duration_minutes
            )));
        }

        let break_duration = request.break_duration_minutes.unwrap_or(0);
        if break_duration < 0 || break_duration > rules.max_break_duration_minutes {
            return Err(SchedulingError::validation(format!(
                "break duration must be between 0 and {} minutes",
                rules.max_break_duration_minutes
            )));
        }

        if let Some(notes) = &request.notes {
            if notes.len() > rules.max_notes_length {
                return Err(SchedulingError::validation(format!(
                    "notes cannot exceed {} characters",
                    rules.max_notes_length
                )));
            }
        }
        let special_requirements = request.special_requirements.clone().unwrap_or_default();
        if special_requirements.len() > rules.max_special_requirements {
            return Err(SchedulingError::validation(format!(
                "cannot have more than {} special requirements",
                rules.max_special_requirements
            )));
        }

        if let Some(pricing) = &request.pricing {
            if let Some(fee) = pricing.base_fee {
                if fee <= 0.0 {
                    return Err(SchedulingError::validation(
                        "base fee must be greater than 0",
                    ));
                }
            }
            if pricing.currency.len() != 3
                || !pricing.currency.chars().all(|c| c.is_ascii_uppercase())
            {
                return Err(SchedulingError::validation(
                    "currency must be a 3-letter uppercase code",
                ));
            }
        }

        let max_per_slot = request.max_appointments_per_slot.unwrap_or(1);
        if max_per_slot < 1 {
            return Err(SchedulingError::validation(
                "max appointments per slot must be at least 1",
            ));
        }

        let now = Utc::now();
        Ok(AvailabilityWindow {
            id: Uuid::new_v4(),
            provider_id,
            date: request.date,
            start_time,
            end_time,
            timezone: request.timezone.clone(),
            slot_duration_minutes: slot_duration,
            break_duration_minutes: break_duration,
            is_recurring: request.is_recurring.unwrap_or(false),
            recurrence_pattern: request.recurrence_pattern,
            recurrence_end_date: request.recurrence_end_date,
            appointment_type: request
                .appointment_type
                .unwrap_or(AppointmentType::Consultation),
            max_appointments_per_slot: max_per_slot,
            current_appointments: 0,
            location: request.location.clone(),
            pricing: request.pricing.clone(),
            notes: request.notes.clone(),
            special_requirements,
            status: AvailabilityStatus::Available,
            created_at: now,
            updated_at: now,
        })
    }

    async fn render_slot(
        &self,
        slot: &AppointmentSlot,
        window_cache: &mut HashMap<Uuid, AvailabilityWindow>,
    ) -> Result<Option<SlotInfo>, SchedulingError> {
        let window = match window_cache.get(&slot.availability_id) {
            Some(window) => window.clone(),
            None => match self.repository.find_window_by_id(slot.availability_id).await? {
                Some(window) => {
                    window_cache.insert(window.id, window.clone());
                    window
                }
                None => return Ok(None),
            },
        };

        let tz: Tz = window
            .timezone
            .parse()
            .map_err(|_| SchedulingError::Storage(format!("window {} has invalid timezone", window.id)))?;

        Ok(Some(SlotInfo {
            slot_id: slot.id,
            start_time: slot
                .slot_start_time
                .with_timezone(&tz)
                .format("%H:%M")
                .to_string(),
            end_time: slot
                .slot_end_time
                .with_timezone(&tz)
                .format("%H:%M")
                .to_string(),
            status: slot.status,
            appointment_type: slot.appointment_type,
            location: window.location.clone(),
            pricing: window.pricing.clone(),
        }))
    }
}

fn parse_local_time(raw: &str) -> Result<NaiveTime, SchedulingError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| SchedulingError::validation(format!("time {:?} must be in HH:MM format", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_time_parsing_accepts_hh_mm_only() {
        assert_eq!(
            parse_local_time("09:00").unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert!(parse_local_time("9am").is_err());
        assert!(parse_local_time("25:00").is_err());
        assert!(parse_local_time("09:00:00").is_err());
    }
}
