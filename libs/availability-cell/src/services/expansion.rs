use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::SchedulingError;
use shared_models::scheduling::{
    AppointmentSlot, AvailabilityWindow, RecurrencePattern, SlotStatus,
};

/// Expands a declared availability window into its ordered batch of discrete
/// appointment slots, resolving local wall times to absolute instants through
/// the window's IANA timezone.
pub struct SlotExpansionService {
    recurrence_horizon_days: i64,
}

impl SlotExpansionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            recurrence_horizon_days: config.recurrence_horizon_days,
        }
    }

    /// Materialize every slot of the window, one expansion per occurrence
    /// date, in chronological order. A window too short to fit a single slot
    /// yields an empty batch, not an error.
    pub fn expand(
        &self,
        window: &AvailabilityWindow,
    ) -> Result<Vec<AppointmentSlot>, SchedulingError> {
        let tz: Tz = window.timezone.parse().map_err(|_| {
            SchedulingError::validation(format!("invalid timezone {:?}", window.timezone))
        })?;

        let mut slots = Vec::new();
        for date in self.occurrence_dates(window)? {
            expand_on_date(window, date, tz, &mut slots);
        }
        debug!("expanded window {} into {} slots", window.id, slots.len());
        Ok(slots)
    }

    /// Calendar dates the window occurs on: just its own date, or the
    /// recurrence sequence through `recurrence_end_date` (inclusive).
    /// Monthly occurrences landing on a day the target month does not have
    /// are skipped.
    pub fn occurrence_dates(
        &self,
        window: &AvailabilityWindow,
    ) -> Result<Vec<NaiveDate>, SchedulingError> {
        if !window.is_recurring {
            return Ok(vec![window.date]);
        }

        let pattern = window.recurrence_pattern.ok_or_else(|| {
            SchedulingError::validation("recurring availability requires a recurrence pattern")
        })?;
        let end_date = window.recurrence_end_date.ok_or_else(|| {
            SchedulingError::validation("recurring availability requires a recurrence end date")
        })?;
        if end_date <= window.date {
            return Err(SchedulingError::validation(
                "recurrence end date must be after the availability date",
            ));
        }
        if (end_date - window.date).num_days() > self.recurrence_horizon_days {
            return Err(SchedulingError::validation(format!(
                "recurrence may not extend more than {} days past the first date",
                self.recurrence_horizon_days
            )));
        }

        let mut dates = vec![window.date];
        match pattern {
            RecurrencePattern::Daily => collect_stepped(window.date, end_date, 1, &mut dates),
            RecurrencePattern::Weekly => collect_stepped(window.date, end_date, 7, &mut dates),
            RecurrencePattern::Monthly => {
                for step in 1u32.. {
                    let Some(candidate) = window.date.checked_add_months(Months::new(step)) else {
                        break;
                    };
                    if candidate > end_date {
                        break;
                    }
                    // checked_add_months clamps (Jan 31 -> Feb 28); a clamped
                    // candidate means the target month lacks the day, so the
                    // occurrence is skipped.
                    if candidate.day() == window.date.day() {
                        dates.push(candidate);
                    }
                }
            }
        }
        Ok(dates)
    }
}

fn collect_stepped(start: NaiveDate, end: NaiveDate, step_days: i64, dates: &mut Vec<NaiveDate>) {
    let mut current = start + Duration::days(step_days);
    while current <= end {
        dates.push(current);
        current += Duration::days(step_days);
    }
}

/// One occurrence: walk a cursor from the window's start time, emitting
/// `[cursor, cursor + slot_duration)` while the slot still ends on or before
/// the window's end time, then advancing past the break.
fn expand_on_date(
    window: &AvailabilityWindow,
    date: NaiveDate,
    tz: Tz,
    slots: &mut Vec<AppointmentSlot>,
) {
    let start = minutes_from_midnight(window.start_time);
    let end = minutes_from_midnight(window.end_time);
    let slot_len = i64::from(window.slot_duration_minutes);
    let break_len = i64::from(window.break_duration_minutes);

    let mut cursor = start;
    while cursor + slot_len <= end {
        // Nonexistent local times (spring-forward gap) skip the slot;
        // ambiguous ones (fall-back) resolve to the earlier instant.
        if let Some(slot_start) = resolve_local(date, cursor, tz) {
            slots.push(AppointmentSlot {
                id: Uuid::new_v4(),
                availability_id: window.id,
                provider_id: window.provider_id,
                slot_start_time: slot_start,
                slot_end_time: slot_start + Duration::minutes(slot_len),
                status: SlotStatus::Available,
                patient_id: None,
                appointment_type: window.appointment_type,
                booking_reference: None,
            });
        }
        cursor += slot_len + break_len;
    }
}

fn minutes_from_midnight(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) / 60
}

fn resolve_local(date: NaiveDate, minutes: i64, tz: Tz) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(minutes * 60).ok()?, 0)?;
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|resolved| resolved.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared_models::scheduling::{AppointmentType, AvailabilityStatus};

    fn test_window(
        start: (u32, u32),
        end: (u32, u32),
        slot_minutes: i32,
        break_minutes: i32,
        timezone: &str,
    ) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            timezone: timezone.to_string(),
            slot_duration_minutes: slot_minutes,
            break_duration_minutes: break_minutes,
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
        }
    }

    fn service() -> SlotExpansionService {
        SlotExpansionService::new(&AppConfig::default())
    }

    #[test]
    fn one_hour_window_with_30_minute_slots_yields_two_slots() {
        let window = test_window((9, 0), (10, 0), 30, 0, "UTC");
        let slots = service().expand(&window).unwrap();

        assert_eq!(slots.len(), 2);
        assert_eq!(
            slots[0].slot_start_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
        );
        assert_eq!(
            slots[0].slot_end_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
        );
        assert_eq!(
            slots[1].slot_start_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
        );
        assert_eq!(
            slots[1].slot_end_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn slot_ending_exactly_at_window_end_is_emitted() {
        let window = test_window((9, 0), (9, 30), 30, 0, "UTC");
        let slots = service().expand(&window).unwrap();
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn window_too_short_for_one_slot_yields_empty_batch() {
        let window = test_window((9, 0), (9, 20), 30, 0, "UTC");
        let slots = service().expand(&window).unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn breaks_separate_consecutive_slots() {
        let window = test_window((9, 0), (11, 0), 30, 15, "UTC");
        let slots = service().expand(&window).unwrap();

        // 09:00-09:30, 09:45-10:15, 10:30-11:00
        assert_eq!(slots.len(), 3);
        for pair in slots.windows(2) {
            assert_eq!(
                pair[1].slot_start_time,
                pair[0].slot_end_time + Duration::minutes(15)
            );
        }
        assert!(slots.last().unwrap().slot_end_time <= Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn local_times_resolve_through_the_window_timezone() {
        // New York is UTC-4 in June.
        let window = test_window((9, 0), (10, 0), 30, 0, "America/New_York");
        let slots = service().expand(&window).unwrap();

        assert_eq!(slots.len(), 2);
        assert_eq!(
            slots[0].slot_start_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn every_slot_has_the_declared_duration() {
        let window = test_window((8, 0), (12, 0), 45, 5, "Europe/Berlin");
        let slots = service().expand(&window).unwrap();

        assert!(!slots.is_empty());
        for slot in &slots {
            assert_eq!(slot.duration_minutes(), 45);
        }
    }

    #[test]
    fn invalid_timezone_is_a_validation_error() {
        let window = test_window((9, 0), (10, 0), 30, 0, "Mars/Olympus_Mons");
        let result = service().expand(&window);
        assert!(matches!(result, Err(SchedulingError::Validation(_))));
    }

    #[test]
    fn daily_recurrence_expands_each_date_independently() {
        let mut window = test_window((9, 0), (10, 0), 30, 0, "UTC");
        window.is_recurring = true;
        window.recurrence_pattern = Some(RecurrencePattern::Daily);
        window.recurrence_end_date = NaiveDate::from_ymd_opt(2025, 6, 3);

        let slots = service().expand(&window).unwrap();
        assert_eq!(slots.len(), 6); // 2 slots x 3 days

        // Chronological across occurrences.
        for pair in slots.windows(2) {
            assert!(pair[0].slot_start_time < pair[1].slot_start_time);
        }
    }

    #[test]
    fn weekly_recurrence_occurs_every_seven_days() {
        let mut window = test_window((9, 0), (9, 30), 30, 0, "UTC");
        window.is_recurring = true;
        window.recurrence_pattern = Some(RecurrencePattern::Weekly);
        window.recurrence_end_date = NaiveDate::from_ymd_opt(2025, 6, 29); // +28 days

        let dates = service().occurrence_dates(&window).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 8).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 22).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 29).unwrap(),
            ]
        );
    }

    #[test]
    fn monthly_recurrence_skips_months_without_the_day() {
        let mut window = test_window((9, 0), (9, 30), 30, 0, "UTC");
        window.date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        window.is_recurring = true;
        window.recurrence_pattern = Some(RecurrencePattern::Monthly);
        window.recurrence_end_date = NaiveDate::from_ymd_opt(2025, 5, 31);

        let dates = service().occurrence_dates(&window).unwrap();
        // February and April have no 31st.
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
            ]
        );
    }

    #[test]
    fn recurrence_beyond_the_horizon_is_rejected() {
        let mut window = test_window((9, 0), (9, 30), 30, 0, "UTC");
        window.is_recurring = true;
        window.recurrence_pattern = Some(RecurrencePattern::Daily);
        window.recurrence_end_date = NaiveDate::from_ymd_opt(2027, 6, 1);

        let result = service().occurrence_dates(&window);
        assert!(matches!(result, Err(SchedulingError::Validation(_))));
    }

    #[test]
    fn recurring_window_without_pattern_is_rejected() {
        let mut window = test_window((9, 0), (9, 30), 30, 0, "UTC");
        window.is_recurring = true;
        window.recurrence_end_date = NaiveDate::from_ymd_opt(2025, 6, 8);

        let result = service().occurrence_dates(&window);
        assert!(matches!(result, Err(SchedulingError::Validation(_))));
    }
}
