use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{AttendanceEvent, AttendancePattern, AttendanceStatus, TrendDirection};

/// Recent trend window, in days.
const RECENT_WINDOW_DAYS: i64 = 28;
/// Outer bound of the prior (disjoint) trend window, in days.
const PRIOR_WINDOW_DAYS: i64 = 56;
/// A rate swing inside this band leaves the trend classified as stable.
const TREND_HYSTERESIS: f64 = 10.0;

/// Recompute the full profile for one (group, participant) pair from its
/// complete event history, ordered by class date descending. Zero events
/// produce a zeroed profile; the caller decides not to persist that case.
pub fn compute_pattern(
    group_id: Uuid,
    participant_id: Uuid,
    events: &[AttendanceEvent],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> AttendancePattern {
    let total = events.len() as i64;
    let mut present = 0i64;
    let mut absent = 0i64;
    let mut excused = 0i64;
    let mut late = 0i64;

    for event in events {
        match event.status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Absent => absent += 1,
            AttendanceStatus::Excused => excused += 1,
            AttendanceStatus::Late => late += 1,
        }
    }

    let attendance_rate = if total == 0 {
        0.0
    } else {
        100.0 * (present + late) as f64 / total as f64
    };

    let (consecutive_absences, consecutive_presences) = current_streaks(events);

    let last_4_weeks_rate = window_rate(events, today - Duration::days(RECENT_WINDOW_DAYS), None);
    let last_8_weeks_rate = window_rate(
        events,
        today - Duration::days(PRIOR_WINDOW_DAYS),
        Some(today - Duration::days(RECENT_WINDOW_DAYS)),
    );

    AttendancePattern {
        group_id,
        participant_id,
        total_classes_held: total,
        total_present: present,
        total_absent: absent,
        total_excused: excused,
        total_late: late,
        attendance_rate,
        consecutive_absences,
        consecutive_presences,
        last_attendance_date: events.first().map(|e| e.class_date),
        last_attendance_status: events.first().map(|e| e.status),
        last_4_weeks_rate,
        last_8_weeks_rate,
        trend_direction: classify_trend(last_4_weeks_rate, last_8_weeks_rate),
        last_calculated_at: now,
    }
}

/// Walk the history from the most recent event and count the current streak.
/// At most one of the two counters is nonzero. The walk terminates at the
/// first EXCUSED event: an excused record anywhere caps how far back the scan
/// looks, it is not skipped. Inherited behavior, pinned by tests.
fn current_streaks(events: &[AttendanceEvent]) -> (i64, i64) {
    let mut absences = 0i64;
    let mut presences = 0i64;

    for event in events {
        match event.status {
            AttendanceStatus::Excused => break,
            AttendanceStatus::Absent => {
                if presences > 0 {
                    break;
                }
                absences += 1;
            }
            AttendanceStatus::Present | AttendanceStatus::Late => {
                if absences > 0 {
                    break;
                }
                presences += 1;
            }
        }
    }

    (absences, presences)
}

/// Length of the presence run that immediately preceded the current absence
/// run. Needed by the first-time-absence rule; the stored profile keeps its
/// two streak counters mutually exclusive, so this is recomputed per pass and
/// never persisted. Same EXCUSED termination as `current_streaks`.
pub fn prior_presence_streak(events: &[AttendanceEvent]) -> i64 {
    let mut iter = events.iter().peekable();

    while let Some(event) = iter.peek() {
        match event.status {
            AttendanceStatus::Absent => {
                iter.next();
            }
            _ => break,
        }
    }

    let mut presences = 0i64;
    for event in iter {
        match event.status {
            AttendanceStatus::Present | AttendanceStatus::Late => presences += 1,
            _ => break,
        }
    }

    presences
}

/// Attendance rate restricted to events with `from <= class_date` and, when
/// `until` is given, `class_date < until`. An empty window rates 0.
fn window_rate(events: &[AttendanceEvent], from: NaiveDate, until: Option<NaiveDate>) -> f64 {
    let mut total = 0i64;
    let mut attended = 0i64;

    for event in events {
        if event.class_date < from {
            continue;
        }
        if let Some(until) = until {
            if event.class_date >= until {
                continue;
            }
        }
        total += 1;
        if event.status.counts_as_attended() {
            attended += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        100.0 * attended as f64 / total as f64
    }
}

fn classify_trend(recent_rate: f64, prior_rate: f64) -> TrendDirection {
    if recent_rate > prior_rate + TREND_HYSTERESIS {
        TrendDirection::Improving
    } else if recent_rate < prior_rate - TREND_HYSTERESIS {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(days_ago: i64, status: AttendanceStatus) -> AttendanceEvent {
        AttendanceEvent {
            id: Uuid::new_v4(),
            group_id: Uuid::nil(),
            participant_id: Uuid::nil(),
            class_date: Utc::now().date_naive() - Duration::days(days_ago),
            status,
            note: None,
            recorded_by: None,
            recorded_at: Utc::now(),
        }
    }

    fn compute(events: &[AttendanceEvent]) -> AttendancePattern {
        compute_pattern(
            Uuid::nil(),
            Uuid::nil(),
            events,
            Utc::now().date_naive(),
            Utc::now(),
        )
    }

    #[test]
    fn zero_events_give_a_zeroed_profile() {
        let pattern = compute(&[]);
        assert_eq!(pattern.total_classes_held, 0);
        assert_eq!(pattern.attendance_rate, 0.0);
        assert_eq!(pattern.consecutive_absences, 0);
        assert_eq!(pattern.consecutive_presences, 0);
        assert_eq!(pattern.trend_direction, TrendDirection::Stable);
        assert!(pattern.last_attendance_date.is_none());
    }

    #[test]
    fn rate_counts_late_as_attendance() {
        use AttendanceStatus::*;
        let events: Vec<_> = [Present, Late, Absent, Excused]
            .iter()
            .enumerate()
            .map(|(i, s)| event(i as i64 * 7, *s))
            .collect();

        let pattern = compute(&events);
        assert_eq!(pattern.total_classes_held, 4);
        assert_eq!(pattern.total_present, 1);
        assert_eq!(pattern.total_late, 1);
        assert!((pattern.attendance_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn excused_terminates_streak_scan() {
        use AttendanceStatus::*;
        // Descending: two absences, then an excused record, then three more
        // absences. The scan must stop at the excused event and report 2.
        let events: Vec<_> = [Absent, Absent, Excused, Absent, Absent, Absent]
            .iter()
            .enumerate()
            .map(|(i, s)| event(i as i64 * 7, *s))
            .collect();

        let pattern = compute(&events);
        assert_eq!(pattern.consecutive_absences, 2);
        assert_eq!(pattern.consecutive_presences, 0);
    }

    #[test]
    fn streak_counters_are_mutually_exclusive() {
        use AttendanceStatus::*;
        let events: Vec<_> = [Present, Late, Present, Absent]
            .iter()
            .enumerate()
            .map(|(i, s)| event(i as i64 * 7, *s))
            .collect();

        let pattern = compute(&events);
        assert_eq!(pattern.consecutive_presences, 3);
        assert_eq!(pattern.consecutive_absences, 0);
    }

    #[test]
    fn prior_streak_counts_presences_behind_the_absence_run() {
        use AttendanceStatus::*;
        let events: Vec<_> = [Absent, Present, Late, Present, Present, Present, Absent]
            .iter()
            .enumerate()
            .map(|(i, s)| event(i as i64 * 7, *s))
            .collect();

        assert_eq!(prior_presence_streak(&events), 5);
    }

    #[test]
    fn prior_streak_stops_at_excused() {
        use AttendanceStatus::*;
        let events: Vec<_> = [Absent, Present, Present, Excused, Present]
            .iter()
            .enumerate()
            .map(|(i, s)| event(i as i64 * 7, *s))
            .collect();

        assert_eq!(prior_presence_streak(&events), 2);
    }

    #[test]
    fn trend_windows_are_disjoint() {
        use AttendanceStatus::*;
        // 28 days ago falls in the recent window (inclusive bound); 29 and 56
        // days ago fall in the prior window; 57 days ago falls in neither.
        let events = vec![
            event(7, Present),
            event(28, Present),
            event(29, Absent),
            event(56, Absent),
            event(57, Absent),
        ];

        let pattern = compute(&events);
        assert!((pattern.last_4_weeks_rate - 100.0).abs() < 1e-9);
        assert!((pattern.last_8_weeks_rate - 0.0).abs() < 1e-9);
    }

    #[test]
    fn empty_window_rates_zero() {
        use AttendanceStatus::*;
        let events = vec![event(70, Present), event(77, Present)];

        let pattern = compute(&events);
        assert_eq!(pattern.last_4_weeks_rate, 0.0);
        assert_eq!(pattern.last_8_weeks_rate, 0.0);
        assert_eq!(pattern.trend_direction, TrendDirection::Stable);
    }

    #[test]
    fn trend_hysteresis_band_reads_stable() {
        assert_eq!(classify_trend(65.0, 60.0), TrendDirection::Stable);
        assert_eq!(classify_trend(75.0, 60.0), TrendDirection::Improving);
        assert_eq!(classify_trend(45.0, 60.0), TrendDirection::Declining);
        assert_eq!(classify_trend(70.0, 60.0), TrendDirection::Stable);
    }

    #[test]
    fn last_attendance_comes_from_the_most_recent_event() {
        use AttendanceStatus::*;
        let events = vec![event(3, Absent), event(10, Present)];

        let pattern = compute(&events);
        assert_eq!(
            pattern.last_attendance_date,
            Some(Utc::now().date_naive() - Duration::days(3))
        );
        assert_eq!(pattern.last_attendance_status, Some(Absent));
    }
}
