use std::fmt::Write;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{AttendancePattern, FollowUpSuggestion};

pub fn build_report(
    group_id: Uuid,
    generated_on: NaiveDate,
    patterns: &[AttendancePattern],
    suggestions: &[FollowUpSuggestion],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Follow-Up Report");
    let _ = writeln!(output, "Group {group_id}, generated {generated_on}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## At-Risk Participants");

    let mut ranked: Vec<&AttendancePattern> = patterns.iter().collect();
    ranked.sort_by(|a, b| {
        a.attendance_rate
            .partial_cmp(&b.attendance_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if ranked.is_empty() {
        let _ = writeln!(output, "No attendance recorded for this group.");
    } else {
        for pattern in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {:.1}% over {} classes, trend {}, {}",
                pattern.participant_id,
                pattern.attendance_rate,
                pattern.total_classes_held,
                pattern.trend_direction.as_str(),
                streak_label(pattern)
            );
        }
    }

    let mut open: Vec<&FollowUpSuggestion> = suggestions
        .iter()
        .filter(|s| s.group_id == group_id && s.status.is_open())
        .collect();
    open.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.due_date.cmp(&b.due_date)));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Open Follow-Ups");

    if open.is_empty() {
        let _ = writeln!(output, "No open follow-ups for this group.");
    } else {
        for suggestion in open {
            let _ = writeln!(
                output,
                "- [{}] {}: {} (participant {}, due {})",
                suggestion.priority.as_str(),
                suggestion.category.as_str(),
                suggestion.title,
                suggestion.participant_id,
                suggestion.due_date
            );
        }
    }

    output
}

fn streak_label(pattern: &AttendancePattern) -> String {
    if pattern.consecutive_absences > 0 {
        format!("{} consecutive absences", pattern.consecutive_absences)
    } else if pattern.consecutive_presences > 0 {
        format!("{} consecutive presences", pattern.consecutive_presences)
    } else {
        "no current streak".to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::models::{
        AttendanceStatus, SuggestionCategory, SuggestionPriority, SuggestionStatus, TrendDirection,
    };

    fn pattern(rate: f64, absences: i64) -> AttendancePattern {
        AttendancePattern {
            group_id: Uuid::nil(),
            participant_id: Uuid::new_v4(),
            total_classes_held: 8,
            total_present: 4,
            total_absent: 4,
            total_excused: 0,
            total_late: 0,
            attendance_rate: rate,
            consecutive_absences: absences,
            consecutive_presences: 0,
            last_attendance_date: Some(Utc::now().date_naive()),
            last_attendance_status: Some(AttendanceStatus::Absent),
            last_4_weeks_rate: rate,
            last_8_weeks_rate: rate,
            trend_direction: TrendDirection::Stable,
            last_calculated_at: Utc::now(),
        }
    }

    fn suggestion(priority: SuggestionPriority, status: SuggestionStatus) -> FollowUpSuggestion {
        FollowUpSuggestion {
            id: Uuid::new_v4(),
            group_id: Uuid::nil(),
            participant_id: Uuid::new_v4(),
            category: SuggestionCategory::ConsecutiveAbsences,
            priority,
            title: "Missed 3 classes in a row".to_string(),
            description: String::new(),
            suggested_action: String::new(),
            trigger_reason: String::new(),
            trigger_data: json!({}),
            due_date: Utc::now().date_naive() + Duration::days(7),
            status,
            assigned_to: None,
            contact_method: None,
            contact_notes: None,
            contacted_at: None,
            resolution: None,
            outcome: None,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn closed_suggestions_are_left_out() {
        let report = build_report(
            Uuid::nil(),
            Utc::now().date_naive(),
            &[pattern(50.0, 2)],
            &[
                suggestion(SuggestionPriority::Medium, SuggestionStatus::Resolved),
                suggestion(SuggestionPriority::Low, SuggestionStatus::Dismissed),
            ],
        );
        assert!(report.contains("No open follow-ups"));
    }

    #[test]
    fn urgent_items_come_first() {
        let report = build_report(
            Uuid::nil(),
            Utc::now().date_naive(),
            &[],
            &[
                suggestion(SuggestionPriority::Low, SuggestionStatus::Pending),
                suggestion(SuggestionPriority::Urgent, SuggestionStatus::InProgress),
            ],
        );
        let urgent = report.find("[URGENT]").unwrap();
        let low = report.find("[LOW]").unwrap();
        assert!(urgent < low);
    }

    #[test]
    fn participants_rank_by_ascending_rate() {
        let low = pattern(20.0, 4);
        let high = pattern(90.0, 0);
        let report = build_report(
            Uuid::nil(),
            Utc::now().date_naive(),
            &[high.clone(), low.clone()],
            &[],
        );
        let low_pos = report.find(&low.participant_id.to_string()).unwrap();
        let high_pos = report.find(&high.participant_id.to_string()).unwrap();
        assert!(low_pos < high_pos);
    }
}
