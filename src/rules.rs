use chrono::{Duration, NaiveDate};
use serde_json::json;

use crate::models::{
    AttendancePattern, AttendanceStatus, SuggestionCategory, SuggestionDraft, SuggestionPriority,
    TrendDirection,
};

const CONSECUTIVE_ABSENCE_THRESHOLD: i64 = 3;
const LOW_RATE_THRESHOLD: f64 = 50.0;
const LOW_RATE_MIN_CLASSES: i64 = 4;
const DECLINING_RECENT_RATE_CEILING: f64 = 60.0;
const FIRST_ABSENCE_PRIOR_STREAK: i64 = 5;
const LONG_TERM_ABSENT_DAYS: i64 = 42;

/// How a category guards against duplicate suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Skip while an open (PENDING/IN_PROGRESS) suggestion of the category exists.
    OpenOfCategory,
    /// Skip while any suggestion of the category was created within the window,
    /// regardless of its status.
    CreatedWithinDays(i64),
}

pub fn dedup_policy(category: SuggestionCategory) -> DedupPolicy {
    match category {
        // First-time absences resolve quickly, so an already-dismissed one
        // would otherwise retrigger on every recompute for a week.
        SuggestionCategory::FirstTimeAbsence => DedupPolicy::CreatedWithinDays(7),
        _ => DedupPolicy::OpenOfCategory,
    }
}

/// Everything a rule pass evaluates: the freshly computed profile snapshot
/// plus the non-persisted presence streak behind the current absence run.
pub struct RuleContext<'a> {
    pub pattern: &'a AttendancePattern,
    pub prior_presence_streak: i64,
    pub today: NaiveDate,
}

/// Evaluate the five rules in order against one immutable snapshot. Rules are
/// independent; a profile may trigger several categories in the same pass.
/// Dedup against existing suggestions happens in the engine, per category.
pub fn evaluate_rules(ctx: &RuleContext) -> Vec<SuggestionDraft> {
    [
        consecutive_absences(ctx),
        low_attendance_rate(ctx),
        declining_trend(ctx),
        first_time_absence(ctx),
        long_term_absent(ctx),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn consecutive_absences(ctx: &RuleContext) -> Option<SuggestionDraft> {
    let p = ctx.pattern;
    if p.consecutive_absences < CONSECUTIVE_ABSENCE_THRESHOLD {
        return None;
    }

    let priority = match p.consecutive_absences {
        3 => SuggestionPriority::Medium,
        4 => SuggestionPriority::High,
        _ => SuggestionPriority::Urgent,
    };

    Some(SuggestionDraft {
        category: SuggestionCategory::ConsecutiveAbsences,
        priority,
        title: format!("Missed {} classes in a row", p.consecutive_absences),
        description: format!(
            "This participant has been absent for {} consecutive classes. Their overall attendance rate is {:.1}%.",
            p.consecutive_absences, p.attendance_rate
        ),
        suggested_action: "Reach out personally this week to check in and ask whether anything is keeping them from attending.".to_string(),
        trigger_reason: format!("{} consecutive absences", p.consecutive_absences),
        trigger_data: json!({
            "consecutive_absences": p.consecutive_absences,
            "attendance_rate": p.attendance_rate,
            "last_attendance_date": p.last_attendance_date,
        }),
        due_date: ctx.today + Duration::days(7),
    })
}

fn low_attendance_rate(ctx: &RuleContext) -> Option<SuggestionDraft> {
    let p = ctx.pattern;
    // Minimum sample size guards against false positives from 1-3 class histories.
    if p.attendance_rate >= LOW_RATE_THRESHOLD || p.total_classes_held < LOW_RATE_MIN_CLASSES {
        return None;
    }

    let priority = if p.attendance_rate < 30.0 {
        SuggestionPriority::High
    } else {
        SuggestionPriority::Medium
    };

    Some(SuggestionDraft {
        category: SuggestionCategory::LowAttendanceRate,
        priority,
        title: "Low overall attendance".to_string(),
        description: format!(
            "Attendance rate is {:.1}% across {} recorded classes.",
            p.attendance_rate, p.total_classes_held
        ),
        suggested_action: "Have a conversation about their experience of the group and whether the meeting time still works for them.".to_string(),
        trigger_reason: format!(
            "attendance rate {:.1}% across {} classes",
            p.attendance_rate, p.total_classes_held
        ),
        trigger_data: json!({
            "attendance_rate": p.attendance_rate,
            "total_classes_held": p.total_classes_held,
            "total_present": p.total_present,
            "total_late": p.total_late,
        }),
        due_date: ctx.today + Duration::days(14),
    })
}

fn declining_trend(ctx: &RuleContext) -> Option<SuggestionDraft> {
    let p = ctx.pattern;
    // Momentum alone is not enough; the recent rate must also be low in
    // absolute terms.
    if p.trend_direction != TrendDirection::Declining
        || p.last_4_weeks_rate >= DECLINING_RECENT_RATE_CEILING
    {
        return None;
    }

    Some(SuggestionDraft {
        category: SuggestionCategory::DecliningTrend,
        priority: SuggestionPriority::Medium,
        title: "Attendance is trending down".to_string(),
        description: format!(
            "Attendance over the last 4 weeks ({:.1}%) is well below the prior month ({:.1}%).",
            p.last_4_weeks_rate, p.last_8_weeks_rate
        ),
        suggested_action: "Check in casually before the decline settles into a pattern.".to_string(),
        trigger_reason: format!(
            "4-week rate {:.1}% vs prior {:.1}%",
            p.last_4_weeks_rate, p.last_8_weeks_rate
        ),
        trigger_data: json!({
            "last_4_weeks_rate": p.last_4_weeks_rate,
            "last_8_weeks_rate": p.last_8_weeks_rate,
            "trend_direction": p.trend_direction.as_str(),
        }),
        due_date: ctx.today + Duration::days(7),
    })
}

fn first_time_absence(ctx: &RuleContext) -> Option<SuggestionDraft> {
    let p = ctx.pattern;
    if p.consecutive_absences != 1
        || ctx.prior_presence_streak < FIRST_ABSENCE_PRIOR_STREAK
        || p.last_attendance_status != Some(AttendanceStatus::Absent)
    {
        return None;
    }

    Some(SuggestionDraft {
        category: SuggestionCategory::FirstTimeAbsence,
        priority: SuggestionPriority::Low,
        title: "First absence after a regular stretch".to_string(),
        description: format!(
            "First recorded absence after {} consecutive presences.",
            ctx.prior_presence_streak
        ),
        suggested_action: "Send a quick note letting them know they were missed.".to_string(),
        trigger_reason: format!(
            "first absence after {} straight presences",
            ctx.prior_presence_streak
        ),
        trigger_data: json!({
            "consecutive_absences": p.consecutive_absences,
            "prior_presence_streak": ctx.prior_presence_streak,
            "last_attendance_date": p.last_attendance_date,
        }),
        due_date: ctx.today + Duration::days(3),
    })
}

fn long_term_absent(ctx: &RuleContext) -> Option<SuggestionDraft> {
    let p = ctx.pattern;
    let last_date = p.last_attendance_date?;
    if last_date >= ctx.today - Duration::days(LONG_TERM_ABSENT_DAYS) {
        return None;
    }

    let weeks_since = (ctx.today - last_date).num_days() / 7;

    Some(SuggestionDraft {
        category: SuggestionCategory::LongTermAbsent,
        priority: SuggestionPriority::Urgent,
        title: format!("No attendance recorded in {} weeks", weeks_since),
        description: format!(
            "The last attendance record for this participant is from {} ({} weeks ago).",
            last_date, weeks_since
        ),
        suggested_action: "Make personal contact to re-invite them and ask whether they want to stay in the group.".to_string(),
        trigger_reason: format!("no record for {} weeks", weeks_since),
        trigger_data: json!({
            "last_attendance_date": last_date,
            "weeks_since_attendance": weeks_since,
        }),
        due_date: ctx.today + Duration::days(3),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn base_pattern() -> AttendancePattern {
        AttendancePattern {
            group_id: Uuid::nil(),
            participant_id: Uuid::nil(),
            total_classes_held: 10,
            total_present: 8,
            total_absent: 2,
            total_excused: 0,
            total_late: 0,
            attendance_rate: 80.0,
            consecutive_absences: 0,
            consecutive_presences: 3,
            last_attendance_date: Some(Utc::now().date_naive() - Duration::days(7)),
            last_attendance_status: Some(AttendanceStatus::Present),
            last_4_weeks_rate: 75.0,
            last_8_weeks_rate: 80.0,
            trend_direction: TrendDirection::Stable,
            last_calculated_at: Utc::now(),
        }
    }

    fn drafts_for(pattern: &AttendancePattern, prior_streak: i64) -> Vec<SuggestionDraft> {
        evaluate_rules(&RuleContext {
            pattern,
            prior_presence_streak: prior_streak,
            today: Utc::now().date_naive(),
        })
    }

    #[test]
    fn healthy_profile_triggers_nothing() {
        assert!(drafts_for(&base_pattern(), 0).is_empty());
    }

    #[test]
    fn consecutive_absence_priority_tiers() {
        let today = Utc::now().date_naive();
        for (streak, priority) in [
            (3, SuggestionPriority::Medium),
            (4, SuggestionPriority::High),
            (5, SuggestionPriority::Urgent),
            (9, SuggestionPriority::Urgent),
        ] {
            let mut pattern = base_pattern();
            pattern.consecutive_absences = streak;
            pattern.consecutive_presences = 0;
            pattern.last_attendance_status = Some(AttendanceStatus::Absent);

            let drafts = drafts_for(&pattern, 0);
            let draft = drafts
                .iter()
                .find(|d| d.category == SuggestionCategory::ConsecutiveAbsences)
                .unwrap_or_else(|| panic!("no draft for streak {streak}"));
            assert_eq!(draft.priority, priority, "streak {streak}");
            assert_eq!(draft.due_date, today + Duration::days(7));
        }
    }

    #[test]
    fn two_absences_do_not_trigger() {
        let mut pattern = base_pattern();
        pattern.consecutive_absences = 2;
        pattern.consecutive_presences = 0;
        assert!(drafts_for(&pattern, 0)
            .iter()
            .all(|d| d.category != SuggestionCategory::ConsecutiveAbsences));
    }

    #[test]
    fn low_rate_requires_minimum_sample() {
        let mut pattern = base_pattern();
        pattern.attendance_rate = 33.3;
        pattern.total_classes_held = 3;
        assert!(drafts_for(&pattern, 0)
            .iter()
            .all(|d| d.category != SuggestionCategory::LowAttendanceRate));

        pattern.total_classes_held = 4;
        let drafts = drafts_for(&pattern, 0);
        let draft = drafts
            .iter()
            .find(|d| d.category == SuggestionCategory::LowAttendanceRate)
            .expect("low rate with 4 classes should trigger");
        assert_eq!(draft.priority, SuggestionPriority::Medium);
        assert_eq!(draft.due_date, Utc::now().date_naive() + Duration::days(14));
    }

    #[test]
    fn very_low_rate_escalates_to_high() {
        let mut pattern = base_pattern();
        pattern.attendance_rate = 25.0;
        pattern.total_classes_held = 8;
        let drafts = drafts_for(&pattern, 0);
        let draft = drafts
            .iter()
            .find(|d| d.category == SuggestionCategory::LowAttendanceRate)
            .unwrap();
        assert_eq!(draft.priority, SuggestionPriority::High);
    }

    #[test]
    fn declining_trend_needs_low_recent_rate_too() {
        let mut pattern = base_pattern();
        pattern.trend_direction = TrendDirection::Declining;
        pattern.last_4_weeks_rate = 65.0;
        pattern.last_8_weeks_rate = 90.0;
        assert!(drafts_for(&pattern, 0)
            .iter()
            .all(|d| d.category != SuggestionCategory::DecliningTrend));

        pattern.last_4_weeks_rate = 40.0;
        let drafts = drafts_for(&pattern, 0);
        let draft = drafts
            .iter()
            .find(|d| d.category == SuggestionCategory::DecliningTrend)
            .unwrap();
        assert_eq!(draft.priority, SuggestionPriority::Medium);
    }

    #[test]
    fn first_absence_needs_a_prior_streak_of_five() {
        let mut pattern = base_pattern();
        pattern.consecutive_absences = 1;
        pattern.consecutive_presences = 0;
        pattern.last_attendance_status = Some(AttendanceStatus::Absent);

        assert!(drafts_for(&pattern, 4)
            .iter()
            .all(|d| d.category != SuggestionCategory::FirstTimeAbsence));

        let drafts = drafts_for(&pattern, 5);
        let draft = drafts
            .iter()
            .find(|d| d.category == SuggestionCategory::FirstTimeAbsence)
            .unwrap();
        assert_eq!(draft.priority, SuggestionPriority::Low);
        assert_eq!(draft.due_date, Utc::now().date_naive() + Duration::days(3));
    }

    #[test]
    fn long_term_absence_boundary_is_strict() {
        let today = Utc::now().date_naive();
        let mut pattern = base_pattern();

        pattern.last_attendance_date = Some(today - Duration::days(42));
        assert!(drafts_for(&pattern, 0)
            .iter()
            .all(|d| d.category != SuggestionCategory::LongTermAbsent));

        pattern.last_attendance_date = Some(today - Duration::days(49));
        let drafts = drafts_for(&pattern, 0);
        let draft = drafts
            .iter()
            .find(|d| d.category == SuggestionCategory::LongTermAbsent)
            .unwrap();
        assert_eq!(draft.priority, SuggestionPriority::Urgent);
        assert_eq!(draft.trigger_data["weeks_since_attendance"], 7);
    }

    #[test]
    fn one_profile_can_trigger_multiple_categories() {
        let mut pattern = base_pattern();
        pattern.total_classes_held = 8;
        pattern.total_present = 1;
        pattern.total_late = 1;
        pattern.total_absent = 6;
        pattern.attendance_rate = 25.0;
        pattern.consecutive_absences = 6;
        pattern.consecutive_presences = 0;
        pattern.last_attendance_status = Some(AttendanceStatus::Absent);
        pattern.last_attendance_date =
            Some(Utc::now().date_naive() - Duration::days(7));

        let drafts = drafts_for(&pattern, 0);
        let categories: Vec<_> = drafts.iter().map(|d| d.category).collect();
        assert!(categories.contains(&SuggestionCategory::ConsecutiveAbsences));
        assert!(categories.contains(&SuggestionCategory::LowAttendanceRate));
        assert!(!categories.contains(&SuggestionCategory::LongTermAbsent));
    }

    #[test]
    fn dedup_policy_is_category_specific() {
        assert_eq!(
            dedup_policy(SuggestionCategory::FirstTimeAbsence),
            DedupPolicy::CreatedWithinDays(7)
        );
        assert_eq!(
            dedup_policy(SuggestionCategory::ConsecutiveAbsences),
            DedupPolicy::OpenOfCategory
        );
        assert_eq!(
            dedup_policy(SuggestionCategory::LongTermAbsent),
            DedupPolicy::OpenOfCategory
        );
    }
}
