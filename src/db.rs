use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AttendanceEvent, AttendancePattern, FollowUpSuggestion, RecordAttendance, SuggestionCategory,
    SuggestionDraft, SuggestionStatus,
};
use crate::store::Store;

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store. All tables live in the `attendance_followup` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn event_from_row(row: &PgRow) -> Result<AttendanceEvent> {
    Ok(AttendanceEvent {
        id: row.get("id"),
        group_id: row.get("group_id"),
        participant_id: row.get("participant_id"),
        class_date: row.get("class_date"),
        status: row.get::<String, _>("status").parse()?,
        note: row.get("note"),
        recorded_by: row.get("recorded_by"),
        recorded_at: row.get("recorded_at"),
    })
}

fn pattern_from_row(row: &PgRow) -> Result<AttendancePattern> {
    let last_attendance_status = row
        .get::<Option<String>, _>("last_attendance_status")
        .map(|s| s.parse())
        .transpose()?;

    Ok(AttendancePattern {
        group_id: row.get("group_id"),
        participant_id: row.get("participant_id"),
        total_classes_held: row.get("total_classes_held"),
        total_present: row.get("total_present"),
        total_absent: row.get("total_absent"),
        total_excused: row.get("total_excused"),
        total_late: row.get("total_late"),
        attendance_rate: row.get("attendance_rate"),
        consecutive_absences: row.get("consecutive_absences"),
        consecutive_presences: row.get("consecutive_presences"),
        last_attendance_date: row.get("last_attendance_date"),
        last_attendance_status,
        last_4_weeks_rate: row.get("last_4_weeks_rate"),
        last_8_weeks_rate: row.get("last_8_weeks_rate"),
        trend_direction: row.get::<String, _>("trend_direction").parse()?,
        last_calculated_at: row.get("last_calculated_at"),
    })
}

fn suggestion_from_row(row: &PgRow) -> Result<FollowUpSuggestion> {
    Ok(FollowUpSuggestion {
        id: row.get("id"),
        group_id: row.get("group_id"),
        participant_id: row.get("participant_id"),
        category: row.get::<String, _>("category").parse()?,
        priority: row.get::<String, _>("priority").parse()?,
        title: row.get("title"),
        description: row.get("description"),
        suggested_action: row.get("suggested_action"),
        trigger_reason: row.get("trigger_reason"),
        trigger_data: serde_json::from_str(&row.get::<String, _>("trigger_data"))?,
        due_date: row.get("due_date"),
        status: row.get::<String, _>("status").parse()?,
        assigned_to: row.get("assigned_to"),
        contact_method: row.get("contact_method"),
        contact_notes: row.get("contact_notes"),
        contacted_at: row.get("contacted_at"),
        resolution: row.get("resolution"),
        outcome: row.get("outcome"),
        resolved_at: row.get("resolved_at"),
        created_at: row.get("created_at"),
    })
}

const SUGGESTION_COLUMNS: &str = "id, group_id, participant_id, category, priority, title, \
     description, suggested_action, trigger_reason, trigger_data, due_date, status, \
     assigned_to, contact_method, contact_notes, contacted_at, resolution, outcome, \
     resolved_at, created_at";

impl Store for PgStore {
    async fn list_events(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
    ) -> Result<Vec<AttendanceEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, group_id, participant_id, class_date, status, note, recorded_by, recorded_at
            FROM attendance_followup.attendance_events
            WHERE group_id = $1 AND participant_id = $2
            ORDER BY class_date DESC
            "#,
        )
        .bind(group_id)
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn upsert_event(&self, input: &RecordAttendance) -> Result<AttendanceEvent> {
        let row = sqlx::query(
            r#"
            INSERT INTO attendance_followup.attendance_events
                (id, group_id, participant_id, class_date, status, note, recorded_by, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (group_id, participant_id, class_date) DO UPDATE
            SET status = EXCLUDED.status,
                note = EXCLUDED.note,
                recorded_by = EXCLUDED.recorded_by,
                recorded_at = EXCLUDED.recorded_at
            RETURNING id, group_id, participant_id, class_date, status, note, recorded_by, recorded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.group_id)
        .bind(input.participant_id)
        .bind(input.class_date)
        .bind(input.status.as_str())
        .bind(input.note.as_deref())
        .bind(input.recorded_by)
        .fetch_one(&self.pool)
        .await?;

        event_from_row(&row)
    }

    async fn upsert_pattern(&self, pattern: &AttendancePattern) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendance_followup.attendance_patterns
                (group_id, participant_id, total_classes_held, total_present, total_absent,
                 total_excused, total_late, attendance_rate, consecutive_absences,
                 consecutive_presences, last_attendance_date, last_attendance_status,
                 last_4_weeks_rate, last_8_weeks_rate, trend_direction, last_calculated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (group_id, participant_id) DO UPDATE
            SET total_classes_held = EXCLUDED.total_classes_held,
                total_present = EXCLUDED.total_present,
                total_absent = EXCLUDED.total_absent,
                total_excused = EXCLUDED.total_excused,
                total_late = EXCLUDED.total_late,
                attendance_rate = EXCLUDED.attendance_rate,
                consecutive_absences = EXCLUDED.consecutive_absences,
                consecutive_presences = EXCLUDED.consecutive_presences,
                last_attendance_date = EXCLUDED.last_attendance_date,
                last_attendance_status = EXCLUDED.last_attendance_status,
                last_4_weeks_rate = EXCLUDED.last_4_weeks_rate,
                last_8_weeks_rate = EXCLUDED.last_8_weeks_rate,
                trend_direction = EXCLUDED.trend_direction,
                last_calculated_at = EXCLUDED.last_calculated_at
            "#,
        )
        .bind(pattern.group_id)
        .bind(pattern.participant_id)
        .bind(pattern.total_classes_held)
        .bind(pattern.total_present)
        .bind(pattern.total_absent)
        .bind(pattern.total_excused)
        .bind(pattern.total_late)
        .bind(pattern.attendance_rate)
        .bind(pattern.consecutive_absences)
        .bind(pattern.consecutive_presences)
        .bind(pattern.last_attendance_date)
        .bind(pattern.last_attendance_status.map(|s| s.as_str()))
        .bind(pattern.last_4_weeks_rate)
        .bind(pattern.last_8_weeks_rate)
        .bind(pattern.trend_direction.as_str())
        .bind(pattern.last_calculated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_patterns(&self, group_id: Uuid) -> Result<Vec<AttendancePattern>> {
        let rows = sqlx::query(
            r#"
            SELECT group_id, participant_id, total_classes_held, total_present, total_absent,
                   total_excused, total_late, attendance_rate, consecutive_absences,
                   consecutive_presences, last_attendance_date, last_attendance_status,
                   last_4_weeks_rate, last_8_weeks_rate, trend_direction, last_calculated_at
            FROM attendance_followup.attendance_patterns
            WHERE group_id = $1
            ORDER BY attendance_rate ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(pattern_from_row).collect()
    }

    async fn find_open_suggestion(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
        category: SuggestionCategory,
    ) -> Result<Option<FollowUpSuggestion>> {
        let query = format!(
            "SELECT {SUGGESTION_COLUMNS} \
             FROM attendance_followup.follow_up_suggestions \
             WHERE group_id = $1 AND participant_id = $2 AND category = $3 \
               AND status IN ('PENDING', 'IN_PROGRESS') \
             LIMIT 1"
        );

        let row = sqlx::query(&query)
            .bind(group_id)
            .bind(participant_id)
            .bind(category.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(suggestion_from_row).transpose()
    }

    async fn latest_suggestion_created_at(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
        category: SuggestionCategory,
    ) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
            SELECT created_at
            FROM attendance_followup.follow_up_suggestions
            WHERE group_id = $1 AND participant_id = $2 AND category = $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(group_id)
        .bind(participant_id)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("created_at")))
    }

    async fn create_suggestion(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
        draft: &SuggestionDraft,
    ) -> Result<FollowUpSuggestion> {
        let query = format!(
            "INSERT INTO attendance_followup.follow_up_suggestions \
                (id, group_id, participant_id, category, priority, title, description, \
                 suggested_action, trigger_reason, trigger_data, due_date, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'PENDING', now()) \
             RETURNING {SUGGESTION_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(group_id)
            .bind(participant_id)
            .bind(draft.category.as_str())
            .bind(draft.priority.as_str())
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(&draft.suggested_action)
            .bind(&draft.trigger_reason)
            .bind(draft.trigger_data.to_string())
            .bind(draft.due_date)
            .fetch_one(&self.pool)
            .await?;

        suggestion_from_row(&row)
    }

    async fn list_suggestions(
        &self,
        group_id: Option<Uuid>,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<FollowUpSuggestion>> {
        let mut query = format!(
            "SELECT {SUGGESTION_COLUMNS} \
             FROM attendance_followup.follow_up_suggestions \
             WHERE 1 = 1"
        );

        let mut next_param = 1;
        if group_id.is_some() {
            query.push_str(&format!(" AND group_id = ${next_param}"));
            next_param += 1;
        }
        if status.is_some() {
            query.push_str(&format!(" AND status = ${next_param}"));
        }
        query.push_str(" ORDER BY created_at DESC");

        let mut rows = sqlx::query(&query);
        if let Some(group_id) = group_id {
            rows = rows.bind(group_id);
        }
        if let Some(status) = status {
            rows = rows.bind(status.as_str());
        }

        let records = rows.fetch_all(&self.pool).await?;
        records.iter().map(suggestion_from_row).collect()
    }

    async fn get_suggestion(&self, id: Uuid) -> Result<Option<FollowUpSuggestion>> {
        let query = format!(
            "SELECT {SUGGESTION_COLUMNS} \
             FROM attendance_followup.follow_up_suggestions \
             WHERE id = $1"
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(suggestion_from_row).transpose()
    }

    async fn update_suggestion(&self, suggestion: &FollowUpSuggestion) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE attendance_followup.follow_up_suggestions
            SET status = $2,
                assigned_to = $3,
                contact_method = $4,
                contact_notes = $5,
                contacted_at = $6,
                resolution = $7,
                outcome = $8,
                resolved_at = $9
            WHERE id = $1
            "#,
        )
        .bind(suggestion.id)
        .bind(suggestion.status.as_str())
        .bind(suggestion.assigned_to)
        .bind(suggestion.contact_method.as_deref())
        .bind(suggestion.contact_notes.as_deref())
        .bind(suggestion.contacted_at)
        .bind(suggestion.resolution.as_deref())
        .bind(suggestion.outcome.as_deref())
        .bind(suggestion.resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Insert demo attendance histories for one group. Dates are placed relative
/// to today so each participant lands in a different rule category once their
/// pattern is recalculated. Returns the (group, participant) pairs touched.
pub async fn seed(store: &PgStore) -> Result<Vec<(Uuid, Uuid)>> {
    use crate::models::AttendanceStatus::{Absent, Late, Present};

    let group = Uuid::parse_str("7c9a4b1e-52d3-4f6a-9c0d-8e2b5a7f3d14")?;
    let fading = Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?;
    let long_gone = Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?;
    let steady = Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?;

    let today = Utc::now().date_naive();
    let histories: Vec<(Uuid, Vec<(i64, crate::models::AttendanceStatus)>)> = vec![
        // Was regular, now three straight absences.
        (
            fading,
            vec![
                (49, Present),
                (42, Present),
                (35, Present),
                (28, Late),
                (21, Absent),
                (14, Absent),
                (7, Absent),
            ],
        ),
        // Nothing recorded for over six weeks.
        (
            long_gone,
            vec![(63, Present), (56, Present), (49, Absent)],
        ),
        // Healthy attender.
        (
            steady,
            vec![
                (35, Present),
                (28, Present),
                (21, Late),
                (14, Present),
                (7, Present),
            ],
        ),
    ];

    let mut pairs = Vec::new();
    for (participant, history) in histories {
        for (days_ago, status) in history {
            store
                .upsert_event(&RecordAttendance {
                    group_id: group,
                    participant_id: participant,
                    class_date: today - Duration::days(days_ago),
                    status,
                    note: None,
                    recorded_by: None,
                })
                .await?;
        }
        pairs.push((group, participant));
    }

    Ok(pairs)
}
