use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AttendanceEvent, AttendancePattern, FollowUpSuggestion, RecordAttendance, SuggestionCategory,
    SuggestionDraft, SuggestionStatus,
};

/// Storage boundary for the engine. Injected explicitly so the pipeline can be
/// exercised against an in-memory implementation in tests.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Every event for the pair, ordered by class date descending.
    async fn list_events(&self, group_id: Uuid, participant_id: Uuid)
        -> Result<Vec<AttendanceEvent>>;

    /// Create the event or overwrite status/note/recorded_by for an existing
    /// (group, participant, class_date) key.
    async fn upsert_event(&self, input: &RecordAttendance) -> Result<AttendanceEvent>;

    /// Overwrite the derived profile in place, creating it on first write.
    async fn upsert_pattern(&self, pattern: &AttendancePattern) -> Result<()>;

    async fn list_patterns(&self, group_id: Uuid) -> Result<Vec<AttendancePattern>>;

    async fn find_open_suggestion(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
        category: SuggestionCategory,
    ) -> Result<Option<FollowUpSuggestion>>;

    /// Creation time of the most recent suggestion of the category for the
    /// pair, regardless of status.
    async fn latest_suggestion_created_at(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
        category: SuggestionCategory,
    ) -> Result<Option<DateTime<Utc>>>;

    async fn create_suggestion(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
        draft: &SuggestionDraft,
    ) -> Result<FollowUpSuggestion>;

    async fn list_suggestions(
        &self,
        group_id: Option<Uuid>,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<FollowUpSuggestion>>;

    async fn get_suggestion(&self, id: Uuid) -> Result<Option<FollowUpSuggestion>>;

    async fn update_suggestion(&self, suggestion: &FollowUpSuggestion) -> Result<()>;
}
