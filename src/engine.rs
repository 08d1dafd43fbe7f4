use chrono::{Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{
    AttendanceEvent, AttendancePattern, AttendanceStatus, BulkEntry, FollowUpPatch,
    FollowUpSuggestion, RecordAttendance, SuggestionDraft, SuggestionStatus,
};
use crate::pattern;
use crate::rules::{self, DedupPolicy, RuleContext};
use crate::store::Store;

#[derive(Debug)]
pub struct RecordOutcome {
    pub event: AttendanceEvent,
    pub pattern: AttendancePattern,
    pub suggestions_created: Vec<FollowUpSuggestion>,
}

#[derive(Debug)]
pub struct RecalcOutcome {
    pub pattern: AttendancePattern,
    pub suggestions_created: Vec<FollowUpSuggestion>,
}

#[derive(Debug)]
pub struct BulkFailure {
    pub participant_id: Uuid,
    pub reason: String,
}

/// Partial success is the expected outcome of a bulk sheet, not an error.
#[derive(Debug)]
pub struct BulkOutcome {
    pub recorded: Vec<RecordOutcome>,
    pub failed: Vec<BulkFailure>,
}

pub struct FollowUpEngine<S> {
    store: S,
}

impl<S: Store> FollowUpEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upsert one attendance event, then run the recompute-and-evaluate
    /// pipeline for its pair. Suggestion creation is best-effort; the event
    /// write succeeds regardless of the rule pass.
    pub async fn record_attendance(&self, input: RecordAttendance) -> Result<RecordOutcome> {
        let event = self.store.upsert_event(&input).await?;
        let recalc = self
            .recalculate_pattern(input.group_id, input.participant_id)
            .await?;
        Ok(RecordOutcome {
            event,
            pattern: recalc.pattern,
            suggestions_created: recalc.suggestions_created,
        })
    }

    /// Apply `record_attendance` once per entry, sequentially. A failed entry
    /// is reported and does not roll back the ones already written.
    pub async fn record_bulk_attendance(
        &self,
        group_id: Uuid,
        class_date: chrono::NaiveDate,
        entries: Vec<BulkEntry>,
    ) -> Result<BulkOutcome> {
        let mut recorded = Vec::new();
        let mut failed = Vec::new();

        for entry in entries {
            let status = match entry.status.parse::<AttendanceStatus>() {
                Ok(status) => status,
                Err(err) => {
                    failed.push(BulkFailure {
                        participant_id: entry.participant_id,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let input = RecordAttendance {
                group_id,
                participant_id: entry.participant_id,
                class_date,
                status,
                note: entry.note,
                recorded_by: None,
            };

            match self.record_attendance(input).await {
                Ok(outcome) => recorded.push(outcome),
                Err(err) => failed.push(BulkFailure {
                    participant_id: entry.participant_id,
                    reason: err.to_string(),
                }),
            }
        }

        Ok(BulkOutcome { recorded, failed })
    }

    /// Full recompute from the event history, profile upsert, then the rule
    /// pass against the just-computed snapshot. With zero events this returns
    /// a zeroed profile without persisting anything.
    pub async fn recalculate_pattern(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
    ) -> Result<RecalcOutcome> {
        let events = self.store.list_events(group_id, participant_id).await?;
        let now = Utc::now();
        let today = now.date_naive();
        let pattern = pattern::compute_pattern(group_id, participant_id, &events, today, now);

        if events.is_empty() {
            return Ok(RecalcOutcome {
                pattern,
                suggestions_created: Vec::new(),
            });
        }

        self.store.upsert_pattern(&pattern).await?;

        let ctx = RuleContext {
            pattern: &pattern,
            prior_presence_streak: pattern::prior_presence_streak(&events),
            today,
        };

        let mut suggestions_created = Vec::new();
        for draft in rules::evaluate_rules(&ctx) {
            // Each category is isolated: a failure here is logged and skipped
            // so the remaining rules still run and the attendance write never
            // fails on suggestion generation.
            match self.apply_draft(group_id, participant_id, &draft).await {
                Ok(Some(suggestion)) => suggestions_created.push(suggestion),
                Ok(None) => {}
                Err(err) => warn!(
                    category = draft.category.as_str(),
                    error = %err,
                    "follow-up creation failed; skipping category"
                ),
            }
        }

        Ok(RecalcOutcome {
            pattern,
            suggestions_created,
        })
    }

    async fn apply_draft(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
        draft: &SuggestionDraft,
    ) -> Result<Option<FollowUpSuggestion>> {
        match rules::dedup_policy(draft.category) {
            DedupPolicy::OpenOfCategory => {
                let open = self
                    .store
                    .find_open_suggestion(group_id, participant_id, draft.category)
                    .await?;
                if open.is_some() {
                    return Ok(None);
                }
            }
            DedupPolicy::CreatedWithinDays(days) => {
                let latest = self
                    .store
                    .latest_suggestion_created_at(group_id, participant_id, draft.category)
                    .await?;
                if let Some(created_at) = latest {
                    if created_at > Utc::now() - Duration::days(days) {
                        return Ok(None);
                    }
                }
            }
        }

        let suggestion = self
            .store
            .create_suggestion(group_id, participant_id, draft)
            .await?;
        Ok(Some(suggestion))
    }

    pub async fn list_follow_ups(
        &self,
        group_id: Option<Uuid>,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<FollowUpSuggestion>> {
        Ok(self.store.list_suggestions(group_id, status).await?)
    }

    /// Apply a leader's patch. Supplying a contact method with no explicit
    /// status moves the suggestion to CONTACTED. Contact and resolution
    /// timestamps are stamped once. Transitions are not validated; the status
    /// machine trusts its callers.
    pub async fn update_follow_up(
        &self,
        id: Uuid,
        patch: FollowUpPatch,
    ) -> Result<FollowUpSuggestion> {
        let mut suggestion = self
            .store
            .get_suggestion(id)
            .await?
            .ok_or(EngineError::SuggestionNotFound(id))?;

        let now = Utc::now();

        if patch.contact_method.is_some() && patch.status.is_none() {
            suggestion.status = SuggestionStatus::Contacted;
        }
        if let Some(status) = patch.status {
            suggestion.status = status;
        }
        if let Some(assigned_to) = patch.assigned_to {
            suggestion.assigned_to = Some(assigned_to);
        }
        if let Some(contact_method) = patch.contact_method {
            suggestion.contact_method = Some(contact_method);
        }
        if let Some(contact_notes) = patch.contact_notes {
            suggestion.contact_notes = Some(contact_notes);
        }
        if let Some(resolution) = patch.resolution {
            suggestion.resolution = Some(resolution);
        }
        if let Some(outcome) = patch.outcome {
            suggestion.outcome = Some(outcome);
        }

        if suggestion.status == SuggestionStatus::Contacted && suggestion.contacted_at.is_none() {
            suggestion.contacted_at = Some(now);
        }
        if suggestion.status == SuggestionStatus::Resolved && suggestion.resolved_at.is_none() {
            suggestion.resolved_at = Some(now);
        }

        self.store.update_suggestion(&suggestion).await?;
        Ok(suggestion)
    }

    /// Terminal dismissal, available from any open state.
    pub async fn dismiss_follow_up(&self, id: Uuid) -> Result<FollowUpSuggestion> {
        let mut suggestion = self
            .store
            .get_suggestion(id)
            .await?
            .ok_or(EngineError::SuggestionNotFound(id))?;

        suggestion.status = SuggestionStatus::Dismissed;
        suggestion.resolved_at = Some(Utc::now());

        self.store.update_suggestion(&suggestion).await?;
        Ok(suggestion)
    }
}
