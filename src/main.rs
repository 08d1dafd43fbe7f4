use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod db;
mod engine;
mod error;
mod models;
mod pattern;
mod report;
mod rules;
mod store;

use engine::FollowUpEngine;
use models::{BulkEntry, FollowUpPatch, RecordAttendance};
use store::Store;

#[derive(Parser)]
#[command(name = "attendance-followup")]
#[command(about = "Attendance pattern analyzer and follow-up engine for group leaders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic demo data and recalculate its patterns
    Seed,
    /// Record attendance for one participant
    Record {
        #[arg(long)]
        group: Uuid,
        #[arg(long)]
        participant: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        status: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        recorded_by: Option<Uuid>,
    },
    /// Record a whole class sheet from a CSV of participant_id,status,note
    Bulk {
        #[arg(long)]
        group: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Recompute one participant's pattern without recording anything
    Recalculate {
        #[arg(long)]
        group: Uuid,
        #[arg(long)]
        participant: Uuid,
    },
    /// List follow-up suggestions
    Followups {
        #[arg(long)]
        group: Option<Uuid>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Update a follow-up suggestion (status, assignment, contact, resolution)
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        assigned_to: Option<Uuid>,
        #[arg(long)]
        contact_method: Option<String>,
        #[arg(long)]
        contact_notes: Option<String>,
        #[arg(long)]
        resolution: Option<String>,
        #[arg(long)]
        outcome: Option<String>,
    },
    /// Dismiss a follow-up suggestion
    Dismiss {
        #[arg(long)]
        id: Uuid,
    },
    /// Print one follow-up suggestion in full, including its trigger snapshot
    Show {
        #[arg(long)]
        id: Uuid,
    },
    /// Generate a markdown report for a group
    Report {
        #[arg(long)]
        group: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let pg = db::PgStore::new(pool.clone());
    let engine = FollowUpEngine::new(pg.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pairs = db::seed(&pg).await?;
            let mut created = 0usize;
            for (group, participant) in &pairs {
                let outcome = engine.recalculate_pattern(*group, *participant).await?;
                created += outcome.suggestions_created.len();
            }
            println!(
                "Seed data inserted. {} patterns recalculated, {created} follow-ups created.",
                pairs.len()
            );
        }
        Commands::Record {
            group,
            participant,
            date,
            status,
            note,
            recorded_by,
        } => {
            let outcome = engine
                .record_attendance(RecordAttendance {
                    group_id: group,
                    participant_id: participant,
                    class_date: date,
                    status: status.parse()?,
                    note,
                    recorded_by,
                })
                .await?;

            let event = &outcome.event;
            println!(
                "Recorded {} for participant {} in group {} on {} (event {}).",
                event.status.as_str(),
                event.participant_id,
                event.group_id,
                event.class_date,
                event.id
            );
            if let Some(note) = &event.note {
                println!("Note: {note}");
            }
            if let Some(recorded_by) = event.recorded_by {
                println!("Recorded by {recorded_by} at {}.", event.recorded_at);
            }
            println!(
                "Attendance rate {:.1}% ({}), {} new follow-up suggestion(s).",
                outcome.pattern.attendance_rate,
                outcome.pattern.trend_direction.as_str(),
                outcome.suggestions_created.len()
            );
        }
        Commands::Bulk { group, date, csv } => {
            #[derive(serde::Deserialize)]
            struct CsvRow {
                participant_id: Uuid,
                status: String,
                note: Option<String>,
            }

            let mut reader = csv::Reader::from_path(&csv)?;
            let mut entries = Vec::new();
            for result in reader.deserialize::<CsvRow>() {
                let row = result?;
                entries.push(BulkEntry {
                    participant_id: row.participant_id,
                    status: row.status,
                    note: row.note,
                });
            }

            let total = entries.len();
            let outcome = engine.record_bulk_attendance(group, date, entries).await?;
            println!(
                "Recorded {}/{total} entries for {date} from {}.",
                outcome.recorded.len(),
                csv.display()
            );
            for failure in &outcome.failed {
                println!(
                    "- participant {} skipped: {}",
                    failure.participant_id, failure.reason
                );
            }
        }
        Commands::Recalculate { group, participant } => {
            let outcome = engine.recalculate_pattern(group, participant).await?;
            let p = &outcome.pattern;
            println!(
                "Participant {participant}: {:.1}% over {} classes ({}), 4-week {:.1}% vs prior {:.1}%.",
                p.attendance_rate,
                p.total_classes_held,
                p.trend_direction.as_str(),
                p.last_4_weeks_rate,
                p.last_8_weeks_rate
            );
            if outcome.suggestions_created.is_empty() {
                println!("No new follow-ups.");
            }
            for suggestion in &outcome.suggestions_created {
                println!(
                    "- [{}] {}: {}",
                    suggestion.priority.as_str(),
                    suggestion.category.as_str(),
                    suggestion.title
                );
            }
        }
        Commands::Followups { group, status } => {
            let status = status.map(|s| s.parse()).transpose()?;
            let suggestions = engine.list_follow_ups(group, status).await?;

            if suggestions.is_empty() {
                println!("No follow-ups found.");
            }
            for suggestion in suggestions {
                println!(
                    "- {} [{}] {} participant {} due {} ({}): {}",
                    suggestion.id,
                    suggestion.priority.as_str(),
                    suggestion.category.as_str(),
                    suggestion.participant_id,
                    suggestion.due_date,
                    suggestion.status.as_str(),
                    suggestion.title
                );
                println!("    {}", suggestion.suggested_action);
            }
        }
        Commands::Update {
            id,
            status,
            assigned_to,
            contact_method,
            contact_notes,
            resolution,
            outcome,
        } => {
            let patch = FollowUpPatch {
                status: status.map(|s| s.parse()).transpose()?,
                assigned_to,
                contact_method,
                contact_notes,
                resolution,
                outcome,
            };
            let updated = engine.update_follow_up(id, patch).await?;
            println!(
                "Follow-up {} is now {}.",
                updated.id,
                updated.status.as_str()
            );
        }
        Commands::Dismiss { id } => {
            let dismissed = engine.dismiss_follow_up(id).await?;
            println!("Follow-up {} dismissed.", dismissed.id);
        }
        Commands::Show { id } => {
            let suggestion = engine
                .store()
                .get_suggestion(id)
                .await?
                .with_context(|| format!("follow-up suggestion {id} not found"))?;

            println!(
                "[{}] {}: {} ({})",
                suggestion.priority.as_str(),
                suggestion.category.as_str(),
                suggestion.title,
                suggestion.status.as_str()
            );
            println!(
                "Group {}, participant {}, created {}, due {}.",
                suggestion.group_id,
                suggestion.participant_id,
                suggestion.created_at.date_naive(),
                suggestion.due_date
            );
            println!("{}", suggestion.description);
            println!("Suggested action: {}", suggestion.suggested_action);
            println!("Trigger: {}", suggestion.trigger_reason);
            println!("Trigger data: {}", suggestion.trigger_data);
            if let Some(assigned_to) = suggestion.assigned_to {
                println!("Assigned to {assigned_to}.");
            }
            if let Some(contacted_at) = suggestion.contacted_at {
                println!(
                    "Contacted {} via {}{}.",
                    contacted_at.date_naive(),
                    suggestion.contact_method.as_deref().unwrap_or("unknown"),
                    suggestion
                        .contact_notes
                        .as_deref()
                        .map(|n| format!(": {n}"))
                        .unwrap_or_default()
                );
            }
            if let Some(resolved_at) = suggestion.resolved_at {
                println!(
                    "Closed {}: {}{}",
                    resolved_at.date_naive(),
                    suggestion.resolution.as_deref().unwrap_or("no resolution recorded"),
                    suggestion
                        .outcome
                        .as_deref()
                        .map(|o| format!(" (outcome: {o})"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Report { group, out } => {
            let patterns = engine.store().list_patterns(group).await?;
            let suggestions = engine.store().list_suggestions(Some(group), None).await?;
            let report = report::build_report(
                group,
                Utc::now().date_naive(),
                &patterns,
                &suggestions,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
