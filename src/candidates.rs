//! Candidate requirement tracking — how far each candidate is toward
//! initiation, per requirement type.
//!
//! Aggregation, not a state machine: automatic counts come from the
//! domain tables, then a per-candidate override row additively adjusts
//! the completed count and can replace the required threshold. Missing
//! rows on either side contribute 0, never an error.

use anyhow::{Context as _, Result};
use sqlx::SqlitePool;

use crate::term::Term;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    Event,
    Challenge,
    ExamFile,
    Resume,
    Manual,
}

impl RequirementType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequirementType::Event => "event",
            RequirementType::Challenge => "challenge",
            RequirementType::ExamFile => "exam_file",
            RequirementType::Resume => "resume",
            RequirementType::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct CandidateRow {
    pub id: i64,
    pub user_id: i64,
    pub term_id: i64,
    pub initiated: bool,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct RequirementRow {
    pub id: i64,
    pub term_id: i64,
    pub requirement_type: String,
    pub name: String,
    pub credits_needed: i64,
    /// Event requirements only: restrict to this event type. NULL = any.
    pub event_type: Option<String>,
    /// Challenge requirements only: restrict to this challenge type.
    pub challenge_type: Option<String>,
}

/// Per-candidate override of one requirement.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct RequirementOverrideRow {
    pub id: i64,
    pub candidate_id: i64,
    pub requirement_id: i64,
    /// Added to the automatically computed completion count.
    pub manually_recorded_credits: i64,
    /// Replaces the requirement's threshold when set.
    pub alternate_credits_needed: Option<i64>,
    pub comments: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ChallengeRow {
    pub id: i64,
    pub candidate_id: i64,
    pub challenge_type: String,
    pub description: String,
    pub verified: bool,
}

/// Candidate tables live beside the engine tables in the same SQLite
/// database; this store shares the pool.
pub struct CandidateStore {
    pool: SqlitePool,
}

impl CandidateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                term_id INTEGER NOT NULL,
                initiated INTEGER NOT NULL DEFAULT 0,
                UNIQUE(user_id, term_id)
            );

            CREATE TABLE IF NOT EXISTS candidate_requirements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                term_id INTEGER NOT NULL,
                requirement_type TEXT NOT NULL,
                name TEXT NOT NULL,
                credits_needed INTEGER NOT NULL,
                event_type TEXT,
                challenge_type TEXT,
                UNIQUE(name, term_id)
            );

            CREATE TABLE IF NOT EXISTS candidate_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                candidate_id INTEGER NOT NULL REFERENCES candidates(id),
                requirement_id INTEGER NOT NULL REFERENCES candidate_requirements(id),
                manually_recorded_credits INTEGER NOT NULL DEFAULT 0,
                alternate_credits_needed INTEGER,
                comments TEXT NOT NULL DEFAULT '',
                UNIQUE(candidate_id, requirement_id)
            );

            CREATE TABLE IF NOT EXISTS challenges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                candidate_id INTEGER NOT NULL REFERENCES candidates(id),
                challenge_type TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                verified INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS resumes (
                user_id INTEGER PRIMARY KEY,
                verified INTEGER NOT NULL DEFAULT 0
            );
            ",
        )
        .execute(&self.pool)
        .await
        .context("Creating candidate tables")?;
        Ok(())
    }

    pub async fn create_candidate(&self, user_id: i64, term: Term) -> Result<CandidateRow> {
        sqlx::query(
            "INSERT INTO candidates (user_id, term_id) VALUES (?, ?) \
             ON CONFLICT(user_id, term_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(term.id())
        .execute(&self.pool)
        .await?;
        Ok(
            sqlx::query_as("SELECT * FROM candidates WHERE user_id = ? AND term_id = ?")
                .bind(user_id)
                .bind(term.id())
                .fetch_one(&self.pool)
                .await?,
        )
    }

    pub async fn create_requirement(
        &self,
        term: Term,
        requirement_type: RequirementType,
        name: &str,
        credits_needed: i64,
        event_type: Option<&str>,
        challenge_type: Option<&str>,
    ) -> Result<RequirementRow> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO candidate_requirements \
             (term_id, requirement_type, name, credits_needed, event_type, challenge_type) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(term.id())
        .bind(requirement_type.as_str())
        .bind(name)
        .bind(credits_needed)
        .bind(event_type)
        .bind(challenge_type)
        .fetch_one(&self.pool)
        .await
        .context("Creating candidate requirement")?;
        Ok(
            sqlx::query_as("SELECT * FROM candidate_requirements WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    /// Record (or replace) a per-candidate override for one requirement.
    pub async fn record_override(
        &self,
        candidate_id: i64,
        requirement_id: i64,
        manually_recorded_credits: i64,
        alternate_credits_needed: Option<i64>,
        comments: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO candidate_progress \
             (candidate_id, requirement_id, manually_recorded_credits, \
              alternate_credits_needed, comments) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(candidate_id, requirement_id) DO UPDATE SET \
               manually_recorded_credits = excluded.manually_recorded_credits, \
               alternate_credits_needed = excluded.alternate_credits_needed, \
               comments = excluded.comments",
        )
        .bind(candidate_id)
        .bind(requirement_id)
        .bind(manually_recorded_credits)
        .bind(alternate_credits_needed)
        .bind(comments)
        .execute(&self.pool)
        .await
        .context("Recording requirement override")?;
        Ok(())
    }

    pub async fn add_challenge(
        &self,
        candidate_id: i64,
        challenge_type: &str,
        description: &str,
        verified: bool,
    ) -> Result<ChallengeRow> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO challenges (candidate_id, challenge_type, description, verified) \
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(candidate_id)
        .bind(challenge_type)
        .bind(description)
        .bind(verified)
        .fetch_one(&self.pool)
        .await?;
        Ok(sqlx::query_as("SELECT * FROM challenges WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn set_resume(&self, user_id: i64, verified: bool) -> Result<()> {
        sqlx::query(
            "INSERT INTO resumes (user_id, verified) VALUES (?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET verified = excluded.verified",
        )
        .bind(user_id)
        .bind(verified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// (completed, required) credits toward one requirement type, summed
    /// over every requirement of that type in the candidate's term.
    pub async fn requirement_progress(
        &self,
        candidate: &CandidateRow,
        requirement_type: RequirementType,
    ) -> Result<(i64, i64)> {
        let requirements: Vec<RequirementRow> = sqlx::query_as(
            "SELECT * FROM candidate_requirements \
             WHERE term_id = ? AND requirement_type = ? \
             ORDER BY id ASC",
        )
        .bind(candidate.term_id)
        .bind(requirement_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut completed = 0;
        let mut required = 0;
        for requirement in &requirements {
            let (c, r) = self.single_requirement_progress(candidate, requirement).await?;
            completed += c;
            required += r;
        }
        Ok((completed, required))
    }

    async fn single_requirement_progress(
        &self,
        candidate: &CandidateRow,
        requirement: &RequirementRow,
    ) -> Result<(i64, i64)> {
        let mut completed = match requirement.requirement_type.as_str() {
            "event" => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COALESCE(SUM(e.requirements_credit), 0) \
                     FROM event_attendance a JOIN events e ON e.id = a.event_id \
                     WHERE a.user_id = ? AND e.term_id = ? AND e.cancelled = 0 \
                       AND (? IS NULL OR e.event_type = ?)",
                )
                .bind(candidate.user_id)
                .bind(candidate.term_id)
                .bind(&requirement.event_type)
                .bind(&requirement.event_type)
                .fetch_one(&self.pool)
                .await?
            }
            "challenge" => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM challenges \
                     WHERE candidate_id = ? AND verified = 1 \
                       AND (? IS NULL OR challenge_type = ?)",
                )
                .bind(candidate.id)
                .bind(&requirement.challenge_type)
                .bind(&requirement.challenge_type)
                .fetch_one(&self.pool)
                .await?
            }
            "exam_file" => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM exams WHERE submitter_id = ? AND approved = 1",
                )
                .bind(candidate.user_id)
                .fetch_one(&self.pool)
                .await?
            }
            "resume" => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM resumes WHERE user_id = ? AND verified = 1",
                )
                .bind(candidate.user_id)
                .fetch_one(&self.pool)
                .await?
            }
            // Manual requirements only ever have manually recorded credits.
            _ => 0,
        };

        let mut required = requirement.credits_needed;
        let override_row: Option<RequirementOverrideRow> = sqlx::query_as(
            "SELECT * FROM candidate_progress WHERE candidate_id = ? AND requirement_id = ?",
        )
        .bind(candidate.id)
        .bind(requirement.id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = override_row {
            completed += row.manually_recorded_credits;
            if let Some(alternate) = row.alternate_credits_needed {
                required = alternate;
            }
        }
        Ok((completed, required))
    }
}
