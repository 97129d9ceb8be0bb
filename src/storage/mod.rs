//! SQLite persistence — achievement catalog, progress ledger, and the
//! domain records the rule evaluators read.
//!
//! All history queries return materialized, already-sorted `Vec`s,
//! ascending by term key and then by row id within a term. The
//! term-backfill rules ("the achievement's term is the term of the N-th
//! item") depend on exactly this ordering, so no query here leaves the
//! ordering to the caller.

use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

use crate::term::Term;

// ─── Rows ─────────────────────────────────────────────────────────────────────

/// One catalog entry. Reference data: written by import/admin paths and
/// tests, never by the rule evaluators.
#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct AchievementRow {
    pub short_name: String,
    pub name: String,
    pub description: String,
    /// general | event | elections | paperwork | awards | driving | feats
    pub category: String,
    /// Optional sequence tag; adjacent ranks with the same tag are grouped
    /// when rendered.
    pub sequence: String,
    pub points: i64,
    /// Target count. 0 = the progress bar is hidden.
    pub goal: i64,
    /// public | private | secret
    pub privacy: String,
    /// Manual achievements are only ever assigned by a human.
    pub manual: bool,
    /// Repeatable achievements keep one ledger row per (user, term).
    pub repeatable: bool,
    pub rank: f64,
    pub icon_filename: String,
    pub icon_creator: Option<i64>,
}

/// One progress ledger row: per-user, per-achievement (per-term when the
/// achievement is repeatable).
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ProgressRow {
    pub id: i64,
    pub user_id: i64,
    /// Catalog short name.
    pub achievement: String,
    pub acquired: bool,
    pub progress: i64,
    pub goal: i64,
    /// Term key of first acquisition. Sticky: never overwritten once the
    /// row is acquired.
    pub term_id: Option<i64>,
    /// User id of the human assigner. NULL = system-assigned.
    pub assigner: Option<i64>,
    /// Free-text notes about the assignment.
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ProgressRow {
    pub fn term(&self) -> Option<Term> {
        self.term_id.and_then(Term::from_id)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct OfficerRow {
    pub id: i64,
    pub user_id: i64,
    /// Position short name ("historian", "vp", "president", ...).
    pub position: String,
    pub is_chair: bool,
    pub term_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct EventRow {
    pub id: i64,
    pub name: String,
    pub event_type: String,
    pub term_id: i64,
    pub cancelled: bool,
    /// Candidate requirement credits this event is worth.
    pub requirements_credit: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct AttendanceRow {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
}

/// An attendance row joined with the event it belongs to — the shape every
/// event rule scans.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendedEvent {
    pub attendance_id: i64,
    pub event_id: i64,
    pub name: String,
    pub event_type: String,
    pub term_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ExamRow {
    pub id: i64,
    pub submitter_id: Option<i64>,
    pub course: String,
    pub term_id: i64,
    pub approved: bool,
}

#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct ProjectReportRow {
    pub id: i64,
    pub author_id: i64,
    pub term_id: i64,
    pub title: String,
    pub other_group: String,
    pub description: String,
    pub purpose: String,
    pub organization: String,
    pub cost: String,
    pub problems: String,
    pub results: String,
    /// Date of the reported event, YYYY-MM-DD.
    pub date: String,
    pub complete: bool,
    /// RFC 3339 timestamp of the first transition to complete.
    pub first_completed_at: Option<String>,
}

/// Fields for a new project report. Free-text sections default to empty.
#[derive(Debug, Clone, Default)]
pub struct NewProjectReport {
    pub author_id: i64,
    pub term: Option<Term>,
    pub title: String,
    pub other_group: String,
    pub description: String,
    pub purpose: String,
    pub organization: String,
    pub cost: String,
    pub problems: String,
    pub results: String,
    pub date: String,
    pub complete: bool,
    pub first_completed_at: Option<String>,
}

// ─── Storage ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open (or create) the database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        Self::open_with_slow_query(db_path, 0).await
    }

    /// Open with slow-query logging enabled. `slow_query_ms` is the
    /// threshold in milliseconds — queries exceeding it are logged at WARN
    /// level. 0 disables slow-query logging.
    pub async fn open_with_slow_query(db_path: &Path, slow_query_ms: u64) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);
        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }
        let pool = SqlitePool::connect_with(opts).await?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// In-memory database, used by tests and safe for throwaway replays.
    /// Single connection: each `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Return a clone of the connection pool (cheap — Arc-backed). Used by
    /// subsystem stores that share the same SQLite database.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS achievements (
                short_name TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'general',
                sequence TEXT NOT NULL DEFAULT '',
                points INTEGER NOT NULL DEFAULT 0,
                goal INTEGER NOT NULL DEFAULT 0,
                privacy TEXT NOT NULL DEFAULT 'public',
                manual INTEGER NOT NULL DEFAULT 0,
                repeatable INTEGER NOT NULL DEFAULT 0,
                rank REAL NOT NULL DEFAULT 0,
                icon_filename TEXT NOT NULL DEFAULT '',
                icon_creator INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_achievements_category ON achievements(category);

            CREATE TABLE IF NOT EXISTS user_achievements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                achievement TEXT NOT NULL REFERENCES achievements(short_name),
                acquired INTEGER NOT NULL DEFAULT 0,
                progress INTEGER NOT NULL DEFAULT 0,
                goal INTEGER NOT NULL DEFAULT 0,
                term_id INTEGER,
                assigner INTEGER,
                data TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_user_achievements_user
                ON user_achievements(user_id, achievement);

            CREATE TABLE IF NOT EXISTS officers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                position TEXT NOT NULL,
                is_chair INTEGER NOT NULL DEFAULT 0,
                term_id INTEGER NOT NULL,
                UNIQUE(user_id, position, term_id)
            );
            CREATE INDEX IF NOT EXISTS idx_officers_user ON officers(user_id);

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                event_type TEXT NOT NULL,
                term_id INTEGER NOT NULL,
                cancelled INTEGER NOT NULL DEFAULT 0,
                requirements_credit INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_events_term ON events(term_id);

            CREATE TABLE IF NOT EXISTS event_attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                event_id INTEGER NOT NULL REFERENCES events(id),
                UNIQUE(user_id, event_id)
            );
            CREATE INDEX IF NOT EXISTS idx_attendance_user ON event_attendance(user_id);

            CREATE TABLE IF NOT EXISTS exams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                submitter_id INTEGER,
                course TEXT NOT NULL DEFAULT '',
                term_id INTEGER NOT NULL,
                approved INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_exams_submitter ON exams(submitter_id);

            CREATE TABLE IF NOT EXISTS project_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                term_id INTEGER NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                other_group TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                purpose TEXT NOT NULL DEFAULT '',
                organization TEXT NOT NULL DEFAULT '',
                cost TEXT NOT NULL DEFAULT '',
                problems TEXT NOT NULL DEFAULT '',
                results TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL DEFAULT '',
                complete INTEGER NOT NULL DEFAULT 0,
                first_completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_reports_author ON project_reports(author_id);
            ",
        )
        .execute(&self.pool)
        .await
        .context("Creating engine tables")?;
        Ok(())
    }

    // ─── Achievement catalog ──────────────────────────────────────────────

    /// Insert or replace a catalog entry.
    pub async fn upsert_achievement(&self, row: &AchievementRow) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO achievements \
             (short_name, name, description, category, sequence, points, goal, \
              privacy, manual, repeatable, rank, icon_filename, icon_creator) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.short_name)
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.category)
        .bind(&row.sequence)
        .bind(row.points)
        .bind(row.goal)
        .bind(&row.privacy)
        .bind(row.manual)
        .bind(row.repeatable)
        .bind(row.rank)
        .bind(&row.icon_filename)
        .bind(row.icon_creator)
        .execute(&self.pool)
        .await
        .context("Upserting achievement")?;
        Ok(())
    }

    /// Catalog lookup by short name. `None` when absent — callers treat a
    /// missing entry as a silent no-op, never an error.
    pub async fn achievement(&self, short_name: &str) -> Result<Option<AchievementRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM achievements WHERE short_name = ?")
                .bind(short_name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Catalog entries whose icon was drawn by `user_id`, in rank order.
    pub async fn achievements_by_icon_creator(
        &self,
        user_id: i64,
    ) -> Result<Vec<AchievementRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM achievements WHERE icon_creator = ? ORDER BY rank ASC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    // ─── Progress ledger ──────────────────────────────────────────────────

    /// Find the ledger row the assignment writer should reconcile against.
    /// Repeatable achievements are keyed by (user, achievement, term); the
    /// rest by (user, achievement).
    pub async fn find_progress(
        &self,
        user_id: i64,
        achievement: &str,
        repeatable: bool,
        term_id: Option<i64>,
    ) -> Result<Option<ProgressRow>> {
        let row = if repeatable {
            sqlx::query_as(
                "SELECT * FROM user_achievements \
                 WHERE user_id = ? AND achievement = ? AND term_id IS ?",
            )
            .bind(user_id)
            .bind(achievement)
            .bind(term_id)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query_as("SELECT * FROM user_achievements WHERE user_id = ? AND achievement = ?")
                .bind(user_id)
                .bind(achievement)
                .fetch_optional(&self.pool)
                .await?
        };
        Ok(row)
    }

    pub async fn progress_by_id(&self, id: i64) -> Result<ProgressRow> {
        Ok(sqlx::query_as("SELECT * FROM user_achievements WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_progress(
        &self,
        user_id: i64,
        achievement: &str,
        acquired: bool,
        progress: i64,
        goal: i64,
        term_id: Option<i64>,
        assigner: Option<i64>,
        data: &str,
    ) -> Result<ProgressRow> {
        let now = Utc::now().to_rfc3339();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO user_achievements \
             (user_id, achievement, acquired, progress, goal, term_id, assigner, data, \
              created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(user_id)
        .bind(achievement)
        .bind(acquired)
        .bind(progress)
        .bind(goal)
        .bind(term_id)
        .bind(assigner)
        .bind(data)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .context("Inserting progress row")?;
        self.progress_by_id(id).await
    }

    /// Full overwrite of a not-yet-acquired row. The writer never calls
    /// this for acquired rows.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_progress(
        &self,
        id: i64,
        acquired: bool,
        progress: i64,
        goal: i64,
        term_id: Option<i64>,
        assigner: Option<i64>,
        data: &str,
    ) -> Result<ProgressRow> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE user_achievements \
             SET acquired = ?, progress = ?, goal = ?, term_id = ?, assigner = ?, \
                 data = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(acquired)
        .bind(progress)
        .bind(goal)
        .bind(term_id)
        .bind(assigner)
        .bind(data)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Updating progress row")?;
        self.progress_by_id(id).await
    }

    /// Informational progress bump on an acquired row. Conditional so two
    /// near-simultaneous writers converge on the higher count; acquisition
    /// state and term are untouched.
    pub async fn bump_progress(&self, id: i64, progress: i64) -> Result<ProgressRow> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE user_achievements SET progress = ?, updated_at = ? \
             WHERE id = ? AND progress < ?",
        )
        .bind(progress)
        .bind(&now)
        .bind(id)
        .bind(progress)
        .execute(&self.pool)
        .await?;
        self.progress_by_id(id).await
    }

    /// All of a user's ledger rows, catalog rank order then row id.
    pub async fn user_ledger(&self, user_id: i64) -> Result<Vec<ProgressRow>> {
        Ok(sqlx::query_as(
            "SELECT ua.* FROM user_achievements ua \
             JOIN achievements a ON a.short_name = ua.achievement \
             WHERE ua.user_id = ? \
             ORDER BY a.rank ASC, ua.id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Acquired ledger rows in acquisition-term order (rows with no term
    /// sort last). Feeds the meta completion rule.
    pub async fn acquired_achievements(&self, user_id: i64) -> Result<Vec<ProgressRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM user_achievements \
             WHERE user_id = ? AND acquired = 1 \
             ORDER BY term_id IS NULL, term_id ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Every ledger row, acquisition-term order. Used by the full-history
    /// recompute to replay manual assignments through the meta rules.
    pub async fn all_progress(&self) -> Result<Vec<ProgressRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM user_achievements \
             ORDER BY term_id IS NULL, term_id ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// Highest term key present in any domain table, `None` on an empty
    /// database. The recompute fallback for the current term.
    pub async fn latest_term_id(&self) -> Result<Option<i64>> {
        Ok(sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(t) FROM ( \
                 SELECT MAX(term_id) AS t FROM officers \
                 UNION ALL SELECT MAX(term_id) FROM events \
                 UNION ALL SELECT MAX(term_id) FROM exams \
                 UNION ALL SELECT MAX(term_id) FROM project_reports \
             )",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn all_achievements(&self) -> Result<Vec<AchievementRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM achievements ORDER BY rank ASC, short_name ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    // ─── Officers ─────────────────────────────────────────────────────────

    /// Record an officer appointment. Idempotent per (user, position, term).
    pub async fn save_officer(
        &self,
        user_id: i64,
        position: &str,
        is_chair: bool,
        term: Term,
    ) -> Result<OfficerRow> {
        sqlx::query(
            "INSERT INTO officers (user_id, position, is_chair, term_id) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id, position, term_id) DO UPDATE SET is_chair = excluded.is_chair",
        )
        .bind(user_id)
        .bind(position)
        .bind(is_chair)
        .bind(term.id())
        .execute(&self.pool)
        .await
        .context("Saving officer appointment")?;
        Ok(sqlx::query_as(
            "SELECT * FROM officers WHERE user_id = ? AND position = ? AND term_id = ?",
        )
        .bind(user_id)
        .bind(position)
        .bind(term.id())
        .fetch_one(&self.pool)
        .await?)
    }

    /// A user's officer history in chronological order, excluding advisory
    /// positions (advisor, faculty) which never count toward achievements.
    pub async fn officerships(&self, user_id: i64) -> Result<Vec<OfficerRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM officers \
             WHERE user_id = ? AND position NOT IN ('advisor', 'faculty') \
             ORDER BY term_id ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn all_officers(&self) -> Result<Vec<OfficerRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM officers ORDER BY term_id ASC, id ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    // ─── Events & attendance ──────────────────────────────────────────────

    pub async fn save_event(
        &self,
        name: &str,
        event_type: &str,
        term: Term,
        requirements_credit: i64,
    ) -> Result<EventRow> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (name, event_type, term_id, cancelled, requirements_credit) \
             VALUES (?, ?, ?, 0, ?) RETURNING id",
        )
        .bind(name)
        .bind(event_type)
        .bind(term.id())
        .bind(requirements_credit)
        .fetch_one(&self.pool)
        .await
        .context("Saving event")?;
        self.event(id)
            .await?
            .context("event not found after insert")
    }

    pub async fn cancel_event(&self, event_id: i64) -> Result<()> {
        sqlx::query("UPDATE events SET cancelled = 1 WHERE id = ?")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn event(&self, id: i64) -> Result<Option<EventRow>> {
        Ok(sqlx::query_as("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Non-cancelled events in a term.
    pub async fn term_events(&self, term_id: i64) -> Result<Vec<EventRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM events WHERE term_id = ? AND cancelled = 0 ORDER BY id ASC",
        )
        .bind(term_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Record attendance. Re-recording the same (user, event) is a no-op,
    /// so imports can replay safely.
    pub async fn save_attendance(&self, user_id: i64, event_id: i64) -> Result<AttendanceRow> {
        sqlx::query(
            "INSERT INTO event_attendance (user_id, event_id) VALUES (?, ?) \
             ON CONFLICT(user_id, event_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(event_id)
        .execute(&self.pool)
        .await
        .context("Saving attendance")?;
        Ok(sqlx::query_as(
            "SELECT * FROM event_attendance WHERE user_id = ? AND event_id = ?",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?)
    }

    /// Lifetime attendance for a user joined with event data, cancelled
    /// events excluded, chronological order.
    pub async fn attendance_history(&self, user_id: i64) -> Result<Vec<AttendedEvent>> {
        Ok(sqlx::query_as(
            "SELECT a.id AS attendance_id, e.id AS event_id, e.name, e.event_type, e.term_id \
             FROM event_attendance a JOIN events e ON e.id = a.event_id \
             WHERE a.user_id = ? AND e.cancelled = 0 \
             ORDER BY e.term_id ASC, a.id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Every attendance row in the database, chronological order. Used by
    /// the full-history recompute.
    pub async fn all_attendance(&self) -> Result<Vec<AttendanceRow>> {
        Ok(sqlx::query_as(
            "SELECT a.id, a.user_id, a.event_id \
             FROM event_attendance a JOIN events e ON e.id = a.event_id \
             ORDER BY e.term_id ASC, a.id ASC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    // ─── Exams ────────────────────────────────────────────────────────────

    pub async fn save_exam(
        &self,
        submitter_id: Option<i64>,
        course: &str,
        term: Term,
        approved: bool,
    ) -> Result<ExamRow> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO exams (submitter_id, course, term_id, approved) \
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(submitter_id)
        .bind(course)
        .bind(term.id())
        .bind(approved)
        .fetch_one(&self.pool)
        .await
        .context("Saving exam")?;
        Ok(sqlx::query_as("SELECT * FROM exams WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn set_exam_approved(&self, exam_id: i64, approved: bool) -> Result<()> {
        sqlx::query("UPDATE exams SET approved = ? WHERE id = ?")
            .bind(approved)
            .bind(exam_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// A submitter's approved uploads in chronological order.
    pub async fn approved_exams(&self, submitter_id: i64) -> Result<Vec<ExamRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM exams WHERE submitter_id = ? AND approved = 1 \
             ORDER BY term_id ASC, id ASC",
        )
        .bind(submitter_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn all_exams(&self) -> Result<Vec<ExamRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM exams ORDER BY term_id ASC, id ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    // ─── Project reports ──────────────────────────────────────────────────

    pub async fn save_project_report(&self, report: &NewProjectReport) -> Result<ProjectReportRow> {
        let term_id = report.term.map(Term::id).context("report needs a term")?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO project_reports \
             (author_id, term_id, title, other_group, description, purpose, organization, \
              cost, problems, results, date, complete, first_completed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(report.author_id)
        .bind(term_id)
        .bind(&report.title)
        .bind(&report.other_group)
        .bind(&report.description)
        .bind(&report.purpose)
        .bind(&report.organization)
        .bind(&report.cost)
        .bind(&report.problems)
        .bind(&report.results)
        .bind(&report.date)
        .bind(report.complete)
        .bind(&report.first_completed_at)
        .fetch_one(&self.pool)
        .await
        .context("Saving project report")?;
        self.project_report(id).await
    }

    pub async fn project_report(&self, id: i64) -> Result<ProjectReportRow> {
        Ok(sqlx::query_as("SELECT * FROM project_reports WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Mark a report complete. `first_completed_at` is only written once.
    pub async fn complete_project_report(
        &self,
        id: i64,
        completed_at: &str,
    ) -> Result<ProjectReportRow> {
        sqlx::query(
            "UPDATE project_reports \
             SET complete = 1, \
                 first_completed_at = COALESCE(first_completed_at, ?) \
             WHERE id = ?",
        )
        .bind(completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.project_report(id).await
    }

    /// An author's completed reports in chronological order.
    pub async fn completed_reports(&self, author_id: i64) -> Result<Vec<ProjectReportRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM project_reports WHERE author_id = ? AND complete = 1 \
             ORDER BY term_id ASC, id ASC",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn all_project_reports(&self) -> Result<Vec<ProjectReportRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM project_reports ORDER BY term_id ASC, id ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Season;

    async fn make_store() -> Storage {
        Storage::in_memory().await.unwrap()
    }

    fn fa2013() -> Term {
        Term::new(Season::Fall, 2013)
    }

    #[tokio::test]
    async fn opens_on_disk_with_slow_query_logging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Storage::open_with_slow_query(&dir.path().join("quark.db"), 50)
            .await
            .unwrap();
        store
            .upsert_achievement(&AchievementRow {
                short_name: "attend_d15".into(),
                name: "District 15".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(store.achievement("attend_d15").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn achievement_lookup_is_optional() {
        let store = make_store().await;
        assert!(store.achievement("missing").await.unwrap().is_none());

        store
            .upsert_achievement(&AchievementRow {
                short_name: "attend_d15".into(),
                name: "District 15".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let row = store.achievement("attend_d15").await.unwrap().unwrap();
        assert_eq!(row.name, "District 15");
    }

    #[tokio::test]
    async fn attendance_replay_is_idempotent() {
        let store = make_store().await;
        let event = store.save_event("Fun Event", "Fun", fa2013(), 1).await.unwrap();
        let a1 = store.save_attendance(7, event.id).await.unwrap();
        let a2 = store.save_attendance(7, event.id).await.unwrap();
        assert_eq!(a1.id, a2.id);
        assert_eq!(store.attendance_history(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_events_leave_history() {
        let store = make_store().await;
        let event = store.save_event("Banquet", "Big Social", fa2013(), 1).await.unwrap();
        store.save_attendance(7, event.id).await.unwrap();
        assert_eq!(store.attendance_history(7).await.unwrap().len(), 1);
        store.cancel_event(event.id).await.unwrap();
        assert!(store.attendance_history(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn officership_history_excludes_advisors() {
        let store = make_store().await;
        store.save_officer(7, "historian", false, fa2013()).await.unwrap();
        store.save_officer(7, "advisor", false, fa2013()).await.unwrap();
        let history = store.officerships(7).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].position, "historian");
    }

    #[tokio::test]
    async fn history_orders_by_term_then_insertion() {
        let store = make_store().await;
        let sp2012 = Term::new(Season::Spring, 2012);
        // Inserted out of chronological order on purpose.
        let late = store.save_event("Later", "Fun", fa2013(), 1).await.unwrap();
        let early = store.save_event("Earlier", "Fun", sp2012, 1).await.unwrap();
        store.save_attendance(7, late.id).await.unwrap();
        store.save_attendance(7, early.id).await.unwrap();
        let history = store.attendance_history(7).await.unwrap();
        assert_eq!(history[0].name, "Earlier");
        assert_eq!(history[1].name, "Later");
    }

    #[tokio::test]
    async fn latest_term_spans_every_domain_table() {
        let store = make_store().await;
        assert_eq!(store.latest_term_id().await.unwrap(), None);

        // An events-only database (the common import shape) still has a
        // latest term.
        store.save_event("Banquet", "Big Social", fa2013(), 1).await.unwrap();
        assert_eq!(store.latest_term_id().await.unwrap(), Some(fa2013().id()));

        let sp2014 = Term::new(Season::Spring, 2014);
        store.save_officer(7, "historian", false, sp2014).await.unwrap();
        assert_eq!(store.latest_term_id().await.unwrap(), Some(sp2014.id()));
    }

    #[tokio::test]
    async fn first_completed_at_is_written_once() {
        let store = make_store().await;
        let report = store
            .save_project_report(&NewProjectReport {
                author_id: 7,
                term: Some(fa2013()),
                title: "Banquet".into(),
                date: "2013-09-01".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let done = store
            .complete_project_report(report.id, "2013-11-05T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(done.first_completed_at.as_deref(), Some("2013-11-05T00:00:00Z"));
        let again = store
            .complete_project_report(report.id, "2014-01-01T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(again.first_completed_at.as_deref(), Some("2013-11-05T00:00:00Z"));
    }
}
