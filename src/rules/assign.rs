//! The assignment writer — the single idempotent upsert path into the
//! progress ledger.
//!
//! Invariants enforced here, and nowhere else:
//! - a missing catalog entry makes the whole call a silent no-op;
//! - once a row is acquired, `acquired` and `term` never change again
//!   (first acquisition wins);
//! - the progress count on an acquired row only moves forward.
//!
//! Every rule evaluator funnels through this writer, which also records
//! the rows it wrote so the dispatcher can feed them through the meta
//! rules exactly once.

use anyhow::Result;
use tracing::debug;

use crate::storage::{AchievementRow, ProgressRow, Storage};
use crate::term::Term;

/// One requested ledger write. Construct with [`Assignment::acquired`] or
/// [`Assignment::progress`]; the remaining fields have builder setters.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    pub acquired: bool,
    pub progress: i64,
    /// Target count; `None` uses the catalog entry's goal.
    pub goal: Option<i64>,
    pub term: Option<Term>,
    /// Free-text note stored with the row.
    pub data: String,
    /// Human assigner; `None` = system-assigned.
    pub assigner: Option<i64>,
}

impl Assignment {
    /// The achievement was earned in `term`.
    pub fn acquired(term: Term) -> Assignment {
        Assignment {
            acquired: true,
            term: Some(term),
            ..Default::default()
        }
    }

    /// Progress toward the goal, not yet earned.
    pub fn progress(progress: i64) -> Assignment {
        Assignment {
            progress,
            ..Default::default()
        }
    }

    /// Informational count carried alongside the assignment. On an
    /// already-acquired row the writer only applies it when it is higher
    /// than the stored count.
    pub fn counting(mut self, progress: i64) -> Assignment {
        self.progress = progress;
        self
    }

    pub fn in_term(mut self, term: Term) -> Assignment {
        self.term = Some(term);
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Assignment {
        self.data = data.into();
        self
    }

    pub fn by(mut self, assigner: i64) -> Assignment {
        self.assigner = Some(assigner);
        self
    }
}

pub struct AssignmentWriter<'a> {
    store: &'a Storage,
    written: Vec<ProgressRow>,
}

impl<'a> AssignmentWriter<'a> {
    pub fn new(store: &'a Storage) -> Self {
        Self {
            store,
            written: Vec::new(),
        }
    }

    pub fn store(&self) -> &'a Storage {
        self.store
    }

    /// Rows this writer actually wrote (no-ops are not recorded).
    pub fn take_written(&mut self) -> Vec<ProgressRow> {
        std::mem::take(&mut self.written)
    }

    /// Reconcile one assignment into the ledger. A short name missing from
    /// the catalog is a silent no-op — catalog entries come and go
    /// independently of the rules that reference them.
    pub async fn assign(
        &mut self,
        user_id: i64,
        short_name: &str,
        assignment: Assignment,
    ) -> Result<()> {
        let Some(achievement) = self.store.achievement(short_name).await? else {
            return Ok(());
        };
        self.assign_to(user_id, &achievement, assignment).await
    }

    /// Like [`assign`](Self::assign) with the catalog row already in hand.
    pub async fn assign_to(
        &mut self,
        user_id: i64,
        achievement: &AchievementRow,
        assignment: Assignment,
    ) -> Result<()> {
        let goal = assignment.goal.unwrap_or(achievement.goal);
        let term_id = assignment.term.map(Term::id);
        let existing = self
            .store
            .find_progress(
                user_id,
                &achievement.short_name,
                achievement.repeatable,
                term_id,
            )
            .await?;

        let row = match existing {
            None => {
                self.store
                    .insert_progress(
                        user_id,
                        &achievement.short_name,
                        assignment.acquired,
                        assignment.progress,
                        goal,
                        term_id,
                        assignment.assigner,
                        &assignment.data,
                    )
                    .await?
            }
            Some(row) if row.acquired => {
                // Acquired rows never downgrade. Only the informational
                // progress count moves, and only forward.
                if assignment.progress > row.progress {
                    self.store.bump_progress(row.id, assignment.progress).await?
                } else {
                    return Ok(());
                }
            }
            Some(row) => {
                self.store
                    .update_progress(
                        row.id,
                        assignment.acquired,
                        assignment.progress,
                        goal,
                        term_id,
                        assignment.assigner,
                        &assignment.data,
                    )
                    .await?
            }
        };

        debug!(
            user = user_id,
            achievement = %achievement.short_name,
            acquired = row.acquired,
            progress = row.progress,
            "ledger write"
        );
        self.written.push(row);
        Ok(())
    }
}
