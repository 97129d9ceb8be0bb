//! The achievement rule engine.
//!
//! Rules run as explicit domain-event notifications: after a domain write
//! commits, the caller invokes [`dispatch`] with the saved record. Each
//! evaluator recomputes from the full persisted history, so dispatching
//! the same save twice — or replaying an entire imported history in any
//! order — converges to the same ledger.

pub mod assign;
mod events;
mod exams;
mod meta;
mod officership;
mod project_reports;

use std::collections::VecDeque;

use anyhow::Result;
use tracing::debug;

pub use assign::{Assignment, AssignmentWriter};

use crate::storage::{
    AchievementRow, AttendanceRow, ExamRow, OfficerRow, ProgressRow, ProjectReportRow, Storage,
};
use crate::term::Term;

/// A freshly persisted domain record, handed to the engine by whoever
/// saved it.
#[derive(Debug)]
pub enum DomainEvent<'a> {
    OfficerSaved(&'a OfficerRow),
    AttendanceSaved(&'a AttendanceRow),
    ExamSaved(&'a ExamRow),
    ProjectReportSaved(&'a ProjectReportRow),
    /// A catalog entry was created or edited (icon credit).
    AchievementSaved(&'a AchievementRow),
    /// A ledger row was written outside the engine (manual assignment).
    ProgressSaved(&'a ProgressRow),
}

/// Run every rule that cares about `event`, then chase ledger writes
/// through the meta rules until none are produced. `current_term` is the
/// term achievements land in when no historical term applies (icon
/// credits); it is always passed in, never read from ambient state.
pub async fn dispatch(store: &Storage, current_term: Term, event: &DomainEvent<'_>) -> Result<()> {
    let mut writer = AssignmentWriter::new(store);
    match event {
        DomainEvent::OfficerSaved(officer) => {
            officership::officer_saved(&mut writer, officer).await?
        }
        DomainEvent::AttendanceSaved(attendance) => {
            events::attendance_saved(&mut writer, attendance).await?
        }
        DomainEvent::ExamSaved(exam) => exams::exam_saved(&mut writer, exam).await?,
        DomainEvent::ProjectReportSaved(report) => {
            project_reports::project_report_saved(&mut writer, report).await?
        }
        DomainEvent::AchievementSaved(achievement) => {
            meta::achievement_saved(&mut writer, current_term, achievement).await?
        }
        DomainEvent::ProgressSaved(record) => meta::progress_saved(&mut writer, record).await?,
    }

    // Every ledger write is itself a "progress record saved" event for
    // the meta rules. The meta rules' guards (self short-name check, trio
    // membership) bound the chain, so this always drains.
    let mut pending: VecDeque<ProgressRow> = writer.take_written().into();
    while let Some(record) = pending.pop_front() {
        debug!(
            user = record.user_id,
            achievement = %record.achievement,
            "chaining ledger write through meta rules"
        );
        let mut meta_writer = AssignmentWriter::new(store);
        meta::progress_saved(&mut meta_writer, &record).await?;
        pending.extend(meta_writer.take_written());
    }
    Ok(())
}

/// True when the lowercased `texts`, taken together, contain every letter
/// a–z. Scanning stops as soon as the alphabet is exhausted.
pub(crate) fn alphabet_covered<'a>(texts: impl IntoIterator<Item = &'a str>) -> bool {
    let mut remaining: std::collections::HashSet<char> = ('a'..='z').collect();
    for text in texts {
        for ch in text.to_lowercase().chars() {
            remaining.remove(&ch);
        }
        if remaining.is_empty() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_needs_all_26_letters() {
        assert!(alphabet_covered(["The quick brown fox jumps over the lazy dog"]));
        assert!(alphabet_covered(["The Quick Brown Fox", "jumps over", "the lazy dog"]));
        assert!(!alphabet_covered(["almost every letter but not quite"]));
        assert!(!alphabet_covered(Vec::<&str>::new()));
    }

    #[test]
    fn alphabet_ignores_non_letters() {
        assert!(alphabet_covered(["abcdefghijklm", "NOPQRSTUVWXYZ 123!?"]));
    }
}
