//! Project report rules — alphabet coverage of the report text, lifetime
//! completion benchmarks, and the procrastination award.

use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDate};

use super::assign::{Assignment, AssignmentWriter};
use super::alphabet_covered;
use crate::storage::ProjectReportRow;
use crate::term::Term;

const LIFETIME_BENCHMARKS: &[usize] = &[1, 5, 15];

/// Days between the reported event and first completion that count as
/// procrastination.
const PROCRASTINATION_DAYS: i64 = 60;

pub(crate) async fn project_report_saved(
    writer: &mut AssignmentWriter<'_>,
    report: &ProjectReportRow,
) -> Result<()> {
    // Drafts earn nothing; only the transition to complete counts.
    if !report.complete {
        return Ok(());
    }
    let term = Term::from_id(report.term_id)
        .with_context(|| format!("project report {} has invalid term key", report.id))?;
    let user = report.author_id;

    if alphabet_covered(report_text(report)) {
        writer
            .assign(user, "alphabet_project_report", Assignment::acquired(term))
            .await?;
    }

    let completed = writer.store().completed_reports(user).await?;
    for &benchmark in LIFETIME_BENCHMARKS {
        let short_name = format!("write_{benchmark:02}_project_reports");
        let assignment = if completed.len() < benchmark {
            Assignment::progress(completed.len() as i64)
        } else {
            let crossing = &completed[benchmark - 1];
            let crossing_term = Term::from_id(crossing.term_id)
                .with_context(|| format!("project report {} has invalid term key", crossing.id))?;
            Assignment::acquired(crossing_term).counting(completed.len() as i64)
        };
        writer.assign(user, &short_name, assignment).await?;
    }

    if let Some(days) = writing_gap_days(report)? {
        if days >= PROCRASTINATION_DAYS {
            writer
                .assign(
                    user,
                    "project_report_procrastination",
                    Assignment::acquired(term),
                )
                .await?;
        }
    }
    Ok(())
}

fn report_text(report: &ProjectReportRow) -> [&str; 8] {
    [
        &report.title,
        &report.other_group,
        &report.description,
        &report.purpose,
        &report.organization,
        &report.cost,
        &report.problems,
        &report.results,
    ]
}

/// Days between the reported event date and first completion. `None` when
/// the completion timestamp was never recorded.
fn writing_gap_days(report: &ProjectReportRow) -> Result<Option<i64>> {
    let Some(completed_at) = report.first_completed_at.as_deref() else {
        return Ok(None);
    };
    let event_date = NaiveDate::parse_from_str(&report.date, "%Y-%m-%d")
        .with_context(|| format!("project report {} has malformed date", report.id))?;
    let completed = DateTime::parse_from_rfc3339(completed_at)
        .with_context(|| format!("project report {} has malformed completion time", report.id))?;
    Ok(Some((completed.date_naive() - event_date).num_days()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Season;

    fn report(date: &str, completed_at: Option<&str>) -> ProjectReportRow {
        ProjectReportRow {
            id: 1,
            author_id: 7,
            term_id: Term::new(Season::Fall, 2013).id(),
            date: date.into(),
            complete: true,
            first_completed_at: completed_at.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn gap_spans_the_event_to_first_completion() {
        let r = report("2013-09-01", Some("2013-11-05T12:30:00Z"));
        assert_eq!(writing_gap_days(&r).unwrap(), Some(65));
    }

    #[test]
    fn gap_is_none_without_a_completion_time() {
        let r = report("2013-09-01", None);
        assert_eq!(writing_gap_days(&r).unwrap(), None);
    }

    #[test]
    fn malformed_date_is_an_error() {
        let r = report("09/01/2013", Some("2013-11-05T12:30:00Z"));
        assert!(writing_gap_days(&r).is_err());
    }

    #[test]
    fn report_text_feeds_every_field() {
        let mut r = report("2013-09-01", None);
        r.title = "The quick brown fox".into();
        r.results = "jumps over the lazy dog".into();
        assert!(alphabet_covered(report_text(&r)));
        r.results.clear();
        assert!(!alphabet_covered(report_text(&r)));
    }
}
