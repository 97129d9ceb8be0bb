//! Exam upload rules — lifetime approved-upload benchmarks.

use anyhow::{Context as _, Result};

use super::assign::{Assignment, AssignmentWriter};
use crate::storage::ExamRow;
use crate::term::Term;

const LIFETIME_BENCHMARKS: &[usize] = &[5, 10, 25, 50];

pub(crate) async fn exam_saved(writer: &mut AssignmentWriter<'_>, exam: &ExamRow) -> Result<()> {
    // Anonymous uploads earn nobody anything.
    let Some(submitter) = exam.submitter_id else {
        return Ok(());
    };

    let approved = writer.store().approved_exams(submitter).await?;
    for &benchmark in LIFETIME_BENCHMARKS {
        let short_name = format!("upload_{benchmark:02}_exams");
        let assignment = if approved.len() < benchmark {
            Assignment::progress(approved.len() as i64)
        } else {
            let crossing = &approved[benchmark - 1];
            let term = Term::from_id(crossing.term_id)
                .with_context(|| format!("exam {} has invalid term key", crossing.id))?;
            Assignment::acquired(term).counting(approved.len() as i64)
        };
        writer.assign(submitter, &short_name, assignment).await?;
    }
    Ok(())
}
