//! Officership rules — tenure, chairships, distinct positions, repeat
//! streaks, and the fast track to VP/President.
//!
//! Everything is recomputed from the user's full officer history on each
//! appointment save; the scan itself is a pure function so the fiddly
//! parts (tie collapsing, streak splitting) are testable without a
//! database.

use anyhow::{Context as _, Result};

use super::assign::{Assignment, AssignmentWriter};
use crate::storage::OfficerRow;
use crate::term::Term;

/// How many `officersemesterNN` achievements exist.
const TENURE_ACHIEVEMENTS: usize = 8;

/// One officer appointment, in evaluator-friendly form.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Appointment {
    pub position: String,
    pub is_chair: bool,
    pub term: Term,
}

impl Appointment {
    fn from_row(row: &OfficerRow) -> Result<Appointment> {
        Ok(Appointment {
            position: row.position.clone(),
            is_chair: row.is_chair,
            term: Term::from_id(row.term_id)
                .with_context(|| format!("officer row {} has invalid term key", row.id))?,
        })
    }
}

/// A maximal run of identical position names in the term-ordered
/// appointment sequence.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Run {
    pub position: String,
    pub terms: Vec<Term>,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct OfficerHistory {
    /// Distinct officer terms in chronological order — several positions
    /// in one term collapse to one entry.
    pub unique_terms: Vec<Term>,
    /// Position short name → terms held, in discovery order.
    pub positions: Vec<(String, Vec<Term>)>,
    /// Chaired position short name → terms chaired, in discovery order.
    pub chairs: Vec<(String, Vec<Term>)>,
    /// Repeat streaks, in order of occurrence.
    pub runs: Vec<Run>,
    /// First term in which the user hit VP within ≤2 distinct officer
    /// terms or President within ≤3.
    pub straight_to_the_top: Option<Term>,
}

/// Scan a chronologically ordered appointment history.
pub(crate) fn scan(history: &[Appointment]) -> OfficerHistory {
    let mut out = OfficerHistory::default();

    fn push_term(map: &mut Vec<(String, Vec<Term>)>, position: &str, term: Term) {
        match map.iter_mut().find(|(name, _)| name == position) {
            Some((_, terms)) => terms.push(term),
            None => map.push((position.to_string(), vec![term])),
        }
    }

    for appointment in history {
        push_term(&mut out.positions, &appointment.position, appointment.term);

        if out.unique_terms.last() != Some(&appointment.term) {
            out.unique_terms.push(appointment.term);
        }

        if appointment.is_chair {
            push_term(&mut out.chairs, &appointment.position, appointment.term);
        }

        match out.runs.last_mut() {
            Some(run) if run.position == appointment.position => {
                run.terms.push(appointment.term)
            }
            _ => out.runs.push(Run {
                position: appointment.position.clone(),
                terms: vec![appointment.term],
            }),
        }

        // Fast track: checked per appointment so a user who does both VP
        // and President is credited at the first qualifying moment.
        let terms_so_far = out.unique_terms.len();
        let qualifies = (terms_so_far <= 2 && appointment.position == "vp")
            || (terms_so_far <= 3 && appointment.position == "president");
        if qualifies && out.straight_to_the_top.is_none() {
            out.straight_to_the_top = Some(appointment.term);
        }
    }

    out
}

pub(crate) async fn officer_saved(
    writer: &mut AssignmentWriter<'_>,
    officer: &OfficerRow,
) -> Result<()> {
    let user = officer.user_id;
    let rows = writer.store().officerships(user).await?;
    let history = rows
        .iter()
        .map(Appointment::from_row)
        .collect::<Result<Vec<_>>>()?;
    let scanned = scan(&history);

    assign_tenure(writer, user, &scanned).await?;
    assign_chairs(writer, user, &scanned).await?;
    assign_repeats(writer, user, &scanned).await?;
    assign_distinct_positions(writer, user, &scanned).await?;

    if let Some(term) = scanned.straight_to_the_top {
        writer
            .assign(user, "straighttothetop", Assignment::acquired(term))
            .await?;
    }
    Ok(())
}

/// 1 through 8 officer semesters. The N-th achievement's term is the
/// user's N-th distinct officer term.
async fn assign_tenure(
    writer: &mut AssignmentWriter<'_>,
    user: i64,
    scanned: &OfficerHistory,
) -> Result<()> {
    let count = scanned.unique_terms.len();
    for n in 1..=TENURE_ACHIEVEMENTS {
        let short_name = format!("officersemester{n:02}");
        let assignment = if count < n {
            Assignment::progress(count as i64)
        } else {
            Assignment::acquired(scanned.unique_terms[n - 1]).counting(count as i64)
        };
        writer.assign(user, &short_name, assignment).await?;
    }
    Ok(())
}

/// First and second distinct committees chaired, credited in the first
/// term the user chaired each.
async fn assign_chairs(
    writer: &mut AssignmentWriter<'_>,
    user: i64,
    scanned: &OfficerHistory,
) -> Result<()> {
    if scanned.chairs.is_empty() {
        return Ok(());
    }
    writer
        .assign(
            user,
            "chair1committee",
            Assignment::acquired(scanned.chairs[0].1[0]),
        )
        .await?;
    let assignment = match scanned.chairs.get(1) {
        Some((_, terms)) => Assignment::acquired(terms[0]),
        None => Assignment::progress(1),
    };
    writer.assign(user, "chair2committees", assignment).await?;
    Ok(())
}

/// Streak achievements: same position twice or thrice in a row, and two
/// distinct positions each repeated.
async fn assign_repeats(
    writer: &mut AssignmentWriter<'_>,
    user: i64,
    scanned: &OfficerHistory,
) -> Result<()> {
    let mut twice_held: Vec<&str> = Vec::new();

    for run in &scanned.runs {
        if run.terms.len() >= 2 {
            writer
                .assign(
                    user,
                    "twice_same_position",
                    Assignment::acquired(run.terms[1]),
                )
                .await?;

            if !twice_held.contains(&run.position.as_str()) {
                twice_held.push(&run.position);
            }
            if twice_held.len() == 2 {
                writer
                    .assign(
                        user,
                        "two_repeated_positions",
                        Assignment::acquired(run.terms[1]),
                    )
                    .await?;
            }
        }
        if run.terms.len() >= 3 {
            writer
                .assign(
                    user,
                    "thrice_same_position",
                    Assignment::acquired(run.terms[2]),
                )
                .await?;
        }
    }
    Ok(())
}

/// Three distinct officer positions, credited in the first term of the
/// third distinct position.
async fn assign_distinct_positions(
    writer: &mut AssignmentWriter<'_>,
    user: i64,
    scanned: &OfficerHistory,
) -> Result<()> {
    if let Some((_, terms)) = scanned.positions.get(2) {
        writer
            .assign(user, "three_unique_positions", Assignment::acquired(terms[0]))
            .await?;
    }
    Ok(())
}
