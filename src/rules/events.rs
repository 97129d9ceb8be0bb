//! Event attendance rules — alphabet coverage, per-type completion,
//! lifetime benchmarks, and a handful of name-matched one-offs.

use anyhow::{Context as _, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::assign::{Assignment, AssignmentWriter};
use super::alphabet_covered;
use crate::storage::AttendanceRow;
use crate::term::{Season, Term};

/// Lifetime attendance counts that earn an achievement. The recorded term
/// is the term of the attendance that crossed the benchmark, read from the
/// ordered history — never the term of the save that triggered the
/// recount.
const LIFETIME_BENCHMARKS: &[usize] = &[25, 50, 78, 100, 150, 200, 300];

/// Event type name → achievement code for "attended every X this term".
const EVENT_TYPE_ACHIEVEMENTS: &[(&str, &str)] = &[
    ("Meeting", "meetings"),
    ("Big Social", "big_socials"),
    ("Bent Polishing", "bent_polishings"),
    ("Infosession", "infosessions"),
    ("Community Service", "service"),
    ("E Futures", "efutures"),
    ("Fun", "fun"),
    ("Professional Development", "prodev"),
];

/// Matches "District 15", "D15", and "D 15" (case-sensitive, as the
/// historical event names were).
static D15: Lazy<Regex> = Lazy::new(|| Regex::new(r"D(istrict)?[\s]?15").unwrap());

pub(crate) async fn attendance_saved(
    writer: &mut AssignmentWriter<'_>,
    attendance: &AttendanceRow,
) -> Result<()> {
    let store = writer.store();
    let event = store.event(attendance.event_id).await?.with_context(|| {
        format!(
            "attendance {} references missing event {}",
            attendance.id, attendance.event_id
        )
    })?;
    let term = Term::from_id(event.term_id)
        .with_context(|| format!("event {} has invalid term key", event.id))?;
    let user = attendance.user_id;

    let history = store.attendance_history(user).await?;
    let term_history: Vec<_> = history
        .iter()
        .filter(|attended| attended.term_id == event.term_id)
        .collect();
    let term_events = store.term_events(event.term_id).await?;

    // Attended events whose names cover the whole alphabet this term.
    if alphabet_covered(term_history.iter().map(|attended| attended.name.as_str())) {
        writer
            .assign(user, "alphabet_attendance", Assignment::acquired(term))
            .await?;
    }

    // Every event of this event's type this term.
    if let Some((_, code)) = EVENT_TYPE_ACHIEVEMENTS
        .iter()
        .find(|(name, _)| *name == event.event_type)
    {
        let offered = term_events
            .iter()
            .filter(|e| e.event_type == event.event_type)
            .count();
        let attended = term_history
            .iter()
            .filter(|a| a.event_type == event.event_type)
            .count();
        if offered == attended {
            writer
                .assign(user, &format!("attend_all_{code}"), Assignment::acquired(term))
                .await?;
        }
    }

    // Lifetime attendance benchmarks.
    for &benchmark in LIFETIME_BENCHMARKS {
        let short_name = format!("attend{benchmark:03}events");
        let assignment = if history.len() < benchmark {
            Assignment::progress(history.len() as i64)
        } else {
            let crossing = &history[benchmark - 1];
            let crossing_term = Term::from_id(crossing.term_id).with_context(|| {
                format!("event {} has invalid term key", crossing.event_id)
            })?;
            Assignment::acquired(crossing_term).counting(history.len() as i64)
        };
        writer.assign(user, &short_name, assignment).await?;
    }

    // One event of every type offered this term. Attended types are a
    // subset of offered types, so comparing counts compares the sets.
    let types_attended: HashSet<&str> = term_history
        .iter()
        .map(|attended| attended.event_type.as_str())
        .collect();
    let types_offered: HashSet<&str> = term_events
        .iter()
        .map(|event| event.event_type.as_str())
        .collect();
    if types_attended.len() == types_offered.len() {
        writer
            .assign(user, "attend_each_type", Assignment::acquired(term))
            .await?;
    }

    // Name-matched one-offs.
    if D15.is_match(&event.name) {
        writer
            .assign(user, "attend_d15", Assignment::acquired(term))
            .await?;
    }
    if event.name.contains("National Convention") {
        writer
            .assign(user, "attend_convention", Assignment::acquired(term))
            .await?;
    }
    if event.name.contains("Envelope Stuffing") {
        writer
            .assign(user, "attend_envelope_stuffing", Assignment::acquired(term))
            .await?;
    }
    if event.name == "Candidate Meeting" && term == Term::new(Season::Fall, 2013) {
        writer
            .assign(user, "berkeley_explosion", Assignment::acquired(term))
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d15_pattern() {
        assert!(D15.is_match("District 15 Conference"));
        assert!(D15.is_match("D15 Mixer"));
        assert!(D15.is_match("Spring D 15 Meeting"));
        assert!(!D15.is_match("Dorm 15 Social"));
        assert!(!D15.is_match("district 15"));
    }

    #[test]
    fn type_table_covers_the_known_types() {
        for (name, code) in EVENT_TYPE_ACHIEVEMENTS {
            assert!(!name.is_empty());
            assert!(code.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
        assert!(EVENT_TYPE_ACHIEVEMENTS
            .iter()
            .any(|(name, _)| *name == "Fun"));
    }
}
