//! Meta rules — achievements earned by earning achievements, and credit
//! for drawing achievement icons.

use anyhow::Result;
use std::collections::HashSet;

use super::assign::{Assignment, AssignmentWriter};
use crate::storage::{AchievementRow, ProgressRow};
use crate::term::Term;

/// Chapter awards that together earn the trio achievement.
const AWARD_TRIO: &[&str] = &["cots", "mots", "oots"];

const COMPLETION_BENCHMARKS: &[usize] = &[15];

const ICON_BENCHMARKS: &[usize] = &[1, 5];

/// Runs for every newly written ledger row.
pub(crate) async fn progress_saved(
    writer: &mut AssignmentWriter<'_>,
    record: &ProgressRow,
) -> Result<()> {
    award_trio(writer, record).await?;
    completion(writer, record).await?;
    Ok(())
}

/// All three of COTS, MOTS, and OOTS → the trio achievement, in the term
/// of the award that completed the set.
async fn award_trio(writer: &mut AssignmentWriter<'_>, record: &ProgressRow) -> Result<()> {
    if !AWARD_TRIO.contains(&record.achievement.as_str()) {
        return Ok(());
    }
    let acquired = writer.store().acquired_achievements(record.user_id).await?;
    let names: HashSet<&str> = acquired.iter().map(|row| row.achievement.as_str()).collect();
    if AWARD_TRIO.iter().all(|name| names.contains(name)) {
        if let Some(term) = record.term() {
            writer
                .assign(record.user_id, "cots_mots_oots", Assignment::acquired(term))
                .await?;
        }
    }
    Ok(())
}

/// Fifteen acquired achievements, credited in the term of the fifteenth
/// in acquisition order.
async fn completion(writer: &mut AssignmentWriter<'_>, record: &ProgressRow) -> Result<()> {
    // The completion achievement must not trigger its own recount. The
    // short-name comparison is fragile under renames; kept as the
    // documented behavior.
    if record.achievement == "acquire_15_achievements" {
        return Ok(());
    }
    let acquired = writer.store().acquired_achievements(record.user_id).await?;
    for &benchmark in COMPLETION_BENCHMARKS {
        let short_name = format!("acquire_{benchmark:02}_achievements");
        if acquired.len() < benchmark {
            writer
                .assign(
                    record.user_id,
                    &short_name,
                    Assignment::progress(acquired.len() as i64),
                )
                .await?;
        } else if let Some(term) = acquired[benchmark - 1].term() {
            writer
                .assign(
                    record.user_id,
                    &short_name,
                    Assignment::acquired(term).counting(acquired.len() as i64),
                )
                .await?;
        }
    }
    Ok(())
}

/// Runs when a catalog entry is saved: credit the icon's creator.
/// Icon achievements have no historical term, so they land in the
/// caller-supplied current term.
pub(crate) async fn achievement_saved(
    writer: &mut AssignmentWriter<'_>,
    current_term: Term,
    achievement: &AchievementRow,
) -> Result<()> {
    let Some(creator) = achievement.icon_creator else {
        return Ok(());
    };
    let icons = writer.store().achievements_by_icon_creator(creator).await?;
    for &benchmark in ICON_BENCHMARKS {
        let short_name = format!("create_{benchmark:02}_icons");
        let assignment = if icons.len() < benchmark {
            Assignment::progress(icons.len() as i64)
        } else {
            Assignment::acquired(current_term).counting(icons.len() as i64)
        };
        writer.assign(creator, &short_name, assignment).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::term::Season;

    fn fa2013() -> Term {
        Term::new(Season::Fall, 2013)
    }

    async fn make_store() -> Storage {
        let store = Storage::in_memory().await.unwrap();
        for short_name in [
            "cots",
            "mots",
            "oots",
            "cots_mots_oots",
            "acquire_15_achievements",
            "create_01_icons",
            "create_05_icons",
        ] {
            store
                .upsert_achievement(&AchievementRow {
                    short_name: short_name.into(),
                    name: short_name.into(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn trio_requires_all_three_awards() {
        let store = make_store().await;
        let mut writer = AssignmentWriter::new(&store);
        writer.assign(7, "cots", Assignment::acquired(fa2013())).await.unwrap();
        writer.assign(7, "mots", Assignment::acquired(fa2013())).await.unwrap();
        for row in writer.take_written() {
            let mut meta_writer = AssignmentWriter::new(&store);
            progress_saved(&mut meta_writer, &row).await.unwrap();
        }
        assert!(store
            .find_progress(7, "cots_mots_oots", false, None)
            .await
            .unwrap()
            .is_none());

        writer.assign(7, "oots", Assignment::acquired(fa2013())).await.unwrap();
        for row in writer.take_written() {
            let mut meta_writer = AssignmentWriter::new(&store);
            progress_saved(&mut meta_writer, &row).await.unwrap();
        }
        let trio = store
            .find_progress(7, "cots_mots_oots", false, None)
            .await
            .unwrap()
            .unwrap();
        assert!(trio.acquired);
        assert_eq!(trio.term_id, Some(fa2013().id()));
    }

    #[tokio::test]
    async fn completion_ignores_its_own_row() {
        let store = make_store().await;
        let row = store
            .insert_progress(7, "acquire_15_achievements", true, 15, 15, None, None, "")
            .await
            .unwrap();
        let mut writer = AssignmentWriter::new(&store);
        progress_saved(&mut writer, &row).await.unwrap();
        assert!(writer.take_written().is_empty());
    }

    #[tokio::test]
    async fn icon_credit_goes_to_the_creator() {
        let store = make_store().await;
        let achievement = AchievementRow {
            short_name: "attend_d15".into(),
            name: "District 15".into(),
            icon_filename: "d15.png".into(),
            icon_creator: Some(42),
            ..Default::default()
        };
        store.upsert_achievement(&achievement).await.unwrap();
        let mut writer = AssignmentWriter::new(&store);
        achievement_saved(&mut writer, fa2013(), &achievement).await.unwrap();

        let first = store
            .find_progress(42, "create_01_icons", false, None)
            .await
            .unwrap()
            .unwrap();
        assert!(first.acquired);
        assert_eq!(first.term_id, Some(fa2013().id()));
        let fifth = store
            .find_progress(42, "create_05_icons", false, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!fifth.acquired);
        assert_eq!(fifth.progress, 1);
    }
}
