//! End-to-end engine tests: domain saves dispatched through the full rule
//! chain against an in-memory database.

use quark_engine::rules::{dispatch, DomainEvent};
use quark_engine::storage::{AchievementRow, Storage};
use quark_engine::term::{Season, Term};

fn sp(year: i32) -> Term {
    Term::new(Season::Spring, year)
}

fn fa(year: i32) -> Term {
    Term::new(Season::Fall, year)
}

/// In-memory store with the catalog entries these scenarios award.
/// Catalog rows the rules would write to but which are absent are
/// silently skipped, so only what the assertions read is seeded.
async fn make_store() -> Storage {
    let store = Storage::in_memory().await.unwrap();
    let catalog: &[(&str, i64)] = &[
        ("attend025events", 25),
        ("attend050events", 50),
        ("alphabet_attendance", 1),
        ("attend_each_type", 1),
        ("attend_d15", 1),
        ("officersemester01", 1),
        ("officersemester02", 2),
        ("twice_same_position", 2),
        ("thrice_same_position", 3),
        ("two_repeated_positions", 2),
        ("three_unique_positions", 3),
        ("straighttothetop", 1),
        ("acquire_15_achievements", 15),
    ];
    for &(short_name, goal) in catalog {
        store
            .upsert_achievement(&AchievementRow {
                short_name: short_name.into(),
                name: short_name.into(),
                goal,
                ..Default::default()
            })
            .await
            .unwrap();
    }
    store
}

/// Save one event plus the user's attendance and run the rules on it.
async fn attend(store: &Storage, user: i64, name: &str, event_type: &str, term: Term) {
    let event = store.save_event(name, event_type, term, 1).await.unwrap();
    let row = store.save_attendance(user, event.id).await.unwrap();
    dispatch(store, term, &DomainEvent::AttendanceSaved(&row))
        .await
        .unwrap();
}

async fn appoint(store: &Storage, user: i64, position: &str, is_chair: bool, term: Term) {
    let row = store
        .save_officer(user, position, is_chair, term)
        .await
        .unwrap();
    dispatch(store, term, &DomainEvent::OfficerSaved(&row))
        .await
        .unwrap();
}

#[tokio::test]
async fn twenty_four_attendances_are_progress_not_acquisition() {
    let store = make_store().await;
    for i in 0..24 {
        attend(&store, 7, &format!("Event {i}"), "Fun", sp(2012)).await;
    }
    let row = store
        .find_progress(7, "attend025events", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(!row.acquired);
    assert_eq!(row.progress, 24);
    assert_eq!(row.goal, 25);
    assert_eq!(row.term_id, None);
}

#[tokio::test]
async fn benchmark_term_is_the_twenty_fifth_attendance() {
    let store = make_store().await;
    for i in 0..24 {
        attend(&store, 7, &format!("Event {i}"), "Fun", sp(2012)).await;
    }
    attend(&store, 7, "Event 24", "Fun", fa(2012)).await;

    let row = store
        .find_progress(7, "attend025events", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(row.acquired);
    assert_eq!(row.term_id, Some(fa(2012).id()));
}

#[tokio::test]
async fn backfill_uses_chronological_order_not_save_order() {
    let store = make_store().await;
    // 25 attendances already imported for Spring 2012, never dispatched.
    for i in 0..25 {
        let event = store
            .save_event(&format!("Imported {i}"), "Fun", sp(2012), 1)
            .await
            .unwrap();
        store.save_attendance(7, event.id).await.unwrap();
    }
    // The save that triggers the recount is a year later. The recorded
    // term must be the chronological 25th attendance, not this one.
    attend(&store, 7, "Banquet", "Big Social", fa(2013)).await;

    let row = store
        .find_progress(7, "attend025events", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(row.acquired);
    assert_eq!(row.term_id, Some(sp(2012).id()));
}

#[tokio::test]
async fn acquisition_term_stays_put_while_progress_climbs() {
    let store = make_store().await;
    for i in 0..25 {
        attend(&store, 7, &format!("Event {i}"), "Fun", sp(2012)).await;
    }
    let acquired = store
        .find_progress(7, "attend025events", false, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(acquired.term_id, Some(sp(2012).id()));

    for i in 0..5 {
        attend(&store, 7, &format!("Later {i}"), "Fun", fa(2013)).await;
    }
    let after = store
        .find_progress(7, "attend025events", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(after.acquired);
    assert_eq!(after.term_id, Some(sp(2012).id()));
    assert_eq!(after.progress, 30);
}

#[tokio::test]
async fn dispatching_the_same_save_twice_converges() {
    let store = make_store().await;
    let event = store
        .save_event("District 15 Conference", "Meeting", fa(2013), 1)
        .await
        .unwrap();
    let row = store.save_attendance(7, event.id).await.unwrap();
    dispatch(&store, fa(2013), &DomainEvent::AttendanceSaved(&row))
        .await
        .unwrap();
    let first = store.user_ledger(7).await.unwrap();

    dispatch(&store, fa(2013), &DomainEvent::AttendanceSaved(&row))
        .await
        .unwrap();
    let second = store.user_ledger(7).await.unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.acquired, b.acquired);
        assert_eq!(a.progress, b.progress);
        assert_eq!(a.term_id, b.term_id);
    }
}

#[tokio::test]
async fn repeated_position_streaks_earn_their_awards() {
    let store = make_store().await;
    appoint(&store, 7, "it", false, sp(2012)).await;
    appoint(&store, 7, "it", false, fa(2012)).await;

    let twice = store
        .find_progress(7, "twice_same_position", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(twice.acquired);
    assert_eq!(twice.term_id, Some(fa(2012).id()));
    assert!(store
        .find_progress(7, "two_repeated_positions", false, None)
        .await
        .unwrap()
        .is_none());

    appoint(&store, 7, "historian", false, sp(2013)).await;
    appoint(&store, 7, "historian", false, fa(2013)).await;

    let both = store
        .find_progress(7, "two_repeated_positions", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(both.acquired);
    assert_eq!(both.term_id, Some(fa(2013).id()));
    assert!(store
        .find_progress(7, "thrice_same_position", false, None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn alternating_positions_are_not_a_streak() {
    let store = make_store().await;
    appoint(&store, 7, "it", false, sp(2012)).await;
    appoint(&store, 7, "historian", false, fa(2012)).await;
    appoint(&store, 7, "it", false, sp(2013)).await;

    assert!(store
        .find_progress(7, "twice_same_position", false, None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn vp_within_two_terms_is_straight_to_the_top() {
    let store = make_store().await;
    appoint(&store, 7, "historian", false, sp(2009)).await;
    appoint(&store, 7, "vp", false, fa(2009)).await;

    let row = store
        .find_progress(7, "straighttothetop", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(row.acquired);
    assert_eq!(row.term_id, Some(fa(2009).id()));
}

#[tokio::test]
async fn tenure_terms_come_from_the_nth_distinct_term() {
    let store = make_store().await;
    // Two positions in one term still count as one officer semester.
    appoint(&store, 7, "historian", false, sp(2012)).await;
    appoint(&store, 7, "it", false, sp(2012)).await;

    let first = store
        .find_progress(7, "officersemester01", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(first.acquired);
    assert_eq!(first.term_id, Some(sp(2012).id()));
    let second = store
        .find_progress(7, "officersemester02", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(!second.acquired);
    assert_eq!(second.progress, 1);

    appoint(&store, 7, "it", false, fa(2012)).await;
    let second = store
        .find_progress(7, "officersemester02", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(second.acquired);
    assert_eq!(second.term_id, Some(fa(2012).id()));
}

#[tokio::test]
async fn ledger_writes_chain_into_the_completion_count() {
    let store = make_store().await;
    let event = store
        .save_event("District 15 Conference", "Meeting", fa(2013), 1)
        .await
        .unwrap();
    let row = store.save_attendance(7, event.id).await.unwrap();
    dispatch(&store, fa(2013), &DomainEvent::AttendanceSaved(&row))
        .await
        .unwrap();

    // attend_d15 and attend_each_type were both acquired by that save;
    // the chained meta rules must have counted them.
    let completion = store
        .find_progress(7, "acquire_15_achievements", false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(!completion.acquired);
    assert!(completion.progress >= 2);
}
