mod common;

use std::time::Duration;

use chrono::TimeDelta;
use common::{hours_from_now, new_event, test_db, user};
use sportmatch::{
    events::{
        roster::{Roster, RosterConfig},
        store::{EventFilter, Events},
        Level,
    },
    CoreError,
};
use uuid::Uuid;

fn roster(pool: &sqlx::SqlitePool) -> (Events, Roster) {
    (
        Events::new(pool.clone()),
        Roster::new(pool.clone(), RosterConfig::default()),
    )
}

async fn stored_count(pool: &sqlx::SqlitePool, id: Uuid) -> (i64, String) {
    sqlx::query_as("SELECT participant_count, participants FROM events WHERE id=?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn creator_is_the_first_participant() {
    let db = test_db().await;
    let (events, _) = roster(&db.pool);

    let event = events.create(&user("host"), new_event("padel", 4, hours_from_now(2))).await.unwrap();
    assert_eq!(event.participants, vec![user("host")]);
    assert_eq!(event.participant_count(), 1);
    let stored = events.get(event.id).await.unwrap();
    assert_eq!(stored.id, event.id);
    assert_eq!(stored.participants, event.participants);
    assert_eq!(stored.location, event.location);
    assert_eq!(stored.version, 0);
}

#[tokio::test]
async fn invalid_events_are_rejected() {
    let db = test_db().await;
    let (events, _) = roster(&db.pool);
    let host = user("host");

    let err = events.create(&host, new_event("padel", 0, hours_from_now(2))).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "capacity", .. }));

    let err = events.create(&host, new_event("padel", 2, hours_from_now(-1))).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "start_time", .. }));

    let err = events.create(&host, new_event("  ", 2, hours_from_now(1))).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "sport", .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_overbook() {
    let db = test_db().await;
    let (events, roster) = roster(&db.pool);
    let capacity = 4;
    let contenders = 10;

    let event = events.create(&user("host"), new_event("football", capacity, hours_from_now(3))).await.unwrap();

    let joins: Vec<_> = (0..contenders)
        .map(|i| {
            let roster = roster.clone();
            tokio::spawn(async move { roster.try_enroll(event.id, &user(&format!("player{i}"))).await })
        })
        .collect();

    let (mut enrolled, mut full) = (0, 0);
    for join in joins {
        match join.await.unwrap() {
            Ok(_) => enrolled += 1,
            Err(CoreError::EventFull { capacity: c, .. }) => {
                assert_eq!(c, capacity);
                full += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // the creator already holds one slot
    assert_eq!(enrolled, capacity - 1);
    assert_eq!(full, contenders - (capacity - 1));

    let event = events.get(event.id).await.unwrap();
    assert_eq!(event.participant_count(), capacity);
    let (count, participants) = stored_count(&db.pool, event.id).await;
    assert_eq!(count, i64::from(capacity));
    assert_eq!(serde_json::from_str::<Vec<String>>(&participants).unwrap().len(), capacity as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_racers_for_the_last_slot() {
    let db = test_db().await;
    let (events, roster) = roster(&db.pool);
    let event = events.create(&user("host"), new_event("tennis", 2, hours_from_now(1))).await.unwrap();

    let x = {
        let roster = roster.clone();
        tokio::spawn(async move { roster.try_enroll(event.id, &user("x")).await })
    };
    let y = {
        let roster = roster.clone();
        tokio::spawn(async move { roster.try_enroll(event.id, &user("y")).await })
    };
    let results = [x.await.unwrap(), y.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(CoreError::EventFull { .. }))));
    assert_eq!(events.get(event.id).await.unwrap().participant_count(), 2);
}

#[tokio::test]
async fn re_enrolling_is_a_duplicate_and_changes_nothing() {
    let db = test_db().await;
    let (events, roster) = roster(&db.pool);
    let event = events.create(&user("host"), new_event("tennis", 2, hours_from_now(1))).await.unwrap();

    let joined = roster.try_enroll(event.id, &user("x")).await.unwrap();
    assert_eq!(joined.participants, vec![user("host"), user("x")]);
    assert_eq!(joined.version, event.version + 1);

    // full, but the duplicate is reported first
    for id in ["x", "host"] {
        let err = roster.try_enroll(event.id, &user(id)).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateParticipant { .. }), "{err}");
    }

    let (count, _) = stored_count(&db.pool, event.id).await;
    assert_eq!(count, 2);
}

#[tokio::test]
async fn unknown_event_is_not_found() {
    let db = test_db().await;
    let (_, roster) = roster(&db.pool);
    let id = Uuid::now_v7();

    let err = roster.try_enroll(id, &user("x")).await.unwrap_err();
    assert!(matches!(err, CoreError::EventNotFound { id: missing } if missing == id));
}

#[tokio::test]
async fn started_events_refuse_joins() {
    let db = test_db().await;
    let (events, roster) = roster(&db.pool);
    let event = events.create(&user("host"), new_event("run", 10, hours_from_now(1))).await.unwrap();

    let later = event.start_time + TimeDelta::seconds(1);
    let err = roster.try_enroll_at(event.id, &user("x"), later).await.unwrap_err();
    assert!(matches!(err, CoreError::EventStarted { .. }));
    assert_eq!(events.get(event.id).await.unwrap().participant_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_single_attempt_is_enough_while_slots_remain() {
    let db = test_db().await;
    let events = Events::new(db.pool.clone());
    let impatient = Roster::new(
        db.pool.clone(),
        RosterConfig {
            max_attempts: 1,
            backoff: Duration::ZERO,
        },
    );
    let event = events.create(&user("host"), new_event("swim", 20, hours_from_now(1))).await.unwrap();

    let joins: Vec<_> = (0..12)
        .map(|i| {
            let roster = impatient.clone();
            tokio::spawn(async move { roster.try_enroll(event.id, &user(&format!("s{i}"))).await })
        })
        .collect();
    for join in joins {
        join.await.unwrap().unwrap();
    }

    assert_eq!(events.get(event.id).await.unwrap().participant_count(), 13);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn large_events_fill_exactly_under_contention() {
    let db = test_db().await;
    let (events, roster) = roster(&db.pool);
    let capacity = 40;
    let contenders = 80;

    let event = events.create(&user("host"), new_event("run", capacity, hours_from_now(2))).await.unwrap();

    let joins: Vec<_> = (0..contenders)
        .map(|i| {
            let roster = roster.clone();
            tokio::spawn(async move { roster.try_enroll(event.id, &user(&format!("runner{i}"))).await })
        })
        .collect();

    let (mut enrolled, mut full) = (0, 0);
    for join in joins {
        match join.await.unwrap() {
            Ok(_) => enrolled += 1,
            Err(CoreError::EventFull { .. }) => full += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(enrolled, capacity - 1);
    assert_eq!(full, contenders - (capacity - 1));

    let event = events.get(event.id).await.unwrap();
    assert_eq!(event.participant_count(), capacity);
    let mut unique = event.participants.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), capacity as usize);
}

#[tokio::test]
async fn upcoming_events_are_filtered_and_sorted_by_start() {
    let db = test_db().await;
    let (events, _) = roster(&db.pool);
    let host = user("host");

    let late = events.create(&host, new_event("tennis", 2, hours_from_now(5))).await.unwrap();
    let soon = events.create(&host, new_event("tennis", 2, hours_from_now(1))).await.unwrap();
    let mut advanced = new_event("golf", 2, hours_from_now(2));
    advanced.level = Level::Advanced;
    let golf = events.create(&host, advanced).await.unwrap();

    let all = events.list_upcoming(&EventFilter::default()).await.unwrap();
    let ids: Vec<_> = all.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![soon.id, golf.id, late.id]);

    let tennis = events
        .list_upcoming(&EventFilter { sport: Some("tennis".to_owned()), level: None })
        .await
        .unwrap();
    assert_eq!(tennis.len(), 2);

    let advanced = events
        .list_upcoming(&EventFilter { sport: None, level: Some(Level::Advanced) })
        .await
        .unwrap();
    assert_eq!(advanced.iter().map(|e| e.id).collect::<Vec<_>>(), vec![golf.id]);
}
