mod common;

use std::time::Duration;

use chrono::TimeDelta;
use common::{language_poll, limits, new_poll, now, test_db, vote_rows};
use poll_ledger::{
    error::{Entity, PollError},
    ledger, poll, tally,
};
use uuid::Uuid;

async fn counts(pool: &sqlx::SqlitePool, poll_id: Uuid) -> Vec<i64> {
    tally::get_results(pool, poll_id, now())
        .await
        .unwrap()
        .options
        .into_iter()
        .map(|o| o.votes)
        .collect()
}

async fn assert_counters_match_rows(pool: &sqlx::SqlitePool, poll_id: Uuid) {
    let stored = tally::get_results(pool, poll_id, now()).await.unwrap().options;
    let counted = tally::recount(pool, poll_id).await.unwrap();
    assert_eq!(stored, counted);
}

#[tokio::test]
async fn best_language_scenario() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;
    assert_eq!(created.options.len(), 2);

    let go = created.options[0].id;

    let vote = ledger::cast_vote(&db.pool, &limits(), created.id, go, "alice", now())
        .await
        .unwrap();
    assert_eq!(vote.option_id, go);
    assert_eq!(vote.voter_id, "alice");
    assert_eq!(counts(&db.pool, created.id).await, vec![1, 0]);

    let err = ledger::cast_vote(&db.pool, &limits(), created.id, go, "alice", now())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::DuplicateVote { option_id, .. } if option_id == go));
    assert_eq!(counts(&db.pool, created.id).await, vec![1, 0]);

    let later = created.expires_at + TimeDelta::minutes(1);
    let err = ledger::cast_vote(&db.pool, &limits(), created.id, go, "bob", later)
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Expired { poll_id, .. } if poll_id == created.id));

    assert_eq!(vote_rows(&db.pool).await, 1);
    assert_counters_match_rows(&db.pool, created.id).await;
}

#[tokio::test]
async fn vote_at_the_deadline_is_expired() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;

    let err = ledger::cast_vote(
        &db.pool,
        &limits(),
        created.id,
        created.options[1].id,
        "carol",
        created.expires_at,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PollError::Expired { .. }));
    assert_eq!(vote_rows(&db.pool).await, 0);
    assert_eq!(counts(&db.pool, created.id).await, vec![0, 0]);
}

#[tokio::test]
async fn duplicate_on_expired_poll_reports_expired() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;
    let go = created.options[0].id;

    ledger::cast_vote(&db.pool, &limits(), created.id, go, "alice", now())
        .await
        .unwrap();

    let err = ledger::cast_vote(&db.pool, &limits(), created.id, go, "alice", created.expires_at)
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Expired { .. }));
    assert_eq!(counts(&db.pool, created.id).await, vec![1, 0]);
}

#[tokio::test]
async fn unknown_poll_or_option_is_not_found() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;
    let missing = Uuid::new_v4();

    let err = ledger::cast_vote(&db.pool, &limits(), missing, created.options[0].id, "alice", now())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::NotFound { entity: Entity::Poll, id } if id == missing));

    let err = ledger::cast_vote(&db.pool, &limits(), created.id, missing, "alice", now())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::NotFound { entity: Entity::Option, id } if id == missing));

    assert_eq!(vote_rows(&db.pool).await, 0);
}

#[tokio::test]
async fn option_from_another_poll_is_not_found() {
    let db = test_db().await;
    let first = language_poll(&db.pool).await;
    let second = poll::create_poll(
        &db.pool,
        &limits(),
        new_poll("Tabs or spaces?", &["Tabs", "Spaces"], TimeDelta::days(1)),
        now(),
    )
    .await
    .unwrap();

    let foreign = second.options[0].id;
    let err = ledger::cast_vote(&db.pool, &limits(), first.id, foreign, "alice", now())
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::NotFound { entity: Entity::Option, .. }));
    assert_eq!(counts(&db.pool, first.id).await, vec![0, 0]);
    assert_eq!(counts(&db.pool, second.id).await, vec![0, 0]);
}

#[tokio::test]
async fn blank_voter_is_rejected_without_writes() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;

    let err = ledger::cast_vote(&db.pool, &limits(), created.id, created.options[0].id, "   ", now())
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Validation(ref v) if v.field == "voter_id"));
    assert_eq!(vote_rows(&db.pool).await, 0);
}

#[tokio::test]
async fn one_voter_may_vote_once_per_option() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;
    let (go, rust) = (created.options[0].id, created.options[1].id);

    ledger::cast_vote(&db.pool, &limits(), created.id, go, "alice", now()).await.unwrap();
    ledger::cast_vote(&db.pool, &limits(), created.id, rust, "alice", now()).await.unwrap();
    ledger::cast_vote(&db.pool, &limits(), created.id, go, "bob", now()).await.unwrap();

    assert_eq!(counts(&db.pool, created.id).await, vec![2, 1]);
}

#[tokio::test]
async fn counters_track_vote_rows_across_mixed_sequence() {
    let db = test_db().await;
    let created = poll::create_poll(
        &db.pool,
        &limits(),
        new_poll("Favourite season?", &["Spring", "Summer", "Autumn", "Winter"], TimeDelta::days(7)),
        now(),
    )
    .await
    .unwrap();

    let voters = ["ana", "ben", "cho", "dev", "eli"];
    let mut accepted = 0;
    let mut duplicates = 0;

    // Walks every (option, voter) pair twice in a scrambled order.
    for step in 0..(2 * voters.len() * created.options.len()) {
        let option = &created.options[(step * 3) % created.options.len()];
        let voter = voters[(step * 7) % voters.len()];

        match ledger::cast_vote(&db.pool, &limits(), created.id, option.id, voter, now()).await {
            Ok(_) => accepted += 1,
            Err(PollError::DuplicateVote { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 20);
    assert_eq!(duplicates, 20);
    assert_eq!(vote_rows(&db.pool).await, accepted);
    assert_eq!(counts(&db.pool, created.id).await.iter().sum::<i64>(), accepted);
    assert_counters_match_rows(&db.pool, created.id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_identical_votes_record_exactly_one() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;
    let rust = created.options[1].id;

    let attempts: Vec<_> = (0..24)
        .map(|_| {
            let pool = db.pool.clone();
            let poll_id = created.id;
            tokio::spawn(async move { ledger::cast_vote(&pool, &limits(), poll_id, rust, "alice", now()).await })
        })
        .collect();

    let mut ok = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => ok += 1,
            Err(PollError::DuplicateVote { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(vote_rows(&db.pool).await, 1);
    assert_eq!(counts(&db.pool, created.id).await, vec![0, 1]);
    assert_counters_match_rows(&db.pool, created.id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_distinct_voters_are_all_counted() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;

    let attempts: Vec<_> = (0..30)
        .map(|i| {
            let pool = db.pool.clone();
            let poll_id = created.id;
            let option_id = created.options[i % 2].id;
            tokio::spawn(async move {
                ledger::cast_vote(&pool, &limits(), poll_id, option_id, &format!("voter-{i}"), now()).await
            })
        })
        .collect();

    for attempt in attempts {
        attempt.await.unwrap().unwrap();
    }

    assert_eq!(counts(&db.pool, created.id).await, vec![15, 15]);
    assert_counters_match_rows(&db.pool, created.id).await;
}

#[tokio::test]
async fn storage_failure_is_propagated_and_rolled_back() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;

    sqlx::query("DROP TABLE votes").execute(&db.pool).await.unwrap();

    let err = ledger::cast_vote(&db.pool, &limits(), created.id, created.options[0].id, "alice", now())
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Storage(sqlx::Error::Database(_))), "{err}");
    assert_eq!(err.kind(), "storage_failure");
    assert_eq!(counts(&db.pool, created.id).await, vec![0, 0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_votes_leave_no_partial_state() {
    let db = test_db().await;
    let created = language_poll(&db.pool).await;

    let attempts: Vec<_> = (0..200u64)
        .map(|i| {
            let pool = db.pool.clone();
            let poll_id = created.id;
            let option_id = created.options[(i % 2) as usize].id;
            tokio::spawn(async move {
                tokio::time::timeout(
                    Duration::from_millis(i % 4),
                    ledger::cast_vote(&pool, &limits(), poll_id, option_id, &format!("voter-{i}"), now()),
                )
                .await
            })
        })
        .collect();

    let mut completed = 0;
    for attempt in attempts {
        if let Ok(result) = attempt.await.unwrap() {
            result.unwrap();
            completed += 1;
        }
    }

    let rows = vote_rows(&db.pool).await;
    assert!(rows >= completed, "{rows} rows for {completed} completed votes");
    assert_eq!(counts(&db.pool, created.id).await.iter().sum::<i64>(), rows);
    assert_counters_match_rows(&db.pool, created.id).await;
}
