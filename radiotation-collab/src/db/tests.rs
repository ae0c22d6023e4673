//! Scenarios every [Database] implementation has to pass.

use std::sync::Arc;

use radiotation_core::{Config, EntryId, QueueFilter, QueueId, RoomId, RotatorKind, Track, UserId};

use super::*;

/// Runs each scenario against a fresh in-memory and a fresh on-disk database.
macro_rules! on_every_backend {
    ($($scenario:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $scenario() {
                    let database = super::MemoryDatabase::new(super::Config::default());
                    super::$scenario(&database).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test]
                async fn $scenario() {
                    let dir = tempfile::tempdir().unwrap();
                    let database = super::SqliteDatabase::open(
                        dir.path().join("radiotation.db"),
                        super::Config::default(),
                    )
                    .await
                    .unwrap();

                    super::$scenario(&database).await;
                    super::Database::close(&database).await;
                }
            )*
        }
    };
}

on_every_backend!(
    rooms_and_membership,
    search_rooms,
    round_robin_end_to_end,
    queue_insertion_and_removal,
    played_tracks_are_immutable,
    empty_queues_are_skipped,
    shuffle_is_fair,
    veto_cooldown,
);

mod concurrent {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn memory() {
        let database = Arc::new(MemoryDatabase::new(Config::default()));
        concurrent_callers(database).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radiotation.db");
        let database = SqliteDatabase::open(path, Config::default()).await.unwrap();
        let database = Arc::new(database);

        concurrent_callers(database.clone()).await;
        database.close().await;
    }
}

async fn user<Db: Database>(db: &Db, id: &str) -> UserId {
    db.create_user(NewUser {
        id: UserId::new(id),
        display_name: id.to_uppercase(),
    })
    .await
    .unwrap()
    .id
}

async fn room<Db: Database>(db: &Db, kind: RotatorKind, members: &[&UserId]) -> RoomId {
    let room = db
        .create_room(NewRoom {
            display_name: "Test Room".to_string(),
            rotator: kind,
        })
        .await
        .unwrap();

    for member in members {
        db.add_user_to_room(&room.id, member).await.unwrap();
    }

    room.id
}

async fn push<Db: Database>(db: &Db, queue_id: &QueueId, track: &str) -> EntryId {
    let last = db
        .tracks(queue_id, QueueFilter::All)
        .await
        .unwrap()
        .last()
        .map(|t| t.id.clone());

    let track = Track::new(track, track.to_uppercase());
    db.add_track(queue_id, track, last).await.unwrap()
}

async fn names<Db: Database>(db: &Db, queue_id: &QueueId, filter: QueueFilter) -> Vec<String> {
    db.tracks(queue_id, filter)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.track.id.to_string())
        .collect()
}

async fn rooms_and_membership<Db: Database>(db: &Db) {
    let a = user(db, "a").await;
    let b = user(db, "b").await;

    assert!(matches!(
        db.create_user(NewUser {
            id: a.clone(),
            display_name: "Again".to_string()
        })
        .await,
        Err(DatabaseError::Conflict { .. })
    ));

    let room_id = room(db, RotatorKind::Shuffle, &[&b, &a]).await;

    let room = db.room(&room_id).await.unwrap();
    assert_eq!(room.display_name, "Test Room");
    assert_eq!(room.rotator, RotatorKind::Shuffle);
    assert_eq!(room.id.as_str().len(), 4);

    let members: Vec<_> = db
        .members(&room_id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(members, [b.clone(), a.clone()], "members are in join order");

    assert!(matches!(
        db.add_user_to_room(&room_id, &a).await,
        Err(DatabaseError::Conflict { .. })
    ));
    assert!(matches!(
        db.add_user_to_room(&room_id, &UserId::new("ghost")).await,
        Err(DatabaseError::NotFound { .. })
    ));
    assert!(matches!(
        db.add_user_to_room(&RoomId::new("NOPE"), &a).await,
        Err(DatabaseError::NotFound { .. })
    ));
    assert!(matches!(
        db.room(&RoomId::new("NOPE")).await,
        Err(DatabaseError::NotFound { .. })
    ));
    let stranger = QueueId::new(&room_id, &UserId::new("ghost"));
    assert!(matches!(
        db.tracks(&stranger, QueueFilter::All).await,
        Err(DatabaseError::NotFound { .. })
    ));
}

async fn search_rooms<Db: Database>(db: &Db) {
    for name in ["Room One", "Room Two", "Another One", "Some Guy's Room"] {
        db.create_room(NewRoom {
            display_name: name.to_string(),
            rotator: RotatorKind::RoundRobin,
        })
        .await
        .unwrap();
    }

    let cases: [(&str, &[&str]); 7] = [
        ("Room", &["Room One", "Room Two", "Some Guy's Room"]),
        ("room", &["Room One", "Room Two", "Some Guy's Room"]),
        ("oNe", &["Another One", "Room One"]),
        ("TWO", &["Room Two"]),
        ("guy", &["Some Guy's Room"]),
        ("", &[]),
        ("llaswd", &[]),
    ];

    for (query, expected) in cases {
        let mut found: Vec<_> = db
            .search_rooms(query)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.display_name)
            .collect();
        found.sort();

        assert_eq!(found, expected, "searching for {:?}", query);
    }
}

async fn round_robin_end_to_end<Db: Database>(db: &Db) {
    let users = [user(db, "a").await, user(db, "b").await, user(db, "c").await];
    let members = [&users[0], &users[1], &users[2]];
    let room_id = room(db, RotatorKind::RoundRobin, &members).await;

    for (user, track) in users.iter().zip(["ta", "tb", "tc"]) {
        push(db, &QueueId::new(&room_id, user), track).await;
    }

    // A newcomer is placed halfway between the cursor and the end of the
    // rotation, so with join order a, b, c the third member lands before b
    // and turns go a, c, b rather than in join order.
    for (expected_user, expected_track) in [("a", "ta"), ("c", "tc"), ("b", "tb")] {
        let (user, track) = db.next_track(&room_id).await.unwrap();

        assert_eq!(user.id.as_str(), expected_user);
        assert_eq!(track.id.as_str(), expected_track);
    }

    assert!(matches!(
        db.next_track(&room_id).await,
        Err(DatabaseError::Exhausted)
    ));

    let history: Vec<_> = db
        .history(&room_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.user_id.to_string(), e.track.id.to_string()))
        .collect();

    assert_eq!(
        history,
        [
            ("a".to_string(), "ta".to_string()),
            ("c".to_string(), "tc".to_string()),
            ("b".to_string(), "tb".to_string())
        ]
    );
}

async fn queue_insertion_and_removal<Db: Database>(db: &Db) {
    let a = user(db, "a").await;
    let room_id = room(db, RotatorKind::RoundRobin, &[&a]).await;
    let queue = QueueId::new(&room_id, &a);

    let b = push(db, &queue, "b").await;
    let d = push(db, &queue, "d").await;
    let a_entry = db
        .add_track(&queue, Track::new("a", "A"), None)
        .await
        .unwrap();
    let c = db
        .add_track(&queue, Track::new("c", "C"), Some(b.clone()))
        .await
        .unwrap();

    assert_eq!(
        names(db, &queue, QueueFilter::All).await,
        ["a", "b", "c", "d"]
    );

    db.remove_track(&queue, &c).await.unwrap();
    db.remove_track(&queue, &a_entry).await.unwrap();
    assert_eq!(names(db, &queue, QueueFilter::All).await, ["b", "d"]);

    let missing = Some(EntryId::new("missing"));
    assert!(matches!(
        db.add_track(&queue, Track::new("x", "X"), missing).await,
        Err(DatabaseError::NotFound { .. })
    ));
    assert!(matches!(
        db.remove_track(&queue, &c).await,
        Err(DatabaseError::NotFound { .. })
    ));

    // The head was removed, so the next head is served
    let (_, track) = db.next_track(&room_id).await.unwrap();
    assert_eq!(track.id.as_str(), "b");

    db.remove_track(&queue, &d).await.unwrap();
    let unplayed = names(db, &queue, QueueFilter::UnplayedOnly).await;
    assert!(unplayed.is_empty());

    push(db, &queue, "e").await;
    let (_, track) = db.next_track(&room_id).await.unwrap();
    assert_eq!(
        track.id.as_str(),
        "e",
        "a drained queue serves whatever is added next"
    );
}

async fn played_tracks_are_immutable<Db: Database>(db: &Db) {
    let a = user(db, "a").await;
    let room_id = room(db, RotatorKind::RoundRobin, &[&a]).await;
    let queue = QueueId::new(&room_id, &a);

    let first = push(db, &queue, "one").await;
    push(db, &queue, "two").await;

    db.next_track(&room_id).await.unwrap();

    assert!(matches!(
        db.remove_track(&queue, &first).await,
        Err(DatabaseError::Conflict { .. })
    ));
    assert!(matches!(
        db.add_track(&queue, Track::new("x", "X"), None).await,
        Err(DatabaseError::Conflict { .. })
    ));
    assert_eq!(names(db, &queue, QueueFilter::All).await, ["one", "two"]);

    // Right after a played track is fine, and it plays next
    db.add_track(&queue, Track::new("x", "X"), Some(first))
        .await
        .unwrap();

    assert_eq!(names(db, &queue, QueueFilter::PlayedOnly).await, ["one"]);
    assert_eq!(
        names(db, &queue, QueueFilter::UnplayedOnly).await,
        ["x", "two"]
    );

    let (_, track) = db.next_track(&room_id).await.unwrap();
    assert_eq!(track.id.as_str(), "x");
}

async fn empty_queues_are_skipped<Db: Database>(db: &Db) {
    let a = user(db, "a").await;
    let b = user(db, "b").await;
    let room_id = room(db, RotatorKind::RoundRobin, &[&a, &b]).await;

    assert!(matches!(
        db.next_track(&room_id).await,
        Err(DatabaseError::Exhausted)
    ));

    let queue = QueueId::new(&room_id, &b);
    push(db, &queue, "one").await;
    push(db, &queue, "two").await;

    for expected in ["one", "two"] {
        let (user, track) = db.next_track(&room_id).await.unwrap();

        assert_eq!(user.id, b, "a has nothing queued and is passed over");
        assert_eq!(track.id.as_str(), expected);
    }

    assert!(matches!(
        db.next_track(&room_id).await,
        Err(DatabaseError::Exhausted)
    ));
}

async fn shuffle_is_fair<Db: Database>(db: &Db) {
    const TRACKS: usize = 1000;

    let a = user(db, "a").await;
    let b = user(db, "b").await;
    let room_id = room(db, RotatorKind::Shuffle, &[&a, &b]).await;

    for member in [&a, &b] {
        let queue = QueueId::new(&room_id, member);
        let mut last = None;

        for i in 0..TRACKS {
            let track = Track::new(format!("{}-{}", member, i), "Track");
            last = Some(db.add_track(&queue, track, last).await.unwrap());
        }
    }

    let mut served_a = 0;

    for _ in 0..TRACKS {
        let (user, _) = db.next_track(&room_id).await.unwrap();

        if user.id == a {
            served_a += 1;
        }
    }

    let share = served_a as f64 / TRACKS as f64;
    assert!(
        (share - 0.5).abs() <= 0.05,
        "a was served {} out of {} times",
        served_a,
        TRACKS
    );
}

async fn veto_cooldown<Db: Database>(db: &Db) {
    let a = user(db, "a").await;
    let b = user(db, "b").await;
    let room_id = room(db, RotatorKind::RoundRobin, &[&a, &b]).await;

    assert!(matches!(
        db.mark_vetoed(&room_id, &a).await,
        Err(DatabaseError::Conflict { .. })
    ));

    for member in [&a, &b] {
        let queue = QueueId::new(&room_id, member);

        for i in 0..4 {
            push(db, &queue, &format!("{}{}", member, i)).await;
        }
    }

    db.next_track(&room_id).await.unwrap();

    let vetoed = db.mark_vetoed(&room_id, &a).await.unwrap();
    assert!(vetoed.vetoed);
    assert_eq!(vetoed.vetoed_by, Some(a.clone()));
    assert_eq!(vetoed.track.id.as_str(), "a0");

    assert!(
        matches!(
            db.mark_vetoed(&room_id, &b).await,
            Err(DatabaseError::Conflict { .. })
        ),
        "a track can only be vetoed once"
    );

    // With two members, a has to let four tracks pass
    for served in 1..=4 {
        db.next_track(&room_id).await.unwrap();

        let result = db.mark_vetoed(&room_id, &a).await;

        if served < 4 {
            assert!(
                matches!(result, Err(DatabaseError::Conflict { .. })),
                "a is still cooling down after {} tracks",
                served
            );
        } else {
            assert!(result.is_ok(), "a may veto again after {} tracks", served);
        }
    }

    assert!(matches!(
        db.mark_vetoed(&room_id, &UserId::new("ghost")).await,
        Err(DatabaseError::NotFound { .. })
    ));

    let history = db.history(&room_id).await.unwrap();
    let vetoes: Vec<_> = history.iter().map(|e| e.vetoed).collect();
    assert_eq!(vetoes, [true, false, false, false, true]);
}

/// Interleaves inserts and serves from many tasks against one room.
async fn concurrent_callers<Db: Database>(db: Arc<Db>) {
    const ADDS: usize = 60;
    const SERVES: usize = 30;

    let mut members = Vec::new();

    for id in ["a", "b", "c"] {
        members.push(user(&*db, id).await);
    }

    let refs: Vec<_> = members.iter().collect();
    let room_id = room(&*db, RotatorKind::RoundRobin, &refs).await;

    let mut adds = Vec::with_capacity(ADDS);
    let mut serves = Vec::with_capacity(SERVES);

    for i in 0..ADDS {
        let adder = db.clone();
        let queue_id = QueueId::new(&room_id, &members[i % members.len()]);

        // Front inserts conflict once the head of a queue was played
        adds.push(tokio::spawn(async move {
            let track = Track::new(format!("t{}", i), "Track");
            adder.add_track(&queue_id, track, None).await
        }));

        if i % (ADDS / SERVES) == 0 {
            let server = db.clone();
            let room_id = room_id.clone();

            serves.push(tokio::spawn(async move {
                server.next_track(&room_id).await
            }));
        }
    }

    let mut added = 0;
    let mut conflicts = 0;

    for handle in adds {
        match handle.await.unwrap() {
            Ok(_) => added += 1,
            Err(DatabaseError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("adding a track failed: {}", e),
        }
    }

    let mut served = 0;

    for handle in serves {
        match handle.await.unwrap() {
            Ok(_) => served += 1,
            Err(DatabaseError::Exhausted) => {}
            Err(e) => panic!("serving a track failed: {}", e),
        }
    }

    assert_eq!(added + conflicts, ADDS);
    assert!(added > 0);

    let history = db.history(&room_id).await.unwrap();
    assert_eq!(history.len(), served);

    let mut listed = 0;
    let mut played = 0;

    for member in &members {
        let queue_id = QueueId::new(&room_id, member);
        let queue = db.tracks(&queue_id, QueueFilter::All).await.unwrap();

        assert!(
            queue.windows(2).all(|w| w[0].played || !w[1].played),
            "played tracks of {} have to stay in front",
            member
        );

        listed += queue.len();
        played += queue.iter().filter(|t| t.played).count();
    }

    assert_eq!(listed, added);
    assert_eq!(played, served);
}
