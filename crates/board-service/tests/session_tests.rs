//! Session actor behaviour under concurrent callers.
//!
//! Drives sessions through the registry the way the transport does, using
//! `TestClient` fixtures in place of WebSocket connections.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use board_service::actors::{CloseReason, JoinOutcome, LeaveOutcome};
use board_service::errors::BoardError;
use board_test_utils::{test_registry, TestClient};
use std::collections::HashSet;

#[tokio::test]
async fn test_concurrent_posts_are_seen_in_one_order() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();

    let (mut alice, _) = TestClient::join(&session, "alice").await;
    let (mut bob, _) = TestClient::join(&session, "bob").await;
    let (mut carol, _) = TestClient::join(&session, "carol").await;

    const POSTERS: usize = 4;
    const PER_POSTER: usize = 10;

    let tasks: Vec<_> = (0..POSTERS)
        .map(|poster| {
            let session = session.clone();
            tokio::spawn(async move {
                for i in 0..PER_POSTER {
                    session
                        .post(format!("poster-{poster}"), format!("{poster}:{i}"))
                        .await
                        .unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let total = POSTERS * PER_POSTER;
    let seen_by_alice = alice.expect_contents(total).await;
    let seen_by_bob = bob.expect_contents(total).await;
    let seen_by_carol = carol.expect_contents(total).await;

    assert_eq!(seen_by_alice, seen_by_bob);
    assert_eq!(seen_by_alice, seen_by_carol);

    // No duplicates, no drops.
    let unique: HashSet<&String> = seen_by_alice.iter().collect();
    assert_eq!(unique.len(), total);

    // Each poster's own sequence keeps its order.
    for poster in 0..POSTERS {
        let prefix = format!("{poster}:");
        let own: Vec<&String> = seen_by_alice
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .collect();
        let expected: Vec<String> = (0..PER_POSTER).map(|i| format!("{poster}:{i}")).collect();
        assert_eq!(own, expected.iter().collect::<Vec<_>>());
    }

    alice.assert_idle();
}

#[tokio::test]
async fn test_join_during_posts_sees_every_message_once() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();
    let (mut alice, _) = TestClient::join(&session, "alice").await;

    for i in 0..20 {
        session.post("alice", format!("m{i}")).await.unwrap();
    }

    let poster = {
        let session = session.clone();
        tokio::spawn(async move {
            for i in 20..30 {
                session.post("alice", format!("m{i}")).await.unwrap();
            }
        })
    };
    let (mut late, history) = TestClient::join(&session, "late").await;
    poster.await.unwrap();

    assert!(history.len() >= 20, "history must hold everything posted before the join");

    let mut seen_by_late: Vec<String> = history.iter().map(|m| m.content.clone()).collect();
    let live = late.expect_contents(30 - history.len()).await;
    seen_by_late.extend(live);

    let full_log = alice.expect_contents(30).await;
    assert_eq!(seen_by_late, full_log);
    late.assert_idle();
}

#[tokio::test]
async fn test_joining_twice_does_not_duplicate_delivery() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();
    let (mut bob, _) = TestClient::join(&session, "bob").await;

    let (again, mut rejected) = TestClient::new("bob", 8);
    assert_eq!(
        session.join(again).await.unwrap(),
        JoinOutcome::AlreadyMember
    );
    rejected.expect_end().await;

    assert_eq!(session.info().await.unwrap().member_count, 1);

    session.post("alice", "once").await.unwrap();
    assert_eq!(bob.expect_message().await.content, "once");
    bob.assert_idle();
}

#[tokio::test]
async fn test_unknown_leave_keeps_everyone() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();
    let (mut bob, _) = TestClient::join(&session, "bob").await;
    let (mut carol, _) = TestClient::join(&session, "carol").await;

    assert_eq!(
        session.leave("nobody").await.unwrap(),
        LeaveOutcome::NotMember
    );

    session.post("alice", "still two").await.unwrap();
    assert_eq!(bob.expect_message().await.content, "still two");
    assert_eq!(carol.expect_message().await.content, "still two");
}

#[tokio::test]
async fn test_creator_leave_closes_every_member() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();
    let (mut alice, _) = TestClient::join(&session, "alice").await;
    let (mut bob, _) = TestClient::join(&session, "bob").await;
    let (mut carol, _) = TestClient::join(&session, "carol").await;

    assert_eq!(
        session.leave("alice").await.unwrap(),
        LeaveOutcome::SessionClosed
    );

    for client in [&mut alice, &mut bob, &mut carol] {
        assert_eq!(client.expect_closed().await, CloseReason::CreatorLeft);
        client.expect_end().await;
    }

    assert!(matches!(
        session.post("bob", "hello?").await,
        Err(BoardError::SessionClosed)
    ));
}

#[tokio::test]
async fn test_broken_member_does_not_affect_others() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();
    let (mut alice, _) = TestClient::join(&session, "alice").await;
    let (gone, _) = TestClient::join(&session, "gone").await;
    let (mut carol, _) = TestClient::join(&session, "carol").await;

    drop(gone);

    let committed = session.post("alice", "anyone there").await;
    assert!(committed.is_ok(), "poster must not see the failed delivery");

    assert_eq!(alice.expect_message().await.content, "anyone there");
    assert_eq!(carol.expect_message().await.content, "anyone there");
    assert_eq!(session.info().await.unwrap().member_count, 2);
}

#[tokio::test]
async fn test_slow_member_is_disconnected_without_stalling_room() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();
    let (mut alice, _) = TestClient::join(&session, "alice").await;

    // A one-slot buffer is filled by the history event alone.
    let (handle, mut slow) = TestClient::new("slow", 1);
    session.join(handle).await.unwrap();

    session.post("alice", "one").await.unwrap();
    session.post("alice", "two").await.unwrap();

    assert_eq!(alice.expect_contents(2).await, vec!["one", "two"]);
    assert!(slow.expect_history().await.is_empty());
    slow.expect_end().await;
    assert_eq!(session.info().await.unwrap().member_count, 1);
}

#[tokio::test]
async fn test_author_receives_own_post() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();
    let (mut alice, _) = TestClient::join(&session, "alice").await;

    let committed = session.post("alice", "echo").await.unwrap();
    let received = alice.expect_message().await;

    assert_eq!(received, committed);
    assert_eq!(received.author, "alice");
}

#[tokio::test]
async fn test_disconnect_of_dropped_connection_keeps_rejoined_member() {
    let registry = test_registry();
    let session = registry.create_session("alice").await.unwrap();

    let (first, first_events) = TestClient::new("bob", 8);
    let first_connection = first.connection_id();
    session.join(first).await.unwrap();

    // The first connection goes away; the next post drops it from the room.
    drop(first_events);
    session.post("alice", "are you there").await.unwrap();
    assert_eq!(session.info().await.unwrap().member_count, 0);

    let (mut bob, history) = TestClient::join(&session, "bob").await;
    assert_eq!(history.len(), 1);

    // The old connection's exit arrives after the rejoin.
    assert_eq!(
        session.disconnect("bob", first_connection).await.unwrap(),
        LeaveOutcome::NotMember
    );
    assert_eq!(session.info().await.unwrap().member_count, 1);

    session.post("alice", "welcome back").await.unwrap();
    assert_eq!(bob.expect_message().await.content, "welcome back");
    bob.assert_idle();
}
