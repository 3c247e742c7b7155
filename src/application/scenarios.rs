//! End-to-end board scenarios: numbering under concurrency, moderation races, rate limits
//! and conversation flows, driven through the same services and router as production.

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::Board;
use crate::application::router::CommandRouter;
use crate::application::sequence::{SEQUENCE_KEY, SequenceCounter};
use crate::application::state::Session;
use crate::domain::error::BoardError;
use crate::domain::events::{Action, InboundEvent};
use crate::domain::traits::{Clock, Store};
use crate::domain::types::{Submission, SubmissionState, Visibility};
use crate::infrastructure::store::{COMMENTS, COUNTERS, RATE_LIMITS, SUBMISSIONS, USERS, save};
use crate::testing::{
    ConflictingStore, FailingStore, ManualClock, RecordingPublisher, RecordingTransport,
    TestBoard, approved_post, board_on, test_board, test_config,
};

async fn seed_counter(store: &dyn Store, last: u64) {
    save(store, COUNTERS, SEQUENCE_KEY, &SequenceCounter::at(last))
        .await
        .unwrap();
}

async fn submit_many(t: &TestBoard, n: usize) -> Vec<Submission> {
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(
            t.board
                .submissions
                .submit(&format!("@author{i}:x"), &format!("story number {i}"))
                .await
                .unwrap(),
        );
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_get_consecutive_numbers() {
    let t = test_board().await;
    seed_counter(&*t.store, 40).await;
    let subs = submit_many(&t, 16).await;

    let handles: Vec<_> = subs
        .iter()
        .enumerate()
        .map(|(i, sub)| {
            let board = t.board.clone();
            let id = sub.id.clone();
            let moderator = if i % 2 == 0 { "@admin:x" } else { "@admin2:x" };
            tokio::spawn(async move { board.submissions.approve(&id, moderator).await })
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        let approved = handle.await.unwrap().unwrap();
        assert!(numbers.insert(approved.number.unwrap()));
    }
    assert_eq!(numbers, (41..=56).collect::<HashSet<u64>>());
    assert_eq!(t.board.allocator.current().await.unwrap(), 56);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reject_never_allocates_under_racing_approvals() {
    let t = test_board().await;
    seed_counter(&*t.store, 3).await;
    let subs = submit_many(&t, 12).await;

    // Every submission gets an approve and a reject at the same time.
    let mut handles = Vec::new();
    for sub in &subs {
        let board = t.board.clone();
        let id = sub.id.clone();
        handles.push(tokio::spawn(async move {
            board.submissions.approve(&id, "@admin:x").await.map(|_| ())
        }));
        let board = t.board.clone();
        let id = sub.id.clone();
        handles.push(tokio::spawn(async move {
            board
                .submissions
                .reject(&id, "@admin2:x", "racing")
                .await
                .map(|_| ())
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) | Err(BoardError::NotFound(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let all = t.board.repo.submissions().await.unwrap();
    let approved: Vec<&Submission> = all.iter().filter(|s| s.is_approved()).collect();
    let rejected: Vec<&Submission> = all
        .iter()
        .filter(|s| s.state == SubmissionState::Rejected)
        .collect();
    assert_eq!(approved.len() + rejected.len(), subs.len());
    assert!(rejected.iter().all(|s| s.number.is_none()));

    let numbers: HashSet<u64> = approved.iter().filter_map(|s| s.number).collect();
    let last = 3 + approved.len() as u64;
    assert_eq!(numbers, (4..=last).collect::<HashSet<u64>>());
    assert_eq!(t.board.allocator.current().await.unwrap(), last);
}

#[tokio::test]
async fn approving_twice_does_not_allocate_again() {
    let t = test_board().await;
    let sub = t.board.submissions.submit("@alice:x", "only once").await.unwrap();

    let first = t.board.submissions.approve(&sub.id, "@admin:x").await.unwrap();
    let second = t.board.submissions.approve(&sub.id, "@admin2:x").await;

    assert_eq!(first.number, Some(1));
    assert!(matches!(second, Err(BoardError::NotFound(_))));
    assert_eq!(t.board.allocator.current().await.unwrap(), 1);
    assert_eq!(t.publisher.posts().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_approvals_of_one_submission_allocate_once() {
    let t = test_board().await;
    let sub = t.board.submissions.submit("@alice:x", "contested").await.unwrap();

    let handles: Vec<_> = ["@admin:x", "@admin2:x", "@admin:x", "@admin2:x"]
        .into_iter()
        .map(|moderator| {
            let board = t.board.clone();
            let id = sub.id.clone();
            tokio::spawn(async move { board.submissions.approve(&id, moderator).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(approved) => {
                successes += 1;
                assert_eq!(approved.number, Some(1));
            }
            Err(e) => assert!(matches!(e, BoardError::NotFound(_))),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(t.board.allocator.current().await.unwrap(), 1);
}

#[tokio::test]
async fn stored_number_matches_allocation() {
    let t = test_board().await;
    let mut seen = Vec::new();
    for i in 0..3 {
        let sub = t
            .board
            .submissions
            .submit(&format!("@u{i}:x"), "round trip text")
            .await
            .unwrap();
        let approved = t.board.submissions.approve(&sub.id, "@admin:x").await.unwrap();
        let stored = t.board.repo.submission(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.number, approved.number);
        assert_eq!(stored.number, Some(t.board.allocator.current().await.unwrap()));
        seen.push(stored.number.unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3]);
}

#[tokio::test]
async fn fourth_comment_in_window_is_rate_limited() {
    let t = test_board().await;
    let post = approved_post(&t.board, "@alice:x", "a story worth reading").await;
    let comment = |text: &'static str| {
        let board = t.board.clone();
        let id = post.id.clone();
        async move {
            board
                .comments
                .add_comment(&id, "@bob:x", text, Visibility::Public)
                .await
        }
    };

    let start = t.clock.now_ms();
    for (offset, text) in [(0, "one!"), (1_000, "two!"), (2_000, "three!")] {
        t.clock.set(start + offset);
        comment(text).await.unwrap();
    }

    t.clock.set(start + 3_000);
    let err = comment("four!").await.unwrap_err();
    assert!(matches!(err, BoardError::RateLimited { retry_after_ms: 27_000 }));

    t.clock.set(start + 30_000);
    comment("four again").await.unwrap();
    let stored = t.board.repo.submission(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.comment_count, 4);
}

#[tokio::test]
async fn newer_flow_replaces_pending_one() {
    let t = test_board().await;
    let router = CommandRouter::new(t.board.clone());
    let a = approved_post(&t.board, "@alice:x", "first published story").await;
    t.clock.advance(60_000);
    let b = approved_post(&t.board, "@alice:x", "second published story").await;

    let press = |action: Action| InboundEvent::ButtonPress {
        action,
        from: "@bob:x".into(),
        message_ref: None,
    };
    router.route(press(Action::Comment(a.id.clone()))).await.unwrap();
    router.route(press(Action::Private(b.id.clone()))).await.unwrap();

    router
        .route(InboundEvent::FreeText {
            text: "meant for b".into(),
            from: "@bob:x".into(),
            chat: "!bob-dm".into(),
        })
        .await
        .unwrap();

    assert!(t.board.repo.comments_for(&a.id).await.unwrap().is_empty());
    let to_b = t.board.repo.comments_for(&b.id).await.unwrap();
    assert_eq!(to_b.len(), 1);
    assert_eq!(to_b[0].visibility, Visibility::Private);
    let now = t.board.now();
    assert_eq!(t.board.state.lock().await.session("@bob:x", now), Session::Idle);
}

#[tokio::test]
async fn pizza_end_to_end() {
    let t = test_board().await;
    seed_counter(&*t.store, 7).await;
    let router = CommandRouter::new(t.board.clone());

    router
        .route(InboundEvent::decode("I love pizza #food", "@alice:x", "!alice-dm", None))
        .await
        .unwrap();
    let pending = t.board.submissions.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    let sub = &pending[0];
    assert_eq!(sub.text, "I love pizza #food");
    assert_eq!(sub.hashtags, vec!["#food"]);

    let token = format!(".do {}", Action::Approve(sub.id.clone()));
    router
        .route(InboundEvent::decode(&token, "@admin:x", "!admin-dm", None))
        .await
        .unwrap();

    assert_eq!(t.board.allocator.current().await.unwrap(), 8);
    let stored = t.board.repo.submission(&sub.id).await.unwrap().unwrap();
    assert_eq!(stored.state, SubmissionState::Approved);
    assert_eq!(stored.number, Some(8));
    assert!(t.transport.texts_to("@alice:x").iter().any(|m| m.contains("#8")));

    let posts = t.publisher.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].contains("#8"));
    assert!(posts[0].contains("I love pizza #food"));
}

#[tokio::test]
async fn too_short_submission_writes_nothing() {
    let t = test_board().await;
    let err = t.board.submissions.submit("@alice:x", "abc").await.unwrap_err();
    assert!(matches!(err, BoardError::Validation(_)));

    let router = CommandRouter::new(t.board.clone());
    router
        .route(InboundEvent::decode("abc", "@alice:x", "!alice-dm", None))
        .await
        .unwrap();

    for collection in [USERS, SUBMISSIONS, COMMENTS, RATE_LIMITS, COUNTERS] {
        assert!(
            t.store.list(collection).await.unwrap().is_empty(),
            "{collection} was written"
        );
    }
    assert!(t.transport.texts_to("@admin:x").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_admins_two_submissions_same_instant() {
    let t = test_board().await;
    seed_counter(&*t.store, 7).await;
    let subs = submit_many(&t, 2).await;

    let (a, b) = tokio::join!(
        {
            let board = t.board.clone();
            let id = subs[0].id.clone();
            async move { board.submissions.approve(&id, "@admin:x").await }
        },
        {
            let board = t.board.clone();
            let id = subs[1].id.clone();
            async move { board.submissions.approve(&id, "@admin2:x").await }
        }
    );
    let (a, b) = (a.unwrap().number.unwrap(), b.unwrap().number.unwrap());
    assert_eq!(a.abs_diff(b), 1);
    assert_eq!(HashSet::from([a, b]), HashSet::from([8, 9]));
}

#[tokio::test]
async fn failed_admin_delivery_does_not_block_submission() {
    let t = test_board().await;
    t.transport.fail_for("@admin:x");
    let sub = t.board.submissions.submit("@alice:x", "still stored").await.unwrap();
    assert_eq!(sub.state, SubmissionState::Pending);
    assert_eq!(t.transport.texts_to("@admin2:x").len(), 1);
}

#[tokio::test]
async fn allocation_failure_leaves_submission_pending() {
    let store = Arc::new(ConflictingStore::on_collection(COUNTERS, u32::MAX));
    let transport = Arc::new(RecordingTransport::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let mut config = test_config();
    config.policy.allocator_retries = 3;
    let board = Board::new(
        config,
        store.clone(),
        transport.clone(),
        publisher.clone(),
        Arc::new(ManualClock::new(0)),
    );

    let sub = board.submissions.submit("@alice:x", "unlucky story").await.unwrap();
    let err = board.submissions.approve(&sub.id, "@admin:x").await.unwrap_err();
    assert!(matches!(err, BoardError::AllocationFailed { attempts: 3 }));

    let stored = board.repo.submission(&sub.id).await.unwrap().unwrap();
    assert!(stored.is_reviewable());
    assert!(stored.number.is_none());
    assert!(publisher.posts().is_empty());

    store.stop_conflicts();
    let approved = board.submissions.approve(&sub.id, "@admin:x").await.unwrap();
    assert_eq!(approved.number, Some(1));
}

/// Longest run of characters shared by `a` and `b`.
fn longest_common_run(a: &str, b: &str) -> usize {
    let (a, b): (Vec<char>, Vec<char>) = (a.chars().collect(), b.chars().collect());
    let mut best = 0;
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut k = 0;
            while i + k < a.len() && j + k < b.len() && a[i + k] == b[j + k] {
                k += 1;
            }
            best = best.max(k);
        }
    }
    best
}

#[tokio::test]
async fn public_ids_do_not_link_posts_by_one_author() {
    let t = test_board().await;
    let first = approved_post(&t.board, "@alice:x", "the first story").await;
    t.clock.advance(3_600_000);
    let second = approved_post(&t.board, "@alice:x", "the second story").await;
    let other = approved_post(&t.board, "@bob:x", "another story").await;

    assert!(longest_common_run(&first.id, &second.id) < 8, "{} / {}", first.id, second.id);
    assert!(longest_common_run(&first.id, &other.id) < 8);

    // Same author and instant under another deployment key gives an unrelated id.
    let elsewhere = test_board().await;
    elsewhere.clock.set(t.board.now() - 3_600_000);
    let twin = elsewhere
        .board
        .submissions
        .submit("@alice:x", "the first story")
        .await
        .unwrap();
    assert!(longest_common_run(&first.id, &twin.id) < 8);

    let posts = t.publisher.posts();
    assert_eq!(posts.len(), 3);
    assert!(posts.iter().all(|p| !p.contains("alice") && !p.contains("bob")));
}

#[tokio::test]
async fn interrupted_approval_reuses_its_number() {
    // Submit takes one submissions write and the claim another; the approval write fails.
    let store = Arc::new(FailingStore::new(SUBMISSIONS, 2));
    let (board, _transport, publisher) = board_on(store);
    let sub = board.submissions.submit("@alice:x", "bad timing").await.unwrap();

    let err = board.submissions.approve(&sub.id, "@admin:x").await.unwrap_err();
    assert!(matches!(err, BoardError::Store(_)));
    let stored = board.repo.submission(&sub.id).await.unwrap().unwrap();
    assert_eq!(stored.state, SubmissionState::Pending);
    assert_eq!(stored.review_claim.as_deref(), Some("@admin:x"));
    assert_eq!(board.allocator.reservation(&sub.id).await.unwrap(), Some(1));

    // Other moderators still see it as under review.
    let other = board.submissions.reject(&sub.id, "@admin2:x", "nope").await;
    assert!(matches!(other, Err(BoardError::NotFound(_))));
    assert!(matches!(
        board.submissions.approve(&sub.id, "@admin2:x").await,
        Err(BoardError::NotFound(_))
    ));

    let approved = board.submissions.approve(&sub.id, "@admin:x").await.unwrap();
    assert_eq!(approved.number, Some(1));
    assert_eq!(board.allocator.current().await.unwrap(), 1);
    assert_eq!(board.allocator.reservation(&sub.id).await.unwrap(), None);
    assert_eq!(publisher.posts().len(), 1);

    let next = approved_post(&board, "@bob:x", "no gap after").await;
    assert_eq!(next.number, Some(2));
}

#[tokio::test]
async fn released_claim_can_be_approved_by_another_moderator() {
    let store = Arc::new(FailingStore::new(SUBMISSIONS, 2));
    let (board, transport, _publisher) = board_on(store);
    let router = CommandRouter::new(board.clone());
    let sub = board.submissions.submit("@alice:x", "bad timing").await.unwrap();
    assert!(board.submissions.approve(&sub.id, "@admin:x").await.is_err());

    router
        .route(InboundEvent::decode(
            &format!(".release {}", sub.id),
            "@admin2:x",
            "!mods",
            None,
        ))
        .await
        .unwrap();
    assert!(transport.texts_to("!mods")[0].contains("#1"));

    let approved = board.submissions.approve(&sub.id, "@admin2:x").await.unwrap();
    assert_eq!(approved.number, Some(1));
    assert_eq!(board.allocator.current().await.unwrap(), 1);

    let again = board.submissions.release(&sub.id).await;
    assert!(matches!(again, Err(BoardError::NotFound(_))));
}

#[tokio::test]
async fn rejecting_a_released_submission_returns_its_number() {
    let store = Arc::new(FailingStore::new(SUBMISSIONS, 2));
    let (board, _transport, _publisher) = board_on(store);
    let sub = board.submissions.submit("@alice:x", "bad timing").await.unwrap();
    assert!(board.submissions.approve(&sub.id, "@admin:x").await.is_err());

    let (_, reserved) = board.submissions.release(&sub.id).await.unwrap();
    assert_eq!(reserved, Some(1));
    board
        .submissions
        .reject(&sub.id, "@admin2:x", "changed our minds")
        .await
        .unwrap();
    assert_eq!(board.allocator.current().await.unwrap(), 0);

    let next = approved_post(&board, "@bob:x", "takes number one").await;
    assert_eq!(next.number, Some(1));
}

#[tokio::test]
async fn reward_failure_still_reports_publish_failure() {
    // Submit takes the only healthy users write; the approval reward fails.
    let store = Arc::new(FailingStore::new(USERS, 1));
    let (board, transport, publisher) = board_on(store);
    publisher.fail_posts(true);
    let sub = board.submissions.submit("@alice:x", "unlucky twice").await.unwrap();

    let err = board.submissions.approve(&sub.id, "@admin:x").await.unwrap_err();
    assert!(matches!(err, BoardError::PublishFailed { number: 1, .. }));
    assert!(transport.texts_to("@alice:x").is_empty());
    assert_eq!(board.repo.user("@alice:x").await.unwrap().approved, 0);
}
