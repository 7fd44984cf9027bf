//! Queue ceiling and priority ordering through the controller

use board_render::prelude::*;
use board_render::TaskOutcome;
use board_test_utils::{container, Harness, MockRenderService};

#[tokio::test]
async fn test_200_mounts_never_exceed_ceiling() {
    let h = Harness::with_config(
        MockRenderService::new().gated(),
        PreviewConfig::default().with_concurrency(50),
    );
    let containers: Vec<_> = (0..200).map(|_| container(200.0, 40.0)).collect();

    let mut cards = Vec::with_capacity(200);
    for (i, el) in containers.iter().enumerate() {
        let request = MountRequest::new(format!("card-{i}"), format!("body {i}"));
        cards.push(PreviewController::mount(&h.ctx, el, request).await.unwrap());
    }

    for _ in 0..1_000 {
        if h.service.render_calls() == 50 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(h.service.render_calls(), 50);
    assert_eq!(h.session.queue().running_len(), 50);
    assert_eq!(h.session.queue().pending_len(), 150);

    h.service.open_gate();
    h.session.queue().on_idle().await;

    let stats = h.session.queue().stats();
    assert_eq!(stats.submitted, 200);
    assert_eq!(stats.completed, 200);
    assert_eq!(stats.peak_running, 50);
    assert_eq!(h.service.peak_in_flight(), 50);
    assert_eq!(h.service.render_calls(), 200);
    assert!(cards.iter().all(|c| c.handle().status() == HandleStatus::Ready));
}

#[tokio::test]
async fn test_higher_priority_mount_renders_first() {
    let h = Harness::with_config(
        MockRenderService::new().gated(),
        PreviewConfig::default().with_concurrency(1),
    );
    let blocker_el = container(200.0, 40.0);
    let _blocker = PreviewController::mount(&h.ctx, &blocker_el, MountRequest::new("blocker", "blocker"))
        .await
        .unwrap();

    let els: Vec<_> = (0..3).map(|_| container(200.0, 40.0)).collect();
    let mut a = PreviewController::mount(&h.ctx, &els[0], MountRequest::new("a", "A"))
        .await
        .unwrap();
    let mut b = PreviewController::mount(&h.ctx, &els[1], MountRequest::new("b", "B").with_priority(5))
        .await
        .unwrap();
    let mut c = PreviewController::mount(&h.ctx, &els[2], MountRequest::new("c", "C"))
        .await
        .unwrap();

    h.service.open_gate();
    for card in [&mut a, &mut b, &mut c] {
        assert_eq!(card.take_task().unwrap().wait().await, TaskOutcome::Completed);
    }

    assert_eq!(h.service.rendered(), vec!["blocker", "B", "A", "C"]);
}

#[tokio::test]
async fn test_default_priority_comes_from_config() {
    let h = Harness::with_config(
        MockRenderService::new().gated(),
        PreviewConfig::default()
            .with_concurrency(1)
            .with_default_priority(3),
    );
    let els: Vec<_> = (0..3).map(|_| container(200.0, 40.0)).collect();

    let _blocker = PreviewController::mount(&h.ctx, &els[0], MountRequest::new("blocker", "blocker"))
        .await
        .unwrap();
    let _low = PreviewController::mount(&h.ctx, &els[1], MountRequest::new("low", "low").with_priority(1))
        .await
        .unwrap();
    let _default = PreviewController::mount(&h.ctx, &els[2], MountRequest::new("default", "default"))
        .await
        .unwrap();

    h.service.open_gate();
    h.session.queue().on_idle().await;
    assert_eq!(h.service.rendered(), vec!["blocker", "default", "low"]);
}

#[tokio::test]
async fn test_shutdown_drops_queued_mounts() {
    let h = Harness::with_config(
        MockRenderService::new().gated(),
        PreviewConfig::default().with_concurrency(1),
    );
    let els: Vec<_> = (0..3).map(|_| container(200.0, 40.0)).collect();
    let mut cards = Vec::new();
    for (i, el) in els.iter().enumerate() {
        let request = MountRequest::new(format!("card-{i}"), "body");
        cards.push(PreviewController::mount(&h.ctx, el, request).await.unwrap());
    }

    h.session.shutdown();
    let outcomes = [
        cards[1].take_task().unwrap().wait().await,
        cards[2].take_task().unwrap().wait().await,
    ];
    assert_eq!(outcomes, [TaskOutcome::Cancelled, TaskOutcome::Cancelled]);

    // dropped mounts settle and leave nothing behind in the cache
    for card in &cards[1..] {
        assert!(card.completion().is_resolved());
        assert!(card.handle().is_unloaded());
        assert!(!h.ctx.view().cache().contains(card.entity_id()));
    }
    assert_eq!(h.ctx.view().cache().len(), 1);
    assert_eq!(h.ctx.view().owned_count(), 1);

    h.service.open_gate();
    assert_eq!(cards[0].take_task().unwrap().wait().await, TaskOutcome::Completed);
    assert_eq!(cards[0].handle().status(), HandleStatus::Ready);
    assert_eq!(h.service.render_calls(), 1);
    assert_eq!(h.ctx.view().cache().stats().pending, 0);
}

#[tokio::test]
async fn test_mount_after_shutdown_settles_without_reservation() {
    let h = Harness::new(MockRenderService::new());
    h.session.shutdown();

    let el = container(200.0, 40.0);
    let mut card = PreviewController::mount(&h.ctx, &el, MountRequest::new("card-1", "body"))
        .await
        .unwrap();
    assert_eq!(card.take_task().unwrap().wait().await, TaskOutcome::Cancelled);
    assert!(card.completion().is_resolved());
    assert!(h.ctx.view().cache().is_empty());

    // a second attempt is a fresh miss, not a join on a dead reservation
    let again = PreviewController::mount(&h.ctx, &el, MountRequest::new("card-1", "body"))
        .await
        .unwrap();
    assert!(!again.was_cache_hit());
    assert!(again.completion().is_resolved());
    assert_eq!(h.service.render_calls(), 0);
}
