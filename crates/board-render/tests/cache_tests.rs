//! Render cache behaviour across mounts
//!
//! Identity, joining in-flight renders, idempotent content, failure retry
//! and view teardown.

use board_render::prelude::*;
use board_render::TaskOutcome;
use board_test_utils::{container, Harness, MockRenderService};

async fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if ready() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_same_entity_shares_one_handle() {
    let h = Harness::new(MockRenderService::new());
    let a = container(200.0, 40.0);

    let mut first = PreviewController::mount(&h.ctx, &a, MountRequest::new("card-1", "hello"))
        .await
        .unwrap();
    assert_eq!(first.take_task().unwrap().wait().await, TaskOutcome::Completed);

    let b = container(200.0, 40.0);
    let second = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "hello"))
        .await
        .unwrap();

    assert!(second.was_cache_hit());
    assert!(first.handle().ptr_eq(second.handle()));
    assert_eq!(h.ctx.view().cache().len(), 1);
    assert_eq!(h.service.render_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_first_requests_join() {
    let h = Harness::new(MockRenderService::new().gated());
    let a = container(200.0, 40.0);
    let b = container(200.0, 40.0);

    let first = PreviewController::mount(&h.ctx, &a, MountRequest::new("card-1", "hello"))
        .await
        .unwrap();
    let second = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "hello"))
        .await
        .unwrap();

    assert!(!first.was_cache_hit());
    assert!(second.was_cache_hit());
    assert!(first.handle().ptr_eq(second.handle()));
    assert!(!second.completion().is_resolved());

    h.service.open_gate();
    h.session.queue().on_idle().await;

    assert_eq!(h.service.render_calls(), 1);
    assert_eq!(h.session.queue().stats().submitted, 1);
    assert!(first.completion().is_resolved());
    assert!(second.completion().is_resolved());
    // output lands in the most recent container
    assert_eq!(a.child_count(), 0);
    assert_eq!(b.text_content(), "hello");
}

#[tokio::test]
async fn test_identical_content_costs_nothing() {
    let h = Harness::new(MockRenderService::new());
    let a = container(200.0, 40.0);

    let mut card = PreviewController::mount(&h.ctx, &a, MountRequest::new("card-1", "same"))
        .await
        .unwrap();
    card.take_task().unwrap().wait().await;
    let calls = h.service.total_calls();

    assert!(!card.update_content("same").await.unwrap());
    card.detach();
    let b = container(200.0, 40.0);
    let again = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "same"))
        .await
        .unwrap();

    assert!(again.was_cache_hit());
    assert_eq!(h.service.total_calls(), calls);
    assert_eq!(h.service.update_calls(), 0);
}

#[tokio::test]
async fn test_changed_content_on_remount_updates_in_place() {
    let h = Harness::new(MockRenderService::new());
    let a = container(200.0, 40.0);

    let mut card = PreviewController::mount(&h.ctx, &a, MountRequest::new("card-1", "v1"))
        .await
        .unwrap();
    card.take_task().unwrap().wait().await;
    let root = card.handle().output_root().unwrap();

    let b = container(200.0, 40.0);
    let again = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "v2"))
        .await
        .unwrap();

    assert!(again.handle().output_root().unwrap().ptr_eq(&root));
    assert_eq!(b.text_content(), "v2");
    assert_eq!(h.service.render_calls(), 1);
    assert_eq!(h.service.update_calls(), 1);
}

#[tokio::test]
async fn test_content_change_mid_render_is_reconciled() {
    let h = Harness::new(MockRenderService::new().gated());
    let a = container(200.0, 40.0);

    let mut card = PreviewController::mount(&h.ctx, &a, MountRequest::new("card-1", "v1"))
        .await
        .unwrap();
    let service = h.service.clone();
    wait_until(|| service.render_calls() == 1).await;

    assert!(!card.update_content("v2").await.unwrap());
    assert_eq!(card.handle().requested_content(), "v2");

    h.service.open_gate();
    card.take_task().unwrap().wait().await;

    assert_eq!(card.handle().status(), HandleStatus::Ready);
    assert_eq!(card.handle().content().as_deref(), Some("v2"));
    assert_eq!(a.text_content(), "v2");
    assert_eq!(h.service.update_calls(), 1);
}

#[tokio::test]
async fn test_failed_render_is_retried_by_next_request() {
    let service = MockRenderService::new();
    service.fail_when_contains("boom");
    let h = Harness::new(service);
    let a = container(200.0, 40.0);
    let id = EntityId::from("card-1");

    let mut card = PreviewController::mount(&h.ctx, &a, MountRequest::new("card-1", "boom"))
        .await
        .unwrap();
    assert_eq!(card.take_task().unwrap().wait().await, TaskOutcome::Failed);

    assert!(card.completion().is_resolved());
    assert_ne!(card.handle().status(), HandleStatus::Ready);
    assert!(!h.ctx.view().cache().contains(&id));
    assert_eq!(h.sink.len(), 1);
    assert!(h.sink.errors()[0].starts_with("render failed for card-1"));

    h.service.clear_failures();
    let mut retry = PreviewController::mount(&h.ctx, &a, MountRequest::new("card-1", "boom"))
        .await
        .unwrap();
    assert!(!retry.was_cache_hit());
    assert_eq!(retry.take_task().unwrap().wait().await, TaskOutcome::Completed);
    assert_eq!(h.service.render_calls(), 2);
    assert_eq!(a.text_content(), "boom");
}

#[tokio::test]
async fn test_failed_render_resolves_every_joined_card() {
    let h = Harness::new(MockRenderService::new().gated());
    h.service.fail_when_contains("boom");
    let a = container(200.0, 40.0);
    let b = container(200.0, 40.0);

    let mut first = PreviewController::mount(&h.ctx, &a, MountRequest::new("card-1", "boom"))
        .await
        .unwrap();
    let second = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "boom"))
        .await
        .unwrap();
    assert!(second.was_cache_hit());
    assert!(!first.completion().is_resolved());
    assert!(!second.completion().is_resolved());

    h.service.open_gate();
    assert_eq!(first.take_task().unwrap().wait().await, TaskOutcome::Failed);
    assert!(first.completion().is_resolved());
    assert!(second.completion().is_resolved());
    assert!(h.ctx.view().cache().is_empty());
    assert_eq!(h.sink.len(), 1);
}

#[tokio::test]
async fn test_joined_card_leaving_does_not_blank_the_first() {
    let h = Harness::new(MockRenderService::new());
    h.session.queue().pause();
    let x = container(200.0, 40.0);
    let y = container(200.0, 40.0);

    let mut first = PreviewController::mount(&h.ctx, &x, MountRequest::new("card-1", "hello"))
        .await
        .unwrap();
    let mut second = PreviewController::mount(&h.ctx, &y, MountRequest::new("card-1", "hello"))
        .await
        .unwrap();
    second.detach();
    y.remove();

    h.session.queue().resume();
    assert_eq!(first.take_task().unwrap().wait().await, TaskOutcome::Completed);

    assert!(!first.handle().is_unloaded());
    assert_eq!(first.handle().status(), HandleStatus::Ready);
    assert!(first.handle().is_bound_to(&x));
    assert_eq!(x.text_content(), "hello");
    assert_eq!(y.child_count(), 0);
    assert!(h.ctx.view().cache().contains(&EntityId::from("card-1")));
    assert!(first.update_content("hello again").await.unwrap());
    assert_eq!(x.text_content(), "hello again");
}

#[tokio::test]
async fn test_teardown_unloads_and_skips_pending_work() {
    let h = Harness::new(MockRenderService::new().gated());
    let containers: Vec<_> = (0..3).map(|_| container(200.0, 40.0)).collect();

    let mut cards = Vec::new();
    for (i, el) in containers.iter().enumerate() {
        let request = MountRequest::new(format!("card-{i}"), format!("body {i}"));
        cards.push(PreviewController::mount(&h.ctx, el, request).await.unwrap());
    }
    assert_eq!(h.ctx.view().cache().len(), 3);

    h.ctx.view().teardown();
    assert!(h.ctx.view().cache().is_empty());
    for card in &cards {
        assert!(card.handle().is_unloaded());
        assert!(card.completion().is_resolved());
    }

    h.service.open_gate();
    h.session.queue().on_idle().await;

    for el in &containers {
        assert_eq!(el.child_count(), 0);
    }
    assert!(h.ctx.view().cache().is_empty());
    assert!(h.sink.is_empty());
}
