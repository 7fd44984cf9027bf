//! Moving cached output between containers

use board_dom::Size;
use board_render::prelude::*;
use board_test_utils::{board, card_in, container, Harness, MockRenderService};
use std::time::Duration;

async fn ready_card(h: &Harness, el: &board_dom::Element, id: &str, content: &str) -> PreviewController {
    let mut card = PreviewController::mount(&h.ctx, el, MountRequest::new(id, content))
        .await
        .unwrap();
    card.take_task().unwrap().wait().await;
    assert_eq!(card.handle().status(), HandleStatus::Ready);
    card
}

#[tokio::test]
async fn test_migration_preserves_identity() {
    let h = Harness::new(MockRenderService::new());
    let (_root, lanes) = board(2);
    let a = card_in(&lanes[0], 240.0, 60.0);

    let mut first = ready_card(&h, &a, "card-1", "Write release notes").await;
    let output = first.handle().output_root().unwrap();
    let paragraph = output.first_child().unwrap();

    // card dragged to the second lane: old wrapper unmounts, new one mounts
    first.detach();
    a.remove();
    let b = card_in(&lanes[1], 240.0, 60.0);
    let second = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "Write release notes"))
        .await
        .unwrap();

    assert!(second.was_cache_hit());
    assert_eq!(a.child_count(), 0);
    let moved = b.first_child().unwrap();
    assert!(moved.ptr_eq(&output));
    assert!(moved.first_child().unwrap().ptr_eq(&paragraph));
    assert_eq!(h.service.render_calls(), 1);
    assert_eq!(second.handle().attach_state(), AttachState::Measuring);

    second.container_resized(Size::new(240.0, 60.0));
    assert_eq!(second.handle().attach_state(), AttachState::Attached);
}

#[tokio::test(start_paused = true)]
async fn test_new_container_reserves_measured_size() {
    let h = Harness::with_config(
        MockRenderService::new(),
        PreviewConfig::default().with_settle_delay(Duration::from_millis(10)),
    );
    let a = container(120.0, 64.0);
    let first = ready_card(&h, &a, "card-1", "body").await;
    first.container_resized(Size::new(120.0, 64.0));
    assert_eq!(first.handle().last_measured(), Some(Size::new(120.0, 64.0)));

    let b = container(0.0, 0.0);
    let _second = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "body"))
        .await
        .unwrap();
    assert_eq!(b.explicit_size(), Some(Size::new(120.0, 64.0)));
    assert_eq!(b.bounding_box(), Size::new(120.0, 64.0));

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(b.explicit_size(), Some(Size::new(120.0, 64.0)));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(b.explicit_size(), None);
}

#[tokio::test]
async fn test_unmeasured_handle_reserves_nothing() {
    let h = Harness::new(MockRenderService::new());
    let a = container(0.0, 0.0);
    let _first = ready_card(&h, &a, "card-1", "body").await;

    let b = container(0.0, 0.0);
    let second = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "body"))
        .await
        .unwrap();
    assert!(second.was_cache_hit());
    assert_eq!(b.explicit_size(), None);
    assert_eq!(h.ctx.reserved_size(second.entity_id()), None);
}

#[tokio::test]
async fn test_container_attached_event_moves_output() {
    let h = Harness::new(MockRenderService::new());
    let a = container(100.0, 20.0);
    let mut card = ready_card(&h, &a, "card-1", "body").await;

    let b = container(100.0, 20.0);
    let outcome = card.container_attached(&b).unwrap();
    assert!(outcome.moved);
    assert!(outcome.reserved);
    assert!(card.handle().is_bound_to(&b));
    assert_eq!(b.text_content(), "body");

    let again = card.container_attached(&b).unwrap();
    assert!(!again.moved);
    assert_eq!(b.child_count(), 1);
}

#[tokio::test]
async fn test_update_after_handle_moved_away_pulls_it_back() {
    let h = Harness::new(MockRenderService::new());
    let a = container(100.0, 20.0);
    let mut owner = ready_card(&h, &a, "card-1", "v1").await;

    // a second view of the same entity steals the output
    let b = container(100.0, 20.0);
    let _other = PreviewController::mount(&h.ctx, &b, MountRequest::new("card-1", "v1"))
        .await
        .unwrap();
    assert_eq!(a.child_count(), 0);

    assert!(owner.update_content("v2").await.unwrap());
    assert_eq!(b.child_count(), 0);
    assert_eq!(a.text_content(), "v2");
}

#[tokio::test]
async fn test_clone_is_a_static_copy() {
    let h = Harness::new(MockRenderService::new());
    let a = container(160.0, 48.0);
    let mut card = ready_card(&h, &a, "card-1", "original").await;
    card.container_resized(Size::new(160.0, 48.0));
    let output = card.handle().output_root().unwrap();

    let ghost = container(0.0, 0.0);
    let snapshot = h
        .ctx
        .render_clone(&EntityId::from("card-1"), &ghost)
        .unwrap()
        .unwrap();

    assert!(!snapshot.root().ptr_eq(&output));
    assert_eq!(snapshot.reserved(), Some(Size::new(160.0, 48.0)));
    assert_eq!(ghost.text_content(), "original");
    assert!(output.parent().unwrap().ptr_eq(&a));
    assert_eq!(h.ctx.view().cache().len(), 1);

    card.update_content("edited").await.unwrap();
    assert_eq!(a.text_content(), "edited");
    assert_eq!(ghost.text_content(), "original");

    let missing = h
        .ctx
        .render_clone(&EntityId::from("card-404"), &container(0.0, 0.0))
        .unwrap();
    assert!(missing.is_none());
    assert_eq!(h.ctx.view().cache().len(), 1);
}
