use super::*;
use futures::StreamExt;
use shared::filter::FilterValue;
use tokio::time::{sleep, timeout};

fn controller() -> (PaginationFilterController, ReloadStream) {
    let mut controller = PaginationFilterController::new(ControllerOptions::default());
    let reloads = controller.take_reload_stream().expect("reload stream");
    (controller, reloads)
}

async fn next_reload(reloads: &mut ReloadStream) -> ReloadRequest {
    timeout(Duration::from_secs(5), reloads.next())
        .await
        .expect("reload emitted")
        .expect("stream open")
}

async fn assert_quiet(reloads: &mut ReloadStream) {
    assert!(
        timeout(Duration::from_secs(1), reloads.next()).await.is_err(),
        "no further reload expected"
    );
}

fn name_value(request: &PageRequest) -> Option<FilterValue> {
    request
        .filters
        .get("name")
        .map(|predicate| predicate.value.clone())
}

#[tokio::test(start_paused = true)]
async fn typing_into_a_filter_coalesces_into_one_reload() {
    let (mut controller, mut reloads) = controller();

    for typed in ["a", "ac", "acm", "acme"] {
        controller.set_filter(FilterPredicate::contains("name", typed));
        sleep(Duration::from_millis(30)).await;
    }

    let reload = next_reload(&mut reloads).await;
    assert_eq!(name_value(&reload.request), Some(FilterValue::from("acme")));
    assert_eq!(reload.generation, 4);
    assert_quiet(&mut reloads).await;
}

#[tokio::test(start_paused = true)]
async fn mutations_separated_by_the_window_reload_separately() {
    let (mut controller, mut reloads) = controller();

    controller.set_filter(FilterPredicate::equals("name", "a"));
    sleep(Duration::from_millis(150)).await;
    controller.set_filter(FilterPredicate::equals("name", "b"));

    assert_eq!(
        name_value(&next_reload(&mut reloads).await.request),
        Some(FilterValue::from("a"))
    );
    assert_eq!(
        name_value(&next_reload(&mut reloads).await.request),
        Some(FilterValue::from("b"))
    );
}

#[tokio::test(start_paused = true)]
async fn filter_change_resets_to_first_page_before_the_request() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(200));
    assert_eq!(controller.set_page(7), 7);

    controller.set_filter(FilterPredicate::equals("status", "open"));

    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page, 1);
    assert_eq!(controller.pagination().active_page, 1);
}

#[tokio::test(start_paused = true)]
async fn clearing_filters_on_page_three_returns_to_page_one() {
    let (mut controller, mut reloads) = controller();
    controller.set_filter(FilterPredicate::equals("name", "acme"));
    controller.set_pagination(PaginationPatch::total_items(50));
    controller.set_page(3);
    assert_eq!(next_reload(&mut reloads).await.request.page, 3);

    controller.clear_filters();
    let reload = next_reload(&mut reloads).await;
    assert!(reload.request.filters.is_empty());
    assert_eq!(reload.request.page, 1);

    controller.begin_loading();
    controller.finish_loading(8);
    assert_eq!(controller.pagination().active_page, 1);
    assert_eq!(controller.pagination().last_page(), 1);
    assert_quiet(&mut reloads).await;
}

#[tokio::test(start_paused = true)]
async fn shrinking_total_clamps_the_page_and_reloads_once() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(50));
    controller.set_page(5);
    next_reload(&mut reloads).await;

    controller.begin_loading();
    assert_eq!(controller.phase(), ControllerPhase::Loading);
    controller.finish_loading(12);
    assert_eq!(controller.phase(), ControllerPhase::Idle);

    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page, 2);
    assert!(!reload.reset_accumulated);
    controller.finish_loading(12);
    assert_quiet(&mut reloads).await;
}

#[tokio::test(start_paused = true)]
async fn switching_to_card_grid_resets_paging_and_accumulated_rows() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(40));
    controller.set_page(3);
    next_reload(&mut reloads).await;

    assert!(controller.set_layout_style(LayoutStyle::CardGrid));
    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.layout, LayoutStyle::CardGrid);
    assert_eq!(reload.request.page, 1);
    assert!(reload.reset_accumulated);

    assert!(!controller.set_layout_style(LayoutStyle::CardGrid));
    assert_quiet(&mut reloads).await;
}

#[tokio::test(start_paused = true)]
async fn reset_flag_survives_coalescing_with_a_later_page_change() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(40));

    controller.set_layout_style(LayoutStyle::CardGrid);
    controller.set_page(2);

    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page, 2);
    assert!(reload.reset_accumulated);
}

#[tokio::test(start_paused = true)]
async fn card_grid_paging_appends_but_filtering_restarts() {
    let mut controller = PaginationFilterController::new(ControllerOptions {
        layout: LayoutStyle::CardGrid,
        ..ControllerOptions::default()
    });
    let mut reloads = controller.take_reload_stream().expect("reload stream");
    controller.set_pagination(PaginationPatch::total_items(30));

    controller.set_page(2);
    assert!(!next_reload(&mut reloads).await.reset_accumulated);

    controller.set_filter(FilterPredicate::equals("name", "acme"));
    let reload = next_reload(&mut reloads).await;
    assert!(reload.reset_accumulated);
    assert_eq!(reload.request.page, 1);

    controller.refresh_pagination();
    assert!(next_reload(&mut reloads).await.reset_accumulated);
}

#[tokio::test(start_paused = true)]
async fn unchanged_pagination_does_not_reload() {
    let (mut controller, mut reloads) = controller();

    assert!(!controller.set_pagination(PaginationPatch::page(1)));
    assert!(!controller.set_pagination(PaginationPatch::total_items(90)));
    assert!(!controller.set_filter(FilterPredicate::equals("name", "")));
    assert_quiet(&mut reloads).await;

    assert!(controller.set_pagination(PaginationPatch {
        items_per_page: Some(25),
        ..PaginationPatch::default()
    }));
    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page_size, 25);
}

#[tokio::test(start_paused = true)]
async fn page_size_patch_restarts_from_page_one() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(100));
    controller.set_page(4);
    next_reload(&mut reloads).await;

    assert!(controller.set_pagination(PaginationPatch {
        items_per_page: Some(50),
        ..PaginationPatch::default()
    }));
    let pagination = controller.pagination();
    assert_eq!(pagination.active_page, 1);
    assert!(pagination.active_page <= pagination.last_page());

    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page, 1);
    assert_eq!(reload.request.page_size, 50);
    controller.begin_loading();
    controller.finish_loading(100);
    assert_quiet(&mut reloads).await;
}

#[tokio::test(start_paused = true)]
async fn page_in_the_same_patch_as_a_new_page_size_is_clamped_to_it() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(100));

    controller.set_pagination(PaginationPatch {
        active_page: Some(9),
        items_per_page: Some(25),
        total_items: None,
    });
    assert_eq!(controller.pagination().active_page, 4);
    assert_eq!(next_reload(&mut reloads).await.request.page, 4);
}

#[tokio::test(start_paused = true)]
async fn page_picked_before_a_filtered_load_is_clamped_after_it() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(100));

    controller.set_filter(FilterPredicate::equals("status", "open"));
    assert_eq!(controller.set_page(8), 8);
    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page, 8);

    controller.begin_loading();
    controller.finish_loading(30);
    assert_eq!(controller.pagination().active_page, 3);
    assert_eq!(next_reload(&mut reloads).await.request.page, 3);
    controller.finish_loading(30);
    assert_quiet(&mut reloads).await;
}

#[tokio::test(start_paused = true)]
async fn items_per_page_change_restarts_from_page_one() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(100));
    controller.set_page(4);
    next_reload(&mut reloads).await;

    controller.set_items_per_page(0);
    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page, 1);
    assert_eq!(reload.request.page_size, 1);
}

#[tokio::test(start_paused = true)]
async fn sort_change_resets_page_and_is_carried_in_the_request() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(100));
    controller.set_page(6);
    next_reload(&mut reloads).await;

    controller.set_sort(vec![SortSpec::desc("createdAt")]);
    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page, 1);
    assert_eq!(reload.request.sort, vec![SortSpec::desc("createdAt")]);
}

#[tokio::test]
async fn page_requests_are_clamped_into_range() {
    let (mut controller, _reloads) = controller();

    assert_eq!(controller.set_page(9), 1);
    assert_eq!(controller.set_page(-4), 1);

    controller.set_pagination(PaginationPatch::total_items(31));
    assert_eq!(controller.set_page(9), 4);
    assert_eq!(controller.set_page(0), 1);
}

#[tokio::test]
async fn reload_stream_has_a_single_subscriber() {
    let (mut controller, _reloads) = controller();
    assert!(controller.take_reload_stream().is_none());
}

#[tokio::test(start_paused = true)]
async fn explicit_reload_keeps_state() {
    let (mut controller, mut reloads) = controller();
    controller.set_pagination(PaginationPatch::total_items(100));
    controller.set_page(3);
    next_reload(&mut reloads).await;

    controller.request_reload();
    let reload = next_reload(&mut reloads).await;
    assert_eq!(reload.request.page, 3);
    assert!(!reload.reset_accumulated);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_controller_closes_the_stream() {
    let (controller, mut reloads) = controller();
    drop(controller);
    assert!(reloads.next().await.is_none());
}
