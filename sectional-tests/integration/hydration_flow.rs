//! End-to-end hydration of a collection page over HTTP.

use std::time::Duration;

use sectional_core::{HydrationError, HydratorConfig, LiveDocument};

use crate::storefront::{COLLECTION_PAGE, Storefront};

#[tokio::test]
async fn test_pagination_swaps_grid_and_pager() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(
        COLLECTION_PAGE,
        "/collections/all",
        HydratorConfig::for_testing(),
    );

    let report = page
        .hydrator
        .fetch(
            "/collections/all?page=2",
            "main-collection",
            &["ProductGridContainer", "Pagination"],
        )
        .await;

    let swap = report.swap().expect("call should succeed");
    assert_eq!(swap.applied, vec!["ProductGridContainer", "Pagination"]);
    assert!(swap.warnings.is_empty());

    assert_eq!(
        storefront.requests.all(),
        vec!["/collections/all?page=2&section_id=main-collection"]
    );

    let grid = page.document.inner_html("ProductGridContainer").unwrap();
    assert!(grid.contains("Product 2-1"));
    assert!(!grid.contains("Product 1-1"));
    assert!(page.document.html().contains("page=3"));

    assert_eq!(page.history.pushed_count(), 1);
    assert_eq!(page.history.entries()[1].address(), "/collections/all?page=2");
    assert!(!page.hydrator.is_loading());
}

#[tokio::test]
async fn test_follow_up_call_resolves_against_pushed_location() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(
        COLLECTION_PAGE,
        "/collections/all",
        HydratorConfig::for_testing(),
    );

    for target in ["/collections/all?page=2", "/collections/all?page=3"] {
        let report = page
            .hydrator
            .fetch(target, "main-collection", &["ProductGridContainer"])
            .await;
        assert!(report.is_success());
    }

    let grid = page.document.inner_html("ProductGridContainer").unwrap();
    assert!(grid.contains("Product 3-1"));
    assert_eq!(page.history.pushed_count(), 2);
    assert_eq!(storefront.requests.all().len(), 2);
}

#[tokio::test]
async fn test_http_error_leaves_page_untouched() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(
        COLLECTION_PAGE,
        "/collections/all",
        HydratorConfig::for_testing(),
    );
    let before = page.document.html();

    let report = page
        .hydrator
        .fetch(
            "/collections/all?page=2",
            "unknown-section",
            &["ProductGridContainer"],
        )
        .await;

    let error = report.error().expect("404 should fail the call");
    assert_eq!(error.status(), Some(404));
    assert_eq!(error.to_string(), "Network error: HTTP error! status: 404");

    assert_eq!(page.document.html(), before);
    assert_eq!(page.history.pushed_count(), 0);
}

#[tokio::test]
async fn test_missing_slot_is_skipped() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(
        COLLECTION_PAGE,
        "/collections/all",
        HydratorConfig::for_testing(),
    );

    let report = page
        .hydrator
        .fetch(
            "/collections/all?page=2",
            "main-collection",
            &["FacetFilters", "ProductGridContainer"],
        )
        .await;

    let swap = report.swap().expect("missing slots do not fail the call");
    assert_eq!(swap.applied, vec!["ProductGridContainer"]);
    assert_eq!(swap.warnings.len(), 1);
    assert_eq!(swap.warnings[0].slot, "FacetFilters");
}

#[tokio::test]
async fn test_slow_section_times_out() {
    let storefront = Storefront::spawn().await;
    let mut config = HydratorConfig::for_testing();
    config.network.request_timeout = Some(Duration::from_millis(200));
    let page = storefront.page(COLLECTION_PAGE, "/collections/all", config);

    let report = page.hydrator.fetch("/slow", "late", &["Late"]).await;

    assert!(matches!(
        report.error(),
        Some(HydrationError::Timeout { timeout, .. }) if *timeout == Duration::from_millis(200)
    ));
    assert!(!page.hydrator.is_loading());
    assert_eq!(page.history.pushed_count(), 0);
}
