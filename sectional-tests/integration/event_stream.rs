//! Lifecycle events as seen by page components.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future;
use parking_lot::Mutex;
use sectional_core::{HydrationEvent, HydratorConfig};

use crate::storefront::{COLLECTION_PAGE, Storefront};

#[tokio::test]
async fn test_events_bracket_each_call() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(
        COLLECTION_PAGE,
        "/collections/all",
        HydratorConfig::for_testing(),
    );
    let mut events = page.hydrator.subscribe();

    page.hydrator
        .fetch("/collections/all?page=2", "main-collection", &["Pagination"])
        .await;
    page.hydrator
        .fetch("/collections/all?page=2", "missing-section", &["Pagination"])
        .await;

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name());
    }
    assert_eq!(
        names,
        vec![
            "section:loading-start",
            "section:loading-success",
            "section:loading-end",
            "section:loading-start",
            "section:loading-error",
            "section:loading-end",
        ]
    );
}

#[tokio::test]
async fn test_error_event_serializes_for_listeners() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(
        COLLECTION_PAGE,
        "/collections/all",
        HydratorConfig::for_testing(),
    );
    let mut events = page.hydrator.subscribe();

    page.hydrator
        .fetch("/collections/all?page=9", "missing-section", &["ProductGridContainer"])
        .await;

    let error = std::iter::from_fn(|| events.try_recv().ok())
        .find(|event| matches!(event, HydrationEvent::LoadingError { .. }))
        .unwrap();
    let json = serde_json::to_value(&error).unwrap();

    assert_eq!(json["type"], "section:loading-error");
    assert_eq!(json["url"], "/collections/all?page=9");
    assert_eq!(json["sectionId"], "missing-section");
    assert_eq!(json["slots"], serde_json::json!(["ProductGridContainer"]));
    assert_eq!(json["error"], "Network error: HTTP error! status: 404");
}

#[tokio::test]
async fn test_concurrent_sections_keep_loading_until_last_ends() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(
        COLLECTION_PAGE,
        "/collections/all",
        HydratorConfig::for_testing(),
    );

    // Loading state observed right after each call's end event
    let after_end: Arc<Mutex<HashMap<u64, bool>>> = Arc::default();
    let hydrator = Arc::new(page.hydrator);
    let weak = Arc::downgrade(&hydrator);
    let seen = after_end.clone();
    hydrator.observe(Arc::new(move |event: &HydrationEvent| {
        if let (HydrationEvent::LoadingEnd { detail }, Some(hydrator)) = (event, weak.upgrade()) {
            seen.lock().insert(detail.call_id, hydrator.is_loading());
        }
    }));

    let (grid, search) = future::join(
        hydrator.fetch(
            "/collections/all?page=2",
            "main-collection",
            &["ProductGridContainer"],
        ),
        hydrator.fetch("/search?q=boots", "main-search", &["SearchResults"]),
    )
    .await;

    assert!(grid.is_success());
    assert!(search.is_success());
    assert!(!hydrator.is_loading());

    let after_end = after_end.lock();
    assert_eq!(after_end.len(), 2);
    // Exactly one call ended while the other was still loading
    assert_eq!(after_end.values().filter(|loading| **loading).count(), 1);
}
