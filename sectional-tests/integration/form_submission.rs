//! Form submissions read from the live page and sent as section requests.

use sectional_core::{HtmlForm, HydratorConfig, LiveDocument};

use crate::storefront::Storefront;

const SEARCH_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<form id="SearchForm" action="/search" method="get">
  <input type="search" name="q" value="red shoes">
  <input type="hidden" name="options[prefix]" value="last">
  <input type="checkbox" name="filter.v.availability" value="1" checked>
  <input type="checkbox" name="filter.v.color" value="red">
  <select name="sort_by">
    <option value="relevance">Relevance</option>
    <option value="price-ascending" selected>Price, low to high</option>
  </select>
  <button type="submit" name="commit">Search</button>
</form>
<div id="SearchResults"><p>Type to search</p></div>
</body></html>"#;

#[tokio::test]
async fn test_page_form_submits_as_section_query() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(SEARCH_PAGE, "/search", HydratorConfig::for_testing());

    let form = page.document.form("SearchForm").unwrap();
    let report = page
        .hydrator
        .fetch_form(&form, "main-search", &["SearchResults"])
        .await;

    assert!(report.is_success());
    assert_eq!(
        storefront.requests.all(),
        vec![
            "/search?q=red+shoes&options%5Bprefix%5D=last&filter.v.availability=1\
             &sort_by=price-ascending&section_id=main-search"
        ]
    );

    let results = page.document.inner_html("SearchResults").unwrap();
    assert!(results.contains("Results for red shoes"));
    assert!(results.contains("In stock only: true"));

    // The address bar keeps the filters but not the section parameter
    assert_eq!(
        page.history.entries()[1].address(),
        "/search?q=red+shoes&options%5Bprefix%5D=last&filter.v.availability=1&sort_by=price-ascending"
    );
}

#[tokio::test]
async fn test_built_form_replaces_action_query() {
    let storefront = Storefront::spawn().await;
    let page = storefront.page(SEARCH_PAGE, "/search", HydratorConfig::for_testing());

    let form = HtmlForm::new("/search?q=stale").field("q", "boots");
    let report = page
        .hydrator
        .fetch_form(&form, "main-search", &["SearchResults"])
        .await;

    assert!(report.is_success());
    assert_eq!(
        storefront.requests.all(),
        vec!["/search?q=boots&section_id=main-search"]
    );
    let results = page.document.inner_html("SearchResults").unwrap();
    assert!(results.contains("In stock only: false"));
}
