//! Mock storefront rendering sections on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::Html;
use axum::routing::get;
use parking_lot::Mutex;
use sectional_core::{
    Hydrator, HydratorConfig, MemoryDocument, MemoryHistory, NoopActivator, PageHost,
    ReqwestTransport,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Every path and query the storefront was asked for, in order.
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<String>>>);

impl RequestLog {
    fn record(&self, uri: &Uri) {
        self.0.lock().push(uri.to_string());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

type Params = Query<HashMap<String, String>>;

/// Storefront bound to an ephemeral local port; shuts down on drop.
pub struct Storefront {
    pub base: Url,
    pub requests: RequestLog,
    server: JoinHandle<()>,
}

impl Storefront {
    pub async fn spawn() -> Self {
        let requests = RequestLog::default();
        let app = Router::new()
            .route("/collections/all", get(collection))
            .route("/search", get(search))
            .route("/slow", get(slow))
            .with_state(requests.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: Url::parse(&format!("http://{address}/")).unwrap(),
            requests,
            server,
        }
    }

    /// Hydrator for `markup` as if it had been served from `path`.
    pub fn page(&self, markup: &str, path: &str, config: HydratorConfig) -> TestPage {
        let document = Arc::new(MemoryDocument::new(markup));
        let history = Arc::new(MemoryHistory::new(self.base.join(path).unwrap()));
        let transport = Arc::new(ReqwestTransport::with_config(&config.network).unwrap());
        let hydrator = Hydrator::new(
            config,
            transport,
            PageHost {
                document: document.clone(),
                bindings: Arc::new(NoopActivator),
                history: history.clone(),
            },
        );

        TestPage {
            hydrator,
            document,
            history,
        }
    }
}

impl Drop for Storefront {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub struct TestPage {
    pub hydrator: Hydrator,
    pub document: Arc<MemoryDocument>,
    pub history: Arc<MemoryHistory>,
}

pub const COLLECTION_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>All products</title></head><body>
<div id="shopify-section-main-collection">
<div id="ProductGridContainer"><ul><li>Product 1-1</li><li>Product 1-2</li></ul></div>
<nav id="Pagination"><a href="/collections/all?page=2">Next</a></nav>
</div>
</body></html>"#;

async fn collection(
    State(requests): State<RequestLog>,
    uri: Uri,
    Query(params): Params,
) -> Result<Html<String>, StatusCode> {
    requests.record(&uri);

    if params.get("section_id").map(String::as_str) != Some("main-collection") {
        return Err(StatusCode::NOT_FOUND);
    }

    let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    Ok(Html(format!(
        r#"<div id="shopify-section-main-collection">
<div id="ProductGridContainer"><ul><li>Product {page}-1</li><li>Product {page}-2</li></ul></div>
<nav id="Pagination"><a href="/collections/all?page={prev}">Previous</a><a href="/collections/all?page={next}">Next</a></nav>
</div>"#,
        prev = page.saturating_sub(1).max(1),
        next = page + 1,
    )))
}

async fn search(
    State(requests): State<RequestLog>,
    uri: Uri,
    Query(params): Params,
) -> Html<String> {
    requests.record(&uri);

    let query = params.get("q").cloned().unwrap_or_default();
    let in_stock = params.contains_key("filter.v.availability");
    Html(format!(
        r#"<div id="shopify-section-main-search"><div id="SearchResults"><p>Results for {query}</p><p>In stock only: {in_stock}</p></div></div>"#
    ))
}

async fn slow(State(requests): State<RequestLog>, uri: Uri) -> Html<&'static str> {
    requests.record(&uri);
    tokio::time::sleep(Duration::from_secs(5)).await;
    Html(r#"<div id="Late">too late</div>"#)
}
