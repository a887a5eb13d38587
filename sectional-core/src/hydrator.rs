//! The section hydration service.
//!
//! One [`Hydrator`] per page. It is constructed at startup with its
//! collaborators and shared by reference with every component that needs to
//! refresh a section.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bindings::BindingActivator;
use crate::config::{HydratorConfig, OverlapPolicy};
use crate::document::{FetchedDocument, LiveDocument};
use crate::errors::HydrationError;
use crate::events::{EventBus, EventDetail, HydrationEvent, HydrationObserver};
use crate::form::HtmlForm;
use crate::history::{HistoryEntry, HistoryHost};
use crate::request::HydrationRequest;
use crate::transport::{SectionResponse, SectionTransport};

/// Host page capabilities the hydrator drives.
#[derive(Clone)]
pub struct PageHost {
    /// Live document receiving swapped content
    pub document: Arc<dyn LiveDocument>,
    /// Reactive binding framework hook
    pub bindings: Arc<dyn BindingActivator>,
    /// Location and history stack
    pub history: Arc<dyn HistoryHost>,
}

/// Which document lacked a requested slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSide {
    /// Present in the response, absent from the live page
    Live,
    /// Present in the live page, absent from the response
    Fetched,
    /// Absent from both
    Both,
}

/// A slot that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotWarning {
    /// Slot id as requested
    pub slot: String,
    /// Where it was missing
    pub missing: MissingSide,
}

/// What a successful call applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapReport {
    /// Slots swapped, in request order
    pub applied: Vec<String>,
    /// Slots skipped, in request order
    pub warnings: Vec<SlotWarning>,
    /// Recovered parse errors in the response
    pub parse_errors: usize,
}

/// Terminal state of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrationOutcome {
    /// `loading-success` was broadcast
    Success(SwapReport),
    /// `loading-error` was broadcast with this error
    Failed(HydrationError),
}

/// Returned by every hydrator call; failures are reported here, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationReport {
    /// Call number shared with the call's events
    pub call_id: u64,
    /// The request as issued
    pub request: HydrationRequest,
    /// How the call ended
    pub outcome: HydrationOutcome,
}

impl HydrationReport {
    /// True if the call broadcast `loading-success`.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, HydrationOutcome::Success(_))
    }

    /// The broadcast error, if the call failed.
    pub fn error(&self) -> Option<&HydrationError> {
        match &self.outcome {
            HydrationOutcome::Failed(error) => Some(error),
            HydrationOutcome::Success(_) => None,
        }
    }

    /// The swap summary, if the call succeeded.
    pub fn swap(&self) -> Option<&SwapReport> {
        match &self.outcome {
            HydrationOutcome::Success(report) => Some(report),
            HydrationOutcome::Failed(_) => None,
        }
    }
}

/// Fetches server-rendered sections and splices them into the live page.
pub struct Hydrator {
    config: HydratorConfig,
    transport: Arc<dyn SectionTransport>,
    page: PageHost,
    events: EventBus,
    in_flight: AtomicUsize,
    next_call_id: AtomicU64,
    busy_sections: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for Hydrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hydrator")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .field("events", &self.events)
            .finish()
    }
}

impl Hydrator {
    /// Creates the page's hydrator.
    pub fn new(
        config: HydratorConfig,
        transport: Arc<dyn SectionTransport>,
        page: PageHost,
    ) -> Self {
        Self {
            config,
            transport,
            page,
            events: EventBus::new(),
            in_flight: AtomicUsize::new(0),
            next_call_id: AtomicU64::new(0),
            busy_sections: Mutex::new(HashSet::new()),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &HydratorConfig {
        &self.config
    }

    /// True while at least one call is between `loading-start` and `loading-end`.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Receives every event published from now on, on an unbounded queue.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<HydrationEvent> {
        self.events.subscribe()
    }

    /// Receives events published from now on, keeping at most `capacity` queued.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn subscribe_bounded(&self, capacity: usize) -> mpsc::Receiver<HydrationEvent> {
        self.events.subscribe_bounded(capacity)
    }

    /// Registers an observer called inline with each event.
    pub fn observe(&self, observer: Arc<dyn HydrationObserver>) {
        self.events.observe(observer);
    }

    /// Fetches `section_id` rendered at `url` and swaps `slots` into the page.
    pub async fn fetch(&self, url: &str, section_id: &str, slots: &[&str]) -> HydrationReport {
        let request = HydrationRequest::new(url, section_id).with_slots(slots.iter().copied());
        self.hydrate(request).await
    }

    /// Submits `form` as a GET to its action and hydrates the result.
    ///
    /// As in a browser GET submission, any query already on the action is
    /// replaced by the form fields, not merged with them. Put parameters that
    /// must survive into hidden inputs.
    pub async fn fetch_form(
        &self,
        form: &HtmlForm,
        section_id: &str,
        slots: &[&str],
    ) -> HydrationReport {
        let url = match form.submission_url(&self.page.history.location()) {
            Ok(url) => url.to_string(),
            // Let the call itself reject the URL so observers still see the lifecycle
            Err(_) => format!("{}?{}", form.action, form.query_string()),
        };
        self.fetch(&url, section_id, slots).await
    }

    /// Runs one hydration call.
    ///
    /// Broadcasts `loading-start`, exactly one of `loading-success` or
    /// `loading-error`, then `loading-end`. This holds even if the returned
    /// future is dropped before completion.
    pub async fn hydrate(&self, request: HydrationRequest) -> HydrationReport {
        let call_id = self.next_call_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut call = CallGuard::begin(self, call_id, &request);

        if self.config.section.overlap == OverlapPolicy::RejectSameSection
            && !call.claim_section()
        {
            let error = HydrationError::SectionBusy {
                section_id: request.section_id.clone(),
            };
            warn!(call_id, section_id = %request.section_id, "Section busy, rejecting call");
            call.fail(error.clone());
            return HydrationReport {
                call_id,
                request,
                outcome: HydrationOutcome::Failed(error),
            };
        }

        let outcome = match self.run(&request).await {
            Ok(report) => {
                info!(
                    call_id,
                    section_id = %request.section_id,
                    applied = report.applied.len(),
                    skipped = report.warnings.len(),
                    "Section hydrated"
                );
                call.succeed();
                HydrationOutcome::Success(report)
            }
            Err(e) => {
                error!(call_id, section_id = %request.section_id, "Hydration failed: {e}");
                call.fail(e.clone());
                HydrationOutcome::Failed(e)
            }
        };

        drop(call);

        HydrationReport {
            call_id,
            request,
            outcome,
        }
    }

    async fn run(&self, request: &HydrationRequest) -> Result<SwapReport, HydrationError> {
        let param = self.config.section.param_name.as_str();
        let location = self.page.history.location();
        let fetch_url = request.section_url(&location, param)?;
        let history_url = request.history_url(&location, param)?;

        debug!(url = %fetch_url, "Fetching section");

        let response = self.request_section(&fetch_url).await?;
        if !response.is_success() {
            return Err(HydrationError::http_status(response.status));
        }

        let report = self.apply_slots(&response.body, &request.slots);

        self.page.history.push_state(HistoryEntry::new(history_url));

        Ok(report)
    }

    async fn request_section(&self, url: &url::Url) -> Result<SectionResponse, HydrationError> {
        match self.config.network.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.transport.get(url))
                .await
                .map_err(|_| HydrationError::Timeout {
                    url: url.to_string(),
                    timeout,
                })?,
            None => self.transport.get(url).await,
        }
    }

    /// Parses the response and swaps each slot. Runs without suspending.
    fn apply_slots(&self, body: &str, slots: &[String]) -> SwapReport {
        let fetched = FetchedDocument::parse(body);
        let mut report = SwapReport {
            parse_errors: fetched.parse_error_count(),
            ..Default::default()
        };

        if report.parse_errors > 0 {
            debug!(errors = report.parse_errors, "Section response had recoverable parse errors");
        }

        for slot in slots {
            let missing = match fetched.inner_html(slot) {
                Some(content) => {
                    if self.page.document.set_inner_html(slot, &content) {
                        self.page.bindings.activate_subtree(slot);
                        report.applied.push(slot.clone());
                        continue;
                    }
                    MissingSide::Live
                }
                None if self.page.document.inner_html(slot).is_some() => MissingSide::Fetched,
                None => MissingSide::Both,
            };

            warn!(slot = %slot, ?missing, "Could not find slot \"{slot}\" in DOM or response");
            report.warnings.push(SlotWarning {
                slot: slot.clone(),
                missing,
            });
        }

        report
    }
}

/// Lifecycle bookkeeping for one call.
///
/// Dropping it resets the loading state, releases the section and publishes
/// `loading-end`, preceded by `loading-error(Cancelled)` if the call never
/// settled.
struct CallGuard<'a> {
    hydrator: &'a Hydrator,
    detail: EventDetail,
    claimed: bool,
    settled: bool,
}

impl<'a> CallGuard<'a> {
    fn begin(hydrator: &'a Hydrator, call_id: u64, request: &HydrationRequest) -> Self {
        let detail = EventDetail {
            call_id,
            url: request.url.clone(),
            section_id: request.section_id.clone(),
            slots: request.slots.clone(),
        };

        hydrator.in_flight.fetch_add(1, Ordering::SeqCst);
        hydrator.events.publish(HydrationEvent::LoadingStart {
            detail: detail.clone(),
        });

        Self {
            hydrator,
            detail,
            claimed: false,
            settled: false,
        }
    }

    fn claim_section(&mut self) -> bool {
        self.claimed = self
            .hydrator
            .busy_sections
            .lock()
            .insert(self.detail.section_id.clone());
        self.claimed
    }

    fn succeed(&mut self) {
        self.settled = true;
        self.hydrator.events.publish(HydrationEvent::LoadingSuccess {
            detail: self.detail.clone(),
        });
    }

    fn fail(&mut self, error: HydrationError) {
        self.settled = true;
        self.hydrator.events.publish(HydrationEvent::LoadingError {
            detail: self.detail.clone(),
            error,
        });
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(call_id = self.detail.call_id, "Hydration call dropped before completion");
            let error = HydrationError::Cancelled {
                section_id: self.detail.section_id.clone(),
            };
            self.fail(error);
        }

        if self.claimed {
            self.hydrator
                .busy_sections
                .lock()
                .remove(&self.detail.section_id);
        }

        self.hydrator.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.hydrator.events.publish(HydrationEvent::LoadingEnd {
            detail: self.detail.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use url::Url;

    use super::*;
    use crate::document::MemoryDocument;
    use crate::history::MemoryHistory;

    const LIVE_PAGE: &str = r#"<!DOCTYPE html><html><body>
        <div id="ProductGridContainer">old grid</div>
        <span id="ProductCount">12 products</span>
        <nav id="Pagination">page 1</nav>
    </body></html>"#;

    /// Mock transport serving fixed responses by path.
    #[derive(Debug, Default)]
    struct MockTransport {
        responses: Mutex<HashMap<String, SectionResponse>>,
        requests: Mutex<Vec<Url>>,
    }

    impl MockTransport {
        fn respond(self, path: &str, status: u16, body: &str) -> Self {
            self.responses.lock().insert(
                path.to_string(),
                SectionResponse {
                    status,
                    body: body.to_string(),
                },
            );
            self
        }

        fn requests(&self) -> Vec<Url> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl SectionTransport for MockTransport {
        async fn get(&self, url: &Url) -> Result<SectionResponse, HydrationError> {
            self.requests.lock().push(url.clone());
            Ok(self
                .responses
                .lock()
                .get(url.path())
                .cloned()
                .unwrap_or(SectionResponse {
                    status: 404,
                    body: "Not found".to_string(),
                }))
        }
    }

    /// Transport that parks every request until released.
    #[derive(Debug, Default)]
    struct GatedTransport {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SectionTransport for GatedTransport {
        async fn get(&self, _url: &Url) -> Result<SectionResponse, HydrationError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(SectionResponse {
                status: 200,
                body: r#"<div id="ProductGridContainer">gated</div>"#.to_string(),
            })
        }
    }

    #[derive(Debug, Default)]
    struct RecordingActivator {
        roots: Mutex<Vec<String>>,
    }

    impl BindingActivator for RecordingActivator {
        fn activate_subtree(&self, root_id: &str) {
            self.roots.lock().push(root_id.to_string());
        }
    }

    struct Fixture {
        hydrator: Arc<Hydrator>,
        document: Arc<MemoryDocument>,
        history: Arc<MemoryHistory>,
        bindings: Arc<RecordingActivator>,
    }

    fn fixture(config: HydratorConfig, transport: Arc<dyn SectionTransport>) -> Fixture {
        let document = Arc::new(MemoryDocument::new(LIVE_PAGE));
        let history = Arc::new(MemoryHistory::new(
            Url::parse("https://shop.example/collections/all").unwrap(),
        ));
        let bindings = Arc::new(RecordingActivator::default());
        let page = PageHost {
            document: document.clone(),
            bindings: bindings.clone(),
            history: history.clone(),
        };

        Fixture {
            hydrator: Arc::new(Hydrator::new(config, transport, page)),
            document,
            history,
            bindings,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<HydrationEvent>) -> Vec<HydrationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn names(events: &[HydrationEvent]) -> Vec<&'static str> {
        events.iter().map(HydrationEvent::name).collect()
    }

    #[tokio::test]
    async fn test_product_grid_pagination_scenario() {
        let transport = Arc::new(MockTransport::default().respond(
            "/collections/all",
            200,
            r#"<html><body><div id="ProductGridContainer">X</div></body></html>"#,
        ));
        let f = fixture(HydratorConfig::default(), transport.clone());
        let mut rx = f.hydrator.subscribe();

        let report = f
            .hydrator
            .fetch(
                "/collections/all?page=2",
                "main-collection",
                &["ProductGridContainer"],
            )
            .await;

        assert!(report.is_success());
        assert_eq!(
            f.document.inner_html("ProductGridContainer").as_deref(),
            Some("X")
        );
        assert!(!f.hydrator.is_loading());
        let events = drain(&mut rx);
        assert_eq!(
            names(&events),
            vec![
                "section:loading-start",
                "section:loading-success",
                "section:loading-end"
            ]
        );
        assert_eq!(
            f.history.entries().last().unwrap().address(),
            "/collections/all?page=2"
        );
        assert_eq!(
            transport.requests()[0].as_str(),
            "https://shop.example/collections/all?page=2&section_id=main-collection"
        );
        assert_eq!(*f.bindings.roots.lock(), vec!["ProductGridContainer"]);
    }

    #[tokio::test]
    async fn test_events_carry_request_detail() {
        let transport = Arc::new(MockTransport::default().respond("/search", 200, "<p></p>"));
        let f = fixture(HydratorConfig::default(), transport);
        let mut rx = f.hydrator.subscribe();

        let report = f
            .hydrator
            .fetch("/search?q=shoes", "main-search", &["SearchResults", "SearchCount"])
            .await;

        for event in drain(&mut rx) {
            let detail = event.detail();
            assert_eq!(detail.call_id, report.call_id);
            assert_eq!(detail.url, "/search?q=shoes");
            assert_eq!(detail.section_id, "main-search");
            assert_eq!(detail.slots, vec!["SearchResults", "SearchCount"]);
        }
    }

    #[tokio::test]
    async fn test_non_success_status_broadcasts_error() {
        let transport = Arc::new(MockTransport::default().respond(
            "/collections/all",
            500,
            r#"<div id="ProductGridContainer">error page</div>"#,
        ));
        let f = fixture(HydratorConfig::default(), transport);
        let mut rx = f.hydrator.subscribe();

        let report = f
            .hydrator
            .fetch("/collections/all?page=2", "main-collection", &["ProductGridContainer"])
            .await;

        assert_eq!(report.error().and_then(HydrationError::status), Some(500));
        let events = drain(&mut rx);
        assert_eq!(
            names(&events),
            vec![
                "section:loading-start",
                "section:loading-error",
                "section:loading-end"
            ]
        );
        assert_eq!(
            f.document.inner_html("ProductGridContainer").as_deref(),
            Some("old grid")
        );
        assert_eq!(f.history.pushed_count(), 0);
        assert!(!f.hydrator.is_loading());
    }

    #[tokio::test]
    async fn test_missing_slots_are_skipped_with_warnings() {
        let transport = Arc::new(MockTransport::default().respond(
            "/collections/all",
            200,
            r#"<span id="ProductCount">24 products</span><div id="Banner">sale</div>"#,
        ));
        let f = fixture(HydratorConfig::default(), transport);

        let report = f
            .hydrator
            .fetch(
                "/collections/all",
                "main-collection",
                &["Pagination", "ProductCount", "Banner", "Ghost"],
            )
            .await;

        let swap = report.swap().unwrap();
        assert_eq!(swap.applied, vec!["ProductCount"]);
        assert_eq!(
            swap.warnings,
            vec![
                SlotWarning {
                    slot: "Pagination".to_string(),
                    missing: MissingSide::Fetched,
                },
                SlotWarning {
                    slot: "Banner".to_string(),
                    missing: MissingSide::Live,
                },
                SlotWarning {
                    slot: "Ghost".to_string(),
                    missing: MissingSide::Both,
                },
            ]
        );
        assert_eq!(f.document.inner_html("Pagination").as_deref(), Some("page 1"));
        assert_eq!(
            f.document.inner_html("ProductCount").as_deref(),
            Some("24 products")
        );
        assert_eq!(*f.bindings.roots.lock(), vec!["ProductCount"]);
    }

    #[tokio::test]
    async fn test_every_applied_slot_matches_fetched_markup() {
        let body = r##"<html><body>
<div id="ProductGridContainer"><ul x-data="{ products: [] }"><template x-for="p in products"><li x-text="p.title"></li></template></ul></div>
<span id="ProductCount">24 products &amp; <b>more</b></span>
<nav id="Pagination"><a href="?page=3"><svg viewBox="0 0 8 8"><use xlink:href="#icon-arrow"></use></svg></a></nav>
</body></html>"##;
        let transport = Arc::new(MockTransport::default().respond("/collections/all", 200, body));
        let f = fixture(HydratorConfig::default(), transport);
        let slots = ["ProductGridContainer", "ProductCount", "Pagination"];

        let report = f
            .hydrator
            .fetch("/collections/all?page=2", "main-collection", &slots)
            .await;

        assert_eq!(report.swap().unwrap().applied, slots);
        let fetched = FetchedDocument::parse(body);
        for slot in slots {
            assert_eq!(
                f.document.inner_html(slot),
                fetched.inner_html(slot),
                "slot {slot}"
            );
        }
    }

    #[tokio::test]
    async fn test_empty_slots_still_issue_request_and_push_history() {
        let transport = Arc::new(MockTransport::default().respond("/cart", 200, ""));
        let f = fixture(HydratorConfig::default(), transport.clone());

        let report = f.hydrator.fetch("/cart", "cart-drawer", &[]).await;

        assert!(report.is_success());
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(f.history.location().as_str(), "https://shop.example/cart");
        assert_eq!(f.document.html(), LIVE_PAGE);
    }

    #[tokio::test]
    async fn test_fetch_form_serializes_fields_into_query() {
        let transport = Arc::new(MockTransport::default().respond("/search", 200, ""));
        let f = fixture(HydratorConfig::default(), transport.clone());
        let form = HtmlForm::new("/search").field("q", "shoes").field("page", "2");

        let report = f.hydrator.fetch_form(&form, "main-search", &[]).await;

        assert!(report.is_success());
        let requested = &transport.requests()[0];
        assert_eq!(requested.path(), "/search");
        assert_eq!(requested.query(), Some("q=shoes&page=2&section_id=main-search"));
        assert_eq!(
            f.history.entries().last().unwrap().address(),
            "/search?q=shoes&page=2"
        );
    }

    #[tokio::test]
    async fn test_fetch_form_replaces_action_query() {
        let transport = Arc::new(MockTransport::default().respond("/search", 200, ""));
        let f = fixture(HydratorConfig::default(), transport.clone());
        let form = HtmlForm::new("/search?type=product&q=stale").field("q", "boots");

        let report = f.hydrator.fetch_form(&form, "main-search", &[]).await;

        assert!(report.is_success());
        assert_eq!(
            transport.requests()[0].query(),
            Some("q=boots&section_id=main-search")
        );
    }

    #[tokio::test]
    async fn test_is_loading_tracks_event_window() {
        let transport = Arc::new(MockTransport::default().respond("/collections/all", 200, ""));
        let f = fixture(HydratorConfig::default(), transport);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&f.hydrator);
        let observer_seen = Arc::clone(&seen);
        f.hydrator.observe(Arc::new(move |event: &HydrationEvent| {
            let loading = weak.upgrade().map(|h| h.is_loading());
            observer_seen.lock().push((event.name(), loading));
        }));

        assert!(!f.hydrator.is_loading());
        f.hydrator.fetch("/collections/all", "main-collection", &[]).await;

        assert_eq!(
            *seen.lock(),
            vec![
                ("section:loading-start", Some(true)),
                ("section:loading-success", Some(true)),
                ("section:loading-end", Some(false)),
            ]
        );
    }

    #[tokio::test]
    async fn test_is_loading_while_request_in_flight() {
        let transport = Arc::new(GatedTransport::default());
        let f = fixture(HydratorConfig::default(), transport.clone());

        let hydrator = Arc::clone(&f.hydrator);
        let call = tokio::spawn(async move {
            hydrator
                .fetch("/collections/all", "main-collection", &["ProductGridContainer"])
                .await
        });

        transport.entered.notified().await;
        assert!(f.hydrator.is_loading());

        transport.release.notify_one();
        let report = call.await.unwrap();

        assert!(report.is_success());
        assert!(!f.hydrator.is_loading());
        assert_eq!(
            f.document.inner_html("ProductGridContainer").as_deref(),
            Some("gated")
        );
    }

    #[tokio::test]
    async fn test_overlapping_call_on_busy_section_is_rejected() {
        let transport = Arc::new(GatedTransport::default());
        let f = fixture(HydratorConfig::for_testing(), transport.clone());
        let mut rx = f.hydrator.subscribe();

        let hydrator = Arc::clone(&f.hydrator);
        let first = tokio::spawn(async move {
            hydrator
                .fetch("/collections/all", "main-collection", &["ProductGridContainer"])
                .await
        });
        transport.entered.notified().await;

        let second = f
            .hydrator
            .fetch("/collections/all?page=2", "main-collection", &[])
            .await;

        assert_eq!(
            second.error(),
            Some(&HydrationError::SectionBusy {
                section_id: "main-collection".to_string()
            })
        );
        assert!(f.hydrator.is_loading());

        transport.release.notify_one();
        assert!(first.await.unwrap().is_success());

        let events = drain(&mut rx);
        let second_events: Vec<_> = events
            .iter()
            .filter(|e| e.detail().call_id == second.call_id)
            .map(HydrationEvent::name)
            .collect();
        assert_eq!(
            second_events,
            vec![
                "section:loading-start",
                "section:loading-error",
                "section:loading-end"
            ]
        );

        // The section is free again once the first call ends
        let next_call = f.hydrator.fetch("/x", "main-collection", &[]);
        transport.release.notify_one();
        assert!(next_call.await.is_success());
    }

    #[tokio::test]
    async fn test_request_timeout_fails_call() {
        let transport = Arc::new(GatedTransport::default());
        let mut config = HydratorConfig::default();
        config.network.request_timeout = Some(Duration::from_millis(20));
        let f = fixture(config, transport);

        let report = f.hydrator.fetch("/collections/all", "main-collection", &[]).await;

        assert!(matches!(report.error(), Some(HydrationError::Timeout { .. })));
        assert!(!f.hydrator.is_loading());
    }

    #[tokio::test]
    async fn test_dropped_call_still_settles_and_ends() {
        let transport = Arc::new(GatedTransport::default());
        let f = fixture(HydratorConfig::default(), transport);
        let mut rx = f.hydrator.subscribe();

        let dropped = tokio::time::timeout(
            Duration::from_millis(20),
            f.hydrator.fetch("/collections/all", "main-collection", &[]),
        )
        .await;

        assert!(dropped.is_err());
        assert!(!f.hydrator.is_loading());
        let events = drain(&mut rx);
        assert_eq!(
            names(&events),
            vec![
                "section:loading-start",
                "section:loading-error",
                "section:loading-end"
            ]
        );
        assert!(matches!(
            &events[1],
            HydrationEvent::LoadingError {
                error: HydrationError::Cancelled { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_is_reported_not_raised() {
        let transport = Arc::new(MockTransport::default());
        let f = fixture(HydratorConfig::default(), transport.clone());

        let report = f.hydrator.fetch("http://[::1", "main", &[]).await;

        assert!(matches!(report.error(), Some(HydrationError::InvalidUrl { .. })));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_call_ids_increase() {
        let transport = Arc::new(MockTransport::default());
        let f = fixture(HydratorConfig::default(), transport);

        let first = f.hydrator.fetch("/a", "a", &[]).await;
        let second = f.hydrator.fetch("/b", "b", &[]).await;

        assert_eq!(first.call_id, 1);
        assert_eq!(second.call_id, 2);
    }
}
