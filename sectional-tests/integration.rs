//! Integration tests for Sectional
//!
//! These tests run the hydrator against a mock storefront served over real
//! HTTP, with the production reqwest transport in between.

#[path = "integration/storefront.rs"]
mod storefront;

#[path = "integration/event_stream.rs"]
mod event_stream;
#[path = "integration/form_submission.rs"]
mod form_submission;
#[path = "integration/hydration_flow.rs"]
mod hydration_flow;
