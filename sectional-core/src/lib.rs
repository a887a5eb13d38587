//! Sectional Core - Section hydration for server-rendered pages
//!
//! Fetches server-rendered partials for a named section, splices the matching
//! slot elements into the live page, re-activates reactive bindings inside the
//! swapped subtrees and broadcasts lifecycle events to observers.

#![warn(missing_docs)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod bindings;
pub mod config;
pub mod document;
pub mod errors;
pub mod events;
pub mod form;
pub mod history;
pub mod hydrator;
pub mod request;
pub mod tracing_setup;
pub mod transport;

// Re-export main types for convenient access
pub use bindings::{BindingActivator, NoopActivator};
pub use config::{HydratorConfig, NetworkConfig, OverlapPolicy, SectionConfig};
pub use document::{FetchedDocument, LiveDocument, MemoryDocument};
pub use errors::HydrationError;
pub use events::{EventBus, EventDetail, HydrationEvent, HydrationObserver};
pub use form::{FormMethod, HtmlForm};
pub use history::{HistoryEntry, HistoryHost, MemoryHistory};
pub use hydrator::{
    HydrationOutcome, HydrationReport, Hydrator, MissingSide, PageHost, SlotWarning, SwapReport,
};
pub use request::HydrationRequest;
pub use transport::{ReqwestTransport, SectionResponse, SectionTransport};

/// Convenience type alias for Results with HydrationError.
pub type Result<T> = std::result::Result<T, HydrationError>;
