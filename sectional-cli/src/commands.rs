//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use sectional_core::{
    HistoryHost, HydrationEvent, HydrationReport, Hydrator, HydratorConfig, LiveDocument,
    MemoryDocument, MemoryHistory, NoopActivator, PageHost, ReqwestTransport, SectionTransport,
};
use tokio::fs;
use url::Url;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a section and swap its slots into a saved page
    Hydrate {
        #[command(flatten)]
        page: PageArgs,
        /// Page URL to render the section for, relative to the origin
        #[arg(long)]
        url: String,
        /// Section identifier understood by the store
        #[arg(long)]
        section: String,
        /// Element id to swap; repeat for several slots
        #[arg(long = "slot")]
        slots: Vec<String>,
    },
    /// Submit a form from the saved page and swap the resulting section
    Submit {
        #[command(flatten)]
        page: PageArgs,
        /// Id of the `<form>` element in the saved page
        #[arg(long)]
        form: String,
        /// Section identifier understood by the store
        #[arg(long)]
        section: String,
        /// Element id to swap; repeat for several slots
        #[arg(long = "slot")]
        slots: Vec<String>,
    },
}

/// Options shared by every command that works on a saved page
#[derive(Args)]
pub struct PageArgs {
    /// Saved HTML page to hydrate
    #[arg(long)]
    pub page: PathBuf,
    /// URL the page was served from
    #[arg(long)]
    pub origin: Url,
    /// Where to write the hydrated page (defaults to overwriting --page)
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Print lifecycle events as JSON lines on stdout
    #[arg(long)]
    pub events: bool,
}

/// What to run once the page is loaded
enum Call {
    Fetch { url: String },
    Form { form_id: String },
}

/// Handle the CLI command
///
/// # Errors
/// - The page cannot be read or written
/// - The form does not exist in the page
/// - The hydration call ended in `loading-error`
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let config = HydratorConfig::from_env();
    let transport = Arc::new(ReqwestTransport::with_config(&config.network)?);

    let (page, call, section, slots) = match command {
        Commands::Hydrate {
            page,
            url,
            section,
            slots,
        } => (page, Call::Fetch { url }, section, slots),
        Commands::Submit {
            page,
            form,
            section,
            slots,
        } => (page, Call::Form { form_id: form }, section, slots),
    };

    let report = hydrate_page(&page, config, transport, call, &section, &slots).await?;
    print_summary(&report, page.events);

    if let Some(error) = report.error() {
        bail!("Hydration of section '{section}' failed: {error}");
    }
    Ok(())
}

/// Loads the saved page, runs one call against it and writes the result.
///
/// The page is only written when the call succeeded.
async fn hydrate_page(
    args: &PageArgs,
    config: HydratorConfig,
    transport: Arc<dyn SectionTransport>,
    call: Call,
    section: &str,
    slots: &[String],
) -> anyhow::Result<HydrationReport> {
    let markup = fs::read_to_string(&args.page)
        .await
        .with_context(|| format!("Failed to read page {}", args.page.display()))?;

    let document = Arc::new(MemoryDocument::new(markup));
    let history = Arc::new(MemoryHistory::new(args.origin.clone()));
    let hydrator = Hydrator::new(
        config,
        transport,
        PageHost {
            document: document.clone(),
            bindings: Arc::new(NoopActivator),
            history: history.clone(),
        },
    );

    if args.events {
        hydrator.observe(Arc::new(print_event));
    }

    let slots: Vec<&str> = slots.iter().map(String::as_str).collect();
    let report = match call {
        Call::Fetch { url } => hydrator.fetch(&url, section, &slots).await,
        Call::Form { form_id } => {
            let form = document
                .form(&form_id)
                .with_context(|| format!("No <form id=\"{form_id}\"> in page"))?;
            hydrator.fetch_form(&form, section, &slots).await
        }
    };

    if report.is_success() {
        let out = args.out.as_ref().unwrap_or(&args.page);
        fs::write(out, document.html())
            .await
            .with_context(|| format!("Failed to write page {}", out.display()))?;
        tracing::info!(
            path = %out.display(),
            address = %history.location(),
            "Hydrated page written"
        );
    }

    Ok(report)
}

fn print_event(event: &HydrationEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!("Failed to encode {} event: {e}", event.name()),
    }
}

fn print_summary(report: &HydrationReport, events: bool) {
    // Keep stdout machine-readable when events are printed
    if events {
        return;
    }

    match report.swap() {
        Some(swap) => {
            println!(
                "Hydrated section '{}': {} slot(s) applied",
                report.request.section_id,
                swap.applied.len()
            );
            for warning in &swap.warnings {
                println!("  skipped {} (missing: {:?})", warning.slot, warning.missing);
            }
        }
        None => println!("Section '{}' was not hydrated", report.request.section_id),
    }
}
