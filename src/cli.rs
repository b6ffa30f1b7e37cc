// src/cli.rs
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};

use crate::config::consts::{DEFAULT_OUT_DIR, DEFAULT_SESSION, DETAILS_BASE_URL, OPEN_ALL_PAUSE_MS, STORE_DIR};
use crate::config::options::{AppOptions, ExportOptions, NavigationOptions, StoreOptions};
use crate::runner::{self, PageKind, Selection};
use crate::session::Navigator;
use crate::specs::listing::IdentityTuple;
use crate::specs::patient::{ExtractionResult, SCHEMA};

/// Extract patient records and appointment slots from saved clinical web pages.
#[derive(Parser, Debug)]
#[command(name = "emr_scrape", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the correlation store and debug log
    #[arg(long, global = true, env = "EMR_SCRAPE_STORE_DIR", default_value = STORE_DIR)]
    pub store_dir: PathBuf,

    /// Browsing session the correlation context belongs to
    #[arg(long, global = true, env = "EMR_SCRAPE_SESSION", default_value = DEFAULT_SESSION)]
    pub session: String,

    /// Base URL of the patient details page
    #[arg(long, global = true, env = "EMR_SCRAPE_DETAILS_URL", default_value = DETAILS_BASE_URL)]
    pub details_url: String,

    /// Default log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log to <store-dir>/debug.log instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Read a saved search results page
    Listing {
        html: PathBuf,
        /// Open patient N (1-based)
        #[arg(long, conflicts_with = "all")]
        select: Option<usize>,
        /// Open every patient in turn
        #[arg(long)]
        all: bool,
        /// Pause between patients with --all, in milliseconds
        #[arg(long, default_value_t = OPEN_ALL_PAUSE_MS)]
        pause_ms: u64,
    },
    /// Extract a saved patient details page
    Details {
        html: PathBuf,
        /// URL the page was saved from
        #[arg(long)]
        url: Option<String>,
        #[command(flatten)]
        export: ExportArgs,
    },
    /// Pick listing or details from the page URL
    Auto {
        html: PathBuf,
        #[arg(long)]
        url: String,
        #[command(flatten)]
        export: ExportArgs,
    },
    /// Query the appointment slot search endpoint
    Search {
        /// JSON search configuration
        config: PathBuf,
        /// Scheduler origin, e.g. https://ecw.example.org
        #[arg(long, env = "EMR_SCRAPE_ORIGIN")]
        origin: String,
        #[arg(long, conflicts_with = "csrf_from")]
        csrf_token: Option<String>,
        /// Saved scheduler page to read the CSRF token from
        #[arg(long)]
        csrf_from: Option<PathBuf>,
        /// Output file, or directory when it ends in a separator
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        no_file: bool,
    },
    /// Inspect or reset the stored correlation context
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
    /// Print every schema field and its locators
    Schema,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Directory for the JSON record
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    pub out: PathBuf,
    /// Print only, write no file
    #[arg(long)]
    pub no_file: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ContextAction {
    Show,
    Clear,
}

impl Cli {
    pub fn app_options(&self) -> AppOptions {
        let g = &self.global;
        let mut opts = AppOptions {
            store: StoreOptions { dir: g.store_dir.clone(), session: g.session.clone() },
            navigation: NavigationOptions { details_base_url: g.details_url.clone(), ..Default::default() },
            export: ExportOptions::default(),
        };
        match &self.command {
            Command::Listing { pause_ms, .. } => opts.navigation.open_all_pause_ms = *pause_ms,
            Command::Details { export, .. } | Command::Auto { export, .. } => {
                opts.export = ExportOptions { out_dir: export.out.clone(), write_file: !export.no_file };
            }
            Command::Search { no_file, .. } => opts.export.write_file = !no_file,
            Command::Context { .. } | Command::Schema => {}
        }
        opts
    }
}

/// Prints the URL for the operator; a CLI has no browser to drive.
pub struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn open(&mut self, url: &str) -> bool {
        eprintln!("Open: {url}");
        true
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let opts = cli.app_options();
    match cli.command {
        Command::Listing { html, select, all, .. } => {
            let selection = match (select, all) {
                (_, true) => Selection::All,
                (Some(n), false) => Selection::One(n),
                (None, false) => Selection::Auto,
            };
            listing(&html, &opts, selection)
        }
        Command::Details { html, url, .. } => details(&html, url.as_deref(), &opts),
        Command::Auto { html, url, .. } => match runner::detect_kind(&url) {
            PageKind::Details => details(&html, Some(url.as_str()), &opts),
            PageKind::Listing => listing(&html, &opts, Selection::Auto),
        },
        Command::Search { config, origin, csrf_token, csrf_from, out, .. } => {
            let cfg = runner::load_search_config(&config)?;
            let csrf = runner::resolve_csrf(csrf_token, csrf_from.as_deref())?;
            let (slots, written) = runner::run_search(&cfg, &origin, csrf, &opts, out.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&slots)?);
            eprintln!("Found {} slots", slots.len());
            if let Some(p) = written {
                eprintln!("Saved: {}", p.display());
            }
            Ok(())
        }
        Command::Context { action } => {
            let store = runner::open_store(&opts);
            match action {
                ContextAction::Show => {
                    let snap = runner::context_show(&store);
                    let json = serde_json::json!({
                        "currentPatient": snap.current,
                        "searchResults": snap.listing,
                    });
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                ContextAction::Clear => {
                    runner::context_clear(&store)?;
                    eprintln!("Context cleared for session {:?}", opts.store.session);
                }
            }
            Ok(())
        }
        Command::Schema => {
            for (section, fields) in SCHEMA {
                for f in *fields {
                    let locs: Vec<String> = f.locators.iter().map(ToString::to_string).collect();
                    println!("{section}.{}\t{}", f.key, locs.join(", "));
                }
            }
            Ok(())
        }
    }
}

fn listing(html: &Path, opts: &AppOptions, selection: Selection) -> Result<()> {
    let page = runner::load_page(html, None)?;
    let store = runner::open_store(opts);
    let report = runner::run_listing(&page, &store, opts, selection, &mut PrintNavigator)
        .wrap_err("listing extraction failed")?;

    eprintln!("Found {} patient(s) in {}:\n", report.patients.len(), report.source);
    for (n, p) in report.patients.iter().enumerate() {
        print_patient(n + 1, p);
    }

    if report.opened.is_empty() {
        eprintln!("Multiple patients found. Open one with: listing {} --select N", html.display());
        eprintln!("Or open all with: listing {} --all", html.display());
    }
    for o in &report.opened {
        if !o.navigated {
            eprintln!("Could not open automatically. Open this URL manually: {}", o.url);
        }
    }
    if !report.opened.is_empty() {
        eprintln!("Then save each details page and run `details` on it.");
    }
    Ok(())
}

fn details(html: &Path, url: Option<&str>, opts: &AppOptions) -> Result<()> {
    let page = runner::load_page(html, url)?;
    let store = runner::open_store(opts);
    let report = runner::run_details(&page, &store, opts)?;

    println!("{}", serde_json::to_string_pretty(&report.result)?);
    print_summary(&report.result);
    if let Some(p) = report.written {
        eprintln!("Saved: {}", p.display());
    }
    if report.result.metadata.patient_id.is_none() && report.result.metadata.account_number.is_none() {
        eprintln!("No patient id or account number found. Is {} a details page?", html.display());
    }
    Ok(())
}

// `n` is the number `--select` takes, not the row position on the page.
fn print_patient(n: usize, p: &IdentityTuple) {
    let show = |v: &Option<String>| v.clone().unwrap_or_default();
    eprintln!("{n}. {}", p.patient_name);
    eprintln!("   Hidden ID: {}", p.hidden_patient_id);
    eprintln!("   Account #: {}", show(&p.account_number));
    eprintln!("   DOB: {}", show(&p.dob));
    eprintln!("   Phone: {}", show(&p.phone));
}

fn print_summary(r: &ExtractionResult) {
    let info = &r.extracted_data.patient_info;
    let text = |v: &Option<crate::engine::FieldValue>| {
        v.as_ref().and_then(|v| v.as_text()).map(str::to_string).unwrap_or_default()
    };
    eprintln!("Patient: {} {}", text(&info.first_name), text(&info.last_name));
    eprintln!("Patient ID: {}", text(&info.patient_id));
    eprintln!("Account #: {}", text(&info.account_number));
    eprintln!("DOB: {}", text(&info.date_of_birth));
    eprintln!("Location: {}", text(&r.extracted_data.providers.location));
    if let Some(ctx) = &r.search_context {
        eprintln!("Linked to search context: hidden id {}, account {}", ctx.hidden_patient_id,
            ctx.account_number.as_deref().unwrap_or(""));
    }
    if !r.metadata.section_errors.is_empty() {
        eprintln!("Sections with errors: {}", r.metadata.section_errors.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_file_makes_details_print_only() {
        let cli = Cli::try_parse_from(["emr_scrape", "details", "page.html", "--no-file"]).unwrap();
        assert!(!cli.app_options().export.write_file);

        let cli = Cli::try_parse_from(["emr_scrape", "details", "page.html", "--out", "records"]).unwrap();
        let opts = cli.app_options();
        assert!(opts.export.write_file);
        assert_eq!(opts.export.out_dir, PathBuf::from("records"));
    }

    #[test]
    fn search_no_file_disables_slot_export() {
        let cli = Cli::try_parse_from([
            "emr_scrape", "search", "params.json", "--origin", "https://h", "--no-file",
        ])
        .unwrap();
        assert!(!cli.app_options().export.write_file);
    }
}
