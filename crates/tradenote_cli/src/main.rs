//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load a notes document through `tradenote_core` and print a summary.
//! - Optionally re-save the normalized document (`--resave`).
//!
//! Usage: `tradenote_cli [--resave] [PATH]`
//! Environment: `TRADENOTE_LOG` (level), `TRADENOTE_LOG_DIR` (absolute dir).

use std::path::PathBuf;
use std::process::ExitCode;
use tradenote_core::{
    core_version, default_log_level, init_logging, ping, DocumentStore, LoadSource, StoreConfig,
    DEFAULT_DB_PATH,
};

fn main() -> ExitCode {
    let mut resave = false;
    let mut path = PathBuf::from(DEFAULT_DB_PATH);
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--resave" => resave = true,
            "-h" | "--help" => {
                println!("usage: tradenote_cli [--resave] [PATH]");
                return ExitCode::SUCCESS;
            }
            other => path = PathBuf::from(other),
        }
    }

    if let Ok(log_dir) = std::env::var("TRADENOTE_LOG_DIR") {
        let level = std::env::var("TRADENOTE_LOG").unwrap_or_else(|_| default_log_level().into());
        if let Err(err) = init_logging(&level, &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    println!("tradenote_core ping={}", ping());
    println!("tradenote_core version={}", core_version());

    let mut store = DocumentStore::load(&path, StoreConfig::default());
    let origin = match store.load_source() {
        LoadSource::File => "file".to_string(),
        LoadSource::Missing => "seeded (missing file)".to_string(),
        LoadSource::Unreadable(reason) => format!("seeded (unreadable: {reason})"),
    };
    println!("document={} origin={}", path.display(), origin);
    println!(
        "checklist questions={} pages={}",
        store.config().checklist_questions.len(),
        store.document().page_count()
    );

    for category in store.category_order() {
        println!("[{category}]");
        for step in store.steps_in_category(category) {
            println!(
                "  {} ({} page{}, last viewed {})",
                step.name,
                step.pages.len(),
                if step.pages.len() == 1 { "" } else { "s" },
                step.last_page_index + 1
            );
        }
    }

    if !resave {
        return ExitCode::SUCCESS;
    }
    match store.save(&path) {
        Ok(report) => {
            println!("saved bytes={} attempts={}", report.bytes, report.attempts);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("save failed: {err}");
            ExitCode::FAILURE
        }
    }
}
