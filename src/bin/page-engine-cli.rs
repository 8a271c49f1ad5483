//! Demo CLI: paginate a plain-text file and print page boundaries.
//!
//! Exercises C1-C4 synchronously, without the durable cache or background
//! worker (those live in `page-engine-store`/`page-engine-session`); useful
//! for manually sanity-checking layout changes against a real file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use page_engine::{
    open_book, LayoutAttributes, LayoutEngine, Metrics, Paginator, UserSettings, ViewportSize,
};

/// Paginate a plain-text book and print the resulting page boundaries.
#[derive(Parser, Debug)]
#[command(name = "page-engine-cli", version, about)]
struct Args {
    /// Path to the plain-text book.
    path: PathBuf,

    /// Viewport width, in points.
    #[arg(long, default_value_t = 390.0)]
    width: f64,

    /// Viewport height, in points.
    #[arg(long, default_value_t = 844.0)]
    height: f64,

    /// Font size, in points.
    #[arg(long, default_value_t = 17.0)]
    font_size: f64,

    /// Line spacing multiplier.
    #[arg(long, default_value_t = 1.0)]
    line_spacing: f64,

    /// Force a specific encoding instead of auto-detecting.
    #[arg(long)]
    encoding: Option<String>,

    /// Print each page's content, not just its boundaries.
    #[arg(long)]
    show_content: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), page_engine::EngineError> {
    let metrics = Metrics::default();
    let opened = open_book(&args.path, &metrics, args.encoding.as_deref())?;
    if let Some(diagnostic) = &opened.diagnostic {
        tracing::warn!(%diagnostic, "decoding diagnostic");
    }

    let settings = UserSettings {
        font_size: args.font_size,
        line_spacing: args.line_spacing,
        ..UserSettings::default()
    };
    let attrs = LayoutAttributes::from_settings(&settings);
    let viewport = ViewportSize::new(args.width, args.height);
    let drawable = viewport.drawable_size(&metrics);

    let engine = LayoutEngine::new(metrics);
    let paginator = Paginator::new(
        &opened.text,
        &engine,
        attrs,
        drawable,
        0,
        1,
        args.show_content,
    );

    println!(
        "book: {} ({} bytes, encoding={})",
        opened.book.title, opened.book.file_size, opened.book.encoding_name
    );

    let mut page_count = 0u64;
    for step in paginator {
        page_count += 1;
        if let Some(diagnostic) = &step.diagnostic {
            tracing::warn!(%diagnostic, page = step.page.page_number, "layout diagnostic");
        }
        if args.show_content {
            println!(
                "page {:>5} [{:>8}, {:>8}): {:?}",
                step.page.page_number,
                step.page.start_index,
                step.page.end_index,
                step.page.content.unwrap_or_default()
            );
        } else {
            println!(
                "page {:>5} [{:>8}, {:>8})",
                step.page.page_number, step.page.start_index, step.page.end_index
            );
        }
    }

    println!("total pages: {page_count}");
    Ok(())
}
