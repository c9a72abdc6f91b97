use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use lunch_menus::catalog::{Catalog, MenuKind};
use lunch_menus::config::{self, RunConfig, RunMode};
use lunch_menus::fetch::build_client;
use lunch_menus::interpret::{self, OpenAiInterpreter};
use lunch_menus::snapshot::Snapshots;
use lunch_menus::Acquirer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PREVIEW_CHARS: usize = 500;

#[derive(Parser, Debug)]
#[command(name = "lunch-menus", about = "Fetch a restaurant's weekly lunch menu")]
struct Cli {
    /// Visible browser, snapshots under the debug directory, skip failing days
    #[arg(long)]
    debug: bool,

    /// Stop before the menu is sent to the language model
    #[arg(long)]
    dry_run: bool,

    /// Restaurant id from the catalog
    #[arg(long, default_value = "gira")]
    restaurant: String,

    #[arg(long, default_value = "debug")]
    debug_dir: PathBuf,
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "info,lunch_menus=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config::load_env();

    let run = RunConfig {
        mode: if cli.debug {
            RunMode::Diagnostic
        } else {
            RunMode::Normal
        },
        dry_run: cli.dry_run,
        source_id: cli.restaurant,
        debug_dir: cli.debug_dir,
        ..RunConfig::default()
    };

    let catalog = Catalog::builtin();
    let source = catalog
        .get(&run.source_id)
        .with_context(|| format!("known restaurants: {}", catalog.ids().join(", ")))?;

    let client = build_client()?;
    let acquirer = Acquirer::new(client, &run);
    let menu = acquirer
        .acquire(source)
        .await
        .with_context(|| format!("failed to acquire menu for {}", source.name))?;

    println!("\nMenu Content Sample:");
    println!("=============");
    println!("{}", preview(&menu.text));
    println!("=============");

    if run.dry_run {
        info!("dry run, not parsing menu");
        return Ok(());
    }

    let interpreter = OpenAiInterpreter::from_env()?;
    info!("parsing menu data with the language model");
    let parsed = match menu.kind {
        MenuKind::Html => {
            let mut parsed = interpret::interpret_html(&interpreter, &menu.text).await?;
            interpret::absolutize_links(&mut parsed, &source.base_url);
            parsed
        }
        MenuKind::Pdf => {
            let pdf_url = menu.pdf_url.as_deref().unwrap_or(&source.url);
            interpret::interpret_pdf(&interpreter, &menu.text, &source.name, pdf_url).await?
        }
    };

    let pretty = interpret::pretty_json(&parsed);
    if run.mode.is_diagnostic() {
        Snapshots::enabled(&run.debug_dir).save(
            &source.name,
            "parsed_menu",
            "json",
            pretty.as_bytes(),
        );
    }

    println!("\nWeekly Menu:");
    println!("===========");
    println!("{pretty}");

    Ok(())
}
