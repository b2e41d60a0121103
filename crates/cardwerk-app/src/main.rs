// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cardwerk: card photo detection, front/back pairing and listing export.
//
// Entry point. Initialises logging, parses the command line, and runs the
// requested pipeline.

mod cli;
mod services;

use std::path::Path;
use std::process::ExitCode;

use cardwerk_core::error::{CardwerkError, Result};
use cardwerk_core::human_errors::humanize_error;
use cardwerk_export::{ArchiveSink, DirectorySink, ExportPair, ExportSink, validate_exports};
use clap::Parser;

use cli::{Cli, Command, ExportArgs, ValidateArgs};
use services::app_services::{AppServices, suggest_pairings};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    // Validation distinguishes "issues found" (1) from "could not validate" (2).
    let failure = match cli.command {
        Command::Validate(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    };

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            tracing::debug!(error = %err, "command failed");
            failure
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Detect { image } => detect(cli.config.as_deref(), &image).await,
        Command::Export(args) => export(cli.config.as_deref(), &args).await,
        Command::Validate(args) => validate(&args),
    }
}

async fn detect(config: Option<&Path>, image: &Path) -> Result<ExitCode> {
    let mut services = AppServices::init(config)?;
    let file_id = services.load_photo(image, "photo").await?;
    let cards = services.original_detections(&file_id)?;
    let info = services.session().require_working_image(&file_id)?;
    let output = serde_json::json!({
        "file": info.file_name,
        "width": info.original_width,
        "height": info.original_height,
        "cards": cards,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

async fn export(config: Option<&Path>, args: &ExportArgs) -> Result<ExitCode> {
    let mut services = AppServices::init(config)?;
    let options = args.options(&services.config().export);

    let front = services.load_photo(&args.front, "front").await?;
    let back = match &args.back {
        Some(path) => {
            let back = services.load_back(path).await?;
            if back.is_none() {
                eprintln!(
                    "warning: back photo {} was skipped; fronts export without backs",
                    path.display()
                );
            }
            back
        }
        None => None,
    };

    let pairings = suggest_pairings(services.session(), &front, back.as_ref());
    if pairings.is_empty() {
        return Err(CardwerkError::DetectionFailure {
            file: args.front.display().to_string(),
            detail: "no cards found".into(),
        });
    }
    let pairs: Vec<ExportPair> = pairings
        .into_iter()
        .enumerate()
        .map(|(i, pairing)| ExportPair::new(pairing, args.card_name(i), args.set_name.clone()))
        .collect();

    let mut sink: Box<dyn ExportSink> = match (&args.out, &args.zip) {
        (Some(dir), _) => Box::new(DirectorySink::open(dir)?),
        (None, Some(zip)) => Box::new(ArchiveSink::new(zip)),
        (None, None) => {
            return Err(CardwerkError::InvalidConfig(
                "an output folder or ZIP file is required".into(),
            ));
        }
    };

    let report = services
        .export(&pairs, &options, sink.as_mut(), |event| {
            println!("[{}/{}] {}", event.completed, event.total, event.message);
        })
        .await?;

    if let Some(path) = &report.archive_path {
        println!("Archive written to {}", path.display());
    }
    for failed in &report.failed_pairs {
        eprintln!("skipped {} ({}): {}", failed.card_name, failed.pair_id, failed.reason);
    }
    Ok(if report.failed_pairs.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn validate(args: &ValidateArgs) -> Result<ExitCode> {
    let report = validate_exports(
        args.dir_export.as_deref(),
        args.zip_export.as_deref(),
        args.expect_warped,
    )?;
    if report.passed() {
        println!("OK: {} pair folder(s) validated", report.folders_checked);
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!("Export validation found {} issue(s):", report.issues.len());
    for issue in &report.issues {
        eprintln!("  - {issue}");
    }
    Ok(ExitCode::FAILURE)
}
