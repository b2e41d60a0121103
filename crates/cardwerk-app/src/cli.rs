// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use cardwerk_core::config::ExportDefaults;
use cardwerk_core::{OutputFormat, Quality};
use cardwerk_export::ExportOptions;
use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cardwerk")]
#[command(version, about = "Detect trading cards in front/back photos and export listing crops")]
pub struct Cli {
    /// Settings file [default: $XDG_CONFIG_HOME/cardwerk/config.json]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a photo, detect cards, and print the detections as JSON
    Detect {
        /// Photo to scan (JPEG, PNG, HEIC/HEIF, AVIF)
        image: PathBuf,
    },
    /// Detect, pair and export the cards in a front (and optional back) photo
    Export(ExportArgs),
    /// Check a finished export folder and/or ZIP
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("destination").required(true).args(["out", "zip"])))]
pub struct ExportArgs {
    /// Photo of the card fronts
    #[arg(long)]
    pub front: PathBuf,

    /// Photo of the card backs
    #[arg(long)]
    pub back: Option<PathBuf>,

    /// Export into this folder
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Export into this ZIP file
    #[arg(long)]
    pub zip: Option<PathBuf>,

    /// Output image format (jpeg or png)
    #[arg(long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// JPEG quality
    #[arg(long, value_parser = clap::value_parser!(u32).range(70..=100))]
    pub quality: Option<u32>,

    /// Also write a perspective-corrected FRONT_WARPED image
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub warped: Option<bool>,

    /// Write MANIFEST.json next to each pair's images
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub manifest: Option<bool>,

    /// Set name used for the pair folders
    #[arg(long, default_value = "")]
    pub set_name: String,

    /// Card names, in left-to-right front order (repeatable)
    #[arg(long = "card-name")]
    pub card_names: Vec<String>,
}

impl ExportArgs {
    /// Configured defaults with any flags given on the command line applied.
    pub fn options(&self, defaults: &ExportDefaults) -> ExportOptions {
        let base = ExportOptions::from_defaults(defaults);
        ExportOptions {
            format: self.format.unwrap_or(base.format),
            quality: self.quality.map(Quality::from_ui).unwrap_or(base.quality),
            include_warped: self.warped.unwrap_or(base.include_warped),
            write_manifest: self.manifest.unwrap_or(base.write_manifest),
        }
    }

    /// Name for the `index`-th pair; unnamed pairs are numbered.
    pub fn card_name(&self, index: usize) -> String {
        self.card_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Card {}", index + 1))
    }
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("bundle")
        .required(true)
        .multiple(true)
        .args(["dir_export", "zip_export"])
))]
pub struct ValidateArgs {
    /// Export folder to check
    #[arg(long)]
    pub dir_export: Option<PathBuf>,

    /// Export ZIP to check
    #[arg(long)]
    pub zip_export: Option<PathBuf>,

    /// Require FRONT_WARPED in every pair folder
    #[arg(long)]
    pub expect_warped: bool,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(s).ok_or_else(|| format!("Invalid format '{s}', expected jpeg or png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export_args(extra: &[&str]) -> ExportArgs {
        let mut argv = vec!["cardwerk", "export", "--front", "f.jpg", "--out", "out"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Export(args) => args,
            other => panic!("expected export, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_defaults() {
        let args = export_args(&["--format", "png", "--quality", "80", "--warped", "false"]);
        let options = args.options(&ExportDefaults::default());
        assert_eq!(options.format, OutputFormat::Png);
        assert_eq!(options.quality.jpeg_level(), 80);
        assert!(!options.include_warped);
        assert!(options.write_manifest);
    }

    #[test]
    fn bare_switch_means_true() {
        let mut defaults = ExportDefaults::default();
        defaults.include_warped = false;
        let args = export_args(&["--warped"]);
        assert!(args.options(&defaults).include_warped);
    }

    #[test]
    fn quality_outside_range_is_rejected() {
        let argv = ["cardwerk", "export", "--front", "f.jpg", "--out", "o", "--quality", "50"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn destination_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["cardwerk", "export", "--front", "f.jpg"]).is_err());
        assert!(
            Cli::try_parse_from([
                "cardwerk", "export", "--front", "f.jpg", "--out", "o", "--zip", "o.zip"
            ])
            .is_err()
        );
    }

    #[test]
    fn unnamed_cards_are_numbered() {
        let args = export_args(&["--card-name", "Pikachu"]);
        assert_eq!(args.card_name(0), "Pikachu");
        assert_eq!(args.card_name(1), "Card 2");
    }

    #[test]
    fn validate_needs_a_bundle() {
        assert!(Cli::try_parse_from(["cardwerk", "validate"]).is_err());
        assert!(Cli::try_parse_from(["cardwerk", "validate", "--zip-export", "x.zip"]).is_ok());
    }
}
