//! Prim export CLI tool.
//!
//! Extracts prims from a USD stage into a new, self-contained layer:
//!
//! ```text
//! usd-export scene.usda /World/Chair /World/Table -o props.usda
//! ```
//!
//! Without `-o` the destination is formed the way an interactive save would
//! form it: named after the first prim, next to the stage (or, with
//! `--legacy`, in `--save-dir` or the last directory saved to).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use usd_export::events::{DefaultDirectoryTracker, LogSink, StageEvent, StageLifecycle};
use usd_export::export::host::{ExportStrategy, PrimExporter, UsdExtension};
use usd_export::sdf;
use usd_export::settings::JsonPreferenceStore;
use usd_export::usd::Stage;

/// Export USD prims into a new layer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stage to export from (.usda, .usd or .usdz).
    #[arg(value_name = "STAGE")]
    stage: PathBuf,

    /// Prim paths to export.
    #[arg(value_name = "PRIM", required = true)]
    prims: Vec<String>,

    /// Destination file. Defaults to the first prim's name.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Use the legacy save workflow (fixed save directory, file postfix).
    #[arg(long)]
    legacy: bool,

    /// Postfix inserted before the extension (legacy only).
    #[arg(long, requires = "legacy")]
    postfix: Option<String>,

    /// Extension appended to destinations without one (usd, usda; usdc is
    /// not writable).
    #[arg(long, short = 'e', default_value_t = UsdExtension::Usda)]
    extension: UsdExtension,

    /// Directory to save into (legacy only).
    #[arg(long, requires = "legacy")]
    save_dir: Option<PathBuf>,

    /// Preferences file. Defaults to the user config directory.
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Log debug output.
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let prims = args
        .prims
        .iter()
        .map(|prim| sdf::path(prim))
        .collect::<Result<Vec<_>>>()?;

    let mut stage = Stage::open(&args.stage).with_context(|| format!("Failed to open {}", args.stage.display()))?;

    let tracker = DefaultDirectoryTracker::new();
    let mut lifecycle = StageLifecycle::new();
    lifecycle.subscribe(Arc::new(tracker.clone()));
    lifecycle.notify(&StageEvent::Opened {
        root_layer_path: stage.root_layer().real_path().map(PathBuf::from),
    });

    let prefs_path = args
        .prefs
        .clone()
        .or_else(JsonPreferenceStore::default_path)
        .context("No preferences location available, pass --prefs")?;
    let preferences = JsonPreferenceStore::open(prefs_path);

    let strategy = if args.legacy {
        ExportStrategy::Legacy {
            save_dir: args.save_dir.clone(),
            postfix: args.postfix.clone(),
        }
    } else {
        ExportStrategy::Current
    };
    let mut exporter = PrimExporter::new(strategy, Box::new(preferences), Arc::new(LogSink), tracker);

    let destination = match &args.output {
        Some(output) => {
            let dir = output.parent().filter(|dir| !dir.as_os_str().is_empty());
            let name = output
                .file_name()
                .and_then(|name| name.to_str())
                .with_context(|| format!("Invalid destination {}", output.display()))?;
            exporter.resolve_destination(dir, name, args.extension)
        }
        None => {
            let name = exporter
                .default_destination(&prims)
                .context("No prims to name the destination after")?;
            exporter.resolve_destination(None, &name, args.extension)
        }
    };

    let report = exporter.export(&mut stage, &prims, &destination)?;

    println!("Exported to {} (default prim {})", report.destination.display(), report.default_prim);
    for prim in &report.prims {
        println!("  {} -> {}", prim.source, prim.destination);
        for dependency in &prim.external_dependencies {
            println!("    + {dependency}");
        }
    }
    Ok(())
}
