//! The save workflow around [`export_prims`]: where exports go by default,
//! how destination names are formed, and who hears about a finished save.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use strum::{Display, EnumString};

use super::{export_prims, ExportOptions, ExportReport, Result};
use crate::events::{DefaultDirectoryTracker, EventSink, FileEvent};
use crate::sdf::Path;
use crate::settings::PreferenceStore;
use crate::usd::Stage;

/// Extensions offered when choosing a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UsdExtension {
    #[default]
    Usd,
    Usda,
    /// Accepted as a name only: exporting to it fails with
    /// [`ExportError::UnsupportedFormat`](super::ExportError::UnsupportedFormat).
    Usdc,
}

/// How destinations are chosen and remembered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExportStrategy {
    /// Save next to the open stage, named after the first exported prim.
    #[default]
    Current,
    /// Save to a fixed directory, or wherever the last export went. A
    /// postfix turns `name.usd` into `name.<postfix>.usd`.
    Legacy {
        save_dir: Option<PathBuf>,
        postfix: Option<String>,
    },
}

pub struct PrimExporter {
    strategy: ExportStrategy,
    preferences: Box<dyn PreferenceStore>,
    events: Arc<dyn EventSink>,
    tracker: DefaultDirectoryTracker,
    options: ExportOptions,
}

impl PrimExporter {
    /// `tracker` should be subscribed to the host's stage lifecycle so the
    /// default directory follows the open stage.
    pub fn new(
        strategy: ExportStrategy,
        preferences: Box<dyn PreferenceStore>,
        events: Arc<dyn EventSink>,
        tracker: DefaultDirectoryTracker,
    ) -> Self {
        Self {
            strategy,
            preferences,
            events,
            tracker,
            options: ExportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn strategy(&self) -> &ExportStrategy {
        &self.strategy
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn preferences(&self) -> &dyn PreferenceStore {
        self.preferences.as_ref()
    }

    /// Directory a destination is resolved against when none is given.
    pub fn default_directory(&self) -> Option<PathBuf> {
        let configured = match &self.strategy {
            ExportStrategy::Current => self.tracker.directory(),
            ExportStrategy::Legacy { save_dir, .. } => save_dir.clone(),
        };
        configured.or_else(|| self.preferences.last_save_dir())
    }

    /// File name suggested for exporting `prims`: the first prim's name.
    pub fn default_destination(&self, prims: &[Path]) -> Option<String> {
        prims.first().map(|prim| prim.name().to_owned())
    }

    /// Full destination path for `file_name`.
    ///
    /// Names without a USD extension get `extension` appended. Without a
    /// `dir` the strategy's default directory is used, and failing that the
    /// working directory.
    pub fn resolve_destination(&self, dir: Option<&FsPath>, file_name: &str, extension: UsdExtension) -> PathBuf {
        let mut name = file_name.to_owned();
        if !has_usd_extension(&name) {
            name = format!("{name}.{extension}");
        }
        if let ExportStrategy::Legacy {
            postfix: Some(postfix), ..
        } = &self.strategy
        {
            if !postfix.is_empty() {
                name = name.replace(".usd", &format!(".{postfix}.usd"));
            }
        }

        let dir = dir
            .map(FsPath::to_path_buf)
            .or_else(|| self.default_directory())
            .unwrap_or_default();
        dir.join(name)
    }

    /// Export `prims` to `destination`, then record it as a recent file and
    /// the last save directory and publish [`FileEvent::Saved`].
    ///
    /// Failing to persist preferences doesn't fail the export.
    pub fn export(&mut self, stage: &mut Stage, prims: &[Path], destination: &FsPath) -> Result<ExportReport> {
        let report = export_prims(stage, prims, destination, &self.options)?;

        if let Err(err) = self.preferences.add_recent_file(report.destination.clone()) {
            log::warn!("Failed to update recent files: {err:#}");
        }

        let dir = destination
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(FsPath::to_path_buf);
        if let Some(dir) = dir {
            if self.strategy == ExportStrategy::Current {
                self.tracker.set_directory(Some(dir.clone()));
            }
            if let Err(err) = self.preferences.set_last_save_dir(dir) {
                log::warn!("Failed to remember save directory: {err:#}");
            }
        }

        self.events.publish(FileEvent::Saved {
            url: report.destination.clone(),
        });
        Ok(report)
    }
}

fn has_usd_extension(name: &str) -> bool {
    FsPath::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.parse::<UsdExtension>().is_ok())
}
