//! Project persistence.
//!
//! A project bundles servos, safe poses, preset library entries and named
//! timelines into one JSON document. Saves go through a temporary file in
//! the target directory and a rename, so a crash never leaves a torn file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use servo_common::engine::preset::PresetDefinition;
use servo_common::engine::safety::SafePose;
use servo_common::engine::servo::ServoSpec;
use servo_common::engine::timeline::Timeline;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the timeline captured from a running engine.
pub const MAIN_TIMELINE: &str = "main";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Project file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed project {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported project version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Active timeline '{0}' not present in project")]
    MissingTimeline(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub version: u32,
    #[serde(default)]
    pub servos: Vec<ServoSpec>,
    #[serde(default)]
    pub safe_poses: Vec<SafePose>,
    #[serde(default)]
    pub presets: BTreeMap<String, PresetDefinition>,
    #[serde(default)]
    pub timelines: BTreeMap<String, Timeline>,
    /// Timeline loaded into the transport on apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

impl Default for ProjectFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            servos: Vec::new(),
            safe_poses: Vec::new(),
            presets: BTreeMap::new(),
            timelines: BTreeMap::new(),
            active: None,
        }
    }
}

impl ProjectFile {
    pub const CURRENT_VERSION: u32 = 1;

    /// Project holding one timeline, stored as [`MAIN_TIMELINE`] and active.
    pub fn capture(
        servos: Vec<ServoSpec>,
        safe_poses: Vec<SafePose>,
        presets: BTreeMap<String, PresetDefinition>,
        timeline: Timeline,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            servos,
            safe_poses,
            presets,
            timelines: BTreeMap::from([(MAIN_TIMELINE.to_string(), timeline)]),
            active: Some(MAIN_TIMELINE.to_string()),
        }
    }

    pub fn active_timeline(&self) -> Option<&Timeline> {
        self.active.as_deref().and_then(|name| self.timelines.get(name))
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.version != Self::CURRENT_VERSION {
            return Err(StoreError::Version {
                found: self.version,
                expected: Self::CURRENT_VERSION,
            });
        }
        match &self.active {
            Some(name) if !self.timelines.contains_key(name) => {
                Err(StoreError::MissingTimeline(name.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// Read and check a project file.
///
/// # Errors
/// [`StoreError`] on a missing, unreadable, malformed or inconsistent file.
pub fn load(path: &Path) -> Result<ProjectFile, StoreError> {
    debug!("Loading project from {}", path.display());
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let project: ProjectFile =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Format {
            path: path.to_path_buf(),
            source,
        })?;
    project.check()?;
    info!(
        "Loaded project {}: {} servo(s), {} timeline(s)",
        path.display(),
        project.servos.len(),
        project.timelines.len()
    );
    Ok(project)
}

/// Write `project` atomically.
///
/// # Errors
/// [`StoreError::Io`] or [`StoreError::Format`].
pub fn save(path: &Path, project: &ProjectFile) -> Result<(), StoreError> {
    let io = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io)?;

    let file_name = path
        .file_name()
        .map_or_else(|| "project".into(), |n| n.to_string_lossy().into_owned());
    let tmp = dir.join(format!(".{file_name}.tmp"));
    {
        let file = File::create(&tmp).map_err(io)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, project).map_err(|source| StoreError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(b"\n").map_err(io)?;
        let file = writer.into_inner().map_err(|e| io(e.into_error()))?;
        file.sync_all().map_err(io)?;
    }
    fs::rename(&tmp, path).map_err(io)?;
    info!("Saved project to {}", path.display());
    Ok(())
}
