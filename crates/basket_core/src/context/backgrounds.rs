//! Background image cache.
//!
//! # Responsibility
//! - Index the PNG backgrounds under `<root>/backgrounds/`.
//! - Track subscribers per image and decode dimensions on first use.
//!
//! # Invariants
//! - Entry names are file names (`<name>.png`), never paths.
//! - Decoded data is released only by `collect_garbage`, and only for
//!   entries without subscribers.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_SUFFIX: &str = ".config";
const CONFIG_GROUP: &str = "[BasKet Background Image Configuration]";

#[derive(Debug, Clone, Default)]
struct BackgroundEntry {
    tiled: bool,
    subscribers: u32,
    dimensions: Option<(u32, u32)>,
}

/// Reference-counted index of background images.
#[derive(Debug, Clone)]
pub struct BackgroundCache {
    dir: PathBuf,
    entries: BTreeMap<String, BackgroundEntry>,
}

impl BackgroundCache {
    /// Scans `dir` (usually `<root>/backgrounds`); a missing directory
    /// yields an empty cache.
    pub fn scan(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        let mut cache = Self {
            dir,
            entries: BTreeMap::new(),
        };
        if !cache.dir.is_dir() {
            return Ok(cache);
        }
        for entry in fs::read_dir(&cache.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("png") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                cache.register(name.to_string());
            }
        }
        log::debug!(
            "event=backgrounds_scan module=context status=ok images={}",
            cache.entries.len()
        );
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        self.exists(name).then(|| self.dir.join(name))
    }

    /// Location of the cached preview. The file itself may not exist yet.
    pub fn preview_path_for(&self, name: &str) -> Option<PathBuf> {
        self.exists(name)
            .then(|| self.dir.join("previews").join(name))
    }

    pub fn config_path_for(&self, name: &str) -> Option<PathBuf> {
        self.exists(name)
            .then(|| self.dir.join(format!("{name}{CONFIG_SUFFIX}")))
    }

    pub fn tiled(&self, name: &str) -> bool {
        self.entries.get(name).map(|entry| entry.tiled).unwrap_or(false)
    }

    /// Copies an image into the backgrounds directory and registers it.
    /// A `.config` sidecar and a `previews/` entry next to `path` come along.
    /// Returns the registered name.
    pub fn add_image(&mut self, path: &Path) -> io::Result<String> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "background has no file name"))?;
        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(&name);
        if path != target {
            fs::copy(path, &target)?;
        }

        if let Some(parent) = path.parent() {
            let config = parent.join(format!("{name}{CONFIG_SUFFIX}"));
            if config.is_file() {
                fs::copy(&config, self.dir.join(format!("{name}{CONFIG_SUFFIX}")))?;
            }
            let preview = parent.join("previews").join(&name);
            if preview.is_file() {
                let previews = self.dir.join("previews");
                fs::create_dir_all(&previews)?;
                fs::copy(&preview, previews.join(&name))?;
            }
        }

        self.register(name.clone());
        log::info!("event=background_add module=context status=ok name={name}");
        Ok(name)
    }

    /// Adds a subscriber. Dimensions are decoded on the first subscription.
    pub fn subscribe(&mut self, name: &str) -> Option<(u32, u32)> {
        let path = self.dir.join(name);
        let entry = self.entries.get_mut(name)?;
        entry.subscribers += 1;
        if entry.dimensions.is_none() {
            match image::image_dimensions(&path) {
                Ok(dimensions) => entry.dimensions = Some(dimensions),
                Err(err) => {
                    log::warn!(
                        "event=background_decode module=context status=warn name={name} error={err}"
                    );
                }
            }
        }
        entry.dimensions
    }

    /// Drops a subscriber. Returns the remaining count.
    pub fn unsubscribe(&mut self, name: &str) -> u32 {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                entry.subscribers
            }
            None => 0,
        }
    }

    pub fn subscribers(&self, name: &str) -> u32 {
        self.entries.get(name).map(|entry| entry.subscribers).unwrap_or(0)
    }

    pub fn dimensions(&self, name: &str) -> Option<(u32, u32)> {
        self.entries.get(name).and_then(|entry| entry.dimensions)
    }

    /// Releases decoded data of unsubscribed entries. Returns how many.
    pub fn collect_garbage(&mut self) -> usize {
        let mut released = 0;
        for entry in self.entries.values_mut() {
            if entry.subscribers == 0 && entry.dimensions.take().is_some() {
                released += 1;
            }
        }
        if released > 0 {
            log::debug!("event=backgrounds_gc module=context status=ok released={released}");
        }
        released
    }

    fn register(&mut self, name: String) {
        let tiled = read_tiled(&self.dir.join(format!("{name}{CONFIG_SUFFIX}")));
        let entry = self.entries.entry(name).or_default();
        entry.tiled = tiled;
        entry.dimensions = None;
    }
}

/// Reads `tiled` from an image's `.config` sidecar. Missing means false.
fn read_tiled(path: &Path) -> bool {
    let Ok(text) = fs::read_to_string(path) else {
        return false;
    };
    let mut in_group = false;
    for line in text.lines().map(str::trim) {
        if line.starts_with('[') {
            in_group = line == CONFIG_GROUP;
            continue;
        }
        if !in_group {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "tiled" {
                return value.trim() == "true";
            }
        }
    }
    false
}
