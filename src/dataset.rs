//! Lazy enumeration of dataset files by extension.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Builds a [Dataset] over the files below a root directory that match one or more extensions.
#[derive(Clone, Debug)]
pub struct DatasetBuilder {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DatasetBuilder {
    /// Return a new DatasetBuilder rooted at `root` with no extensions registered.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            extensions: Vec::new(),
        }
    }

    /// Register a file extension to match.
    ///
    /// A leading dot is ignored, and registering an extension that is already present has no
    /// effect.
    pub fn add_extension(&mut self, extension: &str) -> &mut Self {
        let extension = extension.strip_prefix('.').unwrap_or(extension);
        if !self.extensions.iter().any(|e| e == extension) {
            self.extensions.push(extension.to_string());
        }
        self
    }

    /// Registered extensions, in registration order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Create a lazy sequence of matching file paths.
    ///
    /// Nothing is read from the filesystem until the sequence is first advanced.
    ///
    /// # Arguments
    ///
    /// * `recursive`: Whether to descend into subdirectories of the root.
    pub fn build(&self, recursive: bool) -> Dataset {
        debug!(
            root = %self.root.display(),
            extensions = ?self.extensions,
            recursive,
            "enumerating dataset"
        );
        Dataset {
            root: Some(self.root.clone()),
            open: Vec::new(),
            extensions: self.extensions.clone(),
            recursive,
        }
    }
}

/// A forward-only sequence of dataset file paths.
///
/// Paths are produced in directory listing order, depth first. Directories and entries that
/// cannot be read are logged and skipped. Hidden entries, whose names start with `.`, are
/// neither yielded nor descended into. Symbolic links to files are followed; symbolic
/// links to directories are not descended into.
pub struct Dataset {
    /// Root directory, until it is first listed.
    root: Option<PathBuf>,
    /// Directory listings in progress, innermost last.
    open: Vec<fs::ReadDir>,
    extensions: Vec<String>,
    recursive: bool,
}

impl Dataset {
    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }

    fn descend(&mut self, dir: &Path) {
        match fs::read_dir(dir) {
            Ok(entries) => self.open.push(entries),
            Err(err) => warn!(
                dir = %dir.display(),
                error = %err,
                "skipping unreadable dataset directory"
            ),
        }
    }
}

impl Iterator for Dataset {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if let Some(root) = self.root.take() {
            self.descend(&root);
        }
        loop {
            let entry = match self.open.last_mut()?.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    warn!("skipping unreadable dataset entry: {}", err);
                    continue;
                }
                None => {
                    self.open.pop();
                    continue;
                }
            };
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => {
                    if self.recursive {
                        self.descend(&path);
                    }
                }
                Ok(_) => {
                    if path.is_file() && self.matches(&path) {
                        return Some(path);
                    }
                }
                Err(err) => warn!(
                    path = %path.display(),
                    error = %err,
                    "skipping unreadable dataset entry"
                ),
            }
        }
    }
}

/// Return the dataset of GeoTIFF images below `root`, searched recursively.
pub fn tif_dataset(root: &Path) -> Dataset {
    let mut builder = DatasetBuilder::new(root);
    builder.add_extension("tif");
    builder.build(true)
}
