//! Accessor over the shared artifact namespace.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use baton_protocol::OutputFile;
use walkdir::WalkDir;
use wildmatch::WildMatch;

/// Files under one root directory, addressed by `/`-separated relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactWorkspace {
    root: PathBuf,
}

impl ArtifactWorkspace {
    /// Opens the workspace at `root`, creating the directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    pub fn read_text(&self, name: &str) -> io::Result<String> {
        std::fs::read_to_string(self.path_of(name))
    }

    /// Size of the artifact in bytes.
    pub fn stat(&self, name: &str) -> io::Result<u64> {
        Ok(std::fs::metadata(self.path_of(name))?.len())
    }

    /// Relative names of every file matching `pattern`.
    pub fn list(&self, pattern: &str) -> io::Result<BTreeSet<String>> {
        let matcher = WildMatch::new(pattern);
        Ok(self
            .walk()?
            .into_iter()
            .map(|artifact| artifact.path)
            .filter(|name| matcher.matches(name))
            .collect())
    }

    /// Every file in the workspace with its size, sorted by path.
    pub fn list_files(&self) -> io::Result<Vec<OutputFile>> {
        Ok(self.walk()?.into_iter().map(Artifact::into_output_file).collect())
    }

    /// Every file in the order it was last written, oldest first; ties keep
    /// path order. Read in sequence this shows which artifacts fed which.
    pub fn artifact_chain(&self) -> io::Result<Vec<OutputFile>> {
        let mut artifacts = self.walk()?;
        artifacts.sort_by_key(|artifact| artifact.modified);
        Ok(artifacts.into_iter().map(Artifact::into_output_file).collect())
    }

    fn walk(&self) -> io::Result<Vec<Artifact>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let path = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let metadata = entry.metadata().map_err(io::Error::from)?;
            files.push(Artifact {
                path,
                size_bytes: metadata.len(),
                modified: metadata.modified()?,
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

struct Artifact {
    path: String,
    size_bytes: u64,
    modified: SystemTime,
}

impl Artifact {
    fn into_output_file(self) -> OutputFile {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path).to_string();
        OutputFile {
            path: self.path,
            name,
            size_bytes: self.size_bytes,
        }
    }
}
