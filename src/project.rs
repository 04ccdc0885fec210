//! JSON project files read by the `montage` binary.
//!
//! A project lists media by path; relative paths are resolved against the project file's
//! directory.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::config::{EngineConfig, FillerConfig};
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::picker::{FsAssetLoader, PickedAsset, gather_items};
use crate::media::{TextOverlay, VideoSource};
use crate::schedule::TransitionMode;
use crate::session::RenderRequest;

/// One media entry of a project.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProjectItem {
    /// Video clip.
    Video {
        /// Clip path.
        path: PathBuf,
    },
    /// Still image.
    Image {
        /// Image path.
        path: PathBuf,
    },
}

impl ProjectItem {
    fn path_mut(&mut self) -> &mut PathBuf {
        match self {
            Self::Video { path } | Self::Image { path } => path,
        }
    }
}

/// A render described as JSON.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectFile {
    /// Engine settings.
    #[serde(default)]
    pub config: EngineConfig,
    /// Media in timeline order.
    pub items: Vec<ProjectItem>,
    /// Captions.
    #[serde(default)]
    pub texts: Vec<TextOverlay>,
    /// Segment hand-over.
    #[serde(default)]
    pub transition: TransitionMode,
    /// Audio replacing every clip's own audio.
    #[serde(default)]
    pub soundtrack: Option<PathBuf>,
}

impl ProjectFile {
    /// Parse a project from JSON. Paths are kept as written.
    pub fn from_reader<R: std::io::Read>(r: R) -> MontageResult<Self> {
        let project: Self = serde_json::from_reader(r)
            .map_err(|e| MontageError::serde(format!("parse project JSON: {e}")))?;
        project.config.validate()?;
        Ok(project)
    }

    /// Read a project file and resolve its relative paths against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> MontageResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            MontageError::validation(format!("open project '{}': {e}", path.display()))
        })?;
        let mut project = Self::from_reader(BufReader::new(f))?;
        project.resolve_paths(path.parent().unwrap_or_else(|| Path::new(".")));
        Ok(project)
    }

    /// Make every relative path absolute against `root`.
    pub fn resolve_paths(&mut self, root: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        for item in &mut self.items {
            fix(item.path_mut());
        }
        if let Some(p) = self.soundtrack.as_mut() {
            fix(p);
        }
        if let FillerConfig::Bundled {
            silence,
            background,
        } = &mut self.config.fillers
        {
            fix(silence);
            fix(background);
        }
        if let Some(p) = self.config.font_file.as_mut() {
            fix(p);
        }
        if let Some(p) = self.config.output_dir.as_mut() {
            fix(p);
        }
    }

    /// Build the render request, loading every item from disk concurrently.
    ///
    /// Items that fail to load are dropped with a warning; the rest keep their position.
    pub fn to_request(&self) -> RenderRequest {
        let picks: Vec<PickedAsset<PathBuf>> = self
            .items
            .iter()
            .map(|item| match item {
                ProjectItem::Video { path } => PickedAsset {
                    is_video: true,
                    handle: path.clone(),
                },
                ProjectItem::Image { path } => PickedAsset {
                    is_video: false,
                    handle: path.clone(),
                },
            })
            .collect();

        let mut request = RenderRequest::new(gather_items(&picks, &FsAssetLoader))
            .with_texts(self.texts.clone())
            .with_transition(self.transition);
        if let Some(path) = &self.soundtrack {
            request = request.with_soundtrack(VideoSource::new(path.clone()));
        }
        request
    }
}

#[cfg(test)]
#[path = "../tests/unit/project.rs"]
mod tests;
