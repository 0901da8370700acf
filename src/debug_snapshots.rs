use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageBuffer, PixelWithColorType};

use crate::error_codes::LedError;

pub const FRAGMENT_INDEX_PLACEHOLDER: &str = "{fragment_index}";
pub const STAGE_PLACEHOLDER: &str = "{stage}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStage {
    /// Full-resolution text before downsampling.
    Source,
    /// Text at LED resolution.
    Raster,
    /// Padded scene the fragment scrolls across.
    Scene,
}

impl SnapshotStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Raster => "raster",
            Self::Scene => "scene",
        }
    }
}

/// Where intermediate rasters are dumped while fragments are built. Without a
/// `{stage}` placeholder each checkpoint overwrites the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSnapshots {
    template: String,
}

impl DebugSnapshots {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let path = Path::new(&template);
        if template.ends_with('/') || template.ends_with(std::path::MAIN_SEPARATOR) || path.is_dir() {
            return Err(LedError::debug_path("The debug_template must point to a file").into());
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create debug snapshot directory {}", parent.display())
            })?;
        }
        Ok(Self { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn path_for(&self, fragment_index: usize, stage: SnapshotStage) -> PathBuf {
        PathBuf::from(
            self.template
                .replace(FRAGMENT_INDEX_PLACEHOLDER, &fragment_index.to_string())
                .replace(STAGE_PLACEHOLDER, stage.as_str()),
        )
    }

    pub fn write<P>(
        &self,
        fragment_index: usize,
        stage: SnapshotStage,
        image: &ImageBuffer<P, Vec<u8>>,
    ) -> Result<PathBuf>
    where
        P: PixelWithColorType<Subpixel = u8>,
    {
        let path = self.path_for(fragment_index, stage);
        image
            .save(&path)
            .with_context(|| format!("failed to write debug snapshot {}", path.display()))?;
        tracing::debug!(path = %path.display(), stage = stage.as_str(), "wrote debug snapshot");
        Ok(path)
    }
}
