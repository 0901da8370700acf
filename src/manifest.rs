use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::document::{
    Document, DocumentConfig, GifOptions, ImageOptions, TextOptions, DEFAULT_COLUMNS,
    DEFAULT_ROWS,
};
use crate::error_codes::LedError;
use crate::schema::{ColorConfig, Direction, MatrixSize, OnPixelRule};
use crate::text_raster::{FontdueGlyphs, GlyphSource};

/// A whole document described in YAML.
///
/// ```yaml
/// columns: 40
/// rows: 9
/// loop: 0
/// font: fonts/Tiny.ttf
/// colors:
///   pixel_on_dark: "#00FF00"
/// fragments:
///   - text: "HELLO"
///     direction: up
///   - image: logo.png
///     speed: 2
///   - gif: clip.gif
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default, rename = "loop")]
    pub loop_count: i32,
    #[serde(default)]
    pub colors: ColorConfig,
    #[serde(default)]
    pub on_pixel_rule: OnPixelRule,
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub debug_template: Option<String>,
    pub fragments: Vec<FragmentSpec>,
}

/// One entry of `fragments`. Exactly one of `text`, `image` or `gif` names
/// the source; the remaining keys are that source's options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmentSpec {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub gif: Option<PathBuf>,
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub speed: Option<u32>,
    #[serde(default)]
    pub intro: Option<bool>,
    #[serde(default)]
    pub outro: Option<bool>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub repeat: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Text,
    Image,
    Gif,
}

impl FragmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Gif => "gif",
        }
    }
}

impl FragmentSpec {
    pub fn kind(&self) -> Result<FragmentKind> {
        match (&self.text, &self.image, &self.gif) {
            (Some(_), None, None) => Ok(FragmentKind::Text),
            (None, Some(_), None) => Ok(FragmentKind::Image),
            (None, None, Some(_)) => Ok(FragmentKind::Gif),
            (None, None, None) => bail!("fragment needs one of 'text', 'image' or 'gif'"),
            _ => bail!("fragment may set only one of 'text', 'image' or 'gif'"),
        }
    }

    fn validate(&self) -> Result<FragmentKind> {
        let kind = self.kind()?;
        let mut unsupported = Vec::new();
        if kind != FragmentKind::Text {
            if self.font.is_some() {
                unsupported.push("font");
            }
            if self.intro.is_some() {
                unsupported.push("intro");
            }
            if self.outro.is_some() {
                unsupported.push("outro");
            }
        }
        if kind == FragmentKind::Gif && self.direction.is_some() {
            unsupported.push("direction");
        }
        if !unsupported.is_empty() {
            bail!(
                "{} fragments do not accept: {}",
                kind.as_str(),
                unsupported.join(", ")
            );
        }
        if self.speed == Some(0) {
            return Err(LedError::invalid_argument("speed must be >= 1, got 0").into());
        }
        if self.repeat == Some(0) {
            return Err(LedError::invalid_argument("repeat must be >= 1, got 0").into());
        }
        Ok(kind)
    }

    fn text_options(&self) -> Result<TextOptions> {
        let defaults = TextOptions::default();
        let font = self
            .font
            .as_deref()
            .map(load_font)
            .transpose()?;
        Ok(TextOptions {
            font,
            duration: self.duration.unwrap_or(defaults.duration),
            speed: self.speed.unwrap_or(defaults.speed),
            intro: self.intro.unwrap_or(defaults.intro),
            outro: self.outro.unwrap_or(defaults.outro),
            direction: self.direction.unwrap_or(defaults.direction),
            repeat: self.repeat.unwrap_or(defaults.repeat),
        })
    }

    fn image_options(&self) -> ImageOptions {
        let defaults = ImageOptions::default();
        ImageOptions {
            duration: self.duration.unwrap_or(defaults.duration),
            speed: self.speed.unwrap_or(defaults.speed),
            direction: self.direction.unwrap_or(defaults.direction),
            repeat: self.repeat.unwrap_or(defaults.repeat),
        }
    }

    fn gif_options(&self) -> GifOptions {
        let defaults = GifOptions::default();
        GifOptions {
            duration: self.duration.or(defaults.duration),
            speed: self.speed.unwrap_or(defaults.speed),
            repeat: self.repeat.unwrap_or(defaults.repeat),
        }
    }
}

fn default_columns() -> u32 {
    DEFAULT_COLUMNS
}

fn default_rows() -> u32 {
    DEFAULT_ROWS
}

pub fn load_and_validate_manifest(path: &Path) -> Result<Manifest> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read tape {}", path.display()))?;
    let mut manifest: Manifest = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;

    validate_manifest(&mut manifest, path)?;
    Ok(manifest)
}

fn validate_manifest(manifest: &mut Manifest, manifest_path: &Path) -> Result<()> {
    MatrixSize::new(manifest.columns, manifest.rows)?;
    if u16::try_from(manifest.loop_count).is_err() {
        return Err(LedError::invalid_construction(format!(
            "loop must be between 0 and {}, got {}",
            u16::MAX,
            manifest.loop_count
        ))
        .into());
    }
    if manifest.fragments.is_empty() {
        return Err(LedError::empty_document("tape must define at least one fragment").into());
    }

    let manifest_dir = manifest_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    if let Some(font) = &manifest.font {
        manifest.font = Some(resolve_and_validate_asset_path(
            &manifest_dir,
            font,
            "tape",
            "font",
        )?);
    }

    for (index, fragment) in manifest.fragments.iter_mut().enumerate() {
        let owner = format!("fragment {index}");
        let kind = fragment
            .validate()
            .with_context(|| format!("failed validating {owner}"))?;
        match kind {
            FragmentKind::Text => {
                if let Some(font) = &fragment.font {
                    fragment.font = Some(resolve_and_validate_asset_path(
                        &manifest_dir,
                        font,
                        &owner,
                        "font",
                    )?);
                }
            }
            FragmentKind::Image => {
                if let Some(image) = &fragment.image {
                    fragment.image = Some(resolve_and_validate_asset_path(
                        &manifest_dir,
                        image,
                        &owner,
                        "image",
                    )?);
                }
            }
            FragmentKind::Gif => {
                if let Some(gif) = &fragment.gif {
                    fragment.gif = Some(resolve_and_validate_asset_path(
                        &manifest_dir,
                        gif,
                        &owner,
                        "gif",
                    )?);
                }
            }
        }
    }

    Ok(())
}

fn resolve_and_validate_asset_path(
    manifest_dir: &Path,
    source_path: &Path,
    owner: &str,
    field_name: &str,
) -> Result<PathBuf> {
    let resolved = if source_path.is_absolute() {
        source_path.to_path_buf()
    } else {
        manifest_dir.join(source_path)
    };

    if !resolved.exists() {
        bail!(
            "{} {} does not exist: {}",
            owner,
            field_name,
            resolved.display()
        );
    }

    if !resolved.is_file() {
        bail!(
            "{} {} is not a file: {}",
            owner,
            field_name,
            resolved.display()
        );
    }

    Ok(resolved)
}

fn load_font(path: &Path) -> Result<Arc<dyn GlyphSource>> {
    Ok(Arc::new(FontdueGlyphs::from_path(path)?))
}

impl Manifest {
    pub fn document_config(&self) -> Result<DocumentConfig> {
        Ok(DocumentConfig {
            columns: self.columns,
            rows: self.rows,
            loop_count: self.loop_count,
            colors: self.colors.clone(),
            on_pixel_rule: self.on_pixel_rule,
            font: self.font.as_deref().map(load_font).transpose()?,
            save_path: None,
            debug_template: self.debug_template.clone(),
        })
    }

    /// Builds the document and adds every fragment in order.
    pub fn build_document(&self) -> Result<Document> {
        let mut document = Document::new(self.document_config()?)?;
        for (index, fragment) in self.fragments.iter().enumerate() {
            add_fragment(&mut document, fragment)
                .with_context(|| format!("failed adding fragment {index}"))?;
        }
        tracing::debug!(
            fragments = document.fragment_count(),
            frames = document.frame_count(),
            "built document from tape"
        );
        Ok(document)
    }
}

fn add_fragment(document: &mut Document, fragment: &FragmentSpec) -> Result<usize> {
    match fragment.kind()? {
        FragmentKind::Text => {
            let text = fragment.text.as_deref().unwrap_or_default();
            document.add_text_fragment(text, &fragment.text_options()?)
        }
        FragmentKind::Image => {
            let path = fragment
                .image
                .as_deref()
                .ok_or_else(|| anyhow!("image fragment has no path"))?;
            document.add_image_fragment(path, &fragment.image_options())
        }
        FragmentKind::Gif => {
            let path = fragment
                .gif
                .as_deref()
                .ok_or_else(|| anyhow!("gif fragment has no path"))?;
            document.add_gif_fragment(path, &fragment.gif_options())
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    use super::*;
    use crate::error_codes::{find_led_error, ErrorCode};

    fn write_tape(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("tape.yaml");
        fs::write(&path, body).unwrap();
        path
    }

    fn write_logo(dir: &Path) {
        let mut logo = RgbaImage::from_pixel(8, 3, Rgba([255, 255, 255, 255]));
        logo.put_pixel(7, 1, Rgba([0, 0, 0, 255]));
        logo.save(dir.join("logo.png")).unwrap();
    }

    #[test]
    fn tape_resolves_paths_and_builds_fragments() {
        let temp = tempdir().unwrap();
        write_logo(temp.path());
        let tape = write_tape(
            temp.path(),
            r##"
columns: 4
rows: 3
loop: 2
colors:
  pixel_on_dark: "#00FF00"
fragments:
  - image: logo.png
    direction: none
  - image: logo.png
    speed: 2
    repeat: 2
"##,
        );

        let manifest = load_and_validate_manifest(&tape).unwrap();
        assert_eq!(manifest.fragments[0].image.as_deref(), Some(temp.path().join("logo.png").as_path()));
        assert_eq!(manifest.colors.pixel_on_dark.to_hex(), "#00FF00");
        assert_eq!(manifest.colors.background, ColorConfig::default().background);

        let document = manifest.build_document().unwrap();
        assert_eq!(document.loop_count(), 2);
        assert_eq!(document.fragment_count(), 2);
        // Images scroll unpadded: distance 8 - 4, two columns per step, twice.
        assert_eq!(document.fragments()[1].frame_count(), 4);
        assert_eq!(document.frame_count(), 5);
    }

    #[test]
    fn unknown_keys_report_the_yaml_location() {
        let temp = tempdir().unwrap();
        let tape = write_tape(temp.path(), "columns: 4\nrows: 3\nspeeed: 2\nfragments: []\n");
        let error = load_and_validate_manifest(&tape).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("speeed"), "{message}");
    }

    #[test]
    fn missing_assets_fail_at_load_time() {
        let temp = tempdir().unwrap();
        let tape = write_tape(temp.path(), "fragments:\n  - gif: nowhere.gif\n");
        let error = load_and_validate_manifest(&tape).unwrap_err();
        assert!(error.to_string().contains("fragment 0 gif does not exist"), "{error}");
    }

    #[test]
    fn fragments_name_exactly_one_source() {
        let temp = tempdir().unwrap();
        write_logo(temp.path());
        let tape = write_tape(
            temp.path(),
            "fragments:\n  - text: hi\n    image: logo.png\n",
        );
        let error = load_and_validate_manifest(&tape).unwrap_err();
        assert!(format!("{error:#}").contains("only one of"), "{error:#}");

        let tape = write_tape(temp.path(), "fragments:\n  - image: logo.png\n    intro: false\n");
        let error = load_and_validate_manifest(&tape).unwrap_err();
        assert!(format!("{error:#}").contains("do not accept: intro"), "{error:#}");
    }

    #[test]
    fn bad_direction_and_empty_tapes_are_coded() {
        let temp = tempdir().unwrap();
        let tape = write_tape(temp.path(), "fragments: []\n");
        let error = load_and_validate_manifest(&tape).unwrap_err();
        assert_eq!(find_led_error(&error).unwrap().code, ErrorCode::EmptyDocument);

        let tape = write_tape(temp.path(), "fragments:\n  - text: hi\n    direction: Sideways\n");
        let error = load_and_validate_manifest(&tape).unwrap_err();
        assert!(error.to_string().contains(r#"Not "sideways""#), "{error}");
    }

    #[test]
    fn text_without_any_font_fails_when_building() {
        let temp = tempdir().unwrap();
        let tape = write_tape(temp.path(), "fragments:\n  - text: hi\n");
        let manifest = load_and_validate_manifest(&tape).unwrap();
        let error = manifest.build_document().unwrap_err();
        assert_eq!(find_led_error(&error).unwrap().code, ErrorCode::InvalidArgument);
    }
}
