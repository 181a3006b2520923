use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub import: ImportConfig,
    #[serde(default)]
    pub visual: VisualConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Directory scanned when `ingest` is run without explicit paths.
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Where cropped region images from the visual pipeline are persisted.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.docx".to_string(),
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./output")
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisualConfig {
    /// Rendering resolution for page rasterization.
    #[serde(default = "default_raster_dpi")]
    pub raster_dpi: u32,
    /// Gaussian blur sigma applied before thresholding.
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,
    /// Dilation passes merging nearby ink into section blobs. More passes
    /// merge more aggressively.
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u32,
    /// Page rasterizer backend. Currently only `pdftoppm`.
    #[serde(default = "default_rasterizer")]
    pub rasterizer: String,
    /// Text recognizer backend. Currently only `tesseract`.
    #[serde(default = "default_recognizer")]
    pub recognizer: String,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            raster_dpi: default_raster_dpi(),
            blur_sigma: default_blur_sigma(),
            dilate_iterations: default_dilate_iterations(),
            rasterizer: default_rasterizer(),
            recognizer: default_recognizer(),
        }
    }
}

fn default_raster_dpi() -> u32 {
    150
}
fn default_blur_sigma() -> f32 {
    2.0
}
fn default_dilate_iterations() -> u32 {
    8
}
fn default_rasterizer() -> String {
    "pdftoppm".to_string()
}
fn default_recognizer() -> String {
    "tesseract".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.import.include_globs.is_empty() {
        anyhow::bail!("import.include_globs must not be empty");
    }

    if config.visual.dilate_iterations == 0 {
        anyhow::bail!("visual.dilate_iterations must be >= 1");
    }

    if !(config.visual.blur_sigma > 0.0) {
        anyhow::bail!("visual.blur_sigma must be > 0");
    }

    if !(50..=600).contains(&config.visual.raster_dpi) {
        anyhow::bail!("visual.raster_dpi must be between 50 and 600");
    }

    match config.visual.rasterizer.as_str() {
        "pdftoppm" => {}
        other => anyhow::bail!("Unknown rasterizer: '{}'. Must be pdftoppm.", other),
    }

    match config.visual.recognizer.as_str() {
        "tesseract" => {}
        other => anyhow::bail!("Unknown recognizer: '{}'. Must be tesseract.", other),
    }

    Ok(config)
}
