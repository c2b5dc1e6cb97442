use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::ThresholdScale;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default = "default_annotations")]
    pub annotations: Vec<AnnotationConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub geometry: PathBuf, // .geojson, .json or .shp
    pub values_csv: PathBuf,
    #[serde(default = "default_join_column_geometry")]
    pub join_column_geometry: String,
    #[serde(default = "default_join_column_csv")]
    pub join_column_csv: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassificationConfig {
    pub title: String,
    pub thresholds: Vec<f64>,
    pub colors: Vec<String>, // Hex codes, one per bucket
    pub labels: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        ClassificationConfig {
            title: "Population".to_string(),
            thresholds: vec![100_000_000.0, 500_000_000.0],
            colors: vec!["#F8CAEE".into(), "#BF76AF".into(), "#852170".into()],
            labels: vec!["< 100 M".into(), "100 M - 500 M".into(), "> 500 M".into()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InteractionConfig {
    pub default_opacity: f64,
    pub dimmed_opacity: f64,
    pub highlight_opacity: f64,
    pub tooltip_opacity: f64,
    pub tooltip_offset_y: f64,
    pub stroke_color: String,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        InteractionConfig {
            default_opacity: 0.7,
            dimmed_opacity: 0.5,
            highlight_opacity: 1.0,
            tooltip_opacity: 0.8,
            tooltip_offset_y: 28.0,
            stroke_color: "black".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Margins { top: 20.0, right: 10.0, bottom: 40.0, left: 100.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    /// Outer SVG size, margins included.
    pub width: f64,
    pub height: f64,
    pub margin: Margins,
    pub scale: f64,
    /// Projection center as `[lon, lat]`.
    pub center: [f64; 2],
    pub output: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            width: 600.0,
            height: 400.0,
            margin: Margins::default(),
            scale: 70.0,
            center: [0.0, 20.0],
            output: PathBuf::from("map.svg"),
        }
    }
}

impl RenderConfig {
    /// Drawing area width, margins excluded.
    pub fn inner_width(&self) -> f64 {
        self.width - self.margin.left - self.margin.right
    }

    pub fn inner_height(&self) -> f64 {
        self.height - self.margin.top - self.margin.bottom
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnnotationConfig {
    pub title: String,
    pub label: String,
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
    #[serde(default = "default_annotation_color")]
    pub color: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory served at `/`. Falls back to the directory holding the
    /// rendered SVG.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 3000, static_dir: None }
    }
}

fn default_join_column_geometry() -> String {
    "id".to_string()
}

fn default_join_column_csv() -> String {
    "code".to_string()
}

fn default_value_column() -> String {
    "pop".to_string()
}

fn default_annotation_color() -> String {
    "#852170".to_string()
}

fn default_annotations() -> Vec<AnnotationConfig> {
    vec![AnnotationConfig {
        title: "Australia Population".to_string(),
        label: "despite its great territorial extension Australia has only 20 million inhabitants."
            .to_string(),
        lon: 150.916672,
        lat: -31.083332,
        dx: 10.0,
        dy: -30.0,
        color: default_annotation_color(),
    }]
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the classifier or renderer cannot use.
    pub fn validate(&self) -> Result<()> {
        ThresholdScale::from_config(&self.classification)
            .context("Invalid [classification] section")?;
        for annotation in &self.annotations {
            annotation
                .color
                .parse::<crate::classify::Color>()
                .with_context(|| format!("Invalid color for annotation {:?}", annotation.title))?;
        }
        if self.render.inner_width() <= 0.0 || self.render.inner_height() <= 0.0 {
            anyhow::bail!("Render margins leave no drawing area");
        }
        self.interaction.validate().context("Invalid [interaction] section")?;
        Ok(())
    }
}

impl InteractionConfig {
    /// Every opacity must lie in `0.0..=1.0`; NaN is rejected.
    pub fn validate(&self) -> Result<()> {
        let opacities = [
            ("default_opacity", self.default_opacity),
            ("dimmed_opacity", self.dimmed_opacity),
            ("highlight_opacity", self.highlight_opacity),
            ("tooltip_opacity", self.tooltip_opacity),
        ];
        for (name, value) in opacities {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0 and 1, got {}", name, value);
            }
        }
        Ok(())
    }
}
