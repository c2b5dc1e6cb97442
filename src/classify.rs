//! Threshold classification of region values into display buckets.
//!
//! A scale with `k` ascending thresholds defines `k + 1` buckets. Each
//! threshold is the inclusive lower bound of the bucket it starts, so a
//! value sitting exactly on a boundary belongs to the upper bucket.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::config::ClassificationConfig;

/// Bucket index for `value` under ascending `thresholds`.
///
/// Bucket 0 holds everything below the first threshold, bucket `k` holds
/// everything at or above the last one. NaN compares false against every
/// threshold and therefore lands in bucket 0.
pub fn classify(value: f64, thresholds: &[f64]) -> usize {
    thresholds.partition_point(|t| *t <= value)
}

/// Color of a bucket. Panics when `bucket` is out of range: the bucket
/// count is fixed at configuration time and `classify` never exceeds it.
pub fn color_for_bucket(bucket: usize, colors: &[Color]) -> Color {
    match colors.get(bucket) {
        Some(color) => *color,
        None => panic!(
            "bucket index {} out of range for {} colors",
            bucket,
            colors.len()
        ),
    }
}

/// An opaque sRGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            bail!("Expected a #rrggbb color, got {:?}", s);
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| anyhow!("Invalid hex color {:?}", s))
        };
        Ok(Color {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Immutable threshold scale: thresholds plus one color and label per bucket.
#[derive(Debug, Clone)]
pub struct ThresholdScale {
    title: String,
    thresholds: Vec<f64>,
    colors: Vec<Color>,
    labels: Vec<String>,
}

/// One legend row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub bucket: usize,
    pub label: String,
    pub color: Color,
    /// Inclusive lower bound, `None` for the lowest bucket.
    pub lower: Option<f64>,
    /// Exclusive upper bound, `None` for the highest bucket.
    pub upper: Option<f64>,
}

impl ThresholdScale {
    pub fn new(
        title: impl Into<String>,
        thresholds: Vec<f64>,
        colors: Vec<Color>,
        labels: Vec<String>,
    ) -> Result<Self> {
        if let Some(bad) = thresholds.iter().find(|t| !t.is_finite()) {
            bail!("Threshold {} is not a finite number", bad);
        }
        if let Some(pair) = thresholds.windows(2).find(|w| w[0] >= w[1]) {
            bail!(
                "Thresholds must be strictly ascending ({} is followed by {})",
                pair[0],
                pair[1]
            );
        }
        let buckets = thresholds.len() + 1;
        if colors.len() != buckets {
            bail!(
                "{} thresholds need {} colors, got {}",
                thresholds.len(),
                buckets,
                colors.len()
            );
        }
        if labels.len() != buckets {
            bail!(
                "{} thresholds need {} labels, got {}",
                thresholds.len(),
                buckets,
                labels.len()
            );
        }

        Ok(ThresholdScale {
            title: title.into(),
            thresholds,
            colors,
            labels,
        })
    }

    pub fn from_config(config: &ClassificationConfig) -> Result<Self> {
        let colors = config
            .colors
            .iter()
            .map(|c| c.parse::<Color>())
            .collect::<Result<Vec<_>>>()?;
        Self::new(
            config.title.clone(),
            config.thresholds.clone(),
            colors,
            config.labels.clone(),
        )
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn bucket_count(&self) -> usize {
        self.colors.len()
    }

    pub fn classify(&self, value: f64) -> usize {
        classify(value, &self.thresholds)
    }

    pub fn color(&self, bucket: usize) -> Color {
        color_for_bucket(bucket, &self.colors)
    }

    pub fn label(&self, bucket: usize) -> &str {
        &self.labels[bucket]
    }

    /// Color for a value, i.e. `color(classify(value))`.
    pub fn color_of(&self, value: f64) -> Color {
        self.color(self.classify(value))
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        (0..self.bucket_count())
            .map(|bucket| LegendEntry {
                bucket,
                label: self.labels[bucket].clone(),
                color: self.colors[bucket],
                lower: bucket.checked_sub(1).map(|i| self.thresholds[i]),
                upper: self.thresholds.get(bucket).copied(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: [f64; 2] = [100_000_000.0, 500_000_000.0];

    fn population_scale() -> ThresholdScale {
        ThresholdScale::from_config(&ClassificationConfig::default()).unwrap()
    }

    #[test]
    fn classifies_population_examples() {
        assert_eq!(classify(50_000_000.0, &THRESHOLDS), 0);
        assert_eq!(classify(100_000_000.0, &THRESHOLDS), 1);
        assert_eq!(classify(300_000_000.0, &THRESHOLDS), 1);
        assert_eq!(classify(500_000_000.0, &THRESHOLDS), 2);
        assert_eq!(classify(1_400_000_000.0, &THRESHOLDS), 2);
    }

    #[test]
    fn boundary_belongs_to_upper_bucket() {
        let thresholds = [-5.0, 0.0, 2.5, 10.0];
        for (i, t) in thresholds.iter().enumerate() {
            assert_eq!(classify(*t, &thresholds), i + 1);
        }
    }

    #[test]
    fn classification_is_monotonic_and_in_range() {
        let thresholds = [-5.0, 0.0, 2.5, 10.0];
        let mut previous = 0;
        let mut v = -20.0;
        while v <= 20.0 {
            let bucket = classify(v, &thresholds);
            assert!(bucket <= thresholds.len());
            assert!(bucket >= previous, "bucket dropped at {}", v);
            assert_eq!(bucket, classify(v, &thresholds));
            previous = bucket;
            v += 0.25;
        }
    }

    #[test]
    fn zero_negative_and_nan_fall_in_lowest_bucket() {
        assert_eq!(classify(0.0, &THRESHOLDS), 0);
        assert_eq!(classify(-1.0, &THRESHOLDS), 0);
        assert_eq!(classify(f64::NAN, &THRESHOLDS), 0);
        assert_eq!(classify(f64::INFINITY, &THRESHOLDS), 2);
    }

    #[test]
    fn empty_thresholds_give_a_single_bucket() {
        assert_eq!(classify(42.0, &[]), 0);
        let black = Color { r: 0, g: 0, b: 0 };
        let scale = ThresholdScale::new("All", vec![], vec![black], vec!["all".into()]).unwrap();
        assert_eq!(scale.legend().len(), 1);
    }

    #[test]
    fn default_scale_maps_values_to_colors() {
        let scale = population_scale();
        assert_eq!(scale.color_of(0.0).to_string(), "#f8caee");
        assert_eq!(scale.color_of(300_000_000.0).to_string(), "#bf76af");
        assert_eq!(scale.color_of(1_400_000_000.0).to_string(), "#852170");
        assert_eq!(scale.label(1), "100 M - 500 M");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn color_lookup_out_of_range_panics() {
        let scale = population_scale();
        scale.color(3);
    }

    #[test]
    fn legend_carries_bounds() {
        let legend = population_scale().legend();
        assert_eq!(legend.len(), 3);
        assert_eq!(legend[0].lower, None);
        assert_eq!(legend[0].upper, Some(100_000_000.0));
        assert_eq!(legend[2].lower, Some(500_000_000.0));
        assert_eq!(legend[2].upper, None);
        assert_eq!(legend[2].label, "> 500 M");
    }

    #[test]
    fn rejects_invalid_scales() {
        let c = |s: &str| s.parse::<Color>().unwrap();
        let labels = || vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let colors = || vec![c("#000000"), c("#111111"), c("#222222")];

        assert!(ThresholdScale::new("t", vec![5.0, 1.0], colors(), labels()).is_err());
        assert!(ThresholdScale::new("t", vec![1.0, 1.0], colors(), labels()).is_err());
        assert!(ThresholdScale::new("t", vec![1.0, f64::NAN], colors(), labels()).is_err());
        assert!(ThresholdScale::new("t", vec![1.0], colors(), labels()).is_err());
        assert!(ThresholdScale::new("t", vec![1.0, 2.0], colors(), vec!["a".into()]).is_err());
        assert!(ThresholdScale::new("t", vec![1.0, 2.0], colors(), labels()).is_ok());
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!("#852170".parse::<Color>().unwrap(), Color { r: 0x85, g: 0x21, b: 0x70 });
        assert_eq!("F8CAEE".parse::<Color>().unwrap().to_string(), "#f8caee");
        assert!("#12345".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
    }
}
