use crate::config::{AppConfig, InputConfig};
use crate::types::Region;
use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use geojson::GeoJson;
use shapefile::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

pub async fn load_data(config: &AppConfig) -> Result<Vec<Region>> {
    info!("Loading data...");

    // 1. Load CSV values
    let values = load_values(&config.input).await?;
    info!("Loaded values for {} regions", values.len());

    // 2. Load Geometry (Shapefile or GeoJSON)
    let extension = config.input.geometry.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    let regions = match extension.as_str() {
        "shp" => load_shapefile_and_join(&config.input, &values)?,
        "json" | "geojson" => load_geojson_and_join(&config.input, &values).await?,
        _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
    };

    let defaulted = regions.iter().filter(|r| !values.contains_key(&r.id)).count();
    debug!("{} regions have no value row and default to 0", defaulted);
    info!("Loaded and joined geometry for {} regions", regions.len());

    Ok(regions)
}

/// The URL when `source` is an `http://` or `https://` location.
pub fn remote_url(source: &Path) -> Option<&str> {
    source
        .to_str()
        .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
}

/// Downloads `url` once. A non-success status is an error.
pub async fn fetch(url: &str) -> Result<Vec<u8>> {
    info!("Fetching {}...", url);
    let response = reqwest::Client::new()
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Failed to fetch {}", url))?;
    let body = response.bytes().await
        .with_context(|| format!("Failed to read response body from {}", url))?;
    Ok(body.to_vec())
}

/// Value of region `id`, or 0 when the table has no row for it.
pub fn value_for(values: &HashMap<String, f64>, id: &str) -> f64 {
    values.get(id).copied().unwrap_or(0.0)
}

pub async fn load_values(input: &InputConfig) -> Result<HashMap<String, f64>> {
    if let Some(url) = remote_url(&input.values_csv) {
        let body = fetch(url).await?;
        return parse_values(body.as_slice(), &input.join_column_csv, &input.value_column);
    }
    let file = File::open(&input.values_csv)
        .with_context(|| format!("Failed to open CSV file: {:?}", input.values_csv))?;
    parse_values(file, &input.join_column_csv, &input.value_column)
}

/// Reads `join_column -> value_column` pairs. Rows with an empty id are
/// skipped; cells that do not parse as numbers are left out of the table
/// so the region falls back to the default.
pub fn parse_values<R: Read>(reader: R, join_column: &str, value_column: &str) -> Result<HashMap<String, f64>> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let join_col_idx = headers.iter().position(|h| h == join_column)
        .ok_or_else(|| anyhow!("Join column '{}' not found in CSV", join_column))?;
    let value_col_idx = headers.iter().position(|h| h == value_column)
        .ok_or_else(|| anyhow!("Value column '{}' not found in CSV", value_column))?;

    let mut values = HashMap::new();
    let mut unparsed = 0usize;

    for result in rdr.records() {
        let record = result?;
        let id = record.get(join_col_idx).unwrap_or("");
        if id.is_empty() { continue; }

        match record.get(value_col_idx).unwrap_or("").parse::<f64>() {
            Ok(v) if v.is_finite() => {
                values.insert(id.to_string(), v);
            }
            _ => unparsed += 1,
        }
    }

    if unparsed > 0 {
        warn!("{} rows had no numeric '{}' value and were skipped", unparsed, value_column);
    }

    Ok(values)
}

fn load_shapefile_and_join(input: &InputConfig, values: &HashMap<String, f64>) -> Result<Vec<Region>> {
    if remote_url(&input.geometry).is_some() {
        bail!("Shapefiles must be local, got {:?}", input.geometry);
    }
    let mut reader = Reader::from_path(&input.geometry)
        .with_context(|| format!("Failed to open Shapefile: {:?}", input.geometry))?;

    let mut regions = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        // Find the Join ID in the shapefile record (dbase)
        let id_value = record.get(&input.join_column_geometry)
            .ok_or_else(|| anyhow!("Join column '{}' not found in Shapefile", input.join_column_geometry))?;

        let id = match id_value {
            shapefile::dbase::FieldValue::Character(Some(s)) => s.trim().to_string(),
            shapefile::dbase::FieldValue::Character(None) => continue, // Skip if null
            shapefile::dbase::FieldValue::Numeric(Some(n)) => n.to_string(),
            _ => return Err(anyhow!("Shapefile join column must be a string or number")),
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            _ => continue, // Skip non-polygon shapes
        };

        let value = value_for(values, &id);
        regions.push(Region { id, geometry, value });
    }

    Ok(regions)
}

async fn load_geojson_and_join(input: &InputConfig, values: &HashMap<String, f64>) -> Result<Vec<Region>> {
    info!("Loading GeoJSON from {:?}...", input.geometry);

    // Parse the GeoJSON. warning: this loads the whole file into memory.
    let geojson = match remote_url(&input.geometry) {
        Some(url) => {
            let body = fetch(url).await?;
            GeoJson::from_reader(body.as_slice()).context("Failed to parse GeoJSON")?
        }
        None => {
            let file = File::open(&input.geometry)
                .with_context(|| format!("Failed to open GeoJSON file: {:?}", input.geometry))?;
            GeoJson::from_reader(BufReader::new(file)).context("Failed to parse GeoJSON")?
        }
    };
    regions_from_geojson(geojson, &input.join_column_geometry, values)
}

/// Joins every polygonal feature of a FeatureCollection with `values`.
/// The id comes from the `join_column` property, falling back to the
/// feature's own `id` member.
pub fn regions_from_geojson(
    geojson: GeoJson,
    join_column: &str,
    values: &HashMap<String, f64>,
) -> Result<Vec<Region>> {
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut regions = Vec::new();

    for feature in collection.features {
        // 1. Get ID
        let property = feature.properties.as_ref()
            .and_then(|props| props.get(join_column));

        let id = match (property, &feature.id) {
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(serde_json::Value::Number(n)), _) => n.to_string(),
            (_, Some(geojson::feature::Id::String(s))) => s.clone(),
            (_, Some(geojson::feature::Id::Number(n))) => n.to_string(),
            _ => continue, // Skip if no ID or not string/number
        };

        // 2. Get Geometry
        let geometry = match feature.geometry {
            Some(geo) => {
                let valid_geo: geo::Geometry<f64> = geo.value.try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry for {}: {:?}", id, e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            },
            None => continue,
        };

        // 3. Join, defaulting unmatched regions to 0
        let value = value_for(values, &id);
        regions.push(Region { id, geometry, value });
    }

    Ok(regions)
}
