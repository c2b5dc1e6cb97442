use crate::classify::{Color, ThresholdScale};
use crate::config::{AnnotationConfig, AppConfig};
use crate::types::Region;
use anyhow::{Context, Result};
use geo::{LineString, Polygon};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use svg::node::element::path::Data;
use svg::node::element::{Group, Line, Path as SvgPath, Rectangle as Rect, Text};
use svg::Document;
use tracing::info;

// Web Mercator is undefined at the poles
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

const SWATCH_SIZE: f64 = 15.0;
const SWATCH_SPACING: f64 = 2.0;
const LEGEND_TITLE_HEIGHT: f64 = 18.0;

/// Spherical Mercator projection onto SVG user units.
#[derive(Debug, Clone, Copy)]
pub struct Mercator {
    scale: f64,
    translate: [f64; 2],
    center: (f64, f64),
}

impl Mercator {
    /// `center` is `[lon, lat]` in degrees and ends up at `translate`.
    pub fn new(scale: f64, center: [f64; 2], translate: [f64; 2]) -> Self {
        Mercator {
            scale,
            translate,
            center: Self::raw(center[0], center[1]),
        }
    }

    /// Projection used for the map: the configured scale and center, placed
    /// in the middle of the drawing area shifted left by the left margin.
    pub fn for_render(config: &AppConfig) -> Self {
        let render = &config.render;
        Self::new(
            render.scale,
            render.center,
            [render.inner_width() / 2.0 - render.margin.left, render.inner_height() / 2.0],
        )
    }

    fn raw(lon: f64, lat: f64) -> (f64, f64) {
        let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        (lon.to_radians(), (PI / 4.0 + lat_rad / 2.0).tan().ln())
    }

    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = Self::raw(lon, lat);
        (
            self.translate[0] + self.scale * (x - self.center.0),
            self.translate[1] - self.scale * (y - self.center.1),
        )
    }
}

/// Renders the choropleth, writes it to `render.output` and returns the path.
pub fn render_map(config: &AppConfig, scale: &ThresholdScale, regions: &[Region]) -> Result<PathBuf> {
    info!("Rendering {} regions into {} buckets...", regions.len(), scale.bucket_count());
    let document = render_svg(config, scale, regions)?;
    write_svg(&config.render.output, &document)?;
    info!("Wrote {:?}", config.render.output);
    Ok(config.render.output.clone())
}

pub fn write_svg(path: &Path, document: &Document) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    svg::save(path, document).with_context(|| format!("Failed to write SVG {:?}", path))
}

pub fn render_svg(config: &AppConfig, scale: &ThresholdScale, regions: &[Region]) -> Result<Document> {
    let render = &config.render;
    let projection = Mercator::for_render(config);
    let opacity = format!("opacity:{}", config.interaction.default_opacity);

    // Outlines are independent, project them in parallel and keep input order
    let outlines: Vec<Data> = regions
        .par_iter()
        .map(|region| region_outline(region, &projection))
        .collect();

    let mut shapes = Group::new().set("class", "regions");
    for (region, outline) in regions.iter().zip(outlines) {
        shapes = shapes.add(
            SvgPath::new()
                .set("class", "topo")
                .set("data-id", region.id.as_str())
                .set("d", outline)
                .set("fill", scale.color_of(region.value).to_string())
                .set("fill-rule", "evenodd")
                .set("stroke", "transparent")
                .set("style", opacity.as_str()),
        );
    }

    let legend = legend(scale, render.inner_width() - render.margin.left, render.inner_height() - 30.0);
    let annotations = annotations(&config.annotations, &projection)?;

    let chart = Group::new()
        .set("transform", format!("translate({},{})", render.margin.left, render.margin.top))
        .add(shapes)
        .add(legend)
        .add(annotations);

    Ok(Document::new()
        .set("width", render.width)
        .set("height", render.height)
        .set("viewBox", format!("0 0 {} {}", render.width, render.height))
        .add(chart))
}

fn region_outline(region: &Region, projection: &Mercator) -> Data {
    region
        .geometry
        .iter()
        .fold(Data::new(), |data, polygon| push_polygon(data, polygon, projection))
}

fn push_polygon(data: Data, polygon: &Polygon<f64>, projection: &Mercator) -> Data {
    polygon
        .interiors()
        .iter()
        .fold(push_ring(data, polygon.exterior(), projection), |data, ring| {
            push_ring(data, ring, projection)
        })
}

fn push_ring(mut data: Data, ring: &LineString<f64>, projection: &Mercator) -> Data {
    let mut points = ring.coords().map(|c| {
        let (x, y) = projection.project(c.x, c.y);
        (x as f32, y as f32)
    });
    let Some(first) = points.next() else {
        return data;
    };
    data = data.move_to(first);
    for point in points {
        data = data.line_to(point);
    }
    data.close()
}

fn legend(scale: &ThresholdScale, x: f64, y: f64) -> Group {
    let mut group = Group::new()
        .set("class", "legendQuant")
        .set("transform", format!("translate({},{})", x, y))
        .add(Text::new(scale.title()).set("class", "legendTitle"));

    for entry in scale.legend() {
        let cell_y = LEGEND_TITLE_HEIGHT + entry.bucket as f64 * (SWATCH_SIZE + SWATCH_SPACING);
        let cell = Group::new()
            .set("class", "cell")
            .set("transform", format!("translate(0,{})", cell_y))
            .add(
                Rect::new()
                    .set("class", "swatch")
                    .set("width", SWATCH_SIZE)
                    .set("height", SWATCH_SIZE)
                    .set("fill", entry.color.to_string()),
            )
            .add(
                Text::new(entry.label.as_str())
                    .set("class", "label")
                    .set("x", SWATCH_SIZE + 5.0)
                    .set("y", SWATCH_SIZE - 3.0),
            );
        group = group.add(cell);
    }
    group
}

fn annotations(annotations: &[AnnotationConfig], projection: &Mercator) -> Result<Group> {
    let mut group = Group::new().set("id", "annotation").set("style", "opacity:1");
    for annotation in annotations {
        let color: Color = annotation.color.parse()?;
        let (x, y) = projection.project(annotation.lon, annotation.lat);
        let (nx, ny) = (x + annotation.dx, y + annotation.dy);

        let callout = Group::new()
            .set("class", "annotation callout")
            .add(
                Line::new()
                    .set("x1", x)
                    .set("y1", y)
                    .set("x2", nx)
                    .set("y2", ny)
                    .set("stroke", color.to_string()),
            )
            .add(
                Text::new(annotation.title.as_str())
                    .set("class", "annotation-note-title")
                    .set("x", nx)
                    .set("y", ny)
                    .set("font-weight", "bold")
                    .set("fill", color.to_string()),
            )
            .add(
                Text::new(annotation.label.as_str())
                    .set("class", "annotation-note-label")
                    .set("x", nx)
                    .set("y", ny)
                    .set("dy", "1.2em")
                    .set("fill", color.to_string()),
            );
        group = group.add(callout);
    }
    Ok(group)
}
