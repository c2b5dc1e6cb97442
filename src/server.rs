use crate::classify::{Color, LegendEntry, ThresholdScale};
use crate::config::AppConfig;
use crate::interaction::{InteractionController, InteractionState, Pointer};
use crate::overlay::{AnnotationLayer, Tooltip};
use crate::types::Region;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use geo::{BoundingRect, Contains, Point};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

type Controller = InteractionController<Tooltip, AnnotationLayer>;
type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<ApiError>)>;

// Wrapper for RTree indexing
pub struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    pub regions: Vec<Region>,
    pub tree: RTree<AreaIndex>,
    pub scale: ThresholdScale,
    // Hover events are applied one at a time
    controller: Mutex<Controller>,
}

impl AppState {
    pub fn new(config: &AppConfig, regions: Vec<Region>) -> Result<Self> {
        let scale = ThresholdScale::from_config(&config.classification)?;

        info!("Building spatial index for {} regions...", regions.len());
        let tree_items: Vec<AreaIndex> = regions.iter().enumerate().filter_map(|(i, region)| {
            // Empty geometries have no extent and can never be hit
            let rect = region.geometry.bounding_rect()?;
            Some(AreaIndex {
                index: i,
                aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            })
        }).collect();
        let tree = RTree::bulk_load(tree_items);

        let tooltip = Tooltip::new(config.interaction.tooltip_opacity);
        let controller = InteractionController::new(
            &regions,
            config.interaction.clone(),
            tooltip,
            AnnotationLayer::default(),
        );

        Ok(AppState {
            regions,
            tree,
            scale,
            controller: Mutex::new(controller),
        })
    }

    /// Index of the region containing `(lon, lat)`. Overlapping candidates
    /// resolve to the lowest index.
    pub fn hit_test(&self, lon: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.index)
            .filter(|&i| self.regions[i].geometry.contains(&point))
            .min()
    }

    fn region_info(&self, index: usize) -> RegionInfo {
        let region = &self.regions[index];
        let bucket = self.scale.classify(region.value);
        RegionInfo {
            id: region.id.clone(),
            value: region.value,
            bucket,
            color: self.scale.color(bucket),
            label: self.scale.label(bucket).to_string(),
        }
    }

    fn controller(&self) -> std::result::Result<MutexGuard<'_, Controller>, (StatusCode, Json<ApiError>)> {
        self.controller.lock().map_err(|_| {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Interaction state is unavailable")
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: message.into() }))
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
pub struct HoverRequest {
    lon: f64,
    lat: f64,
    #[serde(default)]
    page_x: f64,
    #[serde(default)]
    page_y: f64,
}

#[derive(Deserialize, Default)]
pub struct PointerRequest {
    #[serde(default)]
    page_x: f64,
    #[serde(default)]
    page_y: f64,
}

#[derive(Debug, Serialize)]
pub struct RegionInfo {
    id: String,
    value: f64,
    bucket: usize,
    color: Color,
    label: String,
}

#[derive(Debug, Serialize)]
pub struct LegendResponse {
    title: String,
    entries: Vec<LegendEntry>,
}

#[derive(Debug, Serialize)]
pub struct StyleEntry {
    id: String,
    opacity: f64,
    bordered: bool,
}

#[derive(Debug, Serialize)]
pub struct Snapshot {
    #[serde(flatten)]
    state: InteractionState,
    hovered: Option<String>,
    tooltip: Tooltip,
    annotation: AnnotationLayer,
    stroke_color: String,
    styles: Vec<StyleEntry>,
}

fn snapshot(controller: &Controller) -> Snapshot {
    let styles = controller
        .styles()
        .iter()
        .enumerate()
        .map(|(i, style)| StyleEntry {
            id: controller.region_id(i).unwrap_or_default().to_string(),
            opacity: style.opacity,
            bordered: style.bordered,
        })
        .collect();

    Snapshot {
        state: controller.state(),
        hovered: controller.hovered_id().map(str::to_string),
        tooltip: controller.tooltip().clone(),
        annotation: *controller.annotation(),
        stroke_color: controller.config().stroke_color.clone(),
        styles,
    }
}

pub fn create_router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/api/legend", get(legend_handler))
        .route("/api/query", get(query_handler))
        .route("/api/regions/:id", get(region_handler))
        .route("/api/state", get(state_handler))
        .route("/api/hover", post(hover_handler))
        .route("/api/hover/:id", post(hover_id_handler))
        .route("/api/leave", post(leave_handler))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(config: AppConfig, regions: Vec<Region>) -> Result<()> {
    let state = Arc::new(AppState::new(&config, regions)?);
    info!("Spatial index built.");

    let static_dir = config.server.static_dir.clone().unwrap_or_else(|| {
        config.render.output.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Starting server on http://{} serving {:?}", addr, static_dir);

    let app = create_router(state, Some(static_dir));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

async fn legend_handler(State(state): State<Arc<AppState>>) -> Json<LegendResponse> {
    Json(LegendResponse {
        title: state.scale.title().to_string(),
        entries: state.scale.legend(),
    })
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<RegionInfo>> {
    Json(state.hit_test(params.lon, params.lat).map(|i| state.region_info(i)))
}

async fn region_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<RegionInfo> {
    state
        .regions
        .iter()
        .position(|r| r.id == id)
        .map(|i| Json(state.region_info(i)))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown region '{}'", id)))
}

async fn state_handler(State(state): State<Arc<AppState>>) -> ApiResult<Snapshot> {
    let controller = state.controller()?;
    Ok(Json(snapshot(&controller)))
}

/// Pointer moved to a geographic position: hovering whatever region is
/// under it, or leaving when it is over no region.
async fn hover_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HoverRequest>,
) -> ApiResult<Snapshot> {
    let hit = state.hit_test(request.lon, request.lat);
    let mut controller = state.controller()?;
    match hit {
        Some(index) => {
            let pointer = Pointer { page_x: request.page_x, page_y: request.page_y };
            controller.on_hover(index, pointer)
                .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        }
        None => controller.on_hover_end(),
    }
    Ok(Json(snapshot(&controller)))
}

async fn hover_id_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PointerRequest>,
) -> ApiResult<Snapshot> {
    let mut controller = state.controller()?;
    let pointer = Pointer { page_x: request.page_x, page_y: request.page_y };
    controller.on_hover_id(&id, pointer)
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e.to_string()))?;
    Ok(Json(snapshot(&controller)))
}

async fn leave_handler(State(state): State<Arc<AppState>>) -> ApiResult<Snapshot> {
    let mut controller = state.controller()?;
    controller.on_hover_end();
    Ok(Json(snapshot(&controller)))
}
