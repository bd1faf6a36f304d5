//! Room Calendar - hotel occupancy calendar parser and availability server.

mod availability;
mod calendar;
mod cell_ref;
mod config;
mod date_parser;
mod error;
mod grid;
mod header;
mod lexicon;
mod merges;
mod models;
mod sheet_parser;
mod sheets;
mod sources;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use calendar::{CalendarSlot, CalendarState};
use config::AppConfig;
use error::CalendarError;
use grid::SheetGrid;
use models::*;
use sources::{ConnectionStatus, GridSource};
use std::sync::{Arc, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    calendar: Arc<RwLock<CalendarSlot>>,
    source: Option<Arc<dyn GridSource>>,
    config: Arc<AppConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "room_calendar=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let source: Option<Arc<dyn GridSource>> = config.grid_source().map(Arc::from);
    if let Some(ref source) = source {
        info!("Grid source: {}", source.name());
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        calendar: Arc::new(RwLock::new(CalendarSlot::new())),
        source,
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/connection/check", get(check_connection))
        .route("/calendar", axum::routing::delete(clear_calendar))
        .route("/calendar/load", post(load_calendar))
        .route("/calendar/upload", post(upload_calendar))
        .route("/calendar/info", get(calendar_info))
        .route("/rooms/available", post(available_rooms))
        .route("/rooms/check", post(check_room))
        .route("/categories/available", post(available_categories))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        source: state.source.as_ref().map(|s| s.name().to_string()),
        calendar_loaded: state.calendar.read().unwrap().is_loaded(),
    })
}

/// Probe the configured grid source, optionally for one spreadsheet.
async fn check_connection(
    State(state): State<AppState>,
    Query(query): Query<ConnectionCheckQuery>,
) -> Result<Json<ConnectionStatus>, (StatusCode, String)> {
    let source = require_source(&state)?;
    Ok(Json(source.check(query.spreadsheet_id.as_deref()).await))
}

/// Fetch a sheet from the grid source and install it as the current calendar.
async fn load_calendar(
    State(state): State<AppState>,
    Json(request): Json<LoadCalendarRequest>,
) -> Result<Json<LoadCalendarResponse>, (StatusCode, String)> {
    let source = require_source(&state)?;
    let config = &state.config;

    let spreadsheet_id = request
        .spreadsheet_id
        .or_else(|| config.spreadsheet_id.clone())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "spreadsheet_id is required (in the request or SPREADSHEET_ID)".to_string(),
            )
        })?;
    let sheet_name = request.sheet_name.or_else(|| config.sheet_name.clone());
    let anchor = request.date_start_cell.or_else(|| config.date_start_cell.clone());
    let start_date = request.date_start.or_else(|| config.date_start.clone());

    info!(
        "Loading calendar from {} '{}' (sheet: {:?}, start cell: {:?})",
        source.name(),
        spreadsheet_id,
        sheet_name,
        anchor
    );

    let sheet = source
        .fetch(&spreadsheet_id, sheet_name.as_deref())
        .await
        .map_err(|e| {
            error!("Fetch failed: {:#}", e);
            (StatusCode::BAD_GATEWAY, format!("Failed to fetch sheet: {:#}", e))
        })?;

    Ok(Json(install_calendar(
        &state,
        sheet,
        anchor.as_deref(),
        start_date.as_deref(),
    )))
}

/// Upload a workbook (.xlsx/.xlsm/.csv) and install it as the current calendar.
async fn upload_calendar(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<LoadCalendarResponse>, (StatusCode, String)> {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("calendar.xlsx").to_string();
            file_data = field.bytes().await.map_err(|e| {
                (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
            })?.to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    }

    info!("Received workbook: {} ({} bytes)", filename, file_data.len());

    let sheet_name = query.sheet_name.or_else(|| state.config.sheet_name.clone());
    let sheet = sheet_parser::parse_file(&filename, &file_data, sheet_name.as_deref())
        .map_err(|e| {
            warn!("Workbook parsing failed: {:#}", e);
            (StatusCode::UNPROCESSABLE_ENTITY, format!("Failed to parse workbook: {:#}", e))
        })?;

    let anchor = query.date_start_cell.or_else(|| state.config.date_start_cell.clone());
    let start_date = query.date_start.or_else(|| state.config.date_start.clone());
    Ok(Json(install_calendar(
        &state,
        sheet,
        anchor.as_deref(),
        start_date.as_deref(),
    )))
}

async fn calendar_info(
    State(state): State<AppState>,
) -> Result<Json<CalendarInfo>, (StatusCode, String)> {
    let slot = state.calendar.read().unwrap();
    slot.summary()
        .map(|summary| Json(CalendarInfo::from(summary)))
        .ok_or_else(|| calendar_error(CalendarError::NotLoaded))
}

async fn clear_calendar(State(state): State<AppState>) -> StatusCode {
    state.calendar.write().unwrap().clear();
    info!("Calendar cleared");
    StatusCode::NO_CONTENT
}

async fn available_rooms(
    State(state): State<AppState>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<AvailabilityResponse>, (StatusCode, String)> {
    let slot = state.calendar.read().unwrap();
    let calendar = slot.get().map_err(calendar_error)?;

    let rooms = calendar
        .list_available_rooms(request.check_in, request.check_out, &request.category_filter)
        .map_err(calendar_error)?;

    let category_filter = Some(request.category_filter)
        .filter(|f| !f.trim().is_empty() && !f.trim().eq_ignore_ascii_case("all"));

    Ok(Json(AvailabilityResponse {
        count: rooms.len(),
        available_rooms: rooms,
        check_in: request.check_in,
        check_out: request.check_out,
        category_filter,
    }))
}

async fn check_room(
    State(state): State<AppState>,
    Json(request): Json<RoomCheckRequest>,
) -> Result<Json<RoomCheckResponse>, (StatusCode, String)> {
    let slot = state.calendar.read().unwrap();
    let calendar = slot.get().map_err(calendar_error)?;

    let available = calendar.check_room(&request.room_number, request.check_date);
    Ok(Json(RoomCheckResponse {
        room_number: request.room_number,
        check_date: request.check_date,
        available,
    }))
}

async fn available_categories(
    State(state): State<AppState>,
    Json(request): Json<CategoriesRequest>,
) -> Result<Json<CategoriesResponse>, (StatusCode, String)> {
    let slot = state.calendar.read().unwrap();
    let calendar = slot.get().map_err(calendar_error)?;

    let categories = calendar
        .available_categories(request.check_in, request.check_out)
        .map_err(calendar_error)?;

    Ok(Json(CategoriesResponse {
        categories,
        check_in: request.check_in,
        check_out: request.check_out,
    }))
}

// ============================================================================
// Helper functions
// ============================================================================

fn require_source(state: &AppState) -> Result<Arc<dyn GridSource>, (StatusCode, String)> {
    state.source.clone().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "No grid source configured. Set GOOGLE_CREDENTIALS_PATH or WORKBOOK_DIR.".to_string(),
        )
    })
}

/// Resolve a fetched sheet and swap it in. The previous calendar survives a
/// failed load.
fn install_calendar(
    state: &AppState,
    sheet: SheetGrid,
    anchor: Option<&str>,
    start_date: Option<&str>,
) -> LoadCalendarResponse {
    match CalendarState::load(sheet.grid, &sheet.merges, anchor, start_date) {
        Ok(calendar) => {
            let info = CalendarInfo::from(calendar.summary());
            state.calendar.write().unwrap().replace(calendar);
            LoadCalendarResponse {
                success: true,
                message: format!(
                    "Calendar loaded from sheet '{}': {} dates",
                    sheet.title, info.total_dates
                ),
                calendar_info: Some(info),
            }
        }
        Err(e) => {
            warn!("Calendar load failed for sheet '{}': {}", sheet.title, e);
            LoadCalendarResponse {
                success: false,
                message: format!("Error loading calendar: {}", e),
                calendar_info: None,
            }
        }
    }
}

fn calendar_error(e: CalendarError) -> (StatusCode, String) {
    let status = match e {
        CalendarError::NotLoaded => StatusCode::NOT_FOUND,
        CalendarError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
