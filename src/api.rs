use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{SHIFTS, SUBSET_MARGIN_DEG, SUMMARY_BUCKET_MINUTES};
use crate::directions::TravelMode;
use crate::error::{RadarError, RouteError};
use crate::extract::{extract, point_series, summarize, BucketSummary, SplitTable};
use crate::geo::{distance_km, subset_field, zoom_center};
use crate::types::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct RideQuery {
    from: String,
    to: String,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PointQuery {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    lat: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MetaResponse {
    ready: bool,
    #[serde(rename = "fetchedAt")]
    fetched_at: Option<String>,
    steps: usize,
    #[serde(rename = "cadenceSeconds")]
    cadence_seconds: Option<i64>,
    #[serde(rename = "refreshSeconds")]
    refresh_seconds: u64,
    #[serde(rename = "cacheDir")]
    cache_dir: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MapViewport {
    zoom: f64,
    #[serde(rename = "centerLat")]
    center_lat: f64,
    #[serde(rename = "centerLon")]
    center_lon: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct RideResponse {
    source: String,
    destination: String,
    #[serde(rename = "distanceKm")]
    distance_km: f64,
    #[serde(rename = "durationMin")]
    duration_min: f64,
    table: SplitTable,
    #[serde(rename = "horizonExceeded")]
    horizon_exceeded: bool,
    #[serde(rename = "noRain")]
    no_rain: bool,
    map: MapViewport,
}

#[derive(Debug, Serialize)]
pub(crate) struct PointResponse {
    name: Option<String>,
    lon: f64,
    lat: f64,
    #[serde(rename = "cellDistanceKm")]
    cell_distance_km: f64,
    times: Vec<String>,
    #[serde(rename = "ratesMmPerHour")]
    rates_mm_h: Vec<f64>,
    summary: Vec<BucketSummary>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn meta(State(state): State<AppState>) -> Json<MetaResponse> {
    let (ready, fetched_at, steps, cadence_seconds) = match state.radar.peek().await {
        Some((field, fetched_at)) => (
            true,
            Some(fetched_at.to_rfc3339()),
            field.steps(),
            Some(field.cadence_secs()),
        ),
        None => (false, None, 0, None),
    };

    Json(MetaResponse {
        ready,
        fetched_at,
        steps,
        cadence_seconds,
        refresh_seconds: state.cfg.refresh_window.as_secs(),
        cache_dir: state.cfg.cache_dir.display().to_string(),
    })
}

pub async fn ride(State(state): State<AppState>, Query(query): Query<RideQuery>) -> Response {
    let from = query.from.trim();
    let to = query.to.trim();
    if from.is_empty() || to.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Both 'from' and 'to' must be non-empty.",
        );
    }
    let mode = TravelMode::parse(query.mode.as_deref());

    let route = match state.directions.directions(from, to, mode).await {
        Ok(route) => route,
        Err(error) => return route_error_response(error),
    };

    let field = match state.radar.current().await {
        Ok(field) => field,
        Err(error) => return radar_error_response(error),
    };

    let track = route.track.clone();
    let table = match tokio::task::spawn_blocking(move || {
        let view = subset_field(&field, &track.lons, &track.lats, SUBSET_MARGIN_DEG);
        extract(&track, &view, &SHIFTS)
    })
    .await
    {
        Ok(table) => table,
        Err(error) => {
            warn!("Extraction task failed: {error}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to compute the forecast table.",
            );
        }
    };

    let (zoom, (center_lat, center_lon)) =
        zoom_center(&route.track.lons, &route.track.lats, 200.0, 360.0);

    Json(RideResponse {
        source: route.source,
        destination: route.destination,
        distance_km: route.distance_km,
        duration_min: route.duration_min,
        horizon_exceeded: table.has_horizon_gap(),
        no_rain: table.no_rain(),
        table: table.to_split(),
        map: MapViewport {
            zoom,
            center_lat,
            center_lon,
        },
    })
    .into_response()
}

pub async fn point(State(state): State<AppState>, Query(query): Query<PointQuery>) -> Response {
    let (name, lon, lat) = match (&query.address, query.lon, query.lat) {
        (Some(address), _, _) if !address.trim().is_empty() => {
            match state.directions.geocode(address.trim()).await {
                Ok(place) => (Some(place.name), place.lon, place.lat),
                Err(error) => return route_error_response(error),
            }
        }
        (_, Some(lon), Some(lat)) => {
            if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid lon/lat query parameters.",
                );
            }
            (None, lon, lat)
        }
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Provide either 'address' or both 'lon' and 'lat'.",
            );
        }
    };

    let field = match state.radar.current().await {
        Ok(field) => field,
        Err(error) => return radar_error_response(error),
    };

    let series = tokio::task::spawn_blocking(move || {
        let view = subset_field(&field, &[lon], &[lat], SUBSET_MARGIN_DEG);
        point_series(&view, lon, lat)
    })
    .await;

    let series = match series {
        Ok(Some(series)) => series,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Location is outside radar coverage.");
        }
        Err(error) => {
            warn!("Point lookup task failed: {error}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to compute the point forecast.",
            );
        }
    };

    let summary = summarize(&series, &SUMMARY_BUCKET_MINUTES);

    Json(PointResponse {
        name,
        lon,
        lat,
        cell_distance_km: distance_km(lon, lat, series.cell_lon, series.cell_lat),
        times: series.times.iter().map(|time| time.to_rfc3339()).collect(),
        rates_mm_h: series.rates_mm_h,
        summary,
    })
    .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn route_error_response(error: RouteError) -> Response {
    warn!("Routing failed: {error}");
    error_response(StatusCode::BAD_GATEWAY, &error.to_string())
}

fn radar_error_response(error: RadarError) -> Response {
    warn!("Radar refresh failed: {error}");
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "No radar composite is available right now.",
    )
}
