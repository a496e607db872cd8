//! Geocoder and directions collaborators (Mapbox-shaped APIs). The core only
//! consumes the resulting track; failures here propagate unchanged since
//! there is nothing to forecast without a route.

use reqwest::Client;
use serde::Deserialize;

use crate::error::RouteError;
use crate::types::{Route, Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    Cycling,
    Walking,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Cycling => "cycling",
            TravelMode::Walking => "walking",
        }
    }

    /// Lenient parse; anything unrecognized falls back to cycling.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("walking") => TravelMode::Walking,
            _ => TravelMode::Cycling,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeocodedPlace {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
}

pub struct DirectionsClient {
    http: Client,
    geocoding_url: String,
    directions_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    features: Vec<GeocodeFeature>,
}

#[derive(Debug, Deserialize)]
struct GeocodeFeature {
    place_name: String,
    center: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    routes: Vec<RouteBody>,
}

#[derive(Debug, Deserialize)]
struct RouteBody {
    geometry: Geometry,
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    annotation: Annotation,
    duration: f64,
    distance: f64,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    duration: Vec<f64>,
}

impl DirectionsClient {
    pub fn new(http: Client, geocoding_url: String, directions_url: String, token: String) -> Self {
        Self {
            http,
            geocoding_url,
            directions_url,
            token,
        }
    }

    /// Resolves a free-text place to its best-matching coordinate.
    pub async fn geocode(&self, place: &str) -> Result<GeocodedPlace, RouteError> {
        let url = format!("{}/{}.json", self.geocoding_url, urlencoding::encode(place));
        let response = self
            .http
            .get(&url)
            .query(&[
                ("country", "de"),
                ("limit", "1"),
                ("access_token", self.token.as_str()),
            ])
            .send()
            .await
            .map_err(|error| geocode_error(place, error.to_string()))?;

        if !response.status().is_success() {
            return Err(geocode_error(place, format!("status {}", response.status())));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|error| geocode_error(place, error.to_string()))?;
        let feature = body
            .features
            .into_iter()
            .next()
            .ok_or_else(|| geocode_error(place, "no matching feature".into()))?;

        Ok(GeocodedPlace {
            name: feature.place_name,
            lon: feature.center[0],
            lat: feature.center[1],
        })
    }

    /// Geocodes both endpoints and fetches the route between them.
    pub async fn directions(
        &self,
        start: &str,
        end: &str,
        mode: TravelMode,
    ) -> Result<Route, RouteError> {
        let from = self.geocode(start).await?;
        let to = self.geocode(end).await?;

        let url = format!(
            "{}/{}/{:.5},{:.5};{:.5},{:.5}",
            self.directions_url,
            mode.as_str(),
            from.lon,
            from.lat,
            to.lon,
            to.lat
        );
        let response = self
            .http
            .get(&url)
            .query(&[
                ("geometries", "geojson"),
                ("annotations", "duration,distance"),
                ("overview", "full"),
                ("access_token", self.token.as_str()),
            ])
            .send()
            .await
            .map_err(|error| RouteError::Directions(error.to_string()))?;

        if !response.status().is_success() {
            return Err(RouteError::Directions(format!(
                "status {}",
                response.status()
            )));
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|error| RouteError::Directions(error.to_string()))?;

        route_from_response(body, from.name, to.name)
    }
}

fn geocode_error(place: &str, reason: String) -> RouteError {
    RouteError::Geocode {
        place: place.to_string(),
        reason,
    }
}

/// Turns a raw directions payload into a [`Route`]: per-leg durations cover
/// the gaps between consecutive polyline points, so the cumulative elapsed
/// axis starts at 0 and has one entry per point.
fn route_from_response(
    body: DirectionsResponse,
    source: String,
    destination: String,
) -> Result<Route, RouteError> {
    let route = body
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RouteError::Directions("no route between the endpoints".into()))?;
    let leg = route
        .legs
        .into_iter()
        .next()
        .ok_or_else(|| RouteError::Directions("route has no legs".into()))?;

    let coordinates = route.geometry.coordinates;
    let mut elapsed_secs = Vec::with_capacity(coordinates.len());
    elapsed_secs.push(0);
    let mut running = 0.0;
    for duration in &leg.annotation.duration {
        running += duration;
        elapsed_secs.push(running.round() as i64);
    }
    if elapsed_secs.len() != coordinates.len() {
        return Err(RouteError::Directions(format!(
            "annotation covers {} gaps for {} points",
            elapsed_secs.len() - 1,
            coordinates.len()
        )));
    }

    let (lons, lats) = coordinates.iter().map(|point| (point[0], point[1])).unzip();

    Ok(Route {
        source,
        destination,
        distance_km: leg.distance / 1000.0,
        duration_min: leg.duration / 60.0,
        track: Track {
            lons,
            lats,
            elapsed_secs,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTIONS_JSON: &str = r#"{
        "routes": [{
            "geometry": {
                "coordinates": [[9.99, 53.55], [10.01, 53.54], [10.05, 53.52]]
            },
            "legs": [{
                "annotation": { "duration": [120.4, 240.6] },
                "duration": 361.0,
                "distance": 2500.0
            }]
        }]
    }"#;

    #[test]
    fn cumulative_elapsed_axis_starts_at_zero() {
        let body: DirectionsResponse = serde_json::from_str(DIRECTIONS_JSON).unwrap();
        let route = route_from_response(body, "A".into(), "B".into()).unwrap();

        assert_eq!(route.track.elapsed_secs, vec![0, 120, 361]);
        assert_eq!(route.track.lons, vec![9.99, 10.01, 10.05]);
        assert_eq!(route.track.lats, vec![53.55, 53.54, 53.52]);
        assert!((route.distance_km - 2.5).abs() < 1e-12);
        assert!((route.duration_min - 361.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn annotation_length_mismatch_is_a_directions_error() {
        let mangled = DIRECTIONS_JSON.replace("[120.4, 240.6]", "[120.4]");
        let body: DirectionsResponse = serde_json::from_str(&mangled).unwrap();
        assert!(matches!(
            route_from_response(body, "A".into(), "B".into()),
            Err(RouteError::Directions(_))
        ));
    }

    #[test]
    fn missing_route_is_a_directions_error() {
        let body: DirectionsResponse = serde_json::from_str(r#"{"routes": []}"#).unwrap();
        assert!(matches!(
            route_from_response(body, "A".into(), "B".into()),
            Err(RouteError::Directions(_))
        ));
    }

    #[test]
    fn unknown_travel_mode_falls_back_to_cycling() {
        assert_eq!(TravelMode::parse(Some("walking")), TravelMode::Walking);
        assert_eq!(TravelMode::parse(Some("submarine")), TravelMode::Cycling);
        assert_eq!(TravelMode::parse(None), TravelMode::Cycling);
    }
}
