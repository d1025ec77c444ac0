use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

/// WGS84 equatorial radius in metres.
const EARTH_RADIUS_M: f64 = 6_378_137.0;
const SQ_M_PER_HECTARE: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Area enclosed by a lat/lon ring using the spherical-excess approximation.
/// Fewer than 3 vertices is degenerate and yields 0.
pub fn polygon_area_hectares(points: &[GeoPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut total = 0.0;
    for (i, p1) in points.iter().enumerate() {
        let p2 = points[(i + 1) % points.len()];
        let lon_delta = (p2.longitude - p1.longitude).to_radians();
        total += lon_delta * (2.0 + p1.latitude.to_radians().sin() + p2.latitude.to_radians().sin());
    }
    (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs() / SQ_M_PER_HECTARE
}

/// Vertex average of the boundary, or `None` when there is nothing to average.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lon) = points
        .iter()
        .fold((0.0, 0.0), |(la, lo), p| (la + p.latitude, lo + p.longitude));
    Some(GeoPoint { latitude: lat / n, longitude: lon / n })
}

/// Parses "LAT,LON" as given on the command line.
pub fn parse_point(s: &str) -> Result<GeoPoint> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| anyhow!("expected LAT,LON but got '{}'", s))?;
    let latitude: f64 = lat.trim().parse().with_context(|| format!("bad latitude in '{}'", s))?;
    let longitude: f64 = lon.trim().parse().with_context(|| format!("bad longitude in '{}'", s))?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        bail!("coordinates out of range: '{}'", s);
    }
    Ok(GeoPoint { latitude, longitude })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Pair([f64; 2]),
    Named(GeoPoint),
}

/// Boundary file: a JSON array of `[lat, lon]` pairs or `{latitude, longitude}` objects.
pub fn parse_boundary_json(text: &str) -> Result<Vec<GeoPoint>> {
    let raw: Vec<PointRepr> = serde_json::from_str(text).context("boundary must be a JSON array of points")?;
    Ok(raw
        .into_iter()
        .map(|p| match p {
            PointRepr::Pair([latitude, longitude]) => GeoPoint { latitude, longitude },
            PointRepr::Named(g) => g,
        })
        .collect())
}
