use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance (haversine), meters.
    pub fn distance_m(&self, other: &Position) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Initial bearing towards `other`, degrees clockwise from north in [0, 360).
    pub fn bearing_to(&self, other: &Position) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlon = (other.lon - self.lon).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        normalize_degrees(y.atan2(x).to_degrees())
    }

    /// Point reached by travelling `distance_m` along `bearing_deg`.
    pub fn offset(&self, bearing_deg: f64, distance_m: f64) -> Position {
        let delta = distance_m / EARTH_RADIUS_M;
        let theta = bearing_deg.to_radians();
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();
        let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
        let lon2 = lon1
            + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());
        Position::new(lat2.to_degrees(), lon2.to_degrees())
    }

    /// Square-ish lookup area around this point. Does not wrap the antimeridian.
    pub fn bounding_box(&self, half_size_m: f64) -> BoundingBox {
        let dlat = (half_size_m / EARTH_RADIUS_M).to_degrees();
        let dlon = dlat / self.lat.to_radians().cos().max(0.01);
        BoundingBox {
            south: (self.lat - dlat).max(-90.0),
            west: (self.lon - dlon).max(-180.0),
            north: (self.lat + dlat).min(90.0),
            east: (self.lon + dlon).min(180.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn contains(&self, p: &Position) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lon >= self.west && p.lon <= self.east
    }
}

pub fn normalize_degrees(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Smallest absolute angle between two headings, in [0, 180].
pub fn angle_between(a: f64, b: f64) -> f64 {
    let diff = normalize_degrees(a - b);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Signed offset of `target` relative to `heading`, in (-180, 180]. Positive is to the right.
pub fn relative_bearing(heading: f64, target: f64) -> f64 {
    let diff = normalize_degrees(target - heading);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}
