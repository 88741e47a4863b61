//! Map telemetry lat/lon onto the coordinate system the tiles are cut in.
//!
//! British National Grid follows the Ordnance Survey's published method:
//! a seven-parameter Helmert shift from WGS84 to OSGB36, then the Airy 1830
//! transverse Mercator projection. Good to a few metres, which is well inside
//! one 5 m DTM cell.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridProjection {
    /// Tiles are cut in degrees: x = longitude, y = latitude.
    #[serde(alias = "lonlat")]
    LonLat,
    /// OS National Grid eastings/northings (EPSG:27700).
    #[default]
    #[serde(alias = "bng", alias = "osgb")]
    BritishNationalGrid,
}

impl GridProjection {
    /// WGS84 (lat, lon) in degrees to tile (x, y).
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        match self {
            GridProjection::LonLat => (lon, lat),
            GridProjection::BritishNationalGrid => {
                let (lat36, lon36) = wgs84_to_osgb36(lat, lon);
                osgb36_to_grid(lat36, lon36)
            }
        }
    }
}

struct Ellipsoid {
    a: f64,
    b: f64,
}

const GRS80: Ellipsoid = Ellipsoid { a: 6_378_137.000, b: 6_356_752.314_140 };
const AIRY1830: Ellipsoid = Ellipsoid { a: 6_377_563.396, b: 6_356_256.909 };

impl Ellipsoid {
    fn e2(&self) -> f64 {
        1.0 - (self.b * self.b) / (self.a * self.a)
    }
}

// WGS84 -> OSGB36: metres, ppm, arc-seconds
const TX: f64 = -446.448;
const TY: f64 = 125.157;
const TZ: f64 = -542.060;
const S_PPM: f64 = 20.4894;
const RX_SEC: f64 = -0.1502;
const RY_SEC: f64 = -0.2470;
const RZ_SEC: f64 = -0.8421;

// National Grid true origin
const F0: f64 = 0.999_601_271_7;
const LAT0_DEG: f64 = 49.0;
const LON0_DEG: f64 = -2.0;
const E0: f64 = 400_000.0;
const N0: f64 = -100_000.0;

fn wgs84_to_osgb36(lat: f64, lon: f64) -> (f64, f64) {
    let (x, y, z) = to_cartesian(&GRS80, lat.to_radians(), lon.to_radians());

    let sec = (1.0_f64 / 3600.0).to_radians();
    let (rx, ry, rz) = (RX_SEC * sec, RY_SEC * sec, RZ_SEC * sec);
    let s = 1.0 + S_PPM * 1e-6;

    let x2 = TX + x * s - y * rz + z * ry;
    let y2 = TY + x * rz + y * s - z * rx;
    let z2 = TZ - x * ry + y * rx + z * s;

    let (phi, lam) = from_cartesian(&AIRY1830, x2, y2, z2);
    (phi.to_degrees(), lam.to_degrees())
}

/// Height is taken as zero; it moves the result by millimetres.
fn to_cartesian(el: &Ellipsoid, phi: f64, lam: f64) -> (f64, f64, f64) {
    let e2 = el.e2();
    let nu = el.a / (1.0 - e2 * phi.sin().powi(2)).sqrt();
    (
        nu * phi.cos() * lam.cos(),
        nu * phi.cos() * lam.sin(),
        (1.0 - e2) * nu * phi.sin(),
    )
}

fn from_cartesian(el: &Ellipsoid, x: f64, y: f64, z: f64) -> (f64, f64) {
    let e2 = el.e2();
    let p = (x * x + y * y).sqrt();
    let mut phi = z.atan2(p * (1.0 - e2));
    for _ in 0..10 {
        let nu = el.a / (1.0 - e2 * phi.sin().powi(2)).sqrt();
        let next = (z + e2 * nu * phi.sin()).atan2(p);
        let done = (next - phi).abs() < 1e-12;
        phi = next;
        if done {
            break;
        }
    }
    (phi, y.atan2(x))
}

/// OSGB36 lat/lon in degrees to (easting, northing).
pub(crate) fn osgb36_to_grid(lat: f64, lon: f64) -> (f64, f64) {
    let el = &AIRY1830;
    let (a, b) = (el.a, el.b);
    let e2 = el.e2();
    let n = (a - b) / (a + b);
    let (n2, n3) = (n * n, n * n * n);

    let phi = lat.to_radians();
    let lam = lon.to_radians();
    let phi0 = LAT0_DEG.to_radians();
    let lam0 = LON0_DEG.to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();
    let tan2 = tan_phi * tan_phi;
    let tan4 = tan2 * tan2;

    let nu = a * F0 / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let rho = a * F0 * (1.0 - e2) / (1.0 - e2 * sin_phi * sin_phi).powf(1.5);
    let eta2 = nu / rho - 1.0;

    let dphi = phi - phi0;
    let sphi = phi + phi0;
    let m = b * F0
        * ((1.0 + n + 1.25 * n2 + 1.25 * n3) * dphi
            - (3.0 * n + 3.0 * n2 + 21.0 / 8.0 * n3) * dphi.sin() * sphi.cos()
            + (15.0 / 8.0 * n2 + 15.0 / 8.0 * n3) * (2.0 * dphi).sin() * (2.0 * sphi).cos()
            - 35.0 / 24.0 * n3 * (3.0 * dphi).sin() * (3.0 * sphi).cos());

    let cos3 = cos_phi.powi(3);
    let cos5 = cos_phi.powi(5);

    let i = m + N0;
    let ii = nu / 2.0 * sin_phi * cos_phi;
    let iii = nu / 24.0 * sin_phi * cos3 * (5.0 - tan2 + 9.0 * eta2);
    let iiia = nu / 720.0 * sin_phi * cos5 * (61.0 - 58.0 * tan2 + tan4);
    let iv = nu * cos_phi;
    let v = nu / 6.0 * cos3 * (nu / rho - tan2);
    let vi = nu / 120.0 * cos5 * (5.0 - 18.0 * tan2 + tan4 + 14.0 * eta2 - 58.0 * tan2 * eta2);

    let dl = lam - lam0;
    let northing = i + ii * dl.powi(2) + iii * dl.powi(4) + iiia * dl.powi(6);
    let easting = E0 + iv * dl + v * dl.powi(3) + vi * dl.powi(5);
    (easting, northing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dms(d: f64, m: f64, s: f64) -> f64 {
        d + m / 60.0 + s / 3600.0
    }

    #[test]
    fn os_worked_example() {
        // OS "A guide to coordinate systems in Great Britain", annex C.
        let lat = dms(52.0, 39.0, 27.2531);
        let lon = dms(1.0, 43.0, 4.5177);
        let (e, n) = osgb36_to_grid(lat, lon);
        assert!((e - 651_409.903).abs() < 0.01, "easting {e}");
        assert!((n - 313_177.270).abs() < 0.01, "northing {n}");
    }

    #[test]
    fn datum_shift_is_small() {
        // Llanbedr, Gwynedd
        let (lat, lon) = (52.8035, -4.1236);
        let (e84, n84) = GridProjection::BritishNationalGrid.project(lat, lon);
        let (e36, n36) = osgb36_to_grid(lat, lon);
        let shift = ((e84 - e36).powi(2) + (n84 - n36).powi(2)).sqrt();
        assert!(shift > 50.0 && shift < 200.0, "shift {shift}");
        // lands in the SH grid square
        assert!((200_000.0..300_000.0).contains(&e84));
        assert!((300_000.0..400_000.0).contains(&n84));
    }

    #[test]
    fn lonlat_is_passthrough() {
        assert_eq!(GridProjection::LonLat.project(52.5, -4.0), (-4.0, 52.5));
    }
}
