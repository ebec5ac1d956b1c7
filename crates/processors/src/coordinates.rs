//! WGS-84 coordinate helpers

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Semi-major axis (m)
pub const WGS84_A: f64 = 6_378_137.0;
/// Flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Geodetic position: latitude/longitude in radians, altitude above the ellipsoid in meters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Lla {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Lla {
    pub fn from_degrees(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude: latitude.to_radians(),
            longitude: longitude.to_radians(),
            altitude,
        }
    }
}

/// ECEF → geodetic (Bowring, one iteration; sub-millimeter at flight altitudes)
pub fn ecef_to_lla(ecef: &Vector3<f64>) -> Lla {
    let p = ecef.x.hypot(ecef.y);
    let longitude = ecef.y.atan2(ecef.x);

    if p < 1e-9 {
        return Lla {
            latitude: std::f64::consts::FRAC_PI_2.copysign(ecef.z),
            longitude: 0.0,
            altitude: ecef.z.abs() - WGS84_B,
        };
    }

    let ep2 = (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
    let theta = (ecef.z * WGS84_A).atan2(p * WGS84_B);
    let (sin_t, cos_t) = theta.sin_cos();
    let latitude = (ecef.z + ep2 * WGS84_B * sin_t.powi(3))
        .atan2(p - WGS84_E2 * WGS84_A * cos_t.powi(3));

    let sin_lat = latitude.sin();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let altitude = p / latitude.cos() - n;

    Lla {
        latitude,
        longitude,
        altitude,
    }
}

/// Geodetic → ECEF
pub fn lla_to_ecef(lla: &Lla) -> Vector3<f64> {
    let (sin_lat, cos_lat) = lla.latitude.sin_cos();
    let (sin_lon, cos_lon) = lla.longitude.sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    Vector3::new(
        (n + lla.altitude) * cos_lat * cos_lon,
        (n + lla.altitude) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + lla.altitude) * sin_lat,
    )
}

/// Rotation taking local east/north/up vectors at `lla` into ECEF
pub fn enu_to_ecef_rotation(lla: &Lla) -> Rotation3<f64> {
    let (sin_lat, cos_lat) = lla.latitude.sin_cos();
    let (sin_lon, cos_lon) = lla.longitude.sin_cos();

    let east = Vector3::new(-sin_lon, cos_lon, 0.0);
    let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
    let up = Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);

    Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[east, north, up]))
}
