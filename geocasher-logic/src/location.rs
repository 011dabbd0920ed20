use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ranking::EARTH_RADIUS_METERS;

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

/// A "part" of a coordinate
pub type Degrees = f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// Some point on the earth's surface
pub struct Coordinate {
    /// Latitude, -90 to 90
    pub latitude: Degrees,
    /// Longitude, -180 to 180
    pub longitude: Degrees,
}

impl Coordinate {
    pub const fn new(latitude: Degrees, longitude: Degrees) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and within their ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, specta::Type)]
/// A coordinate with a human readable name attached, as tagged on a post
pub struct NamedLocation {
    pub coordinate: Coordinate,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// A fix of the device's location as reported by the OS
pub struct DeviceLocation {
    pub coordinate: Coordinate,
    /// When this fix was observed
    pub timestamp: UtcDT,
}

impl DeviceLocation {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Whether the OS lets us read the device's location
pub enum AuthorizationState {
    /// The user hasn't made a decision yet
    NotDetermined,
    /// The user isn't allowed to grant access, usually parental controls
    Restricted,
    /// The user said no
    Denied,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

impl AuthorizationState {
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedWhenInUse | Self::AuthorizedAlways)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A notification coming back from the OS location services
pub enum LocationEvent {
    /// The authorization state changed, either from a prompt or the system settings
    AuthorizationChanged(AuthorizationState),
    /// A batch of candidate fixes, best first
    LocationsUpdated(Vec<DeviceLocation>),
    /// The OS failed to get a fix
    Failed(String),
}

pub type LocationEventSender = mpsc::UnboundedSender<LocationEvent>;
pub type LocationEventReceiver = mpsc::UnboundedReceiver<LocationEvent>;

/// Create the channel OS location services report back through. The sending half goes to
/// the [LocationServices] implementation, the receiving half to
/// [crate::LocationProvider::main_loop].
pub fn location_events() -> (LocationEventSender, LocationEventReceiver) {
    mpsc::unbounded_channel()
}

/// The OS's location capabilities. None of these block, results are reported later as a
/// [LocationEvent].
pub trait LocationServices: Send + Sync {
    /// Get the current authorization state
    fn authorization_state(&self) -> AuthorizationState;
    /// Show the OS permission prompt, the answer comes back as
    /// [LocationEvent::AuthorizationChanged]
    fn request_authorization(&self);
    /// Request a single location fix, the answer comes back as
    /// [LocationEvent::LocationsUpdated] or [LocationEvent::Failed]
    fn request_location(&self);
    /// Open the system settings page for this app
    fn open_settings(&self);
}

// Below this cos(latitude), one meter east covers a huge number of degrees
const MIN_LATITUDE_COS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, specta::Type)]
/// A rectangular area of the map centered on a coordinate
pub struct MapRegion {
    pub center: Coordinate,
    /// Height of the region
    pub latitude_delta: Degrees,
    /// Width of the region
    pub longitude_delta: Degrees,
}

impl MapRegion {
    /// Span used when showing a single post on the map
    pub const DEFAULT_SPAN_METERS: f64 = 1000.0;

    /// Region `span_meters` tall and wide around `center`
    pub fn around(center: Coordinate, span_meters: f64) -> Self {
        let meters_per_degree = EARTH_RADIUS_METERS.to_radians();
        let latitude_delta = (span_meters / meters_per_degree).min(180.0);
        let cos = center.latitude.to_radians().cos().max(MIN_LATITUDE_COS);
        let longitude_delta = (span_meters / (meters_per_degree * cos)).min(360.0);
        Self {
            center,
            latitude_delta,
            longitude_delta,
        }
    }
}
