use chrono::DateTime;
use geocasher_logic::{
    AuthorizationState, Coordinate, DeviceLocation, LocationEvent, LocationEventSender,
    LocationServices,
};
use log::{error, warn};
use tauri::{AppHandle, plugin::PermissionState};
use tauri_plugin_geolocation::{GeolocationExt, PermissionType, Position, PositionOptions};
use tauri_plugin_opener::OpenerExt;

/// OS location services through the geolocation plugin. The plugin calls block, so they're
/// run on the blocking pool and report back through the event channel.
pub struct TauriLocation {
    app: AppHandle,
    events: LocationEventSender,
}

impl TauriLocation {
    pub fn new(app: AppHandle, events: LocationEventSender) -> Self {
        Self { app, events }
    }
}

const OPTIONS: PositionOptions = PositionOptions {
    enable_high_accuracy: true,
    timeout: 10000,
    maximum_age: 0,
};

const SETTINGS_URL: &str = "app-settings:";

fn map_permission(state: PermissionState) -> AuthorizationState {
    match state {
        PermissionState::Granted => AuthorizationState::AuthorizedWhenInUse,
        PermissionState::Denied => AuthorizationState::Denied,
        _ => AuthorizationState::NotDetermined,
    }
}

fn to_device_location(pos: Position) -> DeviceLocation {
    let coordinate = Coordinate::new(pos.coords.latitude, pos.coords.longitude);
    match i64::try_from(pos.timestamp)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
    {
        Some(timestamp) => DeviceLocation {
            coordinate,
            timestamp,
        },
        None => DeviceLocation::new(coordinate),
    }
}

fn send(events: &LocationEventSender, event: LocationEvent) {
    if events.send(event).is_err() {
        warn!("Location provider stopped listening, dropping event");
    }
}

impl LocationServices for TauriLocation {
    fn authorization_state(&self) -> AuthorizationState {
        match self.app.geolocation().check_permissions() {
            Ok(status) => map_permission(status.location),
            Err(why) => {
                error!("Failed to check location permission: {why:?}");
                AuthorizationState::NotDetermined
            }
        }
    }

    fn request_authorization(&self) {
        let app = self.app.clone();
        let events = self.events.clone();
        tauri::async_runtime::spawn_blocking(move || {
            match app
                .geolocation()
                .request_permissions(Some(vec![PermissionType::Location]))
            {
                Ok(status) => send(
                    &events,
                    LocationEvent::AuthorizationChanged(map_permission(status.location)),
                ),
                Err(why) => error!("Failed to request location permission: {why:?}"),
            }
        });
    }

    fn request_location(&self) {
        let app = self.app.clone();
        let events = self.events.clone();
        tauri::async_runtime::spawn_blocking(move || {
            let event = match app.geolocation().get_current_position(Some(OPTIONS)) {
                Ok(pos) => LocationEvent::LocationsUpdated(vec![to_device_location(pos)]),
                Err(why) => LocationEvent::Failed(format!("{why:?}")),
            };
            send(&events, event);
        });
    }

    fn open_settings(&self) {
        if let Err(why) = self.app.opener().open_url(SETTINGS_URL, None::<&str>) {
            error!("Failed to open settings: {why:?}");
        }
    }
}
