use std::sync::{Mutex, PoisonError};

use geocasher_logic::{
    AuthorizationState, Choice, ChoiceHandler, Coordinate, DeviceLocation, LocationEvent,
    LocationEventSender, LocationServices, Post, Presenter, Prompt, StateUpdateSender,
    distance_meters,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

/// Location services backed by fixed answers instead of an OS. Every request is answered
/// right away through the event channel.
pub struct SimulatedLocation {
    auth: Mutex<AuthorizationState>,
    /// What the permission prompt (or a trip to settings) changes the state to
    grant: AuthorizationState,
    fix: Coordinate,
    events: LocationEventSender,
}

impl SimulatedLocation {
    pub fn new(
        auth: AuthorizationState,
        grant: AuthorizationState,
        fix: Coordinate,
        events: LocationEventSender,
    ) -> Self {
        Self {
            auth: Mutex::new(auth),
            grant,
            fix,
            events,
        }
    }

    fn send(&self, event: LocationEvent) {
        if self.events.send(event).is_err() {
            warn!("Location provider is no longer listening");
        }
    }

    fn change_auth(&self, auth: AuthorizationState) {
        *self.auth.lock().unwrap_or_else(PoisonError::into_inner) = auth;
        self.send(LocationEvent::AuthorizationChanged(auth));
    }
}

impl LocationServices for SimulatedLocation {
    fn authorization_state(&self) -> AuthorizationState {
        *self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_authorization(&self) {
        info!("OS permission prompt answered with {:?}", self.grant);
        self.change_auth(self.grant);
    }

    fn request_location(&self) {
        debug!("Reporting location {:?}", self.fix);
        self.send(LocationEvent::LocationsUpdated(vec![DeviceLocation::new(
            self.fix,
        )]));
    }

    fn open_settings(&self) {
        info!("Settings changed location access to {:?}", self.grant);
        self.change_auth(self.grant);
    }
}

/// Answers every prompt with the same choice
pub struct ScriptedPresenter(pub Choice);

impl Presenter for ScriptedPresenter {
    fn present(&self, prompt: Prompt, respond: ChoiceHandler) {
        info!("[{:?}] {}: {}", prompt.kind, prompt.title, prompt.message);
        let choice = if prompt.choices.contains(&self.0) {
            self.0
        } else {
            prompt.cancel_choice()
        };
        info!("Answering with \"{}\"", choice.label());
        respond(choice);
    }
}

pub struct LogSender;

impl StateUpdateSender for LogSender {
    fn send_update(&self) {
        debug!("Timeline updated");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A post as printed by the driver
pub struct RankedPost {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: String,
    pub distance_km: Option<f64>,
}

impl RankedPost {
    pub fn new(post: &Post, from: Option<Coordinate>) -> Self {
        let coordinate = post.coordinate();
        Self {
            name: post.location().name.clone(),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            image_url: post.image_url().to_string(),
            distance_km: from.map(|from| distance_meters(from, coordinate) / 1000.0),
        }
    }
}
