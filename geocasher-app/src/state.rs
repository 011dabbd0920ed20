use std::{marker::PhantomData, sync::Arc};

use geocasher_logic::{
    LocationProvider, ProviderConfig, StateUpdateSender, Timeline, location_events,
};
use geocasher_transport::HttpFeed;
use log::{error, info};
use serde::{Deserialize, Serialize};
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_specta::Event;

use crate::{location::TauriLocation, presenter::TauriPresenter};

/// The posts shown on the timeline have changed
#[derive(Serialize, Deserialize, Clone, Default, Debug, specta::Type, tauri_specta::Event)]
pub struct TimelineUpdate;

pub struct TauriStateUpdateSender<E: Clone + Default + Event + Serialize>(
    AppHandle,
    PhantomData<E>,
);

impl<E: Serialize + Clone + Default + Event> TauriStateUpdateSender<E> {
    fn new(app: &AppHandle) -> Self {
        Self(app.clone(), PhantomData)
    }
}

impl<E: Serialize + Clone + Default + Event + Send + Sync> StateUpdateSender
    for TauriStateUpdateSender<E>
{
    fn send_update(&self) {
        if let Err(why) = E::default().emit(&self.0) {
            error!("Error sending timeline update to UI: {why:?}");
        }
    }
}

type AppTimeline = Timeline<HttpFeed, TauriStateUpdateSender<TimelineUpdate>>;
type AppLocationProvider = LocationProvider<TauriLocation>;

pub struct AppState {
    app: AppHandle,
    timeline: Arc<AppTimeline>,
    provider: Arc<AppLocationProvider>,
}

fn error_dialog(app: &AppHandle, msg: &str) {
    app.dialog()
        .message(msg)
        .kind(MessageDialogKind::Error)
        .show(|_| {});
}

impl AppState {
    /// Set up the timeline and location provider, and start listening for location events
    pub fn new(app: &AppHandle) -> Self {
        let timeline = Arc::new(Timeline::new(
            HttpFeed::default(),
            TauriStateUpdateSender::new(app),
        ));

        let (events_tx, events_rx) = location_events();
        let provider = LocationProvider::new(
            TauriLocation::new(app.clone(), events_tx),
            ProviderConfig::default(),
        );

        tauri::async_runtime::spawn({
            let provider = provider.clone();
            async move {
                provider.main_loop(events_rx).await;
                info!("Location event loop stopped");
            }
        });

        Self {
            app: app.clone(),
            timeline,
            provider,
        }
    }

    pub fn timeline(&self) -> &Arc<AppTimeline> {
        &self.timeline
    }

    pub fn provider(&self) -> &Arc<AppLocationProvider> {
        &self.provider
    }

    /// Fetch the feed in the background, used on launch
    pub fn initial_refresh(&self) {
        let timeline = self.timeline.clone();
        let app = self.app.clone();
        tauri::async_runtime::spawn(async move {
            if let Err(why) = timeline.refresh().await {
                error_dialog(&app, &format!("Couldn't load photos\n\n{why:#}"));
            }
        });
    }

    /// Ask for the device's location, prompting if needed, and sort the timeline once it
    /// arrives
    pub fn sort_by_current_location(&self) {
        let presenter = TauriPresenter::new(&self.app);
        self.timeline
            .sort_by_current_location(&self.provider, &presenter);
    }

    pub fn shutdown(&self) {
        self.provider.shutdown();
    }
}
