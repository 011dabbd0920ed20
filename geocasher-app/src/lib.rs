mod location;
mod presenter;
mod state;

use geocasher_logic::{Coordinate, DeviceLocation, Post, PostDetail};
use log::LevelFilter;
use tauri::{Manager, RunEvent, State};
use tauri_specta::{ErrorHandlingMode, collect_commands, collect_events};

use std::result::Result as StdResult;

use crate::state::{AppState, TimelineUpdate};

type Result<T = (), E = String> = StdResult<T, E>;

// == TIMELINE COMMANDS ==

#[tauri::command]
#[specta::specta]
/// Get the posts in the order they should be shown, call after receiving [TimelineUpdate]
fn get_posts(state: State<'_, AppState>) -> Vec<Post> {
    state.timeline().posts()
}

#[tauri::command]
#[specta::specta]
/// Fetch the feed again and replace all posts with it. Returns how many posts were fetched. On
/// error the posts currently shown are kept.
async fn refresh_posts(state: State<'_, AppState>) -> Result<u32> {
    let count = state
        .timeline()
        .refresh()
        .await
        .map_err(|err| format!("{err:#}"))?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

#[tauri::command]
#[specta::specta]
/// Sort posts by distance from the device. This may show permission prompts first, once a
/// location comes in the posts are sorted and [TimelineUpdate] is sent. Nothing happens if the
/// user doesn't allow location access.
async fn sort_by_location(state: State<'_, AppState>) -> Result {
    state.sort_by_current_location();
    Ok(())
}

#[tauri::command]
#[specta::specta]
/// Sort posts by distance from an arbitrary point, closest first
fn sort_by_coordinate(coordinate: Coordinate, state: State<'_, AppState>) -> Result {
    if !coordinate.is_valid() {
        return Err(format!("{coordinate:?} isn't a valid coordinate"));
    }
    state.timeline().sort_by(coordinate);
    Ok(())
}

// == LOCATION / DETAIL COMMANDS ==

#[tauri::command]
#[specta::specta]
/// Get the last location the device reported, `null` if there hasn't been one yet
fn get_current_location(state: State<'_, AppState>) -> Option<DeviceLocation> {
    state.provider().current_location()
}

#[tauri::command]
#[specta::specta]
/// Get a single post along with the map region to show around it and how far away it is
fn get_post_detail(index: u32, state: State<'_, AppState>) -> Result<PostDetail> {
    let current = state.provider().current_location();
    state
        .timeline()
        .post_detail(index as usize, current)
        .ok_or_else(|| format!("No post at index {index}"))
}

pub fn mk_specta() -> tauri_specta::Builder {
    tauri_specta::Builder::<tauri::Wry>::new()
        .error_handling(ErrorHandlingMode::Throw)
        .commands(collect_commands![
            get_posts,
            refresh_posts,
            sort_by_location,
            sort_by_coordinate,
            get_current_location,
            get_post_detail,
        ])
        .events(collect_events![TimelineUpdate])
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let builder = mk_specta();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(LevelFilter::Debug)
                .build(),
        )
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_geolocation::init())
        .invoke_handler(builder.invoke_handler())
        .setup(move |app| {
            builder.mount_events(app);

            let state = AppState::new(app.handle());
            state.initial_refresh();
            app.manage(state);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let RunEvent::Exit = event
                && let Some(state) = app.try_state::<AppState>()
            {
                state.shutdown();
            }
        });
}
