use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{error, info};
use serde::Serialize;

use crate::{
    feed::FeedSource,
    location::{Coordinate, DeviceLocation, LocationServices, MapRegion},
    post::Post,
    prelude::*,
    prompt::Presenter,
    provider::LocationProvider,
    ranking::{distance_meters, rank_by_distance},
};

pub trait StateUpdateSender: Send + Sync {
    fn send_update(&self);
}

#[derive(Debug, Clone, Serialize, PartialEq, specta::Type)]
/// A single post as shown on its map screen
pub struct PostDetail {
    pub post: Post,
    /// Area of the map to show around the post
    pub region: MapRegion,
    /// How far the post is from the device, if we know where the device is
    pub distance_meters: Option<f64>,
}

/// The list of posts being shown to the user, fetched from a [FeedSource] and optionally sorted
/// by distance from the device.
pub struct Timeline<F: FeedSource, U: StateUpdateSender> {
    feed: F,
    posts: RwLock<Vec<Post>>,
    state_updates: U,
}

impl<F: FeedSource, U: StateUpdateSender> Timeline<F, U> {
    pub fn new(feed: F, state_updates: U) -> Self {
        Self {
            feed,
            posts: RwLock::new(Vec::new()),
            state_updates,
        }
    }

    fn read_posts(&self) -> RwLockReadGuard<'_, Vec<Post>> {
        self.posts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_posts(&self) -> RwLockWriteGuard<'_, Vec<Post>> {
        self.posts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the feed and replace all posts with it, returns how many posts were fetched.
    /// On error the current posts are left alone.
    pub async fn refresh(&self) -> Result<usize> {
        let posts = match self.feed.fetch_posts().await {
            Ok(posts) => posts,
            Err(why) => {
                error!("Failed to fetch posts: {why:?}");
                return Err(why.context("Failed to fetch posts"));
            }
        };

        let count = posts.len();
        info!("Fetched {count} posts");
        *self.write_posts() = posts;
        self.state_updates.send_update();
        Ok(count)
    }

    pub fn posts(&self) -> Vec<Post> {
        self.read_posts().clone()
    }

    pub fn post(&self, index: usize) -> Option<Post> {
        self.read_posts().get(index).cloned()
    }

    /// Sort the posts by distance from `reference`, closest first
    pub fn sort_by(&self, reference: Coordinate) {
        let mut posts = self.write_posts();
        let ranked = rank_by_distance(&posts, reference);
        *posts = ranked;
        drop(posts);
        self.state_updates.send_update();
    }

    /// Get the post at `index` with its map region, and its distance from `current` if given
    pub fn post_detail(&self, index: usize, current: Option<DeviceLocation>) -> Option<PostDetail> {
        let post = self.post(index)?;
        let region = MapRegion::around(post.coordinate(), MapRegion::DEFAULT_SPAN_METERS);
        let distance_meters = current.map(|loc| distance_meters(loc.coordinate, post.coordinate()));
        Some(PostDetail {
            post,
            region,
            distance_meters,
        })
    }
}

impl<F: FeedSource + 'static, U: StateUpdateSender + 'static> Timeline<F, U> {
    /// Ask `provider` for the device's location and sort by it once it arrives. If the user
    /// doesn't allow location access the posts are left as they are.
    pub fn sort_by_current_location<S: LocationServices + 'static, P: Presenter + ?Sized>(
        self: &Arc<Self>,
        provider: &Arc<LocationProvider<S>>,
        presenter: &P,
    ) {
        let timeline = Arc::clone(self);
        provider.request_current_location(presenter, move |location| {
            info!("Sorting posts by distance from {:?}", location.coordinate);
            timeline.sort_by(location.coordinate);
        });
    }
}
