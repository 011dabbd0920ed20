use anyhow::bail;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{
    location::{Coordinate, NamedLocation},
    prelude::*,
};

#[derive(Debug, Clone, PartialEq, Serialize, specta::Type)]
/// A geotagged photo post from the feed
pub struct Post {
    location: NamedLocation,
    #[specta(type = String)]
    image_url: Url,
}

// Wire shape of a single feed entry, anything else in the entry is ignored
#[derive(Deserialize)]
struct FeedEntry {
    location: FeedLocation,
    images: FeedImages,
}

#[derive(Deserialize)]
struct FeedLocation {
    latitude: f64,
    longitude: f64,
    name: String,
}

#[derive(Deserialize)]
struct FeedImages {
    standard_resolution: FeedImage,
}

#[derive(Deserialize)]
struct FeedImage {
    url: Url,
}

impl Post {
    pub fn new(location: NamedLocation, image_url: Url) -> Result<Self> {
        if !location.coordinate.is_valid() {
            bail!("Coordinate out of range: {:?}", location.coordinate);
        }
        Ok(Self {
            location,
            image_url,
        })
    }

    /// Build a post from one entry of the feed, fails if a required field is missing or
    /// malformed
    pub fn from_json(entry: Value) -> Result<Self> {
        let entry = serde_json::from_value::<FeedEntry>(entry)
            .context("Feed entry is missing information")?;

        let location = NamedLocation {
            coordinate: Coordinate::new(entry.location.latitude, entry.location.longitude),
            name: entry.location.name,
        };

        Self::new(location, entry.images.standard_resolution.url)
    }

    pub fn location(&self) -> &NamedLocation {
        &self.location
    }

    pub fn coordinate(&self) -> Coordinate {
        self.location.coordinate
    }

    pub fn image_url(&self) -> &Url {
        &self.image_url
    }
}

/// Parse a feed response body into posts.
///
/// An empty body is an empty feed. Entries that can't be turned into a [Post] are logged and
/// skipped, a body that isn't a JSON array yields no posts at all.
pub fn parse_feed(body: &[u8]) -> Vec<Post> {
    if body.is_empty() {
        return Vec::new();
    }

    let entries = match serde_json::from_slice::<Vec<Value>>(body) {
        Ok(entries) => entries,
        Err(why) => {
            warn!("Feed body is not a JSON array: {why}");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match Post::from_json(entry) {
            Ok(post) => Some(post),
            Err(why) => {
                warn!("Failed to create post from feed entry {i}: {why:#}");
                None
            }
        })
        .collect()
}
