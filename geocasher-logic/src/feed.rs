use crate::{post::Post, prelude::*};

/// Where the timeline gets its posts from
pub trait FeedSource: Send + Sync {
    /// Fetch the whole feed. Entries that aren't valid posts are skipped, only a failed
    /// request is an error.
    fn fetch_posts(&self) -> impl Future<Output = Result<Vec<Post>>> + Send;
}
