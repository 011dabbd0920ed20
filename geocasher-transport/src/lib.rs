mod server;

pub use server::{FEED_URL, HttpFeed};
