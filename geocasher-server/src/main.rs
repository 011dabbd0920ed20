use axum::{Router, routing::get_service};
use log::{info, warn};
use tower_http::services::ServeFile;

use anyhow::Context;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    result::Result as StdResult,
};

type Result<T = (), E = anyhow::Error> = StdResult<T, E>;

const FEED_ROUTE: &str = "/imagefeed.json";
const DEFAULT_FEED_PATH: &str = "imagefeed.json";
const DEFAULT_PORT: u16 = 8000;

/// The only route: the feed file, served as-is
fn feed_router(feed_path: &Path) -> Router {
    Router::new().route(FEED_ROUTE, get_service(ServeFile::new(feed_path)))
}

#[tokio::main]
async fn main() -> Result {
    colog::init();

    let args = std::env::args().collect::<Vec<_>>();
    let socket_addr = args
        .get(1)
        .map(|raw_binding| raw_binding.parse::<SocketAddr>())
        .transpose()
        .context("Invalid socket addr passed")?
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT));

    let feed_path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FEED_PATH));

    if !feed_path.is_file() {
        warn!(
            "Feed file {} doesn't exist yet, requests will 404 until it does",
            feed_path.display()
        );
    }

    let listener = tokio::net::TcpListener::bind(socket_addr)
        .await
        .with_context(|| format!("Failed to bind to {socket_addr}"))?;

    info!(
        "Starting geocasher feed server {} at http://{socket_addr}{FEED_ROUTE}, serving {}",
        env!("CARGO_PKG_VERSION"),
        feed_path.display()
    );

    axum::serve(listener, feed_router(&feed_path))
        .await
        .context("Error while running server")
}
