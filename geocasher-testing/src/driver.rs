use std::{sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use geocasher_logic::{
    AuthorizationState, Choice, Coordinate, LocationProvider, ProviderConfig, Timeline,
    location_events,
};
use geocasher_test_shared::{LogSender, RankedPost, ScriptedPresenter, SimulatedLocation, prelude::*};
use geocasher_transport::{FEED_URL, HttpFeed};
use log::{info, warn};
use tokio::sync::oneshot;

#[derive(Parser)]
/// Fetch the feed and rank it by distance from a simulated device location
struct Cli {
    /// URL of the image feed
    #[arg(long, default_value = FEED_URL)]
    url: String,

    /// Authorization state the simulated OS starts in
    #[arg(long, value_enum, default_value_t = AuthStateValue::WhenInUse)]
    auth_state: AuthStateValue,

    /// Latitude of the simulated device
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the simulated device
    #[arg(long, allow_hyphen_values = true)]
    long: f64,

    /// How the user answers our prompts
    #[arg(long, value_enum, default_value_t = AnswerValue::Proceed)]
    answer: AnswerValue,

    /// How the user answers the OS permission prompt, or what they pick in settings
    #[arg(long, value_enum, default_value_t = GrantValue::Allow)]
    grant: GrantValue,

    /// Seconds to wait for a location before printing the feed unsorted
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum AuthStateValue {
    NotDetermined,
    Restricted,
    Denied,
    WhenInUse,
    Always,
}

impl From<AuthStateValue> for AuthorizationState {
    fn from(value: AuthStateValue) -> Self {
        match value {
            AuthStateValue::NotDetermined => AuthorizationState::NotDetermined,
            AuthStateValue::Restricted => AuthorizationState::Restricted,
            AuthStateValue::Denied => AuthorizationState::Denied,
            AuthStateValue::WhenInUse => AuthorizationState::AuthorizedWhenInUse,
            AuthStateValue::Always => AuthorizationState::AuthorizedAlways,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum AnswerValue {
    Proceed,
    NotNow,
    Settings,
}

impl From<AnswerValue> for Choice {
    fn from(value: AnswerValue) -> Self {
        match value {
            AnswerValue::Proceed => Choice::Proceed,
            AnswerValue::NotNow => Choice::NotNow,
            AnswerValue::Settings => Choice::OpenSettings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum GrantValue {
    Allow,
    Deny,
}

impl From<GrantValue> for AuthorizationState {
    fn from(value: GrantValue) -> Self {
        match value {
            GrantValue::Allow => AuthorizationState::AuthorizedWhenInUse,
            GrantValue::Deny => AuthorizationState::Denied,
        }
    }
}

fn print_table(posts: &[RankedPost]) {
    for (i, post) in posts.iter().enumerate() {
        let distance = post
            .distance_km
            .map(|km| format!("{km:>10.1} km"))
            .unwrap_or_else(|| format!("{:>13}", "?"));
        println!(
            "{:>3}. {distance}  {:<30} ({:.4}, {:.4})",
            i + 1,
            post.name,
            post.latitude,
            post.longitude
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();
    let here = Coordinate::new(cli.lat, cli.long);
    if !here.is_valid() {
        bail!("{here:?} isn't a valid coordinate");
    }

    let timeline = Arc::new(Timeline::new(HttpFeed::new(cli.url.clone()), LogSender));
    timeline
        .refresh()
        .await
        .with_context(|| format!("Couldn't get the feed from {}", cli.url))?;

    let (events_tx, events_rx) = location_events();
    let services =
        SimulatedLocation::new(cli.auth_state.into(), cli.grant.into(), here, events_tx);
    let provider = LocationProvider::new(services, ProviderConfig::default());
    let event_loop = tokio::spawn({
        let provider = provider.clone();
        async move { provider.main_loop(events_rx).await }
    });

    let (done_tx, done_rx) = oneshot::channel();
    provider.request_current_location(&ScriptedPresenter(cli.answer.into()), move |location| {
        done_tx.send(location).ok();
    });

    let from = match tokio::time::timeout(Duration::from_secs(cli.timeout), done_rx).await {
        Ok(Ok(location)) => {
            info!("Got location {:?}", location.coordinate);
            timeline.sort_by(location.coordinate);
            Some(location.coordinate)
        }
        Ok(Err(_)) | Err(_) => {
            warn!("Didn't get a location, showing the feed in server order");
            None
        }
    };

    provider.shutdown();
    event_loop.await.context("Location event loop panicked")?;

    let ranked = timeline
        .posts()
        .iter()
        .map(|post| RankedPost::new(post, from))
        .collect::<Vec<_>>();

    if cli.json {
        let out = serde_json::to_string_pretty(&ranked).context("Failed to serialize posts")?;
        println!("{out}");
    } else {
        print_table(&ranked);
    }

    Ok(())
}
