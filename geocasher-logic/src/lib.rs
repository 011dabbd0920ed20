mod feed;
mod location;
mod post;
mod prompt;
mod provider;
mod ranking;
mod timeline;

pub use feed::FeedSource;
pub use location::{
    AuthorizationState, Coordinate, Degrees, DeviceLocation, LocationEvent,
    LocationEventReceiver, LocationEventSender, LocationServices, MapRegion, NamedLocation,
    UtcDT, location_events,
};
pub use post::{Post, parse_feed};
pub use prompt::{Choice, ChoiceHandler, Presenter, Prompt, PromptKind};
pub use provider::{LocationCallback, LocationProvider, ProviderConfig, RequestPhase};
pub use ranking::{EARTH_RADIUS_METERS, distance_meters, rank_by_distance};
pub use timeline::{PostDetail, StateUpdateSender, Timeline};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
