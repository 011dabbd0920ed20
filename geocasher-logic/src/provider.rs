use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    location::{
        AuthorizationState, DeviceLocation, LocationEvent, LocationEventReceiver,
        LocationServices,
    },
    prompt::{Choice, Presenter, Prompt, PromptKind},
};

/// Single-shot continuation for [LocationProvider::request_current_location]
pub type LocationCallback = Box<dyn FnOnce(DeviceLocation) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Where the provider is in getting a location
pub enum RequestPhase {
    /// Nothing in flight
    #[default]
    Idle,
    /// Waiting on the user to answer a prompt
    Prompting(PromptKind),
    /// Waiting on the OS permission prompt
    AwaitingAuthorization,
    /// A location fix has been requested from the OS
    Fetching,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderConfig {
    /// When set, a failed location fetch drops the pending callback and is kept in
    /// [LocationProvider::last_error] instead of being only logged.
    pub surface_fetch_errors: bool,
}

#[derive(Default)]
struct ProviderState {
    phase: RequestPhase,
    pending: Option<LocationCallback>,
    current: Option<DeviceLocation>,
    last_error: Option<String>,
}

/// Gets the device's location, asking the user for permission as needed.
///
/// Two things move the provider along: callers through [Self::request_current_location], and
/// the OS through [LocationEvent]s fed to [Self::handle_event] (usually by [Self::main_loop]).
/// Only one caller is waiting at a time, a new request replaces the previous one's callback
/// without ever calling it.
pub struct LocationProvider<S: LocationServices> {
    services: S,
    config: ProviderConfig,
    state: Mutex<ProviderState>,
    cancel: CancellationToken,
}

impl<S: LocationServices + 'static> LocationProvider<S> {
    pub fn new(services: S, config: ProviderConfig) -> Arc<Self> {
        Arc::new(Self {
            services,
            config,
            state: Mutex::new(ProviderState::default()),
            cancel: CancellationToken::new(),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current location and call `on_received` with it once it arrives.
    ///
    /// Returns immediately. If the user hasn't allowed location access they'll be shown a
    /// prompt through `presenter`, and `on_received` may never be called.
    pub fn request_current_location<P: Presenter + ?Sized>(
        self: &Arc<Self>,
        presenter: &P,
        on_received: impl FnOnce(DeviceLocation) + Send + 'static,
    ) {
        let auth = self.services.authorization_state();

        let mut state = self.lock_state();
        if state.pending.replace(Box::new(on_received)).is_some() {
            debug!("Replacing unresolved location request");
        }

        let kind = match auth {
            AuthorizationState::NotDetermined => PromptKind::Priming,
            AuthorizationState::Restricted => PromptKind::Restricted,
            AuthorizationState::Denied => PromptKind::Denied,
            AuthorizationState::AuthorizedWhenInUse | AuthorizationState::AuthorizedAlways => {
                let should_fetch = Self::begin_fetch(&mut state);
                drop(state);
                if should_fetch {
                    self.services.request_location();
                }
                return;
            }
        };

        state.phase = RequestPhase::Prompting(kind);
        drop(state);

        debug!("Location is {auth:?}, showing {kind:?} prompt");
        let provider = Arc::clone(self);
        presenter.present(
            Prompt::for_kind(kind),
            Box::new(move |choice| provider.handle_choice(choice)),
        );
    }

    /// Move to [RequestPhase::Fetching], returns false if a fetch is already in flight
    fn begin_fetch(state: &mut ProviderState) -> bool {
        if state.phase == RequestPhase::Fetching {
            debug!("Location fetch already in flight");
            false
        } else {
            state.phase = RequestPhase::Fetching;
            true
        }
    }

    fn finish_prompt(state: &mut ProviderState) {
        if matches!(state.phase, RequestPhase::Prompting(_)) {
            state.phase = RequestPhase::Idle;
        }
    }

    fn handle_choice(&self, choice: Choice) {
        let mut state = self.lock_state();
        match choice {
            Choice::Proceed => {
                if state.phase != RequestPhase::Fetching {
                    state.phase = RequestPhase::AwaitingAuthorization;
                }
                drop(state);
                info!("Requesting location authorization");
                self.services.request_authorization();
            }
            Choice::OpenSettings => {
                Self::finish_prompt(&mut state);
                drop(state);
                info!("Opening settings to change location access");
                self.services.open_settings();
            }
            Choice::NotNow | Choice::Acknowledge => {
                Self::finish_prompt(&mut state);
                debug!("User dismissed location prompt ({choice:?})");
            }
        }
    }

    /// Apply a notification from the OS
    pub fn handle_event(&self, event: LocationEvent) {
        match event {
            LocationEvent::AuthorizationChanged(auth) => self.authorization_changed(auth),
            LocationEvent::LocationsUpdated(locations) => self.locations_updated(locations),
            LocationEvent::Failed(why) => self.location_failed(why),
        }
    }

    fn authorization_changed(&self, auth: AuthorizationState) {
        let mut state = self.lock_state();
        if auth.is_authorized() {
            let should_fetch = Self::begin_fetch(&mut state);
            drop(state);
            if should_fetch {
                info!("Location is now {auth:?}, fetching location");
                self.services.request_location();
            }
        } else if state.phase == RequestPhase::AwaitingAuthorization
            && matches!(
                auth,
                AuthorizationState::Denied | AuthorizationState::Restricted
            )
        {
            // Said no to the OS prompt, don't bug them about it again
            state.phase = RequestPhase::Idle;
            info!("User refused location access ({auth:?})");
        }
    }

    fn locations_updated(&self, locations: Vec<DeviceLocation>) {
        let mut state = self.lock_state();
        if state.phase == RequestPhase::Fetching {
            state.phase = RequestPhase::Idle;
        }

        let Some(location) = locations.into_iter().next() else {
            warn!("Location update didn't contain any locations");
            return;
        };

        state.current = Some(location);
        state.last_error = None;
        let callback = state.pending.take();
        drop(state);

        if let Some(callback) = callback {
            callback(location);
        }
    }

    fn location_failed(&self, why: String) {
        warn!("Failed to get location: {why}");
        let mut state = self.lock_state();
        if state.phase == RequestPhase::Fetching {
            state.phase = RequestPhase::Idle;
        }
        if self.config.surface_fetch_errors {
            state.pending = None;
            state.last_error = Some(why);
        }
    }

    /// Handle OS events until the sending side closes or [Self::shutdown] is called
    pub async fn main_loop(&self, mut events: LocationEventReceiver) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break;
                }

                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            debug!("Location event channel closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// The last location we got, if any
    pub fn current_location(&self) -> Option<DeviceLocation> {
        self.lock_state().current
    }

    pub fn phase(&self) -> RequestPhase {
        self.lock_state().phase
    }

    pub fn has_pending_request(&self) -> bool {
        self.lock_state().pending.is_some()
    }

    /// Most recent fetch error, only recorded when [ProviderConfig::surface_fetch_errors] is set
    pub fn last_error(&self) -> Option<String> {
        self.lock_state().last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use tokio::task::yield_now;

    use super::*;
    use crate::{
        location::{Coordinate, location_events},
        tests::{MockLocationServices, MockPresenter, ServiceCall},
    };

    type TestProvider = LocationProvider<MockLocationServices>;

    fn mk_provider(auth: AuthorizationState) -> Arc<TestProvider> {
        TestProvider::new(MockLocationServices::new(auth), ProviderConfig::default())
    }

    fn fix(lat: f64, long: f64) -> DeviceLocation {
        DeviceLocation::new(Coordinate::new(lat, long))
    }

    /// Records which callbacks were called, and with what
    #[derive(Default, Clone)]
    struct Received(Arc<Mutex<Vec<(&'static str, DeviceLocation)>>>);

    impl Received {
        fn callback(&self, tag: &'static str) -> impl FnOnce(DeviceLocation) + Send + 'static {
            let inner = self.0.clone();
            move |loc| inner.lock().unwrap().push((tag, loc))
        }

        fn get(&self) -> Vec<(&'static str, DeviceLocation)> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_authorized_fetches_and_delivers_first() {
        let provider = mk_provider(AuthorizationState::AuthorizedWhenInUse);
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));

        assert!(presenter.shown().is_empty(), "No prompt should be shown");
        assert_eq!(provider.services.calls(), [ServiceCall::RequestLocation]);
        assert_eq!(provider.phase(), RequestPhase::Fetching);

        let (first, second) = (fix(1.0, 2.0), fix(3.0, 4.0));
        provider.handle_event(LocationEvent::LocationsUpdated(vec![first, second]));

        assert_eq!(received.get(), [("a", first)]);
        assert_eq!(provider.current_location(), Some(first));
        assert_eq!(provider.phase(), RequestPhase::Idle);
        assert!(!provider.has_pending_request());
    }

    #[test]
    fn test_second_request_orphans_first() {
        let provider = mk_provider(AuthorizationState::AuthorizedAlways);
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("first"));
        provider.request_current_location(&presenter, received.callback("second"));

        // Second request piggybacks on the fetch already in flight
        assert_eq!(provider.services.count(ServiceCall::RequestLocation), 1);

        let loc = fix(5.0, 5.0);
        provider.handle_event(LocationEvent::LocationsUpdated(vec![loc]));

        assert_eq!(received.get(), [("second", loc)]);
    }

    #[test]
    fn test_late_delivery_only_updates_cache() {
        let provider = mk_provider(AuthorizationState::AuthorizedAlways);
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));

        let (first, late) = (fix(1.0, 1.0), fix(2.0, 2.0));
        provider.handle_event(LocationEvent::LocationsUpdated(vec![first]));
        provider.handle_event(LocationEvent::LocationsUpdated(vec![late]));

        assert_eq!(received.get(), [("a", first)]);
        assert_eq!(provider.current_location(), Some(late));
    }

    #[test]
    fn test_priming_then_grant() {
        let provider = mk_provider(AuthorizationState::NotDetermined);
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));

        let shown = presenter.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].kind, PromptKind::Priming);
        assert_eq!(
            provider.services.calls(),
            [ServiceCall::RequestAuthorization]
        );
        assert_eq!(provider.phase(), RequestPhase::AwaitingAuthorization);
        assert!(received.get().is_empty());

        provider.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::AuthorizedWhenInUse,
        ));

        assert_eq!(
            provider.services.calls(),
            [ServiceCall::RequestAuthorization, ServiceCall::RequestLocation]
        );

        let loc = fix(10.0, 20.0);
        provider.handle_event(LocationEvent::LocationsUpdated(vec![loc]));
        assert_eq!(received.get(), [("a", loc)]);
    }

    #[test]
    fn test_priming_not_now() {
        let provider = mk_provider(AuthorizationState::NotDetermined);
        let presenter = MockPresenter::answering(Choice::NotNow);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));

        assert_eq!(presenter.shown()[0].kind, PromptKind::Priming);
        assert!(provider.services.calls().is_empty());
        assert_eq!(provider.phase(), RequestPhase::Idle);
        assert!(received.get().is_empty());
    }

    #[test]
    fn test_refused_at_os_prompt() {
        let provider = mk_provider(AuthorizationState::NotDetermined);
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));
        provider.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::Denied,
        ));

        assert_eq!(provider.phase(), RequestPhase::Idle);
        assert_eq!(presenter.shown().len(), 1, "User was prompted again");
        assert_eq!(
            provider.services.calls(),
            [ServiceCall::RequestAuthorization]
        );
        assert!(received.get().is_empty());
    }

    #[test]
    fn test_restricted_only_informs() {
        let provider = mk_provider(AuthorizationState::Restricted);
        let presenter = MockPresenter::answering(Choice::Acknowledge);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));

        let shown = presenter.shown();
        assert_eq!(shown[0].kind, PromptKind::Restricted);
        assert_eq!(shown[0].choices, [Choice::Acknowledge]);
        assert!(provider.services.calls().is_empty());
        assert_eq!(provider.phase(), RequestPhase::Idle);
        assert!(received.get().is_empty());
    }

    #[test]
    fn test_denied_open_settings_then_granted() {
        let provider = mk_provider(AuthorizationState::Denied);
        let presenter = MockPresenter::answering(Choice::OpenSettings);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));

        assert_eq!(presenter.shown()[0].kind, PromptKind::Denied);
        assert_eq!(provider.services.calls(), [ServiceCall::OpenSettings]);

        // User flips the switch in settings and comes back
        provider.services.set_auth(AuthorizationState::AuthorizedWhenInUse);
        provider.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::AuthorizedWhenInUse,
        ));

        assert_eq!(
            provider.services.calls(),
            [ServiceCall::OpenSettings, ServiceCall::RequestLocation]
        );

        let loc = fix(-1.0, -1.0);
        provider.handle_event(LocationEvent::LocationsUpdated(vec![loc]));
        assert_eq!(received.get(), [("a", loc)]);
    }

    #[test]
    fn test_denied_then_authorized_without_answer() {
        let provider = mk_provider(AuthorizationState::Denied);
        let presenter = MockPresenter::deferred();
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));
        assert_eq!(provider.phase(), RequestPhase::Prompting(PromptKind::Denied));

        provider.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::AuthorizedWhenInUse,
        ));

        assert_eq!(provider.services.calls(), [ServiceCall::RequestLocation]);
        assert_eq!(provider.phase(), RequestPhase::Fetching);

        // Answering the stale prompt doesn't knock us out of fetching
        presenter.answer(Choice::NotNow);
        assert_eq!(provider.phase(), RequestPhase::Fetching);
    }

    #[test]
    fn test_authorization_change_while_fetching() {
        let provider = mk_provider(AuthorizationState::AuthorizedAlways);
        let presenter = MockPresenter::answering(Choice::Proceed);

        provider.request_current_location(&presenter, |_| {});
        provider.handle_event(LocationEvent::AuthorizationChanged(
            AuthorizationState::AuthorizedAlways,
        ));

        assert_eq!(provider.services.count(ServiceCall::RequestLocation), 1);
    }

    #[test]
    fn test_fetch_error_is_silent() {
        let provider = mk_provider(AuthorizationState::AuthorizedWhenInUse);
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));
        provider.handle_event(LocationEvent::Failed("kCLErrorLocationUnknown".into()));

        assert!(received.get().is_empty());
        assert_eq!(provider.services.count(ServiceCall::RequestLocation), 1);
        assert_eq!(provider.phase(), RequestPhase::Idle);
        assert_eq!(provider.last_error(), None);
        assert!(provider.has_pending_request());

        // A later fix still reaches the waiting caller
        let loc = fix(0.5, 0.5);
        provider.handle_event(LocationEvent::LocationsUpdated(vec![loc]));
        assert_eq!(received.get(), [("a", loc)]);
    }

    #[test]
    fn test_fetch_error_surfaced_when_configured() {
        let provider = TestProvider::new(
            MockLocationServices::new(AuthorizationState::AuthorizedWhenInUse),
            ProviderConfig {
                surface_fetch_errors: true,
            },
        );
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));
        provider.handle_event(LocationEvent::Failed("timed out".into()));

        assert_eq!(provider.last_error().as_deref(), Some("timed out"));
        assert!(!provider.has_pending_request());

        provider.handle_event(LocationEvent::LocationsUpdated(vec![fix(1.0, 1.0)]));
        assert!(received.get().is_empty());
    }

    #[test]
    fn test_fix_clears_last_error() {
        let provider = TestProvider::new(
            MockLocationServices::new(AuthorizationState::AuthorizedWhenInUse),
            ProviderConfig {
                surface_fetch_errors: true,
            },
        );
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));
        provider.handle_event(LocationEvent::Failed("timed out".into()));
        assert!(provider.last_error().is_some());

        provider.request_current_location(&presenter, received.callback("b"));
        let here = fix(2.0, 3.0);
        provider.handle_event(LocationEvent::LocationsUpdated(vec![here]));

        assert_eq!(provider.last_error(), None);
        assert_eq!(received.get(), [("b", here)]);
    }

    #[test]
    fn test_empty_batch_ignored() {
        let provider = mk_provider(AuthorizationState::AuthorizedWhenInUse);
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();

        provider.request_current_location(&presenter, received.callback("a"));
        provider.handle_event(LocationEvent::LocationsUpdated(vec![]));

        assert!(received.get().is_empty());
        assert_eq!(provider.current_location(), None);
        assert_eq!(provider.phase(), RequestPhase::Idle);
    }

    #[tokio::test]
    async fn test_main_loop_applies_events() {
        let provider = mk_provider(AuthorizationState::NotDetermined);
        let presenter = MockPresenter::answering(Choice::Proceed);
        let received = Received::default();
        let (tx, rx) = location_events();

        let handle = tokio::spawn({
            let provider = provider.clone();
            async move { provider.main_loop(rx).await }
        });

        provider.request_current_location(&presenter, received.callback("a"));

        let loc = fix(7.0, 8.0);
        tx.send(LocationEvent::AuthorizationChanged(
            AuthorizationState::AuthorizedWhenInUse,
        ))
        .unwrap();
        tx.send(LocationEvent::LocationsUpdated(vec![loc])).unwrap();

        while received.get().is_empty() {
            yield_now().await;
        }

        assert_eq!(received.get(), [("a", loc)]);

        provider.shutdown();
        handle.await.expect("Main loop panicked");
    }

    #[tokio::test]
    async fn test_main_loop_exits_when_senders_dropped() {
        let provider = mk_provider(AuthorizationState::NotDetermined);
        let (tx, rx) = location_events();
        drop(tx);
        provider.main_loop(rx).await;
    }
}
