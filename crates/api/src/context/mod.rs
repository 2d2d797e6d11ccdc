//! Application context - dependency injection container

use std::sync::Arc;

use memberdesk_common::{Clock, SystemClock};
use memberdesk_core::session::{ExpiryConfig, IdleConfig, RenewalConfig};
use memberdesk_core::{
    ActivitySender, AuthApi, AuthorizedClient, ExpirationNotifier, IdleWatchdog,
    ProactiveRenewalScheduler, RefreshCoordinator, RemoteAuthApi, SchedulerError,
    SchedulerResult, SessionNotifier, SessionPersistence, SessionService, SessionStore,
    Transport,
};
use memberdesk_domain::{Config, Result};
use memberdesk_infra::{persistence, HttpTransport, TracingNotifier};
use tracing::{info, instrument, warn};

/// Application context - holds all services and components
pub struct AppContext {
    pub config: Config,

    // Session state and use cases
    pub store: Arc<SessionStore>,
    pub session: Arc<SessionService>,
    pub client: Arc<AuthorizedClient>,
    pub coordinator: Arc<RefreshCoordinator>,

    // Timer-driven components
    pub renewal: Arc<ProactiveRenewalScheduler>,
    pub idle: Arc<IdleWatchdog>,
    pub expiry: Arc<ExpirationNotifier>,
}

impl AppContext {
    /// Create the context with log-backed notices
    ///
    /// # Errors
    /// Returns an error if the persistence backend or the HTTP transport can
    /// not be built, or a component fails to start.
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_notifier(config, Arc::new(TracingNotifier::new())).await
    }

    /// Create the context with a host-provided notifier (UI layer)
    ///
    /// # Errors
    /// See [`AppContext::new`].
    pub async fn with_notifier(
        config: Config,
        notifier: Arc<dyn SessionNotifier>,
    ) -> Result<Self> {
        config.validate()?;
        let persistence = persistence::from_config(&config.persistence)?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(&config.api)?);
        Self::assemble(config, persistence, transport, notifier, Arc::new(SystemClock)).await
    }

    /// Wire every component from explicit adapters and start them
    ///
    /// # Errors
    /// Returns an error if a component fails to start.
    #[instrument(skip_all)]
    pub async fn assemble(
        config: Config,
        persistence: Arc<dyn SessionPersistence>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn SessionNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Arc::new(SessionStore::restore(persistence, clock).await);

        let api: Arc<dyn AuthApi> =
            Arc::new(RemoteAuthApi::new(transport.clone(), store.clone()));
        let coordinator =
            Arc::new(RefreshCoordinator::new(store.clone(), api.clone(), notifier.clone()));
        let client = Arc::new(AuthorizedClient::new(
            transport,
            store.clone(),
            coordinator.clone(),
            config.session.retry_ledger_ttl(),
        ));
        let session = Arc::new(SessionService::new(
            store.clone(),
            api,
            client.clone(),
            notifier.clone(),
        ));

        let renewal = Arc::new(ProactiveRenewalScheduler::new(
            store.clone(),
            coordinator.clone(),
            RenewalConfig::from(&config.session),
        ));
        let idle = Arc::new(IdleWatchdog::new(
            store.clone(),
            notifier.clone(),
            IdleConfig::from(&config.session),
        ));
        let expiry = Arc::new(ExpirationNotifier::new(
            store.clone(),
            notifier,
            ExpiryConfig::from(&config.session),
        ));

        let ctx = Self { config, store, session, client, coordinator, renewal, idle, expiry };
        ctx.start_components()?;

        info!(
            authenticated = ctx.store.is_authenticated(),
            idle_enabled = ctx.config.session.idle_enabled,
            "Application context ready"
        );
        Ok(ctx)
    }

    fn start_components(&self) -> Result<()> {
        self.renewal.start()?;
        self.expiry.start()?;
        if self.config.session.idle_enabled {
            self.idle.start()?;
        } else {
            info!("Idle watchdog disabled by configuration");
        }
        Ok(())
    }

    /// Handle the UI layer uses to report user activity
    pub fn activity_sender(&self) -> ActivitySender {
        self.idle.activity_sender()
    }

    /// Stop every running component
    ///
    /// The session itself is left as is, so the next start restores it.
    /// Safe to call more than once.
    ///
    /// # Errors
    /// Returns the first stop failure after attempting every component.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");

        let mut first_error = None;
        if self.renewal.is_running() {
            record_stop("renewal-scheduler", self.renewal.stop().await, &mut first_error);
        }
        if self.idle.is_running() {
            record_stop("idle-watchdog", self.idle.stop().await, &mut first_error);
        }
        if self.expiry.is_running() {
            record_stop("expiration-notifier", self.expiry.stop().await, &mut first_error);
        }

        first_error.map_or(Ok(()), |err| Err(err.into()))
    }
}

fn record_stop(
    component: &'static str,
    stopped: SchedulerResult<()>,
    first_error: &mut Option<SchedulerError>,
) {
    match stopped {
        Ok(()) => info!(component, "component_stopped"),
        Err(err) => {
            warn!(component, error = %err, "Component failed to stop");
            first_error.get_or_insert(err);
        }
    }
}
