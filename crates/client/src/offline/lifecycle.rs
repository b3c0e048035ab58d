//! Install/activate sequencing for one worker instance.
//!
//! | Phase | Fetch handling | Next |
//! |-------|----------------|------|
//! | Parsed | previous build | Installing |
//! | Installing | previous build | Installed, or Redundant on failure |
//! | Installed | previous build | Activating |
//! | Activating | held until the phase settles | Active, or back to Installed on failure |
//! | Active | this build's cache strategies | terminal |
//! | Redundant | previous build | terminal |
//!
//! "Previous build" is a router bound to the tag recorded by the last
//! successful activation. With no such tag the request goes straight to the
//! network.

use std::sync::Arc;

use async_trait::async_trait;
use quire_core::{AppConfig, Error, Storage};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};

use super::WorkerEvent;
use super::bucket::{BucketManager, CacheRole, PopulateReport};
use super::router::{FetchRouter, ShellManifest};
use crate::fetch::{Network, Request, Response};

/// Background-sync tag for flushing form submissions queued while offline.
pub const SYNC_SUBMISSIONS_TAG: &str = "sync-submissions";

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Parsed => "parsed",
            Phase::Installing => "installing",
            Phase::Installed => "installed",
            Phase::Activating => "activating",
            Phase::Active => "active",
            Phase::Redundant => "redundant",
        }
    }
}

/// Flushes mutations queued while offline. The queue itself lives elsewhere.
#[async_trait]
pub trait SyncHook: Send + Sync {
    async fn flush(&self, tag: &str) -> Result<(), Error>;
}

/// Sync hook for hosts without an offline queue.
pub struct NoopSync;

#[async_trait]
impl SyncHook for NoopSync {
    async fn flush(&self, tag: &str) -> Result<(), Error> {
        tracing::debug!(tag, "no offline queue configured, nothing to sync");
        Ok(())
    }
}

/// Binds the running build's cache generations to request handling.
pub struct LifecycleController {
    buckets: BucketManager,
    router: FetchRouter,
    network: Arc<dyn Network>,
    shell: ShellManifest,
    sync: Arc<dyn SyncHook>,
    previous: Mutex<Option<Arc<FetchRouter>>>,
    phase: watch::Sender<Phase>,
    transition: Mutex<()>,
    events: broadcast::Sender<WorkerEvent>,
}

impl LifecycleController {
    pub fn new(
        storage: Arc<dyn Storage>, network: Arc<dyn Network>, shell: ShellManifest, version_tag: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (phase, _) = watch::channel(Phase::Parsed);
        let buckets = BucketManager::new(storage, version_tag);
        let router = FetchRouter::new(buckets.clone(), network.clone(), shell.clone(), events.clone());

        Self {
            buckets,
            router,
            network,
            shell,
            sync: Arc::new(NoopSync),
            previous: Mutex::new(None),
            phase,
            transition: Mutex::new(()),
            events,
        }
    }

    pub fn from_config(storage: Arc<dyn Storage>, network: Arc<dyn Network>, config: &AppConfig) -> Result<Self, Error> {
        let shell = ShellManifest::from_config(config)?;
        Ok(Self::new(storage, network, shell, config.cache_version.clone()))
    }

    pub fn with_sync_hook(mut self, hook: Arc<dyn SyncHook>) -> Self {
        self.sync = hook;
        self
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Receive lifecycle, connectivity and sync notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    pub fn version_tag(&self) -> &str {
        self.buckets.current_tag()
    }

    pub fn buckets(&self) -> &BucketManager {
        &self.buckets
    }

    pub fn router(&self) -> &FetchRouter {
        &self.router
    }

    pub fn shell(&self) -> &ShellManifest {
        &self.shell
    }

    fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        tracing::info!(version = %self.version_tag(), from = ?previous, to = ?phase, "lifecycle transition");
    }

    /// Pre-cache the shell into the static generation.
    ///
    /// Per-resource failures are tolerated and reported. A failure to create
    /// or write the generation makes this controller `Redundant`; the previous
    /// generation keeps serving.
    pub async fn on_install(&self) -> Result<PopulateReport, Error> {
        let _guard = self.transition.lock().await;
        let phase = self.phase();
        if phase != Phase::Parsed {
            return Err(Error::InvalidState(format!("cannot install from {phase:?}")));
        }

        self.set_phase(Phase::Installing);
        let report = match self.install().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(version = %self.version_tag(), error = %e, "install failed");
                self.set_phase(Phase::Redundant);
                return Err(Error::InstallFailed(e.to_string()));
            }
        };
        self.set_phase(Phase::Installed);

        let version_tag = self.version_tag().to_string();
        let _ = self
            .events
            .send(WorkerEvent::Installed { version_tag: version_tag.clone(), cached: report.stored.len() });

        match self.buckets.generations().await {
            Ok(generations) if generations.iter().any(|g| g.version_tag != version_tag) => {
                let _ = self.events.send(WorkerEvent::UpdateAvailable { version_tag });
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "could not check for older generations"),
        }

        Ok(report)
    }

    async fn install(&self) -> Result<PopulateReport, Error> {
        let resources = self.shell.requests()?;
        let generation = self.buckets.ensure(CacheRole::Static, self.version_tag()).await?;
        self.buckets.populate(&generation, &resources, self.network.as_ref()).await
    }

    /// Retire every generation left over from other versions, then take control.
    ///
    /// Returns the names of the retired generations.
    pub async fn on_activate(&self) -> Result<Vec<String>, Error> {
        let _guard = self.transition.lock().await;
        let phase = self.phase();
        if phase != Phase::Installed {
            return Err(Error::InvalidState(format!("cannot activate from {phase:?}")));
        }

        self.set_phase(Phase::Activating);
        let mut retired = Vec::new();
        for role in CacheRole::ALL {
            match self.buckets.retire_stale(role, self.version_tag()).await {
                Ok(names) => retired.extend(names),
                Err(e) => {
                    tracing::error!(version = %self.version_tag(), error = %e, "activation failed");
                    self.set_phase(Phase::Installed);
                    return Err(e);
                }
            }
        }
        if let Err(e) = self.buckets.mark_active().await {
            tracing::error!(version = %self.version_tag(), error = %e, "could not record active version");
            self.set_phase(Phase::Installed);
            return Err(e);
        }
        self.set_phase(Phase::Active);

        let _ = self
            .events
            .send(WorkerEvent::Activated { version_tag: self.version_tag().to_string(), retired: retired.clone() });

        Ok(retired)
    }

    /// Answer a page request.
    pub async fn on_fetch(&self, request: &Request) -> Result<Response, Error> {
        let mut phase = self.phase();
        if phase == Phase::Activating {
            let mut watch = self.phase.subscribe();
            phase = *watch
                .wait_for(|p| *p != Phase::Activating)
                .await
                .map_err(|e| Error::InvalidState(e.to_string()))?;
        }

        if phase == Phase::Active {
            return self.router.handle(request).await;
        }

        match self.previous_router().await {
            Ok(Some(router)) => router.handle(request).await,
            Ok(None) => self.network.fetch(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "could not read active version, using network");
                self.network.fetch(request).await
            }
        }
    }

    /// Router for the build that was active before this one, if any.
    async fn previous_router(&self) -> Result<Option<Arc<FetchRouter>>, Error> {
        let Some(tag) = self.buckets.active_tag().await? else {
            return Ok(None);
        };

        let mut previous = self.previous.lock().await;
        if let Some(router) = previous.as_ref().filter(|r| r.version_tag() == tag) {
            return Ok(Some(router.clone()));
        }

        tracing::debug!(version = %tag, "serving from previously active version");
        let router = Arc::new(FetchRouter::new(
            self.buckets.for_tag(tag),
            self.network.clone(),
            self.shell.clone(),
            self.events.clone(),
        ));
        *previous = Some(router.clone());
        Ok(Some(router))
    }

    /// Handle a background-sync wake-up. Returns whether the tag was handled.
    pub async fn on_sync(&self, tag: &str) -> Result<bool, Error> {
        if tag != SYNC_SUBMISSIONS_TAG || self.phase() != Phase::Active {
            tracing::debug!(tag, phase = ?self.phase(), "ignoring background sync");
            return Ok(false);
        }

        tracing::info!(tag, "background sync");
        let _ = self.events.send(WorkerEvent::SyncRequested { tag: tag.to_string() });
        self.sync.flush(tag).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::bucket::Generation;
    use crate::offline::testing::{FakeNetwork, shell, url};
    use quire_core::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn network() -> Arc<FakeNetwork> {
        Arc::new(
            FakeNetwork::new()
                .with_route("/", Response::new(200, "<html>home</html>"))
                .with_route("/static/css/main.css", Response::new(200, "css"))
                .with_route("/admin", Response::new(200, "<html>admin</html>"))
                .with_route("/offline", Response::new(200, "<html>offline</html>")),
        )
    }

    fn controller(storage: &MemoryStorage, network: Arc<FakeNetwork>, tag: &str) -> LifecycleController {
        LifecycleController::new(Arc::new(storage.clone()), network, shell(), tag)
    }

    /// Holds every fetch until permits are added.
    struct GatedNetwork {
        inner: Arc<FakeNetwork>,
        gate: Semaphore,
    }

    #[async_trait]
    impl Network for GatedNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            let _permit = self.gate.acquire().await.map_err(|e| Error::Network(e.to_string()))?;
            self.inner.fetch(request).await
        }
    }

    async fn activated(storage: &MemoryStorage, network: Arc<FakeNetwork>, tag: &str) -> LifecycleController {
        let controller = controller(storage, network, tag);
        controller.on_install().await.unwrap();
        controller.on_activate().await.unwrap();
        controller
    }

    struct CountingSync(AtomicUsize);

    #[async_trait]
    impl SyncHook for CountingSync {
        async fn flush(&self, _tag: &str) -> Result<(), Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Storage that rejects every write.
    struct ReadOnlyStorage;

    #[async_trait]
    impl Storage for ReadOnlyStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, Error> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), Error> {
            Err(Error::Storage("quota exceeded".into()))
        }

        async fn delete(&self, _key: &str) -> Result<bool, Error> {
            Ok(false)
        }

        async fn keys(&self, _prefix: &str) -> Result<Vec<String>, Error> {
            Ok(Vec::new())
        }

        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, Error> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let storage = MemoryStorage::new();
        let controller = controller(&storage, network(), "v2");
        let mut events = controller.subscribe();
        assert_eq!(controller.phase(), Phase::Parsed);

        let report = controller.on_install().await.unwrap();
        assert_eq!(report.stored.len(), 4);
        assert_eq!(controller.phase(), Phase::Installed);

        let retired = controller.on_activate().await.unwrap();
        assert!(retired.is_empty());
        assert_eq!(controller.phase(), Phase::Active);
        assert_eq!(controller.buckets().active_tag().await.unwrap().as_deref(), Some("v2"));

        assert_eq!(events.try_recv().unwrap(), WorkerEvent::Installed { version_tag: "v2".into(), cached: 4 });
        assert_eq!(events.try_recv().unwrap(), WorkerEvent::Activated { version_tag: "v2".into(), retired: vec![] });
    }

    #[tokio::test]
    async fn test_install_tolerates_resource_failures() {
        let storage = MemoryStorage::new();
        let network = network();
        network.fail_route("/admin");
        let controller = controller(&storage, network, "v2");

        let report = controller.on_install().await.unwrap();
        assert_eq!(report.stored.len(), 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(controller.phase(), Phase::Installed);
    }

    #[tokio::test]
    async fn test_install_storage_failure_is_redundant() {
        let controller = LifecycleController::new(Arc::new(ReadOnlyStorage), network(), shell(), "v2");

        let err = controller.on_install().await.unwrap_err();
        assert!(matches!(err, Error::InstallFailed(_)));
        assert_eq!(controller.phase(), Phase::Redundant);

        assert!(matches!(controller.on_activate().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let storage = MemoryStorage::new();
        let controller = controller(&storage, network(), "v2");
        assert!(matches!(controller.on_activate().await, Err(Error::InvalidState(_))));
        assert_eq!(controller.phase(), Phase::Parsed);
    }

    #[tokio::test]
    async fn test_new_version_retires_old_generations() {
        let storage = MemoryStorage::new();
        let net = network();

        let old = controller(&storage, net.clone(), "v1");
        old.on_install().await.unwrap();
        old.on_activate().await.unwrap();

        let new = controller(&storage, net, "v2");
        let mut events = new.subscribe();
        new.on_install().await.unwrap();
        assert!(matches!(events.try_recv().unwrap(), WorkerEvent::Installed { .. }));
        assert_eq!(events.try_recv().unwrap(), WorkerEvent::UpdateAvailable { version_tag: "v2".into() });

        let mut retired = new.on_activate().await.unwrap();
        retired.sort();
        assert_eq!(retired, vec!["v1-static".to_string()]);

        let remaining = new.buckets().generations().await.unwrap();
        assert_eq!(remaining, vec![Generation::new(CacheRole::Static, "v2")]);
    }

    #[tokio::test]
    async fn test_retires_every_role() {
        let storage = MemoryStorage::new();
        let network = network();
        network.set_route("/api/forms", Response::new(200, "[]"));
        network.set_route("/img/logo.png", Response::new(200, "png"));

        let old = controller(&storage, network.clone(), "v1");
        old.on_install().await.unwrap();
        old.on_activate().await.unwrap();
        old.on_fetch(&Request::get(url("/api/forms"))).await.unwrap();
        old.on_fetch(&Request::get(url("/img/logo.png"))).await.unwrap();

        let new = controller(&storage, network, "v2");
        new.on_install().await.unwrap();
        let mut retired = new.on_activate().await.unwrap();
        retired.sort();
        assert_eq!(retired, vec!["v1-dynamic".to_string(), "v1-images".to_string(), "v1-static".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_without_active_version_uses_network() {
        let storage = MemoryStorage::new();
        let network = network();
        let controller = controller(&storage, network.clone(), "v2");
        controller.on_install().await.unwrap();

        network.set_offline(true);
        let result = controller.on_fetch(&Request::get(url("/static/css/main.css"))).await;
        assert!(matches!(result, Err(Error::Network(_))));

        controller.on_activate().await.unwrap();
        let response = controller.on_fetch(&Request::get(url("/static/css/main.css"))).await.unwrap();
        assert_eq!(response.text(), "css");
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_version_serving() {
        let storage = MemoryStorage::new();
        let network = network();
        activated(&storage, network.clone(), "v1").await;

        let broken = ShellManifest::new(
            shell().origin().clone(),
            vec!["/static/css/main.css".into(), "mailto:ops@app.test".into()],
            "/offline",
            "/static/",
        );
        let new = LifecycleController::new(Arc::new(storage.clone()), network.clone(), broken, "v2");
        assert!(matches!(new.on_install().await, Err(Error::InstallFailed(_))));
        assert_eq!(new.phase(), Phase::Redundant);
        assert_eq!(new.buckets().generations().await.unwrap(), vec![Generation::new(CacheRole::Static, "v1")]);

        network.set_offline(true);
        let response = new.on_fetch(&Request::get(url("/static/css/main.css"))).await.unwrap();
        assert_eq!(response.text(), "css");

        let page = new.on_fetch(&Request::navigate(url("/reports"))).await.unwrap();
        assert_eq!(page.text(), "<html>offline</html>");
    }

    #[tokio::test]
    async fn test_fetch_during_install_served_by_previous_version() {
        let storage = MemoryStorage::new();
        let network = network();
        activated(&storage, network.clone(), "v1").await;

        let gated = Arc::new(GatedNetwork { inner: network.clone(), gate: Semaphore::new(0) });
        let new = Arc::new(LifecycleController::new(Arc::new(storage.clone()), gated.clone(), shell(), "v2"));
        let mut phase = new.watch_phase();
        let install = tokio::spawn({
            let new = new.clone();
            async move { new.on_install().await }
        });

        phase.wait_for(|p| *p == Phase::Installing).await.unwrap();
        network.set_offline(true);

        let response = new.on_fetch(&Request::get(url("/static/css/main.css"))).await.unwrap();
        assert_eq!(response.text(), "css");
        assert_eq!(new.phase(), Phase::Installing);

        gated.gate.add_permits(16);
        let report = install.await.unwrap().unwrap();
        assert_eq!(report.failed.len(), 4);
        assert_eq!(new.phase(), Phase::Installed);

        let response = new.on_fetch(&Request::get(url("/admin"))).await.unwrap();
        assert_eq!(response.text(), "<html>admin</html>");
    }

    #[tokio::test]
    async fn test_background_sync_only_when_active() {
        let storage = MemoryStorage::new();
        let hook = Arc::new(CountingSync(AtomicUsize::new(0)));
        let controller = controller(&storage, network(), "v2").with_sync_hook(hook.clone());

        assert!(!controller.on_sync(SYNC_SUBMISSIONS_TAG).await.unwrap());

        controller.on_install().await.unwrap();
        controller.on_activate().await.unwrap();

        assert!(controller.on_sync(SYNC_SUBMISSIONS_TAG).await.unwrap());
        assert!(!controller.on_sync("update-content").await.unwrap());
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_phase_watch() {
        let storage = MemoryStorage::new();
        let controller = controller(&storage, network(), "v2");
        let watch = controller.watch_phase();

        controller.on_install().await.unwrap();
        assert_eq!(*watch.borrow(), Phase::Installed);
    }
}
