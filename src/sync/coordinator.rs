//! Sync status coordinator.
//!
//! A background task that watches the [`Store`] and decides when the
//! [`SyncEngine`] runs:
//! - sign-in: merge, apply the winner, then follow the remote document
//! - sign-out: stop following and drop pending uploads
//! - level edits: debounced upload of the latest content
//! - pushes: applied when newer than the last server stamp this session saw
//!
//! Remote `lastModified` values are store time and local ones are device
//! time, so pushes are never ordered against the local clock. Every status
//! change is written back through `SetSyncStatus`.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::scheduler::{Outcome, Step};
use super::{
    AutoSync, NetworkStatus, SyncConfig, SyncEngine, SyncError, SyncResult, UploadScheduler,
};
use crate::config::{Config, ConfigError, ConfigResult, ENV_REMOTE_URL};
use crate::levels::{LevelContent, LevelSnapshot, Millis};
use crate::remote::HttpDocumentStore;
use crate::state::{Action, AppState, Store, SyncStatus, UserId};

/// Results of background work, tagged with the session they belong to
enum Event {
    Merged {
        generation: u64,
        result: SyncResult<LevelSnapshot>,
    },
    Pushed {
        generation: u64,
        snapshot: LevelSnapshot,
    },
    SubscriptionFailed {
        generation: u64,
        error: SyncError,
    },
    Uploaded {
        generation: u64,
        content: LevelContent,
        result: SyncResult<Option<Millis>>,
    },
}

impl Event {
    fn generation(&self) -> u64 {
        match self {
            Event::Merged { generation, .. }
            | Event::Pushed { generation, .. }
            | Event::SubscriptionFailed { generation, .. }
            | Event::Uploaded { generation, .. } => *generation,
        }
    }
}

pub struct SyncCoordinator {
    store: Arc<Store>,
    engine: SyncEngine,
    auto_sync: AutoSync,
    network: NetworkStatus,
    scheduler: UploadScheduler,
    /// Level content already accounted for
    baseline: LevelContent,
    user: Option<UserId>,
    initialized: bool,
    /// Local levels handed to the sign-in merge
    merge_input: Option<LevelSnapshot>,
    /// Newest server stamp seen this session
    acknowledged: Option<Millis>,
    /// Content of our latest write, until a foreign push replaces it
    sent: Option<LevelContent>,
    /// Bumped on every user change; older results are dropped
    generation: u64,
    events_tx: mpsc::UnboundedSender<Event>,
}

/// Handle to a running coordinator
#[derive(Debug)]
pub struct CoordinatorHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Stop the coordinator and wait for it to wind down
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Sync coordinator task failed: {}", e);
        }
    }
}

impl SyncCoordinator {
    /// Start coordinating sync for `store` on the current runtime
    pub fn spawn(
        store: Arc<Store>,
        engine: SyncEngine,
        network: NetworkStatus,
        config: SyncConfig,
    ) -> CoordinatorHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let baseline = store.state().level_content();
        let coordinator = Self {
            auto_sync: engine.auto_sync(),
            store,
            engine,
            network,
            scheduler: UploadScheduler::new(config),
            baseline,
            user: None,
            initialized: false,
            merge_input: None,
            acknowledged: None,
            sent: None,
            generation: 0,
            events_tx,
        };

        let task = tokio::spawn(coordinator.run(events_rx, shutdown_rx));
        CoordinatorHandle { shutdown_tx, task }
    }

    /// Sync against the hosted store at `WORDPLAY_REMOTE_URL` with the
    /// configured timings
    pub fn from_config(
        config: &Config,
        store: Arc<Store>,
        network: NetworkStatus,
    ) -> ConfigResult<CoordinatorHandle> {
        let url = config
            .remote_url
            .as_deref()
            .ok_or(ConfigError::Missing(ENV_REMOTE_URL))?;
        info!("Syncing levels with {}", url);

        let engine = SyncEngine::new(Arc::new(HttpDocumentStore::new(url)));
        Ok(Self::spawn(store, engine, network, config.sync.clone()))
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<Event>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut changes = self.store.subscribe();
        let mut online = self.network.subscribe();

        let initial = changes.borrow_and_update().clone();
        self.on_state(&initial);

        loop {
            let deadline = self.scheduler.next_deadline();

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Sync coordinator shutting down");
                    break;
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = changes.borrow_and_update().clone();
                    self.on_state(&state);
                }
                Some(event) = events.recv() => {
                    self.on_event(event);
                }
                changed = online.changed() => {
                    if changed.is_ok() && *online.borrow_and_update() {
                        debug!("Network restored");
                        self.scheduler.network_restored(Instant::now());
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
            }

            let steps = self
                .scheduler
                .poll(Instant::now(), self.network.is_offline());
            self.run_steps(steps);
        }

        self.auto_sync.disable();
        self.scheduler.cancel();
    }

    fn on_state(&mut self, state: &AppState) {
        if state.user_id != self.user {
            self.on_user_changed(state);
            return;
        }

        if self.user.is_none() || !self.initialized {
            return;
        }

        let content = state.level_content();
        if content != self.baseline {
            debug!("Level content changed, scheduling upload");
            self.baseline = content;
            self.scheduler.content_changed(Instant::now());
        }
    }

    fn on_user_changed(&mut self, state: &AppState) {
        self.generation += 1;
        self.auto_sync.disable();
        self.scheduler.cancel();
        self.initialized = false;
        self.acknowledged = None;
        self.sent = None;
        self.merge_input = None;
        self.user = state.user_id.clone();
        self.baseline = state.level_content();

        let user = match &self.user {
            Some(user) => user.clone(),
            None => {
                info!("Signed out, level sync stopped");
                self.set_status(SyncStatus::Idle);
                return;
            }
        };

        info!("Signed in as {}, merging levels", user);
        self.set_status(SyncStatus::Syncing);

        let engine = self.engine.clone();
        let local = state.level_snapshot();
        self.merge_input = Some(local.clone());
        let tx = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = engine.merge(&user, local).await;
            let _ = tx.send(Event::Merged { generation, result });
        });
    }

    fn on_event(&mut self, event: Event) {
        if event.generation() != self.generation {
            debug!("Dropping result from a previous session");
            return;
        }

        match event {
            Event::Merged { result, .. } => self.on_merged(result),
            Event::Pushed { snapshot, .. } => self.on_pushed(snapshot),
            Event::SubscriptionFailed { error, .. } => {
                error!("Level subscription failed: {}", error);
                self.set_status(SyncStatus::Error);
            }
            Event::Uploaded {
                content, result, ..
            } => {
                match &result {
                    Ok(Some(stamp)) => self.on_uploaded(content, *stamp),
                    Ok(None) => {}
                    Err(e) => error!("Level upload failed: {}", e),
                }
                let steps = self.scheduler.upload_finished(
                    Instant::now(),
                    result.is_ok(),
                    self.network.is_offline(),
                );
                self.run_steps(steps);
            }
        }
    }

    fn on_pushed(&mut self, snapshot: LevelSnapshot) {
        let stamp = snapshot.last_modified;
        if let Some(acknowledged) = self.acknowledged {
            if stamp <= acknowledged {
                debug!("Ignoring push at {}, already at {}", stamp, acknowledged);
                return;
            }
        }
        self.acknowledged = Some(stamp);

        let content = snapshot.content();
        let current = self.store.state().level_content();
        if self.sent.as_ref() == Some(&content) {
            if current != content {
                // Our own write; newer local edits are still pending.
                debug!("Own write echoed at {}, local edits pending", stamp);
                return;
            }
            debug!("Own write echoed at {}", stamp);
        } else {
            info!("Applying remote levels from {}", stamp);
            self.sent = None;
        }

        self.store.dispatch(Action::SyncLevels(snapshot));
        self.baseline = content;

        if self.scheduler.is_idle() {
            self.set_status(SyncStatus::Synced);
        }
    }

    /// Take the store's stamp for `content` unless a foreign write replaced it
    fn on_uploaded(&mut self, content: LevelContent, stamp: Millis) {
        if self.sent.as_ref() != Some(&content)
            || self.acknowledged.map_or(false, |acknowledged| stamp <= acknowledged)
        {
            return;
        }
        self.acknowledged = Some(stamp);

        let state = self.store.state();
        if state.level_content() == content {
            let snapshot = LevelSnapshot::new(state.levels, state.level_order, stamp);
            self.store.dispatch(Action::SyncLevels(snapshot));
        }
    }

    fn on_merged(&mut self, result: SyncResult<LevelSnapshot>) {
        let input = self.merge_input.take();
        let state = match result {
            Ok(snapshot) => {
                if input.as_ref() == Some(&snapshot) {
                    // Local won and was uploaded.
                    self.sent = Some(snapshot.content());
                } else {
                    self.acknowledged = Some(snapshot.last_modified);
                }

                let current = self.store.state();
                let edited =
                    input.map_or(false, |input| input.last_modified != current.last_modified);
                let state = if edited {
                    debug!("Levels edited during merge, keeping local edits");
                    current
                } else {
                    self.store.dispatch(Action::SyncLevels(snapshot.clone()))
                };
                self.set_status(SyncStatus::Synced);
                self.baseline = snapshot.content();
                state
            }
            Err(e) => {
                error!("Initial level merge failed: {}", e);
                self.set_status(SyncStatus::Error);
                self.store.state()
            }
        };
        self.initialized = true;

        if let Some(user) = self.user.clone() {
            self.follow(&user);
        }

        // Edits made while the merge was in flight still need uploading.
        if state.level_content() != self.baseline {
            self.baseline = state.level_content();
            self.scheduler.content_changed(Instant::now());
        }
    }

    fn follow(&self, user: &UserId) {
        let generation = self.generation;
        let updates = self.events_tx.clone();
        let failures = self.events_tx.clone();
        self.auto_sync.enable(
            user,
            move |snapshot| {
                let _ = updates.send(Event::Pushed {
                    generation,
                    snapshot,
                });
            },
            move |error| {
                let _ = failures.send(Event::SubscriptionFailed { generation, error });
            },
        );
    }

    fn run_steps(&mut self, steps: Vec<Step>) {
        for step in steps {
            match step {
                Step::StartUpload => self.start_upload(),
                Step::Report(Outcome::Success) => self.set_status(SyncStatus::Synced),
                Step::Report(Outcome::Failure) => self.set_status(SyncStatus::Error),
                Step::Report(Outcome::Offline) => {
                    warn!("Offline, level upload deferred");
                    self.set_status(SyncStatus::Offline);
                }
            }
        }
    }

    fn start_upload(&mut self) {
        let user = match &self.user {
            Some(user) => user.clone(),
            None => return,
        };
        self.set_status(SyncStatus::Syncing);

        // Upload whatever is current at fire time.
        let state = self.store.state();
        let content = state.level_content();
        self.sent = Some(content.clone());
        let engine = self.engine.clone();
        let tx = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = engine
                .upload(&user, &state.levels, &state.level_order)
                .await;
            let _ = tx.send(Event::Uploaded {
                generation,
                content,
                result,
            });
        });
    }

    fn set_status(&self, status: SyncStatus) {
        if self.store.state().sync_status != status {
            debug!("Sync status -> {}", status);
            self.store.dispatch(Action::SetSyncStatus(status));
        }
    }
}
