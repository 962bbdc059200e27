//! Engine handle: owns the per-category samplers and exposes the control
//! surface consumers use (snapshots, cadence, pause, view settings).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{Category, EngineConfig, Rate};
use crate::error::EngineError;
use crate::history::DisplayScale;
use crate::processes::ProcessQuery;
use crate::sampler::{default_pipelines, spawn_category_sampler, Cadence};
use crate::source::{LinuxSource, SystemSource};
use crate::state::SnapshotStore;
use crate::types::{ProcessRecord, Snapshot, SortColumn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct Engine {
    store: SnapshotStore,
    controls: HashMap<Category, watch::Sender<Cadence>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Start sampling the local machine. Must be called inside a tokio runtime.
    pub fn start(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let source = Arc::new(LinuxSource::from_config(&config));
        Self::with_source(config, source)
    }

    /// Start sampling from an arbitrary source.
    pub fn with_source(
        config: EngineConfig,
        source: Arc<dyn SystemSource>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let store = SnapshotStore::new(config.history_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut controls: HashMap<Category, watch::Sender<Cadence>> = HashMap::new();
        let mut tasks = Vec::new();

        for pipeline in default_pipelines(&config) {
            let category = pipeline.category();
            // pipelines of one category follow the same cadence
            let rx = match controls.get(&category) {
                Some(tx) => tx.subscribe(),
                None => {
                    let (tx, rx) = watch::channel(Cadence {
                        interval: config.interval(category),
                        paused: false,
                    });
                    controls.insert(category, tx);
                    rx
                }
            };
            tasks.push(spawn_category_sampler(
                pipeline,
                Arc::clone(&source),
                store.clone(),
                rx,
                shutdown_tx.subscribe(),
            ));
        }

        info!(
            "engine started: cpu={:?} processes={:?} network={:?} system={:?} history={}",
            config.cpu_interval,
            config.processes_interval,
            config.network_interval,
            config.system_interval,
            config.history_capacity
        );
        Ok(Self {
            store,
            controls,
            shutdown_tx,
            tasks,
        })
    }

    /// Shared handle for consumers that outlive a borrow of the engine.
    pub fn store(&self) -> SnapshotStore {
        self.store.clone()
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot().await
    }

    /// Non-blocking read for render loops; `None` while a writer is publishing.
    pub fn try_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.store.try_snapshot()
    }

    fn control(&self, category: Category) -> Result<&watch::Sender<Cadence>, EngineError> {
        match self.controls.get(&category) {
            Some(tx) if !tx.is_closed() => Ok(tx),
            _ => Err(EngineError::Stopped),
        }
    }

    pub fn cadence(&self, category: Category) -> Option<Cadence> {
        self.controls.get(&category).map(|tx| *tx.borrow())
    }

    /// Takes effect from the next tick; history is kept.
    pub fn set_category_rate(&self, category: Category, rate: Rate) -> Result<Duration, EngineError> {
        let interval = rate.to_interval(category)?;
        self.control(category)?.send_if_modified(|c| {
            let changed = c.interval != interval;
            c.interval = interval;
            changed
        });
        Ok(interval)
    }

    /// Stops ticking `category`; published data stays frozen.
    pub async fn pause(&self, category: Category) -> Result<(), EngineError> {
        let changed = self.control(category)?.send_if_modified(|c| {
            let changed = !c.paused;
            c.paused = true;
            changed
        });
        if changed {
            self.store
                .publish(|s| {
                    if !s.paused.contains(&category) {
                        s.paused.push(category);
                    }
                })
                .await;
        }
        Ok(())
    }

    /// Restarts ticking. The first sample afterwards only re-baselines.
    pub async fn resume(&self, category: Category) -> Result<(), EngineError> {
        let changed = self.control(category)?.send_if_modified(|c| {
            let changed = c.paused;
            c.paused = false;
            changed
        });
        if changed {
            self.store
                .publish(|s| s.paused.retain(|c| *c != category))
                .await;
        }
        Ok(())
    }

    pub fn is_paused(&self, category: Category) -> bool {
        self.cadence(category).is_some_and(|c| c.paused)
    }

    pub async fn set_filter(&self, text: impl Into<String>) {
        let text = text.into();
        self.store.publish(|s| s.view.filter = text).await;
    }

    pub async fn set_sort_column(&self, column: SortColumn, ascending: bool) {
        self.store
            .publish(|s| {
                s.view.sort = column;
                s.view.ascending = ascending;
            })
            .await;
    }

    pub async fn set_display_scale(
        &self,
        category: Category,
        scale: DisplayScale,
    ) -> Result<(), EngineError> {
        if let DisplayScale::Fixed { min, max } = scale {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(EngineError::InvalidScale { category, min, max });
            }
        }
        self.store.publish(|s| s.view.set_scale(category, scale)).await;
        Ok(())
    }

    /// Process rows after the current filter and sort are applied.
    pub async fn process_view(&self) -> Vec<ProcessRecord> {
        let snap = self.store.snapshot().await;
        ProcessQuery {
            filter: snap.view.filter.clone(),
            sort: snap.view.sort,
            ascending: snap.view.ascending,
        }
        .view(&snap.processes)
    }

    /// Signals every sampler and waits briefly for them; stragglers stuck in
    /// a blocking read are aborted.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("sampler did not stop within {SHUTDOWN_GRACE:?}; aborting");
                abort.abort();
            }
        }
        info!("engine stopped");
    }
}
