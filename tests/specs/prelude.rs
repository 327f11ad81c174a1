// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared in-process pipeline fixture.

use std::sync::Arc;
use std::time::Duration;
use tc_core::test_support::config_fixture;
use tc_core::{Clock, Command, CommandSource, Event, FakeClock};
use tc_engine::bus::{EventBus, EventReader};
use tc_engine::output_file::OutputFiles;
use tc_engine::{
    Ingress, PollerConfig, QueueWorker, RoutingResolver, SessionManager, SnapshotCache,
    WorkerConfig,
};
use tc_mux::FakeMux;
use tc_storage::Storage;

pub struct Pipeline {
    pub storage: Storage,
    pub mux: FakeMux,
    pub clock: FakeClock,
    pub ingress: Ingress<FakeClock>,
    pub worker: QueueWorker<FakeMux, FakeClock>,
    pub manager: SessionManager<FakeMux, FakeClock>,
    pub cache: SnapshotCache<FakeClock>,
    pub reader: EventReader,
    pub outputs: OutputFiles,
    _dir: tempfile::TempDir,
}

/// Build the pipeline over a scripted bridge.
pub fn pipeline_with(mux: FakeMux) -> Pipeline {
    let storage = Storage::open_in_memory().unwrap();
    let clock = FakeClock::default();
    let config = Arc::new(config_fixture());
    let (bus, reader) = EventBus::new();
    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputFiles::new(dir.path());

    let manager = SessionManager::new(
        storage.clone(),
        mux.clone(),
        clock.clone(),
        bus,
        Arc::clone(&config),
        outputs.clone(),
        PollerConfig {
            initial_delay: Duration::from_millis(5),
            poll_interval: Duration::from_millis(10),
            idle_notification: Duration::from_millis(200),
            max_polls: 600,
            streaming_window: Duration::from_secs(8),
        },
    );
    let routing = RoutingResolver::new(Arc::clone(&config), storage.clone(), clock.clone());
    let ingress = Ingress::new(storage.clone(), Arc::clone(&config), clock.clone());
    let worker = QueueWorker::new(
        storage.clone(),
        manager.clone(),
        routing,
        clock.clone(),
        ingress.wake_handle(),
        WorkerConfig::default(),
    );
    let cache = SnapshotCache::new(storage.clone(), clock.clone());

    Pipeline {
        storage,
        mux,
        clock,
        ingress,
        worker,
        manager,
        cache,
        reader,
        outputs,
        _dir: dir,
    }
}

pub fn pipeline() -> Pipeline {
    pipeline_with(FakeMux::new())
}

impl Pipeline {
    /// Submit a command and run it through the queue worker, exactly as
    /// the daemon would.
    pub async fn run_command(&self, command: Command, source: CommandSource) -> i64 {
        let receipt = self
            .ingress
            .submit(command, source, None, None)
            .expect("command accepted");
        let entry = self
            .storage
            .claim_next_command(source, self.clock.now())
            .unwrap()
            .expect("entry claimable");
        self.worker.handle_entry(entry).await;
        receipt.entry_id
    }

    /// Wait (bounded) for a bus event matching the predicate, applying
    /// every drained event to the snapshot cache on the way, as the daemon
    /// event loop does.
    pub async fn wait_event(
        &mut self,
        what: &str,
        mut predicate: impl FnMut(&Event) -> bool,
    ) -> Event {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                panic!("timed out waiting for {}", what);
            }
            match tokio::time::timeout(remaining, self.reader.recv()).await {
                Ok(Some(event)) => {
                    self.cache.apply(&event);
                    if predicate(&event) {
                        return event;
                    }
                }
                Ok(None) => panic!("bus closed waiting for {}", what),
                Err(_) => panic!("timed out waiting for {}", what),
            }
        }
    }

    /// Drain whatever is on the bus into the cache without waiting.
    pub fn drain_events(&mut self) {
        while let Some(event) = self.reader.try_recv() {
            self.cache.apply(&event);
        }
    }
}
