// src/search.rs

//! Debounced background searches
//!
//! Two channels search independently: installed and repository packages
//! through the package database, and source packages through the metadata
//! service. Each dispatch on a channel takes a new generation number.
//! A channel runs at most one worker. Dispatching while it is busy queues
//! the query, replacing any earlier queued one, and the queue is started
//! from `poll` once the worker is done. Workers are never interrupted; a
//! result is applied only when its generation is still the newest one
//! dispatched on its channel, so a superseded search finishes in the
//! background and is dropped.
//!
//! Time is passed in by the caller, so the debounce can be driven from any
//! event loop.

use crate::alpm::PackageDatabase;
use crate::package::PackageRecord;
use crate::rpc::MetadataSource;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchChannel {
    /// Binary repositories and installed packages
    Repo,
    /// Source package metadata service
    Aur,
}

impl SearchChannel {
    fn index(self) -> usize {
        match self {
            Self::Repo => 0,
            Self::Aur => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Repo => "repo",
            Self::Aur => "aur",
        }
    }
}

/// A finished search as reported by its worker
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub channel: SearchChannel,
    pub generation: u64,
    pub query: String,
    pub outcome: Result<Vec<PackageRecord>, String>,
}

#[derive(Default)]
struct ChannelState {
    latest: u64,
    /// The one search allowed to run on this channel
    worker: Option<JoinHandle<()>>,
    /// Newest query dispatched while the worker was busy
    queued: Option<(u64, String)>,
    visible: Vec<PackageRecord>,
    error: Option<String>,
}

impl ChannelState {
    fn is_busy(&self) -> bool {
        self.worker.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Join the worker if it has finished; never blocks
    fn reap(&mut self) {
        if self.worker.as_ref().is_some_and(|handle| handle.is_finished()) {
            self.join();
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            warn!("Search worker panicked");
        }
    }
}

pub struct SearchController {
    db: Arc<dyn PackageDatabase>,
    metadata: Arc<dyn MetadataSource>,
    debounce: Duration,
    aur_enabled: bool,
    pending: Option<(String, Instant)>,
    last_query: Option<String>,
    channels: [ChannelState; 2],
    tx: Sender<SearchResults>,
    rx: Receiver<SearchResults>,
}

impl SearchController {
    pub fn new(
        db: Arc<dyn PackageDatabase>,
        metadata: Arc<dyn MetadataSource>,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            db,
            metadata,
            debounce,
            aur_enabled: false,
            pending: None,
            last_query: None,
            channels: Default::default(),
            tx,
            rx,
        }
    }

    pub fn aur_enabled(&self) -> bool {
        self.aur_enabled
    }

    /// Toggle the metadata service channel
    ///
    /// Enabling searches the last query right away. Disabling drops whatever
    /// is still in flight on that channel.
    pub fn set_aur_enabled(&mut self, enabled: bool) {
        if enabled == self.aur_enabled {
            return;
        }
        self.aur_enabled = enabled;
        if enabled {
            if let Some(query) = self.last_query.clone() {
                self.dispatch_channel(SearchChannel::Aur, &query);
            }
        } else {
            // The running search finishes on its own and is discarded
            let state = &mut self.channels[SearchChannel::Aur.index()];
            state.latest += 1;
            state.queued = None;
        }
    }

    /// Record a change to the query text; restarts the debounce timer
    pub fn on_input(&mut self, query: &str, now: Instant) {
        let unchanged = match &self.pending {
            Some((pending, _)) => pending == query,
            None => self.last_query.as_deref() == Some(query),
        };
        if !unchanged {
            self.pending = Some((query.to_string(), now));
        }
    }

    /// Dispatch the pending query once the debounce interval has passed
    ///
    /// Returns the channels that were dispatched.
    pub fn tick(&mut self, now: Instant) -> Vec<SearchChannel> {
        let ready = matches!(
            &self.pending,
            Some((_, since)) if now.saturating_duration_since(*since) >= self.debounce
        );
        if !ready {
            return Vec::new();
        }
        match self.pending.take() {
            Some((query, _)) => self.dispatch(&query),
            None => Vec::new(),
        }
    }

    /// Search `query` now on every active channel
    pub fn dispatch(&mut self, query: &str) -> Vec<SearchChannel> {
        self.pending = None;
        self.last_query = Some(query.to_string());
        let mut dispatched = vec![SearchChannel::Repo];
        if self.aur_enabled {
            dispatched.push(SearchChannel::Aur);
        }
        for &channel in &dispatched {
            self.dispatch_channel(channel, query);
        }
        dispatched
    }

    fn dispatch_channel(&mut self, channel: SearchChannel, query: &str) {
        let state = &mut self.channels[channel.index()];
        state.latest += 1;
        let generation = state.latest;
        if state.is_busy() {
            debug!("Queueing {} search #{}: {}", channel.as_str(), generation, query);
            state.queued = Some((generation, query.to_string()));
            return;
        }
        state.queued = None;
        state.join();
        self.start(channel, generation, query.to_string());
    }

    /// Start the queued search on `channel` once its worker is done
    fn start_queued(&mut self, channel: SearchChannel) {
        let state = &mut self.channels[channel.index()];
        if state.worker.is_some() {
            return;
        }
        let Some((generation, query)) = state.queued.take() else {
            return;
        };
        if generation == state.latest {
            self.start(channel, generation, query);
        }
    }

    fn start(&mut self, channel: SearchChannel, generation: u64, query: String) {
        let tx = self.tx.clone();
        let db = Arc::clone(&self.db);
        let metadata = Arc::clone(&self.metadata);
        debug!("Dispatching {} search #{}: {}", channel.as_str(), generation, query);

        let spawned = std::thread::Builder::new()
            .name(format!("search-{}", channel.as_str()))
            .spawn(move || {
                let outcome = match channel {
                    SearchChannel::Repo => db.search(&query),
                    SearchChannel::Aur => metadata.search(&query),
                };
                let _ = tx.send(SearchResults {
                    channel,
                    generation,
                    query,
                    outcome: outcome.map_err(|e| e.to_string()),
                });
            });

        let state = &mut self.channels[channel.index()];
        match spawned {
            Ok(handle) => state.worker = Some(handle),
            Err(e) => {
                warn!("Failed to start {} search: {}", channel.as_str(), e);
                state.error = Some(e.to_string());
            }
        }
    }

    /// Newest generation dispatched on `channel`
    pub fn generation(&self, channel: SearchChannel) -> u64 {
        self.channels[channel.index()].latest
    }

    /// Results currently shown for `channel`
    pub fn results(&self, channel: SearchChannel) -> &[PackageRecord] {
        &self.channels[channel.index()].visible
    }

    /// Error from the last applied search on `channel`
    pub fn error(&self, channel: SearchChannel) -> Option<&str> {
        self.channels[channel.index()].error.as_deref()
    }

    /// Apply finished searches that are still current; never blocks
    ///
    /// Also starts a queued search on any channel whose worker has finished.
    /// Returns the channels whose visible results changed.
    pub fn poll(&mut self) -> Vec<SearchChannel> {
        let mut changed = Vec::new();
        while let Ok(results) = self.rx.try_recv() {
            let state = &mut self.channels[results.channel.index()];
            if results.generation != state.latest {
                debug!(
                    "Discarding stale {} search #{} (latest #{})",
                    results.channel.as_str(),
                    results.generation,
                    state.latest
                );
                continue;
            }
            match results.outcome {
                Ok(records) => {
                    state.visible = records;
                    state.error = None;
                }
                Err(e) => {
                    warn!("{} search failed: {}", results.channel.as_str(), e);
                    state.visible.clear();
                    state.error = Some(e);
                }
            }
            if !changed.contains(&results.channel) {
                changed.push(results.channel);
            }
        }
        for channel in [SearchChannel::Repo, SearchChannel::Aur] {
            self.channels[channel.index()].reap();
            self.start_queued(channel);
        }
        changed
    }

    /// Block until every worker and queued search has finished, then apply
    /// current results
    pub fn wait(&mut self) -> Vec<SearchChannel> {
        for channel in [SearchChannel::Repo, SearchChannel::Aur] {
            loop {
                self.channels[channel.index()].join();
                self.start_queued(channel);
                if self.channels[channel.index()].worker.is_none() {
                    break;
                }
            }
        }
        self.poll()
    }

    /// Number of workers not yet joined; at most one per channel
    pub fn live_workers(&self) -> usize {
        self.channels.iter().filter(|s| s.worker.is_some()).count()
    }

    /// Whether a search is waiting for the running one on `channel`
    pub fn has_queued(&self, channel: SearchChannel) -> bool {
        self.channels[channel.index()].queued.is_some()
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        for state in &mut self.channels {
            state.queued = None;
            state.join();
        }
    }
}
