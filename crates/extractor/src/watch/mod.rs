//! ACME file watching
//!
//! The [`Watcher`] keeps the [`CertIndex`] in sync with the ACME storage
//! file:
//!
//! ```text
//!        ┌──────────── write event ───────────┐
//!        │                                    ▼
//!      Idle ◄──── extraction done ──── Settling (sleep)
//!        ▲                                    │
//!        └──────────── Extracting ◄───────────┘
//! ```
//!
//! Startup performs one extraction before the watch is registered. Failed
//! extractions are logged and leave the index untouched, including the one
//! at startup; only failures of the watch itself end [`Watcher::run`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, trace, warn};

use certex_config::ExtractorConfig;

use crate::acme::Extractor;
use crate::index::CertIndex;

mod signals;

pub use signals::{wait_for_shutdown, ShutdownSignal};

/// Errors that stop the watcher. None of them is recoverable.
#[derive(Debug, Error)]
pub enum WatchError {
    /// File notification backend unavailable
    #[error("failed to initialize file watcher: {0}")]
    Init(#[source] notify::Error),

    /// The ACME file could not be registered with the backend
    #[error("failed to watch {path:?}: {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The backend stopped delivering events. Happens when its event
    /// thread exits and drops the handler while the watch is still active.
    #[error("file watch event stream ended")]
    Closed,
}

/// Re-extracts certificates whenever the ACME file is written
pub struct Watcher {
    extractor: Arc<Extractor>,
    index: CertIndex,
    settle_interval: Duration,
    extract_timeout: Option<Duration>,
    extractions: AtomicU64,
}

impl Watcher {
    /// Create a watcher feeding `index`.
    pub fn new(config: &ExtractorConfig, index: CertIndex) -> Self {
        Self {
            extractor: Arc::new(Extractor::new(config)),
            index,
            settle_interval: config.settle_interval(),
            extract_timeout: config.extract_timeout(),
            extractions: AtomicU64::new(0),
        }
    }

    /// Index updated by this watcher
    pub fn index(&self) -> &CertIndex {
        &self.index
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Number of extraction runs started so far
    pub fn extraction_count(&self) -> u64 {
        self.extractions.load(Ordering::Relaxed)
    }

    /// Run the watch loop.
    ///
    /// Performs an initial extraction, then re-extracts after every write to
    /// the ACME file. Only returns when the watch itself fails.
    ///
    /// A failed initial extraction does not stop the watcher: the index stays
    /// empty until a later write yields a valid document. Callers that need
    /// certificates before serving should check the index or run
    /// [`Extractor::run`] themselves first.
    pub async fn run(self) -> Result<(), WatchError> {
        let acme_file = self.extractor.acme_file().to_path_buf();
        info!(
            acme_file = %acme_file.display(),
            certs_dir = %self.extractor.storage().base_path().display(),
            settle_interval_ms = self.settle_interval.as_millis() as u64,
            "Starting ACME file watcher"
        );

        self.refresh().await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means run() has returned
            let _ = tx.send(res);
        })
        .map_err(WatchError::Init)?;

        watcher
            .watch(&acme_file, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                path: acme_file.clone(),
                source,
            })?;

        debug!(acme_file = %acme_file.display(), "Watching ACME file for changes");

        let closed = self.process_events(&mut rx).await;
        drop(watcher);
        Err(closed)
    }

    /// Handle watch events until the event stream ends.
    async fn process_events(&self, rx: &mut UnboundedReceiver<notify::Result<Event>>) -> WatchError {
        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) if is_write(&event) => {
                    info!(paths = ?event.paths, "Modified file");

                    tokio::time::sleep(self.settle_interval).await;
                    let coalesced = drain_pending(rx);
                    if coalesced > 0 {
                        debug!(coalesced, "Coalesced file events received while settling");
                    }

                    self.refresh().await;
                }
                Ok(event) => {
                    trace!(kind = ?event.kind, "Ignoring file event");
                }
                Err(e) => {
                    error!(error = %e, "File watch error");
                }
            }
        }

        WatchError::Closed
    }

    /// Run one extraction and install its snapshot.
    ///
    /// Returns whether the index was updated. Failures are logged and leave
    /// the previous snapshot in place.
    pub async fn refresh(&self) -> bool {
        let run = self.extractions.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(run, "Starting certificate extraction");

        let extractor = Arc::clone(&self.extractor);
        let task = tokio::task::spawn_blocking(move || extractor.run());

        let joined = match self.extract_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        acme_file = %self.extractor.acme_file().display(),
                        timeout_secs = limit.as_secs(),
                        "Certificate extraction timed out, keeping previous certificates"
                    );
                    return false;
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(snapshot)) => {
                info!(certificates = snapshot.len(), "Certificate extraction completed");
                self.index.replace(snapshot);
                true
            }
            Ok(Err(e)) => {
                error!(
                    acme_file = %self.extractor.acme_file().display(),
                    domain = ?e.domain(),
                    error = %e,
                    "Certificate extraction failed, keeping previous certificates"
                );
                false
            }
            Err(e) => {
                error!(error = %e, "Certificate extraction task failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("acme_file", &self.extractor.acme_file())
            .field("settle_interval", &self.settle_interval)
            .field("extract_timeout", &self.extract_timeout)
            .finish()
    }
}

/// Whether `event` reports new content in the watched file
fn is_write(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    )
}

/// Discard events queued while settling; the upcoming extraction covers them.
fn drain_pending(rx: &mut UnboundedReceiver<notify::Result<Event>>) -> usize {
    let mut drained = 0;
    while let Ok(res) = rx.try_recv() {
        if let Err(e) = res {
            error!(error = %e, "File watch error");
        }
        drained += 1;
    }
    drained
}
