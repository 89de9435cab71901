//! Concurrent clone execution over the task registry.
//!
//! Each clone runs libgit2 on a blocking thread and reports transfer
//! progress back into the registry. Cancellation is cooperative: dropping a
//! clone future flips an abort flag that the next transfer-progress
//! callback observes, which makes libgit2 abort the transport. The blocking
//! worker always finalizes the task state itself, so a dropped future can
//! never leave a task stuck in `Cloning`.

use crate::error::{classify_transport, Result};
use crate::registry::CloneTaskRegistry;
use crate::types::{CloneStatus, GitCredentials};
use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, FetchOptions, RemoteCallbacks};
use gitfleet_core::Error;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Registry writes are throttled to at least one per received megabyte.
const BYTES_PER_PROGRESS_UPDATE: u64 = 1024 * 1024;

/// A credential callback that keeps failing is looping; stop offering after
/// this many attempts per clone.
const MAX_CREDENTIAL_ATTEMPTS: usize = 2;

/// Drives clones through a shared [`CloneTaskRegistry`].
#[derive(Debug, Clone)]
pub struct CloneExecutor {
    registry: Arc<CloneTaskRegistry>,
    credentials: Option<GitCredentials>,
    max_parallel: Option<usize>,
    inflight: Arc<Mutex<HashMap<String, watch::Receiver<bool>>>>,
}

/// What `clone_repo` decided to do for a URL, resolved atomically against
/// the in-flight table.
enum CloneAction {
    /// Task already completed; nothing to do.
    AlreadyDone,
    /// Another clone of the same URL is running; wait for it.
    Join(watch::Receiver<bool>),
    /// This call owns the clone attempt.
    Run(watch::Sender<bool>),
}

impl CloneExecutor {
    /// Create an executor over a registry.
    #[must_use]
    pub fn new(registry: Arc<CloneTaskRegistry>, credentials: Option<GitCredentials>) -> Self {
        Self {
            registry,
            credentials,
            max_parallel: None,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Override the concurrent clone bound used by [`clone_all`].
    ///
    /// [`clone_all`]: Self::clone_all
    #[must_use]
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = Some(max.max(1));
        self
    }

    /// Clone one registered URL.
    ///
    /// Idempotent on `Completed` tasks; joins an in-flight clone of the
    /// same URL. For `Queued` and `Failed` tasks a fresh attempt starts.
    /// Clone failures land in the task state, not in the return value;
    /// only internal errors (unknown URL, broken invariants) are returned.
    pub async fn clone_repo(&self, url: &str) -> Result<()> {
        let action = self.resolve_action(url)?;
        match action {
            CloneAction::AlreadyDone => Ok(()),
            CloneAction::Join(mut done) => {
                // Wait until the running clone reaches a terminal state.
                while !*done.borrow_and_update() {
                    if done.changed().await.is_err() {
                        break;
                    }
                }
                Ok(())
            }
            CloneAction::Run(done_tx) => self.run_clone(url.to_string(), done_tx).await,
        }
    }

    /// Clone every registered URL with bounded parallelism.
    ///
    /// Returns once every URL has reached a terminal state. Individual
    /// clone failures are recorded in the registry and never fail the
    /// batch.
    pub async fn clone_all(&self) -> Result<()> {
        let urls = self.registry.urls();
        if urls.is_empty() {
            return Ok(());
        }

        let bound = self
            .max_parallel
            .unwrap_or_else(|| urls.len().min(num_cpus::get() * 2))
            .max(1);
        info!(count = urls.len(), bound, "starting clone batch");

        let semaphore = Arc::new(Semaphore::new(bound));
        let mut batch = JoinSet::new();
        for url in urls {
            let executor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            batch.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::cancelled("clone batch shut down"))?;
                executor.clone_repo(&url).await
            });
        }

        let mut first_error = None;
        while let Some(joined) = batch.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) if first_error.is_none() => first_error = Some(err),
                Ok(Err(_)) => {}
                Err(err) if err.is_panic() => {
                    first_error
                        .get_or_insert_with(|| Error::invariant("clone worker panicked"));
                }
                Err(_) => {}
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Decide, atomically against the in-flight table, what to do for a URL.
    fn resolve_action(&self, url: &str) -> Result<CloneAction> {
        let mut inflight = self.inflight.lock();
        let task = self
            .registry
            .task(url)
            .ok_or_else(|| Error::not_found(format!("no clone task registered for {url}")))?;

        if task.status == CloneStatus::Completed {
            return Ok(CloneAction::AlreadyDone);
        }
        if let Some(done) = inflight.get(url) {
            return Ok(CloneAction::Join(done.clone()));
        }
        if matches!(task.status, CloneStatus::Cloning { .. }) {
            // Cloning with no in-flight entry: the worker is between its
            // terminal write and its table cleanup. Treat as done.
            return Ok(CloneAction::AlreadyDone);
        }

        let (tx, rx) = watch::channel(false);
        inflight.insert(url.to_string(), rx);
        Ok(CloneAction::Run(tx))
    }

    /// Run one owned clone attempt to its terminal state.
    async fn run_clone(&self, url: String, done_tx: watch::Sender<bool>) -> Result<()> {
        let cancel = Arc::new(AtomicBool::new(false));
        let guard = CancelGuard::new(Arc::clone(&cancel));

        let registry = Arc::clone(&self.registry);
        let inflight = Arc::clone(&self.inflight);
        let credentials = self.credentials.clone();
        let worker_url = url.clone();

        let worker = tokio::task::spawn_blocking(move || {
            let outcome = clone_worker(&registry, &worker_url, credentials.as_ref(), &cancel);
            // Terminal state first, then unregister, then wake joiners.
            let result = finalize(&registry, &worker_url, outcome);
            inflight.lock().remove(&worker_url);
            let _ = done_tx.send(true);
            result
        });

        let joined = worker.await;
        guard.disarm();
        match joined {
            Ok(result) => result,
            Err(err) => Err(Error::invariant(format!(
                "clone worker for {url} did not finish: {err}"
            ))),
        }
    }
}

/// Record a worker outcome in the registry.
///
/// Clone errors become `Failed` task state and an `Ok(())` return; only
/// registry invariant violations propagate.
fn finalize(
    registry: &CloneTaskRegistry,
    url: &str,
    outcome: std::result::Result<PathBuf, Error>,
) -> Result<()> {
    match outcome {
        Ok(temp_dir) => {
            info!(url, temp_dir = %temp_dir.display(), "clone completed");
            registry.complete(url, temp_dir)
        }
        Err(err) => {
            if err.kind() == gitfleet_core::ErrorKind::InvariantViolation {
                return Err(err);
            }
            warn!(url, error = %err, "clone failed");
            registry.transition(url, CloneStatus::failed(err.to_string())?)
        }
    }
}

/// The blocking clone attempt: temp dir, transport, progress, credentials.
fn clone_worker(
    registry: &CloneTaskRegistry,
    url: &str,
    credentials: Option<&GitCredentials>,
    cancel: &Arc<AtomicBool>,
) -> std::result::Result<PathBuf, Error> {
    registry.transition(url, CloneStatus::Cloning { progress: 0 })?;

    let temp_dir = tempfile::Builder::new()
        .prefix("gitfleet-")
        .tempdir()
        .map_err(|err| Error::filesystem(format!("failed to create temp directory: {err}")))?
        .keep();

    debug!(url, dest = %temp_dir.display(), "clone transport starting");
    match run_transport(registry, url, &temp_dir, credentials, cancel) {
        Ok(()) => Ok(temp_dir),
        Err(err) => {
            if let Err(remove_err) = std::fs::remove_dir_all(&temp_dir) {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        dest = %temp_dir.display(),
                        error = %remove_err,
                        "failed to remove partial clone"
                    );
                }
            }
            if cancel.load(Ordering::SeqCst) {
                Err(Error::cancelled(format!("clone of {url} was cancelled")))
            } else {
                Err(err)
            }
        }
    }
}

/// Drive the libgit2 transport with progress and credential callbacks.
fn run_transport(
    registry: &CloneTaskRegistry,
    url: &str,
    dest: &Path,
    credentials: Option<&GitCredentials>,
    cancel: &Arc<AtomicBool>,
) -> std::result::Result<(), Error> {
    let mut callbacks = RemoteCallbacks::new();

    let progress_registry = registry;
    let progress_cancel = Arc::clone(cancel);
    let mut last_pct = 0u8;
    let mut last_bytes = 0u64;
    let mut last_write = Instant::now();
    callbacks.transfer_progress(move |stats| {
        if progress_cancel.load(Ordering::SeqCst) {
            return false;
        }
        let total = stats.total_objects();
        let pct = if total == 0 {
            0
        } else {
            ((stats.received_objects() * 100) / total).min(100) as u8
        };
        let bytes = stats.received_bytes() as u64;
        let due = pct != last_pct
            || bytes.saturating_sub(last_bytes) >= BYTES_PER_PROGRESS_UPDATE
            || last_write.elapsed() >= Duration::from_secs(1);
        if due {
            last_pct = pct;
            last_bytes = bytes;
            last_write = Instant::now();
            let _ = progress_registry.transition(url, CloneStatus::Cloning { progress: pct });
        }
        true
    });

    let auth = credentials.cloned();
    let https = is_https(url);
    let attempts = AtomicUsize::new(0);
    callbacks.credentials(move |_url, username_from_url, allowed| {
        if attempts.fetch_add(1, Ordering::SeqCst) >= MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(
                "credential attempts exhausted for this clone",
            ));
        }
        if https
            && allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
            && let Some(auth) = auth.as_ref()
        {
            return Cred::userpass_plaintext(auth.username(), auth.token());
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        Cred::default()
    });

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);

    RepoBuilder::new()
        .fetch_options(fetch)
        .clone(url, dest)
        .map(|_| ())
        .map_err(|err| classify_transport(&err))
}

fn is_https(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|parsed| parsed.scheme() == "https")
}

/// Flips the abort flag when a clone future is dropped before its worker
/// finished; the next transfer-progress callback then stops the transport.
struct CancelGuard {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl CancelGuard {
    fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}
