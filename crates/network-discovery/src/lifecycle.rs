//! One-shot enclave teardown shared by explicit callers, signal listeners
//! and drop-time reclamation

use crate::error::{Error, Result};
use futures::{future::BoxFuture, lock::Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Destroys the enclave backing a network
pub type CleanupFn = Box<dyn Fn() -> BoxFuture<'static, enclave_client::Result<()>> + Send + Sync>;

/// Invoked with the signal number after signal-triggered cleanup ran
///
/// Installing one replaces the signal's default action: the process keeps
/// running unless the callback ends it.
pub type SignalCallback = Arc<dyn Fn(i32) + Send + Sync>;

/// A callback that terminates the process with `128 + signal`
///
/// Without any callback the signal's default action runs after cleanup.
/// Pass this to [`NetworkOptions::on_signal`] for a plain exit code instead.
pub fn exit_on_signal() -> SignalCallback {
    Arc::new(|signal| std::process::exit(128 + signal))
}

/// Teardown behaviour of a network
#[derive(Clone)]
pub struct NetworkOptions {
    /// Leave the enclave running when the process is signalled or the
    /// network is dropped. Explicit cleanup still destroys it.
    pub orphan_on_exit: bool,

    /// Destroy the enclave from a background thread when the network is
    /// dropped without cleanup. Best effort only.
    pub cleanup_on_drop: bool,

    /// Signals that trigger cleanup
    pub signals: Vec<i32>,

    /// Called after signal-triggered cleanup. When unset the signal's
    /// default action (usually termination) runs instead.
    pub on_signal: Option<SignalCallback>,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            orphan_on_exit: false,
            cleanup_on_drop: true,
            signals: default_signals(),
            on_signal: None,
        }
    }
}

impl fmt::Debug for NetworkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkOptions")
            .field("orphan_on_exit", &self.orphan_on_exit)
            .field("cleanup_on_drop", &self.cleanup_on_drop)
            .field("signals", &self.signals)
            .field("on_signal", &self.on_signal.is_some())
            .finish()
    }
}

impl NetworkOptions {
    /// Keep the enclave alive past this process
    pub fn orphaned(mut self) -> Self {
        self.orphan_on_exit = true;
        self
    }

    /// Enable or disable drop-time reclamation
    pub fn with_cleanup_on_drop(mut self, enabled: bool) -> Self {
        self.cleanup_on_drop = enabled;
        self
    }

    /// Replace the signals that trigger cleanup
    pub fn with_signals(mut self, signals: impl Into<Vec<i32>>) -> Self {
        self.signals = signals.into();
        self
    }

    /// Do not listen for signals
    pub fn without_signals(mut self) -> Self {
        self.signals.clear();
        self
    }

    /// Run a callback after signal-triggered cleanup
    pub fn on_signal(mut self, callback: SignalCallback) -> Self {
        self.on_signal = Some(callback);
        self
    }
}

#[cfg(unix)]
fn default_signals() -> Vec<i32> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    vec![SIGINT, SIGTERM]
}

#[cfg(not(unix))]
fn default_signals() -> Vec<i32> {
    Vec::new()
}

/// Exactly-once teardown of one enclave
///
/// The first call to [`cleanup`](Self::cleanup) runs the cleanup function.
/// Callers that overlap it wait and share its outcome; callers arriving
/// after it finished get `Ok(())`. A failed teardown is not retried.
pub struct NetworkLifecycle {
    enclave_id: String,
    cleanup_fn: CleanupFn,
    outcome: Mutex<Option<std::result::Result<(), Arc<enclave_client::Error>>>>,
    done: AtomicBool,
    reclaim_on_drop: bool,
    #[cfg(unix)]
    listener: std::sync::Mutex<Option<Listener>>,
}

#[cfg(unix)]
struct Listener {
    handle: signal_hook::iterator::Handle,
    signals: Vec<i32>,
}

impl NetworkLifecycle {
    /// Create the lifecycle and, unless orphaned, start listening for the
    /// configured signals
    pub fn new(
        enclave_id: impl Into<String>,
        cleanup_fn: CleanupFn,
        options: &NetworkOptions,
    ) -> Arc<Self> {
        let lifecycle = Arc::new(Self {
            enclave_id: enclave_id.into(),
            cleanup_fn,
            outcome: Mutex::new(None),
            done: AtomicBool::new(false),
            reclaim_on_drop: options.cleanup_on_drop && !options.orphan_on_exit,
            #[cfg(unix)]
            listener: std::sync::Mutex::new(None),
        });

        if options.orphan_on_exit {
            info!(
                "Enclave '{}' is orphaned and will outlive this process",
                lifecycle.enclave_id
            );
        } else if !options.signals.is_empty() {
            lifecycle.listen_for_signals(&options.signals, options.on_signal.clone());
        }

        lifecycle
    }

    /// Enclave this lifecycle tears down
    pub fn enclave_id(&self) -> &str {
        &self.enclave_id
    }

    /// Whether teardown has run, successfully or not
    pub fn is_cleaned(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Whether a signal listener is installed
    #[cfg(unix)]
    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Whether a signal listener is installed
    #[cfg(not(unix))]
    pub fn is_listening(&self) -> bool {
        false
    }

    /// Tear the enclave down, once
    pub async fn cleanup(&self) -> Result<()> {
        if self.is_cleaned() {
            debug!("Enclave '{}' already cleaned up", self.enclave_id);
            return Ok(());
        }

        let mut outcome = self.outcome.lock().await;
        let result = match outcome.as_ref() {
            // Finished while this caller waited on the running teardown
            Some(result) => result.clone(),
            None => {
                info!("Destroying enclave '{}'", self.enclave_id);
                let result = (self.cleanup_fn)().await.map_err(Arc::new);
                match &result {
                    Ok(()) => info!("Enclave '{}' destroyed", self.enclave_id),
                    Err(e) => warn!("Failed to destroy enclave '{}': {}", self.enclave_id, e),
                }
                *outcome = Some(result.clone());
                self.done.store(true, Ordering::SeqCst);
                self.stop_listening();
                result
            }
        };
        result.map_err(Error::Cleanup)
    }

    /// Last-resort teardown for a network dropped without cleanup
    ///
    /// Runs on a detached thread, so completion is not observable and may
    /// not happen at all if the process exits first.
    pub(crate) fn reclaim(self: &Arc<Self>) {
        if self.is_cleaned() || !self.reclaim_on_drop {
            return;
        }

        warn!(
            "Network for enclave '{}' dropped without cleanup, destroying in background",
            self.enclave_id
        );
        let lifecycle = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("enclave-reclaim".to_string())
            .spawn(move || {
                if let Err(e) = async_io::block_on(lifecycle.cleanup()) {
                    warn!("Background cleanup failed: {}", e);
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn cleanup thread: {}", e);
        }
    }

    #[cfg(unix)]
    fn listen_for_signals(self: &Arc<Self>, signals: &[i32], on_signal: Option<SignalCallback>) {
        use signal_hook::iterator::Signals;

        signal_gate::acquire(signals);
        let mut listener = match Signals::new(signals) {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Failed to register signal handler: {}", e);
                signal_gate::release(signals);
                return;
            }
        };
        let handle = listener.handle();
        let lifecycle: std::sync::Weak<Self> = Arc::downgrade(self);
        let signals = signals.to_vec();

        let spawned = thread::Builder::new()
            .name("enclave-signals".to_string())
            .spawn(move || {
                // Ends without a signal once the handle is closed
                if let Some(signal) = listener.forever().next() {
                    info!("Received signal {}", signal);
                    if let Some(lifecycle) = lifecycle.upgrade() {
                        if let Err(e) = async_io::block_on(lifecycle.cleanup()) {
                            warn!("Cleanup after signal {} failed: {}", signal, e);
                        }
                    }
                    match on_signal {
                        Some(callback) => callback(signal),
                        None => {
                            if let Err(e) = signal_hook::low_level::emulate_default_handler(signal)
                            {
                                warn!("Failed to run default action of signal {}: {}", signal, e);
                            }
                        }
                    }
                }
            });

        match spawned {
            Ok(_) => {
                debug!(
                    "Listening for signals {:?} for enclave '{}'",
                    signals, self.enclave_id
                );
                *self.listener.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some(Listener { handle, signals });
            }
            Err(e) => {
                warn!("Failed to spawn signal listener: {}", e);
                handle.close();
                signal_gate::release(&signals);
            }
        }
    }

    #[cfg(not(unix))]
    fn listen_for_signals(self: &Arc<Self>, _signals: &[i32], _on_signal: Option<SignalCallback>) {
        debug!("Signal-triggered cleanup is only supported on unix");
    }

    #[cfg(unix)]
    fn stop_listening(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(listener) = listener {
            listener.handle.close();
            signal_gate::release(&listener.signals);
        }
    }

    #[cfg(not(unix))]
    fn stop_listening(&self) {}
}

/// Restores a signal's default action once no lifecycle listens for it
///
/// signal-hook keeps its process-wide handler installed after a `Signals`
/// handle is closed, which would otherwise swallow the signal for good.
#[cfg(unix)]
mod signal_gate {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, LazyLock, Mutex};
    use tracing::warn;

    struct Gate {
        unguarded: Arc<AtomicBool>,
        listeners: usize,
    }

    static GATES: LazyLock<Mutex<HashMap<i32, Gate>>> = LazyLock::new(Default::default);

    pub(super) fn acquire(signals: &[i32]) {
        let mut gates = GATES.lock().unwrap_or_else(|e| e.into_inner());
        for &signal in signals {
            if !gates.contains_key(&signal) {
                let unguarded = Arc::new(AtomicBool::new(false));
                if let Err(e) = signal_hook::flag::register_conditional_default(
                    signal,
                    Arc::clone(&unguarded),
                ) {
                    warn!("Failed to guard default action of signal {}: {}", signal, e);
                }
                gates.insert(
                    signal,
                    Gate {
                        unguarded,
                        listeners: 0,
                    },
                );
            }
            if let Some(gate) = gates.get_mut(&signal) {
                gate.listeners += 1;
                gate.unguarded.store(false, Ordering::SeqCst);
            }
        }
    }

    pub(super) fn release(signals: &[i32]) {
        let mut gates = GATES.lock().unwrap_or_else(|e| e.into_inner());
        for signal in signals {
            if let Some(gate) = gates.get_mut(signal) {
                gate.listeners = gate.listeners.saturating_sub(1);
                gate.unguarded.store(gate.listeners == 0, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for NetworkLifecycle {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

impl fmt::Debug for NetworkLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkLifecycle")
            .field("enclave_id", &self.enclave_id)
            .field("cleaned", &self.is_cleaned())
            .field("reclaim_on_drop", &self.reclaim_on_drop)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn counting(calls: Arc<AtomicUsize>, fail: bool) -> CleanupFn {
        Box::new(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(enclave_client::Error::orchestrator("boom"))
                } else {
                    Ok(())
                }
            }
            .boxed()
        })
    }

    fn quiet() -> NetworkOptions {
        NetworkOptions::default().without_signals()
    }

    #[smol_potat::test]
    async fn test_cleanup_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lifecycle = NetworkLifecycle::new("devnet", counting(calls.clone(), false), &quiet());

        assert!(!lifecycle.is_cleaned());
        lifecycle.cleanup().await.unwrap();
        lifecycle.cleanup().await.unwrap();
        assert!(lifecycle.is_cleaned());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[smol_potat::test]
    async fn test_failure_is_reported_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lifecycle = NetworkLifecycle::new("devnet", counting(calls.clone(), true), &quiet());

        assert!(matches!(lifecycle.cleanup().await, Err(Error::Cleanup(_))));
        assert!(lifecycle.is_cleaned());

        // Later callers see a finished teardown, not its failure
        lifecycle.cleanup().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_orphaned_lifecycle_is_not_reclaimed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let options = NetworkOptions::default().orphaned();
        let lifecycle = NetworkLifecycle::new("devnet", counting(calls.clone(), false), &options);

        assert!(!lifecycle.is_listening());
        lifecycle.reclaim();
        drop(lifecycle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[smol_potat::test]
    async fn test_listener_removed_after_cleanup() {
        use signal_hook::consts::SIGUSR1;

        let calls = Arc::new(AtomicUsize::new(0));
        let options = NetworkOptions::default().with_signals([SIGUSR1]);
        let lifecycle = NetworkLifecycle::new("devnet", counting(calls, false), &options);

        assert!(lifecycle.is_listening());
        lifecycle.cleanup().await.unwrap();
        assert!(!lifecycle.is_listening());
    }
}
