//! Cleanup behaviour of a mapped network: exactly-once teardown under
//! concurrency, drop-time reclamation and signal-triggered cleanup

use enclave_client::{MemoryOrchestrator, PackageConfig, PortInfo, RawService};
#[cfg(unix)]
use futures::FutureExt;
use network_discovery::{Error, Network, NetworkOptions, ServiceMapper};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn seeded(enclave_id: &str) -> Arc<MemoryOrchestrator> {
    let orchestrator = Arc::new(MemoryOrchestrator::new());
    orchestrator.insert_enclave(
        enclave_id,
        [RawService::new("el-1-geth-lighthouse")
            .with_ip("10.0.0.2")
            .with_port("rpc", PortInfo::tcp(8545))],
    );
    orchestrator
}

async fn map(
    orchestrator: &Arc<MemoryOrchestrator>,
    enclave_id: &str,
    options: NetworkOptions,
) -> Network {
    ServiceMapper::new(orchestrator.clone())
        .map_to_network(enclave_id, &PackageConfig::default(), options)
        .await
        .unwrap()
}

fn quiet() -> NetworkOptions {
    NetworkOptions::default()
        .without_signals()
        .with_cleanup_on_drop(false)
}

/// Poll until `done` holds or the deadline passes
fn eventually(done: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[smol_potat::test]
async fn test_concurrent_cleanup_destroys_once() {
    let orchestrator = seeded("devnet");
    orchestrator.set_destroy_delay(Duration::from_millis(50));
    let network = map(&orchestrator, "devnet", quiet()).await;

    let (first, second) = futures::join!(network.cleanup(), network.cleanup());
    first.unwrap();
    second.unwrap();
    network.cleanup().await.unwrap();

    assert!(network.is_cleaned());
    assert_eq!(orchestrator.destroy_calls(), 1);
    assert!(!orchestrator.has_enclave("devnet"));
}

#[test]
fn test_cleanup_from_many_threads_destroys_once() {
    let orchestrator = seeded("devnet");
    orchestrator.set_destroy_delay(Duration::from_millis(20));
    let network = Arc::new(smol::block_on(map(&orchestrator, "devnet", quiet())));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let network = network.clone();
            thread::spawn(move || smol::block_on(network.cleanup()))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(orchestrator.destroy_calls(), 1);
}

#[smol_potat::test]
async fn test_failed_cleanup_is_shared_and_not_retried() {
    let orchestrator = seeded("devnet");
    orchestrator.fail_destroy("daemon unreachable");
    orchestrator.set_destroy_delay(Duration::from_millis(20));
    let network = map(&orchestrator, "devnet", quiet()).await;

    let (first, second) = futures::join!(network.cleanup(), network.cleanup());
    for result in [first, second] {
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Cleanup(_)));
        assert!(err.to_string().contains("daemon unreachable"));
    }

    // Teardown already ran; arriving afterwards is a no-op
    network.cleanup().await.unwrap();
    assert!(network.is_cleaned());
    assert_eq!(orchestrator.destroy_calls(), 1);
}

#[test]
fn test_dropped_network_is_reclaimed() {
    let orchestrator = seeded("devnet");
    let options = NetworkOptions::default().without_signals();
    let network = smol::block_on(map(&orchestrator, "devnet", options));

    drop(network);
    assert!(eventually(|| orchestrator.destroy_calls() == 1));
    assert!(eventually(|| !orchestrator.has_enclave("devnet")));
}

#[test]
fn test_cleaned_network_is_not_reclaimed_again() {
    let orchestrator = seeded("devnet");
    let options = NetworkOptions::default().without_signals();
    let network = smol::block_on(map(&orchestrator, "devnet", options));

    smol::block_on(network.cleanup()).unwrap();
    drop(network);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(orchestrator.destroy_calls(), 1);
}

#[test]
fn test_orphaned_network_survives_drop() {
    let orchestrator = seeded("devnet");
    let options = NetworkOptions::default().orphaned();
    let network = smol::block_on(map(&orchestrator, "devnet", options));
    assert!(!network.lifecycle().is_listening());

    drop(network);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(orchestrator.destroy_calls(), 0);
    assert!(orchestrator.has_enclave("devnet"));
}

#[smol_potat::test]
async fn test_orphaned_network_still_cleans_up_explicitly() {
    let orchestrator = seeded("devnet");
    let network = map(&orchestrator, "devnet", quiet().orphaned()).await;

    network.cleanup().await.unwrap();
    assert!(!orchestrator.has_enclave("devnet"));
}

#[cfg(unix)]
#[test]
fn test_signal_triggers_cleanup_and_callback() {
    use signal_hook::consts::SIGUSR2;
    use std::sync::atomic::{AtomicI32, Ordering};

    let orchestrator = seeded("signalled");
    let received = Arc::new(AtomicI32::new(0));
    let seen = received.clone();
    let options = NetworkOptions::default()
        .with_cleanup_on_drop(false)
        .with_signals([SIGUSR2])
        .on_signal(Arc::new(move |signal| seen.store(signal, Ordering::SeqCst)));

    let network = smol::block_on(map(&orchestrator, "signalled", options));
    assert!(network.lifecycle().is_listening());

    signal_hook::low_level::raise(SIGUSR2).unwrap();

    assert!(eventually(|| received.load(Ordering::SeqCst) == SIGUSR2));
    assert!(network.is_cleaned());
    assert!(!network.lifecycle().is_listening());
    assert_eq!(orchestrator.destroy_calls(), 1);

    smol::block_on(network.cleanup()).unwrap();
    assert_eq!(orchestrator.destroy_calls(), 1);
}

/// Set in a re-executed test binary to the path the child's cleanup writes
#[cfg(unix)]
const CHILD_MARKER: &str = "NETWORK_DISCOVERY_CHILD_MARKER";

/// Run one test of this binary in a child process and wait for it
#[cfg(unix)]
fn run_child(test: &str, marker: &std::path::Path) -> std::process::ExitStatus {
    std::process::Command::new(std::env::current_exe().unwrap())
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_MARKER, marker)
        .status()
        .unwrap()
}

/// A lifecycle whose cleanup records itself in `marker`
#[cfg(unix)]
fn marking_lifecycle(
    marker: std::path::PathBuf,
    options: &NetworkOptions,
) -> Arc<network_discovery::NetworkLifecycle> {
    network_discovery::NetworkLifecycle::new(
        "child",
        Box::new(move || {
            let marker = marker.clone();
            async move { std::fs::write(&marker, "destroyed").map_err(enclave_client::Error::from) }
                .boxed()
        }),
        options,
    )
}

#[cfg(unix)]
#[test]
fn child_terminated_by_default_signal() {
    use signal_hook::consts::SIGTERM;

    let Some(marker) = std::env::var_os(CHILD_MARKER) else {
        return;
    };
    let lifecycle = marking_lifecycle(marker.into(), &NetworkOptions::default());
    assert!(lifecycle.is_listening());

    signal_hook::low_level::raise(SIGTERM).unwrap();
    thread::sleep(Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn child_signalled_after_cleanup() {
    use signal_hook::consts::SIGINT;

    let Some(marker) = std::env::var_os(CHILD_MARKER) else {
        return;
    };
    let lifecycle = marking_lifecycle(marker.into(), &NetworkOptions::default());
    smol::block_on(lifecycle.cleanup()).unwrap();
    assert!(!lifecycle.is_listening());
    drop(lifecycle);

    signal_hook::low_level::raise(SIGINT).unwrap();
    thread::sleep(Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn test_default_signal_cleans_up_then_terminates() {
    use signal_hook::consts::SIGTERM;
    use std::os::unix::process::ExitStatusExt;

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("cleanup");

    let status = run_child("child_terminated_by_default_signal", &marker);
    assert_eq!(status.signal(), Some(SIGTERM));
    assert_eq!(std::fs::read_to_string(&marker).unwrap(), "destroyed");
}

#[cfg(unix)]
#[test]
fn test_signal_default_restored_after_cleanup() {
    use signal_hook::consts::SIGINT;
    use std::os::unix::process::ExitStatusExt;

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("cleanup");

    let status = run_child("child_signalled_after_cleanup", &marker);
    assert_eq!(status.signal(), Some(SIGINT));
    assert_eq!(std::fs::read_to_string(&marker).unwrap(), "destroyed");
}
