//! Concurrent writers racing on namespace creation.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde_json::json;
use vcm_metrics::backend::RecoveredNamespace;
use vcm_metrics::{
    ClusterId, ClusterStore, Error, ErrorKind, MemoryBackend, NamespaceWriter, Payload,
    StorageBackend, SystemClock,
};

const WRITERS: usize = 16;
const APPENDS_PER_WRITER: usize = 25;

fn probe(writer: usize, i: usize) -> Payload {
    json!({"writer": writer, "i": i})
        .as_object()
        .cloned()
        .unwrap()
}

/// Memory backend that counts namespace creations.
#[derive(Debug, Default)]
struct CountingBackend {
    inner: MemoryBackend,
    created: AtomicUsize,
}

impl StorageBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn create_namespace(&self, cluster: &ClusterId) -> vcm_metrics::Result<Box<dyn NamespaceWriter>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_namespace(cluster)
    }

    fn recover(&self) -> vcm_metrics::Result<Vec<RecoveredNamespace>> {
        self.inner.recover()
    }
}

/// Backend whose medium is never reachable.
#[derive(Debug)]
struct UnreachableBackend;

impl StorageBackend for UnreachableBackend {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn create_namespace(&self, cluster: &ClusterId) -> vcm_metrics::Result<Box<dyn NamespaceWriter>> {
        Err(Error::StoreUnavailable {
            reason: format!("cannot reach medium for '{cluster}'"),
        })
    }

    fn recover(&self) -> vcm_metrics::Result<Vec<RecoveredNamespace>> {
        Ok(Vec::new())
    }
}

fn counting_store() -> (ClusterStore, Arc<CountingBackend>) {
    let backend = Arc::new(CountingBackend::default());
    let store = ClusterStore::with_backend(
        Arc::clone(&backend) as Arc<dyn StorageBackend>,
        Arc::new(SystemClock),
    )
    .unwrap();
    (store, backend)
}

#[test]
fn concurrent_first_writes_create_one_namespace() {
    let (store, backend) = counting_store();

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = store.clone();
            thread::spawn(move || {
                store
                    .append("eiger", "home-response", &probe(writer, 0))
                    .unwrap()
                    .sequence_id
            })
        })
        .collect();

    let ids: HashSet<u64> = handles.into_iter().map(|h| h.join().unwrap().0).collect();

    assert_eq!(backend.created.load(Ordering::SeqCst), 1);
    assert_eq!(store.namespace_count(), 1);
    assert_eq!(store.record_count("eiger"), WRITERS);
    assert_eq!(ids.len(), WRITERS);
    assert_eq!(ids, (1..=WRITERS as u64).collect());
}

#[test]
fn concurrent_writers_on_many_clusters() {
    let (store, backend) = counting_store();
    let clusters = ["eiger", "daint", "bristen", "clariden"];

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..APPENDS_PER_WRITER {
                    let cluster = clusters[(writer + i) % clusters.len()];
                    store.append(cluster, "scratch-response", &probe(writer, i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(backend.created.load(Ordering::SeqCst), clusters.len());
    assert_eq!(store.namespace_count(), clusters.len());
    let total: usize = clusters.iter().map(|c| store.record_count(c)).sum();
    assert_eq!(total, WRITERS * APPENDS_PER_WRITER);

    for cluster in clusters {
        let series = store
            .latest_n(cluster, "scratch-response", WRITERS * APPENDS_PER_WRITER)
            .unwrap();
        let ids: HashSet<u64> = series.iter().map(|m| m.sequence_id.0).collect();
        assert_eq!(ids.len(), series.len(), "duplicate sequence id in {cluster}");
    }
}

#[test]
fn readers_never_see_a_partial_namespace() {
    let store = ClusterStore::in_memory();

    let writer = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 0..200 {
                store.append("daint", "node-status", &probe(0, i)).unwrap();
            }
        })
    };
    let reader = {
        let store = store.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                match store.latest("daint", "node-status") {
                    Ok(m) => assert!(m.sequence_id.0 >= 1),
                    Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound),
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(store.record_count("daint"), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blocking_tasks_share_one_namespace() {
    let (store, backend) = counting_store();

    let tasks: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = store.clone();
            tokio::task::spawn_blocking(move || {
                store.append("clariden", "slurm-info", &probe(writer, 0))
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(backend.created.load(Ordering::SeqCst), 1);
    assert_eq!(store.record_count("clariden"), WRITERS);
}

#[test]
fn unavailable_medium_is_retryable_and_leaves_no_namespace() {
    let store =
        ClusterStore::with_backend(Arc::new(UnreachableBackend), Arc::new(SystemClock)).unwrap();

    let err = store.append("eiger", "home-response", &probe(0, 0)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(err.is_retryable());
    assert_eq!(store.namespace_count(), 0);
    assert_eq!(
        store.latest("eiger", "home-response").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}
