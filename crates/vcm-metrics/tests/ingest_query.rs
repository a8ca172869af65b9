//! End-to-end ingest and query tests through the public API.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use vcm_metrics::{
    Clock, ClusterStore, ErrorKind, ManualClock, MemoryBackend, Payload, QueryService, SLURM_INFO_LABEL,
    bucket, expand, normalize,
};

fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => panic!("test payload must be an object"),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap()
}

fn store_at(clock: &ManualClock) -> ClusterStore {
    ClusterStore::with_backend(Arc::new(MemoryBackend), Arc::new(clock.clone())).unwrap()
}

fn slurm_snapshot() -> Payload {
    payload(json!({
        "status": "OK",
        "num_nodes_gross": 130,
        "num_nodes_total": 128,
        "num_nodes_allocated": 96,
        "num_nodes_idle": 20,
        "num_finished_jobs": 311,
        "running_jobs": [
            {"slurm_job_id": "5001", "num_nodes": 64},
            {"slurm_job_id": "5002_3", "num_nodes": 1},
            {"slurm_job_id": "5002_4", "num_nodes": 1},
        ],
        "pending_jobs": [
            {"slurm_job_id": "5100_[0-31]", "num_nodes": 1},
            {"slurm_job_id": "5101", "num_nodes": 512},
        ],
    }))
}

#[test]
fn documented_band_table() {
    let cases = [
        (1, 0),
        (2, 1),
        (3, 2),
        (4, 2),
        (8, 3),
        (9, 4),
        (16, 4),
        (17, 5),
        (32, 5),
        (33, 6),
        (64, 6),
        (65, 7),
        (128, 7),
        (129, 8),
        (256, 8),
        (257, 9),
        (1000, 9),
    ];
    for (nodes, band) in cases {
        assert_eq!(bucket(nodes).unwrap(), band, "bucket({nodes})");
    }
    assert_eq!(bucket(0).unwrap_err().kind(), ErrorKind::InvalidInput);
}

#[test]
fn documented_expansions() {
    assert_eq!(expand("123_[5-9]"), 5);
    assert_eq!(expand("123_4"), 1);
    assert_eq!(expand("123_[10-10]"), 1);
}

#[test]
fn slurm_snapshot_round_trip() {
    let clock = ManualClock::new(now());
    let store = store_at(&clock);
    let input = slurm_snapshot();

    let stored = store.append("eiger", SLURM_INFO_LABEL, &input).unwrap();
    let latest = store.latest("eiger", SLURM_INFO_LABEL).unwrap();

    assert_eq!(latest.payload, normalize(SLURM_INFO_LABEL, &input).unwrap());
    assert_eq!(latest.sequence_id, stored.sequence_id);
    assert_eq!(latest.recorded_at, now());
    assert_eq!(
        latest.payload["running_histogram"],
        json!([2, 0, 0, 0, 0, 0, 1, 0, 0, 0])
    );
    assert_eq!(
        latest.payload["pending_histogram"],
        json!([32, 0, 0, 0, 0, 0, 0, 0, 0, 1])
    );
    assert_eq!(latest.payload["status"], json!("OK"));
    assert_eq!(latest.payload["num_finished_jobs"], json!(311));
}

#[test]
fn normalize_is_repeatable() {
    let input = slurm_snapshot();
    let first = normalize(SLURM_INFO_LABEL, &input).unwrap();
    let second = normalize(SLURM_INFO_LABEL, &input).unwrap();
    assert_eq!(first, second);
    assert_eq!(input, slurm_snapshot());
}

#[test]
fn latest_three_of_five() {
    let clock = ManualClock::new(now());
    let store = store_at(&clock);
    for i in 1..=5 {
        store
            .append("bristen", "home-response", &payload(json!({"real_time": i})))
            .unwrap();
        clock.advance(Duration::seconds(30));
    }

    let ids: Vec<u64> = store
        .latest_n("bristen", "home-response", 3)
        .unwrap()
        .into_iter()
        .map(|m| m.sequence_id.0)
        .collect();
    assert_eq!(ids, vec![5, 4, 3]);
}

#[test]
fn window_over_minute_offsets() {
    let clock = ManualClock::new(now());
    let store = store_at(&clock);
    for offset in [-200, -100, -10] {
        clock.set(now() + Duration::minutes(offset));
        store
            .append("eiger", "scratch-response", &payload(json!({"offset": offset})))
            .unwrap();
    }
    clock.set(now());

    let found = store
        .window("eiger", "scratch-response", now() - Duration::minutes(150), now())
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].payload["offset"], json!(-100));
    assert_eq!(found[1].payload["offset"], json!(-10));
}

#[test]
fn latest_on_unwritten_cluster_is_not_found() {
    let store = ClusterStore::in_memory();
    let err = store.latest("daint", SLURM_INFO_LABEL).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.http_status(), 404);
    assert!(!err.is_retryable());
}

#[test]
fn dashboard_history_for_a_day() {
    let clock = ManualClock::new(now() - Duration::hours(3));
    let store = store_at(&clock);
    for allocated in [90, 95, 100] {
        let mut snapshot = slurm_snapshot();
        snapshot.insert("num_nodes_allocated".to_string(), json!(allocated));
        store.append("eiger", SLURM_INFO_LABEL, &snapshot).unwrap();
        clock.advance(Duration::hours(1));
    }
    assert_eq!(clock.now(), now());

    let queries = QueryService::new(store);
    let history = queries.history("eiger", SLURM_INFO_LABEL, 24 * 60).unwrap();

    assert_eq!(history.count, 3);
    assert_eq!(history.time_shift, vec![3.0, 2.0, 1.0]);
    assert_eq!(
        history.column("num_nodes_allocated").unwrap(),
        &[json!(90), json!(95), json!(100)]
    );
    assert_eq!(history.column("pending_histogram").unwrap().len(), 3);
}
