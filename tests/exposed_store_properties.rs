//! Integration tests exercising `ExposedRepository` through the in-memory
//! fake: idempotent upload and bucket monotonicity, the two properties
//! spec'd for the exposed-key store, driven without a live Postgres
//! connection.

use gaen_exposure_server::download::resolve_last_tag;
use gaen_exposure_server::model::Tek;
use gaen_exposure_server::store::exposed::ExposedRepository;
use gaen_exposure_server::store::fake::InMemoryExposedStore;

const BUCKET_MS: i64 = 7_200_000;

fn key(byte: u8, rolling_start: u32) -> Tek {
    Tek {
        key_data: vec![byte; 16],
        rolling_start_number: rolling_start,
        rolling_period: 144,
        transmission_risk_level: 1,
        fake: 0,
        origin: None,
        report_type: None,
        days_since_onset_of_symptoms: None,
    }
}

#[tokio::test]
async fn upsert_is_idempotent_on_key_data_and_rolling_start() {
    let store = InMemoryExposedStore::new();
    let k = key(1, 0);

    let first = store.upsert_exposed(&[k.clone()], 0, Some("ES")).await.unwrap();
    assert_eq!(first, 1);

    // re-upload of the same (key_data, rolling_start) inserts nothing
    let second = store.upsert_exposed(&[k.clone()], 0, Some("ES")).await.unwrap();
    assert_eq!(second, 0);

    let rows = store
        .get_sorted_exposed_since(0, 10 * BUCKET_MS, BUCKET_MS, None, None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn upsert_treats_distinct_rolling_starts_as_distinct_rows() {
    let store = InMemoryExposedStore::new();
    let a = key(1, 0);
    let b = key(1, 144); // same key bytes, different rolling window

    let inserted = store.upsert_exposed(&[a, b], 0, None).await.unwrap();
    assert_eq!(inserted, 2);
}

#[tokio::test]
async fn a_row_is_invisible_until_its_release_bucket_fully_closes() {
    let store = InMemoryExposedStore::new();
    let received_at = 3 * BUCKET_MS;
    store.upsert_exposed(&[key(1, 0)], received_at, None).await.unwrap();

    // now is still inside the bucket the row landed in: not yet visible
    let still_open = store
        .get_sorted_exposed_since(0, received_at + BUCKET_MS / 2, BUCKET_MS, None, None)
        .await
        .unwrap();
    assert!(still_open.is_empty());

    // now has advanced past the bucket boundary: visible
    let closed = store
        .get_sorted_exposed_since(0, received_at + BUCKET_MS, BUCKET_MS, None, None)
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
}

#[tokio::test]
async fn visibility_is_monotonic_as_now_advances() {
    let store = InMemoryExposedStore::new();
    let received_at = 5 * BUCKET_MS;
    store.upsert_exposed(&[key(1, 0)], received_at, None).await.unwrap();

    let mut was_visible = false;
    for step in 0..20 {
        let now = received_at + step * (BUCKET_MS / 4);
        let rows = store
            .get_sorted_exposed_since(0, now, BUCKET_MS, None, None)
            .await
            .unwrap();
        let visible = !rows.is_empty();
        // once visible, it never goes back to invisible as now advances further
        assert!(!(was_visible && !visible));
        was_visible = was_visible || visible;
    }
    assert!(was_visible);
}

#[tokio::test]
async fn visited_countries_filter_matches_the_threaded_country() {
    let store = InMemoryExposedStore::new();
    store.upsert_exposed(&[key(1, 0)], 0, Some("ES")).await.unwrap();
    store.upsert_exposed(&[key(2, 0)], 0, Some("FR")).await.unwrap();

    let es_only = store
        .get_sorted_exposed_since(0, 10 * BUCKET_MS, BUCKET_MS, Some(&["ES".to_string()]), None)
        .await
        .unwrap();
    assert_eq!(es_only.len(), 1);
    assert_eq!(es_only[0].country.as_deref(), Some("ES"));
}

#[tokio::test]
async fn clean_db_prunes_rows_past_retention_and_keeps_the_rest() {
    let store = InMemoryExposedStore::new();
    let retention_ms = 14 * 86_400_000;
    let now = 100 * 86_400_000i64;

    let stale = key(1, 0); // ends far in the past
    let mut fresh = key(2, 0);
    fresh.rolling_start_number = ((now - retention_ms / 2) / gaen_exposure_server::time::TEN_MINUTES_MS) as u32;

    store.upsert_exposed(&[stale, fresh], 0, None).await.unwrap();
    let pruned = store.clean_db(now, retention_ms).await.unwrap();
    assert_eq!(pruned, 1);

    let remaining = store
        .get_sorted_exposed_since(0, now + retention_ms, BUCKET_MS, None, None)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
}

#[test]
fn resolve_last_tag_clamps_a_missing_tag_to_the_retention_floor() {
    let bucket = 600_000;
    let retention = 14 * 86_400_000;
    let now = 1_000 * bucket;
    let min_tag = gaen_exposure_server::time::bucket_start(now - retention, bucket);
    assert_eq!(resolve_last_tag(None, now, bucket, retention).unwrap(), min_tag);
}

#[test]
fn resolve_last_tag_rejects_a_tag_from_the_future() {
    let bucket = 600_000;
    let retention = 14 * 86_400_000;
    let now = 1_000 * bucket;
    assert!(resolve_last_tag(Some(now + bucket), now, bucket, retention).is_err());
}
