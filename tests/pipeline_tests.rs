//! Sync pipeline behaviour against in-memory stores

mod common;

use adtech_sync::database::{RowSet, Value};
use adtech_sync::sync::{
    BASE_TABLES, StoreClient, SyncError, SyncMode, SyncPipeline, TableCopier, TableStatus,
    WatermarkStore, Watermarks,
};
use common::{FakeSource, FakeStore, fake_scripts};
use tempfile::{TempDir, tempdir};

struct Harness {
    _dir: TempDir,
    pipeline: SyncPipeline<FakeSource, FakeStore>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let watermarks = WatermarkStore::new(dir.path().join("last_synced_ids.json"));
        let pipeline = SyncPipeline::new(FakeSource::new(), FakeStore::new(), watermarks)
            .with_scripts(Box::new(fake_scripts()));
        Self {
            _dir: dir,
            pipeline,
        }
    }

    fn source(&self) -> &FakeSource {
        self.pipeline.source()
    }

    fn store(&self) -> &FakeStore {
        self.pipeline.store()
    }

    fn persisted(&self) -> Watermarks {
        self.pipeline.watermark_store().load().unwrap().watermarks
    }

    fn seed_all(&self) {
        self.source().add_ids("advertiser", 1..=2);
        self.source().add_ids("campaign", 1..=6);
        self.source().add_ids("impressions", 1..=40);
        self.source().add_ids("clicks", 1..=4);
    }
}

fn marks(pairs: &[(&str, u64)]) -> Watermarks {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

#[tokio::test]
async fn test_full_mode_is_idempotent() {
    let h = Harness::new();
    h.seed_all();

    let first = h.pipeline.run(SyncMode::Full).await.unwrap();
    assert!(first.is_success());
    let after_first: Vec<Vec<i64>> = BASE_TABLES.iter().map(|t| h.store().ids(t)).collect();

    let second = h.pipeline.run(SyncMode::Full).await.unwrap();
    assert!(second.is_success());
    let after_second: Vec<Vec<i64>> = BASE_TABLES.iter().map(|t| h.store().ids(t)).collect();

    assert_eq!(after_first, after_second);
    for table in BASE_TABLES {
        assert_eq!(h.store().ids(table), h.source().ids(table));
    }
}

#[tokio::test]
async fn test_full_mode_does_not_touch_watermarks() {
    let h = Harness::new();
    h.seed_all();

    let report = h.pipeline.run(SyncMode::Full).await.unwrap();
    assert!(report.watermarks.is_none());
    assert!(!h.pipeline.watermark_store().path().exists());
    assert!(h.source().scans().iter().all(|(_, after)| after.is_none()));
}

#[tokio::test]
async fn test_full_mode_truncates_every_target_table_first() {
    let h = Harness::new();
    h.seed_all();
    h.pipeline.run(SyncMode::Full).await.unwrap();

    let truncates = h.store().truncates();
    assert_eq!(
        &truncates[..7],
        &[
            "advertiser",
            "campaign",
            "impressions",
            "clicks",
            "advertiser_stats",
            "campaign_stats",
            "daily_stats"
        ]
    );
    // Analytics tables are truncated again right before their refresh
    assert_eq!(
        &truncates[7..],
        &["advertiser_stats", "campaign_stats", "daily_stats"]
    );
}

#[tokio::test]
async fn test_incremental_scenario_copies_only_new_rows() {
    let h = Harness::new();
    h.source().add_ids("campaign", 1..=5);

    let first = h.pipeline.run(SyncMode::Incremental).await.unwrap();
    assert_eq!(
        first.status("campaign"),
        Some(&TableStatus::Copied { rows: 5, max_id: 5 })
    );
    assert_eq!(h.persisted(), marks(&[("campaign", 5)]));

    h.source().add_ids("campaign", 6..=8);
    h.store().clear_log();

    let second = h.pipeline.run(SyncMode::Incremental).await.unwrap();
    assert_eq!(h.store().inserts_into("campaign"), vec![vec![6, 7, 8]]);
    assert_eq!(h.persisted(), marks(&[("campaign", 8)]));
    assert_eq!(second.watermarks, Some(marks(&[("campaign", 8)])));
    assert_eq!(h.store().ids("campaign"), (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_incremental_scans_past_each_watermark() {
    let h = Harness::new();
    h.seed_all();
    h.pipeline
        .watermark_store()
        .save(&marks(&[("advertiser", 2), ("impressions", 30)]))
        .unwrap();

    h.pipeline.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(
        h.source().scans(),
        vec![
            ("advertiser".to_string(), Some(2)),
            ("campaign".to_string(), None),
            ("impressions".to_string(), Some(30)),
            ("clicks".to_string(), None),
        ]
    );
    assert_eq!(h.store().inserts_into("impressions"), vec![(31..=40).collect::<Vec<_>>()]);
    assert!(h.store().inserts_into("advertiser").is_empty());
}

#[tokio::test]
async fn test_empty_delta_is_a_noop() {
    let h = Harness::new();
    h.seed_all();
    h.pipeline.run(SyncMode::Incremental).await.unwrap();
    let before = h.persisted();
    h.store().clear_log();

    let report = h.pipeline.run(SyncMode::Incremental).await.unwrap();

    assert!(h.store().inserts().is_empty());
    for table in BASE_TABLES {
        assert_eq!(report.status(table), Some(&TableStatus::UpToDate));
    }
    assert_eq!(h.persisted(), before);
    assert_eq!(report.rows_copied(), 0);
}

#[tokio::test]
async fn test_no_loss_across_incremental_runs() {
    let h = Harness::new();
    let batches = [1..=3, 4..=4, 5..=11, 12..=12];

    for batch in batches {
        h.source().add_ids("impressions", batch.clone());
        h.source().add_ids("clicks", batch);
        h.pipeline.run(SyncMode::Incremental).await.unwrap();
    }
    // A run with nothing new in between
    h.pipeline.run(SyncMode::Incremental).await.unwrap();

    for table in ["impressions", "clicks"] {
        assert_eq!(h.store().ids(table), h.source().ids(table));
    }
    assert_eq!(h.persisted(), marks(&[("clicks", 12), ("impressions", 12)]));
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let h = Harness::new();
    h.seed_all();
    h.pipeline
        .watermark_store()
        .save(&marks(&[("impressions", 10), ("clicks", 1)]))
        .unwrap();
    h.source().fail_table("impressions");

    let report = h.pipeline.run(SyncMode::Incremental).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed_tables(), vec!["impressions"]);
    assert!(matches!(
        report.status("impressions"),
        Some(TableStatus::Failed { .. })
    ));
    assert_eq!(
        report.status("clicks"),
        Some(&TableStatus::Copied { rows: 3, max_id: 4 })
    );

    let persisted = h.persisted();
    assert_eq!(persisted.get("impressions"), Some(10));
    assert_eq!(persisted.get("clicks"), Some(4));
    assert_eq!(persisted.get("campaign"), Some(6));

    // The next run retries impressions from the same boundary
    h.source().heal_table("impressions");
    h.pipeline.run(SyncMode::Incremental).await.unwrap();
    assert_eq!(h.persisted().get("impressions"), Some(40));
    assert!(
        h.source()
            .scans()
            .contains(&("impressions".to_string(), Some(10)))
    );
}

#[tokio::test]
async fn test_insert_failure_keeps_old_watermark() {
    let h = Harness::new();
    h.source().add_ids("campaign", 1..=3);
    h.source().add_ids("advertiser", 1..=1);
    h.store().fail_insert("campaign");

    let report = h.pipeline.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.failed_tables(), vec!["campaign"]);
    assert_eq!(h.persisted(), marks(&[("advertiser", 1)]));
}

#[tokio::test]
async fn test_refresh_failure_aborts_before_watermarks() {
    let h = Harness::new();
    h.source().add_ids("campaign", 1..=3);
    h.store().fail_script("REFRESH campaign_stats");

    let err = h.pipeline.run(SyncMode::Incremental).await.unwrap_err();

    match err {
        SyncError::Refresh { table, .. } => assert_eq!(table, "campaign_stats"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!h.pipeline.watermark_store().path().exists());
    // Base tables were still copied
    assert_eq!(h.store().ids("campaign"), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_schema_failure_is_fatal() {
    let h = Harness::new();
    h.seed_all();
    h.store().fail_script("CREATE impressions");

    let err = h.pipeline.run(SyncMode::Full).await.unwrap_err();

    assert!(matches!(err, SyncError::Schema { ref table, .. } if table == "impressions"));
    assert!(h.source().scans().is_empty());
}

#[tokio::test]
async fn test_truncate_failure_is_recorded_not_fatal() {
    let h = Harness::new();
    h.seed_all();
    h.store().fail_truncate("campaign");

    let report = h.pipeline.run(SyncMode::Full).await.unwrap();

    assert_eq!(report.truncate_failures.len(), 1);
    assert_eq!(report.truncate_failures[0].0, "campaign");
    assert!(report.is_success());
    assert!(h.store().truncates().contains(&"clicks".to_string()));
}

#[tokio::test]
async fn test_refreshes_run_in_order_after_copies() {
    let h = Harness::new();
    h.seed_all();
    h.pipeline.run(SyncMode::Full).await.unwrap();

    let scripts = h.store().scripts();
    let refreshes: Vec<&str> = scripts
        .iter()
        .filter(|s| s.starts_with("REFRESH"))
        .map(String::as_str)
        .collect();
    assert_eq!(
        refreshes,
        vec![
            "REFRESH advertiser_stats",
            "REFRESH campaign_stats",
            "REFRESH daily_stats"
        ]
    );
    assert_eq!(scripts.iter().filter(|s| s.starts_with("CREATE")).count(), 7);
}

#[tokio::test]
async fn test_corrupt_watermark_file_means_full_scan() {
    let h = Harness::new();
    h.seed_all();
    std::fs::write(h.pipeline.watermark_store().path(), "{ nope").unwrap();

    let report = h.pipeline.run(SyncMode::Incremental).await.unwrap();

    assert!(h.source().scans().iter().all(|(_, after)| after.is_none()));
    assert_eq!(
        report.watermarks,
        Some(marks(&[
            ("advertiser", 2),
            ("campaign", 6),
            ("clicks", 4),
            ("impressions", 40)
        ]))
    );
}

#[tokio::test]
async fn test_watermark_only_moves_forward() {
    let h = Harness::new();
    h.pipeline
        .watermark_store()
        .save(&marks(&[("clicks", 50)]))
        .unwrap();
    // Rows behind the watermark are never re-read
    h.source().add_ids("clicks", 1..=20);
    h.source().add_ids("clicks", [51, 60]);

    h.pipeline.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(h.store().inserts_into("clicks"), vec![vec![51, 60]]);
    assert_eq!(h.persisted().get("clicks"), Some(60));
}

#[tokio::test]
async fn test_copier_empty_result_skips_insert() {
    let source = FakeSource::new();
    source.add_ids("campaign", 1..=3);
    let store = FakeStore::new();
    let scripts = fake_scripts();
    let client = StoreClient::new(&store, &scripts);
    let copier = TableCopier::new(&source, &client);

    let copied = copier
        .copy("campaign", SyncMode::Incremental, Some(3))
        .await
        .unwrap();
    assert!(copied.is_none());
    assert!(store.inserts().is_empty());

    // Full mode ignores the watermark
    let copied = copier
        .copy("campaign", SyncMode::Full, Some(3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(copied.rows, 3);
    assert_eq!(copied.max_id, 3);
}

#[tokio::test]
async fn test_copier_rejects_rows_without_ids() {
    let source = FakeSource::new();
    source.add_rows(
        "advertiser",
        RowSet::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Int(1), Value::from("Advertiser A")],
                vec![Value::Null, Value::from("Advertiser B")],
            ],
        ),
    );
    let store = FakeStore::new();
    let scripts = fake_scripts();
    let client = StoreClient::new(&store, &scripts);

    let err = TableCopier::new(&source, &client)
        .copy("advertiser", SyncMode::Full, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::InvalidId { .. }));
    assert!(store.inserts().is_empty());
}
