use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use rollcall::cache::ActionCache;
use rollcall::clock::FacilityClock;
use rollcall::config::QrIssuance;
use rollcall::db;
use rollcall::engine::Engine;
use rollcall::model::ScanAction;
use rollcall::notify::{Dispatcher, NotificationHub, SmsSender};
use std::sync::Arc;
use std::time::Duration;

const FACILITY: &str = "sunrise";

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

struct SilentSms;

#[async_trait::async_trait]
impl SmsSender for SilentSms {
    async fn send(&self, _to: &str, _message: &str) -> Result<bool> {
        Ok(true)
    }
}

async fn setup() -> (sqlx::SqlitePool, Engine) {
    let pool = setup_pool().await;
    let cache = Arc::new(ActionCache::new(Duration::from_secs(300)));
    let clock = FacilityClock::from_offset_hours(3).unwrap();
    let hub = Arc::new(NotificationHub::new(16));
    let dispatcher = Dispatcher::new(pool.clone(), hub, Some(Arc::new(SilentSms)));
    let engine = Engine::new(
        pool.clone(),
        cache,
        clock,
        dispatcher,
        FACILITY.to_string(),
        QrIssuance::Daily,
    );
    (pool, engine)
}

fn local_time(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, hour - 3, minute, 0).unwrap()
}

fn todays_code() -> String {
    format!("{}-2024-10-01", FACILITY)
}

/// Runs a full check-in + pick-up day for one child, producing two
/// notifications of distinct kinds.
async fn seed_full_day(pool: &sqlx::SqlitePool, engine: &Engine) -> i64 {
    let guardian = db::insert_guardian(pool, "Dana", "GUARDIAN", None)
        .await
        .unwrap();
    db::insert_child(pool, guardian, "Milo").await.unwrap();

    let checked_in = engine
        .process_scan(guardian, &todays_code(), local_time(9, 0))
        .await
        .unwrap();
    assert!(checked_in.success);
    let picked_up = engine
        .process_scan(guardian, &todays_code(), local_time(15, 0))
        .await
        .unwrap();
    assert!(picked_up.success);

    guardian
}

#[tokio::test]
async fn one_notification_per_committed_transition_newest_first() {
    let (pool, engine) = setup().await;
    seed_full_day(&pool, &engine).await;

    let feed = db::list_notifications(&pool, None).await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].kind, ScanAction::PickUp);
    assert_eq!(feed[1].kind, ScanAction::CheckIn);
    assert!(feed[0].created_at > feed[1].created_at);
}

#[tokio::test]
async fn feed_filters_by_kind() {
    let (pool, engine) = setup().await;
    seed_full_day(&pool, &engine).await;

    let check_ins = db::list_notifications(&pool, Some(ScanAction::CheckIn))
        .await
        .unwrap();
    assert_eq!(check_ins.len(), 1);
    assert!(check_ins[0].message.contains("checked in"));

    let pick_ups = db::list_notifications(&pool, Some(ScanAction::PickUp))
        .await
        .unwrap();
    assert_eq!(pick_ups.len(), 1);
    assert!(pick_ups[0].message.contains("picked up"));
}

#[tokio::test]
async fn mark_one_read_is_idempotent() {
    let (pool, engine) = setup().await;
    seed_full_day(&pool, &engine).await;

    let feed = db::list_notifications(&pool, None).await.unwrap();
    let target = feed[0].id.clone();

    assert!(db::mark_notification_read(&pool, &target).await.unwrap());
    assert_eq!(db::count_unread_notifications(&pool).await.unwrap(), 1);

    // Marking again succeeds and changes nothing.
    assert!(db::mark_notification_read(&pool, &target).await.unwrap());
    assert_eq!(db::count_unread_notifications(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn marking_an_unknown_id_reports_not_found() {
    let (pool, _engine) = setup().await;
    assert!(!db::mark_notification_read(&pool, "no-such-id")
        .await
        .unwrap());
}

#[tokio::test]
async fn mark_all_read_ignores_kind_and_clear_removes_everything() {
    let (pool, engine) = setup().await;
    seed_full_day(&pool, &engine).await;

    let updated = db::mark_all_notifications_read(&pool).await.unwrap();
    assert_eq!(updated, 2);
    assert_eq!(db::count_unread_notifications(&pool).await.unwrap(), 0);

    // Idempotent: a second pass still reports the rows it touched.
    db::mark_all_notifications_read(&pool).await.unwrap();
    assert_eq!(db::count_unread_notifications(&pool).await.unwrap(), 0);

    let cleared = db::clear_notifications(&pool).await.unwrap();
    assert_eq!(cleared, 2);
    assert!(db::list_notifications(&pool, None).await.unwrap().is_empty());

    assert_eq!(db::clear_notifications(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn notifications_reference_child_and_guardian() {
    let (pool, engine) = setup().await;
    let guardian = seed_full_day(&pool, &engine).await;

    let feed = db::list_notifications(&pool, None).await.unwrap();
    for note in feed {
        assert_eq!(note.guardian_id, guardian);
        assert!(note.child_id > 0);
        assert!(!note.read);
    }
}
