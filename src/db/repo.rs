use super::model::{ChildForScan, ScanGuardian};
use crate::model::{AttendanceStatus, ChildStatus, Notification, ScanAction};
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    ensure_sqlite_parent_dir(database_url);
    let pool = SqlitePool::connect(database_url).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, create the parent directory so a first run
/// does not fail on a missing data dir. In-memory URLs are left untouched.
fn ensure_sqlite_parent_dir(url: &str) {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return;
    };
    if rest.starts_with(":memory:") || rest.is_empty() {
        return;
    }
    let path = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_guardian(
    pool: &Pool,
    name: &str,
    role: &str,
    phone: Option<&str>,
) -> Result<i64> {
    let rec = sqlx::query("INSERT INTO guardians (name, role, phone) VALUES (?, ?, ?) RETURNING id")
        .bind(name)
        .bind(role)
        .bind(phone)
        .fetch_one(pool)
        .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn insert_child(pool: &Pool, guardian_id: i64, name: &str) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO children (guardian_id, name, status) VALUES (?, ?, 'ABSENT') RETURNING id",
    )
    .bind(guardian_id)
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn guardian_by_id(pool: &Pool, guardian_id: i64) -> Result<Option<ScanGuardian>> {
    let row = sqlx::query("SELECT id, name, role, phone FROM guardians WHERE id = ?")
        .bind(guardian_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| ScanGuardian {
        id: row.get("id"),
        name: row.get("name"),
        role: row.get("role"),
        phone: row.get("phone"),
    }))
}

#[instrument(skip_all)]
pub async fn children_of(pool: &Pool, guardian_id: i64) -> Result<Vec<ChildForScan>> {
    let rows = sqlx::query("SELECT id, name, status FROM children WHERE guardian_id = ? ORDER BY id")
        .bind(guardian_id)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let status_str: String = row.get("status");
            let status = ChildStatus::parse_status(&status_str)
                .ok_or_else(|| anyhow!("child {} has unknown status {}", id, status_str))?;
            Ok(ChildForScan {
                id,
                name: row.get("name"),
                status,
            })
        })
        .collect()
}

#[instrument(skip_all)]
pub async fn child_status(pool: &Pool, child_id: i64) -> Result<Option<ChildStatus>> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM children WHERE id = ?")
        .bind(child_id)
        .fetch_optional(pool)
        .await?;
    match status {
        Some(s) => ChildStatus::parse_status(&s)
            .map(Some)
            .ok_or_else(|| anyhow!("child {} has unknown status {}", child_id, s)),
        None => Ok(None),
    }
}

#[instrument(skip_all)]
pub async fn set_child_status(pool: &Pool, child_id: i64, status: ChildStatus) -> Result<()> {
    sqlx::query("UPDATE children SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(status.as_str())
        .bind(child_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Commit a check-in: flip the child ABSENT→PRESENT and open today's
/// attendance record, in one transaction. Both writes are conditional, so the
/// loser of a concurrent race sees zero affected rows and the whole
/// transition is rolled back. Returns false in that case.
#[instrument(skip_all)]
pub async fn record_check_in(
    pool: &Pool,
    child_id: i64,
    date: NaiveDate,
    at: DateTime<Utc>,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let flipped = sqlx::query(
        "UPDATE children SET status = 'PRESENT', updated_at = ? WHERE id = ? AND status = 'ABSENT'",
    )
    .bind(at)
    .bind(child_id)
    .execute(&mut *tx)
    .await?;
    if flipped.rows_affected() == 0 {
        return Ok(false);
    }

    // The partial unique index on open records turns a duplicate check-in
    // into zero affected rows here.
    let opened = sqlx::query(
        "INSERT OR IGNORE INTO attendance (child_id, date, status, check_in_time) \
         VALUES (?, ?, 'PRESENT', ?)",
    )
    .bind(child_id)
    .bind(date)
    .bind(at)
    .execute(&mut *tx)
    .await?;
    if opened.rows_affected() == 0 {
        return Ok(false);
    }

    tx.commit().await?;
    Ok(true)
}

/// Commit a pick-up: close today's open attendance record and flip the child
/// PRESENT→PICKED_UP, in one transaction. Returns false when there is no open
/// record or the status already moved, i.e. a concurrent scan won.
#[instrument(skip_all)]
pub async fn record_pick_up(
    pool: &Pool,
    child_id: i64,
    date: NaiveDate,
    at: DateTime<Utc>,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let closed = sqlx::query(
        "UPDATE attendance SET check_out_time = ?, status = 'ABSENT' \
         WHERE child_id = ? AND date = ? AND check_out_time IS NULL",
    )
    .bind(at)
    .bind(child_id)
    .bind(date)
    .execute(&mut *tx)
    .await?;
    if closed.rows_affected() == 0 {
        return Ok(false);
    }

    let flipped = sqlx::query(
        "UPDATE children SET status = 'PICKED_UP', updated_at = ? WHERE id = ? AND status = 'PRESENT'",
    )
    .bind(at)
    .bind(child_id)
    .execute(&mut *tx)
    .await?;
    if flipped.rows_affected() == 0 {
        return Ok(false);
    }

    tx.commit().await?;
    Ok(true)
}

#[instrument(skip_all)]
pub async fn open_attendance_record(
    pool: &Pool,
    child_id: i64,
    date: NaiveDate,
) -> Result<Option<crate::model::AttendanceRecord>> {
    let row = sqlx::query(
        "SELECT id, child_id, date, status, check_in_time, check_out_time \
         FROM attendance WHERE child_id = ? AND date = ? AND check_out_time IS NULL",
    )
    .bind(child_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_attendance).transpose()
}

#[instrument(skip_all)]
pub async fn attendance_for_day(
    pool: &Pool,
    child_id: i64,
    date: NaiveDate,
) -> Result<Vec<crate::model::AttendanceRecord>> {
    let rows = sqlx::query(
        "SELECT id, child_id, date, status, check_in_time, check_out_time \
         FROM attendance WHERE child_id = ? AND date = ? ORDER BY id",
    )
    .bind(child_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_attendance).collect()
}

fn row_to_attendance(row: sqlx::sqlite::SqliteRow) -> Result<crate::model::AttendanceRecord> {
    let id: i64 = row.get("id");
    let status_str: String = row.get("status");
    let status = AttendanceStatus::parse_status(&status_str)
        .ok_or_else(|| anyhow!("attendance record {} has unknown status {}", id, status_str))?;
    Ok(crate::model::AttendanceRecord {
        id,
        child_id: row.get("child_id"),
        date: row.get("date"),
        status,
        check_in_time: row.get("check_in_time"),
        check_out_time: row.get("check_out_time"),
    })
}

#[instrument(skip_all)]
pub async fn insert_notification(pool: &Pool, note: &Notification) -> Result<()> {
    sqlx::query(
        "INSERT INTO notifications (id, kind, message, read, created_at, child_id, guardian_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&note.id)
    .bind(note.kind.as_str())
    .bind(&note.message)
    .bind(note.read)
    .bind(note.created_at)
    .bind(note.child_id)
    .bind(note.guardian_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Feed query, newest first. `kind` narrows to check-ins or pick-ups.
#[instrument(skip_all)]
pub async fn list_notifications(pool: &Pool, kind: Option<ScanAction>) -> Result<Vec<Notification>> {
    let rows = match kind {
        Some(kind) => {
            sqlx::query(
                "SELECT id, kind, message, read, created_at, child_id, guardian_id \
                 FROM notifications WHERE kind = ? ORDER BY created_at DESC, rowid DESC",
            )
            .bind(kind.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT id, kind, message, read, created_at, child_id, guardian_id \
                 FROM notifications ORDER BY created_at DESC, rowid DESC",
            )
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter()
        .map(|row| {
            let id: String = row.get("id");
            let kind_str: String = row.get("kind");
            let kind = ScanAction::parse_action(&kind_str)
                .ok_or_else(|| anyhow!("notification {} has unknown kind {}", id, kind_str))?;
            Ok(Notification {
                id,
                kind,
                message: row.get("message"),
                read: row.get("read"),
                created_at: row.get("created_at"),
                child_id: row.get("child_id"),
                guardian_id: row.get("guardian_id"),
            })
        })
        .collect()
}

/// Mark one notification read. Idempotent; returns false only when the id is
/// unknown.
#[instrument(skip_all)]
pub async fn mark_notification_read(pool: &Pool, id: &str) -> Result<bool> {
    let res = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Mark every notification read regardless of kind. Idempotent.
#[instrument(skip_all)]
pub async fn mark_all_notifications_read(pool: &Pool) -> Result<u64> {
    let res = sqlx::query("UPDATE notifications SET read = 1")
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

/// Hard-delete the whole feed. Irreversible.
#[instrument(skip_all)]
pub async fn clear_notifications(pool: &Pool) -> Result<u64> {
    let res = sqlx::query("DELETE FROM notifications").execute(pool).await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn count_unread_notifications(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE read = 0")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
