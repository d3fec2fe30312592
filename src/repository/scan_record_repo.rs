// ==========================================
// 服装生产进度引擎 - 扫码记录数据仓储
// ==========================================
// 对齐: scan_record 表
// 红线: 记录只追加，作废只翻转 scan_result + 写备注，不物理删除
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::scan_event::{CompletionEvent, InvalidationDirective};
use crate::domain::types::{EventKind, ScanResult};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::progress_store_trait::EventStore;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT idempotency_key, order_id, progress_stage, process_name, unit_id,
           quantity, scan_type, scan_result, scan_time,
           operator_id, operator_name, remark
    FROM scan_record
"#;

// ==========================================
// ScanRecordRepository - 扫码记录仓储
// ==========================================
pub struct ScanRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScanRecordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按幂等键查询单条记录
    pub fn find_by_key(&self, idempotency_key: &str) -> RepositoryResult<Option<CompletionEvent>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE idempotency_key = ?1", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![idempotency_key], map_row) {
            Ok(event) => Ok(event),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl EventStore for ScanRecordRepository {
    fn load_events(&self, order_id: &str, kinds: &[EventKind]) -> RepositoryResult<Vec<CompletionEvent>> {
        let conn = self.get_conn()?;

        // 扫码类型在 Rust 侧过滤（scan_type 可能带空白），与 v_scan_stage_done 口径一致
        let sql = format!("{} WHERE order_id = ?1 ORDER BY scan_time ASC, rowid ASC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![order_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .flatten()
            .filter(|e| kinds.is_empty() || kinds.contains(&e.kind))
            .collect())
    }

    fn append_event(&self, event: &CompletionEvent) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let inserted = insert_event(&conn, event)?;
        if inserted == 0 {
            tracing::debug!("扫码记录幂等键已存在，忽略: key={}", event.idempotency_key);
        }
        Ok(inserted > 0)
    }

    fn invalidate_events(
        &self,
        order_id: &str,
        directives: &[InvalidationDirective],
        at: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        if directives.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let count = flip_to_failure(&tx, order_id, directives, at)?;
        tx.commit()?;

        tracing::info!("扫码记录已作废: order_id={}, count={}", order_id, count);
        Ok(count)
    }

    fn append_with_invalidation(
        &self,
        marker: &CompletionEvent,
        directives: &[InvalidationDirective],
        at: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        insert_event(&tx, marker)?;
        let count = flip_to_failure(&tx, &marker.order_id, directives, at)?;
        tx.commit()?;

        tracing::info!(
            "退回标记已写入并作废扫码记录: order_id={}, marker={}, count={}",
            marker.order_id,
            marker.idempotency_key,
            count
        );
        Ok(count)
    }
}

fn insert_event(conn: &Connection, event: &CompletionEvent) -> RepositoryResult<usize> {
    let inserted = conn.execute(
        r#"
        INSERT OR IGNORE INTO scan_record (
            idempotency_key, order_id, progress_stage, process_name, unit_id,
            quantity, scan_type, scan_result, scan_time,
            operator_id, operator_name, remark, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?9)
        "#,
        params![
            event.idempotency_key,
            event.order_id,
            event.progress_stage,
            event.process_name,
            event.unit_id,
            event.quantity,
            event.kind.as_str(),
            event.result.as_str(),
            format_ts(&event.scanned_at),
            event.operator_id,
            event.operator_name,
            event.remark,
        ],
    )?;
    Ok(inserted)
}

/// 仅翻转仍为 success 的记录
fn flip_to_failure(
    conn: &Connection,
    order_id: &str,
    directives: &[InvalidationDirective],
    at: NaiveDateTime,
) -> RepositoryResult<usize> {
    let now = format_ts(&at);
    let mut count = 0;
    for d in directives {
        count += conn.execute(
            r#"
            UPDATE scan_record
            SET scan_result = ?1, remark = ?2, updated_at = ?3
            WHERE idempotency_key = ?4 AND order_id = ?5 AND scan_result = ?6
            "#,
            params![
                ScanResult::Failure.as_str(),
                d.remark,
                now,
                d.idempotency_key,
                order_id,
                ScanResult::Success.as_str(),
            ],
        )?;
    }
    Ok(count)
}

/// 行映射（无法识别的扫码类型/时间返回 None，由调用方跳过）
fn map_row(row: &Row<'_>) -> SqliteResult<Option<CompletionEvent>> {
    let key: String = row.get(0)?;
    let raw_kind: String = row.get(6)?;
    let raw_time: String = row.get(8)?;

    let kind = match EventKind::from_str(&raw_kind) {
        Some(k) => k,
        None => {
            tracing::warn!("未知扫码类型，跳过: key={}, scan_type={}", key, raw_kind);
            return Ok(None);
        }
    };
    let scanned_at = match parse_ts(&raw_time) {
        Some(t) => t,
        None => {
            tracing::warn!("扫码时间格式错误，跳过: key={}, scan_time={}", key, raw_time);
            return Ok(None);
        }
    };

    Ok(Some(CompletionEvent {
        idempotency_key: key,
        order_id: row.get(1)?,
        progress_stage: row.get(2)?,
        process_name: row.get(3)?,
        unit_id: row.get(4)?,
        quantity: row.get(5)?,
        kind,
        result: ScanResult::from_str(&row.get::<_, String>(7)?),
        scanned_at,
        operator_id: row.get(9)?,
        operator_name: row.get(10)?,
        remark: row.get(11)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup() -> ScanRecordRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ScanRecordRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn ts(min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(8, min, 0).unwrap()
    }

    #[test]
    fn test_append_is_idempotent() {
        let repo = setup();
        let e = CompletionEvent::new("k1", "O1", "Sewing", 10, EventKind::Production, ts(1)).with_unit("B1");
        assert!(repo.append_event(&e).unwrap());
        assert!(!repo.append_event(&e).unwrap());
        assert_eq!(repo.load_events("O1", &[]).unwrap(), vec![e]);
    }

    #[test]
    fn test_load_filters_kind_and_orders_by_time() {
        let repo = setup();
        repo.append_event(&CompletionEvent::new("k2", "O1", "Quality", 5, EventKind::Quality, ts(5)))
            .unwrap();
        repo.append_event(&CompletionEvent::new("k1", "O1", "Cutting", 5, EventKind::Cutting, ts(1)))
            .unwrap();
        repo.append_event(&CompletionEvent::new("k3", "O2", "Cutting", 5, EventKind::Cutting, ts(2)))
            .unwrap();

        let all: Vec<String> = repo
            .load_events("O1", &[])
            .unwrap()
            .into_iter()
            .map(|e| e.idempotency_key)
            .collect();
        assert_eq!(all, vec!["k1", "k2"]);

        let quality = repo.load_events("O1", &[EventKind::Quality]).unwrap();
        assert_eq!(quality.len(), 1);
        assert_eq!(quality[0].kind, EventKind::Quality);
    }

    #[test]
    fn test_invalidate_only_flips_success() {
        let repo = setup();
        repo.append_event(&CompletionEvent::new("k1", "O1", "Sewing", 5, EventKind::Production, ts(1)))
            .unwrap();
        let directives = vec![InvalidationDirective {
            idempotency_key: "k1".to_string(),
            remark: "已退回至Cutting，后续记录作废".to_string(),
        }];

        assert_eq!(repo.invalidate_events("O1", &directives, ts(9)).unwrap(), 1);
        assert_eq!(repo.invalidate_events("O1", &directives, ts(10)).unwrap(), 0);

        let e = repo.find_by_key("k1").unwrap().unwrap();
        assert_eq!(e.result, ScanResult::Failure);
        assert_eq!(e.remark.as_deref(), Some("已退回至Cutting，后续记录作废"));
        assert_eq!(e.quantity, 5);
    }

    #[test]
    fn test_marker_and_invalidation_are_atomic() {
        let repo = setup();
        repo.append_event(&CompletionEvent::new("k1", "O1", "Sewing", 5, EventKind::Production, ts(1)))
            .unwrap();
        repo.append_event(&CompletionEvent::new("k2", "O1", "Ironing", 5, EventKind::Production, ts(2)))
            .unwrap();
        repo.get_conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_k2 BEFORE UPDATE ON scan_record
                 WHEN OLD.idempotency_key = 'k2'
                 BEGIN SELECT RAISE(ABORT, 'locked'); END;",
            )
            .unwrap();

        let marker = CompletionEvent::new("rollback-1", "O1", "Cutting", 0, EventKind::Production, ts(3));
        let directives: Vec<InvalidationDirective> = ["k1", "k2"]
            .iter()
            .map(|k| InvalidationDirective {
                idempotency_key: k.to_string(),
                remark: "已退回至Cutting，后续记录作废".to_string(),
            })
            .collect();

        assert!(repo.append_with_invalidation(&marker, &directives, ts(4)).is_err());
        assert!(repo.find_by_key("rollback-1").unwrap().is_none());
        assert_eq!(repo.find_by_key("k1").unwrap().unwrap().result, ScanResult::Success);

        repo.get_conn().unwrap().execute_batch("DROP TRIGGER reject_k2;").unwrap();
        assert_eq!(repo.append_with_invalidation(&marker, &directives, ts(5)).unwrap(), 2);
        assert!(repo.find_by_key("rollback-1").unwrap().is_some());
    }
}
