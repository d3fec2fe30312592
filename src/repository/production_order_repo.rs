// ==========================================
// 服装生产进度引擎 - 生产订单数据仓储
// ==========================================
// 对齐: production_order 表
// 红线: 软删除订单 (delete_flag=1) 对引擎不可见
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::order::{ArrivalCompletion, OrderMeta, OrderProgressSnapshot, ProcurementConfirmation};
use crate::domain::types::LifecycleStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::progress_store_trait::OrderStore;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ProductionOrderRepository - 生产订单仓储
// ==========================================
pub struct ProductionOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建订单（已存在时报唯一约束错误）
    pub fn insert(&self, meta: &OrderMeta, at: NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let confirmation = meta.procurement_confirmation.as_ref();
        let arrival = meta.arrival_completion.as_ref();

        conn.execute(
            r#"
            INSERT INTO production_order (
                order_id, order_no, style_no, total_quantity, actual_cut_quantity,
                material_arrival_rate, procurement_manually_completed,
                procurement_confirmed_at, procurement_confirmed_by,
                procurement_confirmed_by_name, procurement_confirm_remark,
                arrival_completed_at, arrival_completed_by, arrival_completed_by_name,
                status, completed_quantity, delete_flag, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 0, ?17)
            "#,
            params![
                meta.order_id,
                meta.order_no,
                meta.style_no,
                meta.total_quantity,
                meta.actual_cut_quantity,
                meta.material_arrival_rate,
                confirmation.is_some() as i32,
                confirmation.map(|c| format_ts(&c.confirmed_at)),
                confirmation.and_then(|c| c.operator_id.clone()),
                confirmation.and_then(|c| c.operator_name.clone()),
                confirmation.map(|c| c.remark.clone()),
                arrival.map(|a| format_ts(&a.completed_at)),
                arrival.and_then(|a| a.operator_id.clone()),
                arrival.and_then(|a| a.operator_name.clone()),
                meta.lifecycle_status.as_str(),
                meta.completed_quantity,
                format_ts(&at),
            ],
        )?;
        Ok(())
    }

    /// 软删除订单
    pub fn soft_delete(&self, order_id: &str, at: NaiveDateTime) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE production_order SET delete_flag = 1, updated_at = ?2 WHERE order_id = ?1",
            params![order_id, format_ts(&at)],
        )?;
        Ok(rows)
    }

    /// 读取已持久化的快照字段（进度、当前环节）
    pub fn find_progress(&self, order_id: &str) -> RepositoryResult<Option<(i32, Option<String>)>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT production_progress, current_stage_name FROM production_order WHERE order_id = ?1",
                params![order_id],
                |row| Ok((row.get::<_, i32>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        Ok(row)
    }
}

impl OrderStore for ProductionOrderRepository {
    fn load_order_meta(&self, order_id: &str) -> RepositoryResult<Option<OrderMeta>> {
        let conn = self.get_conn()?;
        let meta = conn
            .query_row(
                r#"
                SELECT order_id, order_no, style_no, total_quantity, actual_cut_quantity,
                       material_arrival_rate, procurement_manually_completed,
                       procurement_confirmed_at, procurement_confirmed_by,
                       procurement_confirmed_by_name, procurement_confirm_remark,
                       arrival_completed_at, arrival_completed_by, arrival_completed_by_name,
                       status, completed_quantity
                FROM production_order
                WHERE order_id = ?1 AND delete_flag = 0
                "#,
                params![order_id],
                map_meta_row,
            )
            .optional()?;
        Ok(meta)
    }

    fn persist_snapshot(&self, snapshot: &OrderProgressSnapshot, at: NaiveDateTime) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        // 终态只能由同一终态覆盖: 读取 meta 之后被人工完成/报废的订单不被过期快照降级
        let rows = conn.execute(
            r#"
            UPDATE production_order
            SET completed_quantity = ?2,
                production_progress = ?3,
                current_stage_name = ?4,
                status = ?5,
                updated_at = ?6
            WHERE order_id = ?1 AND delete_flag = 0
              AND (status NOT IN (?7, ?8) OR status = ?5)
            "#,
            params![
                snapshot.order_id,
                snapshot.completed_quantity,
                snapshot.progress_percent,
                snapshot.current_stage_name,
                snapshot.lifecycle_status.as_str(),
                format_ts(&at),
                LifecycleStatus::Completed.as_str(),
                LifecycleStatus::Scrapped.as_str(),
            ],
        )?;
        if rows > 0 {
            return Ok(true);
        }

        let stored: Option<String> = conn
            .query_row(
                "SELECT status FROM production_order WHERE order_id = ?1 AND delete_flag = 0",
                params![snapshot.order_id],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(status) => {
                tracing::info!(
                    "订单已处于终态，跳过过期快照: order_id={}, stored={}, snapshot={}",
                    snapshot.order_id,
                    status,
                    snapshot.lifecycle_status
                );
                Ok(false)
            }
            None => Err(RepositoryError::NotFound {
                entity: "ProductionOrder".to_string(),
                id: snapshot.order_id.clone(),
            }),
        }
    }

    fn confirm_procurement(&self, order_id: &str, confirmation: &ProcurementConfirmation) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE production_order
            SET procurement_manually_completed = 1,
                procurement_confirmed_at = ?2,
                procurement_confirmed_by = ?3,
                procurement_confirmed_by_name = ?4,
                procurement_confirm_remark = ?5,
                updated_at = ?2
            WHERE order_id = ?1 AND delete_flag = 0
            "#,
            params![
                order_id,
                format_ts(&confirmation.confirmed_at),
                confirmation.operator_id,
                confirmation.operator_name,
                confirmation.remark,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductionOrder".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }

    fn update_arrival_rate(
        &self,
        order_id: &str,
        rate: i32,
        completion: Option<&ArrivalCompletion>,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE production_order
            SET material_arrival_rate = ?2,
                arrival_completed_at = COALESCE(arrival_completed_at, ?3),
                arrival_completed_by = CASE WHEN arrival_completed_at IS NULL THEN ?4 ELSE arrival_completed_by END,
                arrival_completed_by_name = CASE WHEN arrival_completed_at IS NULL THEN ?5 ELSE arrival_completed_by_name END,
                updated_at = ?6
            WHERE order_id = ?1 AND delete_flag = 0
            "#,
            params![
                order_id,
                rate,
                completion.map(|c| format_ts(&c.completed_at)),
                completion.and_then(|c| c.operator_id.clone()),
                completion.and_then(|c| c.operator_name.clone()),
                format_ts(&at),
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductionOrder".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }

    fn list_order_ids_by_style(&self, style_no: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT order_id FROM production_order WHERE style_no = ?1 AND delete_flag = 0 ORDER BY order_id",
        )?;
        let ids = stmt
            .query_map(params![style_no.trim()], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(ids)
    }
}

fn map_meta_row(row: &Row<'_>) -> SqliteResult<OrderMeta> {
    let order_id: String = row.get(0)?;
    let manually_completed: i32 = row.get(6)?;
    let confirmed_at: Option<String> = row.get(7)?;
    let arrival_at: Option<String> = row.get(11)?;
    let raw_status: String = row.get(14)?;

    let procurement_confirmation = if manually_completed == 1 {
        match confirmed_at.as_deref().and_then(parse_ts) {
            Some(at) => Some(ProcurementConfirmation {
                confirmed_at: at,
                operator_id: row.get(8)?,
                operator_name: row.get(9)?,
                remark: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            }),
            None => {
                tracing::warn!("采购确认时间缺失或格式错误，视为未确认: order_id={}", order_id);
                None
            }
        }
    } else {
        None
    };

    let arrival_completion = match arrival_at.as_deref().and_then(parse_ts) {
        Some(at) => Some(ArrivalCompletion {
            completed_at: at,
            operator_id: row.get(12)?,
            operator_name: row.get(13)?,
        }),
        None => None,
    };

    let lifecycle_status = LifecycleStatus::from_str(&raw_status).unwrap_or_else(|| {
        tracing::warn!("未知订单状态，按未开始处理: order_id={}, status={}", order_id, raw_status);
        LifecycleStatus::NotStarted
    });

    Ok(OrderMeta {
        order_id,
        order_no: row.get(1)?,
        style_no: row.get(2)?,
        total_quantity: row.get(3)?,
        actual_cut_quantity: row.get(4)?,
        material_arrival_rate: row.get(5)?,
        procurement_confirmation,
        arrival_completion,
        lifecycle_status,
        completed_quantity: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup() -> ProductionOrderRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ProductionOrderRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_and_load_round_trip() {
        let repo = setup();
        let mut meta = OrderMeta::new("O1", Some("S1".to_string()), 100);
        meta.material_arrival_rate = 60;
        meta.actual_cut_quantity = 98;
        repo.insert(&meta, ts(8)).unwrap();

        assert_eq!(repo.load_order_meta("O1").unwrap(), Some(meta));
        assert_eq!(repo.load_order_meta("missing").unwrap(), None);
    }

    #[test]
    fn test_soft_deleted_is_invisible() {
        let repo = setup();
        repo.insert(&OrderMeta::new("O1", Some("S1".to_string()), 10), ts(8)).unwrap();
        repo.soft_delete("O1", ts(9)).unwrap();
        assert!(repo.load_order_meta("O1").unwrap().is_none());
        assert!(repo.list_order_ids_by_style("S1").unwrap().is_empty());
    }

    #[test]
    fn test_confirm_and_arrival_stamp_kept() {
        let repo = setup();
        repo.insert(&OrderMeta::new("O1", None, 10), ts(8)).unwrap();

        repo.confirm_procurement(
            "O1",
            &ProcurementConfirmation {
                confirmed_at: ts(9),
                operator_id: Some("u1".to_string()),
                operator_name: Some("张三".to_string()),
                remark: "面料已到齐辅料在途中".to_string(),
            },
        )
        .unwrap();

        let first = ArrivalCompletion {
            completed_at: ts(10),
            operator_id: None,
            operator_name: Some("李四".to_string()),
        };
        repo.update_arrival_rate("O1", 100, Some(&first), ts(10)).unwrap();
        let second = ArrivalCompletion {
            completed_at: ts(11),
            operator_id: None,
            operator_name: Some("王五".to_string()),
        };
        repo.update_arrival_rate("O1", 100, Some(&second), ts(11)).unwrap();

        let meta = repo.load_order_meta("O1").unwrap().unwrap();
        assert!(meta.manually_confirmed());
        assert_eq!(meta.arrival_completion, Some(first));
        assert_eq!(meta.material_arrival_rate, 100);
    }

    #[test]
    fn test_persist_snapshot_missing_order() {
        let repo = setup();
        let snapshot = OrderProgressSnapshot {
            order_id: "nope".to_string(),
            completed_quantity: 0,
            progress_percent: 0,
            current_stage_name: "Procurement".to_string(),
            lifecycle_status: LifecycleStatus::NotStarted,
            procurement_complete: false,
            procurement_completed_at: None,
            procurement_completed_by: None,
        };
        assert!(matches!(
            repo.persist_snapshot(&snapshot, ts(8)),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    fn snapshot(order_id: &str, status: LifecycleStatus, completed_quantity: i64) -> OrderProgressSnapshot {
        OrderProgressSnapshot {
            order_id: order_id.to_string(),
            completed_quantity,
            progress_percent: 40,
            current_stage_name: "Sewing".to_string(),
            lifecycle_status: status,
            procurement_complete: true,
            procurement_completed_at: None,
            procurement_completed_by: None,
        }
    }

    #[test]
    fn test_stale_snapshot_does_not_downgrade_terminal_status() {
        let repo = setup();
        let mut meta = OrderMeta::new("O1", None, 10);
        meta.lifecycle_status = LifecycleStatus::Completed;
        meta.completed_quantity = 10;
        repo.insert(&meta, ts(8)).unwrap();

        let written = repo
            .persist_snapshot(&snapshot("O1", LifecycleStatus::Production, 0), ts(9))
            .unwrap();
        assert!(!written);
        let stored = repo.load_order_meta("O1").unwrap().unwrap();
        assert_eq!(stored.lifecycle_status, LifecycleStatus::Completed);
        assert_eq!(stored.completed_quantity, 10);

        // 同一终态可以覆盖
        assert!(repo
            .persist_snapshot(&snapshot("O1", LifecycleStatus::Completed, 10), ts(10))
            .unwrap());
        // 报废订单不被完成快照覆盖
        let mut scrapped = OrderMeta::new("O2", None, 10);
        scrapped.lifecycle_status = LifecycleStatus::Scrapped;
        repo.insert(&scrapped, ts(8)).unwrap();
        assert!(!repo
            .persist_snapshot(&snapshot("O2", LifecycleStatus::Completed, 10), ts(9))
            .unwrap());
    }
}
