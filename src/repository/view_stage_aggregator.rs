// ==========================================
// 服装生产进度引擎 - 预聚合视图环节聚合
// ==========================================
// 数据源: v_scan_stage_done（按菲号取 MAX、无菲号 SUM，已在 SQL 中去重）
// 对齐到模板的逻辑与 ScanStageAggregator 共用 StageAggregate::from_totals
// ==========================================

use crate::db::parse_ts;
use crate::domain::stage_template::StageTemplate;
use crate::engine::aggregator::{StageAggregate, StageAggregator};
use crate::engine::dedup::DedupTotals;
use crate::engine::stage_names::StageNameMatcher;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct ViewStageAggregator {
    conn: Arc<Mutex<Connection>>,
    matcher: Arc<dyn StageNameMatcher>,
}

struct ViewRow {
    stage_name: String,
    path: String,
    done_quantity: i64,
    first_scan: String,
}

impl ViewStageAggregator {
    pub fn new(conn: Arc<Mutex<Connection>>, matcher: Arc<dyn StageNameMatcher>) -> Self {
        Self { conn, matcher }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取视图中的原始环节统计
    pub fn load_totals(&self, order_id: &str) -> RepositoryResult<DedupTotals> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT stage_name, path, done_quantity, first_scan
            FROM v_scan_stage_done
            WHERE order_id = ?1
            "#,
        )?;
        let mut rows = stmt
            .query_map(params![order_id], |row| {
                Ok(ViewRow {
                    stage_name: row.get(0)?,
                    path: row.get(1)?,
                    done_quantity: row.get(2)?,
                    first_scan: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        // 与内存去重保持同一排序: 首次扫码时间 → 环节名
        rows.sort_by(|a, b| {
            parse_ts(&a.first_scan)
                .cmp(&parse_ts(&b.first_scan))
                .then_with(|| a.stage_name.cmp(&b.stage_name))
        });

        let mut totals = DedupTotals::default();
        for row in rows {
            if row.done_quantity <= 0 {
                continue;
            }
            let name = row.stage_name.trim();
            if row.path == "quality" {
                totals.quality.add(name, row.done_quantity);
            } else {
                totals.production.add(name, row.done_quantity);
            }
        }
        Ok(totals)
    }
}

impl StageAggregator for ViewStageAggregator {
    fn aggregate(&self, order_id: &str, template: &StageTemplate) -> RepositoryResult<StageAggregate> {
        let totals = self.load_totals(order_id)?;
        Ok(StageAggregate::from_totals(&totals, template, self.matcher.as_ref()))
    }
}
