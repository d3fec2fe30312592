// ==========================================
// 服装生产进度引擎 - 重算耗时统计
// ==========================================
// 职责: SQLite 语句 profile（慢 SQL 告警 + 语句计数）与操作耗时日志
// 开关: GARMENT_PROGRESS_SLOW_SQL_MS=<毫秒>，0 表示只计数不告警
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 默认慢 SQL 阈值（毫秒）
const DEFAULT_SLOW_SQL_MS: u64 = 100;

static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(DEFAULT_SLOW_SQL_MS);

thread_local! {
    static SQL_STATEMENTS: Cell<u64> = Cell::new(0);
}

/// 为连接安装语句 profile 回调
pub fn install_sql_profile(conn: &mut Connection) {
    let threshold = std::env::var("GARMENT_PROGRESS_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_SLOW_SQL_MS);
    SLOW_SQL_MS.store(threshold, Ordering::Relaxed);
    conn.profile(Some(on_statement_profiled));
}

fn on_statement_profiled(sql: &str, duration: Duration) {
    SQL_STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));

    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    let ms = duration.as_millis() as u64;
    if threshold > 0 && ms >= threshold {
        let sql_short: String = sql.split_whitespace().collect::<Vec<_>>().join(" ").chars().take(300).collect();
        tracing::warn!(target: "slow_sql", duration_ms = ms, sql = %sql_short, "slow sql");
    }
}

/// 当前线程累计执行的 SQL 语句数
pub fn sql_statement_count() -> u64 {
    SQL_STATEMENTS.with(|c| c.get())
}

/// 操作耗时 Guard：drop 时记录 elapsed_ms 与本线程执行的 SQL 语句数
///
/// ```ignore
/// let _timer = garment_progress::perf::OpTimer::start("recompute", "PO-001");
/// ```
pub struct OpTimer {
    op: &'static str,
    order_id: String,
    started: Instant,
    sql_before: u64,
}

impl OpTimer {
    pub fn start(op: &'static str, order_id: &str) -> Self {
        Self {
            op,
            order_id: order_id.to_string(),
            started: Instant::now(),
            sql_before: sql_statement_count(),
        }
    }
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        tracing::debug!(
            target: "perf",
            op = self.op,
            order_id = %self.order_id,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            sql_count = sql_statement_count().saturating_sub(self.sql_before),
            "done"
        );
    }
}
