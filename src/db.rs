// ==========================================
// 服装生产进度引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发重算写快照时的偶发 busy 错误
// - 建表语句集中维护（幂等）
// ==========================================

use chrono::{NaiveDateTime, Timelike};
use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 时间字段存储格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 格式化时间字段
pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

/// SQL 侧与 str::trim 等价的空白字符集（Unicode White_Space）
pub const SQL_WHITESPACE: &str = "char(9, 10, 11, 12, 13, 32, 133, 160, 5760, 8192, 8193, 8194, 8195, 8196, \
     8197, 8198, 8199, 8200, 8201, 8202, 8232, 8233, 8239, 8287, 12288)";

/// 解析时间字段（兼容不带小数秒的历史数据）
///
/// 只接受 `YYYY-MM-DD HH:MM:SS[.f{1,9}]`，与视图 v_scan_stage_done 的时间过滤条件一致
pub fn parse_ts(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if !is_canonical_ts(raw) {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .ok()
        .filter(|t| t.nanosecond() < 1_000_000_000)
}

fn is_canonical_ts(raw: &str) -> bool {
    let b = raw.as_bytes();
    if b.len() < 19 {
        return false;
    }
    let shape_ok = b[..19].iter().enumerate().all(|(i, c)| match i {
        4 | 7 => *c == b'-',
        10 => *c == b' ',
        13 | 16 => *c == b':',
        _ => c.is_ascii_digit(),
    });
    let frac = &b[19..];
    shape_ok
        && (frac.is_empty()
            || (frac[0] == b'.' && (2..=10).contains(&frac.len()) && frac[1..].iter().all(u8::is_ascii_digit)))
}

/// 初始化进度引擎所需的表与视图（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS production_order (
            order_id TEXT PRIMARY KEY,
            order_no TEXT,
            style_no TEXT,
            total_quantity INTEGER NOT NULL DEFAULT 0,
            actual_cut_quantity INTEGER NOT NULL DEFAULT 0,
            material_arrival_rate INTEGER NOT NULL DEFAULT 0,
            procurement_manually_completed INTEGER NOT NULL DEFAULT 0,
            procurement_confirmed_at TEXT,
            procurement_confirmed_by TEXT,
            procurement_confirmed_by_name TEXT,
            procurement_confirm_remark TEXT,
            arrival_completed_at TEXT,
            arrival_completed_by TEXT,
            arrival_completed_by_name TEXT,
            status TEXT NOT NULL DEFAULT 'not_started',
            completed_quantity INTEGER NOT NULL DEFAULT 0,
            production_progress INTEGER NOT NULL DEFAULT 0,
            current_stage_name TEXT,
            delete_flag INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_production_order_style
          ON production_order(style_no, delete_flag);

        CREATE TABLE IF NOT EXISTS scan_record (
            idempotency_key TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            progress_stage TEXT,
            process_name TEXT,
            unit_id TEXT,
            quantity INTEGER NOT NULL DEFAULT 0,
            scan_type TEXT NOT NULL,
            scan_result TEXT NOT NULL DEFAULT 'success',
            scan_time TEXT NOT NULL,
            operator_id TEXT,
            operator_name TEXT,
            remark TEXT,
            updated_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_scan_record_order
          ON scan_record(order_id, scan_type, scan_result);

        CREATE TABLE IF NOT EXISTS stage_template (
            template_id TEXT PRIMARY KEY,
            style_no TEXT,
            template_key TEXT,
            template_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            order_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_order
          ON action_log(order_id, action_ts);

        "#,
    )?;
    conn.execute_batch(&scan_stage_view_sql())
}

/// 预聚合视图: 同一 (订单, 环节, 菲号) 取 MAX，无菲号直接 SUM
///
/// 过滤与标准化规则必须与 ScanRecordRepository::load_events + EventDeduplicator 一致:
/// - 环节名/菲号/扫码类型/结果按 Unicode 空白 trim
/// - 扫码类型不在已知范围、时间无法解析 → 跳过
fn scan_stage_view_sql() -> String {
    let ws = SQL_WHITESPACE;
    format!(
        r#"
        DROP VIEW IF EXISTS v_scan_stage_done;
        CREATE VIEW v_scan_stage_done AS
        WITH normalized AS (
            SELECT order_id,
                   COALESCE(NULLIF(TRIM(progress_stage, {ws}), ''), NULLIF(TRIM(process_name, {ws}), '')) AS stage_name,
                   CASE WHEN TRIM(scan_type, {ws}) = 'quality' THEN 'quality' ELSE 'production' END AS path,
                   NULLIF(TRIM(unit_id, {ws}), '') AS unit,
                   quantity,
                   TRIM(scan_time, {ws}) AS scan_ts
            FROM scan_record
            WHERE TRIM(scan_result, {ws}) = 'success'
              AND quantity > 0
              AND TRIM(scan_type, {ws}) IN ('production', 'cutting', 'quality', 'warehouse')
        ),
        valid AS (
            SELECT * FROM normalized
            WHERE stage_name IS NOT NULL
              AND scan_ts GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9] [0-9][0-9]:[0-9][0-9]:[0-9][0-9]*'
              AND (length(scan_ts) = 19
                   OR (substr(scan_ts, 20, 1) = '.'
                       AND length(scan_ts) BETWEEN 21 AND 29
                       AND substr(scan_ts, 21) NOT GLOB '*[^0-9]*'))
              AND strftime('%Y-%m-%d %H:%M:%S', substr(scan_ts, 1, 19)) = substr(scan_ts, 1, 19)
        )
        SELECT order_id, stage_name, path,
               SUM(qty) AS done_quantity,
               MIN(first_scan) AS first_scan
        FROM (
            SELECT order_id, stage_name, path, MAX(quantity) AS qty, MIN(scan_ts) AS first_scan
            FROM valid
            WHERE unit IS NOT NULL
            GROUP BY order_id, stage_name, path, unit
            UNION ALL
            SELECT order_id, stage_name, path, SUM(quantity) AS qty, MIN(scan_ts) AS first_scan
            FROM valid
            WHERE unit IS NULL
            GROUP BY order_id, stage_name, path
        )
        GROUP BY order_id, stage_name, path;
        "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('scan_record', 'production_order', 'v_scan_stage_done')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn test_ts_format_round_trip() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_milli_opt(8, 30, 0, 250)
            .unwrap();
        assert_eq!(parse_ts(&format_ts(&ts)), Some(ts));
        assert!(parse_ts("2026-03-01 08:30:00").is_some());
        assert!(parse_ts("garbage").is_none());
    }

    #[test]
    fn test_parse_ts_rejects_non_canonical() {
        assert!(parse_ts(" 2026-03-01 08:30:00\t").is_some());
        assert!(parse_ts("2026-3-1 8:30:00").is_none());
        assert!(parse_ts("2026-02-30 08:30:00").is_none());
        assert!(parse_ts("2026-03-01T08:30:00").is_none());
        assert!(parse_ts("2026-03-01 08:30:00.").is_none());
        assert!(parse_ts("2026-03-01 08:30:00xyz").is_none());
    }
}
