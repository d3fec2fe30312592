// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: config_kv 覆写值经 ProgressApi 生效
// ==========================================

mod test_helpers;

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use garment_progress::api::{AggregatorKind, ApiError, ProgressApi};
use garment_progress::config::{config_keys, ConfigManager};
use garment_progress::db::open_sqlite_connection;
use garment_progress::domain::order::OrderMeta;
use garment_progress::domain::scan_event::CompletionEvent;
use garment_progress::domain::types::{EventKind, Operator};
use garment_progress::repository::{EventStore, ProductionOrderRepository, ScanRecordRepository, StageTemplateRepository};
use rusqlite::Connection;
use test_helpers::create_test_db;

fn open(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_sqlite_connection(db_path).unwrap()))
}

fn order(order_id: &str, rate: i32) -> OrderMeta {
    let mut meta = OrderMeta::new(order_id, Some("S-CFG".to_string()), 100);
    meta.material_arrival_rate = rate;
    meta
}

fn at() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
}

#[test]
fn test_confirm_floor_and_remark_from_config() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open(&db_path);
    let config_manager = ConfigManager::new(conn.clone());
    config_manager
        .set_config_value(config_keys::PROCUREMENT_CONFIRM_FLOOR, "60")
        .unwrap();
    config_manager
        .set_config_value(config_keys::CONFIRM_REMARK_MIN_CHARS, "4")
        .unwrap();

    let api = ProgressApi::from_connection(conn.clone(), AggregatorKind::InMemory).unwrap();
    assert_eq!(api.config().procurement_confirm_floor, 60);

    let orders = ProductionOrderRepository::new(conn);
    orders.insert(&order("PO-55", 55), at()).unwrap();
    orders.insert(&order("PO-60", 60), at()).unwrap();

    let operator = Operator::new("U001", "跟单-李四");
    let rejected = api.confirm_procurement("PO-55", &operator, "面料齐全");
    assert!(matches!(
        rejected,
        Err(ApiError::ProcurementBelowFloor {
            arrival_rate: 55,
            floor: 60
        })
    ));

    let snapshot = api.confirm_procurement("PO-60", &operator, "面料齐全").unwrap();
    assert!(snapshot.procurement_complete);
}

#[test]
fn test_reserved_weights_from_config() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open(&db_path);
    let config_manager = ConfigManager::new(conn.clone());
    config_manager
        .set_config_value(config_keys::ORDER_CREATED_WEIGHT, "10")
        .unwrap();
    config_manager
        .set_config_value(config_keys::PROCUREMENT_WEIGHT, "30")
        .unwrap();

    StageTemplateRepository::new(conn.clone())
        .save_style_template("S-CFG", r#"{"nodes":[{"name":"Sewing"}]}"#, at())
        .unwrap();
    ProductionOrderRepository::new(conn.clone())
        .insert(&order("PO-W", 100), at())
        .unwrap();
    ScanRecordRepository::new(conn.clone())
        .append_event(&CompletionEvent::new("W-1", "PO-W", "Sewing", 50, EventKind::Production, at()))
        .unwrap();

    let api = ProgressApi::from_connection(conn, AggregatorKind::View).unwrap();
    let snapshot = api.recompute("PO-W").unwrap();
    // 下单 10×0 + 采购 30×1 + 车缝 60×0.5
    assert_eq!(snapshot.progress_percent, 60);
}

#[test]
fn test_template_cache_disabled_reads_latest() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open(&db_path);
    ConfigManager::new(conn.clone())
        .set_config_value(config_keys::TEMPLATE_CACHE_ENABLED, "false")
        .unwrap();

    let templates = StageTemplateRepository::new(conn.clone());
    templates
        .save_style_template("S-CFG", r#"{"nodes":[{"name":"Sewing"}]}"#, at())
        .unwrap();
    ProductionOrderRepository::new(conn.clone())
        .insert(&order("PO-NC", 100), at())
        .unwrap();
    ScanRecordRepository::new(conn.clone())
        .append_event(&CompletionEvent::new("NC-1", "PO-NC", "Sewing", 50, EventKind::Production, at()))
        .unwrap();

    let api = ProgressApi::from_connection(conn, AggregatorKind::InMemory).unwrap();
    // 0 + 15 + 80×0.5
    assert_eq!(api.recompute("PO-NC").unwrap().progress_percent, 55);

    templates
        .save_style_template("S-CFG", r#"{"nodes":[{"name":"Cutting"},{"name":"Sewing"}]}"#, at())
        .unwrap();
    // 0 + 15 + 40×0 + 40×0.5
    assert_eq!(api.recompute("PO-NC").unwrap().progress_percent, 35);
}

#[test]
fn test_cutting_stage_inserted_from_config() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open(&db_path);
    ConfigManager::new(conn.clone())
        .set_config_value(config_keys::INSERT_CUTTING_STAGE, "true")
        .unwrap();

    StageTemplateRepository::new(conn.clone())
        .save_style_template("S-CFG", r#"{"nodes":[{"name":"Sewing"}]}"#, at())
        .unwrap();
    let mut meta = order("PO-CUT", 100);
    meta.actual_cut_quantity = 80;
    ProductionOrderRepository::new(conn.clone()).insert(&meta, at()).unwrap();
    let events = ScanRecordRepository::new(conn.clone());
    events
        .append_event(&CompletionEvent::new("CUT-1", "PO-CUT", "裁床", 80, EventKind::Cutting, at()))
        .unwrap();
    events
        .append_event(&CompletionEvent::new("SEW-1", "PO-CUT", "Sewing", 50, EventKind::Production, at()))
        .unwrap();

    let api = ProgressApi::from_connection(conn, AggregatorKind::InMemory).unwrap();
    assert!(api.config().insert_cutting_stage);
    let snapshot = api.recompute("PO-CUT").unwrap();
    // 0 + 15 + 裁剪 40×(80/80) + 车缝 40×0.5
    assert_eq!(snapshot.progress_percent, 75);
    assert_eq!(snapshot.current_stage_name, "Sewing");
}
