// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 临时数据库 + ProgressApi + 数据准备用仓储
// ==========================================

#[path = "../test_helpers.rs"]
mod test_helpers;

use std::error::Error;
use std::sync::{Arc, Mutex};

use garment_progress::api::{AggregatorKind, ProgressApi};
use garment_progress::config::ProgressConfig;
use garment_progress::db::open_sqlite_connection;
use garment_progress::domain::action_log::{ActionLog, ActionType};
use garment_progress::domain::order::OrderMeta;
use garment_progress::domain::scan_event::CompletionEvent;
use garment_progress::domain::types::Operator;
use garment_progress::engine::{
    ProgressRepositories, ScanStageAggregator, StageAggregator, StageNameMatcher, SynonymStageMatcher,
};
use garment_progress::repository::{
    ActionLogRepository, EventStore, ProductionOrderRepository, ScanRecordRepository, StageTemplateRepository,
};
use rusqlite::Connection;
use serde_json::json;
use tempfile::NamedTempFile;

use super::test_data_builder::ts;

// ==========================================
// 进度API测试环境
// ==========================================

/// 进度API测试环境
///
/// ProgressApi 与数据准备仓储共用同一个连接
pub struct ProgressTestEnv {
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub api: Arc<ProgressApi>,

    // Repository层（用于测试数据准备与断言）
    pub order_repo: ProductionOrderRepository,
    pub scan_repo: ScanRecordRepository,
    pub template_repo: StageTemplateRepository,
    pub action_log_repo: ActionLogRepository,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ProgressTestEnv {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        Self::with_aggregator(AggregatorKind::InMemory)
    }

    pub fn with_aggregator(kind: AggregatorKind) -> Result<Self, Box<dyn Error>> {
        let (temp_file, db_path) = test_helpers::create_test_db()?;
        let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path)?));
        let api = ProgressApi::from_connection(conn.clone(), kind)?;

        Ok(Self {
            db_path,
            conn: conn.clone(),
            api: Arc::new(api),
            order_repo: ProductionOrderRepository::new(conn.clone()),
            scan_repo: ScanRecordRepository::new(conn.clone()),
            template_repo: StageTemplateRepository::new(conn.clone()),
            action_log_repo: ActionLogRepository::new(conn),
            _temp_file: temp_file,
        })
    }

    /// 替换部分仓储实现（用于注入故障或并发写入）
    pub fn with_repositories(
        wrap: impl FnOnce(ProgressRepositories, Arc<Mutex<Connection>>) -> ProgressRepositories,
    ) -> Result<Self, Box<dyn Error>> {
        let mut env = Self::new()?;
        let repos = wrap(ProgressRepositories::from_connection(env.conn.clone()), env.conn.clone());
        let matcher: Arc<dyn StageNameMatcher> = Arc::new(SynonymStageMatcher::default());
        let aggregator: Arc<dyn StageAggregator> =
            Arc::new(ScanStageAggregator::new(repos.events.clone(), matcher.clone()));
        env.api = Arc::new(ProgressApi::new(repos, aggregator, matcher, ProgressConfig::default()));
        Ok(env)
    }

    pub fn add_order(&self, meta: OrderMeta) {
        self.order_repo.insert(&meta, ts(0)).unwrap();
    }

    pub fn add_scans(&self, events: Vec<CompletionEvent>) {
        for event in &events {
            assert!(self.scan_repo.append_event(event).unwrap());
        }
    }

    /// 经 API 保存款式模板（同时刷新模板缓存）
    pub fn save_template(&self, style_no: &str, nodes: &[(&str, Option<f64>)]) {
        self.api
            .save_stage_template(Some(style_no), &template_json(nodes), &Operator::system())
            .unwrap();
    }

    pub fn scan(&self, key: &str) -> CompletionEvent {
        self.scan_repo.find_by_key(key).unwrap().unwrap()
    }

    pub fn logs(&self, action_type: ActionType) -> Vec<ActionLog> {
        self.action_log_repo
            .find_by_action_type(action_type.as_str(), 100)
            .unwrap()
    }
}

/// 节点列表 -> 模板 JSON
pub fn template_json(nodes: &[(&str, Option<f64>)]) -> String {
    let nodes: Vec<_> = nodes
        .iter()
        .map(|(name, weight)| json!({ "name": name, "weight": weight }))
        .collect();
    json!({ "nodes": nodes }).to_string()
}
