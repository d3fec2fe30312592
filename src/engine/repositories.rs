// ==========================================
// 服装生产进度引擎 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合进度重算所需的数据访问接口
// 目标: 减少 ProgressApi 的构造函数参数数量，便于测试替换
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    ActionLogRepository, AuditSink, EventStore, OrderStore, ProductionOrderRepository, ScanRecordRepository,
    StageTemplateRepository, TemplateStore,
};

/// 进度引擎仓储集合
///
/// # 包含的仓储
/// - `events`: 扫码记录
/// - `orders`: 生产订单
/// - `templates`: 进度模板
/// - `audit`: 审计日志
#[derive(Clone)]
pub struct ProgressRepositories {
    pub events: Arc<dyn EventStore>,
    pub orders: Arc<dyn OrderStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl ProgressRepositories {
    pub fn new(
        events: Arc<dyn EventStore>,
        orders: Arc<dyn OrderStore>,
        templates: Arc<dyn TemplateStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            events,
            orders,
            templates,
            audit,
        }
    }

    /// 基于同一 SQLite 连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            events: Arc::new(ScanRecordRepository::new(conn.clone())),
            orders: Arc::new(ProductionOrderRepository::new(conn.clone())),
            templates: Arc::new(StageTemplateRepository::new(conn.clone())),
            audit: Arc::new(ActionLogRepository::new(conn)),
        }
    }
}
