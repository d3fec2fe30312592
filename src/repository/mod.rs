// ==========================================
// 服装生产进度引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod production_order_repo;
pub mod progress_store_trait;
pub mod scan_record_repo;
pub mod stage_template_repo;
pub mod view_stage_aggregator;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use production_order_repo::ProductionOrderRepository;
pub use progress_store_trait::{AuditSink, EventStore, OrderStore, TemplateStore};
pub use scan_record_repo::ScanRecordRepository;
pub use stage_template_repo::{StageTemplateRepository, DEFAULT_TEMPLATE_KEY};
pub use view_stage_aggregator::ViewStageAggregator;
