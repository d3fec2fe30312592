// ==========================================
// 服装生产进度引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 扫码记录 → 订单进度 / 当前环节 / 生命周期状态
// 红线: 进度快照是派生数据，可随时由扫码记录重算
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 进度计算规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/建表）
pub mod db;

// 日志系统
pub mod logging;

// 耗时与慢 SQL 统计
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{EventKind, LifecycleStatus, Operator, OverrideKind, ScanResult};

// 领域实体
pub use domain::{ActionLog, ActionType, CompletionEvent, OrderMeta, OrderProgressSnapshot, StageTemplate};

// 引擎
pub use engine::{
    EventDeduplicator, ManualOverrideAdjuster, OrderStatusStateMachine, ProcurementGate, ProgressCalculator,
    ProgressRecomputeEngine, RollbackInvalidator, StageAggregator, StageTemplateResolver,
};

// API
pub use api::{AggregatorKind, ApiError, ApiResult, ProgressApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "服装生产进度引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
