// ==========================================
// 服装生产进度引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod order;
pub mod scan_event;
pub mod stage_template;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use order::{ArrivalCompletion, OrderMeta, OrderProgressSnapshot, ProcurementConfirmation};
pub use scan_event::{CompletionEvent, InvalidationDirective};
pub use stage_template::{
    StageDefinition, StageTemplate, TemplateDocument, TemplateNode, STAGE_ORDER_CREATED,
    STAGE_PROCUREMENT,
};
pub use types::{EventKind, LifecycleStatus, Operator, OverrideKind, ScanResult};
