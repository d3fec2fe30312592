// ==========================================
// 服装生产进度引擎 - 引擎层
// ==========================================
// 职责: 扫码记录 → 进度百分比 / 当前环节 / 订单状态
// 红线: Engine 不拼 SQL；数据异常跳过并记录日志，不上抛
// ==========================================

pub mod aggregator;
pub mod dedup;
pub mod manual_override;
pub mod procurement_gate;
pub mod progress_calc;
pub mod recompute;
pub mod repositories;
pub mod rollback;
pub mod stage_names;
pub mod status_machine;
pub mod template_resolver;

// 重导出核心引擎
pub use aggregator::{resolve_stage_index, ScanStageAggregator, StageAggregate, StageAggregator};
pub use dedup::{DedupTotals, EventDeduplicator, StageQuantities};
pub use manual_override::{AppliedOverride, ManualOverrideAdjuster, OverrideMarker, OverrideOutcome};
pub use procurement_gate::{GateDecision, GateOpenedBy, GateViolation, ProcurementGate};
pub use progress_calc::{ProgressCalculator, ProgressComputation, StageProgress};
pub use recompute::{ProgressRecomputeEngine, RecomputeInput, RecomputeOutcome};
pub use repositories::ProgressRepositories;
pub use rollback::{RollbackInvalidator, RollbackPlan};
pub use stage_names::{normalize_stage_name, StageNameMatcher, SynonymGroup, SynonymStageMatcher};
pub use status_machine::{OrderStatusStateMachine, StatusDecision, StatusInput};
pub use template_resolver::{build_template, fallback_template, production_stage_count, StageTemplateResolver};
