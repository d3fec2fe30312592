// ==========================================
// 服装生产进度引擎 - API 层
// ==========================================
// 职责: 提供进度重算与人工指令接口
// ==========================================

pub mod error;
pub mod progress_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use progress_api::{AggregatorKind, ProgressApi};
