// ==========================================
// 服装生产进度引擎 - 应用层
// ==========================================
// 职责: 组装数据库连接与 API，供命令行入口调用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
