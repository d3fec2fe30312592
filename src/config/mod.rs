// ==========================================
// 服装生产进度引擎 - 配置层
// ==========================================
// 职责: 进度计算配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod progress_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use progress_config::ProgressConfig;
