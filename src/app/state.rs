// ==========================================
// 服装生产进度引擎 - 应用状态
// ==========================================
// 职责: 打开数据库、建表、装配共享的 ProgressApi
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AggregatorKind, ProgressApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::perf::install_sql_profile;
use crate::repository::ActionLogRepository;

/// 应用状态
///
/// CLI 与批处理共用同一个 ProgressApi 实例
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 进度API
    pub progress_api: Arc<ProgressApi>,

    /// 操作日志查询
    pub action_log_repo: ActionLogRepository,

    /// 配置读取
    pub config_manager: ConfigManager,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - kind: 环节聚合实现
    pub fn new(db_path: String, kind: AggregatorKind) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        install_sql_profile(&mut conn);
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let progress_api = ProgressApi::from_connection(conn.clone(), kind)
            .map_err(|e| format!("无法创建ProgressApi: {}", e))?;

        tracing::info!("AppState初始化完成: aggregator={:?}", kind);
        Ok(Self {
            db_path,
            progress_api: Arc::new(progress_api),
            action_log_repo: ActionLogRepository::new(conn.clone()),
            config_manager: ConfigManager::new(conn),
        })
    }
}

/// 默认数据库路径
///
/// 优先级: GARMENT_PROGRESS_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("GARMENT_PROGRESS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./garment_progress.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("garment-progress");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("garment_progress.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_app_state_initializes_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("progress.db").to_string_lossy().to_string();
        let state = AppState::new(db_path.clone(), AggregatorKind::View).unwrap();
        assert_eq!(state.db_path, db_path);
        assert_eq!(state.progress_api.config().confirm_remark_min_chars, 10);
        assert!(state.config_manager.get_all().unwrap().is_empty());
        assert!(state.action_log_repo.find_by_order_id("PO-NONE").unwrap().is_empty());
    }
}
