// ==========================================
// 服装生产进度引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::progress_config::ProgressConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const ORDER_CREATED_WEIGHT: &str = "progress_order_created_weight";
    pub const PROCUREMENT_WEIGHT: &str = "progress_procurement_weight";
    pub const PROCUREMENT_AUTO_RATE: &str = "progress_procurement_auto_rate";
    pub const PROCUREMENT_CONFIRM_FLOOR: &str = "progress_procurement_confirm_floor";
    pub const CONFIRM_REMARK_MIN_CHARS: &str = "progress_confirm_remark_min_chars";
    pub const TEMPLATE_CACHE_ENABLED: &str = "progress_template_cache_enabled";
    pub const INSERT_CUTTING_STAGE: &str = "progress_insert_cutting_stage";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置
    pub fn get_all(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut map = HashMap::new();
        for row in rows {
            let (k, v) = row?;
            map.insert(k, v);
        }
        Ok(map)
    }

    /// 加载进度计算配置
    ///
    /// # 说明
    /// 每一项独立回退默认值，单项格式错误不影响其余项
    pub fn load_progress_config(&self) -> RepositoryResult<ProgressConfig> {
        let defaults = ProgressConfig::default();
        Ok(ProgressConfig {
            order_created_weight: self.parse_or(config_keys::ORDER_CREATED_WEIGHT, defaults.order_created_weight)?,
            procurement_weight: self.parse_or(config_keys::PROCUREMENT_WEIGHT, defaults.procurement_weight)?,
            procurement_auto_rate: self
                .parse_or(config_keys::PROCUREMENT_AUTO_RATE, defaults.procurement_auto_rate)?,
            procurement_confirm_floor: self
                .parse_or(config_keys::PROCUREMENT_CONFIRM_FLOOR, defaults.procurement_confirm_floor)?,
            confirm_remark_min_chars: self
                .parse_or(config_keys::CONFIRM_REMARK_MIN_CHARS, defaults.confirm_remark_min_chars)?,
            template_cache_enabled: self
                .parse_or(config_keys::TEMPLATE_CACHE_ENABLED, defaults.template_cache_enabled)?,
            insert_cutting_stage: self
                .parse_or(config_keys::INSERT_CUTTING_STAGE, defaults.insert_cutting_stage)?,
        })
    }

    fn parse_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + std::fmt::Debug,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!("配置值格式错误，使用默认值: key={}, value={}, default={:?}", key, raw, default);
                Ok(default)
            }
        }
    }
}
