// ==========================================
// 服装生产进度引擎 - 进度模板数据仓储
// ==========================================
// 对齐: stage_template 表
// 查找顺序: 款号模板（最近更新）→ template_key='default' → 无
// ==========================================

use crate::db::format_ts;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::progress_store_trait::TemplateStore;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 默认模板 key
pub const DEFAULT_TEMPLATE_KEY: &str = "default";

pub struct StageTemplateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StageTemplateRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存款式模板
    ///
    /// # 返回
    /// - template_id
    pub fn save_style_template(&self, style_no: &str, template_json: &str, at: NaiveDateTime) -> RepositoryResult<String> {
        self.insert(Some(style_no.trim()), None, template_json, at)
    }

    /// 保存默认模板
    pub fn save_default_template(&self, template_json: &str, at: NaiveDateTime) -> RepositoryResult<String> {
        self.insert(None, Some(DEFAULT_TEMPLATE_KEY), template_json, at)
    }

    fn insert(
        &self,
        style_no: Option<&str>,
        template_key: Option<&str>,
        template_json: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let template_id = Uuid::new_v4().to_string();
        conn.execute(
            r#"
            INSERT INTO stage_template (template_id, style_no, template_key, template_json, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![template_id, style_no, template_key, template_json, format_ts(&at)],
        )?;
        Ok(template_id)
    }
}

impl TemplateStore for StageTemplateRepository {
    fn load_template_json(&self, style_no: Option<&str>) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        if let Some(style) = style_no.map(str::trim).filter(|s| !s.is_empty()) {
            let found = conn
                .query_row(
                    r#"
                    SELECT template_json FROM stage_template
                    WHERE style_no = ?1
                    ORDER BY updated_at DESC, rowid DESC
                    LIMIT 1
                    "#,
                    params![style],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            if found.is_some() {
                return Ok(found);
            }
        }

        let fallback = conn
            .query_row(
                r#"
                SELECT template_json FROM stage_template
                WHERE template_key = ?1
                ORDER BY updated_at DESC, rowid DESC
                LIMIT 1
                "#,
                params![DEFAULT_TEMPLATE_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(fallback)
    }

    fn save_template_json(
        &self,
        style_no: Option<&str>,
        template_json: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<String> {
        match style_no.map(str::trim).filter(|s| !s.is_empty()) {
            Some(style) => self.save_style_template(style, template_json, at),
            None => self.save_default_template(template_json, at),
        }
    }
}
