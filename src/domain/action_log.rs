// ==========================================
// 服装生产进度引擎 - 操作日志领域模型
// ==========================================
// 职责: 人工指令审计 + 异步重算失败留痕
// 红线: 所有人工写入必须记录；异步失败只留痕不上抛
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 对齐: action_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志ID
    pub order_id: Option<String>,        // 关联订单
    pub action_type: String,             // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,        // 操作时间戳
    pub actor: String,                   // 操作人
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    RecomputeFailure,   // 异步重算失败
    ManualAdvance,      // 人工推进
    ManualRollback,     // 人工退回
    ProcurementConfirm, // 人工确认采购完成
    ArrivalRateUpdate,  // 到料率更新
    TemplateUpdate,     // 进度模板维护
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::RecomputeFailure => "RecomputeFailure",
            ActionType::ManualAdvance => "ManualAdvance",
            ActionType::ManualRollback => "ManualRollback",
            ActionType::ProcurementConfirm => "ProcurementConfirm",
            ActionType::ArrivalRateUpdate => "ArrivalRateUpdate",
            ActionType::TemplateUpdate => "TemplateUpdate",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RecomputeFailure" => Some(ActionType::RecomputeFailure),
            "ManualAdvance" => Some(ActionType::ManualAdvance),
            "ManualRollback" => Some(ActionType::ManualRollback),
            "ProcurementConfirm" => Some(ActionType::ProcurementConfirm),
            "ArrivalRateUpdate" => Some(ActionType::ArrivalRateUpdate),
            "TemplateUpdate" => Some(ActionType::TemplateUpdate),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `order_id`: 关联订单ID (可选)
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人（空白时记为 system）
    /// - `at`: 操作时间
    pub fn new(order_id: Option<&str>, action_type: ActionType, actor: &str, at: NaiveDateTime) -> Self {
        let actor = actor.trim();
        Self {
            action_id: Uuid::new_v4().to_string(),
            order_id: order_id.map(|s| s.to_string()),
            action_type: action_type.as_str().to_string(),
            action_ts: at,
            actor: if actor.is_empty() { "system".to_string() } else { actor.to_string() },
            payload_json: None,
            detail: None,
        }
    }

    /// 设置操作负载
    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    /// 设置详细描述（超长截断到 900 字符）
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail: String = detail.into();
        self.detail = Some(detail.chars().take(900).collect());
        self
    }

    /// 解析操作类型
    pub fn get_action_type(&self) -> Option<ActionType> {
        ActionType::from_str(&self.action_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_blank_actor_defaults_to_system() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let log = ActionLog::new(Some("O1"), ActionType::RecomputeFailure, "  ", at)
            .with_detail("x".repeat(1000));
        assert_eq!(log.actor, "system");
        assert_eq!(log.detail.as_ref().map(|d| d.chars().count()), Some(900));
        assert_eq!(log.get_action_type(), Some(ActionType::RecomputeFailure));
    }
}
