// ==========================================
// 服装生产进度引擎 - 扫码记录领域模型
// ==========================================
// 职责: 完工事件（扫码记录）与人工推进/退回标记
// 红线: 记录不可变，唯一允许的修改是作废（result → failure + 备注）
// ==========================================

use crate::domain::types::{EventKind, OverrideKind, ScanResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// CompletionEvent - 完工事件
// ==========================================
// 对齐: scan_record 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub idempotency_key: String,       // 幂等键 (每次逻辑提交唯一)
    pub order_id: String,              // 生产订单ID
    pub progress_stage: Option<String>, // 进度节点名
    pub process_name: Option<String>,  // 工序名 (进度节点缺失时回退)
    pub unit_id: Option<String>,       // 菲号 (非菲号工序为空)
    pub quantity: i64,                 // 数量
    pub kind: EventKind,               // 扫码类型
    pub result: ScanResult,            // 扫码结果
    pub scanned_at: NaiveDateTime,     // 扫码时间
    pub operator_id: Option<String>,   // 操作人ID
    pub operator_name: Option<String>, // 操作人
    pub remark: Option<String>,        // 备注 (作废时写入原因)
}

impl CompletionEvent {
    /// 创建生产扫码记录
    pub fn new(
        idempotency_key: impl Into<String>,
        order_id: impl Into<String>,
        stage: impl Into<String>,
        quantity: i64,
        kind: EventKind,
        scanned_at: NaiveDateTime,
    ) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            order_id: order_id.into(),
            progress_stage: Some(stage.into()),
            process_name: None,
            unit_id: None,
            quantity,
            kind,
            result: ScanResult::Success,
            scanned_at,
            operator_id: None,
            operator_name: None,
            remark: None,
        }
    }

    /// 设置菲号
    pub fn with_unit(mut self, unit_id: impl Into<String>) -> Self {
        self.unit_id = Some(unit_id.into());
        self
    }

    /// 设置操作人
    pub fn with_operator(mut self, operator_id: Option<String>, operator_name: Option<String>) -> Self {
        self.operator_id = operator_id;
        self.operator_name = operator_name;
        self
    }

    /// 创建人工推进/退回标记记录（数量为 0，不参与数量统计）
    pub fn override_marker(
        order_id: &str,
        kind: OverrideKind,
        target_stage: &str,
        reason: &str,
        operator_id: Option<String>,
        operator_name: Option<String>,
        at: NaiveDateTime,
    ) -> Self {
        let key = format!(
            "{}{}:{}",
            kind.key_prefix(),
            order_id,
            Uuid::new_v4().simple()
        );
        let remark = match kind {
            OverrideKind::Advance => format!("推进：{}", reason.trim()),
            OverrideKind::Rollback => format!("退回：{}", reason.trim()),
        };
        Self {
            idempotency_key: key,
            order_id: order_id.to_string(),
            progress_stage: Some(target_stage.trim().to_string()),
            process_name: Some(target_stage.trim().to_string()),
            unit_id: None,
            quantity: 0,
            kind: EventKind::Production,
            result: ScanResult::Success,
            scanned_at: at,
            operator_id,
            operator_name,
            remark: Some(remark),
        }
    }

    /// 解析进度节点名: progress_stage 优先，其次 process_name
    ///
    /// # 返回
    /// - None: 两个字段都为空（畸形记录，调用方跳过）
    pub fn stage_name(&self) -> Option<&str> {
        non_blank(self.progress_stage.as_deref()).or_else(|| non_blank(self.process_name.as_deref()))
    }

    /// 菲号（空白视为无菲号）
    pub fn unit(&self) -> Option<&str> {
        non_blank(self.unit_id.as_deref())
    }

    /// 是否有效记录
    pub fn is_success(&self) -> bool {
        self.result == ScanResult::Success
    }

    /// 人工标记类型（非标记记录返回 None）
    pub fn marker_kind(&self) -> Option<OverrideKind> {
        if self.quantity != 0 || self.kind != EventKind::Production {
            return None;
        }
        let key = self.idempotency_key.trim();
        [OverrideKind::Advance, OverrideKind::Rollback]
            .into_iter()
            .find(|k| key.starts_with(k.key_prefix()))
    }
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

// ==========================================
// InvalidationDirective - 作废指令
// ==========================================
// 由 RollbackInvalidator 生成，EventStore 执行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationDirective {
    pub idempotency_key: String, // 被作废记录
    pub remark: String,          // 作废原因
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_stage_name_falls_back_to_process_name() {
        let mut e = CompletionEvent::new("k1", "O1", "  ", 3, EventKind::Production, ts());
        e.process_name = Some(" Sewing ".to_string());
        assert_eq!(e.stage_name(), Some("Sewing"));

        e.process_name = None;
        assert_eq!(e.stage_name(), None);
    }

    #[test]
    fn test_blank_unit_is_none() {
        let e = CompletionEvent::new("k1", "O1", "Cutting", 3, EventKind::Cutting, ts()).with_unit(" ");
        assert_eq!(e.unit(), None);
    }

    #[test]
    fn test_override_marker_detected() {
        let m = CompletionEvent::override_marker(
            "O1",
            OverrideKind::Rollback,
            "Cutting",
            "面料色差",
            None,
            Some("张三".to_string()),
            ts(),
        );
        assert_eq!(m.marker_kind(), Some(OverrideKind::Rollback));
        assert!(m.idempotency_key.starts_with("ORDER_ROLLBACK:O1:"));
        assert_eq!(m.remark.as_deref(), Some("退回：面料色差"));

        let plain = CompletionEvent::new("ORDER_ADVANCE:x", "O1", "Cutting", 5, EventKind::Production, ts());
        assert_eq!(plain.marker_kind(), None);
    }
}
