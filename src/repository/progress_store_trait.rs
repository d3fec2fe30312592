// ==========================================
// 服装生产进度引擎 - 进度数据访问 Trait
// ==========================================
// 职责: 定义引擎消费的数据访问接口（不包含业务逻辑）
// 实现者: ScanRecordRepository / ProductionOrderRepository /
//         StageTemplateRepository / ActionLogRepository（rusqlite）
// 红线: Repository 不含业务规则，只做数据映射
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::order::{ArrivalCompletion, OrderMeta, OrderProgressSnapshot, ProcurementConfirmation};
use crate::domain::scan_event::{CompletionEvent, InvalidationDirective};
use crate::domain::types::EventKind;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;

// ==========================================
// EventStore - 扫码记录
// ==========================================
pub trait EventStore: Send + Sync {
    /// 读取订单扫码记录（含 success 与 failure）
    ///
    /// # 参数
    /// - order_id: 订单ID
    /// - kinds: 扫码类型过滤（空切片表示全部）
    ///
    /// # 返回
    /// - 按扫码时间、写入顺序升序
    fn load_events(&self, order_id: &str, kinds: &[EventKind]) -> RepositoryResult<Vec<CompletionEvent>>;

    /// 追加扫码记录（幂等键重复时忽略）
    ///
    /// # 返回
    /// - Ok(true): 新写入
    /// - Ok(false): 幂等键已存在
    fn append_event(&self, event: &CompletionEvent) -> RepositoryResult<bool>;

    /// 作废扫码记录（仅翻转仍为 success 的记录）
    ///
    /// # 返回
    /// - Ok(usize): 实际被作废的记录数
    fn invalidate_events(
        &self,
        order_id: &str,
        directives: &[InvalidationDirective],
        at: NaiveDateTime,
    ) -> RepositoryResult<usize>;

    /// 在同一事务内写入退回标记并作废记录（任一步失败则全部回滚）
    ///
    /// # 返回
    /// - Ok(usize): 实际被作废的记录数
    fn append_with_invalidation(
        &self,
        marker: &CompletionEvent,
        directives: &[InvalidationDirective],
        at: NaiveDateTime,
    ) -> RepositoryResult<usize>;
}

// ==========================================
// OrderStore - 生产订单
// ==========================================
pub trait OrderStore: Send + Sync {
    /// 读取订单元数据（已软删除的订单返回 None）
    fn load_order_meta(&self, order_id: &str) -> RepositoryResult<Option<OrderMeta>>;

    /// 写入进度快照（后写覆盖）
    ///
    /// # 返回
    /// - Ok(true): 已写入
    /// - Ok(false): 库中状态已是其他终态（completed/scrapped），快照过期未写入
    fn persist_snapshot(&self, snapshot: &OrderProgressSnapshot, at: NaiveDateTime) -> RepositoryResult<bool>;

    /// 记录人工确认采购
    fn confirm_procurement(&self, order_id: &str, confirmation: &ProcurementConfirmation) -> RepositoryResult<()>;

    /// 更新物料到货率
    ///
    /// # 参数
    /// - completion: 首次达到自动完成阈值时的时间/经办人（已有记录时不覆盖）
    fn update_arrival_rate(
        &self,
        order_id: &str,
        rate: i32,
        completion: Option<&ArrivalCompletion>,
        at: NaiveDateTime,
    ) -> RepositoryResult<()>;

    /// 款号下所有未删除订单ID
    fn list_order_ids_by_style(&self, style_no: &str) -> RepositoryResult<Vec<String>>;
}

// ==========================================
// TemplateStore - 进度模板
// ==========================================
pub trait TemplateStore: Send + Sync {
    /// 读取款式模板 JSON
    ///
    /// # 返回
    /// - Some(json): 款式模板，缺失时回退默认模板
    /// - None: 均不存在
    fn load_template_json(&self, style_no: Option<&str>) -> RepositoryResult<Option<String>>;

    /// 保存模板 JSON
    ///
    /// # 参数
    /// - style_no: 款号；None 表示默认模板
    ///
    /// # 返回
    /// - template_id
    fn save_template_json(
        &self,
        style_no: Option<&str>,
        template_json: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<String>;
}

// ==========================================
// AuditSink - 审计日志
// ==========================================
pub trait AuditSink: Send + Sync {
    fn record(&self, log: &ActionLog) -> RepositoryResult<()>;
}
