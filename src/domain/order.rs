// ==========================================
// 服装生产进度引擎 - 生产订单领域模型
// ==========================================
// 职责: 订单元数据（引擎输入）与进度快照（引擎输出）
// 红线: 快照是派生数据，随时可由扫码记录 + 模板 + 元数据重算
// ==========================================

use crate::domain::types::LifecycleStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ProcurementConfirmation - 人工确认采购完成
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementConfirmation {
    pub confirmed_at: NaiveDateTime,
    pub operator_id: Option<String>,
    pub operator_name: Option<String>,
    pub remark: String,
}

// ==========================================
// ArrivalCompletion - 到料率达到 100% 的时间/经办人
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalCompletion {
    pub completed_at: NaiveDateTime,
    pub operator_id: Option<String>,
    pub operator_name: Option<String>,
}

// ==========================================
// OrderMeta - 订单元数据
// ==========================================
// 对齐: production_order 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMeta {
    pub order_id: String,
    pub order_no: Option<String>,
    pub style_no: Option<String>,
    pub total_quantity: i64,                     // 下单数量
    pub actual_cut_quantity: i64,                // 实际裁剪数量 (菲号汇总)
    pub material_arrival_rate: i32,              // 物料到货率 (0-100)
    pub procurement_confirmation: Option<ProcurementConfirmation>,
    pub arrival_completion: Option<ArrivalCompletion>,
    pub lifecycle_status: LifecycleStatus,       // 当前已存储状态
    pub completed_quantity: i64,                 // 当前已存储完成数量
}

impl OrderMeta {
    /// 创建最小订单元数据（测试/导入用）
    pub fn new(order_id: impl Into<String>, style_no: Option<String>, total_quantity: i64) -> Self {
        Self {
            order_id: order_id.into(),
            order_no: None,
            style_no,
            total_quantity,
            actual_cut_quantity: 0,
            material_arrival_rate: 0,
            procurement_confirmation: None,
            arrival_completion: None,
            lifecycle_status: LifecycleStatus::NotStarted,
            completed_quantity: 0,
        }
    }

    /// 到料率钳制到 [0,100]
    pub fn arrival_rate(&self) -> i32 {
        self.material_arrival_rate.clamp(0, 100)
    }

    /// 是否已人工确认采购
    pub fn manually_confirmed(&self) -> bool {
        self.procurement_confirmation.is_some()
    }
}

// ==========================================
// OrderProgressSnapshot - 进度快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderProgressSnapshot {
    pub order_id: String,
    pub completed_quantity: i64,
    pub progress_percent: i32,           // 0-100
    pub current_stage_name: String,
    pub lifecycle_status: LifecycleStatus,
    pub procurement_complete: bool,
    pub procurement_completed_at: Option<NaiveDateTime>,
    pub procurement_completed_by: Option<String>,
}
