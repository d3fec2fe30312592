// ==========================================
// 服装生产进度引擎 - 进度计算配置
// ==========================================
// 存储: config_kv 表 (scope_id='global')
// 缺失/格式错误 → 使用默认值
// ==========================================

use serde::{Deserialize, Serialize};

/// 进度计算配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// 模板未声明时，下单环节权重
    pub order_created_weight: f64,
    /// 模板未声明时，采购环节权重
    pub procurement_weight: f64,
    /// 到料率达到此值自动视为采购完成
    pub procurement_auto_rate: i32,
    /// 人工确认采购完成的到料率下限（硬下限）
    pub procurement_confirm_floor: i32,
    /// 人工确认采购的备注最少字符数
    pub confirm_remark_min_chars: usize,
    /// 是否按款式缓存进度模板
    pub template_cache_enabled: bool,
    /// 模板未声明裁剪环节时，在采购之后补入裁剪环节
    pub insert_cutting_stage: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            order_created_weight: 5.0,
            procurement_weight: 15.0,
            procurement_auto_rate: 100,
            procurement_confirm_floor: 50,
            confirm_remark_min_chars: 10,
            template_cache_enabled: true,
            insert_cutting_stage: false,
        }
    }
}

impl ProgressConfig {
    /// 保留环节默认权重之和
    pub fn reserved_weight(&self) -> f64 {
        self.order_created_weight + self.procurement_weight
    }
}
