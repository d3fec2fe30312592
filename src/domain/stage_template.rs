// ==========================================
// 服装生产进度引擎 - 进度模板领域模型
// ==========================================
// 职责: 款式进度模板（有序环节 + 权重）
// 约定: OrderCreated / Procurement 为保留环节，始终位于模板最前
// ==========================================

use serde::{Deserialize, Serialize};

/// 保留环节: 下单
pub const STAGE_ORDER_CREATED: &str = "OrderCreated";

/// 保留环节: 采购
pub const STAGE_PROCUREMENT: &str = "Procurement";

/// 模板缺少裁剪环节时补入的环节名
pub const STAGE_CUTTING: &str = "Cutting";

// ==========================================
// StageDefinition - 环节定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String, // 环节名
    pub weight: f64,  // 权重 (非负)
}

impl StageDefinition {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight: if weight.is_finite() { weight.max(0.0) } else { 0.0 },
        }
    }
}

// ==========================================
// StageTemplate - 进度模板
// ==========================================
// 不可变值类型，按款式解析一次后缓存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTemplate {
    pub style_no: Option<String>,      // 款号 (None 表示兜底模板)
    pub stages: Vec<StageDefinition>,  // 有序环节
    pub synthetic: bool,               // 是否为兜底合成模板
}

impl StageTemplate {
    pub fn new(style_no: Option<String>, stages: Vec<StageDefinition>) -> Self {
        Self {
            style_no,
            stages,
            synthetic: false,
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// 环节名列表
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// 总权重
    pub fn total_weight(&self) -> f64 {
        self.stages.iter().map(|s| s.weight).sum()
    }

    /// 最后一个环节
    pub fn last_stage(&self) -> Option<&StageDefinition> {
        self.stages.last()
    }
}

// ==========================================
// TemplateDocument - 模板存储格式
// ==========================================
// 对齐: stage_template.template_json
// 格式: {"nodes":[{"name":"Cutting","weight":20}, ...]}
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateDocument {
    #[serde(default)]
    pub nodes: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateNode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl TemplateDocument {
    /// 从 JSON 解析
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
