// ==========================================
// 服装生产进度引擎 - 环节名匹配
// ==========================================
// 职责: 环节名标准化 + 同义词等价判定
// 说明: 现场扫码的工序名五花八门（"车缝"/"缝制"/"Sewing"），
//       统一经此处判定是否属于同一进度环节
// ==========================================

use crate::domain::stage_template::{STAGE_ORDER_CREATED, STAGE_PROCUREMENT};

/// 环节名等价判定接口
///
/// 引擎只依赖此 trait，同义词表可按工厂替换
pub trait StageNameMatcher: Send + Sync {
    /// 两个环节名是否指同一进度环节
    fn stages_equal(&self, a: &str, b: &str) -> bool;

    /// 是否质检类环节（质检口径与生产口径取 max 合并）
    fn is_quality_stage(&self, name: &str) -> bool;

    /// 是否裁剪类环节（基数使用实际裁剪数量）
    fn is_cutting_stage(&self, name: &str) -> bool;

    /// 是否包装类环节（完成数量取自此环节）
    fn is_packaging_stage(&self, name: &str) -> bool;

    /// 是否保留环节（下单/采购）
    fn is_base_stage(&self, name: &str) -> bool {
        self.is_order_created_stage(name) || self.is_procurement_stage(name)
    }

    fn is_order_created_stage(&self, name: &str) -> bool {
        self.stages_equal(STAGE_ORDER_CREATED, name)
    }

    fn is_procurement_stage(&self, name: &str) -> bool {
        self.stages_equal(STAGE_PROCUREMENT, name)
    }
}

/// 标准化环节名: 去首尾空白、去内部空白、转小写
pub fn normalize_stage_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

// ==========================================
// SynonymGroup - 同义词组
// ==========================================
#[derive(Debug, Clone)]
pub struct SynonymGroup {
    pub label: &'static str,
    pub keywords: Vec<String>, // 已标准化的关键词
}

impl SynonymGroup {
    pub fn new(label: &'static str, keywords: &[&str]) -> Self {
        Self {
            label,
            keywords: keywords.iter().map(|k| normalize_stage_name(k)).collect(),
        }
    }

    /// 标准化后的名称包含任一关键词即视为属于本组
    fn contains(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|k| !k.is_empty() && normalized.contains(k.as_str()))
    }
}

/// 包含判定的最短名称长度（单字名称只做相等判定）
const MIN_CONTAINS_CHARS: usize = 2;

pub const GROUP_ORDER_CREATED: &str = "order_created";
pub const GROUP_PROCUREMENT: &str = "procurement";
pub const GROUP_CUTTING: &str = "cutting";
pub const GROUP_SEWING: &str = "sewing";
pub const GROUP_IRONING: &str = "ironing";
pub const GROUP_QUALITY: &str = "quality";
pub const GROUP_PACKAGING: &str = "packaging";
pub const GROUP_SHIPMENT: &str = "shipment";

// ==========================================
// SynonymStageMatcher - 默认同义词匹配器
// ==========================================
// 匹配优先级: 完全相等 → 互相包含 → 同属一个同义词组
#[derive(Debug, Clone)]
pub struct SynonymStageMatcher {
    groups: Vec<SynonymGroup>,
}

impl Default for SynonymStageMatcher {
    fn default() -> Self {
        Self {
            groups: vec![
                SynonymGroup::new(
                    GROUP_ORDER_CREATED,
                    &["下单", "订单创建", "创建订单", "开单", "制单", "ordercreated", "order_created"],
                ),
                SynonymGroup::new(
                    GROUP_PROCUREMENT,
                    &["采购", "物料采购", "面辅料采购", "备料", "到料", "procurement", "purchasing"],
                ),
                SynonymGroup::new(GROUP_CUTTING, &["裁剪", "裁床", "剪裁", "开裁", "cutting"]),
                SynonymGroup::new(GROUP_SEWING, &["车缝", "缝制", "缝纫", "车工", "sewing"]),
                SynonymGroup::new(GROUP_IRONING, &["整烫", "熨烫", "大烫", "ironing"]),
                SynonymGroup::new(
                    GROUP_QUALITY,
                    &["质检", "检验", "品检", "验货", "quality", "inspection"],
                ),
                SynonymGroup::new(
                    GROUP_PACKAGING,
                    &["包装", "后整", "打包", "装箱", "packaging", "packing"],
                ),
                SynonymGroup::new(GROUP_SHIPMENT, &["出货", "发货", "发运", "shipment", "shipping"]),
            ],
        }
    }
}

impl SynonymStageMatcher {
    /// 不带任何同义词组的匹配器（只做相等/包含判定）
    pub fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    /// 追加同义词组（同 label 的组合并关键词）
    pub fn with_group(mut self, label: &'static str, keywords: &[&str]) -> Self {
        let extra = SynonymGroup::new(label, keywords);
        match self.groups.iter_mut().find(|g| g.label == label) {
            Some(existing) => existing.keywords.extend(extra.keywords),
            None => self.groups.push(extra),
        }
        self
    }

    /// 名称所属的同义词组
    pub fn group_of(&self, name: &str) -> Option<&'static str> {
        let n = normalize_stage_name(name);
        if n.is_empty() {
            return None;
        }
        self.groups.iter().find(|g| g.contains(&n)).map(|g| g.label)
    }

    fn in_group(&self, label: &str, name: &str) -> bool {
        let n = normalize_stage_name(name);
        !n.is_empty() && self.groups.iter().any(|g| g.label == label && g.contains(&n))
    }
}

impl StageNameMatcher for SynonymStageMatcher {
    fn stages_equal(&self, a: &str, b: &str) -> bool {
        let a = normalize_stage_name(a);
        let b = normalize_stage_name(b);
        if a.is_empty() || b.is_empty() {
            return false;
        }
        if a == b {
            return true;
        }
        let shorter = a.chars().count().min(b.chars().count());
        if shorter >= MIN_CONTAINS_CHARS && (a.contains(&b) || b.contains(&a)) {
            return true;
        }
        self.groups.iter().any(|g| g.contains(&a) && g.contains(&b))
    }

    fn is_quality_stage(&self, name: &str) -> bool {
        self.in_group(GROUP_QUALITY, name)
    }

    fn is_cutting_stage(&self, name: &str) -> bool {
        self.in_group(GROUP_CUTTING, name)
    }

    fn is_packaging_stage(&self, name: &str) -> bool {
        self.in_group(GROUP_PACKAGING, name)
    }
}
