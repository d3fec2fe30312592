// ==========================================
// 服装生产进度引擎 - 环节聚合
// ==========================================
// 职责: 将去重后的原始环节数量对齐到模板环节
// 匹配优先级: 标准化后完全相等 → 同义词/包含判定
// 合并规则: 质检类模板环节 = max(生产口径, 质检口径)
// 实现:
// - ScanStageAggregator: 读取扫码记录在内存中去重
// - ViewStageAggregator: 读取预聚合视图（repository 层）
// 两种实现共用 StageAggregate::from_totals，结果必须一致
// ==========================================

use crate::domain::stage_template::StageTemplate;
use crate::engine::dedup::{DedupTotals, EventDeduplicator, StageQuantities};
use crate::engine::stage_names::{normalize_stage_name, StageNameMatcher};
use crate::repository::error::RepositoryResult;
use crate::repository::progress_store_trait::EventStore;
use std::sync::Arc;

/// 环节聚合接口
///
/// 调用方不关心数据来自原始扫码还是预聚合视图
pub trait StageAggregator: Send + Sync {
    /// 聚合订单在模板下的各环节完成数量
    fn aggregate(&self, order_id: &str, template: &StageTemplate) -> RepositoryResult<StageAggregate>;
}

/// 将原始环节名解析为模板环节下标
///
/// # 返回
/// - Some(idx): 模板中的环节下标
/// - None: 无法匹配（调用方忽略或归入未匹配集合）
pub fn resolve_stage_index(
    template: &StageTemplate,
    raw: &str,
    matcher: &dyn StageNameMatcher,
) -> Option<usize> {
    let normalized = normalize_stage_name(raw);
    if normalized.is_empty() {
        return None;
    }
    template
        .stages
        .iter()
        .position(|s| normalize_stage_name(&s.name) == normalized)
        .or_else(|| template.stages.iter().position(|s| matcher.stages_equal(&s.name, raw)))
}

// ==========================================
// StageAggregate - 聚合结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageAggregate {
    /// 模板环节名 → 完成数量（按模板顺序）
    pub done: StageQuantities,
    /// 模板中不存在的非保留环节（原始名 → 数量），供兜底模板使用
    pub unresolved: StageQuantities,
    /// 是否存在保留环节（下单/采购）的有效记录
    pub base_stage_seen: bool,
    /// 是否存在生产环节的有效记录
    pub production_seen: bool,
}

impl StageAggregate {
    /// 环节完成数量: 模板环节优先，其次未匹配集合
    pub fn done_for(&self, name: &str) -> i64 {
        if self.done.contains(name) {
            self.done.get(name)
        } else {
            self.unresolved.get(name)
        }
    }

    /// 从去重结果构建聚合
    pub fn from_totals(totals: &DedupTotals, template: &StageTemplate, matcher: &dyn StageNameMatcher) -> Self {
        let mut production = StageQuantities::new();
        let mut quality = StageQuantities::new();
        let mut unresolved = StageQuantities::new();
        let mut base_stage_seen = false;
        let mut production_seen = false;

        for (raw, qty) in totals.production.iter() {
            match resolve_stage_index(template, raw, matcher) {
                Some(idx) => {
                    let name = template.stages[idx].name.as_str();
                    production.add(name, qty);
                    if matcher.is_base_stage(name) {
                        base_stage_seen = true;
                    } else {
                        production_seen = true;
                    }
                }
                None if matcher.is_base_stage(raw) => base_stage_seen = true,
                None => {
                    tracing::debug!("环节未匹配模板，计入未匹配集合: stage={}", raw);
                    unresolved.add(raw, qty);
                    production_seen = true;
                }
            }
        }

        for (raw, qty) in totals.quality.iter() {
            match resolve_stage_index(template, raw, matcher) {
                Some(idx) if matcher.is_quality_stage(&template.stages[idx].name) => {
                    quality.add(&template.stages[idx].name, qty);
                    production_seen = true;
                }
                _ => tracing::debug!("质检记录未匹配质检环节，忽略: stage={}", raw),
            }
        }

        // 按模板顺序输出
        let mut done = StageQuantities::new();
        for stage in &template.stages {
            let name = stage.name.as_str();
            if !production.contains(name) && !quality.contains(name) {
                continue;
            }
            let merged = production.get(name).max(quality.get(name));
            done.add(name, merged);
        }

        Self {
            done,
            unresolved,
            base_stage_seen,
            production_seen,
        }
    }
}

// ==========================================
// ScanStageAggregator - 直接读取扫码记录
// ==========================================
pub struct ScanStageAggregator {
    events: Arc<dyn EventStore>,
    matcher: Arc<dyn StageNameMatcher>,
}

impl ScanStageAggregator {
    pub fn new(events: Arc<dyn EventStore>, matcher: Arc<dyn StageNameMatcher>) -> Self {
        Self { events, matcher }
    }
}

impl StageAggregator for ScanStageAggregator {
    fn aggregate(&self, order_id: &str, template: &StageTemplate) -> RepositoryResult<StageAggregate> {
        let events = self.events.load_events(order_id, &[])?;
        let totals = EventDeduplicator::dedup(&events);
        Ok(StageAggregate::from_totals(&totals, template, self.matcher.as_ref()))
    }
}
