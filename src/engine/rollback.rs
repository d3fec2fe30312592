// ==========================================
// 服装生产进度引擎 - 退回作废
// ==========================================
// 职责: 退回到目标环节时，生成需作废的扫码记录清单
// 规则:
// - 生产口径: 目标环节之后的有效记录（数量 > 0）全部作废
// - 质检/入库记录: 全部作废（只存在于生产完成之后）
// - 推进标记: 目标在退回环节之后的一并作废
// - 只处理仍为 success 的记录，重复执行为空操作
// 红线: 只生成指令，不修改记录；由 EventStore 执行作废
// ==========================================

use crate::domain::scan_event::{CompletionEvent, InvalidationDirective};
use crate::domain::stage_template::StageTemplate;
use crate::domain::types::OverrideKind;
use crate::engine::aggregator::resolve_stage_index;
use crate::engine::stage_names::StageNameMatcher;
use serde::{Deserialize, Serialize};

/// 退回作废计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub target_index: usize,
    pub target_stage: String,
    pub directives: Vec<InvalidationDirective>,
}

pub struct RollbackInvalidator<'a> {
    matcher: &'a dyn StageNameMatcher,
}

impl<'a> RollbackInvalidator<'a> {
    pub fn new(matcher: &'a dyn StageNameMatcher) -> Self {
        Self { matcher }
    }

    /// 生成作废计划
    ///
    /// # 返回
    /// - None: 目标环节不在模板中
    pub fn plan(&self, template: &StageTemplate, events: &[CompletionEvent], target_stage: &str) -> Option<RollbackPlan> {
        let target_index = resolve_stage_index(template, target_stage, self.matcher)?;
        let target_name = template.stages[target_index].name.clone();
        let production_remark = format!("已退回至{}，后续记录作废", target_name);
        let downstream_remark = "生产已退回，后续记录作废".to_string();

        let mut directives = Vec::new();
        for event in events.iter().filter(|e| e.is_success()) {
            let remark = if event.kind.is_downstream() {
                Some(downstream_remark.clone())
            } else if event.marker_kind() == Some(OverrideKind::Advance) {
                self.after_target(template, event, target_index)
                    .then(|| format!("已退回至{}，推进标记作废", target_name))
            } else if event.quantity > 0 {
                self.after_target(template, event, target_index)
                    .then(|| production_remark.clone())
            } else {
                None
            };

            if let Some(remark) = remark {
                directives.push(InvalidationDirective {
                    idempotency_key: event.idempotency_key.clone(),
                    remark,
                });
            }
        }

        tracing::debug!(
            "退回作废计划: target={}, index={}, directives={}",
            target_name,
            target_index,
            directives.len()
        );

        Some(RollbackPlan {
            target_index,
            target_stage: target_name,
            directives,
        })
    }

    fn after_target(&self, template: &StageTemplate, event: &CompletionEvent, target_index: usize) -> bool {
        event
            .stage_name()
            .and_then(|s| resolve_stage_index(template, s, self.matcher))
            .map_or(false, |idx| idx > target_index)
    }
}
