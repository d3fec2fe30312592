// ==========================================
// 服装生产进度引擎 - 进度重算流水线
// ==========================================
// 流程: 模板兜底 → 采购闸门 → 加权计算 → 人工推进/退回 → 状态机 → 快照
// 红线: 纯计算，无 I/O；同一输入重复计算结果完全一致
// ==========================================

use crate::config::ProgressConfig;
use crate::domain::order::{OrderMeta, OrderProgressSnapshot};
use crate::domain::scan_event::CompletionEvent;
use crate::domain::stage_template::{StageTemplate, STAGE_ORDER_CREATED};
use crate::domain::types::LifecycleStatus;
use crate::engine::aggregator::StageAggregate;
use crate::engine::manual_override::{ManualOverrideAdjuster, OverrideOutcome};
use crate::engine::procurement_gate::{GateDecision, ProcurementGate};
use crate::engine::progress_calc::{ProgressCalculator, ProgressComputation};
use crate::engine::stage_names::StageNameMatcher;
use crate::engine::status_machine::{OrderStatusStateMachine, StatusInput};
use crate::engine::template_resolver::{fallback_template, production_stage_count};
use std::borrow::Cow;
use std::sync::Arc;

// ==========================================
// RecomputeInput - 重算输入
// ==========================================
pub struct RecomputeInput<'a> {
    pub meta: &'a OrderMeta,
    pub template: &'a StageTemplate,
    pub aggregate: &'a StageAggregate,
    /// 订单扫码记录（只读取其中的人工标记）
    pub events: &'a [CompletionEvent],
}

// ==========================================
// RecomputeOutcome - 重算结果
// ==========================================
#[derive(Debug, Clone)]
pub struct RecomputeOutcome {
    pub snapshot: OrderProgressSnapshot,
    pub computation: ProgressComputation,
    pub overrides: OverrideOutcome,
    pub gate: GateDecision,
    pub fallback_template: bool,
}

pub struct ProgressRecomputeEngine {
    matcher: Arc<dyn StageNameMatcher>,
    config: ProgressConfig,
    gate: ProcurementGate,
}

impl ProgressRecomputeEngine {
    pub fn new(matcher: Arc<dyn StageNameMatcher>, config: ProgressConfig) -> Self {
        let gate = ProcurementGate::from_config(&config);
        Self { matcher, config, gate }
    }

    pub fn gate(&self) -> &ProcurementGate {
        &self.gate
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    pub fn matcher(&self) -> &dyn StageNameMatcher {
        self.matcher.as_ref()
    }

    /// 实际参与计算的模板: 无生产环节时使用兜底模板
    pub fn effective_template<'t>(
        &self,
        template: &'t StageTemplate,
        aggregate: &StageAggregate,
    ) -> Cow<'t, StageTemplate> {
        if production_stage_count(template, self.matcher.as_ref()) > 0 {
            return Cow::Borrowed(template);
        }
        Cow::Owned(fallback_template(
            template.style_no.clone(),
            &self.config,
            aggregate.unresolved.names(),
        ))
    }

    /// 执行完整重算
    pub fn compute(&self, input: &RecomputeInput<'_>) -> RecomputeOutcome {
        let meta = input.meta;
        let template = self.effective_template(input.template, input.aggregate);
        if template.synthetic {
            tracing::debug!(
                "款式模板无生产环节，使用兜底模板: order_id={}, style_no={:?}",
                meta.order_id,
                meta.style_no
            );
        }

        // 兜底模板: 无下单扫码时下单环节按订单数量视为完成
        let aggregate: Cow<'_, StageAggregate> =
            if template.synthetic && !input.aggregate.done.contains(STAGE_ORDER_CREATED) {
                let mut seeded = input.aggregate.clone();
                seeded.done.add(STAGE_ORDER_CREATED, meta.total_quantity);
                Cow::Owned(seeded)
            } else {
                Cow::Borrowed(input.aggregate)
            };

        let gate = self.gate.evaluate(meta);
        let computation = ProgressCalculator::new(self.matcher.as_ref(), &self.gate).compute(
            &template,
            &aggregate,
            meta,
            &gate,
        );
        let overrides = ManualOverrideAdjuster::new(self.matcher.as_ref()).apply(
            computation.progress_percent,
            &template,
            input.events,
        );

        let status = OrderStatusStateMachine::derive(&StatusInput {
            current: meta.lifecycle_status,
            gate_complete: gate.complete,
            procurement_activity: meta.arrival_rate() > 0 || meta.manually_confirmed(),
            base_stage_seen: input.aggregate.base_stage_seen,
            production_seen: input.aggregate.production_seen,
            progress_percent: overrides.progress_percent,
        });

        let completed = status.status == LifecycleStatus::Completed;
        let completed_quantity = if completed && meta.completed_quantity > 0 {
            meta.completed_quantity
        } else {
            computation.completed_quantity
        };
        let current_stage_name = match template.last_stage() {
            Some(last) if completed => last.name.clone(),
            _ => computation.current_stage.clone(),
        };

        let snapshot = OrderProgressSnapshot {
            order_id: meta.order_id.clone(),
            completed_quantity,
            progress_percent: status.progress_percent,
            current_stage_name,
            lifecycle_status: status.status,
            procurement_complete: gate.complete,
            procurement_completed_at: gate.completed_at,
            procurement_completed_by: gate.completed_by.clone(),
        };

        tracing::info!(
            "进度重算完成: order_id={}, computed={}, progress={}, stage={}, status={}",
            meta.order_id,
            computation.progress_percent,
            snapshot.progress_percent,
            snapshot.current_stage_name,
            snapshot.lifecycle_status
        );

        RecomputeOutcome {
            snapshot,
            computation,
            overrides,
            gate,
            fallback_template: template.synthetic,
        }
    }
}
