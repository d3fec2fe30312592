// ==========================================
// 服装生产进度引擎 - 进度计算
// ==========================================
// 公式: progress = Σ(weight_i × ratio_i) / Σ(weight_i) × 100，四舍五入并钳制到 [0,100]
// ratio_i = min(1, done_i / base_i)
// base_i = 下单数量；裁剪环节在实际裁剪数量 > 0 时使用实际裁剪数量
// 采购环节 done 由闸门决定，不取扫码记录
// 当前环节: 闸门未开 → Procurement；否则第一个未完成环节（下单环节除外），全部完成取最后一个
// ==========================================

use crate::domain::order::OrderMeta;
use crate::domain::stage_template::{StageTemplate, STAGE_PROCUREMENT};
use crate::engine::aggregator::StageAggregate;
use crate::engine::procurement_gate::{GateDecision, ProcurementGate};
use crate::engine::stage_names::StageNameMatcher;
use serde::{Deserialize, Serialize};

/// 单环节进度明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    pub name: String,
    pub weight: f64,
    pub done: i64,
    pub base: i64,
    pub ratio: f64,
}

/// 计算结果（人工指令与状态机之前）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressComputation {
    pub progress_percent: i32,
    pub current_stage: String,
    pub completed_quantity: i64,
    pub stages: Vec<StageProgress>,
}

pub struct ProgressCalculator<'a> {
    matcher: &'a dyn StageNameMatcher,
    gate: &'a ProcurementGate,
}

impl<'a> ProgressCalculator<'a> {
    pub fn new(matcher: &'a dyn StageNameMatcher, gate: &'a ProcurementGate) -> Self {
        Self { matcher, gate }
    }

    /// 计算加权进度与当前环节
    ///
    /// # 参数
    /// - template: 已标准化模板（含保留环节）
    /// - aggregate: 环节聚合结果
    /// - meta: 订单元数据
    /// - decision: 采购闸门判定
    pub fn compute(
        &self,
        template: &StageTemplate,
        aggregate: &StageAggregate,
        meta: &OrderMeta,
        decision: &GateDecision,
    ) -> ProgressComputation {
        let total = meta.total_quantity.max(0);

        let stages: Vec<StageProgress> = template
            .stages
            .iter()
            .map(|stage| {
                let base = self.base_quantity(&stage.name, meta);
                let raw_done = if self.matcher.is_procurement_stage(&stage.name) {
                    self.gate.done_quantity(decision, base)
                } else {
                    aggregate.done_for(&stage.name)
                };
                let done = raw_done.clamp(0, base);
                let ratio = if base > 0 { done as f64 / base as f64 } else { 0.0 };
                StageProgress {
                    name: stage.name.clone(),
                    weight: stage.weight,
                    done,
                    base,
                    ratio,
                }
            })
            .collect();

        let weight_sum: f64 = stages.iter().map(|s| s.weight).sum();
        let progress_percent = if weight_sum > 0.0 {
            let weighted: f64 = stages.iter().map(|s| s.weight * s.ratio).sum();
            ((weighted / weight_sum * 100.0).round() as i32).clamp(0, 100)
        } else {
            0
        };

        for s in &stages {
            tracing::debug!(
                "环节进度: order_id={}, stage={}, weight={:.2}, done={}, base={}, ratio={:.3}",
                meta.order_id,
                s.name,
                s.weight,
                s.done,
                s.base,
                s.ratio
            );
        }

        let current_stage = if decision.complete {
            self.current_stage(&stages)
        } else {
            STAGE_PROCUREMENT.to_string()
        };

        ProgressComputation {
            progress_percent,
            current_stage,
            completed_quantity: self.completed_quantity(template, aggregate, total),
            stages,
        }
    }

    fn base_quantity(&self, stage_name: &str, meta: &OrderMeta) -> i64 {
        if meta.actual_cut_quantity > 0 && self.matcher.is_cutting_stage(stage_name) {
            meta.actual_cut_quantity
        } else {
            meta.total_quantity.max(0)
        }
    }

    fn current_stage(&self, stages: &[StageProgress]) -> String {
        stages
            .iter()
            .filter(|s| !self.matcher.is_order_created_stage(&s.name))
            .find(|s| s.done < s.base)
            .or_else(|| stages.last())
            .map(|s| s.name.clone())
            .unwrap_or_else(|| STAGE_PROCUREMENT.to_string())
    }

    /// 完成数量: 包装环节，否则最后一个生产环节
    fn completed_quantity(&self, template: &StageTemplate, aggregate: &StageAggregate, total: i64) -> i64 {
        let production: Vec<&str> = template
            .stages
            .iter()
            .map(|s| s.name.as_str())
            .filter(|n| !self.matcher.is_base_stage(n))
            .collect();
        let target = production
            .iter()
            .find(|n| self.matcher.is_packaging_stage(n))
            .or_else(|| production.last());
        match target {
            Some(name) => aggregate.done_for(name).clamp(0, total),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage_template::{StageDefinition, STAGE_ORDER_CREATED};
    use crate::engine::stage_names::SynonymStageMatcher;

    fn template() -> StageTemplate {
        StageTemplate::new(
            None,
            vec![
                StageDefinition::new(STAGE_ORDER_CREATED, 5.0),
                StageDefinition::new(STAGE_PROCUREMENT, 15.0),
                StageDefinition::new("Cutting", 20.0),
                StageDefinition::new("Sewing", 60.0),
            ],
        )
    }

    fn aggregate(rows: &[(&str, i64)]) -> StageAggregate {
        let mut agg = StageAggregate::default();
        for (n, q) in rows {
            agg.done.add(n, *q);
        }
        agg
    }

    fn meta(rate: i32, cut: i64) -> OrderMeta {
        let mut m = OrderMeta::new("O1", None, 100);
        m.material_arrival_rate = rate;
        m.actual_cut_quantity = cut;
        m
    }

    #[test]
    fn test_weighted_sum_and_current_stage() {
        let matcher = SynonymStageMatcher::default();
        let gate = ProcurementGate::default();
        let calc = ProgressCalculator::new(&matcher, &gate);
        let m = meta(100, 100);
        let r = calc.compute(
            &template(),
            &aggregate(&[(STAGE_ORDER_CREATED, 100), ("Cutting", 100), ("Sewing", 40)]),
            &m,
            &gate.evaluate(&m),
        );
        assert_eq!(r.progress_percent, 64);
        assert_eq!(r.current_stage, "Sewing");
        assert_eq!(r.completed_quantity, 40);
    }

    #[test]
    fn test_cutting_uses_actual_cut_base() {
        let matcher = SynonymStageMatcher::default();
        let gate = ProcurementGate::default();
        let calc = ProgressCalculator::new(&matcher, &gate);
        let m = meta(100, 80);
        let r = calc.compute(&template(), &aggregate(&[("Cutting", 80)]), &m, &gate.evaluate(&m));
        let cutting = r.stages.iter().find(|s| s.name == "Cutting").unwrap();
        assert_eq!(cutting.base, 80);
        assert_eq!(cutting.ratio, 1.0);
        assert_eq!(r.current_stage, "Sewing");
    }

    #[test]
    fn test_gate_closed_pins_procurement() {
        let matcher = SynonymStageMatcher::default();
        let gate = ProcurementGate::default();
        let calc = ProgressCalculator::new(&matcher, &gate);
        let m = meta(40, 0);
        let r = calc.compute(
            &template(),
            &aggregate(&[("Cutting", 100), ("Sewing", 100)]),
            &m,
            &gate.evaluate(&m),
        );
        assert_eq!(r.current_stage, STAGE_PROCUREMENT);
        // 15 × 0.4 + 20 + 60
        assert_eq!(r.progress_percent, 86);
    }

    #[test]
    fn test_all_done_current_is_last_and_over_count_clamped() {
        let matcher = SynonymStageMatcher::default();
        let gate = ProcurementGate::default();
        let calc = ProgressCalculator::new(&matcher, &gate);
        let m = meta(100, 0);
        let r = calc.compute(
            &template(),
            &aggregate(&[(STAGE_ORDER_CREATED, 100), ("Cutting", 130), ("Sewing", 100)]),
            &m,
            &gate.evaluate(&m),
        );
        assert_eq!(r.progress_percent, 100);
        assert_eq!(r.current_stage, "Sewing");
    }

    #[test]
    fn test_zero_weight_template() {
        let matcher = SynonymStageMatcher::default();
        let gate = ProcurementGate::default();
        let calc = ProgressCalculator::new(&matcher, &gate);
        let t = StageTemplate::new(None, vec![StageDefinition::new("Sewing", 0.0)]);
        let m = meta(100, 0);
        let r = calc.compute(&t, &aggregate(&[("Sewing", 50)]), &m, &gate.evaluate(&m));
        assert_eq!(r.progress_percent, 0);
    }

    #[test]
    fn test_packaging_drives_completed_quantity() {
        let matcher = SynonymStageMatcher::default();
        let gate = ProcurementGate::default();
        let calc = ProgressCalculator::new(&matcher, &gate);
        let t = StageTemplate::new(
            None,
            vec![
                StageDefinition::new("Sewing", 40.0),
                StageDefinition::new("包装", 30.0),
                StageDefinition::new("Shipment", 30.0),
            ],
        );
        let m = meta(100, 0);
        let r = calc.compute(
            &t,
            &aggregate(&[("Sewing", 90), ("包装", 70), ("Shipment", 10)]),
            &m,
            &gate.evaluate(&m),
        );
        assert_eq!(r.completed_quantity, 70);
    }
}
