// ==========================================
// 服装生产进度引擎 - 采购闸门
// ==========================================
// 规则:
// - 到料率 >= 自动完成阈值(100) → 采购完成
// - 到料率 >= 确认下限(50) 且已人工确认 → 采购完成
// - 到料率 < 确认下限 → 一律未完成（硬下限，人工确认无效）
// 完成时间/经办人: 人工确认信息优先于到料完成信息
// ==========================================

use crate::config::ProgressConfig;
use crate::domain::order::OrderMeta;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 闸门打开方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOpenedBy {
    ArrivalRate,
    ManualConfirmation,
}

/// 闸门判定结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub complete: bool,
    pub opened_by: Option<GateOpenedBy>,
    pub completed_at: Option<NaiveDateTime>,
    pub completed_by: Option<String>,
    pub arrival_rate: i32,
}

/// 人工确认被拒绝的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateViolation {
    #[error("物料到货率不足{floor}%（当前{arrival_rate}%），不允许确认采购完成")]
    BelowFloor { arrival_rate: i32, floor: i32 },

    #[error("采购已确认完成，无需重复确认")]
    AlreadyConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcurementGate {
    auto_rate: i32,
    confirm_floor: i32,
}

impl Default for ProcurementGate {
    fn default() -> Self {
        Self::from_config(&ProgressConfig::default())
    }
}

impl ProcurementGate {
    pub fn from_config(config: &ProgressConfig) -> Self {
        let auto_rate = config.procurement_auto_rate.clamp(1, 100);
        Self {
            auto_rate,
            confirm_floor: config.procurement_confirm_floor.clamp(0, auto_rate),
        }
    }

    pub fn auto_rate(&self) -> i32 {
        self.auto_rate
    }

    pub fn confirm_floor(&self) -> i32 {
        self.confirm_floor
    }

    /// 判定采购是否完成
    pub fn evaluate(&self, meta: &OrderMeta) -> GateDecision {
        let rate = meta.arrival_rate();
        let confirmation = meta.procurement_confirmation.as_ref();

        // 硬下限
        if rate < self.confirm_floor {
            if confirmation.is_some() {
                tracing::warn!(
                    "到料率低于确认下限，人工确认不生效: order_id={}, rate={}, floor={}",
                    meta.order_id,
                    rate,
                    self.confirm_floor
                );
            }
            return GateDecision::closed(rate);
        }

        if let Some(c) = confirmation {
            return GateDecision {
                complete: true,
                opened_by: Some(GateOpenedBy::ManualConfirmation),
                completed_at: Some(c.confirmed_at),
                completed_by: c.operator_name.clone().or_else(|| c.operator_id.clone()),
                arrival_rate: rate,
            };
        }

        if rate >= self.auto_rate {
            let arrival = meta.arrival_completion.as_ref();
            return GateDecision {
                complete: true,
                opened_by: Some(GateOpenedBy::ArrivalRate),
                completed_at: arrival.map(|a| a.completed_at),
                completed_by: arrival.and_then(|a| a.operator_name.clone().or_else(|| a.operator_id.clone())),
                arrival_rate: rate,
            };
        }

        GateDecision::closed(rate)
    }

    /// 校验人工确认命令
    pub fn check_confirmation(&self, meta: &OrderMeta) -> Result<(), GateViolation> {
        let rate = meta.arrival_rate();
        if rate < self.confirm_floor {
            return Err(GateViolation::BelowFloor {
                arrival_rate: rate,
                floor: self.confirm_floor,
            });
        }
        if meta.manually_confirmed() {
            return Err(GateViolation::AlreadyConfirmed);
        }
        Ok(())
    }

    /// 采购环节的完成数量
    ///
    /// 完成 → 总数量；未完成 → 按到料率折算且严格小于总数量
    pub fn done_quantity(&self, decision: &GateDecision, total_quantity: i64) -> i64 {
        let total = total_quantity.max(0);
        if decision.complete {
            return total;
        }
        let by_rate = (total as f64 * decision.arrival_rate as f64 / 100.0).round() as i64;
        by_rate.min(total - 1).max(0)
    }
}

impl GateDecision {
    fn closed(rate: i32) -> Self {
        Self {
            complete: false,
            opened_by: None,
            completed_at: None,
            completed_by: None,
            arrival_rate: rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{ArrivalCompletion, ProcurementConfirmation};
    use chrono::NaiveDate;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn meta(rate: i32, confirmed: bool) -> OrderMeta {
        let mut m = OrderMeta::new("O1", None, 100);
        m.material_arrival_rate = rate;
        if confirmed {
            m.procurement_confirmation = Some(ProcurementConfirmation {
                confirmed_at: ts(10),
                operator_id: Some("u1".to_string()),
                operator_name: Some("张三".to_string()),
                remark: "面料已到齐，辅料在途".to_string(),
            });
        }
        m
    }

    #[test]
    fn test_auto_complete_at_full_rate() {
        let gate = ProcurementGate::default();
        let mut m = meta(100, false);
        m.arrival_completion = Some(ArrivalCompletion {
            completed_at: ts(8),
            operator_id: None,
            operator_name: Some("李四".to_string()),
        });
        let d = gate.evaluate(&m);
        assert!(d.complete);
        assert_eq!(d.opened_by, Some(GateOpenedBy::ArrivalRate));
        assert_eq!(d.completed_by.as_deref(), Some("李四"));
        assert_eq!(d.completed_at, Some(ts(8)));
    }

    #[test]
    fn test_confirmation_at_exactly_floor_opens() {
        let gate = ProcurementGate::default();
        let d = gate.evaluate(&meta(50, true));
        assert!(d.complete);
        assert_eq!(d.opened_by, Some(GateOpenedBy::ManualConfirmation));
    }

    #[test]
    fn test_below_floor_is_hard() {
        let gate = ProcurementGate::default();
        assert!(!gate.evaluate(&meta(40, true)).complete);
        assert!(!gate.evaluate(&meta(99, false)).complete);
        assert_eq!(
            gate.check_confirmation(&meta(40, false)),
            Err(GateViolation::BelowFloor {
                arrival_rate: 40,
                floor: 50
            })
        );
        let msg = gate.check_confirmation(&meta(40, false)).unwrap_err().to_string();
        assert!(msg.contains("40%"));
    }

    #[test]
    fn test_confirmation_metadata_wins() {
        let gate = ProcurementGate::default();
        let mut m = meta(100, true);
        m.arrival_completion = Some(ArrivalCompletion {
            completed_at: ts(8),
            operator_id: None,
            operator_name: Some("李四".to_string()),
        });
        let d = gate.evaluate(&m);
        assert_eq!(d.completed_at, Some(ts(10)));
        assert_eq!(d.completed_by.as_deref(), Some("张三"));
    }

    #[test]
    fn test_already_confirmed_rejected() {
        let gate = ProcurementGate::default();
        assert_eq!(gate.check_confirmation(&meta(80, true)), Err(GateViolation::AlreadyConfirmed));
        assert_eq!(gate.check_confirmation(&meta(80, false)), Ok(()));
    }

    #[test]
    fn test_done_quantity() {
        let gate = ProcurementGate::default();
        assert_eq!(gate.done_quantity(&gate.evaluate(&meta(100, false)), 100), 100);
        assert_eq!(gate.done_quantity(&gate.evaluate(&meta(40, false)), 100), 40);
        assert_eq!(gate.done_quantity(&gate.evaluate(&meta(99, false)), 3), 2);
        assert_eq!(gate.done_quantity(&gate.evaluate(&meta(0, false)), 0), 0);
    }
}
