// ==========================================
// 服装生产进度引擎 - 订单状态机
// ==========================================
// 状态: not_started → procurement → production → completed（scrapped 为终态，不由引擎进入）
// 规则:
// - completed / scrapped: 保持不变；completed 强制进度 100
// - 存在活动（到料/人工确认/保留环节记录/生产记录）:
//     闸门未开 → procurement，闸门已开 → production
// - 无活动: 进度 0 → not_started；否则闸门未开 → procurement，已开 → production
// 在闸门与人工指令之后执行，不会把生产中订单降回 not_started
// ==========================================

use crate::domain::types::LifecycleStatus;

/// 状态机输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInput {
    pub current: LifecycleStatus,
    pub gate_complete: bool,
    pub procurement_activity: bool,
    pub base_stage_seen: bool,
    pub production_seen: bool,
    pub progress_percent: i32,
}

/// 状态机输出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDecision {
    pub status: LifecycleStatus,
    pub progress_percent: i32,
}

pub struct OrderStatusStateMachine;

impl OrderStatusStateMachine {
    pub fn derive(input: &StatusInput) -> StatusDecision {
        match input.current {
            LifecycleStatus::Completed => {
                return StatusDecision {
                    status: LifecycleStatus::Completed,
                    progress_percent: 100,
                }
            }
            LifecycleStatus::Scrapped => {
                return StatusDecision {
                    status: LifecycleStatus::Scrapped,
                    progress_percent: input.progress_percent,
                }
            }
            _ => {}
        }

        let active = input.procurement_activity || input.base_stage_seen || input.production_seen;
        let status = if !active && input.progress_percent == 0 {
            LifecycleStatus::NotStarted
        } else if input.gate_complete {
            LifecycleStatus::Production
        } else {
            LifecycleStatus::Procurement
        };

        StatusDecision {
            status,
            progress_percent: input.progress_percent,
        }
    }
}
