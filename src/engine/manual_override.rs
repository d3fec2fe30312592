// ==========================================
// 服装生产进度引擎 - 人工推进/退回
// ==========================================
// 规则:
// - 每种指令只取最近一次未作废的标记记录
// - 目标环节下标线性换算为百分比: round(idx × 100 / (n - 1))
// - advance: progress = max(计算值, 标记百分比)（只抬高下限）
// - rollback: progress = min(计算值, 标记百分比)（只压低上限）
// - 两种标记同时存在时按时间先后依次应用，后者生效
// - 目标环节无法解析 → 忽略该标记
// ==========================================

use crate::domain::scan_event::CompletionEvent;
use crate::domain::stage_template::StageTemplate;
use crate::domain::types::OverrideKind;
use crate::engine::aggregator::resolve_stage_index;
use crate::engine::stage_names::StageNameMatcher;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 有效的人工标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideMarker {
    pub kind: OverrideKind,
    pub target_stage: String,
    pub marked_at: NaiveDateTime,
    pub idempotency_key: String,
}

/// 已应用的标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOverride {
    pub kind: OverrideKind,
    pub target_stage: String,
    pub marker_percent: i32,
}

/// 调整结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideOutcome {
    pub progress_percent: i32,
    pub applied: Vec<AppliedOverride>,
}

pub struct ManualOverrideAdjuster<'a> {
    matcher: &'a dyn StageNameMatcher,
}

impl<'a> ManualOverrideAdjuster<'a> {
    pub fn new(matcher: &'a dyn StageNameMatcher) -> Self {
        Self { matcher }
    }

    /// 每种指令最近一次的有效标记，按时间升序返回
    pub fn latest_markers(events: &[CompletionEvent]) -> Vec<OverrideMarker> {
        let mut latest: Vec<OverrideMarker> = Vec::new();
        for event in events.iter().filter(|e| e.is_success()) {
            let kind = match event.marker_kind() {
                Some(k) => k,
                None => continue,
            };
            let target = match event.stage_name() {
                Some(s) => s.to_string(),
                None => continue,
            };
            let marker = OverrideMarker {
                kind,
                target_stage: target,
                marked_at: event.scanned_at,
                idempotency_key: event.idempotency_key.clone(),
            };
            match latest.iter_mut().find(|m| m.kind == kind) {
                // 同一时刻以后出现者为准（调用方按写入顺序提供）
                Some(existing) if marker.marked_at >= existing.marked_at => *existing = marker,
                Some(_) => {}
                None => latest.push(marker),
            }
        }
        latest.sort_by(|a, b| a.marked_at.cmp(&b.marked_at));
        latest
    }

    /// 目标环节对应的百分比
    ///
    /// # 返回
    /// - None: 目标环节不在模板中
    pub fn marker_percent(&self, template: &StageTemplate, target_stage: &str) -> Option<i32> {
        let idx = resolve_stage_index(template, target_stage, self.matcher)?;
        let n = template.len();
        if n <= 1 {
            return Some(0);
        }
        Some(((idx as f64 * 100.0) / (n - 1) as f64).round() as i32)
    }

    /// 在计算值上应用人工标记
    pub fn apply(&self, computed: i32, template: &StageTemplate, events: &[CompletionEvent]) -> OverrideOutcome {
        let mut progress = computed;
        let mut applied = Vec::new();

        for marker in Self::latest_markers(events) {
            let percent = match self.marker_percent(template, &marker.target_stage) {
                Some(p) => p,
                None => {
                    tracing::debug!(
                        "人工标记目标环节不在模板中，忽略: kind={}, stage={}",
                        marker.kind,
                        marker.target_stage
                    );
                    continue;
                }
            };
            progress = match marker.kind {
                OverrideKind::Advance => progress.max(percent),
                OverrideKind::Rollback => progress.min(percent),
            };
            applied.push(AppliedOverride {
                kind: marker.kind,
                target_stage: marker.target_stage,
                marker_percent: percent,
            });
        }

        OverrideOutcome {
            progress_percent: progress.clamp(0, 100),
            applied,
        }
    }
}
