// ==========================================
// 服装生产进度引擎 - 扫码去重
// ==========================================
// 职责: 同一 (环节, 菲号) 的多次扫码只计一次（取 MAX，不累加）
// 规则:
// - 有菲号: 每个菲号取最大数量，再按环节求和
// - 无菲号: 直接按环节求和
// - 数量 <= 0 / 结果非 success / 无法解析环节名 → 跳过
// - 质检扫码单独统计（由聚合器与生产口径取 max 合并）
// ==========================================

use crate::domain::scan_event::CompletionEvent;
use chrono::NaiveDateTime;
use std::collections::HashMap;

// ==========================================
// StageQuantities - 有序的 环节 → 数量 映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageQuantities {
    entries: Vec<(String, i64)>,
}

impl StageQuantities {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询数量（不存在返回 0）
    pub fn get(&self, name: &str) -> i64 {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// 累加
    pub fn add(&mut self, name: &str, qty: i64) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, q)) => *q += qty,
            None => self.entries.push((name.to_string(), qty)),
        }
    }

    /// 取较大值合并
    pub fn merge_max(&mut self, name: &str, qty: i64) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, q)) => *q = (*q).max(qty),
            None => self.entries.push((name.to_string(), qty)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(n, q)| (n.as_str(), *q))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==========================================
// DedupTotals - 去重后的原始环节统计
// ==========================================
// key 为扫码记录上的原始环节名（已 trim），尚未对齐模板
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupTotals {
    pub production: StageQuantities, // 生产/裁剪/入库口径
    pub quality: StageQuantities,    // 质检口径
}

#[derive(Default)]
struct StageBucket {
    first_seen: Option<NaiveDateTime>,
    unbundled: i64,
    by_unit: HashMap<String, i64>,
}

impl StageBucket {
    fn observe(&mut self, unit: Option<&str>, qty: i64, at: NaiveDateTime) {
        self.first_seen = Some(self.first_seen.map_or(at, |t| t.min(at)));
        match unit {
            Some(u) => {
                let slot = self.by_unit.entry(u.to_string()).or_insert(0);
                *slot = (*slot).max(qty);
            }
            None => self.unbundled += qty,
        }
    }

    fn total(&self) -> i64 {
        self.unbundled + self.by_unit.values().sum::<i64>()
    }
}

// ==========================================
// EventDeduplicator
// ==========================================
pub struct EventDeduplicator;

impl EventDeduplicator {
    /// 对扫码记录去重汇总
    ///
    /// # 返回
    /// - DedupTotals: 两个口径的 原始环节名 → 数量，按首次扫码时间（同时刻按名称）排序
    pub fn dedup(events: &[CompletionEvent]) -> DedupTotals {
        let mut production: HashMap<String, StageBucket> = HashMap::new();
        let mut quality: HashMap<String, StageBucket> = HashMap::new();

        for event in events {
            if !event.is_success() || event.quantity <= 0 {
                continue;
            }
            let stage = match event.stage_name() {
                Some(s) => s,
                None => {
                    tracing::debug!(
                        "跳过无环节名的扫码记录: order_id={}, key={}",
                        event.order_id,
                        event.idempotency_key
                    );
                    continue;
                }
            };
            let target = if event.kind.is_production_path() {
                &mut production
            } else {
                &mut quality
            };
            target
                .entry(stage.to_string())
                .or_default()
                .observe(event.unit(), event.quantity, event.scanned_at);
        }

        DedupTotals {
            production: Self::flatten(production),
            quality: Self::flatten(quality),
        }
    }

    fn flatten(buckets: HashMap<String, StageBucket>) -> StageQuantities {
        let mut rows: Vec<(String, StageBucket)> = buckets.into_iter().collect();
        rows.sort_by(|(na, a), (nb, b)| a.first_seen.cmp(&b.first_seen).then_with(|| na.cmp(nb)));

        let mut out = StageQuantities::new();
        for (name, bucket) in rows {
            let total = bucket.total();
            if total > 0 {
                out.add(&name, total);
            }
        }
        out
    }
}
