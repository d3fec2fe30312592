// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use garment_progress::domain::order::OrderMeta;
use garment_progress::domain::scan_event::CompletionEvent;
use garment_progress::domain::types::{EventKind, LifecycleStatus, ScanResult};

/// 测试时间: 2026-03-01 08:{minute}
pub fn ts(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 1)
        .unwrap()
        .and_hms_opt(8, minute, 0)
        .unwrap()
}

/// 四环节标准模板（下单/采购/裁剪/车缝）
pub const STANDARD_TEMPLATE: &[(&str, Option<f64>)] = &[
    ("OrderCreated", Some(5.0)),
    ("Procurement", Some(15.0)),
    ("Cutting", Some(20.0)),
    ("Sewing", Some(60.0)),
];

/// 三个生产环节 A/B/C，权重 10/30/60
pub const ABC_TEMPLATE: &[(&str, Option<f64>)] = &[("A", Some(10.0)), ("B", Some(30.0)), ("C", Some(60.0))];

// ==========================================
// OrderMeta 构建器
// ==========================================

pub struct OrderBuilder {
    meta: OrderMeta,
}

impl OrderBuilder {
    pub fn new(order_id: &str, total_quantity: i64) -> Self {
        Self {
            meta: OrderMeta::new(order_id, None, total_quantity),
        }
    }

    pub fn style(mut self, style_no: &str) -> Self {
        self.meta.style_no = Some(style_no.to_string());
        self
    }

    pub fn arrival_rate(mut self, rate: i32) -> Self {
        self.meta.material_arrival_rate = rate;
        self
    }

    pub fn cut(mut self, actual_cut_quantity: i64) -> Self {
        self.meta.actual_cut_quantity = actual_cut_quantity;
        self
    }

    pub fn status(mut self, status: LifecycleStatus) -> Self {
        self.meta.lifecycle_status = status;
        self
    }

    pub fn completed(mut self, completed_quantity: i64) -> Self {
        self.meta.completed_quantity = completed_quantity;
        self
    }

    pub fn build(self) -> OrderMeta {
        self.meta
    }
}

// ==========================================
// CompletionEvent 构建器
// ==========================================

pub struct ScanBuilder {
    event: CompletionEvent,
}

impl ScanBuilder {
    pub fn new(key: &str, order_id: &str, stage: &str, quantity: i64) -> Self {
        Self {
            event: CompletionEvent::new(key, order_id, stage, quantity, EventKind::Production, ts(0)),
        }
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.event.kind = kind;
        self
    }

    pub fn unit(mut self, unit_id: &str) -> Self {
        self.event = self.event.with_unit(unit_id);
        self
    }

    pub fn at(mut self, minute: u32) -> Self {
        self.event.scanned_at = ts(minute);
        self
    }

    pub fn failed(mut self) -> Self {
        self.event.result = ScanResult::Failure;
        self
    }

    pub fn build(self) -> CompletionEvent {
        self.event
    }
}
