// ==========================================
// 服装生产进度引擎 - 领域类型定义
// ==========================================
// 职责: 扫码类型、扫码结果、订单生命周期、人工指令类型
// 序列化格式: 小写 snake_case (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 扫码类型 (Event Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Production, // 生产工序扫码
    Cutting,    // 裁剪扫码
    Quality,    // 质检扫码
    Warehouse,  // 入库扫码
}

impl EventKind {
    /// 全部扫码类型
    pub const ALL: [EventKind; 4] = [
        EventKind::Production,
        EventKind::Cutting,
        EventKind::Quality,
        EventKind::Warehouse,
    ];

    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Production => "production",
            EventKind::Cutting => "cutting",
            EventKind::Quality => "quality",
            EventKind::Warehouse => "warehouse",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "production" => Some(EventKind::Production),
            "cutting" => Some(EventKind::Cutting),
            "quality" => Some(EventKind::Quality),
            "warehouse" => Some(EventKind::Warehouse),
            _ => None,
        }
    }

    /// 是否计入生产口径（质检走独立口径）
    pub fn is_production_path(&self) -> bool {
        !matches!(self, EventKind::Quality)
    }

    /// 生产完成之后才会产生的下游扫码（退回时整体作废）
    pub fn is_downstream(&self) -> bool {
        matches!(self, EventKind::Quality | EventKind::Warehouse)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 扫码结果 (Result Flag)
// ==========================================
// 红线: 记录只作废不删除，作废 = success → failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanResult {
    Success,
    Failure,
}

impl ScanResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanResult::Success => "success",
            ScanResult::Failure => "failure",
        }
    }

    /// 未知取值一律视为 failure，避免误计入进度
    pub fn from_str(s: &str) -> Self {
        match s.trim() {
            "success" => ScanResult::Success,
            _ => ScanResult::Failure,
        }
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 订单生命周期 (Lifecycle Status)
// ==========================================
// 状态流转: not_started → procurement → production → completed
// scrapped 为终态，本引擎不会进入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    NotStarted,
    Procurement,
    Production,
    Completed,
    Scrapped,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::NotStarted => "not_started",
            LifecycleStatus::Procurement => "procurement",
            LifecycleStatus::Production => "production",
            LifecycleStatus::Completed => "completed",
            LifecycleStatus::Scrapped => "scrapped",
        }
    }

    /// 从字符串解析（兼容历史取值 pending）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "not_started" | "pending" => Some(LifecycleStatus::NotStarted),
            "procurement" => Some(LifecycleStatus::Procurement),
            "production" => Some(LifecycleStatus::Production),
            "completed" => Some(LifecycleStatus::Completed),
            "scrapped" => Some(LifecycleStatus::Scrapped),
            _ => None,
        }
    }

    /// 是否为重算不可覆盖的终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Completed | LifecycleStatus::Scrapped)
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 人工指令类型 (Override Kind)
// ==========================================
// advance 只抬高下限，rollback 只压低上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Advance,
    Rollback,
}

impl OverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKind::Advance => "advance",
            OverrideKind::Rollback => "rollback",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "advance" => Some(OverrideKind::Advance),
            "rollback" => Some(OverrideKind::Rollback),
            _ => None,
        }
    }

    /// 标记记录的幂等键前缀
    pub fn key_prefix(&self) -> &'static str {
        match self {
            OverrideKind::Advance => "ORDER_ADVANCE:",
            OverrideKind::Rollback => "ORDER_ROLLBACK:",
        }
    }
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 操作人 (Operator)
// ==========================================
// 人工指令显式传入操作人，不依赖请求上下文
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl Operator {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
        }
    }

    /// 系统操作（异步重算、批量重算）
    pub fn system() -> Self {
        Self::default()
    }

    /// 展示名: 姓名 → ID → system
    pub fn display_name(&self) -> &str {
        [self.name.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("system")
    }
}
