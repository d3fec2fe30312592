// ==========================================
// 服装生产进度引擎 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 红线: 人工指令与异步重算失败必须记录
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
