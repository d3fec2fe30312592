// ==========================================
// 服装生产进度引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/引擎错误为用户可读的错误消息
// ==========================================

use crate::engine::procurement_gate::GateViolation;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 采购闸门硬下限: 到料率不足时拒绝人工确认
    #[error("物料到货率不足{floor}%（当前{arrival_rate}%），不允许确认采购完成")]
    ProcurementBelowFloor { arrival_rate: i32, floor: i32 },

    #[error("采购已确认完成，无需重复确认")]
    ProcurementAlreadyConfirmed,

    #[error("环节不在进度模板中: {0}")]
    UnknownStage(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => ApiError::NotFound(format!("{}(id={})不存在", entity, id)),
            RepositoryError::LockError(msg) => ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg)),
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(format!("序列化失败: {}", msg)),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<GateViolation> for ApiError {
    fn from(err: GateViolation) -> Self {
        match err {
            GateViolation::BelowFloor { arrival_rate, floor } => ApiError::ProcurementBelowFloor { arrival_rate, floor },
            GateViolation::AlreadyConfirmed => ApiError::ProcurementAlreadyConfirmed,
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
