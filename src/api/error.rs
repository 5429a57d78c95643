// ==========================================
// 车载广告档期系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// 红线: 业务拒绝(满槽/冲突/维护)与技术失败(并发耗尽/数据库)必须可区分
// ==========================================

use crate::engine::conflict::SlotRejection;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因，调用方据此决定改期或换物料
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务拒绝（档期不可接单）
    // ==========================================
    /// 物料处于维护状态，拒绝一切新预订
    #[error("物料维护中: material_id={material_id}")]
    MaterialUnderMaintenance { material_id: String },

    /// 槽位已满
    #[error("槽位已满: material_id={material_id}")]
    CapacityExceeded { material_id: String },

    /// 投放时间窗与已有预订重叠
    #[error("档期时间冲突: material_id={material_id}, 与活动{conflict_campaign_id}(槽位{conflict_slot})重叠")]
    TimeWindowConflict {
        material_id: String,
        conflict_campaign_id: String,
        conflict_slot: u32,
    },

    /// 同一活动在同一物料上重复预订
    #[error("重复预订: campaign_id={campaign_id}已占用material_id={material_id}")]
    DuplicateReservation {
        campaign_id: String,
        material_id: String,
    },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 有限次CAS重试后仍无法落库，调用方可稍后重试
    #[error("并发修改冲突: {0}")]
    ConcurrentModification(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 将纯函数冲突检测的拒绝原因翻译为API错误
    pub fn from_rejection(material_id: &str, rejection: SlotRejection) -> Self {
        match rejection {
            SlotRejection::Maintenance => ApiError::MaterialUnderMaintenance {
                material_id: material_id.to_string(),
            },
            SlotRejection::CapacityExhausted => ApiError::CapacityExceeded {
                material_id: material_id.to_string(),
            },
            SlotRejection::TimeConflict {
                campaign_id,
                slot_number,
            } => ApiError::TimeWindowConflict {
                material_id: material_id.to_string(),
                conflict_campaign_id: campaign_id,
                conflict_slot: slot_number,
            },
        }
    }

    /// 是否为业务拒绝（区别于技术失败，业务拒绝不应触发调用方的盲目重试）
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            ApiError::MaterialUnderMaintenance { .. }
                | ApiError::CapacityExceeded { .. }
                | ApiError::TimeWindowConflict { .. }
                | ApiError::DuplicateReservation { .. }
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                material_id,
                expected,
                actual,
            } => ApiError::ConcurrentModification(format!(
                "物料{}已被其他操作修改（期望revision={}，实际revision={}）",
                material_id, expected, actual
            )),
            RepositoryError::RetryBudgetExhausted {
                material_id,
                attempts,
            } => ApiError::ConcurrentModification(format!(
                "物料{}并发冲突，重试{}次后仍未成功，请稍后再试",
                material_id, attempts
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
