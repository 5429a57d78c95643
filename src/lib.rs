// ==========================================
// 车载广告档期系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + Tokio
// 系统定位: 车队广告位档期分配引擎 (乐观并发 + 周期回收)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 后台任务层 - 档期回收
pub mod job;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CampaignStatus, MaterialStatus, PaymentStatus, ReclaimKind};

// 领域实体
pub use domain::{
    AllocationAction, AllocationLog, AvailabilityRecord, CampaignSnapshot, MaterialMaster,
    PendingRequest, SlotReservation, MAX_TOTAL_SLOTS,
};

// 引擎
pub use engine::{ConflictChecker, MaterialSelector, SlotRejection, TieBreakPolicy};

// API
pub use api::{
    AllocationApi, ApiError, ApiResult, AvailabilitySummary, AvailabilityView, FeasibilityReport,
    MaterialCandidate, ReleaseOutcome, ReservationOutcome, ReservationRequest, SlotAssignment,
};

// 后台任务
pub use job::{ReclamationJob, SweepReport};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "车载广告档期系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
