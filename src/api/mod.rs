// ==========================================
// 车载广告档期系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供服务入口与回收任务调用
// ==========================================

pub mod allocation_api;
pub mod error;
pub mod validator;

// 重导出核心类型
pub use allocation_api::{
    AllocationApi, AvailabilitySummary, AvailabilityView, FeasibilityReport, MaterialCandidate,
    MaterialFeasibility, ReleaseOutcome, ReservationOutcome, ReservationRequest, SlotAssignment,
};
pub use error::{ApiError, ApiResult};
pub use validator::RequestValidator;
