// ==========================================
// 车载广告档期系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod allocation_log;
pub mod availability;
pub mod campaign;
pub mod material;
pub mod types;

// 重导出核心类型
pub use allocation_log::{AllocationAction, AllocationLog};
pub use availability::{AvailabilityRecord, PendingRequest, SlotReservation, MAX_TOTAL_SLOTS};
pub use campaign::CampaignSnapshot;
pub use material::MaterialMaster;
pub use types::{CampaignStatus, MaterialStatus, PaymentStatus, ReclaimKind};
