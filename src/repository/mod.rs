// ==========================================
// 车载广告档期系统 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod allocation_log_repo;
pub mod availability_repo;
pub mod campaign_repo;
pub mod error;
pub mod material_repo;

// 重导出核心仓储
pub use allocation_log_repo::AllocationLogRepository;
pub use availability_repo::AvailabilityRepository;
pub use campaign_repo::{CampaignDirectory, CampaignRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use material_repo::MaterialRepository;
