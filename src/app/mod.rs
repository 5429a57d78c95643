// ==========================================
// 车载广告档期系统 - 应用层
// ==========================================
// 职责: 组装仓储/API/回收任务,提供服务入口共享状态
// ==========================================

pub mod state;

// 重导出
pub use state::{AppState, get_default_db_path};
