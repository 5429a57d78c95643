// ==========================================
// 车载广告档期系统 - 后台任务层
// ==========================================
// 职责: 周期性维护任务(档期回收)
// ==========================================

pub mod reclamation;

pub use reclamation::{ReclamationJob, SweepReport};
