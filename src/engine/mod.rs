// ==========================================
// 车载广告档期系统 - 引擎层
// ==========================================
// 职责: 实现档期分配的业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 纯逻辑可脱离存储单测
// ==========================================

pub mod conflict;
pub mod selector;

// 重导出核心引擎
pub use conflict::{ConflictChecker, SlotRejection};
pub use selector::{MaterialSelector, TieBreakPolicy};
