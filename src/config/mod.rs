// ==========================================
// 车载广告档期系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod alloc_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use alloc_config_trait::{config_keys, AllocConfigReader};
pub use config_manager::ConfigManager;
