// ==========================================
// 车载广告档期系统 - 分配配置读取 Trait
// ==========================================
// 职责: 定义分配引擎与回收任务所需的配置读取接口(不包含实现)
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// AllocConfigReader Trait
// ==========================================
// 用途: 分配引擎/回收任务的配置读取接口
// 实现者: ConfigManager(从 config_kv 表读取)
#[async_trait]
pub trait AllocConfigReader: Send + Sync {
    // ===== 容量配置 =====

    /// 获取惰性创建档期记录时的默认槽位总数
    ///
    /// # 默认值
    /// - 5
    async fn get_default_total_slots(&self) -> Result<u32, Box<dyn Error>>;

    // ===== 并发控制配置 =====

    /// 获取乐观并发写入的最大重试轮次
    ///
    /// # 默认值
    /// - 5
    async fn get_max_cas_retries(&self) -> Result<u32, Box<dyn Error>>;

    // ===== 回收任务配置 =====

    /// 获取支付超时时长(小时),活动创建后超过该时长未支付即回收
    ///
    /// # 默认值
    /// - 24
    async fn get_payment_timeout_hours(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取回收任务的扫描间隔(秒)
    ///
    /// # 默认值
    /// - 3600
    async fn get_sweep_interval_secs(&self) -> Result<u64, Box<dyn Error>>;

    /// 获取候补条目的保留天数,入队超过该天数即清理
    ///
    /// # 默认值
    /// - 7
    async fn get_pending_retention_days(&self) -> Result<i64, Box<dyn Error>>;

    // ===== 校验配置 =====

    /// 获取投放窗口的最大跨度(天)
    ///
    /// # 默认值
    /// - 365
    async fn get_max_window_days(&self) -> Result<i64, Box<dyn Error>>;

    // ===== 选择排序配置 =====

    /// 获取同分决胜的优先级物料名单(位次在前者优先)
    ///
    /// # 默认值
    /// - 空名单(退化为物料ID字典序决胜)
    async fn get_priority_materials(&self) -> Result<Vec<String>, Box<dyn Error>>;
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const DEFAULT_TOTAL_SLOTS: &str = "default_total_slots";
    pub const MAX_CAS_RETRIES: &str = "max_cas_retries";
    pub const PAYMENT_TIMEOUT_HOURS: &str = "payment_timeout_hours";
    pub const SWEEP_INTERVAL_SECS: &str = "sweep_interval_secs";
    pub const PENDING_RETENTION_DAYS: &str = "pending_retention_days";
    pub const MAX_WINDOW_DAYS: &str = "max_window_days";
    pub const PRIORITY_MATERIALS: &str = "priority_materials";
}
