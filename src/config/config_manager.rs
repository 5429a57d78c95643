// ==========================================
// 车载广告档期系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::alloc_config_trait::{config_keys, AllocConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::availability::MAX_TOTAL_SLOTS;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明: 为保证连接行为一致,会对传入连接再次应用统一 PRAGMA(幂等)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值(scope_id='global')
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值(公开方法,供其他模块复用)
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值,带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;

        Ok(())
    }
}

// ==========================================
// AllocConfigReader Trait 实现
// ==========================================
#[async_trait]
impl AllocConfigReader for ConfigManager {
    // ===== 容量配置 =====

    async fn get_default_total_slots(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DEFAULT_TOTAL_SLOTS, "5")?;
        let slots = value.parse::<u32>().unwrap_or(5);
        if slots < 1 || slots > MAX_TOTAL_SLOTS {
            tracing::warn!(
                config_key = config_keys::DEFAULT_TOTAL_SLOTS,
                raw_value = %value,
                "默认槽位总数越界,使用 5"
            );
            return Ok(5);
        }
        Ok(slots)
    }

    // ===== 并发控制配置 =====

    async fn get_max_cas_retries(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::MAX_CAS_RETRIES, "5")?;
        Ok(value.parse::<u32>().unwrap_or(5).max(1))
    }

    // ===== 回收任务配置 =====

    async fn get_payment_timeout_hours(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PAYMENT_TIMEOUT_HOURS, "24")?;
        Ok(value.parse::<i64>().unwrap_or(24))
    }

    async fn get_sweep_interval_secs(&self) -> Result<u64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::SWEEP_INTERVAL_SECS, "3600")?;
        Ok(value.parse::<u64>().unwrap_or(3600).max(1))
    }

    async fn get_pending_retention_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PENDING_RETENTION_DAYS, "7")?;
        Ok(value.parse::<i64>().unwrap_or(7))
    }

    // ===== 校验配置 =====

    async fn get_max_window_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::MAX_WINDOW_DAYS, "365")?;
        Ok(value.parse::<i64>().unwrap_or(365))
    }

    // ===== 选择排序配置 =====

    async fn get_priority_materials(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PRIORITY_MATERIALS, "")?;

        let materials: Vec<String> = value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(materials)
    }
}
