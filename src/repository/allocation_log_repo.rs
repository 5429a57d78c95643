// ==========================================
// 车载广告档期系统 - 分配日志仓储
// ==========================================
// 红线: 所有预订/释放/回收写入必须留痕
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::domain::allocation_log::AllocationLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// AllocationLogRepository - 分配日志仓储
// ==========================================
pub struct AllocationLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AllocationLogRepository {
    /// 创建新的分配日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入分配日志
    ///
    /// # 返回
    /// - `Ok(entry_id)`: 成功插入,返回entry_id
    pub fn insert(&self, log: &AllocationLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO allocation_log (
                entry_id, action_type, action_ts, actor,
                campaign_id, material_id, slot_number,
                window_start, window_end, detail, payload_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                log.entry_id,
                log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.actor,
                log.campaign_id,
                log.material_id,
                log.slot_number,
                log.window_start
                    .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
                log.window_end
                    .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
                log.detail,
                log.payload_json.as_ref().map(|v| v.to_string()),
            ],
        )?;

        Ok(log.entry_id.clone())
    }

    /// 按活动ID查询日志(按时间升序)
    pub fn find_by_campaign(&self, campaign_id: &str) -> RepositoryResult<Vec<AllocationLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT entry_id, action_type, action_ts, actor,
                      campaign_id, material_id, slot_number,
                      window_start, window_end, detail, payload_json
               FROM allocation_log
               WHERE campaign_id = ?1
               ORDER BY action_ts, entry_id"#,
        )?;

        let logs = stmt
            .query_map(params![campaign_id], |row| self.map_row(row))?
            .collect::<Result<Vec<AllocationLog>, _>>()?;

        Ok(logs)
    }

    /// 按物料ID查询日志(按时间升序)
    pub fn find_by_material(&self, material_id: &str) -> RepositoryResult<Vec<AllocationLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT entry_id, action_type, action_ts, actor,
                      campaign_id, material_id, slot_number,
                      window_start, window_end, detail, payload_json
               FROM allocation_log
               WHERE material_id = ?1
               ORDER BY action_ts, entry_id"#,
        )?;

        let logs = stmt
            .query_map(params![material_id], |row| self.map_row(row))?
            .collect::<Result<Vec<AllocationLog>, _>>()?;

        Ok(logs)
    }

    /// 查询最近的日志条目(按时间降序)
    pub fn list_recent(&self, limit: u32) -> RepositoryResult<Vec<AllocationLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT entry_id, action_type, action_ts, actor,
                      campaign_id, material_id, slot_number,
                      window_start, window_end, detail, payload_json
               FROM allocation_log
               ORDER BY action_ts DESC, entry_id DESC
               LIMIT ?1"#,
        )?;

        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<Result<Vec<AllocationLog>, _>>()?;

        Ok(logs)
    }

    /// 映射数据库行到AllocationLog对象
    fn map_row(&self, row: &rusqlite::Row) -> rusqlite::Result<AllocationLog> {
        let parse_dt_opt = |idx: usize, s: Option<String>| match s {
            None => Ok(None),
            Some(s) => NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(Some)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        idx,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                }),
        };

        Ok(AllocationLog {
            entry_id: row.get(0)?,
            action_type: row.get(1)?,
            action_ts: NaiveDateTime::parse_from_str(
                &row.get::<_, String>(2)?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?,
            actor: row.get(3)?,
            campaign_id: row.get(4)?,
            material_id: row.get(5)?,
            slot_number: row.get(6)?,
            window_start: parse_dt_opt(7, row.get::<_, Option<String>>(7)?)?,
            window_end: parse_dt_opt(8, row.get::<_, Option<String>>(8)?)?,
            detail: row.get(9)?,
            payload_json: row
                .get::<_, Option<String>>(10)?
                .and_then(|s| serde_json::from_str(&s).ok()),
        })
    }
}
