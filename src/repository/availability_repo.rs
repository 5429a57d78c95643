// ==========================================
// 车载广告档期系统 - 档期记录仓储
// ==========================================
// 职责: slot_availability 表的读写与乐观并发控制
// 红线: 对外不提供绕过版本比对的裸更新,所有变更走 compare_and_apply
// 红线: 读-改-写循环中闭包执行期间不持有数据库锁
// ==========================================

use crate::domain::availability::{AvailabilityRecord, PendingRequest, SlotReservation};
use crate::domain::types::MaterialStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// AvailabilityRepository - 档期记录仓储
// ==========================================
pub struct AvailabilityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AvailabilityRepository {
    /// 创建新的AvailabilityRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按物料ID查询档期记录
    pub fn find_by_id(&self, material_id: &str) -> RepositoryResult<Option<AvailabilityRecord>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT material_id, total_slots, status, reservations_json, pending_json,
                      occupied_slots, pending_count, next_available_date, all_slots_free_date,
                      revision, updated_at
               FROM slot_availability
               WHERE material_id = ?"#,
            params![material_id],
            |row| self.map_row(row),
        ) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询档期记录,不存在时惰性创建空白记录
    ///
    /// INSERT OR IGNORE 保证并发首次访问也只产生一条记录,
    /// 落败方随后读到胜出方写入的那条
    pub fn get_or_create(
        &self,
        material_id: &str,
        default_total_slots: u32,
    ) -> RepositoryResult<AvailabilityRecord> {
        let now = Utc::now().naive_utc();
        let fresh = AvailabilityRecord::new(material_id, default_total_slots, now);
        fresh
            .validate()
            .map_err(RepositoryError::ValidationError)?;

        {
            let conn = self.get_conn()?;
            conn.execute(
                r#"INSERT OR IGNORE INTO slot_availability (
                    material_id, total_slots, status, reservations_json, pending_json,
                    occupied_slots, pending_count, next_available_date, all_slots_free_date,
                    revision, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    &fresh.material_id,
                    fresh.total_slots,
                    fresh.status.to_db_str(),
                    "[]",
                    "[]",
                    0u32,
                    0u32,
                    Option::<String>::None,
                    Option::<String>::None,
                    fresh.revision,
                    fresh.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ],
            )?;
        }

        self.find_by_id(material_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "AvailabilityRecord".to_string(),
                id: material_id.to_string(),
            })
    }

    /// 批量查询档期记录,保持入参顺序,不存在的ID跳过
    ///
    /// 是否把缺失视为错误由调用方决定
    pub fn list_by_ids(&self, material_ids: &[String]) -> RepositoryResult<Vec<AvailabilityRecord>> {
        let mut records = Vec::with_capacity(material_ids.len());
        for material_id in material_ids {
            if let Some(record) = self.find_by_id(material_id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// 查询全部档期记录(按物料ID排序)
    pub fn list_all(&self) -> RepositoryResult<Vec<AvailabilityRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT material_id, total_slots, status, reservations_json, pending_json,
                      occupied_slots, pending_count, next_available_date, all_slots_free_date,
                      revision, updated_at
               FROM slot_availability
               ORDER BY material_id"#,
        )?;

        let records = stmt
            .query_map([], |row| self.map_row(row))?
            .collect::<Result<Vec<AvailabilityRecord>, _>>()?;

        Ok(records)
    }

    /// 查询存在已过期预订的档期记录
    ///
    /// 过期判定: 有占用且最早释放时间 <= now (半开区间,终点时刻即过期)
    /// next_available_date 为派生列,扫描走索引,不展开 JSON
    pub fn list_with_expired_reservations(
        &self,
        now: NaiveDateTime,
    ) -> RepositoryResult<Vec<AvailabilityRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT material_id, total_slots, status, reservations_json, pending_json,
                      occupied_slots, pending_count, next_available_date, all_slots_free_date,
                      revision, updated_at
               FROM slot_availability
               WHERE occupied_slots > 0
                 AND next_available_date IS NOT NULL
                 AND next_available_date <= ?
               ORDER BY material_id"#,
        )?;

        let records = stmt
            .query_map(
                params![now.format("%Y-%m-%d %H:%M:%S").to_string()],
                |row| self.map_row(row),
            )?
            .collect::<Result<Vec<AvailabilityRecord>, _>>()?;

        Ok(records)
    }

    /// 查询候补队列非空的档期记录
    pub fn list_with_pending(&self) -> RepositoryResult<Vec<AvailabilityRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT material_id, total_slots, status, reservations_json, pending_json,
                      occupied_slots, pending_count, next_available_date, all_slots_free_date,
                      revision, updated_at
               FROM slot_availability
               WHERE pending_count > 0
               ORDER BY material_id"#,
        )?;

        let records = stmt
            .query_map([], |row| self.map_row(row))?
            .collect::<Result<Vec<AvailabilityRecord>, _>>()?;

        Ok(records)
    }

    /// 读取-变更-条件写入循环 (乐观并发控制)
    ///
    /// # 流程
    /// 1. 读取当前记录(不存在即 NotFound,本方法不做惰性创建)
    /// 2. 调用 mutate 得到新记录; 业务拒绝直接上抛,不消耗重试次数
    /// 3. 新旧一致则跳过写入(版本号不变,幂等操作零成本)
    /// 4. 校验不变量后条件写入: revision 比对失败说明有并发写者,
    ///    重新读取再来一轮,最多 max_retries 轮
    ///
    /// # 错误
    /// - `RepositoryError::RetryBudgetExhausted`: 重试轮次耗尽
    /// - `RepositoryError::NotFound`: 记录不存在
    /// - `RepositoryError::ValidationError`: 变更后不变量被破坏
    pub fn compare_and_apply<E, F>(
        &self,
        material_id: &str,
        max_retries: u32,
        mut mutate: F,
    ) -> Result<AvailabilityRecord, E>
    where
        E: From<RepositoryError>,
        F: FnMut(&AvailabilityRecord) -> Result<AvailabilityRecord, E>,
    {
        let attempts = max_retries.max(1);
        for attempt in 1..=attempts {
            let current = self
                .find_by_id(material_id)
                .map_err(E::from)?
                .ok_or_else(|| {
                    E::from(RepositoryError::NotFound {
                        entity: "AvailabilityRecord".to_string(),
                        id: material_id.to_string(),
                    })
                })?;

            // 闭包执行期间不持有数据库锁,闭包内可再次访问仓储
            let mut next = mutate(&current)?;
            next.recalculate();

            if next == current {
                return Ok(current);
            }

            next.validate()
                .map_err(|msg| E::from(RepositoryError::ValidationError(msg)))?;
            next.updated_at = Utc::now().naive_utc();

            match self.write_checked(&next, current.revision) {
                Ok(()) => {
                    next.revision = current.revision + 1;
                    return Ok(next);
                }
                Err(RepositoryError::OptimisticLockFailure {
                    expected, actual, ..
                }) => {
                    tracing::debug!(
                        material_id = %material_id,
                        attempt,
                        expected,
                        actual,
                        "档期记录版本冲突,重新读取后重试"
                    );
                    continue;
                }
                Err(e) => return Err(E::from(e)),
            }
        }

        Err(E::from(RepositoryError::RetryBudgetExhausted {
            material_id: material_id.to_string(),
            attempts,
        }))
    }

    /// 条件写入 (带revision检查)
    ///
    /// # 并发控制
    /// revision 匹配才落库并自增; 不匹配即乐观锁冲突,由调用方决定重试
    fn write_checked(
        &self,
        record: &AvailabilityRecord,
        expected_revision: i64,
    ) -> RepositoryResult<()> {
        let reservations_json = serde_json::to_string(&record.reservations)
            .map_err(|e| RepositoryError::InternalError(format!("序列化预订明细失败: {}", e)))?;
        let pending_json = serde_json::to_string(&record.pending)
            .map_err(|e| RepositoryError::InternalError(format!("序列化候补队列失败: {}", e)))?;

        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE slot_availability
               SET total_slots = ?, status = ?, reservations_json = ?, pending_json = ?,
                   occupied_slots = ?, pending_count = ?,
                   next_available_date = ?, all_slots_free_date = ?,
                   updated_at = ?, revision = revision + 1
               WHERE material_id = ? AND revision = ?"#,
            params![
                record.total_slots,
                record.status.to_db_str(),
                &reservations_json,
                &pending_json,
                record.occupied_slots,
                record.pending.len() as u32,
                record
                    .next_available_date
                    .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
                record
                    .all_slots_free_date
                    .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
                record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &record.material_id,
                expected_revision,
            ],
        )?;

        // 检查是否更新成功
        if rows_affected == 0 {
            // 判断是记录不存在还是revision冲突
            let exists: Result<i64, _> = conn.query_row(
                "SELECT revision FROM slot_availability WHERE material_id = ?",
                params![&record.material_id],
                |row| row.get(0),
            );

            match exists {
                Ok(actual_revision) => {
                    return Err(RepositoryError::OptimisticLockFailure {
                        material_id: record.material_id.clone(),
                        expected: expected_revision,
                        actual: actual_revision,
                    });
                }
                Err(_) => {
                    return Err(RepositoryError::NotFound {
                        entity: "AvailabilityRecord".to_string(),
                        id: record.material_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// 映射数据库行到AvailabilityRecord对象
    fn map_row(&self, row: &rusqlite::Row) -> rusqlite::Result<AvailabilityRecord> {
        let status_str: String = row.get(2)?;
        let reservations_json: String = row.get(3)?;
        let pending_json: String = row.get(4)?;

        let reservations: Vec<SlotReservation> = serde_json::from_str(&reservations_json)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?;
        let pending: Vec<PendingRequest> = serde_json::from_str(&pending_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(AvailabilityRecord {
            material_id: row.get(0)?,
            total_slots: row.get(1)?,
            status: MaterialStatus::from_str(&status_str),
            reservations,
            pending,
            occupied_slots: row.get(5)?,
            next_available_date: row
                .get::<_, Option<String>>(7)?
                .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok()),
            all_slots_free_date: row
                .get::<_, Option<String>>(8)?
                .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok()),
            revision: row.get(9)?,
            updated_at: NaiveDateTime::parse_from_str(
                &row.get::<_, String>(10)?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
            })?,
        })
    }
}
