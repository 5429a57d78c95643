// ==========================================
// 车载广告档期系统 - 投放活动投影仓储
// ==========================================
// 职责: 管理 campaign_projection 表,为回收任务提供活动目录
// 红线: 活动生命周期归上游,本仓储只收敛投影与回收标记
// ==========================================

use crate::domain::campaign::CampaignSnapshot;
use crate::domain::types::{CampaignStatus, PaymentStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// CampaignDirectory - 活动目录接口
// ==========================================
// 回收任务通过该接口访问活动投影,便于测试时注入替身
#[async_trait]
pub trait CampaignDirectory: Send + Sync {
    /// 查询创建时间早于 cutoff 且仍未支付的待支付活动
    async fn list_unpaid_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> RepositoryResult<Vec<CampaignSnapshot>>;

    /// 按活动ID查询投影
    async fn find_snapshot(&self, campaign_id: &str) -> RepositoryResult<Option<CampaignSnapshot>>;

    /// 将活动标记为已驳回(支付超时),仅对非终态生效
    ///
    /// # 返回
    /// - Ok(true): 本次标记生效
    /// - Ok(false): 活动不在投影中或已是终态
    async fn mark_rejected(&self, campaign_id: &str) -> RepositoryResult<bool>;

    /// 将活动标记为已结束(窗口过期),仅对非终态生效
    async fn mark_ended(&self, campaign_id: &str) -> RepositoryResult<bool>;
}

// ==========================================
// CampaignRepository - 活动投影仓储
// ==========================================
pub struct CampaignRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CampaignRepository {
    /// 创建新的 CampaignRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入或更新活动投影 (上游同步入口)
    pub fn upsert_snapshot(&self, snapshot: &CampaignSnapshot) -> RepositoryResult<()> {
        let material_ids_json = serde_json::to_string(&snapshot.material_ids)
            .map_err(|e| RepositoryError::InternalError(format!("序列化物料清单失败: {}", e)))?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO campaign_projection (
                campaign_id, status, payment_status, window_start, window_end,
                material_ids_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                snapshot.campaign_id,
                snapshot.status.to_db_str(),
                snapshot.payment_status.to_db_str(),
                snapshot.window_start.format("%Y-%m-%d %H:%M:%S").to_string(),
                snapshot.window_end.format("%Y-%m-%d %H:%M:%S").to_string(),
                &material_ids_json,
                snapshot.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                snapshot.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(())
    }

    /// 按活动ID查询投影
    pub fn find_by_id(&self, campaign_id: &str) -> RepositoryResult<Option<CampaignSnapshot>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT campaign_id, status, payment_status, window_start, window_end,
                      material_ids_json, created_at, updated_at
               FROM campaign_projection
               WHERE campaign_id = ?1"#,
            params![campaign_id],
            |row| self.map_row(row),
        ) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询创建时间早于 cutoff 且仍未支付的待支付活动
    pub fn find_unpaid_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> RepositoryResult<Vec<CampaignSnapshot>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT campaign_id, status, payment_status, window_start, window_end,
                      material_ids_json, created_at, updated_at
               FROM campaign_projection
               WHERE payment_status = 'UNPAID'
                 AND status = 'PENDING_PAYMENT'
                 AND created_at <= ?1
               ORDER BY created_at"#,
        )?;

        let snapshots = stmt
            .query_map(
                params![cutoff.format("%Y-%m-%d %H:%M:%S").to_string()],
                |row| self.map_row(row),
            )?
            .collect::<Result<Vec<CampaignSnapshot>, _>>()?;

        Ok(snapshots)
    }

    /// 更新支付状态 (上游计费系统同步入口)
    pub fn set_payment_status(
        &self,
        campaign_id: &str,
        payment_status: PaymentStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            "UPDATE campaign_projection SET payment_status = ?1, updated_at = ?2 WHERE campaign_id = ?3",
            params![
                payment_status.to_db_str(),
                Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string(),
                campaign_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "CampaignSnapshot".to_string(),
                id: campaign_id.to_string(),
            });
        }
        Ok(())
    }

    /// 将活动迁移到目标状态,仅对非终态生效
    ///
    /// # 返回
    /// - Ok(true): 本次迁移生效
    /// - Ok(false): 活动不在投影中或已是终态(幂等)
    pub fn transition_status(
        &self,
        campaign_id: &str,
        target: CampaignStatus,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            r#"UPDATE campaign_projection
               SET status = ?1, updated_at = ?2
               WHERE campaign_id = ?3
                 AND status IN ('PENDING_PAYMENT', 'ACTIVE')"#,
            params![
                target.to_db_str(),
                Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string(),
                campaign_id,
            ],
        )?;

        Ok(rows > 0)
    }

    /// 映射数据库行到CampaignSnapshot对象
    fn map_row(&self, row: &rusqlite::Row) -> rusqlite::Result<CampaignSnapshot> {
        let status_str: String = row.get(1)?;
        let payment_str: String = row.get(2)?;
        let material_ids_json: String = row.get(5)?;

        let material_ids: Vec<String> = serde_json::from_str(&material_ids_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let parse_dt = |idx: usize, s: String| {
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        };

        Ok(CampaignSnapshot {
            campaign_id: row.get(0)?,
            status: CampaignStatus::from_str(&status_str),
            payment_status: PaymentStatus::from_str(&payment_str),
            window_start: parse_dt(3, row.get::<_, String>(3)?)?,
            window_end: parse_dt(4, row.get::<_, String>(4)?)?,
            material_ids,
            created_at: parse_dt(6, row.get::<_, String>(6)?)?,
            updated_at: parse_dt(7, row.get::<_, String>(7)?)?,
        })
    }
}

// ==========================================
// CampaignDirectory trait 实现
// ==========================================
#[async_trait]
impl CampaignDirectory for CampaignRepository {
    async fn list_unpaid_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> RepositoryResult<Vec<CampaignSnapshot>> {
        self.find_unpaid_before(cutoff)
    }

    async fn find_snapshot(&self, campaign_id: &str) -> RepositoryResult<Option<CampaignSnapshot>> {
        self.find_by_id(campaign_id)
    }

    async fn mark_rejected(&self, campaign_id: &str) -> RepositoryResult<bool> {
        self.transition_status(campaign_id, CampaignStatus::Rejected)
    }

    async fn mark_ended(&self, campaign_id: &str) -> RepositoryResult<bool> {
        self.transition_status(campaign_id, CampaignStatus::Ended)
    }
}
