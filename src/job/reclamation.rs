// ==========================================
// 车载广告档期系统 - 档期回收任务
// ==========================================
// 职责: 周期扫描并回收失效占用(支付超时/窗口过期),清理陈旧候补
// 红线: 扫描必须幂等,单条失败只记数跳过,不得中断整轮
// 红线: 未支付回收先释放槽位,全部释放成功才声明活动终态
// ==========================================

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AllocConfigReader;
use crate::domain::allocation_log::{AllocationAction, AllocationLog};
use crate::domain::availability::SlotReservation;
use crate::domain::types::ReclaimKind;
use crate::repository::allocation_log_repo::AllocationLogRepository;
use crate::repository::availability_repo::AvailabilityRepository;
use crate::repository::campaign_repo::CampaignDirectory;
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 回收任务的操作方标识
const SWEEP_ACTOR: &str = "SYSTEM";

/// 配置读取失败时的兜底扫描间隔(秒)
const FALLBACK_SWEEP_INTERVAL_SECS: u64 = 3600;

// ==========================================
// SweepReport - 单轮扫描结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// 因支付超时被驳回的活动数
    pub unpaid_campaigns_reclaimed: u32,
    /// 未支付回收释放的槽位数
    pub unpaid_slots_released: u32,
    /// 窗口过期回收释放的槽位数
    pub expired_slots_released: u32,
    /// 清理的候补条目数
    pub pending_pruned: u32,
    /// 跳过的失败条目数(下一轮重试)
    pub failures: u32,
}

// ==========================================
// ReclamationJob - 回收任务
// ==========================================

/// 档期回收任务
///
/// 职责：
/// 1. 未支付超时回收：释放超时未支付活动的槽位并驳回活动
/// 2. 过期窗口回收：释放窗口终点已过的预订
/// 3. 候补清理：清除超过保留期的候补条目
pub struct ReclamationJob<C: AllocConfigReader, D: CampaignDirectory> {
    availability_repo: Arc<AvailabilityRepository>,
    allocation_log_repo: Arc<AllocationLogRepository>,
    campaign_directory: Arc<D>,
    config: Arc<C>,
}

impl<C, D> ReclamationJob<C, D>
where
    C: AllocConfigReader,
    D: CampaignDirectory,
{
    /// 创建新的ReclamationJob实例
    pub fn new(
        availability_repo: Arc<AvailabilityRepository>,
        allocation_log_repo: Arc<AllocationLogRepository>,
        campaign_directory: Arc<D>,
        config: Arc<C>,
    ) -> Self {
        Self {
            availability_repo,
            allocation_log_repo,
            campaign_directory,
            config,
        }
    }

    /// 周期运行回收扫描 (不返回,由调用方决定生命周期)
    pub async fn run(&self) {
        let interval_secs = match self.config.get_sweep_interval_secs().await {
            Ok(v) => v.max(1),
            Err(e) => {
                tracing::warn!(
                    "读取扫描间隔配置失败,使用兜底值{}秒: {}",
                    FALLBACK_SWEEP_INTERVAL_SECS,
                    e
                );
                FALLBACK_SWEEP_INTERVAL_SECS
            }
        };
        tracing::info!(interval_secs, "回收任务启动");

        let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match self.run_once().await {
                Ok(report) => {
                    if report != SweepReport::default() {
                        tracing::info!(
                            unpaid_campaigns = report.unpaid_campaigns_reclaimed,
                            unpaid_slots = report.unpaid_slots_released,
                            expired_slots = report.expired_slots_released,
                            pending_pruned = report.pending_pruned,
                            failures = report.failures,
                            "回收扫描完成"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!("回收扫描失败: {}", e);
                }
            }
        }
    }

    /// 单轮扫描: 未支付超时回收 → 过期窗口回收 → 候补清理
    ///
    /// 三段均幂等,可安全重复执行; 单条失败计入 failures 并跳过
    pub async fn run_once(&self) -> RepositoryResult<SweepReport> {
        let now = Utc::now().naive_utc();
        self.run_once_at(now).await
    }

    /// 以给定时刻为基准执行单轮扫描 (测试可注入时刻)
    pub async fn run_once_at(&self, now: NaiveDateTime) -> RepositoryResult<SweepReport> {
        let mut report = SweepReport::default();
        self.sweep_unpaid(now, &mut report).await?;
        self.sweep_expired(now, &mut report).await?;
        self.prune_stale_pending(now, &mut report).await?;
        Ok(report)
    }

    // ==========================================
    // 未支付超时回收
    // ==========================================

    /// 释放超时未支付活动的全部槽位,释放干净后驳回活动
    ///
    /// 先释放再标记终态: 任一释放失败则本轮不驳回,活动保持待支付态
    /// 留在扫描集合内,下一轮重试时已释放部分为幂等空操作
    async fn sweep_unpaid(
        &self,
        now: NaiveDateTime,
        report: &mut SweepReport,
    ) -> RepositoryResult<()> {
        let timeout_hours = self.payment_timeout_hours().await?;
        let retries = self.max_cas_retries().await?;
        let cutoff = now - Duration::hours(timeout_hours);

        let overdue = self.campaign_directory.list_unpaid_before(cutoff).await?;
        if overdue.is_empty() {
            return Ok(());
        }
        tracing::info!(count = overdue.len(), "发现支付超时活动");

        for campaign in overdue {
            let failures_before = report.failures;
            let released = self.release_campaign_slots(
                &campaign.campaign_id,
                &campaign.material_ids,
                retries,
                ReclaimKind::UnpaidTimeout,
                report,
            );
            report.unpaid_slots_released += released;

            // 槽位未释放干净不驳回: 终态活动会退出扫描集合
            if report.failures > failures_before {
                continue;
            }

            match self.campaign_directory.mark_rejected(&campaign.campaign_id).await {
                Ok(true) => {
                    report.unpaid_campaigns_reclaimed += 1;
                }
                // 已是终态: 并发回收或人工处理过
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        campaign_id = %campaign.campaign_id,
                        error = %e,
                        "标记活动驳回失败,下一轮重试"
                    );
                    report.failures += 1;
                }
            }
        }
        Ok(())
    }

    /// 释放活动在指定物料上的槽位,返回实际释放数
    fn release_campaign_slots(
        &self,
        campaign_id: &str,
        material_ids: &[String],
        retries: u32,
        kind: ReclaimKind,
        report: &mut SweepReport,
    ) -> u32 {
        let mut released = 0u32;
        for material_id in material_ids {
            match self.availability_repo.find_by_id(material_id) {
                Ok(Some(_)) => {}
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        material_id = %material_id,
                        error = %e,
                        "读取档期记录失败,本轮跳过"
                    );
                    report.failures += 1;
                    continue;
                }
            }

            let mut removed: Option<SlotReservation> = None;
            let result = self.availability_repo.compare_and_apply::<RepositoryError, _>(
                material_id,
                retries,
                |current| {
                    removed = None;
                    let mut next = current.clone();
                    removed = next.remove_campaign(campaign_id);
                    Ok(next)
                },
            );

            match result {
                Ok(_) => {
                    if let Some(reservation) = removed {
                        released += 1;
                        self.log_reclaim(campaign_id, material_id, &reservation, kind);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        campaign_id = %campaign_id,
                        material_id = %material_id,
                        error = %e,
                        "回收释放失败,下一轮重试"
                    );
                    report.failures += 1;
                }
            }
        }
        released
    }

    // ==========================================
    // 过期窗口回收
    // ==========================================

    /// 释放窗口终点不晚于 now 的预订
    ///
    /// 扫描走派生列索引(occupied_slots/next_available_date),不全表展开 JSON
    async fn sweep_expired(
        &self,
        now: NaiveDateTime,
        report: &mut SweepReport,
    ) -> RepositoryResult<()> {
        let retries = self.max_cas_retries().await?;
        let due = self.availability_repo.list_with_expired_reservations(now)?;

        for record in due {
            let mut removed: Vec<SlotReservation> = Vec::new();
            let result = self.availability_repo.compare_and_apply::<RepositoryError, _>(
                &record.material_id,
                retries,
                |current| {
                    removed.clear();
                    let mut next = current.clone();
                    removed = next.remove_expired(now);
                    Ok(next)
                },
            );

            match result {
                Ok(_) => {
                    for reservation in &removed {
                        report.expired_slots_released += 1;
                        self.log_reclaim(
                            &reservation.campaign_id,
                            &record.material_id,
                            reservation,
                            ReclaimKind::WindowExpired,
                        );
                    }
                    // 活动自身窗口也已走完时标记结束 (投影窗口为多次预订的并集)
                    for reservation in &removed {
                        if let Err(e) = self.try_mark_ended(&reservation.campaign_id, now).await {
                            tracing::warn!(
                                campaign_id = %reservation.campaign_id,
                                error = %e,
                                "标记活动结束失败"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        material_id = %record.material_id,
                        error = %e,
                        "过期回收失败,下一轮重试"
                    );
                    report.failures += 1;
                }
            }
        }
        Ok(())
    }

    /// 活动投影窗口已过才标记 ENDED,避免提前终结多窗口活动
    async fn try_mark_ended(&self, campaign_id: &str, now: NaiveDateTime) -> RepositoryResult<()> {
        if let Some(snapshot) = self.campaign_directory.find_snapshot(campaign_id).await? {
            if snapshot.is_window_expired(now) {
                self.campaign_directory.mark_ended(campaign_id).await?;
            }
        }
        Ok(())
    }

    // ==========================================
    // 候补清理
    // ==========================================

    /// 清理入队时间超过保留期的候补条目
    async fn prune_stale_pending(
        &self,
        now: NaiveDateTime,
        report: &mut SweepReport,
    ) -> RepositoryResult<()> {
        let retention_days = self.pending_retention_days().await?;
        let retries = self.max_cas_retries().await?;
        let cutoff = now - Duration::days(retention_days);

        let queued = self.availability_repo.list_with_pending()?;
        for record in queued {
            let mut pruned = 0u32;
            let result = self.availability_repo.compare_and_apply::<RepositoryError, _>(
                &record.material_id,
                retries,
                |current| {
                    let mut next = current.clone();
                    pruned = next.prune_pending(cutoff);
                    Ok(next)
                },
            );

            match result {
                Ok(_) if pruned > 0 => {
                    report.pending_pruned += pruned;
                    let log = AllocationLog::new(
                        uuid::Uuid::new_v4().to_string(),
                        AllocationAction::PrunePending,
                        SWEEP_ACTOR.to_string(),
                    )
                    .with_material(&record.material_id, None)
                    .with_detail(&format!("清理{}条过期候补", pruned));
                    self.log_best_effort(log);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        material_id = %record.material_id,
                        error = %e,
                        "候补清理失败,下一轮重试"
                    );
                    report.failures += 1;
                }
            }
        }
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn log_reclaim(
        &self,
        campaign_id: &str,
        material_id: &str,
        reservation: &SlotReservation,
        kind: ReclaimKind,
    ) {
        let log = AllocationLog::new(
            uuid::Uuid::new_v4().to_string(),
            AllocationAction::Reclaim,
            SWEEP_ACTOR.to_string(),
        )
        .with_campaign(campaign_id)
        .with_material(material_id, Some(reservation.slot_number))
        .with_window(reservation.window_start, reservation.window_end)
        .with_detail(&format!("回收原因: {}", kind.to_db_str()));
        self.log_best_effort(log);
    }

    fn log_best_effort(&self, log: AllocationLog) {
        if let Err(e) = self.allocation_log_repo.insert(&log) {
            tracing::warn!("记录分配日志失败: {}", e);
        }
    }

    // ===== 配置读取 =====

    async fn payment_timeout_hours(&self) -> RepositoryResult<i64> {
        self.config
            .get_payment_timeout_hours()
            .await
            .map_err(|e| RepositoryError::InternalError(format!("读取配置失败: {}", e)))
    }

    async fn pending_retention_days(&self) -> RepositoryResult<i64> {
        self.config
            .get_pending_retention_days()
            .await
            .map_err(|e| RepositoryError::InternalError(format!("读取配置失败: {}", e)))
    }

    async fn max_cas_retries(&self) -> RepositoryResult<u32> {
        self.config
            .get_max_cas_retries()
            .await
            .map_err(|e| RepositoryError::InternalError(format!("读取配置失败: {}", e)))
    }
}
