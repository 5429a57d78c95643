// ==========================================
// 车载广告档期系统 - 档期分配 API
// ==========================================
// 职责: 预订/释放/查询/可行性校验/物料选择的对外门面
// 红线: 多物料预订要么全部成功,要么补偿释放后报错,不留半套占用
// 红线: 可接单判定必须在条件写入路径内重跑,查询结果不作为落位依据
// ==========================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::RequestValidator;
use crate::config::AllocConfigReader;
use crate::domain::allocation_log::{AllocationAction, AllocationLog};
use crate::domain::availability::{
    AvailabilityRecord, PendingRequest, SlotReservation,
};
use crate::domain::campaign::CampaignSnapshot;
use crate::domain::material::MaterialMaster;
use crate::domain::types::{CampaignStatus, MaterialStatus, PaymentStatus};
use crate::engine::conflict::{ConflictChecker, SlotRejection};
use crate::engine::selector::{MaterialSelector, TieBreakPolicy};
use crate::repository::allocation_log_repo::AllocationLogRepository;
use crate::repository::availability_repo::AvailabilityRepository;
use crate::repository::campaign_repo::CampaignRepository;
use crate::repository::material_repo::MaterialRepository;

// ==========================================
// 请求与响应 DTO
// ==========================================

/// 预订请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub campaign_id: String,
    pub material_ids: Vec<String>,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub actor: String,
}

/// 单物料落位结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub material_id: String,
    pub slot_number: u32,
}

/// 预订结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationOutcome {
    pub campaign_id: String,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub assignments: Vec<SlotAssignment>,
}

/// 释放结果
///
/// released: 本次实际释放的槽位; skipped: 未持有预订的物料(幂等跳过)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub campaign_id: String,
    pub released: Vec<SlotAssignment>,
    pub skipped: Vec<String>,
}

/// 档期视图 (查询接口返回)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityView {
    pub material_id: String,
    pub total_slots: u32,
    pub status: String,
    pub occupied_slots: u32,
    pub available_slots: u32,
    pub next_available_date: Option<NaiveDateTime>,
    pub all_slots_free_date: Option<NaiveDateTime>,
    pub reservations: Vec<SlotReservation>,
    pub pending: Vec<PendingRequest>,
    pub revision: i64,
    pub updated_at: NaiveDateTime,
}

impl AvailabilityView {
    fn from_record(record: AvailabilityRecord) -> Self {
        let available_slots = record.available_slots();
        AvailabilityView {
            material_id: record.material_id,
            total_slots: record.total_slots,
            status: record.status.to_string(),
            occupied_slots: record.occupied_slots,
            available_slots,
            next_available_date: record.next_available_date,
            all_slots_free_date: record.all_slots_free_date,
            reservations: record.reservations,
            pending: record.pending,
            revision: record.revision,
            updated_at: record.updated_at,
        }
    }
}

/// 单物料可行性
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialFeasibility {
    pub material_id: String,
    pub can_accept: bool,
    /// 不可接单原因,可接单时为 None
    pub reason: Option<String>,
}

/// 时间窗可行性报告 (只读,不落位)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityReport {
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub requested_count: u32,
    pub eligible_count: u32,
    pub total_available_slots: u32,
    /// 所有请求物料中最早的释放时间
    pub earliest_next_available: Option<NaiveDateTime>,
    pub materials: Vec<MaterialFeasibility>,
}

/// 档期汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilitySummary {
    pub total_materials: u32,
    pub total_slots: u32,
    pub occupied_slots: u32,
    pub available_slots: u32,
    /// 槽位占用率(百分比), 无槽位时为 0
    pub slot_util_pct: f64,
    pub available_materials: u32,
    pub full_materials: u32,
    pub maintenance_materials: u32,
    pub pending_requests: u32,
    pub earliest_next_available: Option<NaiveDateTime>,
    pub latest_all_free: Option<NaiveDateTime>,
}

/// 选择排序候选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialCandidate {
    pub material_id: String,
    pub occupied_slots: u32,
    pub available_slots: u32,
    pub next_available_date: Option<NaiveDateTime>,
    /// 排序依据 (JSON 字符串,可解释性)
    pub sort_reason: String,
}

// ==========================================
// AllocationApi - 档期分配 API
// ==========================================

/// 档期分配API
///
/// 职责：
/// 1. 预订/释放（含批量补偿）
/// 2. 档期查询与汇总
/// 3. 时间窗可行性校验（只读）
/// 4. 物料选择排序
/// 5. AllocationLog记录
pub struct AllocationApi<C: AllocConfigReader> {
    availability_repo: Arc<AvailabilityRepository>,
    material_repo: Arc<MaterialRepository>,
    campaign_repo: Arc<CampaignRepository>,
    allocation_log_repo: Arc<AllocationLogRepository>,
    config: Arc<C>,
    selector: MaterialSelector,
}

impl<C: AllocConfigReader> AllocationApi<C> {
    /// 创建新的AllocationApi实例
    pub fn new(
        availability_repo: Arc<AvailabilityRepository>,
        material_repo: Arc<MaterialRepository>,
        campaign_repo: Arc<CampaignRepository>,
        allocation_log_repo: Arc<AllocationLogRepository>,
        config: Arc<C>,
    ) -> Self {
        Self {
            availability_repo,
            material_repo,
            campaign_repo,
            allocation_log_repo,
            config,
            selector: MaterialSelector::new(),
        }
    }

    // ==========================================
    // 预订接口
    // ==========================================

    /// 为投放活动在多个物料上预订槽位
    ///
    /// # 语义
    /// - 按入参顺序逐物料落位,任一失败即对已落位槽位做补偿释放
    /// - 单物料内的判定与写入经乐观并发循环,判定在写入路径内重跑
    /// - 全部成功后写入活动投影,供回收任务识别未支付活动
    ///
    /// # 返回
    /// - Ok(ReservationOutcome): 全部落位成功,含每个物料的槽位号
    /// - Err(ApiError): 业务拒绝(满槽/冲突/维护/重复)或技术失败
    pub async fn reserve(&self, request: ReservationRequest) -> ApiResult<ReservationOutcome> {
        // 参数验证
        RequestValidator::validate_campaign_id(&request.campaign_id)?;
        RequestValidator::validate_material_ids(&request.material_ids)?;
        let max_window_days = self.max_window_days().await?;
        RequestValidator::validate_window(
            request.window_start,
            request.window_end,
            max_window_days,
        )?;

        // 在册校验: 未在册物料直接拒绝,不惰性创建档期记录
        let existing = self.material_repo.batch_check_exists(&request.material_ids)?;
        if existing.len() != request.material_ids.len() {
            let existing_set: HashSet<&str> = existing.iter().map(|s| s.as_str()).collect();
            let missing: Vec<&str> = request
                .material_ids
                .iter()
                .filter(|id| !existing_set.contains(id.as_str()))
                .map(|s| s.as_str())
                .collect();
            return Err(ApiError::NotFound(format!(
                "物料未在册: {}",
                missing.join(", ")
            )));
        }

        let default_slots = self.default_total_slots().await?;
        let retries = self.max_cas_retries().await?;

        // 逐物料落位,失败即补偿
        let mut assignments: Vec<SlotAssignment> = Vec::new();
        for material_id in &request.material_ids {
            match self.reserve_on_material(material_id, &request, default_slots, retries) {
                Ok(slot_number) => assignments.push(SlotAssignment {
                    material_id: material_id.clone(),
                    slot_number,
                }),
                Err(err) => {
                    tracing::warn!(
                        campaign_id = %request.campaign_id,
                        material_id = %material_id,
                        error = %err,
                        "批量预订中断,对已落位槽位补偿释放"
                    );
                    self.compensate_assignments(&request, &assignments, retries);
                    return Err(err);
                }
            }
        }

        // 活动投影写入失败同样回滚,保证投影覆盖所有持有中的预订
        if let Err(err) = self.upsert_campaign_projection(&request) {
            tracing::warn!(
                campaign_id = %request.campaign_id,
                error = %err,
                "活动投影写入失败,回滚本次预订"
            );
            self.compensate_assignments(&request, &assignments, retries);
            return Err(err);
        }

        // 记录AllocationLog
        for assignment in &assignments {
            let log = AllocationLog::new(
                uuid::Uuid::new_v4().to_string(),
                AllocationAction::Reserve,
                request.actor.clone(),
            )
            .with_campaign(&request.campaign_id)
            .with_material(&assignment.material_id, Some(assignment.slot_number))
            .with_window(request.window_start, request.window_end);
            self.log_best_effort(log);
        }

        tracing::info!(
            campaign_id = %request.campaign_id,
            materials = assignments.len(),
            "预订成功"
        );

        Ok(ReservationOutcome {
            campaign_id: request.campaign_id.clone(),
            window_start: request.window_start,
            window_end: request.window_end,
            assignments,
        })
    }

    /// 释放投放活动占用的槽位 (幂等)
    ///
    /// # 参数
    /// - material_ids: 指定释放范围; None 时按活动投影释放全部
    ///
    /// # 语义
    /// - 未持有预订的物料计入 skipped,不报错不写库
    pub async fn release(
        &self,
        campaign_id: &str,
        material_ids: Option<Vec<String>>,
        actor: &str,
    ) -> ApiResult<ReleaseOutcome> {
        RequestValidator::validate_campaign_id(campaign_id)?;
        let retries = self.max_cas_retries().await?;

        let targets: Vec<String> = match material_ids {
            Some(ids) => {
                RequestValidator::validate_material_ids(&ids)?;
                ids
            }
            None => match self.campaign_repo.find_by_id(campaign_id)? {
                Some(snapshot) => snapshot.material_ids,
                None => {
                    return Err(ApiError::NotFound(format!(
                        "活动投影不存在: {}",
                        campaign_id
                    )))
                }
            },
        };

        let mut released: Vec<SlotAssignment> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();

        for material_id in &targets {
            // 档期记录不存在: 视为未持有,幂等跳过
            if self.availability_repo.find_by_id(material_id)?.is_none() {
                skipped.push(material_id.clone());
                continue;
            }

            let mut removed_slot: Option<u32> = None;
            self.availability_repo
                .compare_and_apply::<ApiError, _>(material_id, retries, |current| {
                    removed_slot = None;
                    let mut next = current.clone();
                    if let Some(removed) = next.remove_campaign(campaign_id) {
                        removed_slot = Some(removed.slot_number);
                    }
                    Ok(next)
                })?;

            match removed_slot {
                Some(slot_number) => {
                    let log = AllocationLog::new(
                        uuid::Uuid::new_v4().to_string(),
                        AllocationAction::Release,
                        actor.to_string(),
                    )
                    .with_campaign(campaign_id)
                    .with_material(material_id, Some(slot_number));
                    self.log_best_effort(log);

                    released.push(SlotAssignment {
                        material_id: material_id.clone(),
                        slot_number,
                    });
                }
                None => skipped.push(material_id.clone()),
            }
        }

        tracing::info!(
            campaign_id = %campaign_id,
            released = released.len(),
            skipped = skipped.len(),
            "释放完成"
        );

        Ok(ReleaseOutcome {
            campaign_id: campaign_id.to_string(),
            released,
            skipped,
        })
    }

    /// 取消投放活动: 释放全部槽位并将投影迁移到 CANCELLED
    pub async fn cancel_campaign(&self, campaign_id: &str, actor: &str) -> ApiResult<ReleaseOutcome> {
        let outcome = self.release(campaign_id, None, actor).await?;
        self.campaign_repo
            .transition_status(campaign_id, CampaignStatus::Cancelled)?;
        Ok(outcome)
    }

    /// 标记活动已支付 (上游计费回调入口)
    ///
    /// 支付后活动转入 ACTIVE,不再被未支付回收扫描命中;
    /// 已终态活动(驳回/结束/取消)拒绝标记,支付状态保持不变
    pub fn mark_campaign_paid(&self, campaign_id: &str) -> ApiResult<()> {
        RequestValidator::validate_campaign_id(campaign_id)?;

        // 先迁移状态再翻支付位: 迁移自带非终态守卫,挡下回收后迟到的支付回调
        if !self
            .campaign_repo
            .transition_status(campaign_id, CampaignStatus::Active)?
        {
            return match self.campaign_repo.find_by_id(campaign_id)? {
                Some(snapshot) => Err(ApiError::BusinessRuleViolation(format!(
                    "活动{}已处于终态({}),拒绝支付标记",
                    campaign_id, snapshot.status
                ))),
                None => Err(ApiError::NotFound(format!(
                    "活动投影不存在: {}",
                    campaign_id
                ))),
            };
        }

        self.campaign_repo
            .set_payment_status(campaign_id, PaymentStatus::Paid)?;
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询单物料档期视图
    ///
    /// 在册但尚无档期记录的物料返回全空闲视图,只读路径不落库
    pub async fn get_availability(&self, material_id: &str) -> ApiResult<AvailabilityView> {
        RequestValidator::validate_material_id(material_id)?;

        if let Some(record) = self.availability_repo.find_by_id(material_id)? {
            return Ok(AvailabilityView::from_record(record));
        }

        if self.material_repo.find_by_id(material_id)?.is_none() {
            return Err(ApiError::NotFound(format!("物料未在册: {}", material_id)));
        }

        let default_slots = self.default_total_slots().await?;
        let now = Utc::now().naive_utc();
        Ok(AvailabilityView::from_record(AvailabilityRecord::new(
            material_id,
            default_slots,
            now,
        )))
    }

    /// 批量查询档期视图,按入参顺序返回
    ///
    /// 任一物料未在册则整批拒绝,错误信息列出全部缺失物料
    pub async fn list_availability(
        &self,
        material_ids: &[String],
    ) -> ApiResult<Vec<AvailabilityView>> {
        RequestValidator::validate_material_ids(material_ids)?;

        let existing = self.material_repo.batch_check_exists(material_ids)?;
        if existing.len() != material_ids.len() {
            let existing_set: HashSet<&str> = existing.iter().map(|s| s.as_str()).collect();
            let missing: Vec<&str> = material_ids
                .iter()
                .filter(|id| !existing_set.contains(id.as_str()))
                .map(|s| s.as_str())
                .collect();
            return Err(ApiError::NotFound(format!(
                "物料未在册: {}",
                missing.join(", ")
            )));
        }

        let records = self.availability_repo.list_by_ids(material_ids)?;
        let mut by_id: HashMap<String, AvailabilityRecord> = records
            .into_iter()
            .map(|record| (record.material_id.clone(), record))
            .collect();

        let default_slots = self.default_total_slots().await?;
        let now = Utc::now().naive_utc();
        let views = material_ids
            .iter()
            .map(|material_id| match by_id.remove(material_id) {
                Some(record) => AvailabilityView::from_record(record),
                None => AvailabilityView::from_record(AvailabilityRecord::new(
                    material_id,
                    default_slots,
                    now,
                )),
            })
            .collect();
        Ok(views)
    }

    /// 时间窗可行性校验 (只读,不占用槽位)
    ///
    /// # 返回
    /// 每个物料的可接单判定与原因,外加聚合统计
    pub async fn validate_window(
        &self,
        material_ids: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ApiResult<FeasibilityReport> {
        RequestValidator::validate_material_ids(material_ids)?;
        let max_window_days = self.max_window_days().await?;
        RequestValidator::validate_window(start, end, max_window_days)?;

        let default_slots = self.default_total_slots().await?;
        let now = Utc::now().naive_utc();

        let mut materials = Vec::with_capacity(material_ids.len());
        let mut eligible_count = 0u32;
        let mut total_available_slots = 0u32;
        let mut earliest_next_available: Option<NaiveDateTime> = None;

        for material_id in material_ids {
            let record = match self.availability_repo.find_by_id(material_id)? {
                Some(record) => record,
                None => {
                    if self.material_repo.find_by_id(material_id)?.is_none() {
                        materials.push(MaterialFeasibility {
                            material_id: material_id.clone(),
                            can_accept: false,
                            reason: Some("物料未在册".to_string()),
                        });
                        continue;
                    }
                    // 在册无记录: 全空闲
                    AvailabilityRecord::new(material_id, default_slots, now)
                }
            };

            total_available_slots += record.available_slots();
            if let Some(next_date) = record.next_available_date {
                earliest_next_available = Some(match earliest_next_available {
                    Some(cur) if cur <= next_date => cur,
                    _ => next_date,
                });
            }

            match ConflictChecker::rejection(&record, start, end) {
                None => {
                    eligible_count += 1;
                    materials.push(MaterialFeasibility {
                        material_id: material_id.clone(),
                        can_accept: true,
                        reason: None,
                    });
                }
                Some(rejection) => {
                    materials.push(MaterialFeasibility {
                        material_id: material_id.clone(),
                        can_accept: false,
                        reason: Some(Self::rejection_reason(&rejection)),
                    });
                }
            }
        }

        Ok(FeasibilityReport {
            window_start: start,
            window_end: end,
            requested_count: material_ids.len() as u32,
            eligible_count,
            total_available_slots,
            earliest_next_available,
            materials,
        })
    }

    /// 汇总指定物料的档期统计 (无档期记录的物料跳过)
    pub fn summarize(&self, material_ids: &[String]) -> ApiResult<AvailabilitySummary> {
        RequestValidator::validate_material_ids(material_ids)?;
        let records = self.availability_repo.list_by_ids(material_ids)?;
        Ok(Self::build_summary(&records))
    }

    /// 汇总全部档期统计
    pub fn summarize_all(&self) -> ApiResult<AvailabilitySummary> {
        let records = self.availability_repo.list_all()?;
        Ok(Self::build_summary(&records))
    }

    /// 按资格维度筛选在册物料 (None 表示该维度不限)
    ///
    /// 产出的物料池作为 select_materials 的候选范围入参
    pub fn find_eligible_materials(
        &self,
        material_type: Option<&str>,
        vehicle_class: Option<&str>,
        category: Option<&str>,
    ) -> ApiResult<Vec<MaterialMaster>> {
        let materials = self
            .material_repo
            .list_active()?
            .into_iter()
            .filter(|m| m.matches_filter(material_type, vehicle_class, category))
            .collect();
        Ok(materials)
    }

    /// 为给定时间窗选择并排序候选物料
    ///
    /// # 参数
    /// - material_ids: 候选范围; None 时取全部档期记录
    /// - limit: 返回数量上限
    ///
    /// # 语义
    /// 排序仅为建议,真正落位仍须走 reserve 的写入路径判定
    pub async fn select_materials(
        &self,
        material_ids: Option<Vec<String>>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        limit: Option<usize>,
    ) -> ApiResult<Vec<MaterialCandidate>> {
        let max_window_days = self.max_window_days().await?;
        RequestValidator::validate_window(start, end, max_window_days)?;

        let records = match material_ids {
            Some(ids) => {
                RequestValidator::validate_material_ids(&ids)?;
                self.availability_repo.list_by_ids(&ids)?
            }
            None => self.availability_repo.list_all()?,
        };

        let ranked = self
            .config
            .get_priority_materials()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取配置失败: {}", e)))?;
        let policy = TieBreakPolicy::new(ranked);

        let mut sorted = self.selector.select(records, start, end, &policy);
        if let Some(limit) = limit {
            sorted.truncate(limit);
        }

        Ok(sorted
            .into_iter()
            .map(|record| MaterialCandidate {
                sort_reason: self.selector.generate_sort_reason(&record, &policy),
                occupied_slots: record.occupied_slots,
                available_slots: record.available_slots(),
                next_available_date: record.next_available_date,
                material_id: record.material_id,
            })
            .collect())
    }

    /// 查询物料候补队列
    pub fn list_pending(&self, material_id: &str) -> ApiResult<Vec<PendingRequest>> {
        RequestValidator::validate_material_id(material_id)?;
        Ok(self
            .availability_repo
            .find_by_id(material_id)?
            .map(|record| record.pending)
            .unwrap_or_default())
    }

    // ==========================================
    // 运维接口
    // ==========================================

    /// 设置/解除物料维护状态
    ///
    /// 维护中拒绝一切新预订,已有预订不受影响继续投放
    pub async fn set_maintenance(
        &self,
        material_id: &str,
        under_maintenance: bool,
        actor: &str,
    ) -> ApiResult<AvailabilityView> {
        RequestValidator::validate_material_id(material_id)?;
        let default_slots = self.default_total_slots().await?;
        let retries = self.max_cas_retries().await?;

        self.availability_repo
            .get_or_create(material_id, default_slots)?;

        let updated = self
            .availability_repo
            .compare_and_apply::<ApiError, _>(material_id, retries, |current| {
                let mut next = current.clone();
                // 解除维护时先置 AVAILABLE,满载与否由重算推导
                next.status = if under_maintenance {
                    MaterialStatus::Maintenance
                } else {
                    MaterialStatus::Available
                };
                Ok(next)
            })?;

        let detail = if under_maintenance {
            "进入维护状态"
        } else {
            "解除维护状态"
        };
        let log = AllocationLog::new(
            uuid::Uuid::new_v4().to_string(),
            AllocationAction::SetMaintenance,
            actor.to_string(),
        )
        .with_material(material_id, None)
        .with_detail(detail);
        self.log_best_effort(log);

        Ok(AvailabilityView::from_record(updated))
    }

    /// 候补入队 (满载物料的后备登记,尽力而为)
    ///
    /// # 返回
    /// - Ok(true): 本次入队
    /// - Ok(false): 同一活动已在队中,幂等跳过
    pub async fn enqueue_pending(
        &self,
        campaign_id: &str,
        material_id: &str,
        requested_start: NaiveDateTime,
        priority: i32,
        actor: &str,
    ) -> ApiResult<bool> {
        RequestValidator::validate_campaign_id(campaign_id)?;
        RequestValidator::validate_material_id(material_id)?;
        let default_slots = self.default_total_slots().await?;
        let retries = self.max_cas_retries().await?;

        self.availability_repo
            .get_or_create(material_id, default_slots)?;

        let now = Utc::now().naive_utc();
        let mut queued = false;
        self.availability_repo
            .compare_and_apply::<ApiError, _>(material_id, retries, |current| {
                let mut next = current.clone();
                queued = next.enqueue_pending(PendingRequest {
                    campaign_id: campaign_id.to_string(),
                    requested_start,
                    priority,
                    queued_at: now,
                });
                Ok(next)
            })?;

        if queued {
            let log = AllocationLog::new(
                uuid::Uuid::new_v4().to_string(),
                AllocationAction::EnqueuePending,
                actor.to_string(),
            )
            .with_campaign(campaign_id)
            .with_material(material_id, None)
            .with_detail(&format!("候补入队: 期望起点{}", requested_start));
            self.log_best_effort(log);
        }

        Ok(queued)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 单物料落位: 惰性创建档期记录后走乐观并发循环
    fn reserve_on_material(
        &self,
        material_id: &str,
        request: &ReservationRequest,
        default_slots: u32,
        retries: u32,
    ) -> ApiResult<u32> {
        self.availability_repo
            .get_or_create(material_id, default_slots)?;

        let now = Utc::now().naive_utc();
        let mut assigned_slot: u32 = 0;

        self.availability_repo
            .compare_and_apply::<ApiError, _>(material_id, retries, |current| {
                if current
                    .reservations
                    .iter()
                    .any(|r| r.campaign_id == request.campaign_id)
                {
                    return Err(ApiError::DuplicateReservation {
                        campaign_id: request.campaign_id.clone(),
                        material_id: material_id.to_string(),
                    });
                }

                if let Some(rejection) =
                    ConflictChecker::rejection(current, request.window_start, request.window_end)
                {
                    return Err(ApiError::from_rejection(material_id, rejection));
                }

                // 容量判定已通过,此处必有空闲槽位号
                let slot_number = ConflictChecker::next_slot_number(current).ok_or_else(|| {
                    ApiError::InternalError(format!(
                        "物料{}容量判定通过但无空闲槽位号",
                        material_id
                    ))
                })?;
                assigned_slot = slot_number;

                let mut next = current.clone();
                next.add_reservation(SlotReservation {
                    campaign_id: request.campaign_id.clone(),
                    slot_number,
                    window_start: request.window_start,
                    window_end: request.window_end,
                    reserved_at: now,
                });
                Ok(next)
            })?;

        Ok(assigned_slot)
    }

    /// 补偿释放: 按落位逆序逐个释放,单个失败不阻断其余
    ///
    /// 失败的槽位留待回收任务按活动终态兜底清理
    fn compensate_assignments(
        &self,
        request: &ReservationRequest,
        assignments: &[SlotAssignment],
        retries: u32,
    ) {
        for assignment in assignments.iter().rev() {
            let result = self.availability_repo.compare_and_apply::<ApiError, _>(
                &assignment.material_id,
                retries,
                |current| {
                    let mut next = current.clone();
                    next.remove_campaign(&request.campaign_id);
                    Ok(next)
                },
            );

            match result {
                Ok(_) => {
                    let log = AllocationLog::new(
                        uuid::Uuid::new_v4().to_string(),
                        AllocationAction::Compensate,
                        request.actor.clone(),
                    )
                    .with_campaign(&request.campaign_id)
                    .with_material(&assignment.material_id, Some(assignment.slot_number))
                    .with_window(request.window_start, request.window_end)
                    .with_detail("批量预订失败,回滚已落位槽位");
                    self.log_best_effort(log);
                }
                Err(err) => {
                    tracing::error!(
                        campaign_id = %request.campaign_id,
                        material_id = %assignment.material_id,
                        error = %err,
                        "补偿释放失败,留待回收任务兜底"
                    );
                }
            }
        }
    }

    /// 写入/合并活动投影
    ///
    /// 同一活动多次预订时合并物料列表并取窗口并集,支付与状态保持不变
    fn upsert_campaign_projection(&self, request: &ReservationRequest) -> ApiResult<()> {
        let now = Utc::now().naive_utc();
        let snapshot = match self.campaign_repo.find_by_id(&request.campaign_id)? {
            Some(mut existing) => {
                for id in &request.material_ids {
                    if !existing.material_ids.contains(id) {
                        existing.material_ids.push(id.clone());
                    }
                }
                if request.window_start < existing.window_start {
                    existing.window_start = request.window_start;
                }
                if request.window_end > existing.window_end {
                    existing.window_end = request.window_end;
                }
                existing.updated_at = now;
                existing
            }
            None => CampaignSnapshot {
                campaign_id: request.campaign_id.clone(),
                status: CampaignStatus::PendingPayment,
                payment_status: PaymentStatus::Unpaid,
                window_start: request.window_start,
                window_end: request.window_end,
                material_ids: request.material_ids.clone(),
                created_at: now,
                updated_at: now,
            },
        };
        self.campaign_repo.upsert_snapshot(&snapshot)?;
        Ok(())
    }

    /// 记录AllocationLog (best-effort)
    fn log_best_effort(&self, log: AllocationLog) {
        if let Err(e) = self.allocation_log_repo.insert(&log) {
            tracing::warn!("记录分配日志失败: {}", e);
        }
    }

    fn build_summary(records: &[AvailabilityRecord]) -> AvailabilitySummary {
        let mut summary = AvailabilitySummary::default();
        for record in records {
            summary.total_materials += 1;
            summary.total_slots += record.total_slots;
            summary.occupied_slots += record.occupied_slots;
            summary.available_slots += record.available_slots();
            summary.pending_requests += record.pending.len() as u32;
            match record.status {
                MaterialStatus::Available => summary.available_materials += 1,
                MaterialStatus::Full => summary.full_materials += 1,
                MaterialStatus::Maintenance => summary.maintenance_materials += 1,
            }
            if let Some(next_date) = record.next_available_date {
                summary.earliest_next_available = Some(match summary.earliest_next_available {
                    Some(cur) if cur <= next_date => cur,
                    _ => next_date,
                });
            }
            if let Some(free_date) = record.all_slots_free_date {
                summary.latest_all_free = Some(match summary.latest_all_free {
                    Some(cur) if cur >= free_date => cur,
                    _ => free_date,
                });
            }
        }
        summary.slot_util_pct = if summary.total_slots > 0 {
            (summary.occupied_slots as f64 / summary.total_slots as f64) * 100.0
        } else {
            0.0
        };
        summary
    }

    fn rejection_reason(rejection: &SlotRejection) -> String {
        match rejection {
            SlotRejection::Maintenance => "物料维护中".to_string(),
            SlotRejection::CapacityExhausted => "槽位已满".to_string(),
            SlotRejection::TimeConflict {
                campaign_id,
                slot_number,
            } => format!("与活动{}(槽位{})时间重叠", campaign_id, slot_number),
        }
    }

    // ===== 配置读取 =====

    async fn default_total_slots(&self) -> ApiResult<u32> {
        self.config
            .get_default_total_slots()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取配置失败: {}", e)))
    }

    async fn max_cas_retries(&self) -> ApiResult<u32> {
        self.config
            .get_max_cas_retries()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取配置失败: {}", e)))
    }

    async fn max_window_days(&self) -> ApiResult<i64> {
        self.config
            .get_max_window_days()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取配置失败: {}", e)))
    }
}
