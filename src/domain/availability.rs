// ==========================================
// 车载广告档期系统 - 档期领域模型
// ==========================================
// 红线: 派生字段在每次变更后重算,不允许与明细不一致
// 红线: 同一物料的预订时间窗两两不重叠 (半开区间判定)
// 用途: 仓储层读写,引擎层只读判定
// ==========================================

use crate::domain::types::MaterialStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 单物料槽位数上限
pub const MAX_TOTAL_SLOTS: u32 = 10;

// ==========================================
// SlotReservation - 槽位预订明细
// ==========================================
// 一条预订 = 一个投放活动对一个物料上一个槽位的时间窗占用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotReservation {
    pub campaign_id: String,          // 投放活动ID(同一物料内唯一)
    pub slot_number: u32,             // 槽位号(1..=total_slots, 取最小空闲号)
    pub window_start: NaiveDateTime,  // 投放窗口起点(含)
    pub window_end: NaiveDateTime,    // 投放窗口终点(不含)
    pub reserved_at: NaiveDateTime,   // 预订落位时间
}

// ==========================================
// PendingRequest - 候补请求
// ==========================================
// 物料满载时的候补队列条目,尽力而为,不保证兑现
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub campaign_id: String,             // 投放活动ID
    pub requested_start: NaiveDateTime,  // 期望的投放起点
    pub priority: i32,                   // 候补优先级(大者先)
    pub queued_at: NaiveDateTime,        // 入队时间
}

// ==========================================
// AvailabilityRecord - 物料档期记录
// ==========================================
// 每个物料一条,物料ID为主键; 首次被分配请求引用时惰性创建
// 红线: 所有变更必须经仓储层 compare_and_apply 落库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    // ===== 主键 =====
    pub material_id: String, // 物料唯一标识

    // ===== 容量与状态 =====
    pub total_slots: u32,          // 槽位总数(1..=MAX_TOTAL_SLOTS, 物料固有属性)
    pub status: MaterialStatus,    // AVAILABLE/FULL/MAINTENANCE

    // ===== 预订明细 =====
    pub reservations: Vec<SlotReservation>, // 当前预订(按 window_start 升序)
    pub pending: Vec<PendingRequest>,       // 候补队列(入队顺序)

    // ===== 派生字段(每次变更后重算) =====
    pub occupied_slots: u32,                        // = reservations.len()
    pub next_available_date: Option<NaiveDateTime>, // 最早释放时间 = min(window_end), 无预订为 None
    pub all_slots_free_date: Option<NaiveDateTime>, // 全部释放时间 = max(window_end), 无预订为 None

    // ===== 乐观并发控制 =====
    pub revision: i64, // 版本号,条件写入的比对依据

    // ===== 审计 =====
    pub updated_at: NaiveDateTime, // 最后更新时间
}

impl AvailabilityRecord {
    /// 创建空白档期记录(惰性创建路径)
    pub fn new(material_id: &str, total_slots: u32, now: NaiveDateTime) -> Self {
        AvailabilityRecord {
            material_id: material_id.to_string(),
            total_slots,
            status: MaterialStatus::Available,
            reservations: Vec::new(),
            pending: Vec::new(),
            occupied_slots: 0,
            next_available_date: None,
            all_slots_free_date: None,
            revision: 0,
            updated_at: now,
        }
    }

    /// 空余槽位数(派生,不落库,恒 >= 0)
    pub fn available_slots(&self) -> u32 {
        self.total_slots.saturating_sub(self.occupied_slots)
    }

    /// 最早释放时间,无预订时取 now
    pub fn next_available_or(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.next_available_date.unwrap_or(now)
    }

    /// 全部释放时间,无预订时取 now
    pub fn all_free_or(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.all_slots_free_date.unwrap_or(now)
    }

    /// 重算派生字段,预订明细按窗口起点排序
    ///
    /// 维护中状态由人工设置,重算不改写; 其余状态按占用推导
    pub fn recalculate(&mut self) {
        self.reservations
            .sort_by(|a, b| a.window_start.cmp(&b.window_start));
        self.occupied_slots = self.reservations.len() as u32;
        self.next_available_date = self.reservations.iter().map(|r| r.window_end).min();
        self.all_slots_free_date = self.reservations.iter().map(|r| r.window_end).max();
        if self.status != MaterialStatus::Maintenance {
            self.status = if self.occupied_slots >= self.total_slots {
                MaterialStatus::Full
            } else {
                MaterialStatus::Available
            };
        }
    }

    /// 追加一条预订并重算派生字段
    ///
    /// 不做冲突判定,判定属于引擎层; 落库前由 validate 兜底
    pub fn add_reservation(&mut self, reservation: SlotReservation) {
        self.reservations.push(reservation);
        self.recalculate();
    }

    /// 移除指定活动的预订,返回被移除的明细
    ///
    /// 活动在同一物料内唯一,最多移除一条; 不存在时返回 None(幂等)
    pub fn remove_campaign(&mut self, campaign_id: &str) -> Option<SlotReservation> {
        let pos = self
            .reservations
            .iter()
            .position(|r| r.campaign_id == campaign_id)?;
        let removed = self.reservations.remove(pos);
        self.recalculate();
        Some(removed)
    }

    /// 移除所有窗口终点不晚于 now 的预订,返回被移除的明细
    pub fn remove_expired(&mut self, now: NaiveDateTime) -> Vec<SlotReservation> {
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .reservations
            .drain(..)
            .partition(|r| r.window_end <= now);
        self.reservations = kept;
        self.recalculate();
        expired
    }

    /// 候补入队,同一活动重复入队为幂等 no-op
    ///
    /// 返回是否实际入队
    pub fn enqueue_pending(&mut self, request: PendingRequest) -> bool {
        if self
            .pending
            .iter()
            .any(|p| p.campaign_id == request.campaign_id)
        {
            return false;
        }
        self.pending.push(request);
        true
    }

    /// 清理入队时间早于 cutoff 的候补条目,返回清理数量
    pub fn prune_pending(&mut self, cutoff: NaiveDateTime) -> u32 {
        let before = self.pending.len();
        self.pending.retain(|p| p.queued_at >= cutoff);
        (before - self.pending.len()) as u32
    }

    /// 落库前不变量校验
    ///
    /// 校验项: 槽位总数边界 / 占用计数一致 / 槽位号唯一且在界内 /
    /// 活动ID唯一 / 时间窗合法且两两不重叠 / 派生日期次序
    pub fn validate(&self) -> Result<(), String> {
        if self.total_slots < 1 || self.total_slots > MAX_TOTAL_SLOTS {
            return Err(format!(
                "槽位总数越界: {} (允许 1..={})",
                self.total_slots, MAX_TOTAL_SLOTS
            ));
        }
        if self.occupied_slots as usize != self.reservations.len() {
            return Err(format!(
                "占用计数不一致: occupied_slots={} 预订数={}",
                self.occupied_slots,
                self.reservations.len()
            ));
        }
        if self.occupied_slots > self.total_slots {
            return Err(format!(
                "占用超过容量: {}/{}",
                self.occupied_slots, self.total_slots
            ));
        }
        for r in &self.reservations {
            if r.window_start >= r.window_end {
                return Err(format!(
                    "预订时间窗非法: {} [{} ~ {})",
                    r.campaign_id, r.window_start, r.window_end
                ));
            }
            if r.slot_number < 1 || r.slot_number > self.total_slots {
                return Err(format!(
                    "槽位号越界: {} 号槽 (允许 1..={})",
                    r.slot_number, self.total_slots
                ));
            }
        }
        for (i, a) in self.reservations.iter().enumerate() {
            for b in self.reservations.iter().skip(i + 1) {
                if a.campaign_id == b.campaign_id {
                    return Err(format!("活动重复预订: {}", a.campaign_id));
                }
                if a.slot_number == b.slot_number {
                    return Err(format!("槽位号重复: {} 号槽", a.slot_number));
                }
                if a.window_start < b.window_end && b.window_start < a.window_end {
                    return Err(format!(
                        "时间窗重叠: {} 与 {}",
                        a.campaign_id, b.campaign_id
                    ));
                }
            }
        }
        if let (Some(next), Some(all)) = (self.next_available_date, self.all_slots_free_date) {
            if next > all {
                return Err(format!(
                    "派生日期次序错误: next_available={} > all_free={}",
                    next, all
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn reservation(campaign: &str, slot: u32, start: NaiveDateTime, end: NaiveDateTime) -> SlotReservation {
        SlotReservation {
            campaign_id: campaign.to_string(),
            slot_number: slot,
            window_start: start,
            window_end: end,
            reserved_at: dt(2024, 1, 1),
        }
    }

    #[test]
    fn test_new_record_is_empty_and_available() {
        let rec = AvailabilityRecord::new("MAT-001", 5, dt(2024, 1, 1));
        assert_eq!(rec.occupied_slots, 0);
        assert_eq!(rec.available_slots(), 5);
        assert_eq!(rec.status, MaterialStatus::Available);
        assert_eq!(rec.revision, 0);
        assert!(rec.next_available_date.is_none());
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn test_recalculate_derives_counts_and_dates() {
        let mut rec = AvailabilityRecord::new("MAT-001", 5, dt(2024, 1, 1));
        rec.add_reservation(reservation("c2", 2, dt(2024, 2, 1), dt(2024, 2, 10)));
        rec.add_reservation(reservation("c1", 1, dt(2024, 1, 1), dt(2024, 1, 10)));

        assert_eq!(rec.occupied_slots, 2);
        assert_eq!(rec.available_slots(), 3);
        // 按窗口起点排序
        assert_eq!(rec.reservations[0].campaign_id, "c1");
        assert_eq!(rec.next_available_date, Some(dt(2024, 1, 10)));
        assert_eq!(rec.all_slots_free_date, Some(dt(2024, 2, 10)));
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn test_full_status_derived_at_capacity() {
        let mut rec = AvailabilityRecord::new("MAT-001", 2, dt(2024, 1, 1));
        rec.add_reservation(reservation("c1", 1, dt(2024, 1, 1), dt(2024, 1, 10)));
        assert_eq!(rec.status, MaterialStatus::Available);
        rec.add_reservation(reservation("c2", 2, dt(2024, 1, 10), dt(2024, 1, 20)));
        assert_eq!(rec.status, MaterialStatus::Full);
        assert_eq!(rec.available_slots(), 0);
    }

    #[test]
    fn test_maintenance_status_survives_recalculate() {
        let mut rec = AvailabilityRecord::new("MAT-001", 5, dt(2024, 1, 1));
        rec.status = MaterialStatus::Maintenance;
        rec.add_reservation(reservation("c1", 1, dt(2024, 1, 1), dt(2024, 1, 10)));
        assert_eq!(rec.status, MaterialStatus::Maintenance);
    }

    #[test]
    fn test_remove_campaign_is_idempotent() {
        let mut rec = AvailabilityRecord::new("MAT-001", 5, dt(2024, 1, 1));
        rec.add_reservation(reservation("c1", 1, dt(2024, 1, 1), dt(2024, 1, 10)));

        let removed = rec.remove_campaign("c1");
        assert!(removed.is_some());
        assert_eq!(rec.occupied_slots, 0);
        assert!(rec.next_available_date.is_none());

        // 再次移除: no-op
        let removed_again = rec.remove_campaign("c1");
        assert!(removed_again.is_none());
        assert_eq!(rec.occupied_slots, 0);
    }

    #[test]
    fn test_remove_expired_keeps_live_windows() {
        let mut rec = AvailabilityRecord::new("MAT-001", 5, dt(2024, 1, 1));
        rec.add_reservation(reservation("old", 1, dt(2024, 1, 1), dt(2024, 1, 10)));
        rec.add_reservation(reservation("live", 2, dt(2024, 3, 1), dt(2024, 3, 10)));

        // 窗口终点等于 now 也视为过期(半开区间)
        let expired = rec.remove_expired(dt(2024, 1, 10));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].campaign_id, "old");
        assert_eq!(rec.occupied_slots, 1);
        assert_eq!(rec.reservations[0].campaign_id, "live");
    }

    #[test]
    fn test_enqueue_pending_dedup() {
        let mut rec = AvailabilityRecord::new("MAT-001", 1, dt(2024, 1, 1));
        let req = PendingRequest {
            campaign_id: "c9".to_string(),
            requested_start: dt(2024, 5, 1),
            priority: 0,
            queued_at: dt(2024, 4, 1),
        };
        assert!(rec.enqueue_pending(req.clone()));
        assert!(!rec.enqueue_pending(req));
        assert_eq!(rec.pending.len(), 1);
    }

    #[test]
    fn test_prune_pending_by_cutoff() {
        let mut rec = AvailabilityRecord::new("MAT-001", 1, dt(2024, 1, 1));
        rec.enqueue_pending(PendingRequest {
            campaign_id: "stale".to_string(),
            requested_start: dt(2024, 5, 1),
            priority: 0,
            queued_at: dt(2024, 1, 1),
        });
        rec.enqueue_pending(PendingRequest {
            campaign_id: "fresh".to_string(),
            requested_start: dt(2024, 5, 1),
            priority: 0,
            queued_at: dt(2024, 4, 1),
        });
        let pruned = rec.prune_pending(dt(2024, 3, 1));
        assert_eq!(pruned, 1);
        assert_eq!(rec.pending.len(), 1);
        assert_eq!(rec.pending[0].campaign_id, "fresh");
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut rec = AvailabilityRecord::new("MAT-001", 5, dt(2024, 1, 1));
        rec.add_reservation(reservation("c1", 1, dt(2024, 1, 1), dt(2024, 1, 10)));
        rec.add_reservation(reservation("c2", 2, dt(2024, 1, 5), dt(2024, 1, 15)));
        let err = rec.validate().unwrap_err();
        assert!(err.contains("时间窗重叠"));
    }

    #[test]
    fn test_validate_allows_touching_windows() {
        let mut rec = AvailabilityRecord::new("MAT-001", 5, dt(2024, 1, 1));
        rec.add_reservation(reservation("c1", 1, dt(2024, 1, 1), dt(2024, 1, 10)));
        rec.add_reservation(reservation("c2", 2, dt(2024, 1, 10), dt(2024, 1, 20)));
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_campaign() {
        let mut rec = AvailabilityRecord::new("MAT-001", 5, dt(2024, 1, 1));
        rec.add_reservation(reservation("c1", 1, dt(2024, 1, 1), dt(2024, 1, 10)));
        rec.add_reservation(reservation("c1", 2, dt(2024, 2, 1), dt(2024, 2, 10)));
        let err = rec.validate().unwrap_err();
        assert!(err.contains("活动重复预订"));
    }

    #[test]
    fn test_validate_rejects_slot_out_of_range() {
        let mut rec = AvailabilityRecord::new("MAT-001", 2, dt(2024, 1, 1));
        rec.add_reservation(reservation("c1", 3, dt(2024, 1, 1), dt(2024, 1, 10)));
        let err = rec.validate().unwrap_err();
        assert!(err.contains("槽位号越界"));
    }

    #[test]
    fn test_validate_rejects_bad_capacity() {
        let rec = AvailabilityRecord::new("MAT-001", 0, dt(2024, 1, 1));
        assert!(rec.validate().is_err());
        let rec = AvailabilityRecord::new("MAT-001", MAX_TOTAL_SLOTS + 1, dt(2024, 1, 1));
        assert!(rec.validate().is_err());
    }
}
