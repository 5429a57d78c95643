// ==========================================
// 车载广告档期系统 - 冲突判定纯函数库
// ==========================================
// 职责: 提供时间窗重叠判定、可接单判定、槽位号分配的纯逻辑
// 红线: 无状态、无副作用、无 I/O 操作
// 红线: 判定只返回结果,不抛错误; 错误语义由调用方赋予
// ==========================================

use crate::domain::availability::{AvailabilityRecord, SlotReservation};
use crate::domain::types::MaterialStatus;
use chrono::NaiveDateTime;

// ==========================================
// SlotRejection - 拒绝原因
// ==========================================
// 可接单判定失败时的具体原因,调用方据此映射为最具体的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRejection {
    /// 物料维护中,无条件拒绝
    Maintenance,
    /// 无空余槽位
    CapacityExhausted,
    /// 与已有预订时间窗重叠
    TimeConflict {
        campaign_id: String,
        slot_number: u32,
    },
}

// ==========================================
// ConflictChecker - 纯函数工具类
// ==========================================
pub struct ConflictChecker;

impl ConflictChecker {
    /// 半开区间重叠判定
    ///
    /// # 规则
    /// - [a_start, a_end) 与 [b_start, b_end) 重叠 ⇔ a_start < b_end && b_start < a_end
    /// - 首尾相接([1,10) 与 [10,20))不算重叠
    ///
    /// # 前置
    /// - 调用方保证 start < end,零长度窗口在入口层拒绝
    pub fn windows_overlap(
        a_start: NaiveDateTime,
        a_end: NaiveDateTime,
        b_start: NaiveDateTime,
        b_end: NaiveDateTime,
    ) -> bool {
        a_start < b_end && b_start < a_end
    }

    /// 找出第一条与给定窗口重叠的预订
    pub fn first_conflict<'a>(
        record: &'a AvailabilityRecord,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Option<&'a SlotReservation> {
        record
            .reservations
            .iter()
            .find(|r| Self::windows_overlap(start, end, r.window_start, r.window_end))
    }

    /// 可接单判定失败原因,可接单时返回 None
    ///
    /// # 规则(按优先级)
    /// 1. 维护中 → Maintenance
    /// 2. 无空余槽位 → CapacityExhausted
    /// 3. 与任一已有预订重叠 → TimeConflict
    pub fn rejection(
        record: &AvailabilityRecord,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Option<SlotRejection> {
        if record.status == MaterialStatus::Maintenance {
            return Some(SlotRejection::Maintenance);
        }
        if record.available_slots() == 0 {
            return Some(SlotRejection::CapacityExhausted);
        }
        if let Some(conflict) = Self::first_conflict(record, start, end) {
            return Some(SlotRejection::TimeConflict {
                campaign_id: conflict.campaign_id.clone(),
                slot_number: conflict.slot_number,
            });
        }
        None
    }

    /// 是否可接受给定窗口的新预订
    ///
    /// # 规则
    /// - status 必须为 AVAILABLE
    /// - 空余槽位 > 0
    /// - 与所有已有预订不重叠
    pub fn can_accept(
        record: &AvailabilityRecord,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> bool {
        Self::rejection(record, start, end).is_none()
    }

    /// 分配下一个槽位号: 1..=total_slots 中最小的空闲号
    ///
    /// # 返回
    /// - Some(槽位号); 满载时 None
    pub fn next_slot_number(record: &AvailabilityRecord) -> Option<u32> {
        (1..=record.total_slots)
            .find(|n| !record.reservations.iter().any(|r| r.slot_number == *n))
    }
}
