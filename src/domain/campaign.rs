// ==========================================
// 车载广告档期系统 - 投放活动投影
// ==========================================
// 红线: 活动生命周期归上游活动管理方所有,本系统只持有同步投影
// 用途: 回收任务扫描(支付超时/窗口过期)的数据来源
// ==========================================

use crate::domain::types::{CampaignStatus, PaymentStatus};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// CampaignSnapshot - 投放活动投影
// ==========================================
// 对齐: campaign_projection 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    // ===== 主键 =====
    pub campaign_id: String, // 投放活动唯一标识

    // ===== 生命周期 =====
    pub status: CampaignStatus,        // 活动状态
    pub payment_status: PaymentStatus, // 支付状态

    // ===== 投放窗口 =====
    pub window_start: NaiveDateTime, // 投放起点(含)
    pub window_end: NaiveDateTime,   // 投放终点(不含)

    // ===== 预订落位 =====
    pub material_ids: Vec<String>, // 持有预订的物料清单

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime, // 活动创建时间(支付超时的计时起点)
    pub updated_at: NaiveDateTime, // 投影最后同步时间
}

impl CampaignSnapshot {
    /// 支付是否已超时: 创建后超过 timeout_hours 仍未支付
    pub fn is_payment_overdue(&self, now: NaiveDateTime, timeout_hours: i64) -> bool {
        self.payment_status == PaymentStatus::Unpaid
            && now - self.created_at >= Duration::hours(timeout_hours)
    }

    /// 投放窗口是否已过期(半开区间,终点时刻即过期)
    pub fn is_window_expired(&self, now: NaiveDateTime) -> bool {
        now >= self.window_end
    }
}
