// ==========================================
// 车载广告档期系统 - 领域类型定义
// ==========================================
// 红线: 枚举序列化格式与数据库存储一致 (SCREAMING_SNAKE_CASE)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 物料状态 (Material Status)
// ==========================================
// 物料 = 一辆车上的一个广告位载体(车身贴膜/车顶灯箱/车内屏幕)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialStatus {
    Available,   // 有空余槽位,可接单
    Full,        // 槽位已满
    Maintenance, // 维护中,不可接单
}

impl fmt::Display for MaterialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialStatus::Available => write!(f, "AVAILABLE"),
            MaterialStatus::Full => write!(f, "FULL"),
            MaterialStatus::Maintenance => write!(f, "MAINTENANCE"),
        }
    }
}

impl MaterialStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => MaterialStatus::Available,
            "FULL" => MaterialStatus::Full,
            "MAINTENANCE" => MaterialStatus::Maintenance,
            _ => MaterialStatus::Available, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MaterialStatus::Available => "AVAILABLE",
            MaterialStatus::Full => "FULL",
            MaterialStatus::Maintenance => "MAINTENANCE",
        }
    }
}

// ==========================================
// 支付状态 (Payment Status)
// ==========================================
// 投放活动的支付状态,由上游计费系统同步
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,   // 未支付
    Paid,     // 已支付
    Refunded, // 已退款
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "UNPAID"),
            PaymentStatus::Paid => write!(f, "PAID"),
            PaymentStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

impl PaymentStatus {
    /// 从字符串解析支付状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "UNPAID" => PaymentStatus::Unpaid,
            "PAID" => PaymentStatus::Paid,
            "REFUNDED" => PaymentStatus::Refunded,
            _ => PaymentStatus::Unpaid, // 默认值(保守: 未知视为未支付)
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

// ==========================================
// 投放活动状态 (Campaign Status)
// ==========================================
// 生命周期: PENDING_PAYMENT -> ACTIVE -> ENDED
//           PENDING_PAYMENT -> REJECTED (支付超时回收)
//           任意 -> CANCELLED (人工取消)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    PendingPayment, // 待支付
    Active,         // 投放中
    Ended,          // 已结束
    Rejected,       // 已驳回(支付超时)
    Cancelled,      // 已取消
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CampaignStatus::PendingPayment => write!(f, "PENDING_PAYMENT"),
            CampaignStatus::Active => write!(f, "ACTIVE"),
            CampaignStatus::Ended => write!(f, "ENDED"),
            CampaignStatus::Rejected => write!(f, "REJECTED"),
            CampaignStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl CampaignStatus {
    /// 从字符串解析活动状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PENDING_PAYMENT" => CampaignStatus::PendingPayment,
            "ACTIVE" => CampaignStatus::Active,
            "ENDED" => CampaignStatus::Ended,
            "REJECTED" => CampaignStatus::Rejected,
            "CANCELLED" => CampaignStatus::Cancelled,
            _ => CampaignStatus::PendingPayment, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CampaignStatus::PendingPayment => "PENDING_PAYMENT",
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Ended => "ENDED",
            CampaignStatus::Rejected => "REJECTED",
            CampaignStatus::Cancelled => "CANCELLED",
        }
    }

    /// 是否为终态(终态活动不再参与回收扫描)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Ended | CampaignStatus::Rejected | CampaignStatus::Cancelled
        )
    }
}

// ==========================================
// 回收原因 (Reclaim Kind)
// ==========================================
// 回收任务释放槽位时记录的原因标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReclaimKind {
    UnpaidTimeout, // 支付超时回收
    WindowExpired, // 投放窗口过期回收
}

impl fmt::Display for ReclaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReclaimKind::UnpaidTimeout => write!(f, "UNPAID_TIMEOUT"),
            ReclaimKind::WindowExpired => write!(f, "WINDOW_EXPIRED"),
        }
    }
}

impl ReclaimKind {
    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReclaimKind::UnpaidTimeout => "UNPAID_TIMEOUT",
            ReclaimKind::WindowExpired => "WINDOW_EXPIRED",
        }
    }
}
