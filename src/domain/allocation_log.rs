// ==========================================
// 车载广告档期系统 - 分配操作日志领域模型
// ==========================================
// 红线: 每次预订/释放/回收都必须留痕
// 用途: 审计追踪,回收任务与补偿释放的事后排查
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// AllocationLog - 分配操作日志
// ==========================================
// 对齐: allocation_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationLog {
    // ===== 主键 =====
    pub entry_id: String,         // 日志ID (UUID)
    pub action_type: String,      // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作方 (请求方标识或 SYSTEM)

    // ===== 操作对象 =====
    pub campaign_id: Option<String>, // 关联投放活动
    pub material_id: Option<String>, // 关联物料
    pub slot_number: Option<u32>,    // 关联槽位号

    // ===== 投放窗口 =====
    pub window_start: Option<NaiveDateTime>, // 窗口起点
    pub window_end: Option<NaiveDateTime>,   // 窗口终点

    // ===== 详情 =====
    pub detail: Option<String>,          // 详细描述(回收原因/补偿说明)
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
}

// ==========================================
// AllocationAction - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationAction {
    Reserve,        // 预订槽位
    Release,        // 释放槽位
    Compensate,     // 批量预订失败后的补偿释放
    Reclaim,        // 回收任务释放(支付超时/窗口过期)
    SetMaintenance, // 设置/解除维护状态
    EnqueuePending, // 候补入队
    PrunePending,   // 候补清理
}

impl AllocationAction {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationAction::Reserve => "Reserve",
            AllocationAction::Release => "Release",
            AllocationAction::Compensate => "Compensate",
            AllocationAction::Reclaim => "Reclaim",
            AllocationAction::SetMaintenance => "SetMaintenance",
            AllocationAction::EnqueuePending => "EnqueuePending",
            AllocationAction::PrunePending => "PrunePending",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Reserve" => Some(AllocationAction::Reserve),
            "Release" => Some(AllocationAction::Release),
            "Compensate" => Some(AllocationAction::Compensate),
            "Reclaim" => Some(AllocationAction::Reclaim),
            "SetMaintenance" => Some(AllocationAction::SetMaintenance),
            "EnqueuePending" => Some(AllocationAction::EnqueuePending),
            "PrunePending" => Some(AllocationAction::PrunePending),
            _ => None,
        }
    }
}

// ==========================================
// AllocationLog 辅助方法
// ==========================================
impl AllocationLog {
    /// 创建新的分配日志
    ///
    /// # 参数
    /// - `entry_id`: 日志ID (通常使用UUID)
    /// - `action`: 操作类型
    /// - `actor`: 操作方标识
    pub fn new(entry_id: String, action: AllocationAction, actor: String) -> Self {
        Self {
            entry_id,
            action_type: action.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor,
            campaign_id: None,
            material_id: None,
            slot_number: None,
            window_start: None,
            window_end: None,
            detail: None,
            payload_json: None,
        }
    }

    /// 设置关联活动
    pub fn with_campaign(mut self, campaign_id: &str) -> Self {
        self.campaign_id = Some(campaign_id.to_string());
        self
    }

    /// 设置关联物料与槽位
    pub fn with_material(mut self, material_id: &str, slot_number: Option<u32>) -> Self {
        self.material_id = Some(material_id.to_string());
        self.slot_number = slot_number;
        self
    }

    /// 设置投放窗口
    pub fn with_window(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.window_start = Some(start);
        self.window_end = Some(end);
        self
    }

    /// 设置详细描述
    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }
}
