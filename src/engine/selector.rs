// ==========================================
// 车载广告档期系统 - 物料选择排序引擎
// ==========================================
// 职责: 对候选物料按分配优先顺序排序,输出可解释的排序依据
// 红线: 结果确定可复现,相同输入必得相同顺序
// 红线: 排序仅为建议,落位时仍须在写入路径重新判定
// ==========================================

use crate::domain::availability::AvailabilityRecord;
use crate::engine::conflict::ConflictChecker;
use chrono::NaiveDateTime;
use std::cmp::Ordering;

// ==========================================
// TieBreakPolicy - 同分决胜策略
// ==========================================
// 占用数相同时的决胜顺序: 优先级名单位次 → 物料ID字典序
// 名单来自配置,不在代码里写死物料ID
#[derive(Debug, Clone, Default)]
pub struct TieBreakPolicy {
    ranked: Vec<String>,
}

impl TieBreakPolicy {
    pub fn new(ranked: Vec<String>) -> Self {
        Self { ranked }
    }

    /// 物料在优先级名单中的位次,不在名单内返回 None
    pub fn rank_of(&self, material_id: &str) -> Option<usize> {
        self.ranked.iter().position(|m| m == material_id)
    }
}

// ==========================================
// MaterialSelector - 选择排序引擎
// ==========================================
pub struct MaterialSelector {
    // 无状态引擎,不需要注入依赖
}

impl MaterialSelector {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    /// 过滤并排序候选物料
    ///
    /// 过滤: 剔除对给定窗口不可接单的物料(满载/维护中/时间窗冲突)
    ///
    /// 排序键:
    /// 1) occupied_slots 降序 (越接近满载越优先,集中投放减少车辆分散)
    /// 2) 优先级名单位次升序 (配置的决胜名单)
    /// 3) material_id 字典序升序 (兜底,保证确定性)
    ///
    /// # 返回
    /// 排序后的档期记录(按分配顺序从先到后),保证每条都能接受给定窗口
    pub fn select(
        &self,
        candidates: Vec<AvailabilityRecord>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        policy: &TieBreakPolicy,
    ) -> Vec<AvailabilityRecord> {
        let mut eligible: Vec<AvailabilityRecord> = candidates
            .into_iter()
            .filter(|rec| ConflictChecker::can_accept(rec, start, end))
            .collect();
        eligible.sort_by(|a, b| self.compare(a, b, policy));
        eligible
    }

    /// 比较两条档期记录的分配优先级
    ///
    /// # 返回
    /// Ordering::Less 表示 a 优先于 b
    fn compare(
        &self,
        a: &AvailabilityRecord,
        b: &AvailabilityRecord,
        policy: &TieBreakPolicy,
    ) -> Ordering {
        // 1. occupied_slots 降序
        match b.occupied_slots.cmp(&a.occupied_slots) {
            Ordering::Equal => {}
            other => return other,
        }

        // 2. 优先级名单位次 (在名单内者优先,位次小者优先)
        if let Some(ord) = self.compare_rank(
            policy.rank_of(&a.material_id),
            policy.rank_of(&b.material_id),
        ) {
            return ord;
        }

        // 3. 物料ID字典序 (兜底)
        a.material_id.cmp(&b.material_id)
    }

    /// 比较优先级名单位次
    ///
    /// # 返回
    /// - `Some(Ordering)`: 位次分出先后
    /// - `None`: 两者均不在名单内或位次相同,继续比较下一个键
    fn compare_rank(&self, a: Option<usize>, b: Option<usize>) -> Option<Ordering> {
        match (a, b) {
            (Some(ra), Some(rb)) if ra != rb => Some(ra.cmp(&rb)),
            (Some(_), None) => Some(Ordering::Less),
            (None, Some(_)) => Some(Ordering::Greater),
            _ => None,
        }
    }

    /// 生成排序原因 (可解释性)
    ///
    /// # 返回
    /// JSON 格式的排序原因字符串
    pub fn generate_sort_reason(
        &self,
        record: &AvailabilityRecord,
        policy: &TieBreakPolicy,
    ) -> String {
        let rank = policy.rank_of(&record.material_id);
        let primary_factor = if record.occupied_slots > 0 {
            "OCCUPIED_SLOTS"
        } else if rank.is_some() {
            "PRIORITY_RANK"
        } else {
            "MATERIAL_ID"
        };

        format!(
            r#"{{"sort_keys":{{"occupied_slots":{},"priority_rank":{},"material_id":"{}"}},"primary_factor":"{}"}}"#,
            record.occupied_slots,
            rank.map(|r| r.to_string())
                .unwrap_or_else(|| "null".to_string()),
            record.material_id,
            primary_factor
        )
    }
}

// ==========================================
// Default trait 实现
// ==========================================
impl Default for MaterialSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::availability::SlotReservation;
    use crate::domain::types::MaterialStatus;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn record(id: &str, total: u32, occupied: u32) -> AvailabilityRecord {
        let mut rec = AvailabilityRecord::new(id, total, dt(2024, 1, 1));
        // 已有预订放在远离测试窗口的过去,避免与测试窗口冲突
        for i in 0..occupied {
            rec.add_reservation(SlotReservation {
                campaign_id: format!("seed-{}-{}", id, i),
                slot_number: i + 1,
                window_start: dt(2020, 1, 1) + chrono::Duration::days(i as i64 * 10),
                window_end: dt(2020, 1, 5) + chrono::Duration::days(i as i64 * 10),
                reserved_at: dt(2020, 1, 1),
            });
        }
        rec
    }

    #[test]
    fn test_select_orders_by_occupied_desc() {
        let selector = MaterialSelector::new();
        let policy = TieBreakPolicy::default();
        let pool = vec![
            record("MAT-A", 5, 1),
            record("MAT-B", 5, 3),
            record("MAT-C", 5, 2),
        ];
        let sorted = selector.select(pool, dt(2024, 6, 1), dt(2024, 6, 10), &policy);
        let ids: Vec<&str> = sorted.iter().map(|r| r.material_id.as_str()).collect();
        assert_eq!(ids, vec!["MAT-B", "MAT-C", "MAT-A"]);
    }

    #[test]
    fn test_select_filters_full_and_maintenance() {
        let selector = MaterialSelector::new();
        let policy = TieBreakPolicy::default();
        let mut maint = record("MAT-M", 5, 0);
        maint.status = MaterialStatus::Maintenance;
        let pool = vec![
            record("MAT-FULL", 2, 2),
            maint,
            record("MAT-OK", 5, 0),
        ];
        let sorted = selector.select(pool, dt(2024, 6, 1), dt(2024, 6, 10), &policy);
        let ids: Vec<&str> = sorted.iter().map(|r| r.material_id.as_str()).collect();
        assert_eq!(ids, vec!["MAT-OK"]);
    }

    #[test]
    fn test_select_filters_window_conflict() {
        let selector = MaterialSelector::new();
        let policy = TieBreakPolicy::default();
        let mut conflicted = record("MAT-X", 5, 0);
        conflicted.add_reservation(SlotReservation {
            campaign_id: "c-live".to_string(),
            slot_number: 1,
            window_start: dt(2024, 6, 5),
            window_end: dt(2024, 6, 15),
            reserved_at: dt(2024, 1, 1),
        });
        let pool = vec![conflicted, record("MAT-Y", 5, 0)];
        let sorted = selector.select(pool, dt(2024, 6, 1), dt(2024, 6, 10), &policy);
        let ids: Vec<&str> = sorted.iter().map(|r| r.material_id.as_str()).collect();
        assert_eq!(ids, vec!["MAT-Y"]);
    }

    #[test]
    fn test_tie_break_by_ranked_list_then_id() {
        let selector = MaterialSelector::new();
        let policy = TieBreakPolicy::new(vec!["MAT-C".to_string(), "MAT-B".to_string()]);
        // 占用数相同: 名单内 C 先于 B,名单外 A/D 按字典序
        let pool = vec![
            record("MAT-D", 5, 1),
            record("MAT-B", 5, 1),
            record("MAT-A", 5, 1),
            record("MAT-C", 5, 1),
        ];
        let sorted = selector.select(pool, dt(2024, 6, 1), dt(2024, 6, 10), &policy);
        let ids: Vec<&str> = sorted.iter().map(|r| r.material_id.as_str()).collect();
        assert_eq!(ids, vec!["MAT-C", "MAT-B", "MAT-A", "MAT-D"]);
    }

    #[test]
    fn test_select_deterministic_across_calls() {
        let selector = MaterialSelector::new();
        let policy = TieBreakPolicy::default();
        let pool = || {
            vec![
                record("MAT-B", 5, 2),
                record("MAT-A", 5, 2),
                record("MAT-C", 5, 1),
            ]
        };
        let first = selector.select(pool(), dt(2024, 6, 1), dt(2024, 6, 10), &policy);
        let second = selector.select(pool(), dt(2024, 6, 1), dt(2024, 6, 10), &policy);
        let ids = |v: &[AvailabilityRecord]| {
            v.iter().map(|r| r.material_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(ids(&first), vec!["MAT-A", "MAT-B", "MAT-C"]);
    }

    #[test]
    fn test_sort_reason_json() {
        let selector = MaterialSelector::new();
        let policy = TieBreakPolicy::new(vec!["MAT-A".to_string()]);
        let rec = record("MAT-A", 5, 2);
        let reason = selector.generate_sort_reason(&rec, &policy);
        assert!(reason.contains("\"occupied_slots\":2"));
        assert!(reason.contains("\"priority_rank\":0"));
        assert!(reason.contains("\"primary_factor\":\"OCCUPIED_SLOTS\""));
    }
}
