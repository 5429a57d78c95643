// ==========================================
// 车载广告档期系统 - 物料主数据
// ==========================================
// 红线: 物料主数据只读,档期引擎不回写
// 用途: 分配前的资格过滤(类型/车辆等级/类目)与存在性校验
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// MaterialMaster - 物料主数据
// ==========================================
// 物料 = 一个车载广告载体(车身贴膜/车顶灯箱/车内屏幕)
// 对齐: material_master 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialMaster {
    // ===== 主键 =====
    pub material_id: String, // 物料唯一标识

    // ===== 资格过滤维度 =====
    pub material_type: String, // 物料类型代码(如 SCREEN/LIGHTBOX/BODY_WRAP)
    pub vehicle_class: String, // 车辆等级代码(如 BUS/TAXI/TRUCK)
    pub category: String,      // 投放类目代码(行业/内容分区)

    // ===== 展示信息 =====
    pub display_name: Option<String>, // 展示名称(运营侧可读)
    pub vehicle_no: Option<String>,   // 所属车辆编号

    // ===== 可用性 =====
    pub is_active: bool, // 是否在册(下线物料不参与分配)

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime, // 记录创建时间
    pub updated_at: NaiveDateTime, // 记录更新时间
}

impl MaterialMaster {
    /// 是否命中给定的资格过滤条件(None 表示该维度不限)
    pub fn matches_filter(
        &self,
        material_type: Option<&str>,
        vehicle_class: Option<&str>,
        category: Option<&str>,
    ) -> bool {
        if let Some(t) = material_type {
            if self.material_type != t {
                return false;
            }
        }
        if let Some(v) = vehicle_class {
            if self.vehicle_class != v {
                return false;
            }
        }
        if let Some(c) = category {
            if self.category != c {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn material(t: &str, v: &str, c: &str) -> MaterialMaster {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        MaterialMaster {
            material_id: "MAT-001".to_string(),
            material_type: t.to_string(),
            vehicle_class: v.to_string(),
            category: c.to_string(),
            display_name: None,
            vehicle_no: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_matches_filter_all_dimensions() {
        let m = material("SCREEN", "BUS", "RETAIL");
        assert!(m.matches_filter(Some("SCREEN"), Some("BUS"), Some("RETAIL")));
        assert!(m.matches_filter(None, None, None));
        assert!(m.matches_filter(Some("SCREEN"), None, None));
        assert!(!m.matches_filter(Some("LIGHTBOX"), None, None));
        assert!(!m.matches_filter(Some("SCREEN"), Some("TAXI"), None));
    }
}
