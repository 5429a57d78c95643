// ==========================================
// 车载广告档期系统 - 请求入参校验器
// ==========================================
// 职责: 预订/查询请求的入口校验,业务逻辑之前拦截脏输入
// 红线: 零长度与倒置时间窗必须在进入冲突判定之前拒绝
// ==========================================

use chrono::NaiveDateTime;

use crate::api::error::{ApiError, ApiResult};

// ==========================================
// RequestValidator - 纯函数校验器
// ==========================================

/// 请求入参校验器
///
/// 职责：
/// 1. 时间窗校验（起点早于终点、不超最大跨度）
/// 2. 标识符非空校验
/// 3. 物料列表去重校验
pub struct RequestValidator;

impl RequestValidator {
    /// 校验投放时间窗
    ///
    /// # 规则
    /// - start 必须严格早于 end（零长度窗口没有意义）
    /// - 窗口跨度不得超过 max_window_days 天
    pub fn validate_window(
        start: NaiveDateTime,
        end: NaiveDateTime,
        max_window_days: i64,
    ) -> ApiResult<()> {
        if start >= end {
            return Err(ApiError::InvalidInput(format!(
                "投放窗口起点必须早于终点: start={}, end={}",
                start, end
            )));
        }
        let span_days = (end - start).num_days();
        if span_days > max_window_days {
            return Err(ApiError::InvalidInput(format!(
                "投放窗口过长: {}天，上限{}天",
                span_days, max_window_days
            )));
        }
        Ok(())
    }

    /// 校验活动ID非空
    pub fn validate_campaign_id(campaign_id: &str) -> ApiResult<()> {
        if campaign_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("活动ID不能为空".to_string()));
        }
        Ok(())
    }

    /// 校验单个物料ID非空
    pub fn validate_material_id(material_id: &str) -> ApiResult<()> {
        if material_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("物料ID不能为空".to_string()));
        }
        Ok(())
    }

    /// 校验物料ID列表
    ///
    /// # 规则
    /// - 列表非空
    /// - 每个ID非空
    /// - 不允许重复ID（重复会导致同一活动在同一物料上二次预订）
    pub fn validate_material_ids(material_ids: &[String]) -> ApiResult<()> {
        if material_ids.is_empty() {
            return Err(ApiError::InvalidInput("物料ID列表不能为空".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for id in material_ids {
            Self::validate_material_id(id)?;
            if !seen.insert(id.as_str()) {
                return Err(ApiError::InvalidInput(format!("物料ID重复: {}", id)));
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

    #[test]
    fn test_validate_window_rejects_inverted() {
        let result = RequestValidator::validate_window(dt(2024, 2, 1), dt(2024, 1, 1), 365);
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_window_rejects_zero_length() {
        let result = RequestValidator::validate_window(dt(2024, 1, 1), dt(2024, 1, 1), 365);
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_window_rejects_oversized() {
        let result = RequestValidator::validate_window(dt(2024, 1, 1), dt(2026, 1, 1), 365);
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_window_accepts_normal() {
        assert!(RequestValidator::validate_window(dt(2024, 1, 1), dt(2024, 1, 31), 365).is_ok());
    }

    #[test]
    fn test_validate_material_ids() {
        assert!(RequestValidator::validate_material_ids(&[]).is_err());
        assert!(
            RequestValidator::validate_material_ids(&["".to_string()]).is_err()
        );
        assert!(RequestValidator::validate_material_ids(&[
            "MAT-001".to_string(),
            "MAT-001".to_string()
        ])
        .is_err());
        assert!(RequestValidator::validate_material_ids(&[
            "MAT-001".to_string(),
            "MAT-002".to_string()
        ])
        .is_ok());
    }

    #[test]
    fn test_validate_campaign_id() {
        assert!(RequestValidator::validate_campaign_id("  ").is_err());
        assert!(RequestValidator::validate_campaign_id("CAMP-001").is_ok());
    }
}
