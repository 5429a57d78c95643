// ==========================================
// 完整业务流程端到端集成测试
// ==========================================
// 目标: 验证从预订到回收再到重新预订的完整业务闭环
// 覆盖: AllocationApi → CampaignRepository → ReclamationJob
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod e2e_allocation_flow_test {
    use chrono::{Duration, NaiveDateTime, Utc};
    use fleet_ad_slots::api::{AllocationApi, ApiError, ReservationRequest};
    use fleet_ad_slots::config::ConfigManager;
    use fleet_ad_slots::domain::types::CampaignStatus;
    use fleet_ad_slots::job::ReclamationJob;
    use fleet_ad_slots::logging;
    use fleet_ad_slots::repository::{
        AllocationLogRepository, AvailabilityRepository, CampaignRepository, MaterialRepository,
    };
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    use crate::test_helpers::{
        create_test_db, insert_test_config, insert_test_materials, open_test_connection,
    };

    type TestJob = ReclamationJob<ConfigManager, CampaignRepository>;

    // ==========================================
    // 测试辅助函数
    // ==========================================

    /// 创建完整测试环境(API + 回收任务 + 断言用仓储)
    fn setup_full_test_env() -> (
        NamedTempFile,
        String,
        AllocationApi<ConfigManager>,
        TestJob,
        Arc<CampaignRepository>,
        Arc<AllocationLogRepository>,
    ) {
        let (temp_file, db_path) = create_test_db().unwrap();

        let conn = open_test_connection(&db_path).unwrap();
        insert_test_config(&conn).unwrap();
        insert_test_materials(&conn, &["MAT-001", "MAT-002", "MAT-003"]).unwrap();

        let shared = Arc::new(Mutex::new(conn));
        let availability_repo = Arc::new(AvailabilityRepository::new(shared.clone()));
        let material_repo = Arc::new(MaterialRepository::new(shared.clone()));
        let campaign_repo = Arc::new(CampaignRepository::new(shared.clone()));
        let allocation_log_repo = Arc::new(AllocationLogRepository::new(shared.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(shared.clone()).unwrap());

        let api = AllocationApi::new(
            availability_repo.clone(),
            material_repo,
            campaign_repo.clone(),
            allocation_log_repo.clone(),
            config_manager.clone(),
        );
        let job = ReclamationJob::new(
            availability_repo,
            allocation_log_repo.clone(),
            campaign_repo.clone(),
            config_manager,
        );

        (
            temp_file,
            db_path,
            api,
            job,
            campaign_repo,
            allocation_log_repo,
        )
    }

    fn request_at(
        campaign_id: &str,
        material_ids: &[&str],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ReservationRequest {
        ReservationRequest {
            campaign_id: campaign_id.to_string(),
            material_ids: material_ids.iter().map(|s| s.to_string()).collect(),
            window_start: start,
            window_end: end,
            actor: "e2e_user".to_string(),
        }
    }

    // ==========================================
    // 完整业务闭环
    // ==========================================

    #[tokio::test]
    async fn test_full_allocation_lifecycle() {
        logging::init_test();

        let (_temp_file, _db_path, api, job, campaign_repo, log_repo) = setup_full_test_env();
        let now = Utc::now().naive_utc();
        let week_start = now;
        let week_end = now + Duration::days(7);

        // ===== 阶段1: 两个活动分别预订 =====
        println!("\n=== 阶段1: 预订 ===");

        let outcome = api
            .reserve(request_at(
                "C-SPRING",
                &["MAT-001", "MAT-002"],
                week_start,
                week_end,
            ))
            .await
            .expect("C-SPRING 预订应该成功");
        assert_eq!(outcome.assignments.len(), 2);

        api.reserve(request_at("C-GHOST", &["MAT-003"], week_start, week_end))
            .await
            .expect("C-GHOST 预订应该成功");

        println!("✓ 阶段1: 两个活动各自落位");

        // ===== 阶段2: C-SPRING 支付, C-GHOST 弃单 =====
        println!("\n=== 阶段2: 支付 ===");

        api.mark_campaign_paid("C-SPRING").unwrap();
        let snapshot = campaign_repo.find_by_id("C-SPRING").unwrap().unwrap();
        assert_eq!(snapshot.status, CampaignStatus::Active);

        println!("✓ 阶段2: C-SPRING 进入投放");

        // ===== 阶段3: 竞争活动被拒并转入候补 =====
        println!("\n=== 阶段3: 冲突与候补 ===");

        let rival_window = (now + Duration::days(1), now + Duration::days(9));
        let result = api
            .reserve(request_at(
                "C-RIVAL",
                &["MAT-001"],
                rival_window.0,
                rival_window.1,
            ))
            .await;
        match result {
            Err(ApiError::TimeWindowConflict {
                conflict_campaign_id,
                ..
            }) => assert_eq!(conflict_campaign_id, "C-SPRING"),
            other => panic!("重叠窗口应被拒绝, 实际: {:?}", other),
        }

        let queued = api
            .enqueue_pending("C-RIVAL", "MAT-001", rival_window.0, 10, "e2e_user")
            .await
            .unwrap();
        assert!(queued);

        println!("✓ 阶段3: C-RIVAL 被拒后进入候补队列");

        // ===== 阶段4: 汇总视图反映占用 =====
        println!("\n=== 阶段4: 汇总 ===");

        let summary = api.summarize_all().unwrap();
        assert_eq!(summary.total_materials, 3);
        assert_eq!(summary.occupied_slots, 3);
        assert_eq!(summary.pending_requests, 1);

        println!(
            "✓ 阶段4: 占用{}/{}槽位, 候补{}条",
            summary.occupied_slots, summary.total_slots, summary.pending_requests
        );

        // ===== 阶段5: 支付超时回收 C-GHOST =====
        println!("\n=== 阶段5: 支付超时回收 ===");

        let report = job.run_once_at(now + Duration::hours(25)).await.unwrap();
        assert_eq!(report.unpaid_campaigns_reclaimed, 1);
        assert_eq!(report.unpaid_slots_released, 1);
        assert_eq!(report.expired_slots_released, 0);

        assert_eq!(
            campaign_repo.find_by_id("C-GHOST").unwrap().unwrap().status,
            CampaignStatus::Rejected
        );
        assert_eq!(
            campaign_repo
                .find_by_id("C-SPRING")
                .unwrap()
                .unwrap()
                .status,
            CampaignStatus::Active,
            "已支付活动不受回收影响"
        );
        assert_eq!(
            api.get_availability("MAT-003").await.unwrap().occupied_slots,
            0
        );

        println!("✓ 阶段5: C-GHOST 被驳回, MAT-003 释放");

        // ===== 阶段6: 投放期满回收 C-SPRING =====
        println!("\n=== 阶段6: 期满回收 ===");

        let report = job.run_once_at(now + Duration::days(8)).await.unwrap();
        assert_eq!(report.expired_slots_released, 2);
        assert_eq!(report.pending_pruned, 1, "过保留期的候补一并清理");

        assert_eq!(
            campaign_repo
                .find_by_id("C-SPRING")
                .unwrap()
                .unwrap()
                .status,
            CampaignStatus::Ended
        );
        assert_eq!(
            api.get_availability("MAT-001").await.unwrap().occupied_slots,
            0
        );

        println!("✓ 阶段6: C-SPRING 结束, 槽位与候补回收完毕");

        // ===== 阶段7: 释放后的槽位可再次预订 =====
        println!("\n=== 阶段7: 重新预订 ===");

        let outcome = api
            .reserve(request_at(
                "C-RIVAL",
                &["MAT-001"],
                now + Duration::days(10),
                now + Duration::days(17),
            ))
            .await
            .expect("释放后的槽位应可再次预订");
        assert_eq!(outcome.assignments[0].slot_number, 1);

        println!("✓ 阶段7: C-RIVAL 成功落位");

        // ===== 阶段8: 日志覆盖全链路动作 =====
        println!("\n=== 阶段8: 日志审计 ===");

        let actions: Vec<String> = log_repo
            .list_recent(100)
            .unwrap()
            .into_iter()
            .map(|l| l.action_type)
            .collect();
        for expected in [
            "Reserve",
            "EnqueuePending",
            "Reclaim",
            "PrunePending",
        ] {
            assert!(
                actions.iter().any(|a| a == expected),
                "日志中应包含{}动作",
                expected
            );
        }

        println!("✓ 阶段8: 审计日志完整");
        println!("\n✅ 完整业务闭环测试通过");
    }

    // ==========================================
    // 维护周期闭环
    // ==========================================

    #[tokio::test]
    async fn test_maintenance_cycle() {
        let (_temp_file, _db_path, api, _job, _campaign_repo, _log_repo) = setup_full_test_env();
        let now = Utc::now().naive_utc();

        // 1. 已有预订的物料进入维护: 存量预订保留
        api.reserve(request_at(
            "C-KEEP",
            &["MAT-001"],
            now,
            now + Duration::days(7),
        ))
        .await
        .unwrap();

        let view = api
            .set_maintenance("MAT-001", true, "ops_user")
            .await
            .unwrap();
        assert_eq!(view.status, "MAINTENANCE");
        assert_eq!(view.occupied_slots, 1, "维护不清除存量预订");

        // 2. 维护期间拒绝新预订, 但释放照常可用
        let result = api
            .reserve(request_at(
                "C-NEW",
                &["MAT-001"],
                now + Duration::days(10),
                now + Duration::days(17),
            ))
            .await;
        assert!(matches!(
            result,
            Err(ApiError::MaterialUnderMaintenance { .. })
        ));

        let released = api.release("C-KEEP", None, "ops_user").await.unwrap();
        assert_eq!(released.released.len(), 1, "维护期间仍可释放");

        // 3. 解除维护后恢复接单
        let view = api
            .set_maintenance("MAT-001", false, "ops_user")
            .await
            .unwrap();
        assert_eq!(view.status, "AVAILABLE");

        api.reserve(request_at(
            "C-NEW",
            &["MAT-001"],
            now + Duration::days(10),
            now + Duration::days(17),
        ))
        .await
        .expect("解除维护后应恢复接单");

        println!("✅ 维护周期闭环测试通过");
    }
}
