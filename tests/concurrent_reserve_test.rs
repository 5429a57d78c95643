// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证乐观并发下的槽位分配正确性
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod concurrent_reserve_test {
    use fleet_ad_slots::api::{AllocationApi, ApiError, ReservationRequest};
    use fleet_ad_slots::config::ConfigManager;
    use fleet_ad_slots::repository::{
        AllocationLogRepository, AvailabilityRepository, CampaignRepository, MaterialRepository,
    };
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{
        create_test_db, dt, insert_test_config, insert_test_materials, open_test_connection,
        set_test_config,
    };

    // ==========================================
    // 测试辅助函数
    // ==========================================

    /// 创建测试环境(共享同一底层连接, 模拟生产部署形态)
    fn setup_test_env(
        default_slots: &str,
    ) -> (
        NamedTempFile,
        String,
        Arc<AllocationApi<ConfigManager>>,
        Arc<AvailabilityRepository>,
    ) {
        let (temp_file, db_path) = create_test_db().unwrap();

        let conn = open_test_connection(&db_path).unwrap();
        insert_test_config(&conn).unwrap();
        set_test_config(&conn, "default_total_slots", default_slots).unwrap();
        insert_test_materials(&conn, &["MAT-001", "MAT-002", "MAT-003", "MAT-004"]).unwrap();

        let shared = Arc::new(Mutex::new(conn));
        let availability_repo = Arc::new(AvailabilityRepository::new(shared.clone()));
        let material_repo = Arc::new(MaterialRepository::new(shared.clone()));
        let campaign_repo = Arc::new(CampaignRepository::new(shared.clone()));
        let allocation_log_repo = Arc::new(AllocationLogRepository::new(shared.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(shared.clone()).unwrap());

        let api = Arc::new(AllocationApi::new(
            availability_repo.clone(),
            material_repo,
            campaign_repo,
            allocation_log_repo,
            config_manager,
        ));

        (temp_file, db_path, api, availability_repo)
    }

    fn request(campaign_id: &str, material_id: &str) -> ReservationRequest {
        ReservationRequest {
            campaign_id: campaign_id.to_string(),
            material_ids: vec![material_id.to_string()],
            window_start: dt("2026-03-01 00:00:00"),
            window_end: dt("2026-03-08 00:00:00"),
            actor: "test_user".to_string(),
        }
    }

    // ==========================================
    // 测试1: 多任务争抢最后一个槽位
    // ==========================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserve_single_slot() {
        // 每个物料只有1个槽位, 4个活动争抢同一窗口
        let (_temp_file, _db_path, api, availability_repo) = setup_test_env("1");

        let task_count = 4;
        let mut handles = vec![];
        for i in 0..task_count {
            let api_clone = api.clone();
            handles.push(tokio::spawn(async move {
                api_clone
                    .reserve(request(&format!("C-{:03}", i), "MAT-001"))
                    .await
            }));
        }

        let mut success_count = 0;
        let mut rejection_count = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(outcome) => {
                    assert_eq!(outcome.assignments[0].slot_number, 1);
                    success_count += 1;
                }
                Err(e) => {
                    assert!(
                        e.is_business_rejection(),
                        "落败方应收到业务拒绝而非技术错误: {:?}",
                        e
                    );
                    rejection_count += 1;
                }
            }
        }

        // 只有一个活动抢到槽位, 其余收到满槽/冲突拒绝
        assert_eq!(success_count, 1, "应该只有1个活动预订成功");
        assert_eq!(rejection_count, task_count - 1);

        let record = availability_repo.find_by_id("MAT-001").unwrap().unwrap();
        assert_eq!(record.occupied_slots, 1);
        assert_eq!(record.reservations.len(), 1);

        println!(
            "✅ 单槽位争抢测试通过: {}个任务中1个成功,{}个被拒",
            task_count, rejection_count
        );
    }

    // ==========================================
    // 测试2: 多任务各预订不同物料(无竞争)
    // ==========================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserve_distinct_materials() {
        let (_temp_file, _db_path, api, _availability_repo) = setup_test_env("3");

        let materials = ["MAT-001", "MAT-002", "MAT-003", "MAT-004"];
        let mut handles = vec![];
        for (i, material) in materials.iter().enumerate() {
            let api_clone = api.clone();
            let material = material.to_string();
            handles.push(tokio::spawn(async move {
                api_clone
                    .reserve(request(&format!("C-{:03}", i), &material))
                    .await
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap().expect("无竞争预订应全部成功");
            assert_eq!(outcome.assignments.len(), 1);
        }

        println!("✅ 多物料并发预订测试通过: {}个任务全部成功", materials.len());
    }

    // ==========================================
    // 测试3: 并发惰性创建只产生一条档期记录
    // ==========================================

    #[test]
    fn test_concurrent_get_or_create_single_row() {
        let (_temp_file, _db_path, _api, availability_repo) = setup_test_env("3");

        let thread_count = 8;
        let mut handles = vec![];
        for _ in 0..thread_count {
            let repo_clone = availability_repo.clone();
            handles.push(thread::spawn(move || repo_clone.get_or_create("MAT-001", 3)));
        }

        for handle in handles {
            let record = handle.join().unwrap().expect("惰性创建不应失败");
            assert_eq!(record.material_id, "MAT-001");
            assert_eq!(record.total_slots, 3);
        }

        let all = availability_repo.list_all().unwrap();
        assert_eq!(all.len(), 1, "同一物料并发创建只应产生一条记录");
        assert_eq!(all[0].revision, 0);

        println!("✅ 并发惰性创建测试通过: {}个线程共享一条记录", thread_count);
    }

    // ==========================================
    // 测试4: 争抢中的落败方拿到确定性拒绝类型
    // ==========================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_loser_gets_deterministic_rejection() {
        let (_temp_file, _db_path, api, _availability_repo) = setup_test_env("1");

        // 先占住唯一槽位
        api.reserve(request("C-FIRST", "MAT-002")).await.unwrap();

        // 后来者在同一窗口上的请求必然被拒, 且拒绝类型可判别
        let result = api.reserve(request("C-SECOND", "MAT-002")).await;
        match result {
            Err(ApiError::CapacityExceeded { material_id }) => {
                assert_eq!(material_id, "MAT-002");
            }
            Err(ApiError::TimeWindowConflict { .. }) => {}
            other => panic!("应该收到满槽或时间窗冲突拒绝, 实际: {:?}", other),
        }

        println!("✅ 确定性拒绝类型测试通过");
    }
}
