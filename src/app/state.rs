// ==========================================
// 车载广告档期系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::AllocationApi;
use crate::config::ConfigManager;
use crate::job::ReclamationJob;
use crate::repository::allocation_log_repo::AllocationLogRepository;
use crate::repository::availability_repo::AvailabilityRepository;
use crate::repository::campaign_repo::CampaignRepository;
use crate::repository::material_repo::MaterialRepository;

/// 应用状态
///
/// 包含API实例、回收任务与共享仓储
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 档期分配API
    pub allocation_api: Arc<AllocationApi<ConfigManager>>,

    /// 档期回收任务
    pub reclamation_job: Arc<ReclamationJob<ConfigManager, CampaignRepository>>,

    /// 物料主数据仓储（用于在册登记）
    pub material_repo: Arc<MaterialRepository>,

    /// 分配日志仓储（用于审计追踪）
    pub allocation_log_repo: Arc<AllocationLogRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享数据库连接并初始化表结构
    /// 2. 初始化所有Repository
    /// 3. 创建API实例与回收任务
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("无法初始化表结构: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let availability_repo = Arc::new(AvailabilityRepository::new(conn.clone()));
        let material_repo = Arc::new(MaterialRepository::new(conn.clone()));
        let campaign_repo = Arc::new(CampaignRepository::new(conn.clone()));
        let allocation_log_repo = Arc::new(AllocationLogRepository::new(conn.clone()));

        // 配置管理器（复用共享连接）
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层与回收任务
        // ==========================================
        let allocation_api = Arc::new(AllocationApi::new(
            availability_repo.clone(),
            material_repo.clone(),
            campaign_repo.clone(),
            allocation_log_repo.clone(),
            config_manager.clone(),
        ));

        let reclamation_job = Arc::new(ReclamationJob::new(
            availability_repo,
            allocation_log_repo.clone(),
            campaign_repo,
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            allocation_api,
            reclamation_job,
            material_repo,
            allocation_log_repo,
            config_manager,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 开发环境: 用户数据目录/fleet-ad-slots-dev/fleet_ad_slots.db
/// - 生产环境: 用户数据目录/fleet-ad-slots/fleet_ad_slots.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("FLEET_AD_SLOTS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 先给一个默认回退值，后续如果能拿到 data_dir 再覆盖
    let mut path = PathBuf::from("./fleet_ad_slots.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("fleet-ad-slots-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("fleet-ad-slots");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("fleet_ad_slots.db");
    }

    path.to_string_lossy().to_string()
}
