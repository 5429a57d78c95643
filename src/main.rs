// ==========================================
// 车载广告档期系统 - 服务主入口
// ==========================================
// 技术栈: Rust + SQLite + Tokio
// 职责: 初始化应用状态,驻留运行档期回收任务
// ==========================================

use fleet_ad_slots::app::{get_default_db_path, AppState};
use fleet_ad_slots::logging;

#[tokio::main]
async fn main() {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("车载广告档期系统 - 档期分配引擎");
    tracing::info!("系统版本: {}", fleet_ad_slots::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState
    tracing::info!("正在初始化AppState...");
    let app_state = AppState::new(db_path).expect("无法初始化AppState");
    tracing::info!("AppState初始化成功");

    // 驻留运行回收任务,收到 Ctrl-C 退出
    let job = app_state.reclamation_job.clone();
    let sweeper = tokio::spawn(async move { job.run().await });

    tokio::select! {
        _ = sweeper => {
            tracing::error!("回收任务意外退出");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("收到退出信号,停止服务");
        }
    }
}
