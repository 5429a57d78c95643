// Small ops utility: run a single reclamation sweep against the given database.
//
// Usage:
//   cargo run --bin run_reclamation_sweep [-- <db_path>]
//
// Without arguments the default application database is used. The sweep runs
// one pass (unpaid timeout -> expired windows -> stale pending) and prints
// the resulting report.

use fleet_ad_slots::app::{get_default_db_path, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fleet_ad_slots::logging::init();

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    println!("db_path={}", db_path);

    let app_state = AppState::new(db_path)?;
    let report = app_state.reclamation_job.run_once().await?;

    println!("unpaid_campaigns_reclaimed={}", report.unpaid_campaigns_reclaimed);
    println!("unpaid_slots_released={}", report.unpaid_slots_released);
    println!("expired_slots_released={}", report.expired_slots_released);
    println!("pending_pruned={}", report.pending_pruned);
    println!("failures={}", report.failures);
    Ok(())
}
