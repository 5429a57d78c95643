// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

use chrono::NaiveDateTime;
use fleet_ad_slots::db;
use rusqlite::Connection;
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接(应用与生产一致的 PRAGMA)
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(db::open_sqlite_connection(db_path)?)
}

/// 解析测试用时间字符串, 格式 "%Y-%m-%d %H:%M:%S"
pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// 插入在册测试物料 (默认资格维度 SCREEN/BUS/RETAIL)
pub fn insert_test_material(conn: &Connection, material_id: &str) -> Result<(), Box<dyn Error>> {
    insert_test_material_with_dims(conn, material_id, "SCREEN", "BUS", "RETAIL")
}

/// 插入指定资格维度的在册测试物料
pub fn insert_test_material_with_dims(
    conn: &Connection,
    material_id: &str,
    material_type: &str,
    vehicle_class: &str,
    category: &str,
) -> Result<(), Box<dyn Error>> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO material_master (
            material_id, material_type, vehicle_class, category,
            display_name, vehicle_no, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, NULL, NULL, 1, datetime('now'), datetime('now'))
        "#,
        rusqlite::params![material_id, material_type, vehicle_class, category],
    )?;
    Ok(())
}

/// 批量插入在册测试物料
pub fn insert_test_materials(
    conn: &Connection,
    material_ids: &[&str],
) -> Result<(), Box<dyn Error>> {
    for id in material_ids {
        insert_test_material(conn, id)?;
    }
    Ok(())
}

/// 插入测试配置数据
///
/// 测试统一使用 3 个槽位的小容量,方便构造满槽场景
pub fn insert_test_config(conn: &Connection) -> Result<(), Box<dyn Error>> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO config_kv (scope_id, key, value) VALUES
        ('global', 'default_total_slots', '3'),
        ('global', 'max_cas_retries', '5'),
        ('global', 'payment_timeout_hours', '24'),
        ('global', 'sweep_interval_secs', '3600'),
        ('global', 'pending_retention_days', '7'),
        ('global', 'max_window_days', '365')
        "#,
        [],
    )?;
    Ok(())
}

/// 覆写单个 global 配置项
pub fn set_test_config(conn: &Connection, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    conn.execute(
        r#"
        INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
        ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2
        "#,
        rusqlite::params![key, value],
    )?;
    Ok(())
}
