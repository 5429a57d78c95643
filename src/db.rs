// ==========================================
// 车载广告档期系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为,避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout,减少并发写入时的偶发 busy 错误
// - 建库语句集中在 init_schema,库/测试/工具共用同一份 DDL
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout(毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化全部表结构与索引(幂等)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- ===== 档期记录 =====
        CREATE TABLE IF NOT EXISTS slot_availability (
            material_id         TEXT PRIMARY KEY,
            total_slots         INTEGER NOT NULL,
            status              TEXT NOT NULL DEFAULT 'AVAILABLE',
            reservations_json   TEXT NOT NULL DEFAULT '[]',
            pending_json        TEXT NOT NULL DEFAULT '[]',
            occupied_slots      INTEGER NOT NULL DEFAULT 0,
            pending_count       INTEGER NOT NULL DEFAULT 0,
            next_available_date TEXT,
            all_slots_free_date TEXT,
            revision            INTEGER NOT NULL DEFAULT 0,
            updated_at          TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_slot_availability_next_date
            ON slot_availability(occupied_slots, next_available_date);
        CREATE INDEX IF NOT EXISTS idx_slot_availability_pending
            ON slot_availability(pending_count);

        -- ===== 物料主数据 =====
        CREATE TABLE IF NOT EXISTS material_master (
            material_id   TEXT PRIMARY KEY,
            material_type TEXT NOT NULL,
            vehicle_class TEXT NOT NULL,
            category      TEXT NOT NULL,
            display_name  TEXT,
            vehicle_no    TEXT,
            is_active     INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        -- ===== 投放活动投影 =====
        CREATE TABLE IF NOT EXISTS campaign_projection (
            campaign_id       TEXT PRIMARY KEY,
            status            TEXT NOT NULL DEFAULT 'PENDING_PAYMENT',
            payment_status    TEXT NOT NULL DEFAULT 'UNPAID',
            window_start      TEXT NOT NULL,
            window_end        TEXT NOT NULL,
            material_ids_json TEXT NOT NULL DEFAULT '[]',
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_campaign_projection_unpaid
            ON campaign_projection(payment_status, status, created_at);

        -- ===== 分配日志 =====
        CREATE TABLE IF NOT EXISTS allocation_log (
            entry_id     TEXT PRIMARY KEY,
            action_type  TEXT NOT NULL,
            action_ts    TEXT NOT NULL,
            actor        TEXT NOT NULL,
            campaign_id  TEXT,
            material_id  TEXT,
            slot_number  INTEGER,
            window_start TEXT,
            window_end   TEXT,
            detail       TEXT,
            payload_json TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_allocation_log_campaign
            ON allocation_log(campaign_id);
        CREATE INDEX IF NOT EXISTS idx_allocation_log_material
            ON allocation_log(material_id);

        -- ===== 配置 =====
        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id    TEXT PRIMARY KEY,
            scope_type  TEXT NOT NULL,
            description TEXT
        );
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key      TEXT NOT NULL,
            value    TEXT,
            PRIMARY KEY (scope_id, key),
            FOREIGN KEY (scope_id) REFERENCES config_scope(scope_id)
        );
        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, description)
            VALUES ('global', 'GLOBAL', '全局配置');

        -- ===== 版本标记 =====
        CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        INSERT OR IGNORE INTO schema_version (version, applied_at)
            VALUES (1, datetime('now'));
        "#,
    )?;
    Ok(())
}

/// 读取 schema_version(若表不存在则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
