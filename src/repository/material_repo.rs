// ==========================================
// 车载广告档期系统 - 物料主数据仓储
// ==========================================
// 职责: 管理 material_master 表的 CRUD 操作
// 红线: Repository 不含业务逻辑,物料资格过滤在引擎/接口层做
// ==========================================

use crate::domain::material::MaterialMaster;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// MaterialRepository - 物料主数据仓储
// ==========================================
pub struct MaterialRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialRepository {
    /// 创建新的 MaterialRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入或更新物料主数据 (INSERT OR REPLACE 实现 upsert 语义)
    pub fn upsert(&self, material: &MaterialMaster) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT OR REPLACE INTO material_master (
                material_id, material_type, vehicle_class, category,
                display_name, vehicle_no, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                material.material_id,
                material.material_type,
                material.vehicle_class,
                material.category,
                material.display_name,
                material.vehicle_no,
                material.is_active,
                material.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                material.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(())
    }

    /// 批量写入物料主数据,使用事务确保原子性
    ///
    /// # 返回
    /// - Ok(usize): 成功写入的记录数
    pub fn batch_upsert(&self, materials: &[MaterialMaster]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for material in materials {
            tx.execute(
                r#"INSERT OR REPLACE INTO material_master (
                    material_id, material_type, vehicle_class, category,
                    display_name, vehicle_no, is_active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                params![
                    material.material_id,
                    material.material_type,
                    material.vehicle_class,
                    material.category,
                    material.display_name,
                    material.vehicle_no,
                    material.is_active,
                    material.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    material.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    /// 按 material_id 查询物料主数据
    pub fn find_by_id(&self, material_id: &str) -> RepositoryResult<Option<MaterialMaster>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT material_id, material_type, vehicle_class, category,
                      display_name, vehicle_no, is_active, created_at, updated_at
               FROM material_master
               WHERE material_id = ?1"#,
            params![material_id],
            |row| self.map_row(row),
        ) {
            Ok(material) => Ok(Some(material)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 批量检查物料是否在册
    ///
    /// # 返回
    /// - Ok(Vec<String>): 已在册的物料ID列表
    pub fn batch_check_exists(&self, material_ids: &[String]) -> RepositoryResult<Vec<String>> {
        if material_ids.is_empty() {
            return Ok(vec![]);
        }

        let conn = self.get_conn()?;
        let placeholders = material_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT material_id FROM material_master WHERE material_id IN ({})",
            placeholders
        );

        let mut stmt = conn.prepare(&query)?;
        let params_vec: Vec<&dyn rusqlite::ToSql> = material_ids
            .iter()
            .map(|id| id as &dyn rusqlite::ToSql)
            .collect();

        let existing = stmt
            .query_map(params_vec.as_slice(), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(existing)
    }

    /// 查询全部在册物料(按物料ID排序)
    pub fn list_active(&self) -> RepositoryResult<Vec<MaterialMaster>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT material_id, material_type, vehicle_class, category,
                      display_name, vehicle_no, is_active, created_at, updated_at
               FROM material_master
               WHERE is_active = 1
               ORDER BY material_id"#,
        )?;

        let materials = stmt
            .query_map([], |row| self.map_row(row))?
            .collect::<Result<Vec<MaterialMaster>, _>>()?;

        Ok(materials)
    }

    /// 映射数据库行到MaterialMaster对象
    fn map_row(&self, row: &rusqlite::Row) -> rusqlite::Result<MaterialMaster> {
        Ok(MaterialMaster {
            material_id: row.get(0)?,
            material_type: row.get(1)?,
            vehicle_class: row.get(2)?,
            category: row.get(3)?,
            display_name: row.get(4)?,
            vehicle_no: row.get(5)?,
            is_active: row.get(6)?,
            created_at: NaiveDateTime::parse_from_str(
                &row.get::<_, String>(7)?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
            })?,
            updated_at: NaiveDateTime::parse_from_str(
                &row.get::<_, String>(8)?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
            })?,
        })
    }
}
