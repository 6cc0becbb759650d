use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CategoriesRepo, CreateCategoryParams, RepoError};
use crate::domain::entities::CategoryRecord;

use super::PostgresRepositories;
use super::util::map_sqlx_error;

const CATEGORY_COLUMNS: &str =
    "id, slug, name, description, icon, parent_id, active, sort_order, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    slug: String,
    name: String,
    description: Option<String>,
    icon: Option<String>,
    parent_id: Option<Uuid>,
    active: bool,
    sort_order: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        CategoryRecord {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            icon: row.icon,
            parent_id: row.parent_id,
            active: row.active,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn insert(&self, params: CreateCategoryParams) -> Result<CategoryRecord, RepoError> {
        let row: CategoryRow = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            INSERT INTO categories (id, slug, name, description, icon, parent_id, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.slug)
        .bind(params.name)
        .bind(params.description)
        .bind(params.icon)
        .bind(params.parent_id)
        .bind(params.sort_order)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let row: Option<CategoryRow> = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows: Vec<CategoryRow> = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn snapshot(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows: Vec<CategoryRow> = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order, name"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_parent(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<CategoryRecord, RepoError> {
        let row: CategoryRow = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            UPDATE categories
            SET parent_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(parent_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<CategoryRecord, RepoError> {
        let row: CategoryRow = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            UPDATE categories
            SET active = $2, updated_at = now()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(active)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
