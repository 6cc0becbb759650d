use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateListingParams, ImageDeltas, ListingFieldPatch, ListingsRepo, RepoError,
};
use crate::domain::entities::ListingRecord;
use crate::domain::types::{ListingStatus, ListingTier, ModerationState};

use super::PostgresRepositories;
use super::util::map_sqlx_error;

/// Shared column list; the category set rides along as a correlated array
/// so every read returns a complete record in one round trip.
const LISTING_COLUMNS: &str = "l.id, l.slug, l.title, l.description, l.price, l.images, \
     l.location, l.latitude, l.longitude, l.tier, l.status, l.moderation, l.views, \
     l.featured, l.expires_at, l.owner_id, l.created_at, l.updated_at, \
     ARRAY(SELECT lc.category_id FROM listing_categories lc WHERE lc.listing_id = l.id) AS category_ids";

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    slug: String,
    title: String,
    description: String,
    price: Decimal,
    images: Vec<String>,
    location: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    tier: ListingTier,
    status: ListingStatus,
    moderation: ModerationState,
    views: i64,
    featured: bool,
    expires_at: Option<OffsetDateTime>,
    owner_id: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    category_ids: Vec<Uuid>,
}

impl From<ListingRow> for ListingRecord {
    fn from(row: ListingRow) -> Self {
        ListingRecord {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            price: row.price,
            images: row.images,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            tier: row.tier,
            status: row.status,
            moderation: row.moderation,
            views: row.views,
            featured: row.featured,
            expires_at: row.expires_at,
            owner_id: row.owner_id,
            category_ids: row.category_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ListingsRepo for PostgresRepositories {
    async fn insert(&self, params: CreateListingParams) -> Result<ListingRecord, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO listings
                (id, slug, title, description, price, images, location, latitude, longitude, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(&params.slug)
        .bind(&params.title)
        .bind(&params.description)
        .bind(params.price)
        .bind(&params.images)
        .bind(&params.location)
        .bind(params.latitude)
        .bind(params.longitude)
        .bind(params.owner_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO listing_categories (listing_id, category_id) SELECT $1, unnest($2::uuid[])",
        )
        .bind(id)
        .bind(&params.category_ids)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let row: ListingRow = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ListingRecord>, RepoError> {
        let row: Option<ListingRow> = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: ListingFieldPatch,
    ) -> Result<ListingRecord, RepoError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("UPDATE listings AS l SET updated_at = now()");

        if let Some(title) = patch.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = patch.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(price) = patch.price {
            builder.push(", price = ").push_bind(price);
        }
        if let Some(location) = patch.location {
            builder.push(", location = ").push_bind(location);
        }
        if let Some(latitude) = patch.latitude {
            builder.push(", latitude = ").push_bind(latitude);
        }
        if let Some(longitude) = patch.longitude {
            builder.push(", longitude = ").push_bind(longitude);
        }
        if let Some(expires_at) = patch.expires_at {
            builder.push(", expires_at = ").push_bind(expires_at);
        }

        builder.push(" WHERE l.id = ").push_bind(id);
        builder.push(format!(" RETURNING {LISTING_COLUMNS}"));

        let row: ListingRow = builder
            .build_query_as::<ListingRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn apply_image_deltas(
        &self,
        id: Uuid,
        deltas: ImageDeltas,
    ) -> Result<ListingRecord, RepoError> {
        // Single-statement read-modify-write: appends keep first-seen order,
        // removals filter, and the row lock serializes concurrent deltas.
        let row: ListingRow = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            UPDATE listings AS l
            SET images = (
                    SELECT COALESCE(array_agg(img ORDER BY first_ord), '{{}}')
                    FROM (
                        SELECT img, min(ord) AS first_ord
                        FROM unnest(l.images || $2::text[]) WITH ORDINALITY AS t(img, ord)
                        WHERE img <> ALL($3::text[])
                        GROUP BY img
                    ) merged
                ),
                updated_at = now()
            WHERE l.id = $1
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&deltas.add)
        .bind(&deltas.remove)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn replace_categories(
        &self,
        id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<ListingRecord, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM listing_categories WHERE listing_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO listing_categories (listing_id, category_id) SELECT $1, unnest($2::uuid[])",
        )
        .bind(id)
        .bind(&category_ids)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let row: ListingRow = sqlx::query_as::<_, ListingRow>(&format!(
            "UPDATE listings AS l SET updated_at = now() WHERE l.id = $1 RETURNING {LISTING_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn increment_views(&self, id: Uuid) -> Result<ListingRecord, RepoError> {
        let row: ListingRow = sqlx::query_as::<_, ListingRow>(&format!(
            "UPDATE listings AS l SET views = views + 1 WHERE l.id = $1 RETURNING {LISTING_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ListingStatus],
        to: ListingStatus,
    ) -> Result<Option<ListingRecord>, RepoError> {
        let row: Option<ListingRow> = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            UPDATE listings AS l
            SET status = $2, updated_at = now()
            WHERE l.id = $1 AND l.status = ANY($3)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to)
        .bind(from)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn set_tier(
        &self,
        id: Uuid,
        tier: ListingTier,
        featured: bool,
    ) -> Result<ListingRecord, RepoError> {
        let row: ListingRow = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            UPDATE listings AS l
            SET tier = $2, featured = $3, updated_at = now()
            WHERE l.id = $1
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tier)
        .bind(featured)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn set_moderation(
        &self,
        id: Uuid,
        state: ModerationState,
    ) -> Result<ListingRecord, RepoError> {
        let row: ListingRow = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            UPDATE listings AS l
            SET moderation = $2, updated_at = now()
            WHERE l.id = $1
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(state)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<ListingRecord>, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let row: Option<ListingRow> = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if row.is_some() {
            sqlx::query("DELETE FROM listing_categories WHERE listing_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            sqlx::query("DELETE FROM listings WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn active_in_categories(
        &self,
        category_ids: &[Uuid],
    ) -> Result<Vec<ListingRecord>, RepoError> {
        let rows: Vec<ListingRow> = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM listings l
            WHERE l.status = 'active'::listing_status
              AND EXISTS (
                  SELECT 1 FROM listing_categories lc
                  WHERE lc.listing_id = l.id AND lc.category_id = ANY($1)
              )
            ORDER BY l.featured DESC, l.created_at DESC
            "#
        ))
        .bind(category_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
