use chrono::{DateTime, Utc};
use pricewatch_core::error::AppError;
use pricewatch_core::models::{NewPriceSearchRecord, PriceSearchRecord};
use pricewatch_core::traits::HistoryStore;
use sqlx::PgPool;
use uuid::Uuid;

/// Append-only price observations in `product_search_history`.
#[derive(Clone)]
pub struct PriceHistoryRepository {
    pool: PgPool,
}

impl PriceHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: &NewPriceSearchRecord) -> Result<Uuid, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO product_search_history (user_id, product_id, price, original_price, discount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(record.user_id)
        .bind(record.product_id)
        .bind(record.price)
        .bind(record.original_price)
        .bind(&record.discount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    /// Every observation for a product, oldest first.
    pub async fn get_by_product(&self, product_id: Uuid) -> Result<Vec<PriceSearchRecord>, AppError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, user_id, product_id, price, original_price, discount, created_at
            FROM product_search_history
            WHERE product_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The `limit` most recent observations for a product, newest first.
    pub async fn get_recent(
        &self,
        product_id: Uuid,
        limit: usize,
    ) -> Result<Vec<PriceSearchRecord>, AppError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, user_id, product_id, price, original_price, discount, created_at
            FROM product_search_history
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(product_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    price: i64,
    original_price: Option<i64>,
    discount: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<HistoryRow> for PriceSearchRecord {
    fn from(row: HistoryRow) -> Self {
        PriceSearchRecord {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            price: row.price,
            original_price: row.original_price,
            discount: row.discount,
            created_at: row.created_at,
        }
    }
}

impl HistoryStore for PriceHistoryRepository {
    async fn insert(&self, record: &NewPriceSearchRecord) -> Result<Uuid, AppError> {
        PriceHistoryRepository::insert(self, record).await
    }

    async fn query_by_product(&self, product_id: Uuid) -> Result<Vec<PriceSearchRecord>, AppError> {
        self.get_by_product(product_id).await
    }
}
