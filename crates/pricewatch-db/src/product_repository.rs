use pricewatch_core::error::AppError;
use pricewatch_core::models::Product;
use pricewatch_core::traits::ProductSource;
use sqlx::PgPool;
use uuid::Uuid;

/// Reads the products due for crawling.
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active products of active users, oldest first, with their crawler's name.
    pub async fn get_active_products(&self) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.user_id, p.description, p.link, p.max_price, c.name AS crawler_name, p.active
            FROM products p
            JOIN users u ON u.id = p.user_id
            JOIN crawlers c ON c.id = p.crawler_id
            WHERE p.active AND u.active
            ORDER BY p.created_at, p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.user_id, p.description, p.link, p.max_price, c.name AS crawler_name, p.active
            FROM products p
            JOIN crawlers c ON c.id = p.crawler_id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    user_id: Uuid,
    description: String,
    link: String,
    max_price: i64,
    crawler_name: String,
    active: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            user_id: row.user_id,
            description: row.description,
            link: row.link,
            max_price: row.max_price,
            crawler_name: row.crawler_name,
            active: row.active,
        }
    }
}

impl ProductSource for ProductRepository {
    async fn get_crawlable_products(&self) -> Result<Vec<Product>, AppError> {
        self.get_active_products().await
    }
}
