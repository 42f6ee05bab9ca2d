use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../../../migrations/001_init.sql");

/// Spins up a PostgreSQL container and returns a migrated pool.
///
/// Keep the `ContainerAsync` alive for the whole test; dropping it stops the
/// container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "pricewatch_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string =
        format!("postgresql://postgres:postgres@{host}:{port}/pricewatch_test");

    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("Failed to apply schema");
    }

    (pool, container)
}

pub async fn insert_user(pool: &PgPool, email: &str, active: bool) -> Uuid {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO users (name, email, active) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email.split('@').next().unwrap_or(email))
    .bind(email)
    .bind(active)
    .fetch_one(pool)
    .await
    .expect("Failed to insert user");
    row.0
}

pub async fn insert_crawler(pool: &PgPool, name: &str) -> Uuid {
    let row: (Uuid,) = sqlx::query_as("INSERT INTO crawlers (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("Failed to insert crawler");
    row.0
}

pub async fn insert_product(
    pool: &PgPool,
    user_id: Uuid,
    crawler_id: Uuid,
    description: &str,
    max_price: i64,
    active: bool,
) -> Uuid {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO products (user_id, crawler_id, description, link, max_price, active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(crawler_id)
    .bind(description)
    .bind(format!("https://shop.test/{description}"))
    .bind(max_price)
    .bind(active)
    .fetch_one(pool)
    .await
    .expect("Failed to insert product");
    row.0
}
