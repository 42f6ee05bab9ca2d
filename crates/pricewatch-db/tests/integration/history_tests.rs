use pricewatch_core::models::NewPriceSearchRecord;
use pricewatch_core::traits::HistoryStore;
use pricewatch_db::PriceHistoryRepository;
use uuid::Uuid;

use crate::integration::common::{insert_crawler, insert_product, insert_user, setup_test_db};

async fn seeded_product(pool: &sqlx::PgPool) -> (Uuid, Uuid) {
    let crawler = insert_crawler(pool, "amazon").await;
    let user = insert_user(pool, "ana@example.com", true).await;
    let product = insert_product(pool, user, crawler, "kindle", 1000, true).await;
    (user, product)
}

fn observation(user_id: Uuid, product_id: Uuid, price: i64) -> NewPriceSearchRecord {
    NewPriceSearchRecord {
        user_id,
        product_id,
        price,
        original_price: None,
        discount: None,
    }
}

#[tokio::test]
async fn insert_and_query_keeps_absent_fields_null() {
    let (pool, _container) = setup_test_db().await;
    let (user, product) = seeded_product(&pool).await;
    let repo = PriceHistoryRepository::new(pool);

    let mut record = observation(user, product, 999);
    record.original_price = Some(1500);
    let id = HistoryStore::insert(&repo, &record).await.unwrap();
    assert!(!id.is_nil());

    let history = repo.query_by_product(product).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, id);
    assert_eq!(history[0].price, 999);
    assert_eq!(history[0].original_price, Some(1500));
    assert_eq!(history[0].discount, None);
}

#[tokio::test]
async fn history_is_oldest_first_and_scoped_to_product() {
    let (pool, _container) = setup_test_db().await;
    let (user, product) = seeded_product(&pool).await;
    let crawler = insert_crawler(&pool, "mercado-livre").await;
    let other = insert_product(&pool, user, crawler, "headphones", 1000, true).await;
    let repo = PriceHistoryRepository::new(pool);

    for price in [100000, 100100, 999] {
        repo.insert(&observation(user, product, price)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    repo.insert(&observation(user, other, 42)).await.unwrap();

    let prices: Vec<i64> = repo
        .query_by_product(product)
        .await
        .unwrap()
        .iter()
        .map(|r| r.price)
        .collect();
    assert_eq!(prices, vec![100000, 100100, 999]);

    let recent: Vec<i64> = repo
        .get_recent(product, 2)
        .await
        .unwrap()
        .iter()
        .map(|r| r.price)
        .collect();
    assert_eq!(recent, vec![999, 100100]);
}

#[tokio::test]
async fn non_positive_price_is_rejected_by_the_table() {
    let (pool, _container) = setup_test_db().await;
    let (user, product) = seeded_product(&pool).await;
    let repo = PriceHistoryRepository::new(pool);

    let err = repo.insert(&observation(user, product, 0)).await.unwrap_err();
    assert!(matches!(err, pricewatch_core::AppError::DatabaseError(_)));
}

#[tokio::test]
async fn unknown_product_id_yields_empty_history() {
    let (pool, _container) = setup_test_db().await;
    let repo = PriceHistoryRepository::new(pool);

    let history = repo.query_by_product(Uuid::new_v4()).await.unwrap();
    assert!(history.is_empty());
}
