use anyhow::Context;
use megamall_api::{
    db::{create_pool, run_migrations},
    ids::ObjectId,
    services::auth_service::hash_password,
};
use rust_decimal::Decimal;
use sqlx::PgPool;

const DEMO_EMAIL: &str = "demo@megamall.co.ke";
const DEMO_PASSWORD: &str = "demo1234";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let electronics = ensure_category(&pool, "Electronics", "electronics").await?;
    let groceries = ensure_category(&pool, "Groceries", "groceries").await?;
    seed_products(&pool, &electronics, &groceries).await?;
    seed_hire_items(&pool).await?;
    let user_id = ensure_demo_user(&pool).await?;

    println!("Seed completed. Demo user {DEMO_EMAIL} ({user_id})");
    Ok(())
}

async fn ensure_category(pool: &PgPool, name: &str, slug: &str) -> anyhow::Result<String> {
    let (id,): (String,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, slug)
        VALUES ($1, $2, $3)
        ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(ObjectId::new().to_string())
    .bind(name)
    .bind(slug)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_products(pool: &PgPool, electronics: &str, groceries: &str) -> anyhow::Result<()> {
    let products = [
        ("Smartphone X1", "6.5 inch display, 128GB", Decimal::new(2_499_900, 2), electronics),
        ("Bluetooth Speaker", "Portable, 12h battery", Decimal::new(450_000, 2), electronics),
        ("Basmati Rice 5kg", "Long grain", Decimal::new(95_050, 2), groceries),
        ("Cooking Oil 3L", "Vegetable oil", Decimal::new(72_000, 2), groceries),
    ];

    for (name, description, price, category_id) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, category_id)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(ObjectId::new().to_string())
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(category_id)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_hire_items(pool: &PgPool) -> anyhow::Result<()> {
    let items = [
        ("Tent 10x10", "Seats 20 guests", Decimal::new(50_000, 2), Decimal::new(300_000, 2)),
        ("Sound System", "Two speakers and a mixer", Decimal::new(150_000, 2), Decimal::new(800_000, 2)),
    ];

    for (name, details, per_hour, per_day) in items {
        sqlx::query(
            r#"
            INSERT INTO hire_items (id, name, details, hire_price_per_hour, hire_price_per_day)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM hire_items WHERE name = $2)
            "#,
        )
        .bind(ObjectId::new().to_string())
        .bind(name)
        .bind(details)
        .bind(per_hour)
        .bind(per_day)
        .execute(pool)
        .await?;
    }

    println!("Seeded hire items");
    Ok(())
}

async fn ensure_demo_user(pool: &PgPool) -> anyhow::Result<String> {
    let password_hash =
        hash_password(DEMO_PASSWORD).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (id,): (String,) = sqlx::query_as(
        r#"
        INSERT INTO guest_users (id, email, password_hash, first_name, last_name, phone)
        VALUES ($1, $2, $3, 'Demo', 'Buyer', '254708374149')
        ON CONFLICT (email) DO UPDATE SET password_hash = EXCLUDED.password_hash
        RETURNING id
        "#,
    )
    .bind(ObjectId::new().to_string())
    .bind(DEMO_EMAIL)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(id)
}
