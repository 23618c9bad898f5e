use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    docstore::{DocStore, admins::AdminDoc, products::ProductDoc},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let docs = DocStore::open(&config.docstore_path).await?;

    let admin_email = ensure_admin(&docs, "admin@example.com", "admin123").await?;
    let user_id = ensure_customer(&pool, "Demo Customer", "user@example.com", "user123").await?;
    seed_products(&docs).await?;

    println!("Seed completed. Admin: {admin_email}, Customer ID: {user_id}");
    Ok(())
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();
    Ok(hash)
}

async fn ensure_admin(docs: &DocStore, email: &str, password: &str) -> anyhow::Result<String> {
    let repo = docs.admins();
    if repo.find_by_email(email).await?.is_some() {
        println!("Admin {email} already present");
        return Ok(email.to_string());
    }

    let doc = AdminDoc {
        id: None,
        name: "Store Admin".to_string(),
        email: email.to_string(),
        password_hash: hash_password(password)?,
        role: "admin".to_string(),
        permissions: vec![
            "products:write".to_string(),
            "orders:read".to_string(),
            "reports:read".to_string(),
        ],
        is_active: true,
        last_login: None,
        created_at: Utc::now(),
    };
    repo.create(doc).await?;
    println!("Created admin {email}");
    Ok(email.to_string())
}

async fn ensure_customer(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, 'customer')
        ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    println!("Ensured customer {email}");
    Ok(row.0)
}

async fn seed_products(docs: &DocStore) -> anyhow::Result<()> {
    let products = [
        (
            "RSTK-HOODIE-01",
            "Axum Hoodie",
            59.99,
            "apparel",
            50,
            Some("/images/axum-hoodie.png"),
            "Warm hoodie for Rustaceans",
        ),
        (
            "RSTK-TEE-01",
            "Borrow Checker Tee",
            24.99,
            "apparel",
            80,
            None,
            "Guaranteed to outlive its references",
        ),
        (
            "RSTK-MUG-01",
            "Ferris Mug",
            14.50,
            "drinkware",
            100,
            None,
            "Coffee tastes better with Ferris",
        ),
        (
            "RSTK-STICKER-01",
            "Rust Sticker Pack",
            4.99,
            "accessories",
            200,
            None,
            "Decorate your laptop",
        ),
        (
            "RSTK-EBOOK-01",
            "E-book: Async Rust",
            24.00,
            "books",
            75,
            None,
            "Learn async Rust patterns",
        ),
    ];

    let repo = docs.products();
    for (sku, name, price, category, stock, image, description) in products {
        if repo.find_by_sku(sku).await?.is_some() {
            continue;
        }
        let now = Utc::now();
        let doc = ProductDoc {
            id: None,
            sku: sku.to_string(),
            name: name.to_string(),
            price,
            category: category.to_string(),
            stock,
            image: image.map(str::to_string),
            description: Some(description.to_string()),
            created_at: now,
            updated_at: now,
        };
        repo.create(doc).await?;
    }

    println!("Seeded products");
    Ok(())
}
