use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use game_key_store::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
};
use uuid::Uuid;

const PLATFORMS: [&str; 4] = ["Steam", "Epic Games", "PlayStation", "Xbox"];
const GENRES: [&str; 5] = ["Action", "RPG", "Strategy", "Indie", "Simulation"];

// (name, description, price VND, discount %, platforms, genres)
type DemoProduct = (&'static str, &'static str, i64, i32, &'static [&'static str], &'static [&'static str]);

const PRODUCTS: [DemoProduct; 4] = [
    (
        "Elden Ring",
        "Open-world action RPG",
        990_000,
        10,
        &["Steam", "PlayStation", "Xbox"],
        &["Action", "RPG"],
    ),
    (
        "Hades",
        "Rogue-like dungeon crawler",
        260_000,
        0,
        &["Steam", "Epic Games"],
        &["Action", "Indie"],
    ),
    (
        "Civilization VI",
        "Turn-based strategy",
        599_000,
        50,
        &["Steam", "Epic Games"],
        &["Strategy"],
    ),
    (
        "Stardew Valley",
        "Farming life simulation",
        165_000,
        0,
        &["Steam"],
        &["Simulation", "Indie"],
    ),
];

const KEYS_PER_PLATFORM: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@example.com", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "player", "user@example.com", "user123", "user").await?;

    for name in PLATFORMS {
        ensure_named(&pool, "platforms", name).await?;
    }
    for name in GENRES {
        ensure_named(&pool, "genres", name).await?;
    }
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role, is_verified)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, is_verified = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

/// Upserts a row into a `(id, name)` lookup table and returns its id.
async fn ensure_named(pool: &DbPool, table: &str, name: &str) -> anyhow::Result<Uuid> {
    let sql = format!(
        "INSERT INTO {table} (id, name) VALUES ($1, $2) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id"
    );
    let (id,): (Uuid,) = sqlx::query_as(&sql)
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

async fn seed_products(pool: &DbPool) -> anyhow::Result<()> {
    for (name, description, price, discount, platforms, genres) in PRODUCTS {
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            continue;
        }

        let product_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, discount_percent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product_id)
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(discount)
        .execute(pool)
        .await?;

        for genre in genres {
            let genre_id = ensure_named(pool, "genres", genre).await?;
            sqlx::query(
                "INSERT INTO product_genres (product_id, genre_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(product_id)
            .bind(genre_id)
            .execute(pool)
            .await?;
        }

        for platform in platforms {
            let platform_id = ensure_named(pool, "platforms", platform).await?;
            sqlx::query(
                "INSERT INTO product_platforms (product_id, platform_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(product_id)
            .bind(platform_id)
            .execute(pool)
            .await?;

            for _ in 0..KEYS_PER_PLATFORM {
                sqlx::query(
                    "INSERT INTO inventory (id, product_id, platform_id, key_code) VALUES ($1, $2, $3, $4)",
                )
                .bind(Uuid::new_v4())
                .bind(product_id)
                .bind(platform_id)
                .bind(demo_key())
                .execute(pool)
                .await?;
            }
        }

        println!("Seeded {name}");
    }

    Ok(())
}

/// `XXXXX-XXXXX-XXXXX` from a fresh UUID.
fn demo_key() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}-{}-{}", &raw[0..5], &raw[5..10], &raw[10..15])
}
