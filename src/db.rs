use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use tracing::info;

/// Opens (and creates if missing) the SQLite database behind `url`.
pub async fn connect_pool(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("Creating SQLite database at {}", url);
        Sqlite::create_database(url).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                // Concurrent writers wait for the lock instead of failing with SQLITE_BUSY
                sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await?;
                let _ = sqlx::query("PRAGMA temp_store=MEMORY;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect(url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            phone TEXT NULL,
            role TEXT NOT NULL CHECK (role IN ('renter','owner','admin')),
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS equipment (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            location TEXT NOT NULL,
            price_per_day REAL NOT NULL,
            image_url TEXT NULL,
            available INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(owner_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    // hold_expires_at is epoch millis so the sweep compares integers, not strings
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS bookings (
            id TEXT PRIMARY KEY,
            equipment_id TEXT NOT NULL,
            renter_id TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            status TEXT NOT NULL,
            hold_expires_at INTEGER NOT NULL,
            total_price REAL NOT NULL,
            payment_reference TEXT NULL,
            notes TEXT NULL,
            status_reason TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(equipment_id) REFERENCES equipment(id) ON DELETE CASCADE,
            FOREIGN KEY(renter_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_equipment_owner", "CREATE INDEX IF NOT EXISTS idx_equipment_owner ON equipment(owner_id)"),
        ("idx_equipment_category", "CREATE INDEX IF NOT EXISTS idx_equipment_category ON equipment(category)"),
        ("idx_equipment_location", "CREATE INDEX IF NOT EXISTS idx_equipment_location ON equipment(location)"),
        (
            "idx_bookings_equipment_dates",
            "CREATE INDEX IF NOT EXISTS idx_bookings_equipment_dates ON bookings(equipment_id, start_date, end_date)",
        ),
        (
            "idx_bookings_status_expiry",
            "CREATE INDEX IF NOT EXISTS idx_bookings_status_expiry ON bookings(status, hold_expires_at)",
        ),
        ("idx_bookings_renter", "CREATE INDEX IF NOT EXISTS idx_bookings_renter ON bookings(renter_id)"),
        ("idx_bookings_owner", "CREATE INDEX IF NOT EXISTS idx_bookings_owner ON bookings(owner_id)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}
