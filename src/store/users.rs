use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{decode_error, parse_uuid, Removal};
use crate::auth::hash_password;
use crate::config::AdminConfig;
use crate::store::bookings::push_blocking_overlap;
use crate::types::{Role, User};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    phone: Option<String>,
    role: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<(User, String), sqlx::Error> {
        let role = Role::parse(&self.role).ok_or_else(|| decode_error(format!("unknown role '{}'", self.role)))?;
        let user = User {
            id: parse_uuid(&self.id)?,
            name: self.name,
            email: self.email,
            phone: self.phone,
            role,
            created_at: self.created_at,
        };
        Ok((user, self.password_hash))
    }
}

const USER_COLUMNS: &str = "id, name, email, phone, role, password_hash, created_at";

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub role: Role,
    pub password_hash: String,
}

pub async fn insert(pool: &SqlitePool, new: NewUser<'_>, now: DateTime<Utc>) -> Result<User, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO users (id, name, email, phone, role, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    )
    .bind(id.to_string())
    .bind(new.name.trim())
    .bind(new.email.trim().to_lowercase())
    .bind(new.phone)
    .bind(new.role.as_str())
    .bind(&new.password_hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(User {
        id,
        name: new.name.trim().to_string(),
        email: new.email.trim().to_lowercase(),
        phone: new.phone.map(str::to_string),
        role: new.role,
        created_at: now,
    })
}

pub async fn find(pool: &SqlitePool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(|r| r.into_user().map(|(user, _)| user)).transpose()
}

/// Returns the user together with its stored password hash.
pub async fn find_credentials(pool: &SqlitePool, email: &str) -> Result<Option<(User, String)>, sqlx::Error> {
    let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
    row.map(UserRow::into_user).transpose()
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    let rows: Vec<UserRow> =
        sqlx::query_as(&format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS))
            .fetch_all(pool)
            .await?;
    rows.into_iter().map(|r| r.into_user().map(|(user, _)| user)).collect()
}

pub struct UserChanges<'a> {
    pub name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub role: Option<Role>,
}

pub async fn update(pool: &SqlitePool, id: Uuid, changes: UserChanges<'_>) -> Result<Option<User>, sqlx::Error> {
    let res = sqlx::query(
        r#"UPDATE users SET
             name = COALESCE(?1, name),
             phone = COALESCE(?2, phone),
             role = COALESCE(?3, role)
           WHERE id = ?4"#,
    )
    .bind(changes.name.map(str::trim))
    .bind(changes.phone)
    .bind(changes.role.map(|r| r.as_str()))
    .bind(id.to_string())
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        return Ok(None);
    }
    find(pool, id).await
}

/// Deletes the account unless it rents or owns a booking that blocks the calendar
/// today or later.
///
/// Equipment goes with its owner and bookings with their renter or equipment, so the
/// guard keeps paid, upcoming bookings from disappearing with either party.
pub async fn delete(pool: &SqlitePool, id: Uuid, now: DateTime<Utc>) -> Result<Removal, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM users WHERE id = ");
    qb.push_bind(id.to_string());
    qb.push(" AND NOT EXISTS (SELECT 1 FROM bookings b WHERE (b.renter_id = users.id OR b.owner_id = users.id)");
    push_blocking_overlap(&mut qb, Some(now.date_naive()), None, now);
    qb.push(")");
    if qb.build().execute(pool).await?.rows_affected() > 0 {
        return Ok(Removal::Deleted);
    }

    let still_there: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(if still_there.is_some() { Removal::Blocked } else { Removal::Missing })
}

/// Inserts the configured admin account unless one with that email already exists.
///
/// Returns `true` when a new admin was created.
pub async fn seed_admin(pool: &SqlitePool, admin: &AdminConfig, now: DateTime<Utc>) -> anyhow::Result<bool> {
    let Some(password) = admin.password.as_deref().filter(|p| !p.is_empty()) else {
        tracing::info!("admin.password not configured, skipping admin seeding");
        return Ok(false);
    };
    let res = sqlx::query(
        r#"INSERT INTO users (id, name, email, phone, role, password_hash, created_at)
           VALUES (?1, ?2, ?3, NULL, 'admin', ?4, ?5)
           ON CONFLICT(email) DO NOTHING"#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&admin.name)
    .bind(admin.email.trim().to_lowercase())
    .bind(hash_password(password)?)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}
