use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_uuid, Removal};
use crate::store::bookings::push_blocking_overlap;
use crate::types::{CreateEquipmentRequest, Equipment, EquipmentQuery, UpdateEquipmentRequest};

#[derive(Debug, sqlx::FromRow)]
struct EquipmentRow {
    id: String,
    owner_id: String,
    name: String,
    description: String,
    category: String,
    location: String,
    price_per_day: f64,
    image_url: Option<String>,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = sqlx::Error;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        Ok(Equipment {
            id: parse_uuid(&row.id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            name: row.name,
            description: row.description,
            category: row.category,
            location: row.location,
            price_per_day: row.price_per_day,
            image_url: row.image_url,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const EQUIPMENT_COLUMNS: &str =
    "e.id, e.owner_id, e.name, e.description, e.category, e.location, e.price_per_day, e.image_url, e.available, e.created_at, e.updated_at";

pub async fn insert(
    pool: &SqlitePool,
    owner_id: Uuid,
    req: &CreateEquipmentRequest,
    now: DateTime<Utc>,
) -> Result<Equipment, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO equipment
             (id, owner_id, name, description, category, location, price_per_day, image_url, available, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)"#,
    )
    .bind(id.to_string())
    .bind(owner_id.to_string())
    .bind(req.name.trim())
    .bind(req.description.trim())
    .bind(req.category.trim())
    .bind(req.location.trim())
    .bind(req.price_per_day)
    .bind(req.image_url.as_deref())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Equipment {
        id,
        owner_id,
        name: req.name.trim().to_string(),
        description: req.description.trim().to_string(),
        category: req.category.trim().to_string(),
        location: req.location.trim().to_string(),
        price_per_day: req.price_per_day,
        image_url: req.image_url.clone(),
        available: true,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find(pool: &SqlitePool, id: Uuid) -> Result<Option<Equipment>, sqlx::Error> {
    let row: Option<EquipmentRow> =
        sqlx::query_as(&format!("SELECT {} FROM equipment e WHERE e.id = ?1", EQUIPMENT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?;
    row.map(Equipment::try_from).transpose()
}

/// Lists equipment matching every filter that is set.
///
/// With both `start_date` and `end_date`, only listed equipment without a blocking
/// booking in that range is returned.
pub async fn list(pool: &SqlitePool, q: &EquipmentQuery, now: DateTime<Utc>) -> Result<Vec<Equipment>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM equipment e WHERE 1 = 1", EQUIPMENT_COLUMNS));

    if let Some(category) = q.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND e.category = ").push_bind(category.to_string()).push(" COLLATE NOCASE");
    }
    if let Some(location) = q.location.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND e.location = ").push_bind(location.to_string()).push(" COLLATE NOCASE");
    }
    if let Some(owner_id) = q.owner_id {
        qb.push(" AND e.owner_id = ").push_bind(owner_id.to_string());
    }
    if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.replace('%', "").replace('_', ""));
        qb.push(" AND (e.name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.description LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let (Some(start), Some(end)) = (q.start_date, q.end_date) {
        qb.push(" AND e.available = 1 AND NOT EXISTS (SELECT 1 FROM bookings b WHERE b.equipment_id = e.id");
        push_blocking_overlap(&mut qb, Some(start), Some(end), now);
        qb.push(")");
    }
    qb.push(" ORDER BY e.created_at DESC");

    let rows: Vec<EquipmentRow> = qb.build_query_as().fetch_all(pool).await?;
    rows.into_iter().map(Equipment::try_from).collect()
}

/// Applies `changes` only if `owner_id` still owns the equipment.
///
/// Returns `None` when no row matched, i.e. the equipment is gone or owned by someone else.
pub async fn update_owned(
    pool: &SqlitePool,
    id: Uuid,
    owner_id: Uuid,
    changes: &UpdateEquipmentRequest,
    now: DateTime<Utc>,
) -> Result<Option<Equipment>, sqlx::Error> {
    let res = sqlx::query(
        r#"UPDATE equipment SET
             name = COALESCE(?1, name),
             description = COALESCE(?2, description),
             category = COALESCE(?3, category),
             location = COALESCE(?4, location),
             price_per_day = COALESCE(?5, price_per_day),
             image_url = COALESCE(?6, image_url),
             available = COALESCE(?7, available),
             updated_at = ?8
           WHERE id = ?9 AND owner_id = ?10"#,
    )
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.description.as_deref().map(str::trim))
    .bind(changes.category.as_deref().map(str::trim))
    .bind(changes.location.as_deref().map(str::trim))
    .bind(changes.price_per_day)
    .bind(changes.image_url.as_deref())
    .bind(changes.available)
    .bind(now)
    .bind(id.to_string())
    .bind(owner_id.to_string())
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        return Ok(None);
    }
    find(pool, id).await
}

/// Deletes the owner's equipment unless a booking blocking the calendar ends today or later.
///
/// The guard and the delete are one statement, so a hold placed concurrently either
/// lands first and blocks the delete or finds the equipment gone.
pub async fn delete_owned(
    pool: &SqlitePool,
    id: Uuid,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Removal, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM equipment WHERE id = ");
    qb.push_bind(id.to_string()).push(" AND owner_id = ").push_bind(owner_id.to_string());
    qb.push(" AND NOT EXISTS (SELECT 1 FROM bookings b WHERE b.equipment_id = equipment.id");
    push_blocking_overlap(&mut qb, Some(now.date_naive()), None, now);
    qb.push(")");
    if qb.build().execute(pool).await?.rows_affected() > 0 {
        return Ok(Removal::Deleted);
    }

    let still_there: Option<i64> = sqlx::query_scalar("SELECT 1 FROM equipment WHERE id = ?1 AND owner_id = ?2")
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(if still_there.is_some() { Removal::Blocked } else { Removal::Missing })
}

pub async fn categories(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT category FROM equipment ORDER BY category COLLATE NOCASE")
        .fetch_all(pool)
        .await
}

pub async fn locations(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT location FROM equipment ORDER BY location COLLATE NOCASE")
        .fetch_all(pool)
        .await
}
