use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::BookingStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Renter,
    Owner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Renter => "renter",
            Role::Owner => "owner",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "renter" => Some(Role::Renter),
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A user as exposed over the API; the password hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Equipment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub price_per_day: f64,
    pub image_url: Option<String>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    /// Epoch milliseconds after which an unconfirmed hold is reclaimed.
    pub hold_expires_at: i64,
    pub total_price: f64,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    /// Why the booking left the hold, e.g. a cancellation reason.
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn hold_expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.hold_expires_at)
    }
}

/// An inclusive range of days during which equipment is taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    pub booking_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
}

// Auth

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// Users

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

// Equipment

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEquipmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub location: String,
    pub price_per_day: f64,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateEquipmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub price_per_day: Option<f64>,
    pub image_url: Option<String>,
    pub available: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EquipmentQuery {
    pub category: Option<String>,
    pub location: Option<String>,
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

// Bookings

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentHoldRequest {
    pub equipment_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_reference: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingView {
    #[default]
    Renter,
    Owner,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BookingListQuery {
    #[serde(rename = "as", default)]
    pub view: BookingView,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub equipment_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub available: bool,
    pub conflicts: Vec<DateRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentHoldResponse {
    pub booking: Booking,
    pub hold_expires_at: DateTime<Utc>,
}
