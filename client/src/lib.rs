//! # AgriRent API client
//!
//! A thin async wrapper over the AgriRent HTTP API. One method per route; the bearer
//! token returned by [`ApiClient::login`] or [`ApiClient::register`] is kept and sent
//! with every later request.
//!
//! ```no_run
//! # async fn demo() -> Result<(), agrirent_client::ClientError> {
//! let mut api = agrirent_client::ApiClient::new("http://localhost:8000");
//! api.login("farmer@example.com", "secret1").await?;
//! let tractors = api
//!     .list_equipment(&agrirent_client::EquipmentQuery { category: Some("Tractor".into()), ..Default::default() })
//!     .await?;
//! # Ok(()) }
//! ```

pub mod types;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("HTTP {status} {code}: {message}")]
    Api { status: StatusCode, code: String, message: String },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("not logged in")]
    NotAuthenticated,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// The server's machine-readable error code, e.g. `CONFLICT`.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http, token: None }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        if self.token.is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        Ok(self.request(method, path))
    }

    async fn check(res: Response) -> Result<Response> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let text = res.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(env) => (env.error.code, env.error.message),
            Err(_) => (status.canonical_reason().unwrap_or("ERROR").to_uppercase(), text),
        };
        Err(ClientError::Api { status, code, message })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let res = Self::check(builder.send().await?).await?;
        res.json::<T>().await.map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn send_empty(builder: RequestBuilder) -> Result<()> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    // Auth

    pub async fn register(&mut self, req: &RegisterRequest) -> Result<AuthResponse> {
        let auth: AuthResponse = Self::send_json(self.request(Method::POST, "/api/auth/register").json(req)).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthResponse> {
        let req = LoginRequest { email: email.to_string(), password: password.to_string() };
        let auth: AuthResponse = Self::send_json(self.request(Method::POST, "/api/auth/login").json(&req)).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    pub async fn me(&self) -> Result<User> {
        Self::send_json(self.authed(Method::GET, "/api/auth/me")?).await
    }

    // Users

    pub async fn list_users(&self) -> Result<Vec<User>> {
        Self::send_json(self.authed(Method::GET, "/api/users")?).await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        Self::send_json(self.authed(Method::GET, &format!("/api/users/{}", id))?).await
    }

    pub async fn update_user(&self, id: Uuid, req: &UpdateUserRequest) -> Result<User> {
        Self::send_json(self.authed(Method::PUT, &format!("/api/users/{}", id))?.json(req)).await
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<()> {
        Self::send_empty(self.authed(Method::DELETE, &format!("/api/users/{}", id))?).await
    }

    // Equipment

    pub async fn list_equipment(&self, query: &EquipmentQuery) -> Result<Vec<Equipment>> {
        Self::send_json(self.request(Method::GET, "/api/equipment").query(query)).await
    }

    pub async fn get_equipment(&self, id: Uuid) -> Result<Equipment> {
        Self::send_json(self.request(Method::GET, &format!("/api/equipment/{}", id))).await
    }

    pub async fn create_equipment(&self, req: &CreateEquipmentRequest) -> Result<Equipment> {
        Self::send_json(self.authed(Method::POST, "/api/equipment")?.json(req)).await
    }

    pub async fn update_equipment(&self, id: Uuid, req: &UpdateEquipmentRequest) -> Result<Equipment> {
        Self::send_json(self.authed(Method::PUT, &format!("/api/equipment/{}", id))?.json(req)).await
    }

    pub async fn delete_equipment(&self, id: Uuid) -> Result<()> {
        Self::send_empty(self.authed(Method::DELETE, &format!("/api/equipment/{}", id))?).await
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        Self::send_json(self.request(Method::GET, "/api/equipment/categories")).await
    }

    pub async fn locations(&self) -> Result<Vec<String>> {
        Self::send_json(self.request(Method::GET, "/api/equipment/locations")).await
    }

    pub async fn unavailable_dates(&self, equipment_id: Uuid) -> Result<Vec<DateRange>> {
        Self::send_json(self.request(Method::GET, &format!("/api/equipment/{}/unavailable-dates", equipment_id))).await
    }

    // Bookings

    pub async fn list_bookings(&self, view: BookingView, status: Option<BookingStatus>) -> Result<Vec<Booking>> {
        #[derive(Serialize)]
        struct Query {
            #[serde(rename = "as")]
            view: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            status: Option<&'static str>,
        }
        let view = match view {
            BookingView::Renter => "renter",
            BookingView::Owner => "owner",
        };
        let query = Query { view, status: status.map(|s| s.as_str()) };
        Self::send_json(self.authed(Method::GET, "/api/bookings2")?.query(&query)).await
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking> {
        Self::send_json(self.authed(Method::GET, &format!("/api/bookings2/{}", id))?).await
    }

    pub async fn create_payment_hold(&self, req: &PaymentHoldRequest) -> Result<PaymentHoldResponse> {
        Self::send_json(self.authed(Method::POST, "/api/bookings2/payment-hold")?.json(req)).await
    }

    pub async fn confirm_payment(&self, id: Uuid, payment_reference: &str) -> Result<Booking> {
        let body = json!({ "payment_reference": payment_reference });
        Self::send_json(self.authed(Method::POST, &format!("/api/bookings2/{}/confirm-payment", id))?.json(&body)).await
    }

    async fn booking_action(&self, id: Uuid, action: &str, reason: Option<&str>) -> Result<Booking> {
        let builder = self.authed(Method::POST, &format!("/api/bookings2/{}/{}", id, action))?;
        let builder = match reason {
            Some(reason) => builder.json(&json!({ "reason": reason })),
            None => builder,
        };
        Self::send_json(builder).await
    }

    pub async fn fail_payment(&self, id: Uuid, reason: Option<&str>) -> Result<Booking> {
        self.booking_action(id, "fail-payment", reason).await
    }

    pub async fn cancel_payment(&self, id: Uuid, reason: Option<&str>) -> Result<Booking> {
        self.booking_action(id, "cancel-payment", reason).await
    }

    pub async fn accept(&self, id: Uuid) -> Result<Booking> {
        self.booking_action(id, "accept", None).await
    }

    pub async fn reject(&self, id: Uuid, reason: Option<&str>) -> Result<Booking> {
        self.booking_action(id, "reject", reason).await
    }

    pub async fn complete(&self, id: Uuid) -> Result<Booking> {
        self.booking_action(id, "complete", None).await
    }

    pub async fn cancel_dates(&self, id: Uuid, reason: Option<&str>) -> Result<Booking> {
        self.booking_action(id, "cancel-dates", reason).await
    }

    pub async fn availability(
        &self,
        equipment_id: Uuid,
        start_date: chrono::NaiveDate,
        end_date: chrono::NaiveDate,
    ) -> Result<AvailabilityResponse> {
        let path = format!("/api/bookings2/availability/{}", equipment_id);
        Self::send_json(self.request(Method::GET, &path).query(&[("start_date", start_date), ("end_date", end_date)]))
            .await
    }

    // Probes

    pub async fn health(&self) -> Result<HealthResponse> {
        Self::send_json(self.request(Method::GET, "/health")).await
    }
}
