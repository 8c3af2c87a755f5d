use agrirent_client::{
    ApiClient, BookingStatus, BookingView, CreateEquipmentRequest, EquipmentQuery, PaymentHoldRequest,
    RegisterRequest, Role, UpdateEquipmentRequest,
};
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use tempfile::TempDir;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("e2e.db").display());
        let pool = agrirent::db::connect_pool(&url, 4).await.unwrap();
        agrirent::db::init_db(&pool).await.unwrap();

        let mut config = agrirent::config::AppConfig::default();
        config.server.environment = agrirent::config::Environment::Test;
        let app = agrirent::routes::build_app(agrirent::state::AppState::new(pool, config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle, _dir: dir }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn register_request(email: &str, role: Role) -> RegisterRequest {
    RegisterRequest {
        name: "Farmer".to_string(),
        email: email.to_string(),
        password: "secret1".to_string(),
        phone: None,
        role: Some(role),
    }
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let health = ApiClient::new(&srv.base_url).health().await.unwrap();
    assert_eq!(health.status, "OK");
    assert_eq!(health.environment, "test");
}

#[tokio::test]
async fn protected_calls_need_login() {
    let srv = TestServer::spawn().await;
    let api = ApiClient::new(&srv.base_url);
    let err = api.me().await.unwrap_err();
    assert!(matches!(err, agrirent_client::ClientError::NotAuthenticated));
}

#[tokio::test]
async fn booking_flow_through_client() {
    let srv = TestServer::spawn().await;

    let mut owner = ApiClient::new(&srv.base_url);
    owner.register(&register_request("owner@example.com", Role::Owner)).await.unwrap();
    let mut renter = ApiClient::new(&srv.base_url);
    let renter_auth = renter.register(&register_request("renter@example.com", Role::Renter)).await.unwrap();

    let tractor = owner
        .create_equipment(&CreateEquipmentRequest {
            name: "Mahindra 575".to_string(),
            description: "45 HP".to_string(),
            category: "Tractor".to_string(),
            location: "Indore".to_string(),
            price_per_day: 1200.0,
            image_url: None,
        })
        .await
        .unwrap();

    let listed = renter
        .list_equipment(&EquipmentQuery { location: Some("indore".to_string()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let start = Utc::now().date_naive() + Duration::days(4);
    let end = start + Duration::days(1);
    let hold = renter
        .create_payment_hold(&PaymentHoldRequest { equipment_id: tractor.id, start_date: start, end_date: end, notes: None })
        .await
        .unwrap();
    assert_eq!(hold.booking.status, BookingStatus::Hold);
    assert_eq!(hold.booking.renter_id, renter_auth.user.id);
    assert_eq!(hold.booking.total_price, 2400.0);

    let availability = renter.availability(tractor.id, start, start).await.unwrap();
    assert!(!availability.available);

    // Owner cannot pay for the renter
    let err = owner.confirm_payment(hold.booking.id, "pay_1").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    assert_eq!(err.code(), Some("FORBIDDEN"));

    let confirmed = renter.confirm_payment(hold.booking.id, "pay_1").await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    let accepted = owner.accept(hold.booking.id).await.unwrap();
    assert_eq!(accepted.status, BookingStatus::Accepted);

    let owned = owner.list_bookings(BookingView::Owner, Some(BookingStatus::Accepted)).await.unwrap();
    assert_eq!(owned.len(), 1);

    let err = owner.delete_equipment(tractor.id).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    let completed = owner.complete(hold.booking.id).await.unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);
    assert_eq!(renter.get_booking(hold.booking.id).await.unwrap().status, BookingStatus::Completed);

    let err = renter
        .update_equipment(tractor.id, &UpdateEquipmentRequest { price_per_day: Some(1.0), ..Default::default() })
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
}

#[tokio::test]
async fn cancelled_hold_frees_dates() {
    let srv = TestServer::spawn().await;
    let mut owner = ApiClient::new(&srv.base_url);
    owner.register(&register_request("owner@example.com", Role::Owner)).await.unwrap();
    let mut renter = ApiClient::new(&srv.base_url);
    renter.register(&register_request("renter@example.com", Role::Renter)).await.unwrap();

    let plough = owner
        .create_equipment(&CreateEquipmentRequest {
            name: "Disc plough".to_string(),
            description: String::new(),
            category: "Tillage".to_string(),
            location: "Indore".to_string(),
            price_per_day: 300.0,
            image_url: None,
        })
        .await
        .unwrap();

    let start = Utc::now().date_naive() + Duration::days(2);
    let req = PaymentHoldRequest { equipment_id: plough.id, start_date: start, end_date: start, notes: None };
    let hold = renter.create_payment_hold(&req).await.unwrap();
    let err = renter.create_payment_hold(&req).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    let cancelled = renter.cancel_payment(hold.booking.id, Some("changed plans")).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.status_reason.as_deref(), Some("changed plans"));

    assert!(renter.unavailable_dates(plough.id).await.unwrap().is_empty());
    renter.create_payment_hold(&req).await.unwrap();
}
