#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::{Duration, NaiveDate};

    use crate::lifecycle::{BookingStatus, Transition};
    use crate::metrics::Metrics;
    use crate::payment::{self, ConfirmOutcome, ReferenceGateway};
    use crate::store::bookings::{self, NewHold, TransitionDetails};
    use crate::sweeper::{run_sweep_once, spawn_sweeper};
    use crate::tests::support::{at, create_equipment, create_user, test_db};
    use crate::types::{Booking, Role};

    async fn place_hold(pool: &sqlx::SqlitePool, start: &str, created: &str) -> (Booking, uuid::Uuid) {
        let owner = create_user(pool, &format!("owner-{}@example.com", start), Role::Owner).await;
        let renter = create_user(pool, &format!("renter-{}@example.com", start), Role::Renter).await;
        let item = create_equipment(pool, &owner, "Tractor", 100.0).await;
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
        let hold = NewHold {
            equipment_id: item.id,
            renter_id: renter.id,
            owner_id: owner.id,
            start_date: start,
            end_date: start + Duration::days(2),
            total_price: 300.0,
            notes: None,
        };
        let booking = bookings::create_hold(pool, hold, at(created), Duration::minutes(15)).await.unwrap();
        (booking, renter.id)
    }

    #[tokio::test]
    async fn test_sweep_sixteen_minutes_after_hold_expires_it() {
        let db = test_db().await;
        let metrics = Metrics::new();
        let (booking, _) = place_hold(&db.pool, "2030-06-01", "2030-05-01T10:00:00Z").await;

        let expired = run_sweep_once(&db.pool, &metrics, at("2030-05-01T10:16:00Z")).await.unwrap();
        assert_eq!(expired, 1);

        let stored = bookings::find(&db.pool, booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Expired);
        assert_eq!(stored.status_reason.as_deref(), Some("payment hold expired"));

        let snapshot = metrics.get_snapshot();
        assert_eq!(snapshot.holds_expired, 1);
        assert_eq!(snapshot.sweeps_run, 1);
    }

    #[tokio::test]
    async fn test_sweep_leaves_live_holds() {
        let db = test_db().await;
        let metrics = Metrics::new();
        let (booking, _) = place_hold(&db.pool, "2030-06-01", "2030-05-01T10:00:00Z").await;

        let expired = run_sweep_once(&db.pool, &metrics, at("2030-05-01T10:14:59Z")).await.unwrap();
        assert_eq!(expired, 0);
        assert_eq!(bookings::find(&db.pool, booking.id).await.unwrap().unwrap().status, BookingStatus::Hold);
    }

    #[tokio::test]
    async fn test_sweep_expires_exactly_once_and_skips_settled() {
        let db = test_db().await;
        let metrics = Metrics::new();
        let created = "2030-05-01T10:00:00Z";
        let (stale, _) = place_hold(&db.pool, "2030-06-01", created).await;
        let (paid, renter_paid) = place_hold(&db.pool, "2030-06-10", created).await;
        let (failed, renter_failed) = place_hold(&db.pool, "2030-06-20", created).await;
        let (cancelled, renter_cancelled) = place_hold(&db.pool, "2030-06-30", created).await;

        let now = at("2030-05-01T10:05:00Z");
        let details = TransitionDetails { payment_reference: Some("pay_1".to_string()), reason: None };
        bookings::transition(&db.pool, paid.id, renter_paid, Transition::ConfirmPayment, details, now).await.unwrap();
        bookings::transition(&db.pool, failed.id, renter_failed, Transition::FailPayment, TransitionDetails::default(), now)
            .await
            .unwrap();
        bookings::transition(
            &db.pool,
            cancelled.id,
            renter_cancelled,
            Transition::CancelPayment,
            TransitionDetails::default(),
            now,
        )
        .await
        .unwrap();

        let late = at("2030-05-01T11:00:00Z");
        assert_eq!(run_sweep_once(&db.pool, &metrics, late).await.unwrap(), 1);
        assert_eq!(run_sweep_once(&db.pool, &metrics, late).await.unwrap(), 0);

        let status = |b: Option<Booking>| b.unwrap().status;
        assert_eq!(status(bookings::find(&db.pool, stale.id).await.unwrap()), BookingStatus::Expired);
        assert_eq!(status(bookings::find(&db.pool, paid.id).await.unwrap()), BookingStatus::Confirmed);
        assert_eq!(status(bookings::find(&db.pool, failed.id).await.unwrap()), BookingStatus::Failed);
        assert_eq!(status(bookings::find(&db.pool, cancelled.id).await.unwrap()), BookingStatus::Cancelled);
        assert_eq!(metrics.get_snapshot().holds_expired, 1);
    }

    #[tokio::test]
    async fn test_confirm_races_sweep_with_single_winner() {
        for _ in 0..10 {
            let db = test_db().await;
            let metrics = Metrics::new();
            let (booking, renter) = place_hold(&db.pool, "2030-06-01", "2030-05-01T10:00:00Z").await;

            // Confirmation just inside the window, sweep just after it
            let confirm_at = at("2030-05-01T10:14:59Z");
            let sweep_at = at("2030-05-01T10:15:00Z");
            let gateway = ReferenceGateway;
            let (confirm, sweep) = tokio::join!(
                payment::confirm_hold(&db.pool, &gateway, booking.id, renter, "pay_race", confirm_at),
                run_sweep_once(&db.pool, &metrics, sweep_at),
            );
            let swept = sweep.unwrap();
            let confirmed = matches!(confirm, Ok(ConfirmOutcome::Confirmed(_)));
            assert!(confirmed ^ (swept == 1), "confirmed={} swept={}", confirmed, swept);

            let stored = bookings::find(&db.pool, booking.id).await.unwrap().unwrap();
            let expected = if confirmed { BookingStatus::Confirmed } else { BookingStatus::Expired };
            assert_eq!(stored.status, expected);
        }
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_and_shuts_down() {
        let db = test_db().await;
        let metrics = Metrics::new();
        // Created an hour ago, so already stale for the first tick
        let created = (chrono::Utc::now() - Duration::hours(1)).to_rfc3339();
        let (booking, _) = place_hold(&db.pool, "2030-06-01", &created).await;

        let handle = spawn_sweeper(db.pool.clone(), metrics.clone(), StdDuration::from_millis(20));
        let mut status = BookingStatus::Hold;
        for _ in 0..100 {
            status = bookings::find(&db.pool, booking.id).await.unwrap().unwrap().status;
            if status == BookingStatus::Expired {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        handle.shutdown().await;

        assert_eq!(status, BookingStatus::Expired);
        assert!(metrics.get_snapshot().sweeps_run >= 1);
    }

    #[tokio::test]
    async fn test_failed_sweep_is_counted() {
        let db = test_db().await;
        let metrics = Metrics::new();
        sqlx::query("ALTER TABLE bookings RENAME TO bookings_parked").execute(&db.pool).await.unwrap();

        assert!(run_sweep_once(&db.pool, &metrics, at("2030-05-01T10:16:00Z")).await.is_err());
        let snapshot = metrics.get_snapshot();
        assert_eq!(snapshot.sweep_errors, 1);
        assert_eq!(snapshot.sweeps_run, 1);
        assert_eq!(snapshot.holds_expired, 0);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_survives_failing_ticks() {
        let db = test_db().await;
        let metrics = Metrics::new();
        let created = (chrono::Utc::now() - Duration::hours(1)).to_rfc3339();
        let (booking, _) = place_hold(&db.pool, "2030-06-01", &created).await;
        sqlx::query("ALTER TABLE bookings RENAME TO bookings_parked").execute(&db.pool).await.unwrap();

        let handle = spawn_sweeper(db.pool.clone(), metrics.clone(), StdDuration::from_millis(20));
        for _ in 0..100 {
            if metrics.get_snapshot().sweep_errors >= 2 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        // Several ticks failed and the loop kept going
        assert!(metrics.get_snapshot().sweep_errors >= 2);
        assert_eq!(metrics.get_snapshot().holds_expired, 0);

        sqlx::query("ALTER TABLE bookings_parked RENAME TO bookings").execute(&db.pool).await.unwrap();
        let mut status = BookingStatus::Hold;
        for _ in 0..100 {
            status = bookings::find(&db.pool, booking.id).await.unwrap().unwrap().status;
            if status == BookingStatus::Expired {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        handle.shutdown().await;

        assert_eq!(status, BookingStatus::Expired);
        let snapshot = metrics.get_snapshot();
        assert_eq!(snapshot.holds_expired, 1);
        assert!(snapshot.sweeps_run > snapshot.sweep_errors);
    }
}
