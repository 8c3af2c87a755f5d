#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::lifecycle::{authorize, BookingError, BookingStatus, Transition};

    const ALL_TRANSITIONS: [Transition; 8] = [
        Transition::ConfirmPayment,
        Transition::FailPayment,
        Transition::CancelPayment,
        Transition::Accept,
        Transition::Reject,
        Transition::Complete,
        Transition::CancelDates,
        Transition::Expire,
    ];

    #[test]
    fn test_status_round_trips_through_str() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert_eq!("CONFIRMED".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert!("pending".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&BookingStatus::Hold).unwrap(), "\"hold\"");
        let parsed: BookingStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, BookingStatus::Cancelled);
    }

    #[test]
    fn test_blocking_statuses() {
        let blocking: Vec<_> = BookingStatus::ALL.into_iter().filter(|s| s.blocks_availability()).collect();
        assert_eq!(
            blocking,
            vec![BookingStatus::Hold, BookingStatus::Confirmed, BookingStatus::Accepted, BookingStatus::Completed]
        );
        assert!(!BookingStatus::Expired.blocks_availability());
        assert!(!BookingStatus::Failed.blocks_availability());
        assert!(!BookingStatus::Cancelled.blocks_availability());
    }

    #[test]
    fn test_terminal_statuses_have_no_outgoing_moves() {
        for status in BookingStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for t in ALL_TRANSITIONS {
                assert!(!t.applies_to(status), "{} should not leave {}", t.name(), status);
            }
        }
    }

    #[test]
    fn test_hold_moves() {
        for t in [Transition::ConfirmPayment, Transition::FailPayment, Transition::CancelPayment, Transition::Expire] {
            assert!(t.applies_to(BookingStatus::Hold));
            assert!(!t.applies_to(BookingStatus::Confirmed));
        }
        assert_eq!(Transition::ConfirmPayment.to(), BookingStatus::Confirmed);
        assert_eq!(Transition::FailPayment.to(), BookingStatus::Failed);
        assert_eq!(Transition::CancelPayment.to(), BookingStatus::Cancelled);
        assert_eq!(Transition::Expire.to(), BookingStatus::Expired);
    }

    #[test]
    fn test_owner_moves() {
        assert!(Transition::Accept.applies_to(BookingStatus::Confirmed));
        assert!(!Transition::Accept.applies_to(BookingStatus::Hold));
        assert!(Transition::Complete.applies_to(BookingStatus::Accepted));
        assert!(Transition::Complete.applies_to(BookingStatus::Confirmed));
        assert!(Transition::CancelDates.applies_to(BookingStatus::Accepted));
        assert!(!Transition::Reject.applies_to(BookingStatus::Accepted));
    }

    #[test]
    fn test_only_confirm_requires_live_hold() {
        for t in ALL_TRANSITIONS {
            assert_eq!(t.requires_live_hold(), t == Transition::ConfirmPayment);
        }
    }

    #[test]
    fn test_authorize_by_actor() {
        let renter = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert!(authorize(Transition::ConfirmPayment, renter, renter, owner).is_ok());
        assert!(authorize(Transition::ConfirmPayment, owner, renter, owner).is_err());
        assert!(authorize(Transition::Accept, owner, renter, owner).is_ok());
        assert!(authorize(Transition::Accept, renter, renter, owner).is_err());
        assert!(authorize(Transition::CancelDates, renter, renter, owner).is_ok());
        assert!(authorize(Transition::CancelDates, owner, renter, owner).is_ok());
        assert!(authorize(Transition::CancelDates, stranger, renter, owner).is_err());
        // Nobody may trigger the sweep's move by hand
        assert!(authorize(Transition::Expire, renter, renter, owner).is_err());
    }

    #[test]
    fn test_not_participant_message() {
        let err = authorize(Transition::Reject, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, BookingError::NotParticipant { role: "owner", action: "reject" }));
        assert_eq!(err.to_string(), "only the booking's owner may reject it");
    }
}
