mod common;

use chrono::Duration;
use futures::future::join_all;
use uuid::Uuid;

use common::{harness, harness_with, ids, start_time};
use seat_inventory::error::InventoryError;
use seat_inventory::models::{AuditoriumLayout, CartStatus, RowLayout, SeatStatus, SeatType};
use seat_inventory::store::InventoryStore;

#[tokio::test]
async fn conflicting_hold_is_rejected_until_reclaimed() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let x = h.service.open_cart(h.session_id, None).await.unwrap();
    let y = h.service.open_cart(h.session_id, None).await.unwrap();

    let held = h.service.hold_seats(x.id, &ids(&["A1", "A2"]), None).await.unwrap();
    assert_eq!(held.held_until, start_time() + Duration::minutes(10));
    assert_eq!(held.held_seat_ids, ids(&["A1", "A2"]));

    let err = h.service.hold_seats(y.id, &ids(&["A2", "A3"]), None).await.unwrap_err();
    match err {
        InventoryError::SeatOccupied { seat_ids } => assert_eq!(seat_ids, ids(&["A2"])),
        other => panic!("expected SeatOccupied, got {:?}", other),
    }
    // all or nothing: A3 was free but must not be held by Y
    let a3 = h.store.seat(h.session_id, "A3").unwrap();
    assert_eq!(a3.status, SeatStatus::Available);
    assert!(a3.held_by_cart_id.is_none());

    h.clock.advance(Duration::minutes(11));
    let report = h.service.release_expired_reservations().await.unwrap();
    let mut released: Vec<_> = report.released.iter().map(|s| s.seat_id.clone()).collect();
    released.sort();
    assert_eq!(released, ids(&["A1", "A2"]));
    assert_eq!(report.expired_carts, 1);

    let a1 = h.store.seat(h.session_id, "A1").unwrap();
    assert_eq!(a1.status, SeatStatus::Available);
    assert!(a1.held_until.is_none() && a1.held_by_cart_id.is_none());

    let held = h.service.hold_seats(y.id, &ids(&["A2", "A3"]), None).await.unwrap();
    assert_eq!(held.held_seat_ids, ids(&["A2", "A3"]));
    let x_cart = h.store.find_cart(x.id).await.unwrap().unwrap();
    assert_eq!(x_cart.status, CartStatus::Expired);
}

#[tokio::test]
async fn lapsed_hold_can_be_taken_before_reclaim() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let x = h.service.open_cart(h.session_id, None).await.unwrap();
    h.service.hold_seats(x.id, &ids(&["A5"]), Some(2)).await.unwrap();

    h.clock.advance(Duration::minutes(3));
    let map = h.service.seat_map(h.session_id, None).await.unwrap();
    let a5 = map.rows[0].seats.iter().find(|s| s.seat_id == "A5").unwrap();
    assert_eq!(a5.status, SeatStatus::Available);

    let y = h.service.open_cart(h.session_id, None).await.unwrap();
    let held = h.service.hold_seats(y.id, &ids(&["A5"]), None).await.unwrap();
    assert_eq!(held.held_seat_ids, ids(&["A5"]));
    assert_eq!(h.store.seat(h.session_id, "A5").unwrap().held_by_cart_id, Some(y.id));
}

#[tokio::test]
async fn rehold_moves_the_whole_cart_to_the_new_expiry() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();

    h.service.hold_seats(cart.id, &ids(&["A1"]), None).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    let held = h.service.hold_seats(cart.id, &ids(&["A2", "A1"]), None).await.unwrap();

    let expected = start_time() + Duration::minutes(15);
    assert_eq!(held.held_until, expected);
    for seat_id in ["A1", "A2"] {
        assert_eq!(h.store.seat(h.session_id, seat_id).unwrap().held_until, Some(expected));
    }
    assert_eq!(h.store.find_cart(cart.id).await.unwrap().unwrap().expires_at, expected);
}

#[tokio::test]
async fn reextended_hold_survives_reclaim_past_its_old_expiry() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();

    h.service.hold_seats(cart.id, &ids(&["A1"]), None).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    h.service.hold_seats(cart.id, &ids(&["A2"]), None).await.unwrap();

    // past the first hold's expiry, before the extended one
    h.clock.advance(Duration::minutes(6));
    let report = h.service.release_expired_reservations().await.unwrap();
    assert!(report.released.is_empty());
    assert_eq!(report.expired_carts, 0);

    for seat_id in ["A1", "A2"] {
        let seat = h.store.seat(h.session_id, seat_id).unwrap();
        assert_eq!(seat.status, SeatStatus::Held);
        assert_eq!(seat.held_by_cart_id, Some(cart.id));
        assert_eq!(seat.held_until, Some(start_time() + Duration::minutes(15)));
    }
    assert_eq!(
        h.store.find_cart(cart.id).await.unwrap().unwrap().status,
        CartStatus::Active
    );
}

#[tokio::test]
async fn gap_and_unknown_seats_count_as_occupied() {
    let h = harness_with(AuditoriumLayout::new(vec![
        RowLayout::new("A", 5).with_type([3], SeatType::Gap),
    ]));
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();

    let err = h
        .service
        .hold_seats(cart.id, &ids(&["A2", "A3", "Z9"]), None)
        .await
        .unwrap_err();
    match err {
        InventoryError::SeatOccupied { seat_ids } => assert_eq!(seat_ids, ids(&["A3", "Z9"])),
        other => panic!("expected SeatOccupied, got {:?}", other),
    }
    assert!(h.store.seat(h.session_id, "A2").unwrap().held_by_cart_id.is_none());
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();

    let empty = h.service.hold_seats(cart.id, &ids(&[" ", ""]), None).await.unwrap_err();
    assert!(matches!(empty, InventoryError::InvalidRequest(_)));

    let zero_ttl = h.service.hold_seats(cart.id, &ids(&["A1"]), Some(0)).await.unwrap_err();
    assert!(matches!(zero_ttl, InventoryError::InvalidRequest(_)));

    let too_long = h.service.hold_seats(cart.id, &ids(&["A1"]), Some(61)).await.unwrap_err();
    assert!(matches!(too_long, InventoryError::InvalidRequest(_)));

    let all: Vec<String> = (1..=10).map(|n| format!("A{}", n)).chain(["B3".to_string()]).collect();
    let too_many = h.service.hold_seats(cart.id, &all, None).await.unwrap_err();
    assert!(matches!(too_many, InventoryError::InvalidRequest(_)));

    let missing = Uuid::new_v4();
    let no_cart = h.service.hold_seats(missing, &ids(&["A1"]), None).await.unwrap_err();
    assert!(matches!(no_cart, InventoryError::CartNotFound(id) if id == missing));
}

#[tokio::test]
async fn expired_cart_cannot_hold() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();

    h.clock.advance(Duration::minutes(15));
    let err = h.service.hold_seats(cart.id, &ids(&["A1"]), None).await.unwrap_err();
    assert!(matches!(err, InventoryError::CartNotActive(_)));
}

#[tokio::test]
async fn racing_carts_get_all_or_nothing() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();

    let mut carts = Vec::new();
    for _ in 0..12 {
        carts.push(h.service.open_cart(h.session_id, None).await.unwrap().id);
    }
    let requests = [ids(&["A1", "A2"]), ids(&["A2", "A3"]), ids(&["A3", "A1"])];

    let tasks = carts.iter().enumerate().map(|(i, &cart_id)| {
        let service = h.service.clone();
        let seat_ids = requests[i % requests.len()].clone();
        tokio::spawn(async move { (cart_id, seat_ids.clone(), service.hold_seats(cart_id, &seat_ids, None).await) })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    // every pair overlaps every other, so exactly one cart wins
    let winners: Vec<_> = results.iter().filter(|(_, _, r)| r.is_ok()).collect();
    assert_eq!(winners.len(), 1);
    for (_, _, result) in &results {
        if let Err(e) = result {
            assert!(matches!(e, InventoryError::SeatOccupied { .. }));
        }
    }

    let (winner, won_seats, _) = winners[0];
    for seat_id in ["A1", "A2", "A3"] {
        let seat = h.store.seat(h.session_id, seat_id).unwrap();
        if won_seats.iter().any(|s| s == seat_id) {
            assert_eq!(seat.held_by_cart_id, Some(*winner));
        } else {
            assert!(seat.held_by_cart_id.is_none());
        }
    }
}

#[tokio::test]
async fn release_drops_only_own_holds() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let mine = h.service.open_cart(h.session_id, None).await.unwrap();
    let other = h.service.open_cart(h.session_id, None).await.unwrap();
    h.service.hold_seats(mine.id, &ids(&["A1", "A2"]), None).await.unwrap();
    h.service.hold_seats(other.id, &ids(&["A3"]), None).await.unwrap();

    let released = h.service.release_seats(mine.id, &ids(&["A1", "A3"])).await.unwrap();
    assert_eq!(released, ids(&["A1"]));
    assert_eq!(h.store.seat(h.session_id, "A3").unwrap().held_by_cart_id, Some(other.id));

    let released = h.service.release_seats(mine.id, &[]).await.unwrap();
    assert_eq!(released, ids(&["A2"]));
}

#[tokio::test]
async fn releasing_everything_cancels_the_cart() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();
    h.service.hold_seats(cart.id, &ids(&["A1", "A2"]), None).await.unwrap();

    // a partial release keeps the cart open
    h.service.release_seats(cart.id, &ids(&["A1"])).await.unwrap();
    assert_eq!(
        h.store.find_cart(cart.id).await.unwrap().unwrap().status,
        CartStatus::Active
    );

    let blank = h.service.release_seats(cart.id, &ids(&[" "])).await.unwrap_err();
    assert!(matches!(blank, InventoryError::InvalidRequest(_)));
    assert_eq!(h.store.seat(h.session_id, "A2").unwrap().held_by_cart_id, Some(cart.id));

    let released = h.service.release_seats(cart.id, &[]).await.unwrap();
    assert_eq!(released, ids(&["A2"]));
    assert_eq!(
        h.store.find_cart(cart.id).await.unwrap().unwrap().status,
        CartStatus::Cancelled
    );

    let err = h.service.hold_seats(cart.id, &ids(&["A3"]), None).await.unwrap_err();
    assert!(matches!(err, InventoryError::CartNotActive(id) if id == cart.id));
    let err = h.service.sell_held_seats(cart.id).await.unwrap_err();
    assert!(matches!(err, InventoryError::CartNotActive(_)));

    // the reclaimer leaves a cancelled cart alone
    h.clock.advance(Duration::hours(1));
    let report = h.service.release_expired_reservations().await.unwrap();
    assert_eq!(report.expired_carts, 0);
}

#[tokio::test]
async fn completed_cart_stays_completed_on_release_all() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();
    h.service.hold_seats(cart.id, &ids(&["B3"]), None).await.unwrap();
    h.service.sell_held_seats(cart.id).await.unwrap();

    let released = h.service.release_seats(cart.id, &[]).await.unwrap();
    assert!(released.is_empty());
    assert_eq!(
        h.store.find_cart(cart.id).await.unwrap().unwrap().status,
        CartStatus::Completed
    );
    assert_eq!(h.store.seat(h.session_id, "B3").unwrap().status, SeatStatus::Sold);
}

#[tokio::test]
async fn purchase_makes_seats_permanent() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();
    h.service.hold_seats(cart.id, &ids(&["B1", "B2"]), None).await.unwrap();

    let mut sold = h.service.sell_held_seats(cart.id).await.unwrap();
    sold.sort();
    assert_eq!(sold, ids(&["B1", "B2"]));
    assert_eq!(
        h.store.find_cart(cart.id).await.unwrap().unwrap().status,
        CartStatus::Completed
    );

    h.clock.advance(Duration::hours(1));
    let report = h.service.release_expired_reservations().await.unwrap();
    assert!(report.released.is_empty());

    let b1 = h.store.seat(h.session_id, "B1").unwrap();
    assert_eq!(b1.status, SeatStatus::Sold);
    assert_eq!(b1.sold_cart_id, Some(cart.id));

    let buyer = h.service.open_cart(h.session_id, None).await.unwrap();
    let err = h.service.hold_seats(buyer.id, &ids(&["B1"]), None).await.unwrap_err();
    assert!(matches!(err, InventoryError::SeatOccupied { .. }));

    let err = h.service.regenerate_seats_for_session(h.session_id).await.unwrap_err();
    assert!(matches!(err, InventoryError::SeatsAlreadySold(_)));
}

#[tokio::test]
async fn purchase_without_holds_is_invalid() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();

    let err = h.service.sell_held_seats(cart.id).await.unwrap_err();
    assert!(matches!(err, InventoryError::InvalidRequest(_)));
}

#[tokio::test]
async fn reclaim_twice_is_a_no_op() {
    let h = harness();
    h.service.ensure_seats_for_session(h.session_id).await.unwrap();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();
    h.service.hold_seats(cart.id, &ids(&["A7"]), Some(1)).await.unwrap();

    h.clock.advance(Duration::minutes(2));
    let first = h.service.release_expired_reservations().await.unwrap();
    assert_eq!(first.released.len(), 1);

    let second = h.service.release_expired_reservations().await.unwrap();
    assert!(second.released.is_empty());
    assert_eq!(second.expired_carts, 0);
}

#[tokio::test]
async fn seat_map_marks_viewers_own_holds() {
    let h = harness();
    let cart = h.service.open_cart(h.session_id, None).await.unwrap();

    // first map read generates the seats
    let map = h.service.seat_map(h.session_id, Some(cart.id)).await.unwrap();
    assert_eq!(map.counts.available, 18);

    h.service.hold_seats(cart.id, &ids(&["A4"]), None).await.unwrap();
    let map = h.service.seat_map(h.session_id, Some(cart.id)).await.unwrap();
    let a4 = map.rows[0].seats.iter().find(|s| s.seat_id == "A4").unwrap();
    assert_eq!(a4.status, SeatStatus::Held);
    assert!(a4.mine);
    assert_eq!((map.counts.available, map.counts.held), (17, 1));

    let anonymous = h.service.seat_map(h.session_id, None).await.unwrap();
    assert!(anonymous.rows.iter().flat_map(|r| &r.seats).all(|s| !s.mine));
}
