//! Order math and lifecycle scenarios over the pure pieces of the pipeline.

use delivery_server::config::PricingConfig;
use delivery_server::pricing::DeliveryPricing;
use delivery_server::services::promo::calculate_discount;
use shared::models::{DiscountType, OrderStatus};
use shared::util::round2;

fn pricing() -> DeliveryPricing {
    DeliveryPricing::new(PricingConfig {
        base_fare: 100.0,
        per_km: 20.0,
        min_fare: 150.0,
    })
}

#[test]
fn order_with_percent_promo_prices_out_exactly() {
    // items: 2 x 100 + 1 x 50
    let items_total = 2.0 * 100.0 + 50.0;
    assert_eq!(items_total, 250.0);

    // ~5 km ride: base 100 + 5 * 20 = 200, above the 150 floor
    let delivery_cost = pricing().cost(5.0);
    assert_eq!(delivery_cost, 200.0);

    // SALE10: 10% off items + delivery
    let discount = calculate_discount(
        DiscountType::Percent,
        10.0,
        items_total + delivery_cost,
        delivery_cost,
    );
    assert_eq!(discount, 45.0);

    let total = round2((items_total + delivery_cost - discount).max(0.0));
    assert_eq!(total, 405.0);
}

#[test]
fn discount_never_drives_total_negative() {
    let items_total = 10.0;
    let delivery_cost = pricing().cost(0.0);
    let discount = calculate_discount(
        DiscountType::Fixed,
        10_000.0,
        items_total + delivery_cost,
        delivery_cost,
    );
    let total = round2((items_total + delivery_cost - discount).max(0.0));
    assert_eq!(total, 0.0);
}

#[test]
fn lifecycle_happy_path_walks_forward_only() {
    use OrderStatus::*;

    let path = [Created, Accepted, Preparing, Ready, InDelivery, Delivered];
    for pair in path.windows(2) {
        assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
    }

    // a freshly created order cannot jump straight to delivered
    assert!(!Created.can_transition_to(Delivered));
    // delivered stays delivered
    assert!(Delivered.can_transition_to(Delivered));
    assert!(!Delivered.can_transition_to(Cancelled));
}

#[test]
fn cancellation_is_reachable_until_terminal() {
    use OrderStatus::*;
    for status in [Created, Accepted, Preparing, Ready, InDelivery] {
        assert!(status.can_transition_to(Cancelled));
    }
    assert!(!Cancelled.can_transition_to(Created));
}
