//! Scoring and best-pick behavior of the auto-assignment engine.

use chrono::Utc;
use uuid::Uuid;

use delivery_server::services::assignment::{best_candidate, score_courier, AssignmentWeights};
use shared::models::{Courier, CourierStatus};

fn courier(name: &str, lat: f64, lon: f64, rating: f64) -> Courier {
    let now = Utc::now();
    Courier {
        id: Uuid::new_v4(),
        name: name.to_string(),
        phone: format!("+7-{name}"),
        status: CourierStatus::Available,
        current_lat: Some(lat),
        current_lon: Some(lon),
        rating,
        total_reviews: 10,
        created_at: now,
        updated_at: now,
        last_seen_at: Some(now),
    }
}

#[test]
fn nearby_high_rated_idle_courier_wins() {
    let weights = AssignmentWeights::default();
    let delivery = (55.80, 37.60);

    let near_good = courier("near-good", 55.801, 37.601, 4.8);
    let near_busy = courier("near-busy", 55.801, 37.601, 4.8);
    let far_good = courier("far-good", 56.10, 38.00, 4.8);

    let scores = vec![
        score_courier(&near_good, delivery.0, delivery.1, 0, weights),
        score_courier(&near_busy, delivery.0, delivery.1, 4, weights),
        score_courier(&far_good, delivery.0, delivery.1, 0, weights),
    ];

    let best = best_candidate(&scores).unwrap();
    assert_eq!(best.courier_id, near_good.id);
}

#[test]
fn two_candidates_with_close_scores_pick_the_greater() {
    let weights = AssignmentWeights::default();
    let delivery = (55.80, 37.60);

    // Same position and workload; only the rating separates them.
    let stronger = courier("stronger", 55.80, 37.60, 4.0);
    let weaker = courier("weaker", 55.80, 37.60, 3.8);

    let scores = vec![
        score_courier(&weaker, delivery.0, delivery.1, 0, weights),
        score_courier(&stronger, delivery.0, delivery.1, 0, weights),
    ];

    let best = best_candidate(&scores).unwrap();
    assert_eq!(best.courier_id, stronger.id);
    assert!(scores[1].total_score > scores[0].total_score);
}

#[test]
fn exact_ties_keep_the_first_candidate() {
    let weights = AssignmentWeights::default();
    let delivery = (55.80, 37.60);

    let first = courier("first", 55.80, 37.60, 4.0);
    let twin = courier("twin", 55.80, 37.60, 4.0);

    let scores = vec![
        score_courier(&first, delivery.0, delivery.1, 0, weights),
        score_courier(&twin, delivery.0, delivery.1, 0, weights),
    ];

    assert_eq!(scores[0].total_score, scores[1].total_score);
    assert_eq!(best_candidate(&scores).unwrap().courier_id, first.id);
}

#[test]
fn score_components_are_weighted() {
    let weights = AssignmentWeights::default();

    // On top of the delivery point, perfect rating, no load: maximum score.
    let perfect = courier("perfect", 55.80, 37.60, 5.0);
    let score = score_courier(&perfect, 55.80, 37.60, 0, weights);
    assert!((score.total_score - 1.0).abs() < 1e-9);
    assert!((score.distance_score - 1.0).abs() < 1e-9);
    assert_eq!(score.rating_score, 1.0);
    assert_eq!(score.workload_score, 1.0);

    // Unrated courier at the same spot with a full load keeps only the
    // distance component: 0.40 * 1.0.
    let rookie = courier("rookie", 55.80, 37.60, 0.0);
    let loaded = score_courier(&rookie, 55.80, 37.60, 5, weights);
    assert_eq!(loaded.rating_score, 0.0);
    assert_eq!(loaded.workload_score, 0.0);
    assert!((loaded.total_score - 0.40).abs() < 1e-9);
}
