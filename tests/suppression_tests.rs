//! Non-maximum suppression behaviour through the public API

use proxalert::{Candidate, Rect, Suppressor};

fn candidate(class_id: usize, confidence: f32, x: i32, y: i32, w: i32, h: i32) -> Candidate {
    Candidate::new(class_id, confidence, Rect::new(x, y, w, h))
}

/// A spread of overlapping and separate boxes over several classes
fn crowded_scene() -> Vec<Candidate> {
    vec![
        candidate(0, 0.91, 10, 10, 100, 100),
        candidate(0, 0.85, 20, 15, 100, 100),
        candidate(2, 0.80, 200, 200, 50, 80),
        candidate(1, 0.78, 15, 20, 95, 100),
        candidate(2, 0.75, 210, 205, 50, 80),
        candidate(3, 0.70, 400, 50, 30, 30),
        candidate(3, 0.70, 430, 50, 30, 30),
        candidate(5, 0.65, 0, 0, 640, 640),
        candidate(4, 0.15, 500, 500, 10, 10),
    ]
}

#[test]
fn test_overlapping_pair_keeps_stronger_box() {
    // Intersection 75 x 100 = 7500, union 12500: IoU 0.6
    let candidates = vec![
        candidate(0, 0.9, 0, 0, 100, 100),
        candidate(0, 0.7, 25, 0, 100, 100),
    ];
    assert!((candidates[0].iou(&candidates[1]) - 0.6).abs() < 1e-6);

    let kept = Suppressor::default().suppress(&candidates);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].confidence, 0.9);
}

#[test]
fn test_output_is_subset_of_input() {
    let candidates = crowded_scene();
    let indices = Suppressor::default().keep_indices(&candidates);

    let mut sorted = indices.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), indices.len());
    assert!(indices.iter().all(|&i| i < candidates.len()));

    for detection in Suppressor::default().suppress(&candidates) {
        assert!(candidates.contains(&detection));
    }
}

#[test]
fn test_no_surviving_pair_overlaps_beyond_threshold() {
    let kept = Suppressor::default().suppress(&crowded_scene());
    for (i, a) in kept.iter().enumerate() {
        for b in &kept[i + 1..] {
            assert!(a.iou(b) <= 0.4, "{} overlaps {}", a, b);
        }
    }
}

#[test]
fn test_suppression_is_deterministic_and_idempotent() {
    let suppressor = Suppressor::default();
    let candidates = crowded_scene();

    let first = suppressor.suppress(&candidates);
    let second = suppressor.suppress(&candidates);
    assert_eq!(first, second);

    let again = suppressor.suppress(&first);
    assert_eq!(again, first);
}

#[test]
fn test_low_scores_never_survive() {
    let kept = Suppressor::default().suppress(&crowded_scene());
    assert!(kept.iter().all(|d| d.confidence > 0.2));
}

#[test]
fn test_suppression_ignores_class() {
    // Class 1 box overlaps the stronger class 0 box and is removed
    let kept = Suppressor::default().suppress(&crowded_scene());
    assert!(kept.iter().all(|d| d.class_id != 1));
}
