//! Detection data structures and non-maximum suppression

use std::fmt;

/// Axis-aligned box in image pixel coordinates, anchored at its top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    /// Left X coordinate
    pub x: i32,
    /// Top Y coordinate
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Pixel area of the box; degenerate boxes have zero area
    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Area shared with another rectangle
    pub fn intersection_area(&self, other: &Rect) -> i64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return 0;
        }

        (x2 - x1) as i64 * (y2 - y1) as i64
    }

    /// Calculate Intersection over Union (IoU) with another rectangle
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = self.intersection_area(other);
        if intersection == 0 {
            return 0.0;
        }

        let union = self.area() + other.area() - intersection;
        if union <= 0 {
            return 0.0;
        }

        (intersection as f64 / union as f64) as f32
    }
}

/// A detected object with bounding box and classification
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Index into the class-name list
    pub class_id: usize,
    /// Objectness confidence reported by the detector (not the class score)
    pub confidence: f32,
    pub rect: Rect,
}

/// A pre-suppression detection guess. Candidates that survive NMS are
/// returned as [`Detection`]s; the shape is identical.
pub type Candidate = Detection;

impl Detection {
    /// Create a new detection
    pub fn new(class_id: usize, confidence: f32, rect: Rect) -> Self {
        Self {
            class_id,
            confidence,
            rect,
        }
    }

    /// Calculate Intersection over Union (IoU) with another detection
    pub fn iou(&self, other: &Detection) -> f32 {
        self.rect.iou(&other.rect)
    }

    /// Check if this detection overlaps with another beyond `threshold`
    pub fn overlaps_with(&self, other: &Detection, threshold: f32) -> bool {
        self.iou(other) > threshold
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Detection(class={}, confidence={:.2}, bbox=({}, {}, {}, {}))",
            self.class_id,
            self.confidence,
            self.rect.x,
            self.rect.y,
            self.rect.width,
            self.rect.height
        )
    }
}

/// Class-agnostic greedy Non-Maximum Suppression
#[derive(Clone, Debug)]
pub struct Suppressor {
    score_threshold: f32,
    iou_threshold: f32,
}

impl Suppressor {
    /// Create a suppressor. Candidates scoring at or below `score_threshold`
    /// are discarded before suppression.
    pub fn new(score_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            score_threshold,
            iou_threshold,
        }
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    /// Indices of the surviving candidates, in descending-confidence
    /// processing order. Equal confidences keep their original order.
    pub fn keep_indices(&self, candidates: &[Candidate]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].confidence > self.score_threshold)
            .collect();

        // Stable: equal confidences keep input order
        order.sort_by(|&a, &b| {
            candidates[b]
                .confidence
                .total_cmp(&candidates[a].confidence)
        });

        let mut keep: Vec<usize> = Vec::with_capacity(order.len());
        for idx in order {
            let suppressed = keep
                .iter()
                .any(|&kept| candidates[kept].overlaps_with(&candidates[idx], self.iou_threshold));
            if !suppressed {
                keep.push(idx);
            }
        }

        keep
    }

    /// Surviving candidates, cloned out in processing order
    pub fn suppress(&self, candidates: &[Candidate]) -> Vec<Detection> {
        self.keep_indices(candidates)
            .into_iter()
            .map(|idx| candidates[idx].clone())
            .collect()
    }
}

impl Default for Suppressor {
    fn default() -> Self {
        Self::new(0.2, 0.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: usize, confidence: f32, x: i32, y: i32, w: i32, h: i32) -> Detection {
        Detection::new(class_id, confidence, Rect::new(x, y, w, h))
    }

    #[test]
    fn test_rect_area_and_edges() {
        let rect = Rect::new(5, 10, 20, 30);
        assert_eq!(rect.area(), 600);
        assert_eq!(rect.right(), 25);
        assert_eq!(rect.bottom(), 40);

        assert_eq!(Rect::new(0, 0, -4, 10).area(), 0);
    }

    #[test]
    fn test_iou_calculation() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);

        let iou = a.iou(&b);
        assert!((iou - 0.142857).abs() < 0.001); // 25 / (100 + 100 - 25)

        assert_eq!(a.iou(&Rect::new(20, 20, 5, 5)), 0.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_touching_boxes_do_not_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        assert_eq!(a.intersection_area(&b), 0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_nms_keeps_highest_of_overlapping_pair() {
        // IoU = 7500 / 12500 = 0.6
        let candidates = vec![det(2, 0.7, 0, 25, 100, 100), det(2, 0.9, 0, 0, 100, 100)];
        assert!((candidates[0].iou(&candidates[1]) - 0.6).abs() < 1e-6);

        let suppressor = Suppressor::default();
        assert_eq!(suppressor.keep_indices(&candidates), vec![1]);

        let kept = suppressor.suppress(&candidates);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_is_class_agnostic() {
        let candidates = vec![det(0, 0.9, 0, 0, 10, 10), det(5, 0.8, 1, 1, 10, 10)];
        let kept = Suppressor::default().keep_indices(&candidates);
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn test_nms_orders_by_confidence() {
        let candidates = vec![
            det(0, 0.65, 0, 0, 10, 10),
            det(1, 0.95, 100, 100, 10, 10),
            det(2, 0.8, 200, 200, 10, 10),
        ];
        let kept = Suppressor::default().keep_indices(&candidates);
        assert_eq!(kept, vec![1, 2, 0]);
    }

    #[test]
    fn test_nms_ties_keep_original_order() {
        let candidates = vec![
            det(0, 0.7, 0, 0, 10, 10),
            det(1, 0.7, 50, 50, 10, 10),
            det(2, 0.7, 1, 1, 10, 10),
        ];
        let suppressor = Suppressor::default();
        let kept = suppressor.keep_indices(&candidates);
        // Index 2 overlaps index 0 and loses the tie because it came later
        assert_eq!(kept, vec![0, 1]);
        assert_eq!(suppressor.keep_indices(&candidates), kept);
    }

    #[test]
    fn test_nms_iou_at_threshold_is_kept() {
        // IoU = 4000 / 10000 = 0.4 exactly, suppression needs strictly more
        let candidates = vec![det(0, 0.9, 0, 0, 100, 70), det(0, 0.8, 0, 30, 100, 70)];
        let iou = candidates[0].iou(&candidates[1]);
        assert!((iou - 0.4).abs() < 1e-6);
        assert_eq!(Suppressor::default().keep_indices(&candidates).len(), 2);
    }

    #[test]
    fn test_nms_score_threshold_is_strict() {
        let candidates = vec![det(0, 0.2, 0, 0, 10, 10), det(0, 0.21, 50, 50, 10, 10)];
        assert_eq!(Suppressor::default().keep_indices(&candidates), vec![1]);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(Suppressor::default().keep_indices(&[]).is_empty());
    }

    #[test]
    fn test_detection_display() {
        let d = det(3, 0.876, 1, 2, 3, 4);
        assert_eq!(
            d.to_string(),
            "Detection(class=3, confidence=0.88, bbox=(1, 2, 3, 4))"
        );
    }
}
