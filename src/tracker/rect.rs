/// Bounding box in pixel space, TLWH form (top-left x, top-left y, width,
/// height).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Rect {
    /// Create a new Rect from top-left coordinates and dimensions.
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from corner form (top-left x/y, bottom-right x/y).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Convert to corner form: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Get the area of the bounding box.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Move the box so its center lands on (cx, cy), keeping its size.
    #[inline]
    pub fn centered_at(&self, cx: f32, cy: f32) -> Rect {
        Rect::new(
            cx - self.width / 2.0,
            cy - self.height / 2.0,
            self.width,
            self.height,
        )
    }

    /// Whether any part of the box overlaps the region [0, width) x [0, height).
    pub fn overlaps_bounds(&self, width: f32, height: f32) -> bool {
        self.x < width && self.y < height && self.x + self.width > 0.0 && self.y + self.height > 0.0
    }

    /// Calculate Intersection over Union (IoU) with another bounding box.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_width = (x2 - x1).max(0.0);
        let inter_height = (y2 - y1).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Normalize to [0, 1] coordinates relative to a frame of the given size.
    pub fn normalize(&self, width: u32, height: u32) -> NormRect {
        let w = width as f32;
        let h = height as f32;
        NormRect {
            xmin: self.x / w,
            ymin: self.y / h,
            xmax: (self.x + self.width) / w,
            ymax: (self.y + self.height) / h,
        }
    }
}

/// Bounding box in normalized [0, 1] coordinates, corner form.
///
/// This is the form detectors report boxes in, relative to the frame the
/// detector actually consumed (the preprocessed frame, not the source frame).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormRect {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl NormRect {
    #[inline]
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Clamp all coordinates into [0, 1].
    ///
    /// Detectors occasionally report corners slightly outside the unit
    /// square; boxes are clamped before any pixel-space conversion.
    #[inline]
    pub fn clamped(&self) -> NormRect {
        NormRect {
            xmin: self.xmin.clamp(0.0, 1.0),
            ymin: self.ymin.clamp(0.0, 1.0),
            xmax: self.xmax.clamp(0.0, 1.0),
            ymax: self.ymax.clamp(0.0, 1.0),
        }
    }

    /// Denormalize into the pixel space of a frame of the given size.
    pub fn denormalize(&self, width: u32, height: u32) -> Rect {
        let c = self.clamped();
        let w = width as f32;
        let h = height as f32;
        Rect::from_tlbr(c.xmin * w, c.ymin * h, c.xmax * w, c.ymax * h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_conversions() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);
        assert_eq!(rect.center(), (25.0, 40.0));
        assert_eq!(rect.area(), 1200.0);
    }

    #[test]
    fn test_from_tlbr() {
        let rect = Rect::from_tlbr(10.0, 20.0, 40.0, 60.0);
        assert_eq!(rect, Rect::new(10.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);

        // Intersection: 5x5 = 25
        // Union: 100 + 100 - 25 = 175
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_same_box() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_overlaps_bounds() {
        let inside = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(inside.overlaps_bounds(100.0, 100.0));

        let straddling = Rect::new(-10.0, -10.0, 20.0, 20.0);
        assert!(straddling.overlaps_bounds(100.0, 100.0));

        let gone = Rect::new(120.0, 10.0, 20.0, 20.0);
        assert!(!gone.overlaps_bounds(100.0, 100.0));
    }

    #[test]
    fn test_norm_round_trip() {
        let norm = NormRect::new(0.1, 0.2, 0.45, 0.8);
        let pixel = norm.denormalize(1280, 720);
        let back = pixel.normalize(1280, 720);

        assert!((back.xmin - norm.xmin).abs() < 1e-5);
        assert!((back.ymin - norm.ymin).abs() < 1e-5);
        assert!((back.xmax - norm.xmax).abs() < 1e-5);
        assert!((back.ymax - norm.ymax).abs() < 1e-5);
    }

    #[test]
    fn test_denormalize_clamps() {
        let norm = NormRect::new(-0.2, 0.0, 1.3, 0.5);
        let pixel = norm.denormalize(100, 100);
        assert_eq!(pixel.x, 0.0);
        assert_eq!(pixel.x + pixel.width, 100.0);
    }
}
