//! Frame types that cross the pipeline's stage boundaries.

use std::time::Duration;

use crate::error::PipelineError;
use crate::pipeline::preprocess::ViewTransform;

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    /// Interleaved BGR, 3 bytes per pixel
    #[default]
    Bgr8,
    /// Planar BGR, three full planes back to back
    Bgr8Planar,
    /// Single-channel grayscale
    Gray8,
}

impl PixelLayout {
    #[inline]
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Bgr8 | PixelLayout::Bgr8Planar => 3,
            PixelLayout::Gray8 => 1,
        }
    }
}

/// A timestamped, sequence-numbered image frame.
///
/// Immutable once produced. Frames move through queues by ownership
/// transfer; the detection branch works on an explicit copy, so no two
/// stages ever share a buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    /// Monotonic capture timestamp.
    pub timestamp: Duration,
    /// Monotonically increasing sequence number assigned by the source.
    /// Never reused, even for dropped frames.
    pub seq: u64,
}

impl Frame {
    /// Create a frame, validating that the buffer matches the declared
    /// layout and dimensions.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        layout: PixelLayout,
        timestamp: Duration,
        seq: u64,
    ) -> Result<Self, PipelineError> {
        let expected = width as usize * height as usize * layout.channels();
        if width == 0 || height == 0 || data.len() != expected {
            return Err(PipelineError::InvalidFrameFormat(format!(
                "{}x{} {:?} needs {} bytes, got {}",
                width,
                height,
                layout,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            layout,
            timestamp,
            seq,
        })
    }

    /// Read one pixel as BGR, regardless of layout. Grayscale is replicated
    /// across all three channels. Coordinates must be in bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y * self.width + x) as usize;
        match self.layout {
            PixelLayout::Bgr8 => {
                let base = idx * 3;
                [self.data[base], self.data[base + 1], self.data[base + 2]]
            }
            PixelLayout::Bgr8Planar => {
                let plane = (self.width * self.height) as usize;
                [self.data[idx], self.data[plane + idx], self.data[2 * plane + idx]]
            }
            PixelLayout::Gray8 => {
                let v = self.data[idx];
                [v, v, v]
            }
        }
    }
}

/// A frame resized and reformatted for the detector, plus the transform
/// needed to map detector output back into the source frame's pixel space.
///
/// Also serves as the detector's passthrough frame: every detection batch
/// carries the preprocessed frame it was computed from.
#[derive(Debug, Clone)]
pub struct PreprocessedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    /// Sequence number of the source frame this was prepared from.
    pub seq: u64,
    pub transform: ViewTransform,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_short_buffer() {
        let err = Frame::new(vec![0; 10], 4, 4, PixelLayout::Bgr8, Duration::ZERO, 0);
        assert!(matches!(err, Err(PipelineError::InvalidFrameFormat(_))));
    }

    #[test]
    fn test_pixel_layouts_agree() {
        // 2x1 frame, pixels (1,2,3) and (4,5,6)
        let interleaved = Frame::new(
            vec![1, 2, 3, 4, 5, 6],
            2,
            1,
            PixelLayout::Bgr8,
            Duration::ZERO,
            0,
        )
        .unwrap();
        let planar = Frame::new(
            vec![1, 4, 2, 5, 3, 6],
            2,
            1,
            PixelLayout::Bgr8Planar,
            Duration::ZERO,
            0,
        )
        .unwrap();

        assert_eq!(interleaved.pixel(0, 0), planar.pixel(0, 0));
        assert_eq!(interleaved.pixel(1, 0), planar.pixel(1, 0));
    }

    #[test]
    fn test_gray_pixel_replicates() {
        let gray =
            Frame::new(vec![7, 9], 2, 1, PixelLayout::Gray8, Duration::ZERO, 0).unwrap();
        assert_eq!(gray.pixel(1, 0), [9, 9, 9]);
    }
}
