//! Frame preprocessing for the detection branch.
//!
//! A pure, stateless transform: bilinear resize to the detector's required
//! shape plus pixel-layout conversion. Aspect ratio is either distorted to
//! fill the target (keeps the full field of view, the usual choice for
//! detection networks) or preserved with letterbox padding.

use crate::error::PipelineError;
use crate::pipeline::frame::{Frame, PixelLayout, PreprocessedFrame};
use crate::tracker::{NormRect, Rect};

/// Aspect-ratio handling during resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectMode {
    /// Squash to the target shape; nothing is cropped or padded.
    #[default]
    Distort,
    /// Scale uniformly and pad the short axis.
    Preserve,
}

/// Target shape and layout the detector requires.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub aspect: AspectMode,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: 544,
            height: 320,
            layout: PixelLayout::Bgr8Planar,
            aspect: AspectMode::Distort,
        }
    }
}

/// Mapping from a preprocessed frame's normalized coordinates back into the
/// source frame's pixel space.
///
/// Rides on every [`PreprocessedFrame`] so detections can be denormalized
/// without the tracker knowing how the frame was resized.
#[derive(Debug, Clone, Copy)]
pub struct ViewTransform {
    pub src_width: u32,
    pub src_height: u32,
    pub dst_width: u32,
    pub dst_height: u32,
    scale_x: f32,
    scale_y: f32,
    pad_x: f32,
    pad_y: f32,
}

impl ViewTransform {
    /// Transform for detections reported directly in a frame's own
    /// normalized coordinates (no resize involved).
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            src_width: width,
            src_height: height,
            dst_width: width,
            dst_height: height,
            scale_x: 1.0,
            scale_y: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        }
    }

    fn new(src_width: u32, src_height: u32, config: &PreprocessConfig) -> Self {
        let (sw, sh) = (src_width as f32, src_height as f32);
        let (dw, dh) = (config.width as f32, config.height as f32);
        let (scale_x, scale_y, pad_x, pad_y) = match config.aspect {
            AspectMode::Distort => (dw / sw, dh / sh, 0.0, 0.0),
            AspectMode::Preserve => {
                let scale = (dw / sw).min(dh / sh);
                (scale, scale, (dw - scale * sw) / 2.0, (dh - scale * sh) / 2.0)
            }
        };
        Self {
            src_width,
            src_height,
            dst_width: config.width,
            dst_height: config.height,
            scale_x,
            scale_y,
            pad_x,
            pad_y,
        }
    }

    /// Map a normalized detector box into source-frame pixel space.
    pub fn to_source(&self, bbox: &NormRect) -> Rect {
        let b = bbox.clamped();
        let x1 = (b.xmin * self.dst_width as f32 - self.pad_x) / self.scale_x;
        let y1 = (b.ymin * self.dst_height as f32 - self.pad_y) / self.scale_y;
        let x2 = (b.xmax * self.dst_width as f32 - self.pad_x) / self.scale_x;
        let y2 = (b.ymax * self.dst_height as f32 - self.pad_y) / self.scale_y;

        let (sw, sh) = (self.src_width as f32, self.src_height as f32);
        Rect::from_tlbr(
            x1.clamp(0.0, sw),
            y1.clamp(0.0, sh),
            x2.clamp(0.0, sw),
            y2.clamp(0.0, sh),
        )
    }
}

/// Stateless frame resizer/reformatter.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Resize and reformat a frame into the detector's required shape.
    ///
    /// Fails with `InvalidFrameFormat` if the frame's buffer does not match
    /// its declared dimensions; no state is retained between calls.
    pub fn prepare(&self, frame: &Frame) -> Result<PreprocessedFrame, PipelineError> {
        let expected = frame.width as usize * frame.height as usize * frame.layout.channels();
        if frame.width == 0 || frame.height == 0 || frame.data.len() != expected {
            return Err(PipelineError::InvalidFrameFormat(format!(
                "frame {}: {}x{} {:?} buffer holds {} bytes, expected {}",
                frame.seq,
                frame.width,
                frame.height,
                frame.layout,
                frame.data.len(),
                expected
            )));
        }

        let transform = ViewTransform::new(frame.width, frame.height, &self.config);
        let (dw, dh) = (self.config.width, self.config.height);
        let mut data = vec![0u8; dw as usize * dh as usize * self.config.layout.channels()];

        for ty in 0..dh {
            for tx in 0..dw {
                let sx = (tx as f32 + 0.5 - transform.pad_x) / transform.scale_x - 0.5;
                let sy = (ty as f32 + 0.5 - transform.pad_y) / transform.scale_y - 0.5;
                if sx <= -1.0
                    || sy <= -1.0
                    || sx >= frame.width as f32
                    || sy >= frame.height as f32
                {
                    continue; // letterbox padding stays zeroed
                }
                let bgr = sample_bilinear(frame, sx, sy);
                write_pixel(&mut data, self.config.layout, dw, dh, tx, ty, bgr);
            }
        }

        Ok(PreprocessedFrame {
            data,
            width: dw,
            height: dh,
            layout: self.config.layout,
            seq: frame.seq,
            transform,
        })
    }
}

fn sample_bilinear(frame: &Frame, sx: f32, sy: f32) -> [u8; 3] {
    let sx = sx.clamp(0.0, frame.width as f32 - 1.0);
    let sy = sy.clamp(0.0, frame.height as f32 - 1.0);
    let x0 = sx.floor() as u32;
    let y0 = sy.floor() as u32;
    let x1 = (x0 + 1).min(frame.width - 1);
    let y1 = (y0 + 1).min(frame.height - 1);
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let p00 = frame.pixel(x0, y0);
    let p10 = frame.pixel(x1, y0);
    let p01 = frame.pixel(x0, y1);
    let p11 = frame.pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    out
}

fn write_pixel(
    data: &mut [u8],
    layout: PixelLayout,
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    bgr: [u8; 3],
) {
    let idx = (y * width + x) as usize;
    match layout {
        PixelLayout::Bgr8 => {
            data[idx * 3..idx * 3 + 3].copy_from_slice(&bgr);
        }
        PixelLayout::Bgr8Planar => {
            let plane = (width * height) as usize;
            data[idx] = bgr[0];
            data[plane + idx] = bgr[1];
            data[2 * plane + idx] = bgr[2];
        }
        PixelLayout::Gray8 => {
            // BT.601 luma from BGR
            let luma =
                0.114 * bgr[0] as f32 + 0.587 * bgr[1] as f32 + 0.299 * bgr[2] as f32;
            data[idx] = luma.round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn solid_frame(width: u32, height: u32, bgr: [u8; 3]) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&bgr);
        }
        Frame::new(data, width, height, PixelLayout::Bgr8, Duration::ZERO, 0).unwrap()
    }

    #[test]
    fn test_distort_fills_target() {
        let pre = Preprocessor::new(PreprocessConfig {
            width: 8,
            height: 4,
            layout: PixelLayout::Bgr8,
            aspect: AspectMode::Distort,
        });
        let out = pre.prepare(&solid_frame(16, 16, [10, 20, 30])).unwrap();

        assert_eq!((out.width, out.height), (8, 4));
        // every output pixel carries the source color, no padding anywhere
        for chunk in out.data.chunks(3) {
            assert_eq!(chunk, [10, 20, 30]);
        }
    }

    #[test]
    fn test_preserve_letterboxes() {
        // 2:1 source into a square target pads top and bottom
        let pre = Preprocessor::new(PreprocessConfig {
            width: 8,
            height: 8,
            layout: PixelLayout::Bgr8,
            aspect: AspectMode::Preserve,
        });
        let out = pre.prepare(&solid_frame(16, 8, [10, 20, 30])).unwrap();

        let row = |y: u32| &out.data[(y * 8 * 3) as usize..((y + 1) * 8 * 3) as usize];
        assert!(row(0).iter().all(|&b| b == 0));
        assert!(row(7).iter().all(|&b| b == 0));
        assert_eq!(&row(4)[..3], [10, 20, 30]);
    }

    #[test]
    fn test_preserve_transform_round_trips() {
        let pre = Preprocessor::new(PreprocessConfig {
            width: 100,
            height: 100,
            layout: PixelLayout::Bgr8,
            aspect: AspectMode::Preserve,
        });
        let out = pre.prepare(&solid_frame(100, 50, [0, 0, 0])).unwrap();

        // content occupies the middle half vertically
        let rect = out
            .transform
            .to_source(&NormRect::new(0.0, 0.25, 1.0, 0.75));
        assert!((rect.x).abs() < 1e-3);
        assert!((rect.y).abs() < 1e-3);
        assert!((rect.width - 100.0).abs() < 1e-3);
        assert!((rect.height - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_distort_transform_is_plain_denorm() {
        let pre = Preprocessor::new(PreprocessConfig::default());
        let out = pre.prepare(&solid_frame(1280, 720, [0, 0, 0])).unwrap();

        let rect = out
            .transform
            .to_source(&NormRect::new(0.1, 0.1, 0.3, 0.3));
        assert!((rect.x - 128.0).abs() < 1e-2);
        assert!((rect.y - 72.0).abs() < 1e-2);
        assert!((rect.width - 256.0).abs() < 1e-2);
        assert!((rect.height - 144.0).abs() < 1e-2);
    }

    #[test]
    fn test_malformed_frame_rejected() {
        let pre = Preprocessor::new(PreprocessConfig::default());
        let mut frame = solid_frame(4, 4, [0, 0, 0]);
        frame.data.truncate(10); // buffer no longer matches layout
        assert!(matches!(
            pre.prepare(&frame),
            Err(PipelineError::InvalidFrameFormat(_))
        ));
    }

    #[test]
    fn test_planar_output_layout() {
        let pre = Preprocessor::new(PreprocessConfig {
            width: 2,
            height: 2,
            layout: PixelLayout::Bgr8Planar,
            aspect: AspectMode::Distort,
        });
        let out = pre.prepare(&solid_frame(4, 4, [1, 2, 3])).unwrap();

        assert_eq!(out.data, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
    }
}
