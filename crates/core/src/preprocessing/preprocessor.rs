use std::time::Instant;

use image::imageops::FilterType;

use crate::preprocessing::histogram_stats::HistogramStats;
use crate::shared::frame::Frame;
use crate::shared::gray_frame::GrayFrame;
use crate::shared::timing::{elapsed_ms, round_ms};

/// Output of [`Preprocessor::preprocess`].
#[derive(Clone, Debug)]
pub struct PreprocessedFrame {
    /// Downscaled colour frame; this is what the detector sees and what
    /// gets JPEG-encoded into the record.
    pub color: Frame,
    /// Stretched grayscale working frame for motion estimation.
    pub gray: GrayFrame,
    pub stretch: HistogramStats,
}

/// Downscales a raw frame by a fixed integer factor, converts it to
/// grayscale and stretches its histogram to `[0, 255]`.
#[derive(Clone, Debug)]
pub struct Preprocessor {
    downscale_factor: u32,
}

impl Preprocessor {
    pub fn new(downscale_factor: u32) -> Result<Self, &'static str> {
        if downscale_factor < 1 {
            return Err("downscale_factor must be >= 1");
        }
        Ok(Self { downscale_factor })
    }

    pub fn preprocess(&self, frame: &Frame) -> PreprocessedFrame {
        let color = downscale(frame, self.downscale_factor);
        let gray = to_grayscale(&color);
        let (gray, stretch) = histogram_stretch(&gray);
        PreprocessedFrame {
            color,
            gray,
            stretch,
        }
    }
}

/// Shrinks both dimensions by `factor` (integer division, never below one
/// pixel) with bilinear filtering. The frame index is preserved.
pub fn downscale(frame: &Frame, factor: u32) -> Frame {
    if factor <= 1 {
        return frame.clone();
    }
    let new_w = (frame.width() / factor).max(1);
    let new_h = (frame.height() / factor).max(1);

    let Some(img) = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
    else {
        return frame.clone();
    };
    let resized = image::imageops::resize(&img, new_w, new_h, FilterType::Triangle);
    Frame::new(resized.into_raw(), new_w, new_h, frame.index())
}

/// ITU-R BT.601 luma in 14-bit fixed point, rounded.
pub fn to_grayscale(frame: &Frame) -> GrayFrame {
    let rgb = frame.as_ndarray();
    GrayFrame::from_fn(frame.width(), frame.height(), |x, y| {
        let r = rgb[[y, x, 0]] as u32;
        let g = rgb[[y, x, 1]] as u32;
        let b = rgb[[y, x, 2]] as u32;
        ((r * 4899 + g * 9617 + b * 1868 + 8192) >> 14) as u8
    })
}

/// Min–max stretch to `[0, 255]`.
///
/// A frame whose extrema differ by less than one grey level is returned
/// unchanged.
pub fn histogram_stretch(gray: &GrayFrame) -> (GrayFrame, HistogramStats) {
    let start = Instant::now();
    let (imin, imax) = gray.min_max().unwrap_or((0, 0));

    if imax - imin < 1 {
        let stats = HistogramStats::new(imin as i32, imax as i32, round_ms(elapsed_ms(start)));
        return (gray.clone(), stats);
    }

    let lo = imin as u32;
    let range = (imax - imin) as u32;
    let stretched = gray
        .pixels()
        .mapv(|p| ((p as u32 - lo) * 255 / range).min(255) as u8);

    let stats = HistogramStats::new(imin as i32, imax as i32, round_ms(elapsed_ms(start)));
    (GrayFrame::new(stretched), stats)
}
