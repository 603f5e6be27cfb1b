use crate::bars::MAX_BAR_LEVEL;
use crate::config::{Rgb, VizConfig};

/// Pixels of half-height per smoothed level; a level-20 bar spans
/// 160 px around the midline.
pub const HEIGHT_SCALE: i32 = 4;

/// Gap between the text baseline and the bottom edge of the overlay.
const TEXT_BOTTOM_MARGIN: i32 = 30;

/// One bar rectangle in client pixels. `w` is always at least 1.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BarRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// The now-playing line with its anchor: horizontal center of the text,
/// at the baseline.
#[derive(Clone, PartialEq, Debug)]
pub struct TextLine {
    pub content: String,
    pub color: Rgb,
    pub center_x: i32,
    pub baseline_y: i32,
}

/// One fully composed frame, ready for the host to paint in a single
/// pass.
#[derive(Clone, PartialEq, Debug)]
pub struct FramePlan {
    pub background: Rgb,
    pub bar_color: Rgb,
    pub bars: Vec<BarRect>,
    pub text: Option<TextLine>,
}

/// Lays out one frame from a consistent snapshot of shared state.
///
/// `heights` may be shorter or longer than the configured bar count:
/// missing bars draw at height zero and surplus entries are ignored.
/// Degenerate client sizes clamp the bar width to 1 instead of failing,
/// and all geometry saturates rather than overflowing.
pub fn compose(
    width: i32,
    height: i32,
    config: &VizConfig,
    heights: &[i32],
    now_playing: Option<String>,
) -> FramePlan {
    let bar_count = config.bar_count.max(1);
    let total_spacing = (bar_count - 1).saturating_mul(config.bar_spread);
    let bar_width = (width.saturating_sub(total_spacing) / bar_count)
        .saturating_mul(config.bar_width_multiplier)
        .max(1);
    let stride = bar_width.saturating_add(config.bar_spread);
    let mid = height / 2;

    let mut bars = Vec::with_capacity(bar_count as usize);
    for i in 0..bar_count {
        let level = heights
            .get(i as usize)
            .copied()
            .unwrap_or(0)
            .clamp(0, MAX_BAR_LEVEL);
        let half = level * HEIGHT_SCALE;
        bars.push(BarRect {
            x: i.saturating_mul(stride),
            y: mid - half,
            w: bar_width,
            h: half * 2,
        });
    }

    let text = now_playing.map(|content| TextLine {
        content,
        color: config.text_color,
        center_x: width / 2,
        baseline_y: height - TEXT_BOTTOM_MARGIN,
    });

    FramePlan {
        background: Rgb::BLACK,
        bar_color: config.bar_color,
        bars,
        text,
    }
}
