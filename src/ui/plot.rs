use std::path::{Path, PathBuf};

use image::{ImageResult, Rgb, RgbImage};

use crate::classify::NearTie;
use crate::color::generate_palette;

// ---------------------------------------------------------------------------
// Near-tie figure
// ---------------------------------------------------------------------------

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 800;
const MARGIN: u32 = 60;
/// Retention-time padding either side of the candidates.
const RT_PADDING: f64 = 50.0;
const MARK_SIZE: u32 = 8;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GREY: Rgb<u8> = Rgb([150, 150, 150]);
const POINT: Rgb<u8> = Rgb([220, 30, 30]);

/// File name of the figure for `tie`; path separators in the sample
/// identifier are replaced.
pub fn figure_name(tie: &NearTie) -> String {
    let sample: String = tie
        .sample_id
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("Sample {sample} Chain {} rt {}.png", tie.chain, tie.target_rt)
}

/// Maps data coordinates onto the plot area.
struct Frame {
    x_min: f64,
    x_max: f64,
    y_max: f64,
}

impl Frame {
    fn for_tie(tie: &NearTie) -> Self {
        let rts = tie.candidates.iter().map(|c| c.rt).chain([tie.target_rt]);
        let (lo, hi) = rts.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), rt| {
            (lo.min(rt), hi.max(rt))
        });
        let x_min = lo - RT_PADDING;
        let x_max = hi + RT_PADDING;
        let y_max = tie
            .trace
            .iter()
            .filter(|(rt, _)| (x_min..=x_max).contains(rt))
            .map(|(_, area)| *area)
            .fold(0.0_f64, f64::max);
        Self {
            x_min,
            x_max,
            y_max: if y_max > 0.0 { y_max * 1.1 } else { 1.0 },
        }
    }

    fn px(&self, rt: f64) -> i64 {
        let span = (WIDTH - 2 * MARGIN) as f64;
        MARGIN as i64 + ((rt - self.x_min) / (self.x_max - self.x_min) * span).round() as i64
    }

    fn py(&self, area: f64) -> i64 {
        let span = (HEIGHT - 2 * MARGIN) as f64;
        (HEIGHT - MARGIN) as i64 - (area.max(0.0) / self.y_max * span).round() as i64
    }
}

/// Draw the injection's retention-time/area trace with every candidate
/// marked. Candidate `i` (1-based) gets a coloured vertical line topped by
/// `i` stacked squares.
pub fn render_near_tie(tie: &NearTie) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, WHITE);
    let frame = Frame::for_tie(tie);
    let (left, bottom) = (MARGIN as i64, (HEIGHT - MARGIN) as i64);
    let (right, top) = ((WIDTH - MARGIN) as i64, MARGIN as i64);

    // Axes
    draw_line(&mut img, (left, bottom), (right, bottom), BLACK, None);
    draw_line(&mut img, (left, bottom), (left, top), BLACK, None);

    // Target retention time
    let tx = frame.px(tie.target_rt);
    draw_line(&mut img, (tx, bottom), (tx, top), GREY, Some(4));

    let visible: Vec<(i64, i64)> = tie
        .trace
        .iter()
        .filter(|(rt, _)| (frame.x_min..=frame.x_max).contains(rt))
        .map(|&(rt, area)| (frame.px(rt), frame.py(area)))
        .collect();
    for pair in visible.windows(2) {
        draw_line(&mut img, pair[0], pair[1], BLACK, Some(6));
    }
    for &(x, y) in &visible {
        fill_rect(&mut img, x - 4, y - 4, 9, 9, BLACK);
        fill_rect(&mut img, x - 3, y - 3, 7, 7, POINT);
    }

    let colors = generate_palette(tie.candidates.len());
    for (i, (candidate, color)) in tie.candidates.iter().zip(colors).enumerate() {
        let x = frame.px(candidate.rt);
        draw_line(&mut img, (x, bottom), (x, top), color, Some(8));
        for k in 0..=i as i64 {
            let y = top - 4 - k * (MARK_SIZE as i64 + 3);
            fill_rect(
                &mut img,
                x - MARK_SIZE as i64 / 2,
                y - MARK_SIZE as i64,
                MARK_SIZE,
                MARK_SIZE,
                color,
            );
        }
    }
    img
}

/// Render `tie` into `dir` and return the written path.
pub fn save_near_tie(tie: &NearTie, dir: &Path) -> ImageResult<PathBuf> {
    let path = dir.join(figure_name(tie));
    render_near_tie(tie).save(&path)?;
    log::debug!("Near-tie figure written to {}", path.display());
    Ok(path)
}

// -- raster helpers --

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_rect(img: &mut RgbImage, x: i64, y: i64, w: u32, h: u32, color: Rgb<u8>) {
    for dy in 0..h as i64 {
        for dx in 0..w as i64 {
            put(img, x + dx, y + dy, color);
        }
    }
}

/// Bresenham line; `dash` gives the on/off run length in pixels.
fn draw_line(
    img: &mut RgbImage,
    from: (i64, i64),
    to: (i64, i64),
    color: Rgb<u8>,
    dash: Option<i64>,
) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut step = 0_i64;
    loop {
        if dash.map_or(true, |d| (step / d) % 2 == 0) {
            put(img, x, y, color);
        }
        if (x, y) == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        step += 1;
    }
}
