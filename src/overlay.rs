//! Screen-space tessellation for the 2D overlay.
//!
//! Everything here is pure: shapes go in, interleaved `x, y, u, v` triangle
//! lists come out, in window pixels with the origin at the bottom left. The
//! scene uploads the result into its shared overlay buffer and draws it.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec2;

use crate::backend::{TextureId, VertexLayout};
use crate::error::{GfxError, Result};
use crate::font::GlyphSource;

/// Floats per overlay vertex.
pub const OVERLAY_VERTEX_WIDTH: usize = VertexLayout::Overlay.width();

/// Horizontal alignment of a text block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[inline]
fn push(out: &mut Vec<f32>, p: Vec2, uv: [f32; 2]) {
    out.extend_from_slice(&[p.x, p.y, uv[0], uv[1]]);
}

fn push_quad(out: &mut Vec<f32>, a: Vec2, b: Vec2, c: Vec2, d: Vec2) {
    // a b c d counter-clockwise
    for p in [a, b, c, c, d, a] {
        push(out, p, [0.0, 0.0]);
    }
}

// ── solid shapes ──────────────────────────────────────────────────────────

/// Axis-aligned rectangle spanning two opposite corners.
pub fn rectangle(p1: Vec2, p2: Vec2) -> Vec<f32> {
    let mut out = Vec::with_capacity(6 * OVERLAY_VERTEX_WIDTH);
    let corners = [
        (Vec2::new(p1.x, p1.y), [0.0, 0.0]),
        (Vec2::new(p2.x, p1.y), [1.0, 0.0]),
        (Vec2::new(p2.x, p2.y), [1.0, 1.0]),
        (Vec2::new(p2.x, p2.y), [1.0, 1.0]),
        (Vec2::new(p1.x, p2.y), [0.0, 1.0]),
        (Vec2::new(p1.x, p1.y), [0.0, 0.0]),
    ];
    for (p, uv) in corners {
        push(&mut out, p, uv);
    }
    out
}

fn perimeter(center: Vec2, radius: f32, segments: u32, i: u32) -> Vec2 {
    let angle = TAU * i as f32 / segments as f32;
    center + radius * Vec2::new(angle.cos(), angle.sin())
}

/// Filled circle: a fan around the centre, expanded into a triangle list.
pub fn circle(center: Vec2, radius: f32, segments: u32) -> Vec<f32> {
    let segments = segments.max(3);
    let mut out = Vec::with_capacity(segments as usize * 3 * OVERLAY_VERTEX_WIDTH);
    for i in 0..segments {
        push(&mut out, center, [0.0, 0.0]);
        push(&mut out, perimeter(center, radius, segments, i), [0.0, 0.0]);
        push(&mut out, perimeter(center, radius, segments, i + 1), [0.0, 0.0]);
    }
    out
}

/// Ring of the given thickness, centred on `radius - thickness / 4`.
pub fn circle_outline(center: Vec2, radius: f32, thickness: f32, segments: u32) -> Vec<f32> {
    let segments = segments.max(3);
    let mid = radius - 0.25 * thickness;
    let inner = (mid - 0.5 * thickness).max(0.0);
    let outer = mid + 0.5 * thickness;
    let mut out = Vec::with_capacity(segments as usize * 6 * OVERLAY_VERTEX_WIDTH);
    for i in 0..segments {
        push_quad(
            &mut out,
            perimeter(center, inner, segments, i),
            perimeter(center, outer, segments, i),
            perimeter(center, outer, segments, i + 1),
            perimeter(center, inner, segments, i + 1),
        );
    }
    out
}

// ── strokes ───────────────────────────────────────────────────────────────

/// Segment from `p1` to `p2` as a quad `thickness` wide. Zero-length
/// segments produce nothing.
pub fn line(p1: Vec2, p2: Vec2, thickness: f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(6 * OVERLAY_VERTEX_WIDTH);
    push_segment(&mut out, p1, p2, thickness);
    out
}

fn push_segment(out: &mut Vec<f32>, p1: Vec2, p2: Vec2, thickness: f32) {
    let Some(dir) = (p2 - p1).try_normalize() else {
        return;
    };
    let offset = dir.perp() * (0.5 * thickness);
    push_quad(out, p1 - offset, p2 - offset, p2 + offset, p1 + offset);
}

/// Open polyline through `points`, one quad per segment.
pub fn polyline(points: &[Vec2], thickness: f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(points.len().saturating_sub(1) * 6 * OVERLAY_VERTEX_WIDTH);
    for pair in points.windows(2) {
        push_segment(&mut out, pair[0], pair[1], thickness);
    }
    out
}

/// Arrow from `tail` to `tip`: a shaft `thickness` wide ending at the back
/// edge of a triangular head `√3 · thickness` long and `2 · thickness` wide.
pub fn arrow(tail: Vec2, tip: Vec2, thickness: f32) -> Vec<f32> {
    let delta = tip - tail;
    let direction = delta.y.atan2(delta.x);
    let perp = direction + FRAC_PI_2;
    let along = Vec2::new(direction.cos(), direction.sin());
    let across = Vec2::new(perp.cos(), perp.sin());

    let head_height = 3f32.sqrt() * thickness;
    let back = tip - head_height * along;
    let shaft = 0.5 * thickness * across;
    let wing = thickness * across;

    let mut out = Vec::with_capacity(9 * OVERLAY_VERTEX_WIDTH);
    for p in [
        tail + shaft,
        tail - shaft,
        back - shaft,
        back - shaft,
        back + shaft,
        tail + shaft,
        back - wing,
        tip,
        back + wing,
    ] {
        push(&mut out, p, [0.0, 0.0]);
    }
    out
}

// ── text ──────────────────────────────────────────────────────────────────

/// One textured glyph quad ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphQuad {
    pub texture: TextureId,
    pub vertices: [f32; 6 * OVERLAY_VERTEX_WIDTH],
}

/// Where and how to lay out a block of text.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextLayout {
    /// Pen position of the first baseline.
    pub origin: Vec2,
    /// Wrap width in pixels. With a width, alignment is within
    /// `[origin.x, origin.x + width]`; without, it is around `origin.x`.
    pub max_width: Option<f32>,
    pub align: TextAlign,
    pub scale: f32,
}

impl TextLayout {
    pub fn at(origin: Vec2) -> Self {
        Self { origin, max_width: None, align: TextAlign::Left, scale: 1.0 }
    }

    pub fn with_max_width(mut self, width: f32) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

struct Line {
    chars: Vec<char>,
    advance: f32,
}

/// Breaks `text` into lines on `\n` and on overflowing the wrap width.
fn break_lines(font: &impl GlyphSource, text: &str, layout: &TextLayout) -> Result<Vec<Line>> {
    if !font.is_ready() {
        return Err(GfxError::FontNotReady);
    }
    let scale = layout.scale;
    let mut lines = Vec::new();
    let mut current = Line { chars: Vec::new(), advance: 0.0 };

    for ch in text.chars() {
        if ch == '\n' {
            lines.push(std::mem::replace(&mut current, Line { chars: Vec::new(), advance: 0.0 }));
            continue;
        }
        let glyph = font.glyph(ch).ok_or(GfxError::MissingGlyph(ch))?;
        if let Some(width) = layout.max_width {
            let right = current.advance + (glyph.bearing.0 as f32 + glyph.size.0 as f32) * scale;
            if right > width && !current.chars.is_empty() {
                lines.push(std::mem::replace(&mut current, Line { chars: Vec::new(), advance: 0.0 }));
            }
        }
        current.advance += glyph.advance_px() as f32 * scale;
        current.chars.push(ch);
    }
    lines.push(current);
    Ok(lines)
}

/// Lays `text` out into per-glyph quads. Glyphs without a bitmap only advance
/// the pen.
///
/// Fails with [`GfxError::FontNotReady`] for a font that did not load.
pub fn layout_text(font: &impl GlyphSource, text: &str, layout: &TextLayout) -> Result<Vec<GlyphQuad>> {
    let scale = layout.scale;
    let line_height = font.size() * scale;
    let mut quads = Vec::with_capacity(text.len());

    for (row, line) in break_lines(font, text, layout)?.iter().enumerate() {
        let offset = match (layout.align, layout.max_width) {
            (TextAlign::Left, _) => 0.0,
            (TextAlign::Center, Some(width)) => 0.5 * (width - line.advance),
            (TextAlign::Right, Some(width)) => width - line.advance,
            (TextAlign::Center, None) => -0.5 * line.advance,
            (TextAlign::Right, None) => -line.advance,
        };
        let mut x = layout.origin.x + offset;
        let y = layout.origin.y - row as f32 * line_height;

        for &ch in &line.chars {
            let glyph = font.glyph(ch).ok_or(GfxError::MissingGlyph(ch))?;
            if let Some(texture) = glyph.texture {
                let x0 = x + glyph.bearing.0 as f32 * scale;
                let y0 = y + (glyph.bearing.1 - glyph.size.1 as i32) as f32 * scale;
                let x1 = x0 + glyph.size.0 as f32 * scale;
                let y1 = y0 + glyph.size.1 as f32 * scale;
                // bitmap rows run top to bottom, so v is flipped
                #[rustfmt::skip]
                let vertices = [
                    x0, y0, 0.0, 1.0,
                    x1, y0, 1.0, 1.0,
                    x1, y1, 1.0, 0.0,
                    x1, y1, 1.0, 0.0,
                    x0, y1, 0.0, 0.0,
                    x0, y0, 0.0, 1.0,
                ];
                quads.push(GlyphQuad { texture, vertices });
            }
            x += glyph.advance_px() as f32 * scale;
        }
    }
    Ok(quads)
}

/// Advance sum of the widest line, after wrapping.
pub fn measure_text(font: &impl GlyphSource, text: &str, layout: &TextLayout) -> Result<f32> {
    Ok(break_lines(font, text, layout)?
        .iter()
        .map(|l| l.advance)
        .fold(0.0, f32::max))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::RenderBackend;
    use crate::font::{Font, Glyph};
    use crate::recording::RecordingBackend;
    use crate::texture::{PixelFormat, TextureImage};
    use approx::assert_abs_diff_eq;

    /// Monospace test font: every printable glyph is 8x10 with a 10px advance.
    pub(crate) fn mono_font(gfx: &mut impl RenderBackend) -> Font {
        let bitmap = TextureImage::new(8, 10, PixelFormat::R8, vec![255; 80]).unwrap();
        let glyphs: Vec<(char, Glyph)> = (b' '..=b'~')
            .map(|code| {
                let ch = char::from(code);
                let texture = (ch != ' ').then(|| gfx.create_texture(&bitmap).unwrap());
                (ch, Glyph { texture, size: (8, 10), bearing: (1, 9), advance: 10 << 6 })
            })
            .collect();
        Font::from_glyphs(16.0, glyphs)
    }

    fn points(data: &[f32]) -> Vec<Vec2> {
        data.chunks_exact(OVERLAY_VERTEX_WIDTH).map(|v| Vec2::new(v[0], v[1])).collect()
    }

    fn signed_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
        (b - a).perp_dot(c - a)
    }

    #[test]
    fn rectangle_covers_the_corners() {
        let pts = points(&rectangle(Vec2::new(10.0, 20.0), Vec2::new(30.0, 50.0)));
        assert_eq!(pts.len(), 6);
        for p in pts {
            assert!(p.x == 10.0 || p.x == 30.0);
            assert!(p.y == 20.0 || p.y == 50.0);
        }
    }

    #[test]
    fn circle_is_a_fan_of_ccw_triangles() {
        let center = Vec2::new(50.0, 50.0);
        let pts = points(&circle(center, 10.0, 100));
        assert_eq!(pts.len(), 300);
        for tri in pts.chunks_exact(3) {
            assert_eq!(tri[0], center);
            assert_abs_diff_eq!(tri[1].distance(center), 10.0, epsilon = 1e-4);
            assert!(signed_area(tri[0], tri[1], tri[2]) > 0.0);
        }
    }

    #[test]
    fn outline_ring_is_centred_a_quarter_thickness_inside() {
        let center = Vec2::ZERO;
        let pts = points(&circle_outline(center, 20.0, 4.0, 64));
        let (min, max) = pts
            .iter()
            .map(|p| p.length())
            .fold((f32::MAX, f32::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));
        assert_abs_diff_eq!(min, 17.0, epsilon = 1e-3);
        assert_abs_diff_eq!(max, 21.0, epsilon = 1e-3);
        assert_abs_diff_eq!(0.5 * (min + max), 20.0 - 4.0 / 4.0, epsilon = 1e-3);
    }

    #[test]
    fn line_has_requested_thickness() {
        let pts = points(&line(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 4.0));
        assert_eq!(pts.len(), 6);
        assert!(pts.iter().all(|p| p.y.abs() == 2.0));
        assert!(line(Vec2::ONE, Vec2::ONE, 3.0).is_empty());
    }

    #[test]
    fn polyline_emits_a_quad_per_segment() {
        let path = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)];
        assert_eq!(polyline(&path, 1.0).len(), 2 * 6 * OVERLAY_VERTEX_WIDTH);
        assert!(polyline(&path[..1], 1.0).is_empty());
    }

    #[test]
    fn horizontal_arrow_geometry() {
        let pts = points(&arrow(Vec2::ZERO, Vec2::new(10.0, 0.0), 2.0));
        assert_eq!(pts.len(), 9);
        let back = 10.0 - 3f32.sqrt() * 2.0;

        // shaft: half-width 1 on both sides, ending at the head's back edge
        for p in &pts[..6] {
            assert_abs_diff_eq!(p.y.abs(), 1.0, epsilon = 1e-5);
            assert!(p.x.abs() < 1e-5 || (p.x - back).abs() < 1e-4);
        }
        // head
        assert_abs_diff_eq!(pts[6].x, back, epsilon = 1e-4);
        assert_abs_diff_eq!(pts[6].y, -2.0, epsilon = 1e-5);
        assert_eq!(pts[7], Vec2::new(10.0, 0.0));
        assert_abs_diff_eq!(pts[8].x, back, epsilon = 1e-4);
        assert_abs_diff_eq!(pts[8].y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn text_advances_by_whole_pixels_and_skips_blank_glyphs() {
        let font = mono_font(&mut RecordingBackend::new());
        let quads = layout_text(&font, "a b", &TextLayout::at(Vec2::new(100.0, 200.0))).unwrap();
        assert_eq!(quads.len(), 2);
        // x = pen + bearing, y = baseline + bearing_y - height
        assert_eq!(quads[0].vertices[0], 101.0);
        assert_eq!(quads[0].vertices[1], 199.0);
        assert_eq!(quads[1].vertices[0], 121.0);
    }

    #[test]
    fn newline_and_width_both_wrap() {
        let font = mono_font(&mut RecordingBackend::new());
        let layout = TextLayout::at(Vec2::new(0.0, 100.0)).with_max_width(35.0);
        let quads = layout_text(&font, "abcdef\ng", &layout).unwrap();
        let origins: Vec<(f32, f32)> = quads.iter().map(|q| (q.vertices[0], q.vertices[1])).collect();
        // three glyphs fit in 35px: 0..9, 10..19, 20..29; the fourth would end at 39
        assert_eq!(origins[0], (1.0, 99.0));
        assert_eq!(origins[3], (1.0, 99.0 - 16.0));
        assert_eq!(origins[6], (1.0, 99.0 - 32.0));
    }

    #[test]
    fn alignment_uses_measured_advance() {
        let font = mono_font(&mut RecordingBackend::new());
        let base = TextLayout::at(Vec2::new(0.0, 0.0)).with_max_width(100.0);
        let right = layout_text(&font, "ab", &base.with_align(TextAlign::Right)).unwrap();
        assert_eq!(right[0].vertices[0], 100.0 - 20.0 + 1.0);
        let center = layout_text(&font, "ab", &base.with_align(TextAlign::Center)).unwrap();
        assert_eq!(center[0].vertices[0], 40.0 + 1.0);

        let free = TextLayout::at(Vec2::new(50.0, 0.0)).with_align(TextAlign::Right);
        assert_eq!(layout_text(&font, "ab", &free).unwrap()[0].vertices[0], 31.0);
        assert_eq!(measure_text(&font, "ab\nabcd", &free).unwrap(), 40.0);
    }

    #[test]
    fn scale_applies_to_metrics() {
        let font = mono_font(&mut RecordingBackend::new());
        let quads = layout_text(&font, "ab", &TextLayout::at(Vec2::ZERO).with_scale(2.0)).unwrap();
        assert_eq!(quads[1].vertices[0], 20.0 + 2.0);
        assert_eq!(quads[0].vertices[4] - quads[0].vertices[0], 16.0);
    }

    #[test]
    fn missing_glyph_is_an_error() {
        let font = mono_font(&mut RecordingBackend::new());
        let err = layout_text(&font, "aé", &TextLayout::at(Vec2::ZERO)).unwrap_err();
        assert!(matches!(err, GfxError::MissingGlyph('é')));
    }

    #[test]
    fn unready_font_cannot_lay_out_text() {
        let font = Font::not_ready(16.0);
        let layout = TextLayout::at(Vec2::ZERO);
        assert!(matches!(layout_text(&font, "a", &layout), Err(GfxError::FontNotReady)));
        assert!(matches!(measure_text(&font, "", &layout), Err(GfxError::FontNotReady)));
    }
}
