//! Auto-fit layout engine for resize-mode text frames.
//!
//! Recomputes a text box's extent from its measured text and the resolved
//! dominant font. Measurement itself is an injected capability; this module
//! only does the geometry. The padding and scale constants are preserved
//! rendering constants, chosen for compatibility with the desktop editor's
//! observed layout rather than derived from first principles.

use crate::error::{Error, Result};
use crate::pptx::presentation::Presentation;
use crate::pptx::shapes::shape::Transform;
use crate::pptx::shapes::textframe::AutofitMode;
use crate::pptx::style::fontdata::FontData;
use tracing::debug;

/// Ratio between measured text units (72 dpi) and device pixels (96 dpi).
/// 96/72 = 1.4 as the editor rounds it; preserved, not re-derived.
pub const MEASURE_TO_DEVICE_SCALE: f32 = 1.4;

/// EMU per device pixel at 96 dpi.
pub const EMU_PER_PIXEL: i64 = 9525;

/// Font size assumed when the cascade yields nothing, in hundredths of a
/// point.
pub const FALLBACK_FONT_SIZE: i32 = 1800;

/// Typeface assumed when the cascade yields nothing.
pub const FALLBACK_TYPEFACE: &str = "Calibri";

/// External text-measurement capability.
///
/// Given a typeface, a size in points and a string, returns the advance
/// width of the string and the height of a single line, both in device
/// pixels.
pub trait TextMeasurer {
    fn measure(&self, typeface: &str, size_pt: f32, text: &str) -> (f32, f32);
}

impl Presentation {
    /// Replace a shape's text and re-fit its box.
    ///
    /// Text changes are what trigger auto-fit; this is the combined entry
    /// point for callers that hold a measurer.
    pub fn set_text_autofit(
        &mut self,
        position: usize,
        shape_id: u32,
        text: &str,
        measurer: &dyn TextMeasurer,
    ) -> Result<()> {
        self.set_text(position, shape_id, text)?;
        self.autofit_shape(position, shape_id, measurer)
    }

    /// Re-fit a shape's box to its text.
    ///
    /// Applies only to auto shapes whose frame is in resize mode; everything
    /// else is a no-op, as is a frame with no portions or a measurement that
    /// comes back empty.
    pub fn autofit_shape(
        &mut self,
        position: usize,
        shape_id: u32,
        measurer: &dyn TextMeasurer,
    ) -> Result<()> {
        let slide_pn = self.slide_partname(position)?;

        let frame = {
            let tree = self.tree(&slide_pn)?;
            let shape = tree.shape(shape_id).ok_or_else(|| {
                Error::InvalidArgument(format!("no shape with id {}", shape_id))
            })?;
            match shape.text_frame()? {
                Some(frame) => frame,
                None => return Ok(()),
            }
        };
        if frame.body.autofit != AutofitMode::Resize {
            return Ok(());
        }
        let Some(first_para) = frame.paragraphs.first() else {
            return Ok(());
        };
        if first_para.portions.is_empty() {
            return Ok(());
        }

        // Dominant font: the size used by the largest number of the first
        // paragraph's portions, ties to first occurrence.
        let resolved = self.resolve_font(position, shape_id, first_para.level)?;
        let sizes: Vec<i32> = first_para
            .portions
            .iter()
            .map(|p| effective_size(&p.font, &resolved))
            .collect();
        let dominant_size = dominant(&sizes);
        let dominant_portion = first_para
            .portions
            .iter()
            .position(|p| effective_size(&p.font, &resolved) == dominant_size)
            .unwrap_or(0);
        let typeface = first_para.portions[dominant_portion]
            .font
            .latin
            .clone()
            .or_else(|| resolved.latin.clone())
            .unwrap_or_else(|| FALLBACK_TYPEFACE.to_string());
        let size_pt = dominant_size as f32 / 100.0;

        let text = frame.text();
        let (text_width, line_height) = measurer.measure(&typeface, size_pt, &text);
        if !text.is_empty() && text_width <= 0.0 {
            return Ok(());
        }

        let Some(transform) = self.effective_transform(position, shape_id)? else {
            return Ok(());
        };

        let margins = frame.body.margins;
        let l = margins.left as f32 / EMU_PER_PIXEL as f32;
        let r = margins.right as f32 / EMU_PER_PIXEL as f32;
        let t = margins.top as f32 / EMU_PER_PIXEL as f32;
        let b = margins.bottom as f32 / EMU_PER_PIXEL as f32;

        let new_transform = if frame.body.wrap {
            let box_width = transform.cx as f32 / EMU_PER_PIXEL as f32;
            let content_width = box_width - l - r;
            if content_width <= 0.0 {
                return Ok(());
            }

            let rows = if text.is_empty() {
                1.0
            } else {
                (text_width / content_width).ceil().max(1.0)
            };
            // Top and bottom margins are counted twice; this matches the
            // editor's own padding, empirically.
            let new_height = rows * line_height + 2.0 * (t + b);
            let new_cy = (new_height * EMU_PER_PIXEL as f32) as i64;

            // Growth expands symmetrically around the original center.
            let y_shift = (new_cy - transform.cy) / 2;

            Transform {
                x: transform.x,
                y: transform.y - y_shift,
                cx: transform.cx,
                cy: new_cy,
            }
        } else {
            // No wrapping: the box grows sideways to the longest paragraph.
            let longest = frame
                .paragraphs
                .iter()
                .map(|p| p.text())
                .max_by_key(|text| text.len())
                .unwrap_or_default();
            let (longest_width, _) = measurer.measure(&typeface, size_pt, &longest);
            let new_width = longest_width * MEASURE_TO_DEVICE_SCALE + l + r;

            Transform {
                x: transform.x,
                y: transform.y,
                cx: (new_width * EMU_PER_PIXEL as f32) as i64,
                cy: transform.cy,
            }
        };

        debug!(
            shape = shape_id,
            cx = new_transform.cx,
            cy = new_transform.cy,
            "auto-fit applied"
        );
        self.set_shape_transform(position, shape_id, new_transform)
    }
}

/// A portion's size after the cascade, with the terminal fallback applied.
fn effective_size(portion_font: &FontData, resolved: &FontData) -> i32 {
    portion_font
        .size
        .or(resolved.size)
        .unwrap_or(FALLBACK_FONT_SIZE)
}

/// The value occurring most often, ties broken by first occurrence.
fn dominant(values: &[i32]) -> i32 {
    let mut best = values[0];
    let mut best_count = 0usize;
    for &candidate in values {
        let count = values.iter().filter(|&&v| v == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::testpkg;

    /// Fixed-advance measurement stub: every glyph is `advance` wide.
    struct FixedMeasurer {
        advance: f32,
        line_height: f32,
    }

    impl TextMeasurer for FixedMeasurer {
        fn measure(&self, _typeface: &str, _size_pt: f32, text: &str) -> (f32, f32) {
            (self.advance * text.chars().count() as f32, self.line_height)
        }
    }

    const MEASURER: FixedMeasurer = FixedMeasurer {
        advance: 10.0,
        line_height: 20.0,
    };

    fn fixture() -> Presentation {
        Presentation::from_bytes(testpkg::minimal_pptx()).unwrap()
    }

    /// Height the engine computes for a row count, mirroring its arithmetic.
    fn expected_cy(rows: f32) -> i64 {
        let tb = 45720.0f32 / EMU_PER_PIXEL as f32;
        ((rows * 20.0 + 2.0 * (tb + tb)) * EMU_PER_PIXEL as f32) as i64
    }

    #[test]
    fn test_resize_sets_height_from_rows_and_margins() {
        let mut pres = fixture();
        // 40 chars at 10px over a 300.8px content width: two rows.
        let text = "x".repeat(40);
        pres.set_text_autofit(1, 3, &text, &MEASURER).unwrap();

        let t = pres.shape_transform(1, 3).unwrap().unwrap();
        assert_eq!(t.cy, expected_cy(2.0));
        // Width untouched in wrap mode.
        assert_eq!(t.cx, 3048000);
    }

    #[test]
    fn test_resize_recenters_vertically() {
        let mut pres = fixture();
        let before = pres.shape_transform(1, 3).unwrap().unwrap();

        let text = "x".repeat(40);
        pres.set_text_autofit(1, 3, &text, &MEASURER).unwrap();
        let after = pres.shape_transform(1, 3).unwrap().unwrap();

        // y moved by half the height delta, in the opposite direction.
        let delta = after.cy - before.cy;
        assert_eq!(after.y, before.y - delta / 2);
    }

    #[test]
    fn test_autofit_monotonic_under_appended_text() {
        let mut pres = fixture();
        let mut last_cy = 0i64;
        for len in [10usize, 40, 80, 160] {
            let text = "x".repeat(len);
            pres.set_text_autofit(1, 3, &text, &MEASURER).unwrap();
            let t = pres.shape_transform(1, 3).unwrap().unwrap();
            assert!(
                t.cy >= last_cy,
                "height decreased from {} to {} at len {}",
                last_cy,
                t.cy,
                len
            );
            last_cy = t.cy;
        }
    }

    #[test]
    fn test_empty_text_restores_single_row_height() {
        let mut pres = fixture();
        pres.set_text_autofit(1, 3, &"x".repeat(160), &MEASURER)
            .unwrap();
        let grown = pres.shape_transform(1, 3).unwrap().unwrap();

        pres.set_text_autofit(1, 3, "", &MEASURER).unwrap();
        let restored = pres.shape_transform(1, 3).unwrap().unwrap();

        assert_eq!(restored.cy, expected_cy(1.0));
        assert!(restored.cy < grown.cy);
    }

    #[test]
    fn test_no_wrap_grows_width_not_height() {
        let mut pres = fixture();
        {
            let slide = pres.slide_partname(1).unwrap();
            let tree = pres.tree_mut(&slide).unwrap();
            let shape = tree.shape_mut(3).unwrap();
            let mut frame = shape.text_frame().unwrap().unwrap();
            frame.set_wrap(false);
            shape.set_text_frame(&frame).unwrap();
        }
        let before = pres.shape_transform(1, 3).unwrap().unwrap();

        pres.set_text_autofit(1, 3, "short\nmuch longer paragraph", &MEASURER)
            .unwrap();
        let after = pres.shape_transform(1, 3).unwrap().unwrap();

        // Longest paragraph: 21 chars * 10px, scaled, plus side margins.
        let lr = 91440.0f32 / EMU_PER_PIXEL as f32;
        let expected_cx = ((210.0f32 * MEASURE_TO_DEVICE_SCALE + lr + lr)
            * EMU_PER_PIXEL as f32) as i64;
        assert_eq!(after.cx, expected_cx);
        assert_eq!(after.cy, before.cy);
    }

    #[test]
    fn test_non_resize_frame_is_untouched() {
        let mut pres = fixture();
        // Shape 2 has no autofit mode set.
        let before = pres.effective_transform(1, 2).unwrap();
        pres.set_text_autofit(1, 2, "some longer replacement text", &MEASURER)
            .unwrap();
        let after = pres.effective_transform(1, 2).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_no_portions_is_noop() {
        let mut pres = fixture();
        let before = pres.shape_transform(1, 3).unwrap().unwrap();
        {
            let slide = pres.slide_partname(1).unwrap();
            let tree = pres.tree_mut(&slide).unwrap();
            let shape = tree.shape_mut(3).unwrap();
            let mut frame = shape.text_frame().unwrap().unwrap();
            frame.paragraphs[0].portions.clear();
            shape.set_text_frame(&frame).unwrap();
        }
        pres.autofit_shape(1, 3, &MEASURER).unwrap();
        assert_eq!(pres.shape_transform(1, 3).unwrap().unwrap(), before);
    }

    #[test]
    fn test_dominant_prefers_count_then_first() {
        assert_eq!(dominant(&[1800, 2400, 2400]), 2400);
        assert_eq!(dominant(&[1800, 2400]), 1800);
        assert_eq!(dominant(&[2400]), 2400);
    }
}
