//! Label collection and placement
//!
//! Labels are gathered while features are drawn and placed at the end so
//! that the most important ones claim space first. A label is dropped when
//! its buffered bounding box touches one already placed.

use glam::DVec2;

use super::canvas::Canvas;
use super::renderer::Renderer;
use crate::errors::RenderError;
use crate::log::debug;
use crate::symbol::{FontSet, LabelDef, compute_label_style};
use crate::types::Rect;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelCandidate {
    pub text: String,
    /// Anchor in image pixels.
    pub at: DVec2,
    pub label: LabelDef,
}

#[derive(Debug, Clone, Default)]
pub struct LabelCache {
    candidates: Vec<LabelCandidate>,
    placed: Vec<Rect>,
}

impl LabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, text: impl Into<String>, at: DVec2, label: LabelDef) {
        self.candidates.push(LabelCandidate {
            text: text.into(),
            at,
            label,
        });
    }

    pub fn candidates(&self) -> &[LabelCandidate] {
        &self.candidates
    }

    /// Boxes of the labels placed so far.
    pub fn placed(&self) -> &[Rect] {
        &self.placed
    }

    /// Reserve space no label may cover, such as a legend.
    pub fn reserve(&mut self, rect: Rect) {
        self.placed.push(rect);
    }

    fn collides(&self, rect: &Rect) -> bool {
        self.placed.iter().any(|p| p.overlaps(rect))
    }

    /// Candidates by descending priority, keeping insertion order within a
    /// priority.
    fn take_ordered(&mut self) -> Vec<LabelCandidate> {
        let mut candidates = std::mem::take(&mut self.candidates);
        candidates.sort_by(|a, b| b.label.priority.cmp(&a.label.priority));
        candidates
    }
}

impl<R: Renderer> Canvas<R> {
    /// Draw the collected labels that fit. Returns how many were drawn.
    pub fn place_labels(&mut self, fontset: &FontSet, scale_factor: f64) -> Result<usize, RenderError> {
        let extent = self.extent();
        let mut drawn = 0;
        for candidate in self.labels.take_ordered() {
            if candidate.text.is_empty() {
                continue;
            }
            let style = compute_label_style(&candidate.label, fontset, scale_factor)?;
            let (dx, dy) = candidate.label.offset;
            let at = candidate.at + DVec2::new(dx, dy) * scale_factor;
            let bbox = self
                .renderer
                .glyph_bbox(&style.font, style.size, &candidate.text)?
                .translated(at.x, at.y)
                .buffered(candidate.label.buffer * scale_factor);

            if !candidate.label.partials && !bbox.is_contained_in(&extent) {
                debug!(text = %candidate.text, "label runs off the image");
                continue;
            }
            if self.labels.collides(&bbox) {
                debug!(text = %candidate.text, "label collides");
                continue;
            }
            self.draw_text(at, &candidate.text, &candidate.label, fontset, scale_factor)?;
            self.labels.placed.push(bbox);
            drawn += 1;
        }
        Ok(drawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::RecordingRenderer;

    fn fonts() -> FontSet {
        FontSet::new().with_font("sans", "sans.ttf")
    }

    fn label(priority: i32) -> LabelDef {
        LabelDef {
            priority,
            size: 10.0,
            ..LabelDef::new("sans")
        }
    }

    fn texts(canvas: &Canvas<RecordingRenderer>) -> Vec<String> {
        canvas
            .image()
            .calls
            .iter()
            .filter_map(|c| c.split('"').nth(1).map(str::to_string))
            .collect()
    }

    #[test]
    fn overlapping_labels_keep_the_higher_priority() {
        let mut canvas = Canvas::new(RecordingRenderer::new(), 200, 100).unwrap();
        canvas.labels_mut().add("low", DVec2::new(20.0, 50.0), label(1));
        canvas.labels_mut().add("high", DVec2::new(25.0, 52.0), label(5));
        canvas.labels_mut().add("far", DVec2::new(150.0, 50.0), label(1));

        assert_eq!(canvas.place_labels(&fonts(), 1.0).unwrap(), 2);
        assert_eq!(texts(&canvas), vec!["high", "far"]);
        assert!(canvas.labels().candidates().is_empty());
        assert_eq!(canvas.labels().placed().len(), 2);
    }

    #[test]
    fn buffer_widens_the_collision_box() {
        let mut canvas = Canvas::new(RecordingRenderer::new(), 200, 100).unwrap();
        canvas.labels_mut().add("ab", DVec2::new(10.0, 50.0), label(1));
        canvas.labels_mut().add("cd", DVec2::new(40.0, 50.0), label(1));
        assert_eq!(canvas.place_labels(&fonts(), 1.0).unwrap(), 2);

        let mut canvas = Canvas::new(RecordingRenderer::new(), 200, 100).unwrap();
        let buffered = LabelDef {
            buffer: 10.0,
            ..label(1)
        };
        canvas.labels_mut().add("ab", DVec2::new(10.0, 50.0), buffered.clone());
        canvas.labels_mut().add("cd", DVec2::new(40.0, 50.0), buffered);
        assert_eq!(canvas.place_labels(&fonts(), 1.0).unwrap(), 1);
    }

    #[test]
    fn partials_control_labels_at_the_edge() {
        let mut canvas = Canvas::new(RecordingRenderer::new(), 100, 100).unwrap();
        let whole = LabelDef {
            partials: false,
            ..label(1)
        };
        canvas.labels_mut().add("edge", DVec2::new(90.0, 50.0), whole);
        canvas.labels_mut().add("edge", DVec2::new(90.0, 20.0), label(1));
        assert_eq!(canvas.place_labels(&fonts(), 1.0).unwrap(), 1);
    }

    #[test]
    fn reserved_space_is_avoided() {
        let mut canvas = Canvas::new(RecordingRenderer::new(), 100, 100).unwrap();
        canvas.labels_mut().reserve(Rect::new(0.0, 0.0, 100.0, 60.0));
        canvas.labels_mut().add("hidden", DVec2::new(10.0, 50.0), label(1));
        canvas.labels_mut().add("shown", DVec2::new(10.0, 90.0), label(1));
        assert_eq!(canvas.place_labels(&fonts(), 1.0).unwrap(), 1);
        assert_eq!(texts(&canvas), vec!["shown"]);
    }
}
