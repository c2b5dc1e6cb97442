//! The two shared overlays the interaction controller drives: one
//! tooltip and one annotation layer.

use serde::Serialize;

/// A tooltip that can be shown with content at a position, or hidden.
pub trait TooltipHandle {
    fn show(&mut self, content: &str, left: f64, top: f64);
    fn hide(&mut self);
}

/// The static annotation callouts, toggled as a single layer.
pub trait AnnotationHandle {
    fn set_visible(&mut self, visible: bool);
}

/// Tooltip state as a renderer or API client would apply it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooltip {
    pub opacity: f64,
    pub content: String,
    pub left: f64,
    pub top: f64,
    #[serde(skip)]
    shown_opacity: f64,
}

impl Tooltip {
    pub fn new(shown_opacity: f64) -> Self {
        Tooltip {
            opacity: 0.0,
            content: String::new(),
            left: 0.0,
            top: 0.0,
            shown_opacity,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }
}

impl TooltipHandle for Tooltip {
    fn show(&mut self, content: &str, left: f64, top: f64) {
        self.opacity = self.shown_opacity;
        self.content = content.to_string();
        self.left = left;
        self.top = top;
    }

    // Content and position are left in place, only the opacity changes.
    fn hide(&mut self) {
        self.opacity = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnotationLayer {
    pub opacity: f64,
}

impl Default for AnnotationLayer {
    fn default() -> Self {
        AnnotationLayer { opacity: 1.0 }
    }
}

impl AnnotationLayer {
    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }
}

impl AnnotationHandle for AnnotationLayer {
    fn set_visible(&mut self, visible: bool) {
        self.opacity = if visible { 1.0 } else { 0.0 };
    }
}
