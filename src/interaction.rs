//! Hover interaction over rendered regions.
//!
//! The controller is a two-state machine. In `Idle` every region sits at
//! the default opacity without a border, the tooltip is hidden and the
//! annotation layer is visible. In `Hovering` exactly one region is
//! highlighted, every other region is dimmed, the tooltip shows the
//! hovered region and the annotation layer is hidden.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::InteractionConfig;
use crate::format::format_value;
use crate::overlay::{AnnotationHandle, TooltipHandle};
use crate::types::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InteractionState {
    Idle,
    Hovering { region: usize },
}

/// Pointer position in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pointer {
    pub page_x: f64,
    pub page_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionStyle {
    pub opacity: f64,
    pub bordered: bool,
}

#[derive(Debug, Clone)]
struct HoverTarget {
    id: String,
    value: f64,
}

pub struct InteractionController<T, A> {
    config: InteractionConfig,
    targets: Vec<HoverTarget>,
    by_id: HashMap<String, usize>,
    styles: Vec<RegionStyle>,
    state: InteractionState,
    tooltip: T,
    annotation: A,
}

impl<T: TooltipHandle, A: AnnotationHandle> InteractionController<T, A> {
    /// Takes ownership of the overlays and puts everything in the `Idle`
    /// presentation.
    pub fn new(regions: &[Region], config: InteractionConfig, tooltip: T, annotation: A) -> Self {
        let targets: Vec<HoverTarget> = regions
            .iter()
            .map(|r| HoverTarget { id: r.id.clone(), value: r.value })
            .collect();

        let mut by_id = HashMap::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            by_id.entry(target.id.clone()).or_insert(i);
        }

        let mut controller = InteractionController {
            styles: vec![RegionStyle { opacity: config.default_opacity, bordered: false }; targets.len()],
            config,
            targets,
            by_id,
            state: InteractionState::Idle,
            tooltip,
            annotation,
        };
        controller.on_hover_end();
        controller
    }

    /// Highlights region `index` and dims the rest. Hovering a new region
    /// while another is hovered replaces it.
    pub fn on_hover(&mut self, index: usize, pointer: Pointer) -> Result<()> {
        let Some(target) = self.targets.get(index) else {
            bail!("No region at index {} ({} regions)", index, self.targets.len());
        };

        let dimmed = RegionStyle { opacity: self.config.dimmed_opacity, bordered: false };
        self.styles.fill(dimmed);
        self.styles[index] = RegionStyle { opacity: self.config.highlight_opacity, bordered: true };

        let content = format!("{}: {}", target.id, format_value(target.value));
        self.tooltip.show(&content, pointer.page_x, pointer.page_y - self.config.tooltip_offset_y);
        self.annotation.set_visible(false);

        debug!(region = %target.id, "hover");
        self.state = InteractionState::Hovering { region: index };
        Ok(())
    }

    pub fn on_hover_id(&mut self, id: &str, pointer: Pointer) -> Result<()> {
        let index = self.index_of(id).ok_or_else(|| anyhow!("Unknown region '{}'", id))?;
        self.on_hover(index, pointer)
    }

    /// Back to `Idle`. Calling it while already idle is harmless.
    pub fn on_hover_end(&mut self) {
        let resting = RegionStyle { opacity: self.config.default_opacity, bordered: false };
        self.styles.fill(resting);
        self.tooltip.hide();
        self.annotation.set_visible(true);

        if let InteractionState::Hovering { region } = self.state {
            debug!(region = %self.targets[region].id, "hover end");
        }
        self.state = InteractionState::Idle;
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn hovered_id(&self) -> Option<&str> {
        match self.state {
            InteractionState::Idle => None,
            InteractionState::Hovering { region } => Some(&self.targets[region].id),
        }
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn region_id(&self, index: usize) -> Option<&str> {
        self.targets.get(index).map(|t| t.id.as_str())
    }

    pub fn style(&self, index: usize) -> Option<RegionStyle> {
        self.styles.get(index).copied()
    }

    pub fn styles(&self) -> &[RegionStyle] {
        &self.styles
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn tooltip(&self) -> &T {
        &self.tooltip
    }

    pub fn annotation(&self) -> &A {
        &self.annotation
    }
}
