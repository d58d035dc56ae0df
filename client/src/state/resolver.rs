//! Viewport resolver: which registered message sits nearest the centre of
//! the visible band.
//!
//! Geometry is owned here and nowhere else. Extents are registered as
//! message elements mount and dropped as they unmount; message indices come
//! from the ordered message list supplied by the history collaborator.

#[cfg(test)]
#[path = "resolver_test.rs"]
mod resolver_test;

use std::collections::HashMap;

use frames::ScrollMetrics;
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Vertical extent of one rendered message, in content coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub top: f64,
    pub height: f64,
}

impl Extent {
    #[must_use]
    pub fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// Visible band of the scroll container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerGeometry {
    pub scroll_top: f64,
    pub client_height: f64,
}

impl ContainerGeometry {
    #[must_use]
    pub fn center(&self) -> f64 {
        self.scroll_top + self.client_height / 2.0
    }
}

impl From<ScrollMetrics> for ContainerGeometry {
    fn from(m: ScrollMetrics) -> Self {
        Self { scroll_top: m.scroll_top, client_height: m.client_height }
    }
}

/// The winning message of one resolution pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub message_index: usize,
    pub message_id: String,
}

#[derive(Debug, Default)]
pub struct ViewportResolver {
    extents: HashMap<String, Extent>,
    order: HashMap<String, usize>,
    container: Option<ContainerGeometry>,
}

impl ViewportResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mounted message, or unregister it when `extent` is `None`.
    pub fn register_message(&mut self, id: &str, extent: Option<Extent>) {
        match extent {
            Some(extent) => {
                self.extents.insert(id.to_owned(), extent);
            }
            None => {
                self.extents.remove(id);
            }
        }
    }

    /// Replace the ordered message list. Position in `ids` is the message index.
    pub fn set_messages(&mut self, ids: &[String]) {
        self.order = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
    }

    /// Update the container band; `None` marks the container unmounted.
    pub fn set_container(&mut self, container: Option<ContainerGeometry>) {
        self.container = container;
    }

    /// Resolve the centred message.
    ///
    /// Registered messages missing from the ordered list are skipped.
    /// Equidistant candidates resolve to the lower index.
    ///
    /// # Errors
    ///
    /// [`GeometryError`] when the container is unmounted or has no visible
    /// height, or no indexed message is registered.
    pub fn try_resolve(&self) -> Result<Resolution, GeometryError> {
        let container = self.container.ok_or(GeometryError::ContainerUnmounted)?;
        if container.client_height <= 0.0 || !container.client_height.is_finite() || !container.scroll_top.is_finite() {
            return Err(GeometryError::ZeroSizedContainer);
        }
        let center = container.center();

        self.extents
            .iter()
            .filter_map(|(id, extent)| {
                let index = *self.order.get(id)?;
                Some((index, id, (extent.center() - center).abs()))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)))
            .map(|(index, id, _)| Resolution { message_index: index, message_id: id.clone() })
            .ok_or(GeometryError::NoMessages)
    }

    #[must_use]
    pub fn resolve(&self) -> Option<Resolution> {
        self.try_resolve().ok()
    }

    #[must_use]
    pub fn registered(&self) -> usize {
        self.extents.len()
    }

    pub fn clear(&mut self) {
        self.extents.clear();
        self.order.clear();
        self.container = None;
    }
}
