//! Line-of-sight test between a detecting surface and a source point.
//!
//! A point is visible when it lies strictly in the open half-space the
//! surface normal points into. Points on the surface plane are not visible.

use crate::detector::DetectingSurface;
use crate::shapes::{Geometry, Source, SourceKind};
use crate::vec3::Vec3;

/// `offset` is the source point relative to the surface centre.
#[inline]
pub fn faces(normal: Vec3, offset: Vec3) -> bool {
    normal.dot(&offset) > 0.0
}

#[inline]
pub fn is_visible(surface: &DetectingSurface, point: Vec3) -> bool {
    faces(surface.normal, point - surface.center)
}

/// Pre-integration cull for a work item.
///
/// Only point sources can be rejected up front; finite sources always
/// return `true` here and are tested per sample inside the integrand.
pub fn passes_precheck(surface: &DetectingSurface, source: &Source) -> bool {
    match source.kind() {
        SourceKind::Point => is_visible(surface, source.center()),
        SourceKind::Line | SourceKind::Area | SourceKind::Volume => true,
    }
}
