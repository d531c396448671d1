//! Camera used for view-depth computation
//!
//! Only the view axis matters here: transparent sorting needs the distance of
//! each candidate along the camera's forward direction. Projection lives with
//! the platform layer.

use crate::foundation::math::{Point3, Unit, Vec3};

/// Position and view direction of the active camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Point3,

    /// Unit view direction in world space
    pub forward: Unit<Vec3>,
}

impl Camera {
    /// Create a camera from a position and view direction
    ///
    /// A zero-length direction falls back to looking down -Z.
    pub fn new(position: Point3, forward: Vec3) -> Self {
        let forward = Unit::try_new(forward, f32::EPSILON).unwrap_or_else(|| {
            log::warn!("Camera direction {:?} has no length; using -Z", forward);
            Unit::new_unchecked(Vec3::new(0.0, 0.0, -1.0))
        });
        Self { position, forward }
    }

    /// Camera at `position` looking at `target`
    pub fn look_at(position: Point3, target: Point3) -> Self {
        Self::new(position, target - position)
    }

    /// Signed distance of `point` along the view direction
    ///
    /// Larger values are farther from the camera; points behind it are negative.
    pub fn view_depth(&self, point: &Point3) -> f32 {
        (point - self.position).dot(&self.forward.into_inner())
    }

    /// Move the camera without changing its direction
    pub fn set_position(&mut self, position: Point3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }
}

impl Default for Camera {
    /// At the origin looking down -Z
    fn default() -> Self {
        Self::new(Point3::origin(), Vec3::new(0.0, 0.0, -1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_looks_down_negative_z() {
        let camera = Camera::default();
        assert_relative_eq!(camera.view_depth(&Point3::new(0.0, 0.0, -5.0)), 5.0);
        assert_relative_eq!(camera.view_depth(&Point3::new(3.0, 7.0, -5.0)), 5.0);
        assert_relative_eq!(camera.view_depth(&Point3::new(0.0, 0.0, 2.0)), -2.0);
    }

    #[test]
    fn test_look_at_normalizes_direction() {
        let camera = Camera::look_at(Point3::new(0.0, 0.0, 10.0), Point3::origin());
        assert_relative_eq!(camera.forward.norm(), 1.0);
        assert_relative_eq!(camera.view_depth(&Point3::origin()), 10.0);
    }

    #[test]
    fn test_degenerate_direction_falls_back() {
        let camera = Camera::new(Point3::origin(), Vec3::zeros());
        assert_relative_eq!(camera.forward.z, -1.0);
    }
}
