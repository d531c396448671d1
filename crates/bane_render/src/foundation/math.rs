//! Math utilities and types
//!
//! Provides the small set of math types the render core needs for transforms
//! and view-depth computation.

pub use nalgebra::{Matrix4, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Extension helpers for transform matrices
pub trait Mat4Ext {
    /// World-space position stored in the translation column
    fn world_position(&self) -> Point3;
}

impl Mat4Ext for Mat4 {
    fn world_position(&self) -> Point3 {
        Point3::new(self.m14, self.m24, self.m34)
    }
}
