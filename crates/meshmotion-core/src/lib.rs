//! This is the core crate containing all of `meshmotion`'s simulation functionality.
//! See the `meshmotion` crate for the run configuration and the command line driver.
//!
//! A [`TetMesh`] is loaded from a gmsh file (see [`gmsh`]),
//! handed to a [`KinematicSimulator`] together with a [`VelocityPolicy`],
//! and stepped forward in time while [`VtuSeries`] writes one
//! VTK file per step for viewing in e.g. ParaView.

#![warn(missing_docs)]

pub mod mesh;
#[doc(inline)]
pub use mesh::{BoundingBox, MeshError, TetMesh};

pub mod velocity;
#[doc(inline)]
pub use velocity::{EatParams, ExplodeParams, RotateParams, VelocityPolicy};

pub mod simulator;
#[doc(inline)]
pub use simulator::{Frame, KinematicSimulator};

pub mod vtk;
#[doc(inline)]
pub use vtk::{OutputError, VtuSeries};

pub mod gmsh;

// nalgebra re-exports of common types for convenience

pub use nalgebra as na;
/// Type alias for a 3D `nalgebra` vector.
pub type Vec3 = na::Vector3<f64>;
