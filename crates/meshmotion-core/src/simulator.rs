//! Forward-Euler time stepping of a mesh under a velocity policy.

use std::path::PathBuf;

use crate::{OutputError, TetMesh, Vec3, VelocityPolicy, VtuSeries};

/// Moves the nodes of a [`TetMesh`] according to a [`VelocityPolicy`].
///
/// ```
/// # use meshmotion_core::{mesh::unit_tet_mesh, KinematicSimulator, RotateParams, VelocityPolicy};
/// let mut sim = KinematicSimulator::new(
///     unit_tet_mesh(),
///     VelocityPolicy::Rotate(RotateParams { omega: 15. }),
/// );
/// sim.advance(0.01);
/// let moved = sim.mesh().nodes()[1];
/// assert!((moved.y - 0.15).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct KinematicSimulator {
    mesh: TetMesh,
    policy: VelocityPolicy,
    velocity: Vec<Vec3>,
    time: f64,
}

impl KinematicSimulator {
    /// Set up a simulation at time zero.
    pub fn new(mesh: TetMesh, policy: VelocityPolicy) -> Self {
        let degenerate = policy.degenerate_nodes(&mesh);
        if !degenerate.is_empty() {
            log::warn!(
                "{} node(s) lie on the z-axis and will not move under the {} policy: {:?}",
                degenerate.len(),
                policy.name(),
                degenerate,
            );
        }

        let velocity = policy.initial_velocity(&mesh);
        Self {
            mesh,
            policy,
            velocity,
            time: 0.,
        }
    }

    /// Step the simulation forward by `tau`.
    ///
    /// Velocities are evaluated at the positions and time
    /// at the start of the step (explicit Euler).
    pub fn advance(&mut self, tau: f64) {
        debug_assert!(tau.is_finite(), "timestep must be finite, got {tau}");

        self.velocity = self.policy.velocity_field(&self.mesh, self.time);
        for (p, v) in self.mesh.nodes_mut().iter_mut().zip(&self.velocity) {
            *p += v * tau;
        }
        self.time += tau;

        log::debug!("advanced {} mesh to t = {}", self.policy.name(), self.time);
    }

    /// Write the current state as step `index` of a [`VtuSeries`].
    ///
    /// This only reads the simulation state;
    /// calling it twice in a row with the same index writes the same file twice.
    pub fn snapshot(&self, series: &mut VtuSeries, index: usize) -> Result<PathBuf, OutputError> {
        series.write_step(index, &self.frame())
    }

    /// A read-only view of the current state.
    pub fn frame(&self) -> Frame<'_> {
        Frame {
            time: self.time,
            nodes: self.mesh.nodes(),
            dist_sq_xy: self.mesh.dist_sq_xy(),
            velocity: &self.velocity,
            tetrahedra: self.mesh.tetrahedra(),
        }
    }

    /// Get the mesh in its current state.
    #[inline]
    pub fn mesh(&self) -> &TetMesh {
        &self.mesh
    }

    /// Get the active velocity policy.
    #[inline]
    pub fn policy(&self) -> &VelocityPolicy {
        &self.policy
    }

    /// Get the velocity field used in the latest step.
    #[inline]
    pub fn velocity(&self) -> &[Vec3] {
        &self.velocity
    }

    /// Get the current simulation time.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }
}

/// The state of a simulation at one point in time.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// Simulation time of the frame.
    pub time: f64,
    /// Node positions.
    pub nodes: &'a [Vec3],
    /// The frozen `x² + y²` field of the mesh.
    pub dist_sq_xy: &'a [f64],
    /// Node velocities.
    pub velocity: &'a [Vec3],
    /// 0-based tetrahedron connectivity.
    pub tetrahedra: &'a [[usize; 4]],
}
