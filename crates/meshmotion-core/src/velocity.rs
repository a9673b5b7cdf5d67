//! Rules assigning a velocity to every node of a mesh.
//!
//! Three motions are available, selected with [`VelocityPolicy`]:
//! - [`Rotate`][VelocityPolicy::Rotate] spins the mesh around the z-axis,
//! - [`Eat`][VelocityPolicy::Eat] pulses the mesh radially in the xy-plane
//!   with a phase that travels down from `max_z`,
//! - [`Explode`][VelocityPolicy::Explode] pushes every node away from the origin.
//!
//! # Frozen reference quantities
//!
//! The radial policies divide by distances measured in the mesh's
//! reference configuration ([`TetMesh::dist_sq_xy`] and the reference node heights),
//! not in the current one. The velocity direction follows the current position
//! but its normalization does not.
//!
//! # Nodes on the z-axis
//!
//! A node with `x² + y² == 0` in the reference configuration
//! has no radial direction in the xy-plane.
//! [`Eat`][VelocityPolicy::Eat] and [`Explode`][VelocityPolicy::Explode]
//! give such nodes zero velocity instead of dividing by zero.
//! Use [`VelocityPolicy::degenerate_nodes`] to find them.

use itertools::izip;

use crate::{TetMesh, Vec3};

/// Parameters of [`VelocityPolicy::Rotate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotateParams {
    /// Angular velocity around the z-axis. Default: 15.
    pub omega: f64,
}

impl Default for RotateParams {
    fn default() -> Self {
        Self { omega: 15. }
    }
}

/// Parameters of [`VelocityPolicy::Eat`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EatParams {
    /// Amplitude of the pulsation. Default: 100.
    pub max_velocity: f64,
    /// Angular frequency of the pulsation. Default: 50.
    pub omega: f64,
    /// Height where the pulsation phase is zero. Default: 20.
    pub max_z: f64,
}

impl Default for EatParams {
    fn default() -> Self {
        Self {
            max_velocity: 100.,
            omega: 50.,
            max_z: 20.,
        }
    }
}

impl EatParams {
    /// Default parameters, except with `max_z` placed at 90% of the mesh's height.
    pub fn fitted(mesh: &TetMesh) -> Self {
        Self {
            max_z: 0.9 * mesh.bounds().max.z,
            ..Default::default()
        }
    }
}

/// Parameters of [`VelocityPolicy::Explode`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExplodeParams {
    /// Speed of each node at the start of the explosion. Default: 1000.
    pub velocity: f64,
}

impl Default for ExplodeParams {
    fn default() -> Self {
        Self { velocity: 1000. }
    }
}

/// The rule used to compute node velocities each timestep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VelocityPolicy {
    /// Rigid rotation around the z-axis, `v = (-ω y, ω x, z₀)`,
    /// where `z₀` is the node's reference height.
    Rotate(RotateParams),
    /// Radial pulsation in the xy-plane,
    /// `v = A(t, z) p / √(x₀² + y₀²)` with the z-component zeroed,
    /// where `A(t, z) = max_velocity · sin(ω t - (max_z - z) / 10)`.
    Eat(EatParams),
    /// Radial motion away from the origin,
    /// `v = velocity · p / |p₀|`.
    Explode(ExplodeParams),
}

impl VelocityPolicy {
    /// Compute the velocity of every node
    /// given the mesh's current positions and the simulation time.
    ///
    /// The returned vector has one entry per node, in node order.
    pub fn velocity_field(&self, mesh: &TetMesh, time: f64) -> Vec<Vec3> {
        let nodes = mesh.nodes();
        let reference = mesh.reference_nodes();
        let dist_sq_xy = mesh.dist_sq_xy();

        match *self {
            Self::Rotate(RotateParams { omega }) => izip!(nodes, reference)
                .map(|(p, p0)| Vec3::new(-omega * p.y, omega * p.x, p0.z))
                .collect(),
            Self::Eat(EatParams {
                max_velocity,
                omega,
                max_z,
            }) => izip!(nodes, dist_sq_xy)
                .map(|(p, &d2)| {
                    if d2 == 0. {
                        return Vec3::zeros();
                    }
                    let amplitude = max_velocity * f64::sin(omega * time - (max_z - p.z) / 10.);
                    let mut v = amplitude * p / d2.sqrt();
                    v.z = 0.;
                    v
                })
                .collect(),
            Self::Explode(ExplodeParams { velocity }) => izip!(nodes, reference, dist_sq_xy)
                .map(|(p, p0, &d2)| {
                    if d2 == 0. {
                        return Vec3::zeros();
                    }
                    velocity * p / (d2 + p0.z * p0.z).sqrt()
                })
                .collect(),
        }
    }

    /// The velocity field before the first timestep.
    ///
    /// This is zero everywhere except for [`Rotate`][Self::Rotate],
    /// whose z-component is the reference height from the start.
    pub fn initial_velocity(&self, mesh: &TetMesh) -> Vec<Vec3> {
        match self {
            Self::Rotate(_) => mesh
                .reference_nodes()
                .iter()
                .map(|p0| Vec3::new(0., 0., p0.z))
                .collect(),
            Self::Eat(_) | Self::Explode(_) => vec![Vec3::zeros(); mesh.node_count()],
        }
    }

    /// Indices of nodes whose velocity this policy clamps to zero
    /// because they lie on the z-axis.
    pub fn degenerate_nodes(&self, mesh: &TetMesh) -> Vec<usize> {
        match self {
            Self::Rotate(_) => Vec::new(),
            Self::Eat(_) | Self::Explode(_) => mesh
                .dist_sq_xy()
                .iter()
                .enumerate()
                .filter_map(|(i, &d2)| (d2 == 0.).then_some(i))
                .collect(),
        }
    }

    /// Short lowercase name of the policy, for logging and file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rotate(_) => "rotate",
            Self::Eat(_) => "eat",
            Self::Explode(_) => "explode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{tiny_diamond_mesh, unit_tet_mesh};
    use approx::assert_relative_eq;

    #[test]
    fn rotation_is_perpendicular_in_plane() {
        let mesh = tiny_diamond_mesh();
        let policy = VelocityPolicy::Rotate(RotateParams::default());

        let vel = policy.velocity_field(&mesh, 0.);
        for (p, v) in izip!(mesh.nodes(), &vel) {
            assert_relative_eq!(p.x * v.x + p.y * v.y, 0., epsilon = 1e-12);
            assert_relative_eq!(v.xy().norm(), 15. * p.xy().norm(), epsilon = 1e-12);
            assert_eq!(v.z, p.z);
        }
    }

    #[test]
    fn rotation_of_unit_x() {
        let mesh = unit_tet_mesh();
        let policy = VelocityPolicy::Rotate(RotateParams::default());

        let vel = policy.velocity_field(&mesh, 0.);
        assert_eq!(vel[1], Vec3::new(0., 15., 0.));
        // the origin doesn't move
        assert_eq!(vel[0], Vec3::zeros());
    }

    #[test]
    fn explosion_points_away_from_origin() {
        let mesh = tiny_diamond_mesh();
        let params = ExplodeParams::default();
        let policy = VelocityPolicy::Explode(params);

        let vel = policy.velocity_field(&mesh, 0.);
        for (p, v) in izip!(mesh.nodes(), &vel) {
            assert_relative_eq!(v.norm(), params.velocity, max_relative = 1e-12);
            assert_relative_eq!(v.normalize(), p.normalize(), epsilon = 1e-12);
            assert!(v.dot(p) > 0.);
        }
    }

    #[test]
    fn eating_stays_in_plane() {
        let mesh = tiny_diamond_mesh();
        let policy = VelocityPolicy::Eat(EatParams::default());

        for step in 0..50 {
            let time = step as f64 * 0.013;
            for v in policy.velocity_field(&mesh, time) {
                assert_eq!(v.z, 0.);
            }
        }
    }

    #[test]
    fn eating_amplitude_follows_phase() {
        let mesh = tiny_diamond_mesh();
        let params = EatParams::default();
        let policy = VelocityPolicy::Eat(params);

        let time = 0.07;
        let vel = policy.velocity_field(&mesh, time);
        for (p, v) in izip!(mesh.nodes(), &vel) {
            let amplitude = params.max_velocity
                * f64::sin(params.omega * time - (params.max_z - p.z) / 10.);
            // nodes are still in their reference positions,
            // so the in-plane speed is exactly the amplitude
            assert_relative_eq!(v.xy().norm(), amplitude.abs(), epsilon = 1e-9);
        }
    }

    #[test]
    fn axis_nodes_get_zero_velocity() {
        // nodes 0 and 3 of the unit tetrahedron lie on the z-axis
        let mesh = unit_tet_mesh();

        for policy in [
            VelocityPolicy::Eat(EatParams::default()),
            VelocityPolicy::Explode(ExplodeParams::default()),
        ] {
            assert_eq!(policy.degenerate_nodes(&mesh), vec![0, 3]);
            for time in [0., 0.01, 1.7] {
                let vel = policy.velocity_field(&mesh, time);
                assert_eq!(vel[0], Vec3::zeros(), "{} at origin", policy.name());
                assert_eq!(vel[3], Vec3::zeros(), "{} on z-axis", policy.name());
                assert!(vel.iter().all(|v| v.iter().all(|c| c.is_finite())));
            }
        }

        let rotate = VelocityPolicy::Rotate(RotateParams::default());
        assert!(rotate.degenerate_nodes(&mesh).is_empty());
    }

    #[test]
    fn initial_velocity_carries_rotation_drift() {
        let mesh = tiny_diamond_mesh();

        let rot = VelocityPolicy::Rotate(RotateParams::default()).initial_velocity(&mesh);
        for (p, v) in izip!(mesh.nodes(), &rot) {
            assert_eq!(*v, Vec3::new(0., 0., p.z));
        }

        let eat = VelocityPolicy::Eat(EatParams::default()).initial_velocity(&mesh);
        assert_eq!(eat.len(), mesh.node_count());
        assert!(eat.iter().all(|v| *v == Vec3::zeros()));
    }

    #[test]
    fn fitted_eat_height() {
        let mesh = tiny_diamond_mesh();
        let params = EatParams::fitted(&mesh);
        assert_relative_eq!(params.max_z, 1.8);
        assert_eq!(params.omega, EatParams::default().omega);
    }
}
