//! The simulation loop: load a mesh, step it, write every step.

use std::{
    fs,
    path::{Path, PathBuf},
};

use meshmotion_core::{gmsh, KinematicSimulator, OutputError, TetMesh, VtuSeries};

use crate::config::{Config, ConfigError};

/// Error that aborts a run.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The mesh file couldn't be read.
    #[error("Could not read mesh file {path}")]
    ReadMesh {
        /// Path of the mesh file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The mesh file isn't a usable tetrahedral mesh.
    #[error("Could not load mesh")]
    Mesh(#[from] gmsh::GmshError),
    /// Writing a snapshot failed.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// What a completed run produced.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Number of nodes in the mesh.
    pub node_count: usize,
    /// Number of tetrahedra in the mesh.
    pub tetrahedron_count: usize,
    /// Nodes on the z-axis whose velocity the policy holds at zero.
    pub clamped_nodes: Vec<usize>,
    /// Paths of the written `.vtu` files, in step order.
    pub snapshots: Vec<PathBuf>,
    /// The `.pvd` collection, if one was written.
    pub collection: Option<PathBuf>,
    /// Simulation time after the last step.
    pub final_time: f64,
}

/// Read a gmsh file into a mesh.
///
/// The file contents are only held for the duration of parsing.
pub fn load_mesh(path: &Path) -> Result<TetMesh, RunError> {
    let bytes = fs::read(path).map_err(|source| RunError::ReadMesh {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(gmsh::load_tetmesh(&bytes)?)
}

/// Run the simulation described by a config from start to finish.
pub fn run(config: &Config) -> Result<RunSummary, RunError> {
    config.validate()?;
    let mesh = load_mesh(&config.mesh)?;
    simulate(mesh, config)
}

/// Run the simulation on an already loaded mesh.
///
/// Writes the initial state as step 0
/// followed by one file per step up to `config.steps`.
pub fn simulate(mesh: TetMesh, config: &Config) -> Result<RunSummary, RunError> {
    config.validate()?;
    let mut series = VtuSeries::new(&config.output_dir, config.file_prefix.as_str())?;

    let policy = config.policy.to_policy(&mesh);
    log::info!(
        "running {} steps of {:?} with tau = {}",
        config.steps,
        policy,
        config.tau
    );
    let node_count = mesh.node_count();
    let tetrahedron_count = mesh.tetrahedron_count();
    let clamped_nodes = policy.degenerate_nodes(&mesh);
    let mut sim = KinematicSimulator::new(mesh, policy);

    let mut snapshots = Vec::with_capacity(config.steps + 1);
    snapshots.push(sim.snapshot(&mut series, 0)?);
    for i in 1..=config.steps {
        sim.advance(config.tau);
        snapshots.push(sim.snapshot(&mut series, i)?);
    }

    let collection = if config.write_collection {
        Some(series.write_collection()?)
    } else {
        None
    };
    log::info!(
        "wrote {} snapshots to {}",
        snapshots.len(),
        series.dir().display()
    );

    Ok(RunSummary {
        node_count,
        tetrahedron_count,
        clamped_nodes,
        snapshots,
        collection,
        final_time: sim.time(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use approx::assert_relative_eq;

    /// Create an empty directory under the system temp dir for a test.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "meshmotion-driver-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("failed to create test directory");
        dir
    }

    /// A scratch directory containing the diamond mesh and an `out` directory,
    /// plus a config pointing at them.
    fn diamond_setup(name: &str, policy: PolicyConfig) -> (PathBuf, Config) {
        let dir = scratch_dir(name);
        let mesh_path = dir.join("diamond.msh");
        fs::write(&mesh_path, include_bytes!("../meshes/diamond.msh")).unwrap();
        let output_dir = dir.join("out");
        fs::create_dir(&output_dir).unwrap();

        let config = Config {
            mesh: mesh_path,
            output_dir,
            file_prefix: "diamond".into(),
            tau: 0.01,
            steps: 3,
            write_collection: true,
            policy,
        };
        (dir, config)
    }

    #[test]
    fn run_writes_every_step() {
        let (dir, config) = diamond_setup("every-step", PolicyConfig::Rotate { omega: 15. });

        let summary = run(&config).expect("run failed");

        assert_eq!(summary.node_count, 5);
        assert_eq!(summary.tetrahedron_count, 2);
        assert!(summary.clamped_nodes.is_empty());
        assert_eq!(summary.snapshots.len(), 4);
        for (i, path) in summary.snapshots.iter().enumerate() {
            assert_eq!(*path, dir.join("out").join(format!("diamond-step-{i}.vtu")));
            assert!(path.is_file());
        }
        let collection = summary.collection.expect("collection should be written");
        assert_eq!(collection, dir.join("out/diamond.pvd"));
        assert!(collection.is_file());
        assert_relative_eq!(summary.final_time, 0.03, epsilon = 1e-12);
    }

    #[test]
    fn axis_nodes_are_reported() {
        let (dir, mut config) = diamond_setup("axis", PolicyConfig::Explode { velocity: 10. });
        // the unit tetrahedron has two corners on the z-axis
        config.mesh = dir.join("single_tet.msh");
        fs::write(
            &config.mesh,
            include_bytes!("../../meshmotion-core/src/gmsh/single_tet.msh"),
        )
        .unwrap();

        let summary = run(&config).expect("run failed");
        assert_eq!(summary.clamped_nodes, vec![0, 3]);

        config.policy = PolicyConfig::Rotate { omega: 1. };
        let summary = run(&config).expect("run failed");
        assert!(summary.clamped_nodes.is_empty());
    }

    #[test]
    fn collection_is_optional() {
        let (dir, mut config) = diamond_setup(
            "no-collection",
            PolicyConfig::Explode { velocity: 10. },
        );
        config.write_collection = false;

        let summary = run(&config).expect("run failed");

        assert!(summary.collection.is_none());
        assert!(!dir.join("out/diamond.pvd").exists());
    }

    #[test]
    fn missing_output_directory_aborts() {
        let (dir, mut config) = diamond_setup(
            "no-output",
            PolicyConfig::Eat {
                max_velocity: 1.,
                omega: 1.,
                max_z: None,
            },
        );
        config.output_dir = dir.join("nowhere");

        let err = run(&config).unwrap_err();
        assert!(
            matches!(err, RunError::Output(OutputError::MissingDirectory(_))),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn missing_mesh_aborts() {
        let (dir, mut config) = diamond_setup("no-mesh", PolicyConfig::Rotate { omega: 1. });
        config.mesh = dir.join("missing.msh");

        let err = run(&config).unwrap_err();
        assert!(matches!(err, RunError::ReadMesh { .. }), "unexpected error {err:?}");
    }

    #[test]
    fn invalid_config_aborts_before_loading() {
        let (_, mut config) = diamond_setup("bad-tau", PolicyConfig::Rotate { omega: 1. });
        config.tau = f64::INFINITY;

        let err = run(&config).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Invalid(_))));
    }
}
