//! Command line entry point.
//!
//! Usage: `meshmotion [config.toml]`.
//! See [`meshmotion::config`] for the file format.

use meshmotion::{config::Config, driver};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let summary = driver::run(&config)?;

    println!(
        "The model has {} nodes and {} tetrahedra",
        summary.node_count, summary.tetrahedron_count
    );
    if !summary.clamped_nodes.is_empty() {
        println!(
            "{} nodes lie on the z-axis and are held in place: {:?}",
            summary.clamped_nodes.len(),
            summary.clamped_nodes
        );
    }
    println!(
        "Wrote {} snapshots to {} (t = {})",
        summary.snapshots.len(),
        config.output_dir.display(),
        summary.final_time
    );
    if let Some(collection) = summary.collection {
        println!("Open {} in ParaView to play the animation", collection.display());
    }

    Ok(())
}
