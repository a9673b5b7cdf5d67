//! Kinematic animation of tetrahedral meshes.
//!
//! A mesh generated with gmsh is moved by one of a few prescribed velocity fields
//! (a rotation, a radial "eating" pulsation, or an explosion)
//! and every timestep is written to a VTK file for viewing in ParaView.
//!
//! The simulation itself lives in [`meshmotion_core`], re-exported here.
//! This crate adds a TOML [`config`]uration and the [`driver`] loop
//! used by the `meshmotion` binary:
//!
//! ```text
//! meshmotion configs/frog_eat.toml
//! ```
//!
//! Without an argument the binary runs the built-in defaults
//! ([`Config::default`][config::Config::default]).

pub use meshmotion_core::*;

pub mod config;
pub mod driver;
