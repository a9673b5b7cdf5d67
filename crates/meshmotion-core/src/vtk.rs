//! Writing simulation frames to VTK files for visualization.
//!
//! Each frame becomes one XML unstructured grid (`.vtu`) file
//! with the node positions as points, the tetrahedra as cells,
//! and two point data arrays:
//! - `dist`, the frozen `x² + y²` field of the mesh,
//! - `vel`, the node velocities.
//!
//! A [`VtuSeries`] names the files of consecutive steps
//! and can additionally write a ParaView collection (`.pvd`)
//! that lists them together with their simulation times.

use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType,
    IOBuffer, Piece, UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

use crate::Frame;

/// Error in writing snapshot files.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    /// The output directory doesn't exist. It is not created automatically.
    #[error("Output directory {0} does not exist")]
    MissingDirectory(PathBuf),
    /// Error writing a file.
    #[error("Writing output failed")]
    Io(#[from] std::io::Error),
    /// Error converting or writing VTK data.
    ///
    /// (converted to string like gmsh parse errors,
    /// to keep the error type independent of `vtkio`'s)
    #[error("Writing VTK data failed: {0}")]
    Vtk(String),
}

impl Frame<'_> {
    /// Convert the frame into an unstructured grid dataset.
    pub fn to_vtk(&self) -> Vtk {
        let points: Vec<f64> = self.nodes.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        let velocity: Vec<f64> = self
            .velocity
            .iter()
            .flat_map(|v| [v.x, v.y, v.z])
            .collect();

        let connectivity: Vec<u64> = self
            .tetrahedra
            .iter()
            .flatten()
            .map(|&i| i as u64)
            .collect();
        let offsets: Vec<u64> = (1..=self.tetrahedra.len() as u64).map(|i| 4 * i).collect();

        let piece = UnstructuredGridPiece {
            points: IOBuffer::F64(points),
            cells: Cells {
                cell_verts: VertexNumbers::XML {
                    connectivity,
                    offsets,
                },
                types: vec![CellType::Tetra; self.tetrahedra.len()],
            },
            data: Attributes {
                point: vec![
                    Attribute::DataArray(DataArray {
                        name: "dist".into(),
                        elem: ElementType::Scalars {
                            num_comp: 1,
                            lookup_table: None,
                        },
                        data: IOBuffer::F64(self.dist_sq_xy.to_vec()),
                    }),
                    Attribute::DataArray(DataArray {
                        name: "vel".into(),
                        elem: ElementType::Vectors,
                        data: IOBuffer::F64(velocity),
                    }),
                ],
                cell: Vec::new(),
            },
        };

        Vtk {
            version: Version { major: 1, minor: 0 },
            byte_order: ByteOrder::LittleEndian,
            title: String::new(),
            file_path: None,
            data: DataSet::UnstructuredGrid {
                meta: None,
                pieces: vec![Piece::Inline(Box::new(piece))],
            },
        }
    }
}

/// A numbered sequence of `.vtu` files in one directory,
/// named `<prefix>-step-<index>.vtu`.
#[derive(Clone, Debug)]
pub struct VtuSeries {
    dir: PathBuf,
    prefix: String,
    /// time and file name of every written step, for the collection file
    entries: BTreeMap<usize, (f64, String)>,
}

impl VtuSeries {
    /// Start a series in an existing directory.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self, OutputError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(OutputError::MissingDirectory(dir));
        }
        Ok(Self {
            dir,
            prefix: prefix.into(),
            entries: BTreeMap::new(),
        })
    }

    /// Get the directory files are written into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the path the file of step `index` is written to.
    pub fn step_path(&self, index: usize) -> PathBuf {
        self.dir.join(self.step_file_name(index))
    }

    fn step_file_name(&self, index: usize) -> String {
        format!("{}-step-{}.vtu", self.prefix, index)
    }

    /// Write a frame as step `index`, replacing any earlier file for that step.
    pub fn write_step(&mut self, index: usize, frame: &Frame) -> Result<PathBuf, OutputError> {
        let file_name = self.step_file_name(index);
        let path = self.dir.join(&file_name);
        frame
            .to_vtk()
            .export(&path)
            .map_err(|e| OutputError::Vtk(format!("{e:?}")))?;
        log::debug!("wrote step {index} (t = {}) to {}", frame.time, path.display());

        self.entries.insert(index, (frame.time, file_name));
        Ok(path)
    }

    /// Get the number of distinct steps written so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no steps have been written yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write a ParaView collection file `<prefix>.pvd`
    /// referencing every step written so far, ordered by step index.
    pub fn write_collection(&self) -> Result<PathBuf, OutputError> {
        let path = self.dir.join(format!("{}.pvd", self.prefix));
        let mut out = BufWriter::new(fs::File::create(&path)?);

        writeln!(out, r#"<?xml version="1.0"?>"#)?;
        writeln!(
            out,
            r#"<VTKFile type="Collection" version="0.1" byte_order="LittleEndian">"#
        )?;
        writeln!(out, "  <Collection>")?;
        for (time, file_name) in self.entries.values() {
            let file_name = escape_attribute(file_name);
            writeln!(
                out,
                r#"    <DataSet timestep="{time}" group="" part="0" file="{file_name}"/>"#
            )?;
        }
        writeln!(out, "  </Collection>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;

        log::debug!("wrote collection of {} steps to {}", self.len(), path.display());
        Ok(path)
    }
}

/// Escape the characters that can't appear verbatim in a quoted XML attribute.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Create an empty directory under the system temp dir for a test.
#[cfg(test)]
pub(crate) fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meshmotion-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("failed to create test directory");
    dir
}
