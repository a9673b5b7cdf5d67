//! The tetrahedral mesh moved around by the simulator.

use crate::Vec3;

/// Error in constructing a [`TetMesh`] from raw data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The coordinate array doesn't hold a whole number of 3D points.
    #[error("Malformed mesh: {0} node coordinates is not a multiple of 3")]
    MalformedNodes(usize),
    /// The connectivity array doesn't hold a whole number of tetrahedra.
    #[error("Malformed mesh: {0} tetrahedron node tags is not a multiple of 4")]
    MalformedTetrahedra(usize),
    /// The mesh has no nodes at all.
    #[error("Malformed mesh: no nodes")]
    NoNodes,
    /// A 1-based node tag in the connectivity doesn't refer to a node.
    #[error("Malformed mesh: node tag {tag} is outside 1..={node_count}")]
    NodeTagOutOfRange {
        /// The offending tag.
        tag: usize,
        /// Number of nodes in the mesh.
        node_count: usize,
    },
    /// A 0-based node index in the connectivity doesn't refer to a node.
    #[error("Malformed mesh: node index {index} is outside 0..{node_count}")]
    NodeIndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of nodes in the mesh.
        node_count: usize,
    },
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// The minimum corner of the box.
    pub min: Vec3,
    /// The maximum corner of the box.
    pub max: Vec3,
}

impl BoundingBox {
    fn of_points(points: &[Vec3]) -> Self {
        let mut min = Vec3::repeat(f64::INFINITY);
        let mut max = Vec3::repeat(f64::NEG_INFINITY);
        for p in points {
            min = min.inf(p);
            max = max.sup(p);
        }
        Self { min, max }
    }
}

/// A mesh of first-order tetrahedra whose nodes can move
/// while the connectivity stays fixed.
///
/// Alongside the current node positions the mesh keeps
/// the positions it was constructed with (the reference configuration)
/// and a few quantities derived from them.
/// These are computed once and never updated as the nodes move;
/// the velocity policies rely on exactly this frozen state.
#[derive(Clone, Debug)]
pub struct TetMesh {
    nodes: Vec<Vec3>,
    reference: Vec<Vec3>,
    /// `x² + y²` of each reference position.
    dist_sq_xy: Vec<f64>,
    tetrahedra: Vec<[usize; 4]>,
    bounds: BoundingBox,
}

impl TetMesh {
    /// Construct a mesh from nodes and 0-based tetrahedron connectivity.
    pub fn new(nodes: Vec<Vec3>, tetrahedra: Vec<[usize; 4]>) -> Result<Self, MeshError> {
        if nodes.is_empty() {
            return Err(MeshError::NoNodes);
        }
        let node_count = nodes.len();
        if let Some(&index) = tetrahedra.iter().flatten().find(|&&i| i >= node_count) {
            return Err(MeshError::NodeIndexOutOfRange { index, node_count });
        }

        let dist_sq_xy = nodes.iter().map(|p| p.x * p.x + p.y * p.y).collect();
        let bounds = BoundingBox::of_points(&nodes);
        Ok(Self {
            reference: nodes.clone(),
            nodes,
            dist_sq_xy,
            tetrahedra,
            bounds,
        })
    }

    /// Construct a mesh from the flat arrays a mesh generator hands out.
    ///
    /// `coords` holds interleaved `x, y, z` coordinates,
    /// and every 4 entries of `tet_tags` are the 1-based node tags of one tetrahedron
    /// (gmsh numbers nodes starting from 1).
    ///
    /// ```
    /// # use meshmotion_core::TetMesh;
    /// let coords = [0., 0., 0., 1., 0., 0., 0., 1., 0., 0., 0., 1.];
    /// let mesh = TetMesh::from_flat(&coords, &[1, 2, 3, 4]).unwrap();
    /// assert_eq!(mesh.tetrahedra(), &[[0, 1, 2, 3]]);
    /// ```
    pub fn from_flat(coords: &[f64], tet_tags: &[usize]) -> Result<Self, MeshError> {
        if coords.len() % 3 != 0 {
            return Err(MeshError::MalformedNodes(coords.len()));
        }
        if tet_tags.len() % 4 != 0 {
            return Err(MeshError::MalformedTetrahedra(tet_tags.len()));
        }

        let nodes: Vec<Vec3> = coords
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();
        let node_count = nodes.len();
        if let Some(&tag) = tet_tags.iter().find(|&&t| t == 0 || t > node_count) {
            return Err(MeshError::NodeTagOutOfRange { tag, node_count });
        }

        let tetrahedra = tet_tags
            .chunks_exact(4)
            .map(|t| [t[0] - 1, t[1] - 1, t[2] - 1, t[3] - 1])
            .collect();
        Self::new(nodes, tetrahedra)
    }

    /// Get the current node positions.
    #[inline]
    pub fn nodes(&self) -> &[Vec3] {
        &self.nodes
    }

    #[inline]
    pub(crate) fn nodes_mut(&mut self) -> &mut [Vec3] {
        &mut self.nodes
    }

    /// Get the node positions at the time the mesh was constructed.
    #[inline]
    pub fn reference_nodes(&self) -> &[Vec3] {
        &self.reference
    }

    /// Get `x² + y²` of each node's reference position.
    ///
    /// Note that this is not updated as the nodes move.
    #[inline]
    pub fn dist_sq_xy(&self) -> &[f64] {
        &self.dist_sq_xy
    }

    /// Get the 0-based node indices of each tetrahedron.
    #[inline]
    pub fn tetrahedra(&self) -> &[[usize; 4]] {
        &self.tetrahedra
    }

    /// Get the bounding box of the reference configuration.
    #[inline]
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Get the number of nodes in the mesh.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of tetrahedra in the mesh.
    #[inline]
    pub fn tetrahedron_count(&self) -> usize {
        self.tetrahedra.len()
    }
}

/// A single tetrahedron with one vertex at the origin
/// and the others one unit along each axis.
///
/// Used in tests and documentation examples.
#[doc(hidden)]
pub fn unit_tet_mesh() -> TetMesh {
    #[rustfmt::skip]
    let coords = [
        0., 0., 0.,
        1., 0., 0.,
        0., 1., 0.,
        0., 0., 1.,
    ];
    TetMesh::from_flat(&coords, &[1, 2, 3, 4]).expect("unit tetrahedron is a valid mesh")
}

/// Two tetrahedra sharing a face,
/// shaped like a small diamond standing on the z-axis.
/// No node lies on the z-axis.
#[doc(hidden)]
pub fn tiny_diamond_mesh() -> TetMesh {
    #[rustfmt::skip]
    let coords = [
        1.0, 0.0, 0.5,
        -0.5, 0.8, 0.5,
        -0.5, -0.8, 0.5,
        0.2, 0.1, 2.0,
        0.1, -0.2, -1.0,
    ];
    #[rustfmt::skip]
    let tags = [
        1, 2, 3, 4,
        1, 2, 3, 5,
    ];
    TetMesh::from_flat(&coords, &tags).expect("diamond is a valid mesh")
}
