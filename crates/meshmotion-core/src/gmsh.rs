//! Utilities for loading meshes generated with [`gmsh`](https://www.gmsh.info/).
//!
//! Only version 4.1 of the MSH format is supported,
//! as per the [`mshio`] library.

use crate::{MeshError, TetMesh};

/// Error in loading a mesh from a Gmsh .msh file.
#[derive(thiserror::Error, Debug)]
pub enum GmshError {
    /// Error parsing the .msh file.
    ///
    /// (Implementation note: parser error converted to string
    /// to avoid lifetime issues with the byte slices it contains)
    #[error("Parsing the .msh data failed: {0}")]
    ParseError(String),
    /// The given .msh file contains no nodes.
    #[error("Invalid .msh data: no nodes")]
    MissingNodes,
    /// The given .msh file contains no elements of the supported type.
    #[error("Invalid .msh data: no elements of the correct type")]
    MissingElements,
    /// Node tags don't run from 1 to the number of nodes without gaps,
    /// so they can't be used as indices.
    #[error("Invalid .msh data: node tags span {min}..={max} for {count} nodes")]
    NonContiguousNodeTags {
        /// Smallest node tag in the file.
        min: usize,
        /// Largest node tag in the file.
        max: usize,
        /// Number of nodes in the file.
        count: usize,
    },
    /// Node tags have no gaps but aren't in ascending order,
    /// so the node at `index` would be referenced by the wrong tag.
    #[error("Invalid .msh data: node {index} has tag {tag}, expected {}", .index + 1)]
    NodeTagOutOfOrder {
        /// Position of the node in the file, counting from 0.
        index: usize,
        /// The tag the file gives it.
        tag: usize,
    },
    /// The nodes and elements don't form a valid mesh.
    #[error("Invalid .msh data")]
    Mesh(#[from] MeshError),
}

/// Load a tetrahedral mesh from the bytes of a `.msh` file.
///
/// First-order tetrahedron elements in the file are interpreted as the tetrahedra of the mesh.
/// These must be of type `Tet4` (see [`ElementType`][mshio::ElementType]);
/// elements of other types (boundary triangles, lines etc.) are ignored.
///
/// ```
/// # use meshmotion_core::gmsh::load_tetmesh;
/// # fn load() -> Result<(), Box<dyn std::error::Error>> {
/// let msh_bytes = std::fs::read("src/gmsh/single_tet.msh")?;
/// let mesh = load_tetmesh(&msh_bytes)?;
/// assert_eq!(mesh.tetrahedron_count(), 1);
/// # Ok(())
/// # }
/// # load().expect("Failed to load mesh");
/// ```
pub fn load_tetmesh(bytes: &[u8]) -> Result<TetMesh, GmshError> {
    let msh = mshio::parse_msh_bytes(bytes).map_err(|e| GmshError::ParseError(format!("{}", e)))?;
    let nodes = msh.data.nodes.ok_or(GmshError::MissingNodes)?;
    let elements = msh.data.elements.ok_or(GmshError::MissingElements)?;

    let coords: Vec<f64> = nodes
        .node_blocks
        .iter()
        .flat_map(|block| block.nodes.iter())
        .flat_map(|node| [node.x, node.y, node.z])
        .collect();
    if coords.is_empty() {
        return Err(GmshError::MissingNodes);
    }

    // gmsh tags start at 1 and we use them directly as 1-based indices,
    // which only works if there are no gaps and nodes are listed in tag order
    let count = coords.len() / 3;
    let (min, max) = (nodes.min_node_tag as usize, nodes.max_node_tag as usize);
    if min != 1 || max != count {
        return Err(GmshError::NonContiguousNodeTags { min, max, count });
    }
    let tags = node_tags_in_file_order(bytes, &msh.header)?;
    if tags.len() != count {
        return Err(GmshError::ParseError(format!(
            "expected {count} node tags, found {}",
            tags.len()
        )));
    }
    if let Some((index, &tag)) = tags.iter().enumerate().find(|&(i, &tag)| tag != i as u64 + 1) {
        return Err(GmshError::NodeTagOutOfOrder {
            index,
            tag: tag as usize,
        });
    }

    let tet_tags: Vec<usize> = elements
        .element_blocks
        .iter()
        .filter(|block| block.element_type == mshio::ElementType::Tet4)
        .flat_map(|block| block.elements.iter())
        .flat_map(|el| el.nodes.iter())
        .map(|node_tag| *node_tag as usize)
        .collect();
    if tet_tags.is_empty() {
        return Err(GmshError::MissingElements);
    }

    let mesh = TetMesh::from_flat(&coords, &tet_tags)?;
    log::info!(
        "The model has {} nodes and {} tetrahedra",
        mesh.node_count(),
        mesh.tetrahedron_count()
    );
    Ok(mesh)
}

/// Read the node tags in the order the nodes appear in the file.
///
/// `mshio` only keeps the tags of a node section whose header declares them sparse,
/// so a gap-free but permuted numbering has to be read back from the raw bytes.
fn node_tags_in_file_order(bytes: &[u8], header: &mshio::MshHeader) -> Result<Vec<u64>, GmshError> {
    let unreadable = || GmshError::ParseError("could not read node tags".to_string());
    let nodes = section_start(bytes, "$Nodes").ok_or_else(unreadable)?;
    let tags = if header.file_type == 0 {
        ascii_node_tags(nodes)
    } else {
        // the binary header line is followed by the integer 1 in the file's byte order
        let big_endian = section_start(bytes, "$MeshFormat")
            .and_then(|format| {
                let line_end = format.iter().position(|&b| b == b'\n')?;
                format.get(line_end + 1..line_end + 5)
            })
            .map(|one| one == 1i32.to_be_bytes().as_slice())
            .ok_or_else(unreadable)?;
        binary_node_tags(nodes, header.size_t_size, big_endian)
    };
    tags.ok_or_else(unreadable)
}

/// Bytes after the line starting with `tag`.
fn section_start<'a>(bytes: &'a [u8], tag: &str) -> Option<&'a [u8]> {
    let tag = tag.as_bytes();
    let start = bytes.windows(tag.len()).position(|w| w == tag)?;
    let section = &bytes[start..];
    let line_end = section.iter().position(|&b| b == b'\n')?;
    Some(&section[line_end + 1..])
}

fn ascii_node_tags(nodes: &[u8]) -> Option<Vec<u64>> {
    fn parse<T: std::str::FromStr>(word: Option<&[u8]>) -> Option<T> {
        std::str::from_utf8(word?).ok()?.parse().ok()
    }
    let mut words = nodes.split(u8::is_ascii_whitespace).filter(|w| !w.is_empty());

    let block_count: usize = parse(words.next())?;
    let node_count: usize = parse(words.next())?;
    // min and max tag
    words.nth(1)?;

    let mut tags = Vec::with_capacity(node_count);
    for _ in 0..block_count {
        // entity dimension, entity tag, parametric flag
        words.nth(2)?;
        let block_len: usize = parse(words.next())?;
        for _ in 0..block_len {
            tags.push(parse(words.next())?);
        }
        for _ in 0..3 * block_len {
            words.next()?;
        }
    }
    Some(tags)
}

fn binary_node_tags(nodes: &[u8], size_t_size: usize, big_endian: bool) -> Option<Vec<u64>> {
    let mut cursor = Cursor {
        rest: nodes,
        big_endian,
    };
    let block_count = cursor.uint(size_t_size)?;
    let node_count = cursor.uint(size_t_size)?;
    // min and max tag
    cursor.take(2 * size_t_size)?;

    let mut tags = Vec::with_capacity(node_count as usize);
    for _ in 0..block_count {
        // entity dimension, entity tag, parametric flag as 4-byte ints
        cursor.take(12)?;
        let block_len = cursor.uint(size_t_size)? as usize;
        for _ in 0..block_len {
            tags.push(cursor.uint(size_t_size)?);
        }
        cursor.take(3 * 8 * block_len)?;
    }
    Some(tags)
}

struct Cursor<'a> {
    rest: &'a [u8],
    big_endian: bool,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.rest.len() < len {
            return None;
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Some(head)
    }

    fn uint(&mut self, size: usize) -> Option<u64> {
        if size > 8 {
            return None;
        }
        let bytes = self.take(size)?;
        let mut buf = [0u8; 8];
        if self.big_endian {
            buf[8 - size..].copy_from_slice(bytes);
            Some(u64::from_be_bytes(buf))
        } else {
            buf[..size].copy_from_slice(bytes);
            Some(u64::from_le_bytes(buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vec3;

    #[test]
    fn single_tetrahedron() {
        let mesh = load_tetmesh(include_bytes!("gmsh/single_tet.msh")).expect("Failed to load mesh");

        assert_eq!(mesh.node_count(), 4);
        assert_eq!(mesh.tetrahedra(), &[[0, 1, 2, 3]]);
        assert_eq!(
            mesh.nodes(),
            &[
                Vec3::new(0., 0., 0.),
                Vec3::new(1., 0., 0.),
                Vec3::new(0., 1., 0.),
                Vec3::new(0., 0., 1.),
            ]
        );
    }

    #[test]
    fn only_tetrahedra_are_loaded() {
        // two tetrahedra plus a block of boundary triangles
        let mesh = load_tetmesh(include_bytes!("gmsh/two_tets.msh")).expect("Failed to load mesh");

        assert_eq!(mesh.node_count(), 5);
        assert_eq!(mesh.tetrahedra(), &[[0, 1, 2, 3], [0, 1, 2, 4]]);
        assert_eq!(mesh.nodes()[4], Vec3::new(0.1, -0.2, -1.));
    }

    #[test]
    fn gaps_in_node_tags_are_rejected() {
        let err = load_tetmesh(include_bytes!("gmsh/sparse_tags.msh")).unwrap_err();
        assert!(
            matches!(
                err,
                GmshError::NonContiguousNodeTags {
                    min: 1,
                    max: 5,
                    count: 4
                }
            ),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn permuted_node_tags_are_rejected() {
        // tags 2, 1, 3, 4: no gaps, but tag 1 belongs to the second node
        let err = load_tetmesh(include_bytes!("gmsh/permuted_tags.msh")).unwrap_err();
        assert!(
            matches!(err, GmshError::NodeTagOutOfOrder { index: 0, tag: 2 }),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn node_tags_are_read_from_every_block() {
        let tags = ascii_node_tags(
            b"2 3 1 3\n0 1 0 1\n1\n0 0 0\n3 1 0 2\n3\n2\n1 0 0\n0 1 0\n$EndNodes\n",
        );
        assert_eq!(tags, Some(vec![1, 3, 2]));

        // truncated before the second block's tags
        assert_eq!(ascii_node_tags(b"2 3 1 3\n0 1 0 1\n1\n0 0 0\n3 1 0 2\n"), None);
    }

    #[test]
    fn binary_node_tags_follow_byte_order() {
        let section = |big_endian: bool| {
            let size_t = |v: u64| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
            let mut bytes = Vec::new();
            for v in [1, 2, 1, 2] {
                bytes.extend(size_t(v));
            }
            bytes.extend([0u8; 12]);
            bytes.extend(size_t(2));
            bytes.extend(size_t(2));
            bytes.extend(size_t(1));
            bytes.extend([0u8; 48]);
            bytes
        };

        assert_eq!(binary_node_tags(&section(false), 8, false), Some(vec![2, 1]));
        assert_eq!(binary_node_tags(&section(true), 8, true), Some(vec![2, 1]));
        // coordinates cut short
        let short = section(false);
        assert_eq!(binary_node_tags(&short[..short.len() - 1], 8, false), None);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = load_tetmesh(b"this is not a mesh").unwrap_err();
        assert!(matches!(err, GmshError::ParseError(_)), "unexpected error {err:?}");
    }
}
