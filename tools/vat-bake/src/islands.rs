//! UV island partitioning and pivot assignment
//!
//! Islands are connected in UV space, not in 3D: two triangles belong to the
//! same island when they share a UV vertex. UV vertices are the UVs of
//! triangle corners, merged by equality within [`UV_EQUALITY_TOLERANCE`] while
//! walking the triangles in order. Vertices no triangle references are ignored.

use std::collections::VecDeque;

use glam::Vec2;

use crate::error::IslandError;

/// Per-axis tolerance for merging UV vertices
pub const UV_EQUALITY_TOLERANCE: f32 = 1e-4;

/// UV-space connectivity of a triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UvIslandGraph {
    /// Merged UV positions in first-seen corner order
    pub uv_vertices: Vec<Vec2>,
    /// UV vertex of every triangle corner, parallel to the index buffer
    pub corner_uv: Vec<usize>,
    /// Triangles touching each UV vertex, without duplicates
    pub incident_triangles: Vec<Vec<usize>>,
    /// Island of every triangle, numbered in discovery order
    pub triangle_islands: Vec<usize>,
    pub island_count: usize,
}

#[inline]
fn uv_equal(a: Vec2, b: Vec2) -> bool {
    (a.x - b.x).abs() <= UV_EQUALITY_TOLERANCE && (a.y - b.y).abs() <= UV_EQUALITY_TOLERANCE
}

fn check_indices(indices: &[u32], uv_count: usize) -> Result<(), IslandError> {
    if indices.len() % 3 != 0 {
        return Err(IslandError::IndexCountNotTriangles(indices.len()));
    }
    match indices.iter().position(|&i| i as usize >= uv_count) {
        Some(corner) => Err(IslandError::IndexOutOfRange {
            corner,
            index: indices[corner],
            uv_count,
        }),
        None => Ok(()),
    }
}

impl UvIslandGraph {
    /// Build the graph and flood-fill islands
    ///
    /// `indices` is a triangle list into `uvs`, one UV per mesh vertex.
    pub fn build(indices: &[u32], uvs: &[Vec2]) -> Result<Self, IslandError> {
        check_indices(indices, uvs.len())?;

        let mut graph = Self {
            corner_uv: Vec::with_capacity(indices.len()),
            ..Default::default()
        };

        for (triangle, corners) in indices.chunks_exact(3).enumerate() {
            // All three corners look up the UV vertices that existed before
            // this triangle; the most recently added match wins
            let found = [0, 1, 2].map(|i| {
                let uv = uvs[corners[i] as usize];
                graph.uv_vertices.iter().rposition(|&other| uv_equal(uv, other))
            });

            for (&vertex, existing) in corners.iter().zip(found) {
                let uv_vertex = existing.unwrap_or_else(|| {
                    graph.uv_vertices.push(uvs[vertex as usize]);
                    graph.incident_triangles.push(Vec::new());
                    graph.uv_vertices.len() - 1
                });
                graph.corner_uv.push(uv_vertex);

                let incident = &mut graph.incident_triangles[uv_vertex];
                if !incident.contains(&triangle) {
                    incident.push(triangle);
                }
            }
        }

        graph.flood_fill();

        tracing::debug!(
            "Partitioned {} triangles into {} UV islands ({} UV vertices)",
            graph.triangle_islands.len(),
            graph.island_count,
            graph.uv_vertices.len()
        );

        Ok(graph)
    }

    fn flood_fill(&mut self) {
        let triangle_count = self.corner_uv.len() / 3;
        let mut islands: Vec<Option<usize>> = vec![None; triangle_count];
        let mut queue = VecDeque::new();
        let mut island_count = 0;

        for seed in 0..triangle_count {
            if islands[seed].is_some() {
                continue;
            }
            let island = island_count;
            island_count += 1;
            islands[seed] = Some(island);
            queue.push_back(seed);

            while let Some(triangle) = queue.pop_front() {
                for &uv_vertex in &self.corner_uv[triangle * 3..triangle * 3 + 3] {
                    for &neighbour in &self.incident_triangles[uv_vertex] {
                        if islands[neighbour].is_none() {
                            islands[neighbour] = Some(island);
                            queue.push_back(neighbour);
                        }
                    }
                }
            }
        }

        self.triangle_islands = islands.into_iter().flatten().collect();
        self.island_count = island_count;
    }
}

/// Island id of every triangle and the number of islands
pub fn partition_islands(indices: &[u32], uvs: &[Vec2]) -> Result<(Vec<usize>, usize), IslandError> {
    let graph = UvIslandGraph::build(indices, uvs)?;
    Ok((graph.triangle_islands, graph.island_count))
}

/// Strict containment of `p` in triangle `(a, b, c)`, degenerate triangles contain nothing
fn strictly_inside(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom == 0.0 {
        return false;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    u > 0.0 && v > 0.0 && w > 0.0
}

/// Assign every mesh vertex the nearest pivot lying on its triangle's island
///
/// A pivot belongs to the island of the triangle that strictly contains it
/// (the last such triangle if several do). Each triangle corner then picks
/// the closest pivot of its island, so a vertex shared by several triangles
/// keeps the choice of the last one. Vertices with no pivot on their island,
/// and vertices no triangle references, get `None`.
pub fn closest_uv_pivot_assign(
    indices: &[u32],
    uvs: &[Vec2],
    pivots: &[Vec2],
) -> Result<Vec<Option<usize>>, IslandError> {
    let graph = UvIslandGraph::build(indices, uvs)?;
    let corner_uv = |corner: usize| uvs[indices[corner] as usize];

    let mut pivot_islands: Vec<Option<usize>> = vec![None; pivots.len()];
    for (triangle, &island) in graph.triangle_islands.iter().enumerate() {
        let (a, b, c) = (
            corner_uv(triangle * 3),
            corner_uv(triangle * 3 + 1),
            corner_uv(triangle * 3 + 2),
        );
        for (pivot, &position) in pivots.iter().enumerate() {
            if strictly_inside(position, a, b, c) {
                pivot_islands[pivot] = Some(island);
            }
        }
    }

    let mut assignment = vec![None; uvs.len()];
    for (triangle, &island) in graph.triangle_islands.iter().enumerate() {
        for corner in triangle * 3..triangle * 3 + 3 {
            let uv = corner_uv(corner);
            let mut closest = None;
            let mut closest_distance = f32::MAX;
            for (pivot, &position) in pivots.iter().enumerate() {
                if pivot_islands[pivot] != Some(island) {
                    continue;
                }
                let distance = uv.distance(position);
                if distance < closest_distance {
                    closest_distance = distance;
                    closest = Some(pivot);
                }
            }
            assignment[indices[corner] as usize] = closest;
        }
    }

    let assigned = assignment.iter().filter(|a| a.is_some()).count();
    tracing::info!(
        "Assigned {} of {} vertices to {} pivots across {} islands",
        assigned,
        uvs.len(),
        pivots.len(),
        graph.island_count
    );

    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Quad split into two triangles sharing the diagonal in UV space
    fn connected_quad() -> (Vec<u32>, Vec<Vec2>) {
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        (vec![0, 1, 2, 0, 2, 3], uvs)
    }

    /// Same quad with each triangle placed in its own UV region
    fn split_quad() -> (Vec<u32>, Vec<Vec2>) {
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.4, 0.0),
            Vec2::new(0.4, 0.4),
            Vec2::new(0.6, 0.6),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.6, 1.0),
        ];
        (vec![0, 1, 2, 3, 4, 5], uvs)
    }

    // =============================================================
    // Partitioning
    // =============================================================

    #[test]
    fn test_connected_quad_is_one_island() {
        let (indices, uvs) = connected_quad();
        assert_eq!(partition_islands(&indices, &uvs).unwrap(), (vec![0, 0], 1));
    }

    #[test]
    fn test_split_quad_is_two_islands() {
        let (indices, uvs) = split_quad();
        assert_eq!(partition_islands(&indices, &uvs).unwrap(), (vec![0, 1], 2));
    }

    #[test]
    fn test_seam_vertices_merge_within_tolerance() {
        // Two triangles with separate vertices whose UVs differ by less than the tolerance
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0 + 5e-5, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
        ];
        let graph = UvIslandGraph::build(&[0, 1, 2, 3, 4, 5], &uvs).unwrap();
        assert_eq!(graph.uv_vertices.len(), 5);
        assert_eq!(graph.corner_uv[3], graph.corner_uv[1]);
        assert_eq!(graph.island_count, 1);
    }

    #[test]
    fn test_uv_vertices_follow_corner_order() {
        let uvs = vec![Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::new(5.0, 5.0)];
        let graph = UvIslandGraph::build(&[2, 0, 1], &uvs).unwrap();
        // Vertex 3 is never referenced and gets no UV vertex
        assert_eq!(graph.uv_vertices, vec![Vec2::Y, Vec2::ZERO, Vec2::X]);
        assert_eq!(graph.corner_uv, vec![0, 1, 2]);
    }

    #[test]
    fn test_tolerance_chain_merges_against_earlier_triangles_only() {
        // 0.00008 apart: within tolerance of each other, 0.00016 is not within tolerance of 0
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(0.00008, 0.0);
        let c = Vec2::new(0.00016, 0.0);
        let uvs = vec![a, b, c, Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0)];

        // Triangle 0 holds a and c, triangle 1 starts from b
        let graph = UvIslandGraph::build(&[0, 2, 3, 1, 4, 4], &uvs).unwrap();
        // b matches both a and c; the later one (c) wins
        assert_eq!(graph.corner_uv[3], graph.corner_uv[1]);
        assert_eq!(graph.island_count, 1);
    }

    #[test]
    fn test_islands_numbered_in_discovery_order() {
        // Triangles 0 and 2 connect, triangle 1 stands alone
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.1, 0.0),
            Vec2::new(0.0, 0.1),
            Vec2::new(0.5, 0.5),
            Vec2::new(0.6, 0.5),
            Vec2::new(0.5, 0.6),
            Vec2::new(0.1, 0.1),
        ];
        let (islands, count) = partition_islands(&[0, 1, 2, 3, 4, 5, 1, 6, 2], &uvs).unwrap();
        assert_eq!(islands, vec![0, 1, 0]);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_incident_triangles_are_unique() {
        // Degenerate triangle repeats vertex 1; both corners look up before
        // either is added, so the first triangle creates two copies of X
        let uvs = vec![Vec2::ZERO, Vec2::X, Vec2::Y];
        let graph = UvIslandGraph::build(&[0, 1, 1, 0, 1, 2], &uvs).unwrap();
        assert_eq!(graph.uv_vertices, vec![Vec2::ZERO, Vec2::X, Vec2::X, Vec2::Y]);
        assert_eq!(graph.incident_triangles[0], vec![0, 1]);
        assert_eq!(graph.corner_uv[4], 2);
        assert_eq!(graph.incident_triangles[2], vec![0, 1]);
    }

    #[test]
    fn test_rejects_malformed_indices() {
        let uvs = vec![Vec2::ZERO; 3];
        assert_eq!(
            partition_islands(&[0, 1], &uvs),
            Err(IslandError::IndexCountNotTriangles(2))
        );
        assert_eq!(
            partition_islands(&[0, 1, 5], &uvs),
            Err(IslandError::IndexOutOfRange {
                corner: 2,
                index: 5,
                uv_count: 3
            })
        );
    }

    #[test]
    fn test_empty_mesh_has_no_islands() {
        assert_eq!(partition_islands(&[], &[]).unwrap(), (vec![], 0));
    }

    // =============================================================
    // Pivot assignment
    // =============================================================

    #[test]
    fn test_pivots_stay_on_their_island() {
        let (indices, uvs) = split_quad();
        // Pivot 0 inside the first triangle, pivot 1 inside the second
        let pivots = [Vec2::new(0.35, 0.05), Vec2::new(0.62, 0.65)];
        let assignment = closest_uv_pivot_assign(&indices, &uvs, &pivots).unwrap();

        // Vertex 2 sits closer to pivot 1 but is on the first island
        assert!(uvs[2].distance(pivots[1]) < uvs[2].distance(pivots[0]));
        assert_eq!(assignment, vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1)]);
    }

    #[test]
    fn test_nearest_pivot_per_corner() {
        let (indices, uvs) = connected_quad();
        let pivots = [Vec2::new(0.2, 0.1), Vec2::new(0.8, 0.9)];
        let assignment = closest_uv_pivot_assign(&indices, &uvs, &pivots).unwrap();
        assert_eq!(assignment, vec![Some(0), Some(0), Some(1), Some(1)]);
    }

    #[test]
    fn test_pivot_on_edge_is_not_contained() {
        let (indices, uvs) = split_quad();
        let pivots = [Vec2::new(0.2, 0.0)];
        let assignment = closest_uv_pivot_assign(&indices, &uvs, &pivots).unwrap();
        assert!(assignment.iter().all(Option::is_none));
    }

    #[test]
    fn test_unreferenced_vertex_has_no_pivot() {
        let (indices, mut uvs) = connected_quad();
        uvs.push(Vec2::new(5.0, 5.0));
        let assignment =
            closest_uv_pivot_assign(&indices, &uvs, &[Vec2::new(0.5, 0.25)]).unwrap();
        assert_eq!(assignment[0], Some(0));
        assert_eq!(assignment[4], None);
    }
}
