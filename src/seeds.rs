use crate::common::{Error, Result};
use crate::graph::{AdjRel, NodeCoords};
use crate::intlist::IntList;
use crate::markers::Marker;

/// Output of [`grid_sampling_relevance`]: scribble seeds first (in marker
/// order, deduplicated), then the surviving grid seeds.
#[derive(Debug)]
pub struct RelevanceSampling {
    pub seeds: IntList,
    /// Grid seeds actually placed, after proximity rejection.
    pub grid_placed: usize,
    /// Distinct scribble pixels promoted to seeds.
    pub scribbled: usize,
}

/// Output of [`grid_sampling_scribbles`]: seed indices paired one-to-one
/// with their class labels (marker `i` labels `i + 1`, grid seeds share
/// `num_markers + 1`).
#[derive(Debug)]
pub struct ClassSampling {
    pub seeds: IntList,
    pub labels_map: Vec<i32>,
}

// Grid geometry shared by both sampling variants. The stride keeps its
// fractional part only for the density check; the scan itself advances by
// the truncated stride since cell anchors are integer pixels.
struct GridSpec {
    delta: usize,
    step: usize,
}

fn grid_spec(num_nodes: usize, denom: f32) -> Result<GridSpec> {
    let size = 0.5 + num_nodes as f32 / denom;
    let stride = size.sqrt() + 0.5;
    let delta = stride / 2.0;
    if delta < 1.0 {
        return Err(Error::SeedsTooDense);
    }
    Ok(GridSpec {
        delta: delta as usize,
        step: stride as usize,
    })
}

// A grid cell is rejected when any already-placed seed falls inside its
// window of +-delta pixels around the anchor.
fn near_existing_seed(
    label_seed: &[bool],
    num_rows: usize,
    num_cols: usize,
    x: usize,
    y: usize,
    delta: usize,
) -> bool {
    let row_lo = y.saturating_sub(delta);
    let row_hi = (y + delta).min(num_rows - 1);
    let col_lo = x.saturating_sub(delta);
    let col_hi = (x + delta).min(num_cols - 1);
    for i in row_lo..=row_hi {
        for j in col_lo..=col_hi {
            if label_seed[i * num_cols + j] {
                return true;
            }
        }
    }
    false
}

// Moves the anchor to its lowest-gradient valid 8-neighbor; keeps the
// anchor itself when relocation is disabled, when the winner is already
// taken (a stroke must not be broken by relocation) or when no neighbor
// strictly improves.
fn relocate_to_min_gradient(
    grad: &[f64],
    label_seed: &[bool],
    num_rows: usize,
    num_cols: usize,
    adj: &AdjRel,
    anchor: NodeCoords,
    relocate: bool,
) -> usize {
    let anchor_index = anchor.y as usize * num_cols + anchor.x as usize;
    if !relocate {
        return anchor_index;
    }
    let mut min_grad_index = anchor_index;
    for rel in 0..adj.len() {
        let adj_coords = adj.neighbor(anchor, rel);
        if adj_coords.is_valid(num_rows, num_cols) {
            let adj_index = adj_coords.y as usize * num_cols + adj_coords.x as usize;
            if grad[adj_index] < grad[min_grad_index] {
                min_grad_index = adj_index;
            }
        }
    }
    if label_seed[min_grad_index] {
        anchor_index
    } else {
        min_grad_index
    }
}

/// Seed sampling for relevance-ranked removal. Every scribble pixel becomes
/// a seed (duplicates collapse), then up to `n_0` positions are spread on a
/// spacing grid sized for `n_0 + markers.len()` regions, each shifted to its
/// lowest-gradient neighbor and dropped when a prior seed sits within the
/// grid spacing.
pub fn grid_sampling_relevance(
    num_rows: usize,
    num_cols: usize,
    n_0: usize,
    markers: &[Marker],
    grad: &[f64],
    relocate: bool,
) -> Result<RelevanceSampling> {
    let num_nodes = num_rows * num_cols;
    let mut seeds = IntList::new();
    let mut label_seed = vec![false; num_nodes];
    let mut scribbled = 0usize;

    let spec = if n_0 > 0 {
        Some(grid_spec(
            num_nodes,
            n_0 as f32 + markers.len() as f32,
        )?)
    } else {
        None
    };

    for marker in markers {
        for &coords in &marker.coords {
            let node_index = coords.y as usize * num_cols + coords.x as usize;
            if !label_seed[node_index] {
                label_seed[node_index] = true;
                seeds.push_back(node_index);
                scribbled += 1;
            }
        }
    }

    let mut grid_placed = 0usize;
    if let Some(spec) = spec {
        let adj = AdjRel::eight();
        let mut y = spec.delta;
        while y < num_rows {
            let mut x = spec.delta;
            while x < num_cols {
                if !near_existing_seed(&label_seed, num_rows, num_cols, x, y, spec.delta) {
                    let anchor = NodeCoords {
                        x: x as i32,
                        y: y as i32,
                    };
                    let index = relocate_to_min_gradient(
                        grad, &label_seed, num_rows, num_cols, &adj, anchor, relocate,
                    );
                    label_seed[index] = true;
                    seeds.push_back(index);
                    grid_placed += 1;
                }
                x += spec.step;
            }
            y += spec.step;
        }
    }

    Ok(RelevanceSampling {
        seeds,
        grid_placed,
        scribbled,
    })
}

/// Seed sampling for class-based removal. Same placement rules as
/// [`grid_sampling_relevance`], but each seed carries a class label and the
/// grid is sized for `n_0` regions alone.
pub fn grid_sampling_scribbles(
    num_rows: usize,
    num_cols: usize,
    n_0: usize,
    markers: &[Marker],
    grad: &[f64],
    relocate: bool,
) -> Result<ClassSampling> {
    let num_nodes = num_rows * num_cols;
    let mut seeds = IntList::new();
    let mut labels_map = Vec::new();
    let mut label_seed = vec![false; num_nodes];

    let spec = if n_0 > 0 {
        Some(grid_spec(num_nodes, n_0 as f32)?)
    } else {
        None
    };

    for (i, marker) in markers.iter().enumerate() {
        for &coords in &marker.coords {
            let node_index = coords.y as usize * num_cols + coords.x as usize;
            if !label_seed[node_index] {
                label_seed[node_index] = true;
                seeds.push_back(node_index);
                labels_map.push(i as i32 + 1);
            }
        }
    }

    let grid_label = markers.len() as i32 + 1;
    if let Some(spec) = spec {
        let adj = AdjRel::eight();
        let mut y = spec.delta;
        while y < num_rows {
            let mut x = spec.delta;
            while x < num_cols {
                if !near_existing_seed(&label_seed, num_rows, num_cols, x, y, spec.delta) {
                    let anchor = NodeCoords {
                        x: x as i32,
                        y: y as i32,
                    };
                    let index = relocate_to_min_gradient(
                        grad, &label_seed, num_rows, num_cols, &adj, anchor, relocate,
                    );
                    label_seed[index] = true;
                    seeds.push_back(index);
                    labels_map.push(grid_label);
                }
                x += spec.step;
            }
            y += spec.step;
        }
    }

    Ok(ClassSampling { seeds, labels_map })
}

#[cfg(test)]
mod tests {
    use super::{grid_sampling_relevance, grid_sampling_scribbles};
    use crate::common::Error;
    use crate::markers::Marker;

    // 4x4 flat image: gradient is uniformly zero, relocation stays put.
    const FLAT_GRAD: [f64; 16] = [0.0; 16];

    #[test]
    fn relevance_sampling_4x4_with_corner_click() {
        let markers = [Marker::from_point(0, 0)];
        let out = grid_sampling_relevance(4, 4, 4, &markers, &FLAT_GRAD, true).unwrap();
        // Stride ~2.42 gives anchors (1,1), (3,1), (1,3), (3,3); the window
        // around (1,1) contains the scribble, so three grid seeds survive.
        assert_eq!(out.scribbled, 1);
        assert_eq!(out.grid_placed, 3);
        let seeds: Vec<usize> = out.seeds.iter().collect();
        assert_eq!(seeds, vec![0, 7, 13, 15]);
    }

    #[test]
    fn duplicate_scribble_pixels_collapse() {
        let markers = [Marker::from_point(2, 2), Marker::from_point(2, 2)];
        let out = grid_sampling_relevance(8, 8, 0, &markers, &[0.0; 64], true).unwrap();
        assert_eq!(out.scribbled, 1);
        assert_eq!(out.seeds.len(), 1);
        assert_eq!(out.grid_placed, 0);
    }

    #[test]
    fn too_many_samples_is_an_error() {
        let markers = [Marker::from_point(0, 0)];
        let err = grid_sampling_relevance(4, 4, 100, &markers, &FLAT_GRAD, true).unwrap_err();
        assert!(matches!(err, Error::SeedsTooDense));
    }

    #[test]
    fn relocation_follows_the_gradient_minimum() {
        // Put a clear minimum at the 8-neighbor (0,0) of the anchor (1,1).
        let mut grad = [5.0; 16];
        grad[0] = 1.0;
        let out = grid_sampling_relevance(4, 4, 4, &[], &grad, true).unwrap();
        let seeds: Vec<usize> = out.seeds.iter().collect();
        assert_eq!(seeds[0], 0);
    }

    #[test]
    fn disabled_relocation_keeps_the_lattice_anchor() {
        let mut grad = [5.0; 16];
        grad[0] = 1.0;
        let out = grid_sampling_relevance(4, 4, 4, &[], &grad, false).unwrap();
        let seeds: Vec<usize> = out.seeds.iter().collect();
        // Anchor (1,1) stays put despite the cheaper neighbor at (0,0).
        assert_eq!(seeds[0], 5);
    }

    #[test]
    fn class_sampling_labels_markers_then_grid() {
        let markers = [Marker::from_point(0, 0)];
        let out = grid_sampling_scribbles(4, 4, 4, &markers, &FLAT_GRAD, true).unwrap();
        let seeds: Vec<usize> = out.seeds.iter().collect();
        assert_eq!(seeds.len(), out.labels_map.len());
        assert_eq!(out.labels_map[0], 1);
        // Every grid seed shares the class after the last marker.
        assert!(out.labels_map[1..].iter().all(|&l| l == 2));
    }

    #[test]
    fn class_sampling_without_grid_budget_keeps_scribbles_only() {
        let markers = [Marker::from_point(1, 1), Marker::from_point(2, 2)];
        let out = grid_sampling_scribbles(4, 4, 0, &markers, &FLAT_GRAD, true).unwrap();
        assert_eq!(out.labels_map, vec![1, 2]);
    }
}
