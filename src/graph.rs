use crate::color::{gray_to_lab, srgb_to_lab};
use crate::common::{split_length_to_ranges, Error, Result};
use aligned_vec::{AVec, ConstAlign};
use assume::assume;
use multiversion::multiversion;
use rayon::current_num_threads;
use rayon::prelude::*;

const ALIGN: usize = 64;

/// Number of feature components per node (CIELAB).
pub const NUM_FEATS: usize = 3;

/// Integer pixel coordinates, `x` = column, `y` = row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeCoords {
    pub x: i32,
    pub y: i32,
}

impl NodeCoords {
    #[inline(always)]
    pub fn is_valid(&self, num_rows: usize, num_cols: usize) -> bool {
        self.x >= 0 && (self.x as usize) < num_cols && self.y >= 0 && (self.y as usize) < num_rows
    }
}

/// Fixed neighborhood offset table.
pub struct AdjRel {
    pub dx: &'static [i32],
    pub dy: &'static [i32],
}

impl AdjRel {
    /// Left, right, top, bottom.
    pub fn four() -> AdjRel {
        AdjRel {
            dx: &[-1, 1, 0, 0],
            dy: &[0, 0, -1, 1],
        }
    }

    /// The 4-neighborhood followed by the diagonals.
    pub fn eight() -> AdjRel {
        AdjRel {
            dx: &[-1, 1, 0, 0, -1, 1, -1, 1],
            dy: &[0, 0, -1, 1, 1, -1, -1, 1],
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.dx.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }

    #[inline(always)]
    pub fn neighbor(&self, coords: NodeCoords, i: usize) -> NodeCoords {
        NodeCoords {
            x: coords.x + self.dx[i],
            y: coords.y + self.dy[i],
        }
    }
}

/// Per-pixel CIELAB feature graph. Immutable after construction; the growth
/// pass and the region trees only read from it.
#[derive(Debug)]
pub struct FeatureGraph {
    feats: AVec<f32, ConstAlign<ALIGN>>,
    pub num_rows: usize,
    pub num_cols: usize,
    pub num_nodes: usize,
    pub num_feats: usize,
}

impl FeatureGraph {
    /// Builds the graph from an interleaved pixel buffer.
    ///
    /// `channels <= 2` is treated as grayscale (channel 0, any alpha is
    /// ignored), otherwise the first three channels are taken as sRGB. The
    /// normalization value is 255 for 8-bit content and 65535 for 16-bit;
    /// anything above 16 bits is refused.
    pub fn from_pixels(
        pixels: &[u32],
        num_rows: usize,
        num_cols: usize,
        num_channels: usize,
    ) -> Result<Self> {
        assert!(num_rows > 0);
        assert!(num_cols > 0);
        assert!(num_channels > 0);
        if pixels.len() != num_rows * num_cols * num_channels {
            return Err(Error::DimensionMismatch);
        }
        let max_val = pixels.par_iter().copied().max().unwrap_or(0);
        if max_val > 65535 {
            return Err(Error::UnsupportedSampleDepth(max_val));
        }
        let normval: u32 = if max_val <= 255 { 255 } else { 65535 };

        let num_nodes = num_rows * num_cols;
        let mut feats: AVec<f32, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, (0..num_nodes * NUM_FEATS).map(|_| 0.0f32));
        feats
            .as_mut_slice()
            .par_chunks_exact_mut(NUM_FEATS)
            .zip(pixels.par_chunks_exact(num_channels))
            .for_each(|(out, px)| {
                let lab = if num_channels <= 2 {
                    gray_to_lab(px[0], normval)
                } else {
                    srgb_to_lab([px[0], px[1], px[2]], normval)
                };
                out.copy_from_slice(&lab);
            });
        Ok(Self {
            feats,
            num_rows,
            num_cols,
            num_nodes,
            num_feats: NUM_FEATS,
        })
    }

    /// Convenience for packed 8-bit sRGB content.
    pub fn from_srgb8(rgb: &[u8], num_rows: usize, num_cols: usize) -> Result<Self> {
        let widened: Vec<u32> = rgb.iter().map(|v| *v as u32).collect();
        Self::from_pixels(&widened, num_rows, num_cols, 3)
    }

    #[inline(always)]
    pub fn feat(&self, node: usize) -> [f32; NUM_FEATS] {
        debug_assert!(node < self.num_nodes);
        let base = node * NUM_FEATS;
        [self.feats[base], self.feats[base + 1], self.feats[base + 2]]
    }

    #[inline(always)]
    pub fn node_coords(&self, node: usize) -> NodeCoords {
        NodeCoords {
            x: (node % self.num_cols) as i32,
            y: (node / self.num_cols) as i32,
        }
    }

    #[inline(always)]
    pub fn node_index(&self, coords: NodeCoords) -> usize {
        coords.y as usize * self.num_cols + coords.x as usize
    }
}

/// Euclidean distance between two feature vectors.
#[inline(always)]
pub fn eucl_distance(a: &[f32; NUM_FEATS], b: &[f32; NUM_FEATS]) -> f64 {
    let mut dist: f64 = 0.0;
    for i in 0..NUM_FEATS {
        let d = a[i] - b[i];
        dist += (d * d) as f64;
    }
    (dist as f32).sqrt() as f64
}

/// L1 distance between two feature vectors.
#[inline(always)]
pub fn taxicab_distance(a: &[f32; NUM_FEATS], b: &[f32; NUM_FEATS]) -> f64 {
    let mut dist: f64 = 0.0;
    for i in 0..NUM_FEATS {
        dist += (a[i] - b[i]).abs() as f64;
    }
    dist
}

/// Euclidean distance between two pixel positions.
#[inline(always)]
pub fn eucl_distance_coords(a: NodeCoords, b: NodeCoords) -> f32 {
    let dx = (a.x - b.x) as f32;
    let dy = (a.y - b.y) as f32;
    (dx * dx + dy * dy).sqrt()
}

/// Computes the gradient field and the image-wide coefficient of variation.
///
/// Per node: weighted sum of L1 feature distances to the valid 8-neighbors,
/// the weights being inverse Euclidean offset distances normalized to sum 1
/// over the full neighborhood. The coefficient of variation is
/// `sqrt(max(0, variance)) / max(0.001, mean)` over the whole field.
#[multiversion(targets = "simd")]
pub fn compute_gradient(graph: &FeatureGraph) -> (Vec<f64>, f64) {
    let adj_rel = AdjRel::eight();
    let rel_size = adj_rel.len();
    let max_adj_dist = 2.0f32.sqrt();

    let mut dist_weight = [0.0f32; 8];
    let mut sum_weight = 0.0f32;
    for i in 0..rel_size {
        let div = ((adj_rel.dx[i] * adj_rel.dx[i] + adj_rel.dy[i] * adj_rel.dy[i]) as f32).sqrt();
        dist_weight[i] = max_adj_dist / div;
        sum_weight += dist_weight[i];
    }
    for w in dist_weight.iter_mut() {
        *w /= sum_weight;
    }

    let num_nodes = graph.num_nodes;
    let mut grad = vec![0.0f64; num_nodes];

    fn gradient_part(
        graph: &FeatureGraph,
        adj_rel: &AdjRel,
        dist_weight: &[f32; 8],
        start: usize,
        out: &mut [f64],
    ) {
        for (node, g) in (start..).zip(out.iter_mut()) {
            let feats = graph.feat(node);
            let coords = graph.node_coords(node);
            let mut acc = 0.0f64;
            for j in 0..adj_rel.len() {
                let adj_coords = adj_rel.neighbor(coords, j);
                if adj_coords.is_valid(graph.num_rows, graph.num_cols) {
                    let adj_index = graph.node_index(adj_coords);
                    assume!(unsafe: adj_index < graph.num_nodes);
                    let adj_feats = graph.feat(adj_index);
                    acc += taxicab_distance(&adj_feats, &feats) * dist_weight[j] as f64;
                }
            }
            *g = acc;
        }
    }

    let ranges = split_length_to_ranges(num_nodes, current_num_threads());
    rayon::scope(|s| {
        let mut rest = grad.as_mut_slice();
        let adj_rel = &adj_rel;
        let dist_weight = &dist_weight;
        for range in ranges {
            let (chunk, tail) = rest.split_at_mut(range.len());
            rest = tail;
            s.spawn(move |_| gradient_part(graph, adj_rel, dist_weight, range.start, chunk));
        }
    });

    let mut sum_grad = 0.0f64;
    let mut sum_grad_2 = 0.0f64;
    for g in &grad {
        sum_grad += *g;
        sum_grad_2 += *g * *g;
    }
    let n = num_nodes as f64;
    let variance = sum_grad_2 / n - (sum_grad * sum_grad) / (n * n);
    let mean = sum_grad / n;
    let coef_variation = variance.max(0.0).sqrt() / mean.max(0.001);

    (grad, coef_variation)
}

#[cfg(test)]
mod tests {
    use super::{compute_gradient, eucl_distance, FeatureGraph, NodeCoords};
    use crate::common::Error;

    #[test]
    fn rejects_samples_beyond_16_bit() {
        let pixels = vec![0u32, 70000, 0, 0];
        let err = FeatureGraph::from_pixels(&pixels, 2, 2, 1).unwrap_err();
        assert_eq!(err, Error::UnsupportedSampleDepth(70000));
    }

    #[test]
    fn rejects_wrong_buffer_size() {
        let pixels = vec![0u32; 5];
        let err = FeatureGraph::from_pixels(&pixels, 2, 2, 1).unwrap_err();
        assert_eq!(err, Error::DimensionMismatch);
    }

    #[test]
    fn coords_roundtrip() {
        let pixels = vec![10u32; 12];
        let graph = FeatureGraph::from_pixels(&pixels, 3, 4, 1).unwrap();
        for node in 0..graph.num_nodes {
            let coords = graph.node_coords(node);
            assert!(coords.is_valid(3, 4));
            assert_eq!(graph.node_index(coords), node);
        }
        assert!(!NodeCoords { x: -1, y: 0 }.is_valid(3, 4));
        assert!(!NodeCoords { x: 0, y: 3 }.is_valid(3, 4));
    }

    #[test]
    fn flat_image_has_zero_gradient() {
        let pixels = vec![128u32; 16];
        let graph = FeatureGraph::from_pixels(&pixels, 4, 4, 1).unwrap();
        let (grad, cv) = compute_gradient(&graph);
        assert!(grad.iter().all(|g| g.abs() < 1e-9));
        assert!(cv.abs() < 1e-9);
    }

    #[test]
    fn step_edge_raises_gradient_at_the_seam() {
        // Left half dark, right half bright.
        let mut pixels = vec![0u32; 64];
        for y in 0..8 {
            for x in 4..8 {
                pixels[y * 8 + x] = 255;
            }
        }
        let graph = FeatureGraph::from_pixels(&pixels, 8, 8, 1).unwrap();
        let (grad, cv) = compute_gradient(&graph);
        assert!(grad[8 * 4 + 3] > grad[8 * 4]);
        assert!(grad[8 * 4 + 4] > grad[8 * 4 + 7]);
        assert!(cv > 0.0);
    }

    #[test]
    fn identical_features_have_zero_distance() {
        let pixels = vec![200u32; 4];
        let graph = FeatureGraph::from_pixels(&pixels, 2, 2, 1).unwrap();
        let a = graph.feat(0);
        let b = graph.feat(3);
        assert!(eucl_distance(&a, &b).abs() < 1e-9);
    }
}
