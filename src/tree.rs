use crate::graph::{FeatureGraph, NUM_FEATS};

/// Running aggregate of one growing region.
///
/// Holds sums, never member lists: a pixel is folded in when the growth pass
/// finalizes it, so the mean feature vector and the gradient statistics stay
/// O(1) to read while the region mutates.
#[derive(Debug, Clone)]
pub struct RegionTree {
    pub root_index: usize,
    pub num_nodes: u32,
    pub sum_feat: [f32; NUM_FEATS],
    pub sum_grad: f64,
    pub sum_grad_2: f64,
    /// Distance from this region to the closest pixel of the first user
    /// marker. Infinity until the region touches one; 0 when it contains
    /// one; pinned to 1 when the run has no user seeds at all.
    pub min_dist_user_seed: f32,
}

impl RegionTree {
    /// Empty tree rooted at `root_index`. The root's own features enter the
    /// aggregates when the growth pass finalizes the root, like any other
    /// member.
    pub fn new(root_index: usize) -> Self {
        Self {
            root_index,
            num_nodes: 0,
            sum_feat: [0.0; NUM_FEATS],
            sum_grad: 0.0,
            sum_grad_2: 0.0,
            min_dist_user_seed: f32::INFINITY,
        }
    }

    /// Re-roots a pooled tree and zeroes every aggregate.
    pub fn reset(&mut self, root_index: usize) {
        self.root_index = root_index;
        self.num_nodes = 0;
        self.sum_feat = [0.0; NUM_FEATS];
        self.sum_grad = 0.0;
        self.sum_grad_2 = 0.0;
        self.min_dist_user_seed = f32::INFINITY;
    }

    #[inline(always)]
    pub fn insert(&mut self, graph: &FeatureGraph, node: usize, grad: f64) {
        self.num_nodes += 1;
        let feats = graph.feat(node);
        for i in 0..NUM_FEATS {
            self.sum_feat[i] += feats[i];
        }
        self.sum_grad += grad;
        self.sum_grad_2 += grad * grad;
    }

    #[inline(always)]
    pub fn remove(&mut self, graph: &FeatureGraph, node: usize, grad: f64) {
        debug_assert!(self.num_nodes > 0);
        self.num_nodes -= 1;
        let feats = graph.feat(node);
        for i in 0..NUM_FEATS {
            self.sum_feat[i] -= feats[i];
        }
        self.sum_grad -= grad;
        self.sum_grad_2 -= grad * grad;
    }

    /// Mean feature vector of the current members.
    #[inline(always)]
    pub fn mean_feats(&self) -> [f32; NUM_FEATS] {
        let n = self.num_nodes as f32;
        [
            self.sum_feat[0] / n,
            self.sum_feat[1] / n,
            self.sum_feat[2] / n,
        ]
    }

    /// Coefficient of variation of the members' gradients, the region's
    /// local heterogeneity measure.
    #[inline(always)]
    pub fn grad_variation(&self) -> f64 {
        let n = self.num_nodes as f64;
        let variance = self.sum_grad_2 / n - (self.sum_grad * self.sum_grad) / (n * n);
        let mean = self.sum_grad / n;
        variance.max(0.0).sqrt() / mean.max(0.00001)
    }
}

#[cfg(test)]
mod tests {
    use super::RegionTree;
    use crate::graph::FeatureGraph;

    fn small_graph() -> FeatureGraph {
        let pixels: Vec<u32> = (0..16).map(|i| (i * 16) as u32).collect();
        FeatureGraph::from_pixels(&pixels, 4, 4, 1).unwrap()
    }

    #[test]
    fn aggregates_match_exact_sums() {
        let graph = small_graph();
        let mut tree = RegionTree::new(0);
        let grads = [0.5f64, 1.5, 2.5, 3.5];
        for (node, g) in grads.iter().enumerate() {
            tree.insert(&graph, node, *g);
        }
        assert_eq!(tree.num_nodes, 4);

        let mut expect = [0.0f32; 3];
        for node in 0..4 {
            let f = graph.feat(node);
            for i in 0..3 {
                expect[i] += f[i];
            }
        }
        let mean = tree.mean_feats();
        for i in 0..3 {
            assert!((mean[i] - expect[i] / 4.0).abs() < 1e-5);
        }

        tree.remove(&graph, 1, 1.5);
        tree.remove(&graph, 2, 2.5);
        assert_eq!(tree.num_nodes, 2);
        assert!((tree.sum_grad - 4.0).abs() < 1e-9);
        let f0 = graph.feat(0);
        let f3 = graph.feat(3);
        let mean = tree.mean_feats();
        for i in 0..3 {
            assert!((mean[i] - (f0[i] + f3[i]) / 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn grad_variation_of_constant_members_is_zero() {
        let graph = small_graph();
        let mut tree = RegionTree::new(0);
        for node in 0..4 {
            tree.insert(&graph, node, 2.0);
        }
        assert!(tree.grad_variation().abs() < 1e-9);
    }

    #[test]
    fn grad_variation_matches_definition() {
        let graph = small_graph();
        let mut tree = RegionTree::new(0);
        tree.insert(&graph, 0, 1.0);
        tree.insert(&graph, 1, 3.0);
        // mean 2, variance 1, cv = 1/2
        assert!((tree.grad_variation() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_a_fresh_tree() {
        let graph = small_graph();
        let mut tree = RegionTree::new(0);
        tree.insert(&graph, 0, 1.0);
        tree.min_dist_user_seed = 0.0;
        tree.reset(7);
        assert_eq!(tree.root_index, 7);
        assert_eq!(tree.num_nodes, 0);
        assert_eq!(tree.sum_grad, 0.0);
        assert!(tree.min_dist_user_seed.is_infinite());
    }
}
