use crate::graph::eucl_distance;
use crate::intlist::IntList;
use crate::queue::{PrioQueue, RemovalPolicy};
use crate::tree::RegionTree;

/// What the driver loop must do after a class-mode removal round.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stop {
    /// Keep iterating.
    Continue,
    /// Every grid seed was removed: run exactly one more growth pass, then
    /// halt.
    LastPass,
    /// The kept set can no longer improve (no foreground left, or nothing
    /// competing against it). Halt after the current pass.
    Halt,
}

/// Ranks the grown regions by relevance and keeps the best `num_maintain`
/// roots, in relevance order. User-seeded regions rank unbeatable so they
/// always survive into the next round.
///
/// Relevance of a region is its area share weighted by the distance to the
/// object marker, times the feature contrast against its most similar
/// neighbor region. An isolated region has no neighbor to contrast with and
/// keeps infinite relevance.
pub fn select_k_most_relevant_seeds(
    trees: &[RegionTree],
    tree_adj: &[IntList],
    num_nodes: usize,
    num_maintain: usize,
    has_user_seeds: bool,
) -> IntList {
    let num_trees = trees.len();
    let mut tree_prio = vec![0.0f64; num_trees];
    let mut queue = PrioQueue::new(num_trees, RemovalPolicy::MaxVal);
    let mut rel_seeds = IntList::new();

    for (i, tree) in trees.iter().enumerate() {
        if tree.min_dist_user_seed == 0.0 && has_user_seeds {
            tree_prio[i] = f64::INFINITY;
        } else {
            let area_prio =
                (tree.num_nodes as f32 * tree.min_dist_user_seed) as f64 / num_nodes as f64;
            let mean_feat_i = tree.mean_feats();

            let mut grad_prio = f64::INFINITY;
            for adj_tree_id in tree_adj[i].iter() {
                let mean_feat_j = trees[adj_tree_id].mean_feats();
                let dist = eucl_distance(&mean_feat_i, &mean_feat_j);
                grad_prio = grad_prio.min(dist);
            }
            tree_prio[i] = area_prio * grad_prio;
        }
        queue
            .insert(i, &tree_prio)
            .unwrap_or_else(|_| unreachable!("queue sized to the tree count"));
    }

    for _ in 0..num_maintain {
        match queue.pop(&tree_prio) {
            Some(tree_id) => rel_seeds.push_back(trees[tree_id].root_index),
            None => break,
        }
    }
    rel_seeds
}

/// Adjacency pattern of a region, by its own polarity and its neighbors'.
/// Background-seeded regions are 1 (uniform) or 2 (mixed); foreground-seeded
/// are 3 (uniform) or 4 (mixed). Mixed is sticky once seen.
#[derive(Clone, Copy, PartialEq, Eq)]
enum AdjPattern {
    Isolated,
    BackgroundUniform,
    BackgroundMixed,
    ForegroundUniform,
    ForegroundMixed,
}

/// Result of one class-mode removal round: surviving roots paired with
/// their class labels, plus the driver's stop directive.
pub struct RemovalOutcome {
    pub seeds: IntList,
    pub kept_labels: Vec<i32>,
    pub stop: Stop,
}

fn keep(seeds: &mut IntList, kept_labels: &mut Vec<i32>, root_index: usize, label: i32) {
    seeds.push_back(root_index);
    kept_labels.push(label);
}

// Uniform-background fallback: a grid region below the relevance threshold
// survives only while it touches a foreground or an already-removed region,
// i.e. while it still shields the object boundary.
fn keep_if_shields_foreground(
    tree_adj: &IntList,
    tree_id: usize,
    root_index: usize,
    labels_scratch: &mut [i32],
    obj_markers: i32,
    seeds: &mut IntList,
    kept_labels: &mut Vec<i32>,
) {
    let adj_obj = tree_adj
        .iter()
        .any(|adj_tree_id| labels_scratch[adj_tree_id] <= obj_markers);
    if adj_obj {
        keep(seeds, kept_labels, root_index, labels_scratch[tree_id]);
    } else {
        labels_scratch[tree_id] = 0;
    }
}

/// One class-mode removal round.
///
/// Regions seeded by scribbles always survive. Grid regions are scored by
/// their adjacency pattern and culled against a mean-plus-deviation
/// threshold per pattern family: the uniform family (patterns 1 and 3)
/// feeds a min-ordered scan with an early keep-everything cut, the mixed
/// family (patterns 2 and 4) a max-ordered scan cut at the first region
/// below its threshold. Regions that never met a neighbor are dropped.
///
/// `labels_map[i]` is the class of seed `i` going into the round; the kept
/// labels come back compacted in keep order.
pub fn seed_removal(
    trees: &[RegionTree],
    tree_adj: &[IntList],
    num_nodes: usize,
    num_markers: usize,
    obj_markers: usize,
    labels_map: &[i32],
) -> RemovalOutcome {
    let num_trees = trees.len();
    debug_assert_eq!(labels_map.len(), num_trees);

    let mut tree_prio = vec![0.0f64; num_trees];
    let mut labels_scratch = labels_map.to_vec();
    let mut seeds = IntList::new();
    let mut kept_labels = Vec::with_capacity(num_trees);

    let mut queue_uniform = PrioQueue::new(num_trees, RemovalPolicy::MinVal);
    let mut queue_mixed = PrioQueue::new(num_trees, RemovalPolicy::MaxVal);

    let obj_markers_i = obj_markers as i32;
    let num_markers_i = num_markers as i32;

    // The threshold accumulators run in single precision.
    let mut sum_uniform = 0.0f32;
    let mut sum2_uniform = 0.0f32;
    let mut sum_mixed = 0.0f32;
    let mut sum2_mixed = 0.0f32;
    let mut count_bg_uniform = 0usize;
    let mut count_bg_mixed = 0usize;
    let mut count_fg_uniform = 0usize;
    let mut count_fg_mixed = 0usize;

    for (i, tree) in trees.iter().enumerate() {
        let label = labels_map[i];
        let background_seed = label > obj_markers_i;
        let grid_seed = label > num_markers_i;

        let area_prio = tree.num_nodes as f64 / num_nodes as f64;
        let mean_feat_i = tree.mean_feats();
        let mut grad_prio = f64::INFINITY;
        let mut grad_prio_mix = f64::INFINITY;
        let mut pattern = AdjPattern::Isolated;

        for adj_tree_id in tree_adj[i].iter() {
            let mean_feat_j = trees[adj_tree_id].mean_feats();
            let dist = eucl_distance(&mean_feat_i, &mean_feat_j);
            let adj_background = labels_map[adj_tree_id] > obj_markers_i;

            if background_seed != adj_background {
                grad_prio_mix = grad_prio_mix.min(dist);
            } else {
                grad_prio = grad_prio.min(dist);
            }

            if pattern != AdjPattern::BackgroundMixed && pattern != AdjPattern::ForegroundMixed {
                pattern = match (background_seed, adj_background) {
                    (true, false) => AdjPattern::BackgroundMixed,
                    (true, true) => AdjPattern::BackgroundUniform,
                    (false, true) => AdjPattern::ForegroundMixed,
                    (false, false) => AdjPattern::ForegroundUniform,
                };
            }
        }

        match pattern {
            AdjPattern::Isolated => {}
            AdjPattern::BackgroundUniform | AdjPattern::ForegroundUniform => {
                tree_prio[i] = area_prio * grad_prio;
                if pattern == AdjPattern::BackgroundUniform {
                    count_bg_uniform += 1;
                } else {
                    count_fg_uniform += 1;
                }
                if grid_seed {
                    queue_uniform
                        .insert(i, &tree_prio)
                        .unwrap_or_else(|_| unreachable!("queue sized to the tree count"));
                } else {
                    keep(&mut seeds, &mut kept_labels, tree.root_index, label);
                }
                sum_uniform += tree_prio[i] as f32;
                sum2_uniform += (tree_prio[i] * tree_prio[i]) as f32;
            }
            AdjPattern::BackgroundMixed | AdjPattern::ForegroundMixed => {
                tree_prio[i] = grad_prio_mix;
                if pattern == AdjPattern::BackgroundMixed {
                    count_bg_mixed += 1;
                    if grid_seed {
                        queue_mixed
                            .insert(i, &tree_prio)
                            .unwrap_or_else(|_| unreachable!("queue sized to the tree count"));
                    } else {
                        keep(&mut seeds, &mut kept_labels, tree.root_index, label);
                    }
                } else {
                    count_fg_mixed += 1;
                    keep(&mut seeds, &mut kept_labels, tree.root_index, label);
                }
                sum_mixed += tree_prio[i] as f32;
                sum2_mixed += (tree_prio[i] * tree_prio[i]) as f32;
            }
        }
    }

    let threshold_uniform = relevance_threshold(
        sum_uniform,
        sum2_uniform,
        count_bg_uniform as f32,
        count_fg_uniform as f32,
    );
    let threshold_mixed = relevance_threshold(
        sum_mixed,
        sum2_mixed,
        count_bg_mixed as f32,
        count_fg_mixed as f32,
    );

    // Min-ordered scan: once the least relevant remaining region clears the
    // threshold, all of them do.
    while let Some(tree_id) = queue_uniform.pop(&tree_prio) {
        if tree_prio[tree_id] >= threshold_uniform {
            keep(
                &mut seeds,
                &mut kept_labels,
                trees[tree_id].root_index,
                labels_scratch[tree_id],
            );
            while let Some(rest_id) = queue_uniform.pop(&tree_prio) {
                keep(
                    &mut seeds,
                    &mut kept_labels,
                    trees[rest_id].root_index,
                    labels_scratch[rest_id],
                );
            }
        } else {
            keep_if_shields_foreground(
                &tree_adj[tree_id],
                tree_id,
                trees[tree_id].root_index,
                &mut labels_scratch,
                obj_markers_i,
                &mut seeds,
                &mut kept_labels,
            );
        }
    }

    // Max-ordered scan: the first region below the threshold cuts off every
    // remaining one.
    while let Some(tree_id) = queue_mixed.pop(&tree_prio) {
        if tree_prio[tree_id] >= threshold_mixed {
            keep(
                &mut seeds,
                &mut kept_labels,
                trees[tree_id].root_index,
                labels_scratch[tree_id],
            );
        } else {
            break;
        }
    }

    let stop = stop_directive(&kept_labels, num_markers_i, obj_markers_i);
    RemovalOutcome {
        seeds,
        kept_labels,
        stop,
    }
}

// Mean plus standard deviation over one pattern family. The deviation term
// folds the second family count into both the numerator and the divisor,
// matching the historical scoring this culling was tuned against.
fn relevance_threshold(sum: f32, sum2: f32, count_a: f32, count_b: f32) -> f64 {
    let inner = sum2 - 2.0 * sum + ((sum * sum) / count_a + count_b);
    let std_deviation = (inner.abs() / count_a + count_b).sqrt();
    (sum / (count_a + count_b)) as f64 + std_deviation as f64
}

fn stop_directive(kept_labels: &[i32], num_markers: i32, obj_markers: i32) -> Stop {
    let mut foreground = false;
    let mut grid_seeds = false;
    // A single-marker run has no background scribble to account for.
    let mut background = num_markers == 1;
    for &label in kept_labels {
        if label <= obj_markers {
            foreground = true;
        } else if label > num_markers {
            grid_seeds = true;
        } else {
            background = true;
        }
        if foreground && background && grid_seeds {
            break;
        }
    }
    if num_markers == 1 {
        background = false;
    }

    let mut stop = Stop::Continue;
    if !grid_seeds {
        stop = Stop::LastPass;
    }
    if !foreground || (!background && !grid_seeds) {
        stop = Stop::Halt;
    }
    stop
}

#[cfg(test)]
mod tests {
    use super::{seed_removal, select_k_most_relevant_seeds, Stop};
    use crate::graph::FeatureGraph;
    use crate::intlist::IntList;
    use crate::tree::RegionTree;

    fn graph_4x4() -> FeatureGraph {
        let pixels: Vec<u32> = (0..16).map(|i| (i * 10) as u32).collect();
        FeatureGraph::from_pixels(&pixels, 4, 4, 1).unwrap()
    }

    fn tree_with(graph: &FeatureGraph, root: usize, members: &[usize]) -> RegionTree {
        let mut tree = RegionTree::new(root);
        for &m in members {
            tree.insert(graph, m, 0.5);
        }
        tree
    }

    fn adj_lists(pairs: &[(usize, usize)], n: usize) -> Vec<IntList> {
        let mut lists: Vec<IntList> = (0..n).map(|_| IntList::new()).collect();
        for &(a, b) in pairs {
            lists[a].push_back(b);
            lists[b].push_back(a);
        }
        lists
    }

    #[test]
    fn user_seeded_regions_always_come_first() {
        let graph = graph_4x4();
        let mut trees = vec![
            tree_with(&graph, 0, &[0, 1]),
            tree_with(&graph, 5, &[5, 6, 9, 10]),
            tree_with(&graph, 15, &[14, 15]),
        ];
        trees[0].min_dist_user_seed = 0.0;
        trees[1].min_dist_user_seed = 3.0;
        trees[2].min_dist_user_seed = 1.0;
        let adj = adj_lists(&[(0, 1), (1, 2)], 3);

        let kept = select_k_most_relevant_seeds(&trees, &adj, 16, 2, true);
        let roots: Vec<usize> = kept.iter().collect();
        assert_eq!(roots[0], 0);
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn keeps_at_most_num_maintain_roots() {
        let graph = graph_4x4();
        let trees = vec![
            tree_with(&graph, 0, &[0]),
            tree_with(&graph, 5, &[5]),
            tree_with(&graph, 10, &[10]),
        ];
        let adj = adj_lists(&[(0, 1), (1, 2), (0, 2)], 3);
        let kept = select_k_most_relevant_seeds(&trees, &adj, 16, 5, false);
        assert_eq!(kept.len(), 3);
        let kept = select_k_most_relevant_seeds(&trees, &adj, 16, 1, false);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn scribble_seeds_survive_removal() {
        let graph = graph_4x4();
        let trees = vec![
            tree_with(&graph, 0, &[0, 1, 4]),
            tree_with(&graph, 10, &[10, 11]),
            tree_with(&graph, 15, &[14, 15]),
        ];
        let adj = adj_lists(&[(0, 1), (1, 2)], 3);
        // Marker seeds get labels 1 and 2, grid seed label 3.
        let labels = vec![1, 2, 3];
        let out = seed_removal(&trees, &adj, 16, 2, 1, &labels);
        assert!(out.kept_labels.contains(&1));
        assert!(out.kept_labels.contains(&2));
        assert_eq!(out.seeds.len(), out.kept_labels.len());
    }

    #[test]
    fn losing_every_grid_seed_requests_a_last_pass() {
        let graph = graph_4x4();
        // One foreground marker and one background marker, no grid trees.
        let trees = vec![tree_with(&graph, 0, &[0, 1]), tree_with(&graph, 15, &[14, 15])];
        let adj = adj_lists(&[(0, 1)], 2);
        let out = seed_removal(&trees, &adj, 16, 2, 1, &[1, 2]);
        assert_eq!(out.stop, Stop::LastPass);
    }

    #[test]
    fn no_foreground_left_halts() {
        let graph = graph_4x4();
        let trees = vec![tree_with(&graph, 0, &[0, 1]), tree_with(&graph, 15, &[14, 15])];
        let adj = adj_lists(&[(0, 1)], 2);
        // Both regions are background-polarity scribbles.
        let out = seed_removal(&trees, &adj, 16, 3, 1, &[2, 3]);
        assert_eq!(out.stop, Stop::Halt);
    }

    #[test]
    fn isolated_regions_are_dropped() {
        let graph = graph_4x4();
        let trees = vec![
            tree_with(&graph, 0, &[0, 1]),
            tree_with(&graph, 10, &[10]),
            tree_with(&graph, 15, &[15]),
        ];
        // Region 2 has no adjacency at all.
        let adj = adj_lists(&[(0, 1)], 3);
        let out = seed_removal(&trees, &adj, 16, 1, 1, &[1, 2, 2]);
        let roots: Vec<usize> = out.seeds.iter().collect();
        assert!(!roots.contains(&15));
    }
}
