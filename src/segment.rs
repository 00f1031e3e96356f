use crate::arrays::Array2D;
use crate::common::{Config, Error, PathCostFunction, Result};
use crate::graph::{
    compute_gradient, eucl_distance, eucl_distance_coords, AdjRel, FeatureGraph, NUM_FEATS,
};
use crate::intlist::IntList;
use crate::lifecycle::{seed_removal, select_k_most_relevant_seeds, Stop};
use crate::markers::Marker;
use crate::queue::{ElemState, PrioQueue, RemovalPolicy};
use crate::seeds::{grid_sampling_relevance, grid_sampling_scribbles};
use crate::tree::RegionTree;
use log::debug;
use rayon::prelude::*;

/// Final output of a run: per-pixel class labels, the border mask (0 or
/// 255) and the count of distinct labels in the result.
#[derive(Debug)]
pub struct Segmentation {
    pub labels: Array2D<i32>,
    pub borders: Array2D<u8>,
    pub num_regions: usize,
}

/// Path cost of extending a tree over one arc. Every formula is monotone:
/// the new cost is the maximum of the running path cost and an arc term.
#[allow(clippy::too_many_arguments)]
fn path_cost(
    mean_feat_tree: &[f32; NUM_FEATS],
    adj_feats: &[f32; NUM_FEATS],
    cost: f64,
    tree_size: u32,
    grad_adj: f64,
    cv_tree: f64,
    alpha: f64,
    c2: f64,
    function: PathCostFunction,
) -> f64 {
    let arc_cost = eucl_distance(mean_feat_tree, adj_feats);
    match function {
        PathCostFunction::ColorDistance => cost.max(arc_cost),
        PathCostFunction::GradientCost => {
            let beta = 1.0f64.max(alpha * c2).max(cv_tree);
            cost.max(arc_cost * grad_adj.powf(1.0 / alpha) / beta)
        }
        PathCostFunction::SumGradientCost => {
            let beta = 1.0f64.max(alpha * c2).max(cv_tree);
            cost.max(arc_cost + grad_adj.powf(1.0 / alpha) / beta)
        }
        PathCostFunction::CvTreeNorm => {
            let beta = 1.0f64
                .max(alpha * c2)
                .max(cv_tree / (tree_size as f32) as f64);
            cost.max(arc_cost * grad_adj.powf(1.0 / alpha) / beta)
        }
        PathCostFunction::BetaNorm => {
            let beta = 1.0f64.max(alpha * c2).max(cv_tree) / (tree_size as f32) as f64;
            cost.max(arc_cost * grad_adj.powf(1.0 / alpha) / beta)
        }
        PathCostFunction::SumBetaNorm => {
            let beta = 1.0f64.max(alpha * c2).max(cv_tree) / (tree_size as f32) as f64;
            cost.max(arc_cost + grad_adj.powf(1.0 / alpha) / beta)
        }
    }
}

// Re-roots the pooled trees on the current seed set, reusing slots from
// earlier passes.
fn rebuild_trees(trees: &mut Vec<RegionTree>, seed_set: &IntList) {
    let mut count = 0;
    for seed_index in seed_set.iter() {
        if count < trees.len() {
            trees[count].reset(seed_index);
        } else {
            trees.push(RegionTree::new(seed_index));
        }
        count += 1;
    }
    trees.truncate(count);
}

// Records mutual adjacency between two trees the first time a shared border
// pixel pair is seen.
fn record_tree_adjacency(
    tree_adj: &mut [IntList],
    are_trees_adj: &mut [bool],
    num_trees: usize,
    a: usize,
    b: usize,
) {
    if !are_trees_adj[a * num_trees + b] {
        tree_adj[a].push_back(b);
        are_trees_adj[a * num_trees + b] = true;
    }
    if !are_trees_adj[b * num_trees + a] {
        tree_adj[b].push_back(a);
        are_trees_adj[b * num_trees + a] = true;
    }
}

// Every scribble pixel must index into the image; a stray coordinate is a
// caller error, reported before any growth state is touched.
fn validate_markers(markers: &[Marker], num_rows: usize, num_cols: usize) -> Result<()> {
    for marker in markers {
        for &coords in &marker.coords {
            if !coords.is_valid(num_rows, num_cols) {
                return Err(Error::MarkerOutOfBounds {
                    x: coords.x,
                    y: coords.y,
                });
            }
        }
    }
    Ok(())
}

fn count_regions(labels: &Array2D<i32>) -> usize {
    let max = labels.data.iter().copied().max().unwrap_or(-1);
    if max < 0 {
        return 0;
    }
    let mut seen = vec![false; max as usize + 1];
    for &label in labels.data.iter() {
        if label >= 0 {
            seen[label as usize] = true;
        }
    }
    seen.iter().filter(|s| **s).count()
}

/// Interactive segmentation with relevance-ranked seed removal.
///
/// Seeds grow into an optimum forest; after each pass the least relevant
/// regions lose their seeds and the survivors grow again, with the kept
/// count decaying exponentially toward `num_superpixels` plus the scribble
/// seeds. Pixels conquered from the first `obj_markers` scribbles keep the
/// scribble's label; everything else shares one background label.
pub fn run_relevance_mode(
    graph: &FeatureGraph,
    config: &Config,
    markers: &[Marker],
) -> Result<Segmentation> {
    let num_rows = graph.num_rows;
    let num_cols = graph.num_cols;
    let num_nodes = graph.num_nodes;
    let adj_rel = AdjRel::four();
    validate_markers(markers, num_rows, num_cols)?;

    let (grad, image_cv) = compute_gradient(graph);
    let (c1, c2) = config.cost_params();
    let alpha = c1.max(image_cv);

    let sampling = grid_sampling_relevance(
        num_rows,
        num_cols,
        config.num_grid_seeds,
        markers,
        &grad,
        config.relocate_seeds,
    )?;
    let mut seed_set = sampling.seeds;
    let n_0 = sampling.grid_placed;
    let n_f = config.num_superpixels + sampling.scribbled;

    let mut cost_map = vec![0.0f64; num_nodes];
    let mut label_img = vec![-1i32; num_nodes];
    let mut labels = Array2D::from_fill(-1i32, num_cols, num_rows);
    let mut borders = Array2D::from_fill(0u8, num_cols, num_rows);
    let mut queue = PrioQueue::new(num_nodes, RemovalPolicy::MinVal);
    let mut trees: Vec<RegionTree> = Vec::new();

    let first_marker = markers.first();
    let mut iter = 1usize;

    loop {
        let num_trees = seed_set.len();
        debug!("pass {iter}: growing {num_trees} regions");
        let mut tree_adj: Vec<IntList> = (0..num_trees).map(|_| IntList::new()).collect();
        let mut are_trees_adj = vec![false; num_trees * num_trees];

        cost_map
            .par_iter_mut()
            .zip(label_img.par_iter_mut())
            .zip(
                labels
                    .data
                    .as_mut_slice()
                    .par_iter_mut()
                    .zip(borders.data.as_mut_slice().par_iter_mut()),
            )
            .for_each(|((cost, tree_label), (class_label, border))| {
                *cost = f64::INFINITY;
                *tree_label = -1;
                *class_label = -1;
                *border = 0;
            });

        // Scribble pixels always carry their marker's label, whether or not
        // they are still seeds this pass.
        for (i, marker) in markers.iter().enumerate() {
            for &coords in &marker.coords {
                labels.data[graph.node_index(coords)] = i as i32 + 1;
            }
        }

        rebuild_trees(&mut trees, &seed_set);
        let background_label = markers.len() as i32 + 1;
        for (tree_id, seed_index) in seed_set.iter().enumerate() {
            cost_map[seed_index] = 0.0;
            label_img[seed_index] = tree_id as i32;
            if labels.data[seed_index] == -1 {
                labels.data[seed_index] = background_label;
            } else {
                trees[tree_id].min_dist_user_seed = 0.0;
            }
            if markers.is_empty() {
                trees[tree_id].min_dist_user_seed = 1.0;
            }
            queue.insert(seed_index, &cost_map)?;
        }

        while let Some(node_index) = queue.pop(&cost_map) {
            let node_coords = graph.node_coords(node_index);
            let tree_id = label_img[node_index] as usize;
            let node_label2 = labels.data[node_index];

            // Track how close this region has come to the object marker.
            if let Some(marker) = first_marker {
                let min_dist = trees[tree_id].min_dist_user_seed;
                if min_dist > 0.0 {
                    for &marker_coords in &marker.coords {
                        let dist = eucl_distance_coords(node_coords, marker_coords);
                        if dist < trees[tree_id].min_dist_user_seed {
                            trees[tree_id].min_dist_user_seed = dist;
                        }
                    }
                }
            }

            trees[tree_id].insert(graph, node_index, grad[node_index]);
            let mean_feat_tree = trees[tree_id].mean_feats();
            let cv_tree = trees[tree_id].grad_variation();
            let tree_size = trees[tree_id].num_nodes;

            for i in 0..adj_rel.len() {
                let adj_coords = adj_rel.neighbor(node_coords, i);
                if !adj_coords.is_valid(num_rows, num_cols) {
                    continue;
                }
                let adj_index = graph.node_index(adj_coords);
                let adj_tree = label_img[adj_index];

                if !queue.is_finalized(adj_index) {
                    let cost = path_cost(
                        &mean_feat_tree,
                        &graph.feat(adj_index),
                        cost_map[node_index],
                        tree_size,
                        grad[adj_index],
                        cv_tree,
                        alpha,
                        c2,
                        config.path_cost,
                    );
                    if cost < cost_map[adj_index] {
                        cost_map[adj_index] = cost;
                        label_img[adj_index] = tree_id as i32;
                        labels.data[adj_index] = node_label2;
                        if queue.state(adj_index) == ElemState::Queued {
                            queue.move_up(adj_index, &cost_map);
                        } else {
                            queue.insert(adj_index, &cost_map)?;
                        }
                    }
                } else {
                    if tree_id as i32 != adj_tree {
                        record_tree_adjacency(
                            &mut tree_adj,
                            &mut are_trees_adj,
                            num_trees,
                            tree_id,
                            adj_tree as usize,
                        );
                    }
                    let crossing = if config.all_borders {
                        tree_id as i32 != adj_tree
                    } else {
                        node_label2 != labels.data[adj_index]
                    };
                    if crossing {
                        borders.data[node_index] = 255;
                        borders.data[adj_index] = 255;
                    }
                }
            }
        }

        // Exponential decay of the seed budget, floored at the target count.
        let decayed = ((n_0 + sampling.scribbled) as f64 * (-(iter as f64)).exp()).round();
        let num_maintain = (decayed as usize).max(n_f);
        debug!("pass {iter}: keeping {num_maintain} of {num_trees} regions");

        seed_set = select_k_most_relevant_seeds(
            &trees,
            &tree_adj,
            num_nodes,
            num_maintain,
            !markers.is_empty(),
        );

        iter += 1;
        queue.reset();
        if num_trees <= num_maintain {
            break;
        }
    }

    let num_regions = count_regions(&labels);
    Ok(Segmentation {
        labels,
        borders,
        num_regions,
    })
}

/// Interactive segmentation with class-based seed removal.
///
/// Each scribble defines a class (foreground for the first `obj_markers`
/// of them, background after) and the grid seeds share one extra class.
/// After each pass, grid regions that neither contrast with their own
/// class nor shield the foreground lose their seeds; the loop ends when
/// the iteration budget runs out or the removal reports nothing left to
/// compete.
pub fn run_class_mode(
    graph: &FeatureGraph,
    config: &Config,
    markers: &[Marker],
) -> Result<Segmentation> {
    if config.iterations < 1 {
        return Err(Error::InvalidIterations);
    }
    if markers.is_empty() {
        return Err(Error::NoMarkers);
    }

    let num_rows = graph.num_rows;
    let num_cols = graph.num_cols;
    let num_nodes = graph.num_nodes;
    let adj_rel = AdjRel::four();
    validate_markers(markers, num_rows, num_cols)?;

    let (grad, image_cv) = compute_gradient(graph);
    let (c1, c2) = config.cost_params();
    let alpha = c1.max(image_cv);

    let sampling = grid_sampling_scribbles(
        num_rows,
        num_cols,
        config.num_grid_seeds,
        markers,
        &grad,
        config.relocate_seeds,
    )?;
    let mut seed_set = sampling.seeds;
    let mut labels_map = sampling.labels_map;

    let mut cost_map = vec![0.0f64; num_nodes];
    let mut label_img = vec![-1i32; num_nodes];
    let mut labels = Array2D::from_fill(0i32, num_cols, num_rows);
    let mut borders = Array2D::from_fill(0u8, num_cols, num_rows);
    let mut queue = PrioQueue::new(num_nodes, RemovalPolicy::MinVal);
    let mut trees: Vec<RegionTree> = Vec::new();

    let mut stop = Stop::Continue;
    let mut iter = 1usize;

    loop {
        let num_trees = seed_set.len();
        debug!("pass {iter}: growing {num_trees} regions");
        let mut tree_adj: Vec<IntList> = (0..num_trees).map(|_| IntList::new()).collect();
        let mut are_trees_adj = vec![false; num_trees * num_trees];

        // The class image deliberately survives between passes; only the
        // per-pass growth state is cleared.
        cost_map
            .par_iter_mut()
            .zip(label_img.par_iter_mut())
            .zip(borders.data.as_mut_slice().par_iter_mut())
            .for_each(|((cost, tree_label), border)| {
                *cost = f64::INFINITY;
                *tree_label = -1;
                *border = 0;
            });

        rebuild_trees(&mut trees, &seed_set);
        for (tree_id, seed_index) in seed_set.iter().enumerate() {
            cost_map[seed_index] = 0.0;
            label_img[seed_index] = tree_id as i32;
            queue.insert(seed_index, &cost_map)?;
        }

        while let Some(node_index) = queue.pop(&cost_map) {
            let node_coords = graph.node_coords(node_index);
            let tree_id = label_img[node_index] as usize;
            let node_label2 = labels_map[tree_id];
            labels.data[node_index] = node_label2;

            trees[tree_id].insert(graph, node_index, grad[node_index]);
            let mean_feat_tree = trees[tree_id].mean_feats();
            let cv_tree = trees[tree_id].grad_variation();
            let tree_size = trees[tree_id].num_nodes;

            for i in 0..adj_rel.len() {
                let adj_coords = adj_rel.neighbor(node_coords, i);
                if !adj_coords.is_valid(num_rows, num_cols) {
                    continue;
                }
                let adj_index = graph.node_index(adj_coords);
                let adj_tree = label_img[adj_index];

                if !queue.is_finalized(adj_index) {
                    let cost = path_cost(
                        &mean_feat_tree,
                        &graph.feat(adj_index),
                        cost_map[node_index],
                        tree_size,
                        grad[adj_index],
                        cv_tree,
                        alpha,
                        c2,
                        config.path_cost,
                    );
                    if cost < cost_map[adj_index] {
                        cost_map[adj_index] = cost;
                        label_img[adj_index] = tree_id as i32;
                        if queue.state(adj_index) == ElemState::Queued {
                            queue.move_up(adj_index, &cost_map);
                        } else {
                            queue.insert(adj_index, &cost_map)?;
                        }
                    }
                } else {
                    if tree_id as i32 != adj_tree {
                        record_tree_adjacency(
                            &mut tree_adj,
                            &mut are_trees_adj,
                            num_trees,
                            tree_id,
                            adj_tree as usize,
                        );
                    }
                    let adj_label2 = labels_map[adj_tree as usize];
                    let crossing = if config.all_borders {
                        tree_id as i32 != adj_tree
                    } else {
                        node_label2 != adj_label2
                    };
                    if crossing {
                        borders.data[node_index] = 255;
                        borders.data[adj_index] = 255;
                    }
                }
            }
        }

        // A pass that started with no grid seeds left is the final one.
        if stop == Stop::LastPass {
            stop = Stop::Halt;
        }
        if iter < config.iterations && stop == Stop::Continue {
            let outcome = seed_removal(
                &trees,
                &tree_adj,
                num_nodes,
                markers.len(),
                config.obj_markers,
                &labels_map,
            );
            debug!(
                "pass {iter}: removal kept {} of {num_trees} regions",
                outcome.seeds.len()
            );
            seed_set = outcome.seeds;
            labels_map = outcome.kept_labels;
            stop = outcome.stop;
        }

        iter += 1;
        queue.reset();
        if iter > config.iterations || stop == Stop::Halt {
            break;
        }
    }

    let num_regions = count_regions(&labels);
    Ok(Segmentation {
        labels,
        borders,
        num_regions,
    })
}
