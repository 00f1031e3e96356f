//! Interactive superpixel segmentation by iterative spanning forests.
//!
//! This crate segments a raster image from a handful of user scribbles. Seeds
//! placed on the scribbles and on a regular grid compete to grow an optimum
//! spanning forest over the pixel graph in CIELAB space; between growth
//! passes the least useful seeds are removed, so the partition converges to a
//! small set of regions that respect the scribbled object.
//!
//! Two removal modes are available: `run_relevance_mode` ranks whole regions
//! by area, marker distance and neighbor contrast, while `run_class_mode`
//! assigns every scribble its own class and culls grid regions against
//! per-class contrast thresholds.
//!
//! The following example segments a packed RGB24 image (default for the
//! image crate) around a single click:
//!
//! ```rust
//! use idisf_rust::common::Config;
//! use idisf_rust::graph::FeatureGraph;
//! use idisf_rust::markers::Marker;
//! use idisf_rust::segment::run_relevance_mode;
//!
//! fn main() {
//!     // Synthetic 16x16 image, dark with a bright square.
//!     let mut rgb = vec![30u8; 16 * 16 * 3];
//!     for y in 2..7 {
//!         for x in 2..7 {
//!             let px = (y * 16 + x) * 3;
//!             rgb[px..px + 3].copy_from_slice(&[220, 220, 220]);
//!         }
//!     }
//!     let graph = FeatureGraph::from_srgb8(&rgb, 16, 16).unwrap();
//!     // One click inside the bright square.
//!     let markers = [Marker::from_point(4, 4)];
//!     let config = Config {
//!         num_grid_seeds: 16,
//!         num_superpixels: 2,
//!         ..Config::default()
//!     };
//!     let seg = run_relevance_mode(&graph, &config, &markers).unwrap();
//!     // The click keeps the first marker label.
//!     assert_eq!(seg.labels[(4, 4)], 1);
//! }
//! ```
//!
//! This crate also ships benchmarks and tests. Release builds are strongly
//! recommended; hot loops elide boundary checks through the `assume!` macro
//! and the gradient sweep is compiled per SIMD target.

pub mod arrays;
pub mod color;
pub mod common;
pub mod graph;
pub mod intlist;
pub mod lifecycle;
pub mod markers;
pub mod queue;
pub mod seeds;
pub mod segment;
pub mod tree;
