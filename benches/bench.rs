use criterion::*;
use idisf_rust::common::Config;
use idisf_rust::graph::{compute_gradient, FeatureGraph};
use idisf_rust::markers::Marker;
use idisf_rust::segment::{run_class_mode, run_relevance_mode};

// Synthetic test card: smooth ramps with a bright disc, enough structure to
// keep the gradient field and the removal rounds non-trivial.
fn synthetic_rgb(width: usize, height: usize) -> Vec<u8> {
    let mut rgb = vec![0u8; width * height * 3];
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = width.min(height) as f32 / 4.0;
    for y in 0..height {
        for x in 0..width {
            let px = (y * width + x) * 3;
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            if d < radius {
                rgb[px] = 230;
                rgb[px + 1] = 200;
                rgb[px + 2] = 60;
            } else {
                rgb[px] = (x * 255 / width) as u8;
                rgb[px + 1] = (y * 255 / height) as u8;
                rgb[px + 2] = 90;
            }
        }
    }
    rgb
}

fn bench_graph_from_rgb(c: &mut Criterion) {
    let (width, height) = (512, 512);
    let rgb = synthetic_rgb(width, height);
    c.bench_function("rgb_to_lab_graph", |b| {
        b.iter(|| {
            let _ = black_box(FeatureGraph::from_srgb8(rgb.as_slice(), height, width));
        });
    });
}

fn bench_gradient(c: &mut Criterion) {
    let (width, height) = (512, 512);
    let rgb = synthetic_rgb(width, height);
    let graph = FeatureGraph::from_srgb8(rgb.as_slice(), height, width).unwrap();
    c.bench_function("gradient", |b| {
        b.iter(|| {
            let _ = black_box(compute_gradient(&graph));
        });
    });
}

fn bench_segmentation(c: &mut Criterion) {
    let (width, height) = (256, 256);
    let rgb = synthetic_rgb(width, height);
    let graph = FeatureGraph::from_srgb8(rgb.as_slice(), height, width).unwrap();
    let markers = [Marker::from_point(width as i32 / 2, height as i32 / 2)];
    let config = Config {
        num_grid_seeds: 500,
        num_superpixels: 2,
        iterations: 3,
        ..Config::default()
    };

    let mut group = c.benchmark_group("segmentation");
    group.sample_size(20);
    group.bench_function("relevance_mode", |b| {
        b.iter(|| {
            let _ = black_box(run_relevance_mode(&graph, &config, &markers));
        });
    });
    group.bench_function("class_mode", |b| {
        b.iter(|| {
            let _ = black_box(run_class_mode(&graph, &config, &markers));
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_graph_from_rgb,
    bench_gradient,
    bench_segmentation
);
criterion_main!(benches);
