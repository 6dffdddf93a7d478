//! Benchmarks for resampling kernels and tiled graph execution

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rasterflow_algorithms::resampling::{Resampling, ResamplingMethod};
use rasterflow_algorithms::{standard_registry, RasterSource};
use rasterflow_core::Raster;
use rasterflow_engine::{EngineConfig, Graph, GraphContext, GraphNode, RegionRequest};

fn create_band(size: usize, base: f64) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    for row in 0..size {
        for col in 0..size {
            let v = base + ((row * 7 + col * 13) % 200) as f64;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampling/kernel");
    let band = create_band(256, 100.0);
    for method in ResamplingMethod::ALL {
        let kernel = method.kernel();
        group.bench_with_input(BenchmarkId::from_parameter(method), &method, |b, _| {
            b.iter(|| {
                let mut acc = 0.0;
                for step in 0..1000 {
                    let x = (step as f64 * 0.253) % 255.0;
                    let y = (step as f64 * 0.117) % 255.0;
                    acc += kernel.interpolate(black_box(&band), x, y, 256, 256);
                }
                acc
            })
        });
    }
    group.finish();
}

fn bench_tiled_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampling/graph");
    group.sample_size(10);
    let registry = standard_registry();
    for size in [256, 512, 1024] {
        let band = create_band(size, 100.0);
        let graph = Graph::new().with_node(
            GraphNode::new("R", "Resample")
                .with_param("targetWidth", size * 2)
                .with_param("targetHeight", size * 2)
                .with_param("method", "BILINEAR_INTERPOLATION")
                .with_source("source", "scene"),
        );
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let ctx = GraphContext::builder(&graph, &registry)
                    .input("scene", Arc::new(RasterSource::new(band.clone()).with_tile_size(128)))
                    .config(EngineConfig::default().with_tile_size(256))
                    .build()
                    .unwrap();
                ctx.execute(&RegionRequest::new()).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_kernels, bench_tiled_resample);
criterion_main!(benches);
