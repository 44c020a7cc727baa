/// Benchmarks for analyses and executors.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array3;
use raster_analysis_service::analysis::{Analysis, MeanValue};
use raster_analysis_service::error::RasterAnalysisError;
use raster_analysis_service::executor::{
    Executor, FailurePolicy, SequentialExecutor, ThreadPoolExecutor,
};
use raster_analysis_service::raster::{RasterImage, RasterLoader};
use std::path::{Path, PathBuf};

/// Hands out copies of one in-memory image instead of reading files.
struct InMemoryLoader {
    bands: Array3<f64>,
}

impl RasterLoader for InMemoryLoader {
    fn load(&self, path: &Path) -> Result<RasterImage, RasterAnalysisError> {
        Ok(RasterImage::new(path, self.bands.clone()))
    }
}

fn image(size: usize) -> Array3<f64> {
    Array3::from_shape_fn((3, size, size), |(b, r, c)| ((b + r + c) % 256) as f64)
}

fn criterion_benchmark(c: &mut Criterion) {
    for size in [64, 256, 1024] {
        let image = RasterImage::new("bench.tif", image(size));
        let name = format!("mean_value_add({}x{})", size, size);
        c.bench_function(&name, |b| {
            b.iter(|| {
                let mut analysis = MeanValue::default();
                analysis.add(black_box(&image));
                analysis.result()
            })
        });
    }

    let loader = InMemoryLoader { bands: image(256) };
    let dataset: Vec<PathBuf> = (0..64).map(|i| PathBuf::from(format!("{}.tif", i))).collect();
    let sequential = SequentialExecutor::new(FailurePolicy::Abort);
    c.bench_function("sequential_executor(64)", |b| {
        b.iter(|| {
            let mut analysis = MeanValue::default();
            sequential
                .execute(&mut analysis, dataset.clone(), &loader)
                .unwrap();
            analysis.result()
        })
    });
    for workers in [2, 4, 8] {
        let pool = ThreadPoolExecutor::new(workers, FailurePolicy::Abort).unwrap();
        let name = format!("thread_pool_executor(64, {})", workers);
        c.bench_function(&name, |b| {
            b.iter(|| {
                let mut analysis = MeanValue::default();
                pool.execute(&mut analysis, dataset.clone(), &loader)
                    .unwrap();
                analysis.result()
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
