use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use obraz_image::{Image, ImageSize};
use obraz_imgproc::{
    canny::{canny, CannyConfig},
    color::GrayscaleWeights,
    edges::{
        gradient_filter, laplacian_of_gaussian, laplacian_of_gaussian_thresholded,
        LogThresholdConfig,
    },
    filter::kernels::GradientOperator,
};

fn create_test_image(width: usize, height: usize) -> Image<u8, 3> {
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<u8> = (0..(width * height * 3)).map(|_| rng.random()).collect();
    Image::new(ImageSize { width, height }, data).unwrap()
}

fn bench_edges(c: &mut Criterion) {
    let mut group = c.benchmark_group("Edges");

    for (width, height) in [(256, 224), (512, 448)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);
        let src = create_test_image(*width, *height);

        group.bench_with_input(
            BenchmarkId::new("sobel", &parameter_string),
            &src,
            |b, src| {
                let mut dst = Image::from_size_val(src.size(), 0).unwrap();
                b.iter(|| black_box(gradient_filter(src, &mut dst, GradientOperator::Sobel)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("laplacian_of_gaussian", &parameter_string),
            &src,
            |b, src| {
                let mut dst = Image::from_size_val(src.size(), 0).unwrap();
                b.iter(|| {
                    black_box(laplacian_of_gaussian(
                        src,
                        &mut dst,
                        1.4,
                        GrayscaleWeights::EDITOR,
                    ))
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("laplacian_of_gaussian_thresholded", &parameter_string),
            &src,
            |b, src| {
                let config = LogThresholdConfig::default();
                let mut dst = Image::from_size_val(src.size(), 0).unwrap();
                b.iter(|| black_box(laplacian_of_gaussian_thresholded(src, &mut dst, &config)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("canny", &parameter_string),
            &src,
            |b, src| {
                let config = CannyConfig::default();
                let mut dst = Image::from_size_val(src.size(), 0).unwrap();
                b.iter(|| black_box(canny(src, &mut dst, &config)))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_edges);
criterion_main!(benches);
