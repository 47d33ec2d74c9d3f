use argh::FromArgs;

use obraz::image::Image;
use obraz::imgproc::{
    self,
    canny::{CannyConfig, CannyPipeline},
    color::GrayscaleWeights,
    edges::LogThresholdConfig,
    filter::kernels::GradientOperator,
    hough::HoughConfig,
    watershed::{Connectivity, Watershed},
};

#[derive(FromArgs)]
/// Run the obraz analysis operators over a synthetic scene
struct Args {
    /// width of the generated scene
    #[argh(option, default = "160")]
    width: usize,

    /// height of the generated scene
    #[argh(option, default = "120")]
    height: usize,

    /// canny upper threshold
    #[argh(option, default = "50.0")]
    upper: f64,

    /// canny lower threshold
    #[argh(option, default = "20.0")]
    lower: f64,

    /// hough angular bins per degree
    #[argh(option, default = "1")]
    theta_density: usize,

    /// minimum number of votes of a detected line
    #[argh(option, default = "60")]
    votes: u32,

    /// use 4-connectivity for the watershed
    #[argh(switch)]
    four: bool,
}

/// A bright background with two dark discs and a diagonal bar.
fn synthetic_scene(width: usize, height: usize) -> Image<u8, 3> {
    let discs = [
        (width as f64 * 0.3, height as f64 * 0.4, height as f64 * 0.18),
        (width as f64 * 0.7, height as f64 * 0.6, height as f64 * 0.22),
    ];

    Image::from_fn([width, height].into(), |x, y| {
        let (fx, fy) = (x as f64, y as f64);

        let in_disc = discs
            .iter()
            .any(|&(cx, cy, r)| (fx - cx).powi(2) + (fy - cy).powi(2) <= r * r);
        let on_bar = (fy - 0.5 * fx - 10.0).abs() < 1.5;

        let value = if on_bar {
            250
        } else if in_disc {
            40
        } else {
            150 + (x * 40 / width.max(1)) as u8
        };
        [value, value, value]
    })
}

fn count_nonzero<const C: usize>(image: &Image<u8, C>) -> usize {
    image
        .as_slice()
        .chunks_exact(C)
        .filter(|px| px.iter().any(|&v| v > 0))
        .count()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let scene = synthetic_scene(args.width, args.height);
    log::info!("scene: {}x{}", scene.cols(), scene.rows());

    let mut out = Image::<u8, 3>::from_size_val(scene.size(), 0)?;

    imgproc::filter::gaussian_blur(&scene, &mut out, 1.5, None)?;
    log::info!("gaussian blur: {} non black pixels", count_nonzero(&out));

    imgproc::enhance::stretch_histogram(&scene, &mut out, GrayscaleWeights::EDITOR)?;
    log::info!("stretched: {} non black pixels", count_nonzero(&out));

    imgproc::enhance::equalize_histogram(&scene, &mut out)?;
    log::info!("equalized: {} non black pixels", count_nonzero(&out));

    for operator in [
        GradientOperator::Roberts,
        GradientOperator::Prewitt,
        GradientOperator::Sobel,
    ] {
        imgproc::edges::gradient_filter(&scene, &mut out, operator)?;
        log::info!("{operator:?}: {} edge pixels", count_nonzero(&out));
    }

    imgproc::edges::laplacian(&scene, &mut out, 3)?;
    log::info!("laplacian: {} edge pixels", count_nonzero(&out));

    imgproc::edges::laplacian_of_gaussian(&scene, &mut out, 1.4, GrayscaleWeights::EDITOR)?;
    log::info!("laplacian of gaussian: {} non black pixels", count_nonzero(&out));

    let log_config = LogThresholdConfig::default().with_sigma(1.4);
    imgproc::edges::laplacian_of_gaussian_thresholded(&scene, &mut out, &log_config)?;
    log::info!("thresholded log: {} edge pixels", count_nonzero(&out));

    let canny_config = CannyConfig::default().with_thresholds(args.upper, args.lower);
    let mut pipeline = CannyPipeline::new(&scene, canny_config);
    while pipeline.stage() < imgproc::canny::CannyStage::Done {
        let stage = pipeline.step()?;
        log::info!("canny: reached {stage:?}");
    }
    let edges = pipeline.finish()?;
    log::info!("canny: {} edge pixels", count_nonzero(&edges));

    let mut gray = Image::<u8, 1>::from_size_val(scene.size(), 0)?;
    imgproc::color::gray_from_rgb(&scene, &mut gray, GrayscaleWeights::EDITOR)?;
    let mut binary = Image::<u8, 1>::from_size_val(scene.size(), 0)?;
    let threshold = imgproc::threshold::otsu_threshold(&gray, &mut binary, 255)?;
    log::info!("otsu: threshold {threshold}, {} foreground pixels", count_nonzero(&binary));

    let connectivity = if args.four {
        Connectivity::Four
    } else {
        Connectivity::Eight
    };
    let labels = Watershed::new(connectivity).segment(&gray)?;
    log::info!(
        "watershed: {} regions, {} boundary pixels",
        labels.num_regions(),
        labels.boundary_count()
    );

    let hough_config = HoughConfig::default().with_theta_density(args.theta_density);
    let accumulator = imgproc::hough::hough_transform(&scene, &hough_config)?;
    if let Some(line) = accumulator.max_cell() {
        log::info!(
            "hough: strongest line theta {:.1} deg, rho {}, {} votes",
            line.theta.to_degrees(),
            line.rho,
            line.votes
        );
    }

    let mut overlay = scene.clone();
    let lines = imgproc::hough::detect_lines(&mut overlay, &hough_config, args.votes, [255, 0, 0])?;

    println!(
        "{} canny edge pixels, {} watershed regions, {} hough lines",
        count_nonzero(&edges),
        labels.num_regions(),
        lines.len()
    );

    Ok(())
}
