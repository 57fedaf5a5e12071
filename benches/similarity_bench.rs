// Plot similarity benchmark
// Measures SSIM scoring latency for typical matplotlib figure sizes
// Target: a 640x480 comparison in well under the per-submission budget

use image::{DynamicImage, GrayImage, Luma};
use plotgrade::compare::{similarity, ssim};
use std::time::{Duration, Instant};

const ITERATIONS: usize = 50;
const WARMUP_ITERATIONS: usize = 5;

/// Latency percentiles
struct LatencyStats {
    p50: Duration,
    p95: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();

        let p50_idx = (len as f64 * 0.50) as usize;
        let p95_idx = ((len as f64 * 0.95) as usize).min(len - 1);

        let sum: Duration = samples.iter().sum();
        let mean = sum / len as u32;

        Self {
            p50: samples[p50_idx],
            p95: samples[p95_idx],
            min: samples[0],
            max: samples[len - 1],
            mean,
        }
    }

    fn print(&self, label: &str) {
        println!("\n{}", label);
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
    }
}

struct BenchmarkResult {
    scenario: String,
    stats: LatencyStats,
    budget: Duration,
}

impl BenchmarkResult {
    fn passed(&self) -> bool {
        self.stats.p95 < self.budget
    }

    fn print(&self) {
        println!("\n=== {} ===", self.scenario);
        self.stats.print("Latency");
        if self.passed() {
            println!("PASS");
        } else {
            println!("FAIL: p95={:?} (target <{:?})", self.stats.p95, self.budget);
        }
    }
}

fn synthetic_plot(width: u32, height: u32, phase: f64) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let v = 128.0 + 100.0 * ((x as f64 / 23.0) + phase).sin() * (y as f64 / 17.0).cos();
        Luma([v.round() as u8])
    })
}

fn measure<F: FnMut() -> f64>(scenario: &str, budget: Duration, mut f: F) -> BenchmarkResult {
    for _ in 0..WARMUP_ITERATIONS {
        std::hint::black_box(f());
    }

    let mut samples = Vec::with_capacity(ITERATIONS);
    for _ in 0..ITERATIONS {
        let start = Instant::now();
        std::hint::black_box(f());
        samples.push(start.elapsed());
    }

    BenchmarkResult {
        scenario: scenario.to_string(),
        stats: LatencyStats::from_samples(samples),
        budget,
    }
}

fn main() {
    println!("=== plotgrade Plot Similarity Benchmark ===");
    println!("Iterations: {} (after {} warmup)", ITERATIONS, WARMUP_ITERATIONS);

    let reference = synthetic_plot(640, 480, 0.0);
    let candidate = synthetic_plot(640, 480, 0.3);
    let hidpi = DynamicImage::ImageLuma8(synthetic_plot(1280, 960, 0.0));

    let results = vec![
        measure("SSIM 640x480", Duration::from_millis(200), || {
            ssim(&candidate, &reference)
        }),
        measure(
            "Resize 1280x960 + SSIM 640x480",
            Duration::from_millis(500),
            || similarity(&hidpi, &reference),
        ),
    ];

    for result in &results {
        result.print();
    }

    let passed_count = results.iter().filter(|r| r.passed()).count();
    println!("\n=== Summary ===");
    println!("{}/{} scenarios within budget", passed_count, results.len());
    if passed_count != results.len() {
        std::process::exit(1);
    }
}
