use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use safelens::{find_circles, CircleSearchConfig, ModerationConfig, Moderator};

const W: u32 = 640;
const H: u32 = 480;

/// Bright disks on a dark background with additive noise.
fn pill_scene(seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<(f32, f32, f32)> = (0..24)
        .map(|_| {
            (
                rng.gen_range(40.0..(W as f32 - 40.0)),
                rng.gen_range(40.0..(H as f32 - 40.0)),
                rng.gen_range(8.0..20.0),
            )
        })
        .collect();
    GrayImage::from_fn(W, H, |x, y| {
        let (xf, yf) = (x as f32, y as f32);
        let inside = centers
            .iter()
            .any(|&(cx, cy, r)| (xf - cx).powi(2) + (yf - cy).powi(2) <= r * r);
        let base = if inside { 190.0 } else { 60.0 };
        let noise: f32 = rng.gen_range(-12.0..12.0);
        Luma([(base + noise).clamp(0.0, 255.0) as u8])
    })
}

fn to_png(gray: &GrayImage) -> Vec<u8> {
    let rgb = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v.saturating_sub(20)])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    rgb.write_to(&mut out, image::ImageFormat::Png)
        .expect("png encode");
    out.into_inner()
}

fn bench_find_circles(c: &mut Criterion) {
    let gray = pill_scene(7);
    let cfg = CircleSearchConfig::default();
    c.bench_function("find_circles_640x480", |b| {
        b.iter(|| find_circles(black_box(&gray), black_box(&cfg)))
    });
}

fn bench_moderate(c: &mut Criterion) {
    let bytes = to_png(&pill_scene(11));
    let moderator = Moderator::new(ModerationConfig::default());
    c.bench_function("moderate_640x480", |b| {
        b.iter(|| moderator.moderate(black_box(&bytes), "bench.png"))
    });
}

criterion_group!(benches, bench_find_circles, bench_moderate);
criterion_main!(benches);
