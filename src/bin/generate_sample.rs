use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;

fn lorentzian(x: f64, center: f64, hwhm: f64, amplitude: f64) -> f64 {
    amplitude * hwhm.powi(2) / ((x - center).powi(2) + hwhm.powi(2))
}

/// Carbon-like spectrum: D, G and 2D bands on a sloped background, with noise
/// and the occasional cosmic-ray spike.
fn generate_spectrum(
    ramanshift: &[f64],
    bands: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    ramanshift
        .iter()
        .map(|&x| {
            let background = 50.0 + 0.01 * x;
            let signal: f64 = bands
                .iter()
                .map(|&(center, hwhm, amp)| lorentzian(x, center, hwhm, amp))
                .sum();
            let spike = if rng.next_f64() < 0.002 {
                500.0 + 1500.0 * rng.next_f64()
            } else {
                0.0
            };
            background + signal + spike + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn write_text(path: &Path, ramanshift: &[f64], intensity: &[f64]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for (x, y) in ramanshift.iter().zip(intensity) {
        writeln!(out, "{x:.4}\t{y:.4}")?;
    }
    out.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, ramanshift: &[f64], intensity: &[f64]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("ramanshift", DataType::Float64, false),
        Field::new("intensity", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(ramanshift.to_vec())),
            Arc::new(Float64Array::from(intensity.to_vec())),
        ],
    )?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_spectra"));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut rng = SimpleRng::new(42);

    // Raman shift: 150 → 3748, step 2
    let ramanshift: Vec<f64> = (0..1800).map(|i| 150.0 + i as f64 * 2.0).collect();

    // (stem prefix, D/G intensity ratio)
    let samples = [("A1", 0.4), ("A2", 0.9), ("DW38", 1.3), ("B1", 0.7)];
    let positions = 1..=3;

    let mut written = 0;
    for (sample, d_over_g) in samples {
        for position in positions.clone() {
            let g = 800.0 * (0.9 + 0.2 * rng.next_f64());
            let bands = [
                (1350.0, 25.0, g * d_over_g),
                (1590.0, 20.0, g),
                (2700.0, 35.0, 0.6 * g),
            ];
            let intensity = generate_spectrum(&ramanshift, &bands, 4.0, &mut rng);

            // One sample is stored as parquet; index it with suffix ".parquet".
            let path = if sample == "B1" {
                let path = output_dir.join(format!("{sample}_{position}.parquet"));
                write_parquet(&path, &ramanshift, &intensity)?;
                path
            } else {
                let path = output_dir.join(format!("{sample}_{position}.txt"));
                write_text(&path, &ramanshift, &intensity)?;
                path
            };
            info!("wrote {}", path.display());
            written += 1;
        }
    }

    let reference = generate_spectrum(&ramanshift, &[(520.0, 4.0, 3000.0)], 4.0, &mut rng);
    write_text(&output_dir.join("Si-ref.txt"), &ramanshift, &reference)?;
    written += 1;

    println!(
        "Wrote {written} spectra ({} points each) to {}",
        ramanshift.len(),
        output_dir.display()
    );
    Ok(())
}
