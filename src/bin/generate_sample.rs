use std::f64::consts::PI;

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Per-country shape: (base level, weekly drift, seasonal amplitude).
struct Profile {
    country: &'static str,
    level: f64,
    drift: f64,
    season: f64,
}

const WEEKS: usize = 156;
const GAP_RATE: f64 = 0.02;
const SPIKE_RATE: f64 = 0.01;

/// Random walk with drift plus a yearly (52-week) cycle.
fn seasonal_walk(rng: &mut ChaCha8Rng, p: &Profile, noise: f64) -> Result<Vec<f64>> {
    let step = Normal::new(p.drift, noise)?;
    let mut level = p.level;
    Ok((0..WEEKS)
        .map(|w| {
            level += step.sample(&mut *rng);
            level + p.season * (2.0 * PI * w as f64 / 52.0).sin()
        })
        .collect())
}

/// Render a value, sometimes as a gap and sometimes as a spike.
fn corrupt(rng: &mut ChaCha8Rng, v: f64, scale: f64) -> String {
    let r: f64 = rng.gen();
    if r < GAP_RATE {
        "NA".to_string()
    } else if r < GAP_RATE + SPIKE_RATE {
        format!("{:.4}", v + 8.0 * scale)
    } else {
        format!("{v:.4}")
    }
}

fn main() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let profiles = [
        Profile { country: "LT", level: 100.0, drift: 0.15, season: 4.0 },
        Profile { country: "LV", level: 80.0, drift: 0.10, season: 3.0 },
        Profile { country: "EE", level: 120.0, drift: 0.20, season: 5.0 },
    ];

    let output_path = "sample_data.csv";
    let mut writer = csv::Writer::from_path(output_path).context("creating output file")?;
    writer.write_record(["country", "week", "gdp", "exports", "cpi", "unemployment", "rate"])?;

    let jitter = |sd: f64| Normal::new(0.0, sd);
    let (export_noise, unemployment_noise, rate_noise) = (jitter(0.3)?, jitter(0.2)?, jitter(0.05)?);

    for p in &profiles {
        let gdp = seasonal_walk(&mut rng, p, 0.5)?;
        let cpi = seasonal_walk(
            &mut rng,
            &Profile { country: p.country, level: 100.0, drift: 0.05, season: 0.3 },
            0.2,
        )?;
        for w in 0..WEEKS {
            // Exports track GDP closely so VIF pruning has something to drop.
            let exports = 0.6 * gdp[w] + export_noise.sample(&mut rng);
            let unemployment = 7.0 - 0.02 * w as f64 + unemployment_noise.sample(&mut rng);
            let rate = 2.0 + 0.5 * (w as f64 / 40.0).sin() + rate_noise.sample(&mut rng);
            writer.write_record([
                p.country.to_string(),
                (w + 1).to_string(),
                corrupt(&mut rng, gdp[w], 1.0),
                corrupt(&mut rng, exports, 0.6),
                corrupt(&mut rng, cpi[w], 0.4),
                corrupt(&mut rng, unemployment, 0.2),
                corrupt(&mut rng, rate, 0.05),
            ])?;
        }
    }
    writer.flush()?;

    println!(
        "Wrote {} weeks for {} countries to {output_path}",
        WEEKS,
        profiles.len()
    );
    Ok(())
}
