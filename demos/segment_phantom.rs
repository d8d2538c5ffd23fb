use tacluster::technique::{KMeans, MatrixType, Pca, Seeding};
use tacluster::{Cluster, NoiseRule, Registry, Technique, VoxelSet};

/// Bolus-like uptake: fast rise, slow washout.
fn arterial(t: f64) -> f64 {
    40.0 * t * (-t / 2.0).exp()
}

/// Slow accumulation.
fn tissue(t: f64) -> f64 {
    12.0 * (1.0 - (-t / 6.0).exp())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 16 x 16 x 2 phantom, 12 frames: a vessel column on the left, tissue on
    // the right, and a masked (all-zero) border row.
    let (width, height, slices, frames) = (16, 16, 2, 12);
    let volume = width * height * slices;
    let mut data = vec![0.0; volume * frames];
    for t in 0..frames {
        for z in 0..slices {
            for y in 1..height {
                for x in 0..width {
                    let jitter = ((x * 7 + y * 3 + z) % 5) as f64 * 0.05;
                    let value = if x < 5 { arterial(t as f64) } else { tissue(t as f64) };
                    data[t * volume + (z * height + y) * width + x] = value * (1.0 + jitter);
                }
            }
        }
    }
    let set = VoxelSet::from_volume(width, height, slices, frames, &data)?
        .with_noise_rule(NoiseRule::Amplitude);
    println!("active voxels={}", set.len());

    let mut km = KMeans::new(2)
        .with_seeding(Seeding::Farthest { first: None })
        .with_threshold(1.0);
    let seg = km.run(&set, true)?;
    println!(
        "kmeans: clusters={} iterations={} converged={}",
        seg.len(),
        seg.iterations(),
        seg.converged()
    );
    summarize(seg.clusters());

    let mut pca = Pca::new().with_matrix(MatrixType::Correlation).with_components(2);
    let seg = pca.run(&set, true)?;
    println!("pca: clusters={}", seg.len());
    summarize(seg.clusters());
    if let Some(aux) = seg.auxiliary() {
        println!("{}:\n{}", aux.name, aux.text);
    }

    let registry = Registry::with_builtins();
    println!(
        "available: metrics={:?} techniques={:?}",
        registry.metric_names().collect::<Vec<_>>(),
        registry.technique_names().collect::<Vec<_>>()
    );
    Ok(())
}

fn summarize(clusters: &[Cluster]) {
    for (i, c) in clusters.iter().enumerate() {
        let (cx, cy, cz) = c.spatial_centroid();
        println!(
            "  cluster {}: size={} peak={:.2} centre=({cx:.1}, {cy:.1}, {cz:.1})",
            i + 1,
            c.size(),
            c.peak_mean().unwrap_or(0.0)
        );
    }
}
