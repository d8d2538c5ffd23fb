use tacluster::{Coord, Technique, TechniqueConfig, Voxel, VoxelSet};

// Run configuration as a front end would load it. With RMSD the score is
// `1 - d`, so a threshold of -0.5 admits curves within 1.5 of a leader.
const CONFIG: &str = r#"{
    "type": "leader_follower",
    "metric": { "type": "rmsd" },
    "threshold": -0.5,
    "increment": 0.98,
    "max_clusters": 8,
    "keep_clusters": 3,
    "evict_weakest": true,
    "selection": "weighted_euclidean"
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Three families of curves at increasing amplitude.
    let shapes = [[1.0, 3.0, 2.0, 1.5, 1.0], [0.5, 1.0, 2.0, 3.0, 4.0], [4.0, 3.0, 2.0, 1.0, 0.5]];
    let voxels: Vec<Voxel> = (0..60)
        .map(|i| {
            let shape = &shapes[i % 3];
            let gain = 1.0 + (i / 3) as f64 * 0.05;
            Voxel::new(i % 8, i / 8, 1, shape.iter().map(|v| v * gain).collect())
        })
        .collect();
    let set = VoxelSet::new(voxels)?;

    let config: TechniqueConfig = serde_json::from_str(CONFIG)?;
    let mut technique = config.build()?;
    let seg = technique.run(&set, false)?;

    println!("formed={} kept={}", seg.formed(), seg.len());
    for (i, c) in seg.clusters().iter().enumerate() {
        println!(
            "  cluster {}: size={} peak={:.2}±{:.2}",
            i + 1,
            c.size(),
            c.peak_mean().unwrap_or(0.0),
            c.peak_stdev().unwrap_or(0.0)
        );
    }
    println!("label of (0, 0, 1): {:?}", seg.label_of(Coord::new(0, 0, 1)));
    println!("config: {}", serde_json::to_string(&config)?);
    Ok(())
}
