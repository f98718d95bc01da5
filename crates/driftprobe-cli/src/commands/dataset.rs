use std::path::Path;

use driftprobe_core::dataset::{build_sample_index, load_mnist};
use driftprobe_core::paths::mnist_dir;

pub fn run(dir: Option<&Path>, base: Option<&Path>) {
    let dir = match dir {
        Some(d) => d.to_path_buf(),
        None => mnist_dir(&super::resolve_data_dir(base)),
    };

    println!("🗂  inspecting MNIST shards in {}", dir.display());
    let (images, labels) = match load_mnist(&dir) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Dataset load failed: {e}");
            std::process::exit(1);
        }
    };

    let (rows, cols) = images
        .first()
        .map(|img| (img.len(), img.first().map(Vec::len).unwrap_or(0)))
        .unwrap_or((0, 0));
    println!("   {} samples, {}x{} pixels", images.len(), rows, cols);

    let index = build_sample_index(&labels);
    println!("   probe sample index ({}/10 digits):", index.len());
    for (digit, idx) in &index {
        println!("     digit {digit} -> sample #{idx}");
    }
    if index.len() < 10 {
        let missing: Vec<String> = (0..10u8)
            .filter(|d| !index.contains_key(d))
            .map(|d| d.to_string())
            .collect();
        println!("   missing digits: {}", missing.join(", "));
    }
}
