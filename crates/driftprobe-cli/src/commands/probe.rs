use driftprobe_core::{machine_id, probe_system};

pub fn run(json: bool) {
    let system = probe_system();
    let id = machine_id(&system);

    if json {
        let doc = serde_json::json!({
            "machine_id": id,
            "system": system,
        });
        println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
        return;
    }

    fn show(value: &str) -> &str {
        if value.is_empty() { "(undetermined)" } else { value }
    }

    println!("🔎 driftprobe machine identity");
    println!("{:=<60}", "");
    println!("  arch:    {}", system.arch);
    println!("  os:      {} {}", system.os, show(&system.os_version));
    println!("  cpu:     {}", show(&system.cpu_model));
    println!("  gpu:     {}", show(&system.gpu_model));
    if system.gpu_adapters.len() > 1 {
        for adapter in &system.gpu_adapters[1..] {
            println!("           + {}", adapter.name);
        }
    }
    println!("  device:  {}", show(&system.device_model));
    if system.ram_bytes > 0 {
        println!(
            "  ram:     {:.1} GiB",
            system.ram_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
        );
    } else {
        println!("  ram:     (undetermined)");
    }
    println!("{:=<60}", "");
    println!("  machine id: {id}");
}
