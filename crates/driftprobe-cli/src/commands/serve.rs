use std::path::Path;

use driftprobe_server::{ServerConfig, ServerHandle};

pub fn run(host: &str, port: u16, base: Option<&Path>) {
    let public_dir = super::resolve_data_dir(base);

    println!("🗄  driftprobe artifact host v{}", driftprobe_core::VERSION);
    println!("   public dir: {}", public_dir.display());
    println!();
    println!("   Endpoints:");
    println!("     GET  /healthz               Liveness check");
    println!("     GET  /whoami                Bind address + LAN URLs");
    println!("     GET  /models/manifest.json  Model catalog");
    println!("     GET  /models/<file>         Model weights");
    println!("     GET  /mnist/<file>          MNIST IDX shards");
    println!("     GET  /reports/              Collected reports (listing)");
    println!("     POST /upload                Telemetry report intake");
    println!();

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let handle = match ServerHandle::start(ServerConfig {
            host: host.to_string(),
            port,
            public_dir,
        })
        .await
        {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("Failed to start server: {e}");
                std::process::exit(1);
            }
        };

        let status = handle.status();
        println!("   listening on http://{}", status.addr);
        println!("   started at {}", status.started_at);
        println!("   Ctrl-C to stop");

        tokio::signal::ctrl_c().await.ok();
        println!("\nShutting down...");
        handle.stop().await;
    });
}
