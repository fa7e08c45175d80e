use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;

use clap::Parser;

use facestream_core::collector::collect_records_use_case::CollectRecordsUseCase;
use facestream_core::collector::infrastructure::csv_session_sink::CsvSinkFactory;
use facestream_core::shared::config::CollectorConfig;
use facestream_core::transport::infrastructure::udp_transport::{wake_receiver, UdpReceiver};

/// Receives face telemetry records and logs one CSV per session.
#[derive(Parser)]
#[command(name = "facestream-collector")]
struct Cli {
    /// JSON settings file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on (host:port).
    #[arg(long)]
    bind: Option<String>,

    /// Directory that receives one sub-directory per session.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log throughput every N records.
    #[arg(long)]
    report_every: Option<usize>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    let receiver = UdpReceiver::bind(&cfg.bind_addr)?;
    let bound = receiver.local_addr()?;
    let factory = CsvSinkFactory::new(&cfg.output_dir, cfg.log_file_name.clone());
    let mut use_case = CollectRecordsUseCase::new(Box::new(receiver), Box::new(factory), &cfg)?;

    let cancel = use_case.cancel_flag();
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::Relaxed);
        if let Err(e) = wake_receiver(bound) {
            log::warn!("Could not wake receiver: {e}");
        }
    })?;

    log::info!(
        "Collector listening on {bound}, writing to {}",
        cfg.output_dir.display()
    );
    use_case.run()?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<CollectorConfig, Box<dyn std::error::Error>> {
    let mut cfg = match &cli.config {
        Some(path) => CollectorConfig::load(path)?,
        None => CollectorConfig::default(),
    };

    if let Some(addr) = &cli.bind {
        cfg.bind_addr = addr.clone();
    }
    if let Some(dir) = &cli.output_dir {
        cfg.output_dir = dir.clone();
    }
    if let Some(n) = cli.report_every {
        cfg.report_every = n;
    }

    cfg.validate()?;
    Ok(cfg)
}
