use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::Ordering;

use clap::Parser;

use facestream_core::detection::domain::face_detector::FaceDetector;
use facestream_core::detection::infrastructure::model_resolver;
use facestream_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facestream_core::motion::infrastructure::ransac_affine::MotionModel;
use facestream_core::pipeline::pipeline_logger::SummaryPipelineLogger;
use facestream_core::pipeline::stream_video_use_case::{session_id_for, StreamVideoUseCase};
use facestream_core::pipeline::telemetry_pipeline::TelemetryPipeline;
use facestream_core::shared::config::ProducerConfig;
use facestream_core::shared::constants::VIDEO_EXTENSIONS;
use facestream_core::transport::infrastructure::size_limited_sender::SizeLimitedSender;
use facestream_core::transport::infrastructure::udp_transport::UdpSender;
use facestream_core::video::infrastructure::ffmpeg_reader::FfmpegReader;

/// Streams per-frame face telemetry for a video to a collector over UDP.
#[derive(Parser)]
#[command(name = "facestream-producer")]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// JSON settings file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Collector address (host:port).
    #[arg(long)]
    collector: Option<String>,

    /// Run the face detector every Nth frame.
    #[arg(long)]
    detect_interval: Option<usize>,

    /// Integer downscale factor applied before all processing.
    #[arg(long)]
    downscale: Option<u32>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// JPEG quality of the frame payload (1-100).
    #[arg(long)]
    jpeg_quality: Option<u8>,

    /// Records of this many bytes or more are dropped before sending.
    #[arg(long)]
    max_datagram_bytes: Option<usize>,

    /// Motion model: affine or similarity.
    #[arg(long, value_parser = ["affine", "similarity"])]
    motion_model: Option<String>,

    /// Face model file (defaults to the cached download).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Process frames as fast as possible instead of at the video frame rate.
    #[arg(long)]
    no_pace: bool,

    /// Log progress every N frames.
    #[arg(long, default_value = "100")]
    progress_every: usize,
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
    validate(&cli)?;
    let cfg = load_config(&cli)?;

    let session = session_id_for(&cli.input);
    let detector = build_detector(&cfg)?;
    let pipeline = TelemetryPipeline::from_config(&cfg, &session, detector)?;

    let udp = UdpSender::connect(&cfg.collector_addr)?;
    log::info!("Sending to {}", udp.target());
    let sender = SizeLimitedSender::new(Box::new(udp), cfg.max_datagram_bytes)?;

    let mut use_case = StreamVideoUseCase::new(
        Box::new(FfmpegReader::new()),
        pipeline,
        Box::new(sender),
        Box::new(SummaryPipelineLogger::new(cli.progress_every)),
        cfg.pace,
        cfg.fallback_fps,
    );

    let cancel = use_case.cancel_flag();
    ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed))?;

    let summary = use_case.run(&cli.input)?;
    if summary.dropped > 0 {
        log::warn!("{} of {} records were not sent", summary.dropped, summary.frames);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ProducerConfig, Box<dyn std::error::Error>> {
    let mut cfg = match &cli.config {
        Some(path) => ProducerConfig::load(path)?,
        None => ProducerConfig::default(),
    };

    if let Some(addr) = &cli.collector {
        cfg.collector_addr = addr.clone();
    }
    if let Some(n) = cli.detect_interval {
        cfg.detect_interval = n;
    }
    if let Some(f) = cli.downscale {
        cfg.downscale_factor = f;
    }
    if let Some(c) = cli.confidence {
        cfg.detector_confidence = c;
    }
    if let Some(q) = cli.jpeg_quality {
        cfg.jpeg_quality = q;
    }
    if let Some(n) = cli.max_datagram_bytes {
        cfg.max_datagram_bytes = n;
    }
    if let Some(model) = cli.motion_model.as_deref() {
        cfg.motion_model = parse_motion_model(model);
    }
    if let Some(path) = &cli.model {
        cfg.model_path = Some(path.clone());
    }
    if cli.no_pace {
        cfg.pace = false;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn build_detector(cfg: &ProducerConfig) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model_path = model_resolver::resolve_face_model(
        cfg.model_path.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    log::info!("Using face model {}", model_path.display());

    Ok(Box::new(OnnxYoloDetector::new(
        &model_path,
        cfg.detector_confidence,
    )?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !is_video(&cli.input) {
        log::warn!(
            "{} does not have a known video extension; trying anyway",
            cli.input.display()
        );
    }
    Ok(())
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_motion_model(model: &str) -> MotionModel {
    if model == "similarity" {
        MotionModel::Similarity
    } else {
        MotionModel::Affine
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}
