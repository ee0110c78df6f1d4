use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facecascade_core::annotation::infrastructure::box_annotator::BoxAnnotator;
use facecascade_core::detection::domain::cascade_config::CascadeConfig;
use facecascade_core::detection::domain::detection::Detection;
use facecascade_core::detection::infrastructure::execution_provider::execution_provider_label;
use facecascade_core::detection::infrastructure::model_resolver::{self, ModelPaths};
use facecascade_core::detection::infrastructure::onnx_scoring_model::load_cascade_models;
use facecascade_core::pipeline::crop_schedule::CropSchedule;
use facecascade_core::pipeline::detect_faces_use_case::{
    AnnotatedOutput, DetectFacesUseCase, DriverReport, DriverSettings,
};
use facecascade_core::pipeline::infrastructure::threaded_batch_executor::{
    BatchItem, SendError, ThreadedBatchExecutor,
};
use facecascade_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facecascade_core::shared::constants::{DEFAULT_CROP_INTERVAL_SECS, IMAGE_EXTENSIONS};
use facecascade_core::video::domain::video_reader::VideoReader;
use facecascade_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facecascade_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use facecascade_core::video::infrastructure::image_file_reader::ImageFileReader;
use facecascade_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Cascade face detection for images, videos and image directories.
#[derive(Parser)]
#[command(name = "facecascade")]
struct Cli {
    /// Input image, video, or directory of images.
    input: PathBuf,

    /// Annotated output: an image, a video, or a directory for batch input.
    output: Option<PathBuf>,

    /// Directory holding PNet.onnx, RNet.onnx and ONet.onnx.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// JSON file with detector settings; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Smallest face to look for, in pixels.
    #[arg(long)]
    min_face_size: Option<f64>,

    /// Pyramid shrink factor between levels (0.0-1.0, exclusive).
    #[arg(long)]
    scale_factor: Option<f64>,

    /// Stage score thresholds as proposal,refine,finalize.
    #[arg(long, value_delimiter = ',')]
    thresholds: Option<Vec<f64>>,

    /// Run detection every Nth frame (1 = every frame, 90 ≈ every 3 s at 30 fps).
    #[arg(long, default_value = "1")]
    frame_skip: usize,

    /// Save annotated detection frames to this directory.
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Save face crops to this directory.
    #[arg(long)]
    crops_dir: Option<PathBuf>,

    /// Seconds between crop saves for video input.
    #[arg(long, default_value_t = DEFAULT_CROP_INTERVAL_SECS)]
    crop_interval: u64,

    /// Worker threads for directory input (default: available cores).
    #[arg(long)]
    workers: Option<usize>,

    /// Treat model classification outputs as probabilities, not logits.
    #[arg(long)]
    no_softmax: bool,

    /// Print detections as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    log::info!("Resolving cascade models");
    let model_paths = model_resolver::resolve_models(cli.model_dir.as_deref())?;
    log::info!(
        "Using models from {} ({})",
        model_paths
            .proposal
            .parent()
            .unwrap_or(Path::new("."))
            .display(),
        execution_provider_label()
    );

    if cli.input.is_dir() {
        run_batch(&cli, config, &model_paths)
    } else if is_image(&cli.input) {
        run_single(&cli, config, &model_paths, true)
    } else {
        run_single(&cli, config, &model_paths, false)
    }
}

fn run_single(
    cli: &Cli,
    config: CascadeConfig,
    model_paths: &ModelPaths,
    image_input: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut models = load_cascade_models(model_paths, !cli.no_softmax)?;
    let detector = models.detector(config)?;

    let reader: Box<dyn VideoReader> = if image_input {
        Box::new(ImageFileReader::new())
    } else {
        Box::new(FfmpegReader::new())
    };
    let settings = DriverSettings {
        frame_skip: cli.frame_skip,
        frames_dir: cli.frames_dir.clone(),
        crops_dir: cli.crops_dir.clone(),
        crop_schedule: if image_input {
            CropSchedule::EveryDetection
        } else {
            CropSchedule::Interval {
                seconds: cli.crop_interval,
            }
        },
    };

    let mut use_case = DetectFacesUseCase::new(
        reader,
        Box::new(detector),
        Box::new(BoxAnnotator::default()),
        Box::new(ImageFileWriter::new()),
        Box::new(StdoutPipelineLogger::default()),
        settings,
    );
    if let Some(output) = &cli.output {
        let output = if image_input {
            AnnotatedOutput::Image {
                path: output.clone(),
            }
        } else {
            AnnotatedOutput::Video {
                writer: Box::new(FfmpegWriter::new()),
                path: output.clone(),
            }
        };
        use_case = use_case.with_output(output);
    }

    let report = use_case.execute(&cli.input)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    if let Some(output) = &cli.output {
        log::info!("Output written to {}", output.display());
    }
    Ok(())
}

fn run_batch(
    cli: &Cli,
    config: CascadeConfig,
    model_paths: &ModelPaths,
) -> Result<(), Box<dyn std::error::Error>> {
    let images = list_images(&cli.input)?;
    if images.is_empty() {
        return Err(format!("No images found in {}", cli.input.display()).into());
    }

    let workers = cli.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    let mut executor = ThreadedBatchExecutor::new(workers, config);
    if let Some(output) = &cli.output {
        executor = executor.with_output_dir(output.clone());
    }

    let apply_softmax = !cli.no_softmax;
    let loader = || {
        load_cascade_models(model_paths, apply_softmax)
            .map_err(|e| -> SendError { e.to_string().into() })
    };
    let items = executor
        .run(&images, &loader)
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&batch_json(&items)?)?);
    } else {
        for item in &items {
            match &item.result {
                Ok(detections) => {
                    println!("{}: {} faces", item.path.display(), detections.len());
                    print_faces(detections);
                }
                Err(e) => println!("{}: error: {e}", item.path.display()),
            }
        }
    }

    let failed = items.iter().filter(|i| i.result.is_err()).count();
    if failed > 0 {
        log::warn!("{failed} of {} images failed", items.len());
    }
    Ok(())
}

fn print_report(report: &DriverReport) {
    for frame in &report.detections {
        if frame.detections.is_empty() {
            continue;
        }
        println!("frame {:04}: {} faces", frame.frame_index, frame.detections.len());
        print_faces(&frame.detections);
    }
    println!(
        "{} frames read, {} detected, {} faces, {} crops saved",
        report.frames_read, report.frames_detected, report.faces_found, report.crops_saved
    );
}

fn print_faces(detections: &[Detection]) {
    for (i, d) in detections.iter().enumerate() {
        let b = &d.bbox;
        println!(
            "  face {i:02}: [{:.1}, {:.1}, {:.1}, {:.1}] score {:.3}",
            b.x1, b.y1, b.x2, b.y2, b.score
        );
    }
}

fn batch_json(items: &[BatchItem]) -> Result<serde_json::Value, serde_json::Error> {
    let entries = items
        .iter()
        .map(|item| {
            Ok(match &item.result {
                Ok(detections) => serde_json::json!({
                    "path": item.path,
                    "detections": serde_json::to_value(detections)?,
                }),
                Err(e) => serde_json::json!({
                    "path": item.path,
                    "error": e.to_string(),
                }),
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    Ok(serde_json::Value::Array(entries))
}

/// Loads `--config` (if any) and applies flag overrides on top.
fn build_config(cli: &Cli) -> Result<CascadeConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("Invalid config {}: {e}", path.display()))?
        }
        None => CascadeConfig::default(),
    };

    if let Some(size) = cli.min_face_size {
        config.min_face_size = size;
    }
    if let Some(factor) = cli.scale_factor {
        config.scale_factor = factor;
    }
    if let Some(thresholds) = &cli.thresholds {
        let [p, r, o] = thresholds.as_slice() else {
            return Err(format!(
                "--thresholds takes exactly 3 values (proposal,refine,finalize), got {}",
                thresholds.len()
            )
            .into());
        };
        config.proposal_threshold = *p;
        config.refine_threshold = *r;
        config.finalize_threshold = *o;
    }

    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if cli.frame_skip == 0 {
        return Err("Frame skip must be at least 1".into());
    }
    if cli.crop_interval == 0 {
        return Err("Crop interval must be at least 1 second".into());
    }
    if cli.workers == Some(0) {
        return Err("Workers must be at least 1".into());
    }
    if cli.input.is_dir() {
        if let Some(output) = &cli.output {
            if output.is_file() {
                return Err(format!(
                    "Output for directory input must be a directory: {}",
                    output.display()
                )
                .into());
            }
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by path.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
