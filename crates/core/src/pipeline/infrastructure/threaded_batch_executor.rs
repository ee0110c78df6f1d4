use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::infrastructure::box_annotator::BoxAnnotator;
use crate::detection::domain::cascade_config::CascadeConfig;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::scoring_model::CascadeModels;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;
use crate::video::infrastructure::image_file_reader::ImageFileReader;
use crate::video::infrastructure::image_file_writer::ImageFileWriter;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Builds one worker's private set of models.
pub type ModelLoader<'a> = dyn Fn() -> Result<CascadeModels, SendError> + Sync + 'a;

/// Outcome for one input image, in input order.
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: Result<Vec<Detection>, SendError>,
}

/// Runs the cascade over many independent images on a pool of scoped
/// threads.
///
/// Layout: `main [feed jobs] → N × worker [read → detect → annotate → write] → main [collect]`
///
/// Every worker owns its models, so nothing mutable is shared between
/// images. Results are slotted by input position, keeping input order no
/// matter which worker finishes first.
pub struct ThreadedBatchExecutor {
    workers: usize,
    channel_capacity: usize,
    config: CascadeConfig,
    output_dir: Option<PathBuf>,
}

impl ThreadedBatchExecutor {
    pub fn new(workers: usize, config: CascadeConfig) -> Self {
        Self {
            workers: workers.max(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            config,
            output_dir: None,
        }
    }

    /// Annotated copies are written under `dir` with the input's file name.
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    /// Process `paths`.
    ///
    /// A failure on one image lands in that image's [`BatchItem`]. A worker
    /// that cannot load its models aborts the whole batch.
    pub fn run(
        &self,
        paths: &[PathBuf],
        loader: &ModelLoader<'_>,
    ) -> Result<Vec<BatchItem>, SendError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        self.config.validate()?;

        let workers = self.workers.min(paths.len());
        let start = Instant::now();
        log::info!("Processing {} images on {workers} workers", paths.len());

        let (job_tx, job_rx) = crossbeam_channel::bounded::<(usize, &Path)>(self.channel_capacity);
        let (result_tx, result_rx) =
            crossbeam_channel::unbounded::<(usize, Result<Vec<Detection>, SendError>)>();

        let mut slots: Vec<Option<Result<Vec<Detection>, SendError>>> =
            paths.iter().map(|_| None).collect();

        let worker_outcomes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    let config = &self.config;
                    let output_dir = self.output_dir.as_deref();
                    scope.spawn(move || {
                        run_worker(id, loader, config, output_dir, job_rx, result_tx)
                    })
                })
                .collect();
            drop(job_rx);
            drop(result_tx);

            for (slot, path) in paths.iter().enumerate() {
                // All workers gone means they failed to load; join reports why.
                if job_tx.send((slot, path.as_path())).is_err() {
                    break;
                }
            }
            drop(job_tx);

            for (slot, result) in result_rx {
                slots[slot] = Some(result);
            }

            handles
                .into_iter()
                .map(|h| h.join())
                .collect::<Vec<_>>()
        });

        for outcome in worker_outcomes {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err("batch worker panicked".into()),
            }
        }

        let items: Vec<BatchItem> = paths
            .iter()
            .zip(slots)
            .map(|(path, slot)| BatchItem {
                path: path.clone(),
                result: slot.unwrap_or_else(|| Err("image was never processed".into())),
            })
            .collect();

        let failed = items.iter().filter(|item| item.result.is_err()).count();
        log::info!(
            "Batch finished in {:.1}s: {} images, {failed} failed",
            start.elapsed().as_secs_f64(),
            items.len()
        );
        Ok(items)
    }
}

fn run_worker(
    id: usize,
    loader: &ModelLoader<'_>,
    config: &CascadeConfig,
    output_dir: Option<&Path>,
    jobs: crossbeam_channel::Receiver<(usize, &Path)>,
    results: crossbeam_channel::Sender<(usize, Result<Vec<Detection>, SendError>)>,
) -> Result<(), SendError> {
    let mut models = loader().map_err(|e| -> SendError {
        format!("worker {id} failed to load models: {e}").into()
    })?;
    let mut detector = models.detector(config.clone())?;
    let annotator = BoxAnnotator::default();
    let writer = ImageFileWriter::new();
    log::debug!("Batch worker {id} ready");

    for (slot, path) in jobs {
        let result = process_image(&mut detector, &annotator, &writer, path, output_dir);
        if let Err(e) = &result {
            log::warn!("{}: {e}", path.display());
        }
        if results.send((slot, result)).is_err() {
            break;
        }
    }
    Ok(())
}

fn process_image(
    detector: &mut dyn FaceDetector,
    annotator: &dyn FrameAnnotator,
    writer: &dyn ImageWriter,
    path: &Path,
    output_dir: Option<&Path>,
) -> Result<Vec<Detection>, SendError> {
    let to_send = |e: Box<dyn std::error::Error>| -> SendError { e.to_string().into() };

    let mut reader = ImageFileReader::new();
    reader.open(path).map_err(to_send)?;
    let mut frame = reader
        .frames()
        .next()
        .ok_or("image has no frames")?
        .map_err(to_send)?;
    reader.close();

    let detections = detector.detect(&frame)?;
    log::debug!("{}: {} faces", path.display(), detections.len());

    if let Some(dir) = output_dir {
        let name = path.file_name().ok_or("input path has no file name")?;
        annotator.annotate(&mut frame, &detections).map_err(to_send)?;
        writer.write(&dir.join(name), &frame).map_err(to_send)?;
    }
    Ok(detections)
}
