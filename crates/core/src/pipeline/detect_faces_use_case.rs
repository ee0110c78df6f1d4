use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::crop_schedule::{CropSchedule, CropSlot, CropTracker};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// Knobs for one driver run.
#[derive(Clone, Debug, PartialEq)]
pub struct DriverSettings {
    /// Detect on every `frame_skip`-th frame, starting with frame 0.
    pub frame_skip: usize,
    /// Annotated detection frames go here as `frame_{index:04}.png`.
    pub frames_dir: Option<PathBuf>,
    /// Face crops go here, laid out by [`CropSlot::path`].
    pub crops_dir: Option<PathBuf>,
    pub crop_schedule: CropSchedule,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            frame_skip: 1,
            frames_dir: None,
            crops_dir: None,
            crop_schedule: CropSchedule::EveryDetection,
        }
    }
}

/// Where the annotated result of a run is written.
pub enum AnnotatedOutput {
    /// Every frame, annotated or not, is re-encoded.
    Video {
        writer: Box<dyn VideoWriter>,
        path: PathBuf,
    },
    /// Each annotated detection frame is saved to `path`. Meant for stills.
    Image { path: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameDetections {
    pub frame_index: usize,
    pub detections: Vec<Detection>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DriverReport {
    pub frames_read: usize,
    pub frames_detected: usize,
    pub faces_found: usize,
    pub crops_saved: usize,
    /// One entry per frame the detector ran on, in frame order.
    pub detections: Vec<FrameDetections>,
}

/// Drives a single video or still image through detection:
/// read → detect → crop → annotate → dump → encode.
///
/// The detector may borrow its models, hence the lifetime.
pub struct DetectFacesUseCase<'d> {
    reader: Box<dyn VideoReader>,
    detector: Box<dyn FaceDetector + 'd>,
    annotator: Box<dyn FrameAnnotator>,
    image_writer: Box<dyn ImageWriter>,
    logger: Box<dyn PipelineLogger>,
    output: Option<AnnotatedOutput>,
    settings: DriverSettings,
}

impl<'d> DetectFacesUseCase<'d> {
    pub fn new(
        reader: Box<dyn VideoReader>,
        detector: Box<dyn FaceDetector + 'd>,
        annotator: Box<dyn FrameAnnotator>,
        image_writer: Box<dyn ImageWriter>,
        logger: Box<dyn PipelineLogger>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            reader,
            detector,
            annotator,
            image_writer,
            logger,
            output: None,
            settings,
        }
    }

    pub fn with_output(mut self, output: AnnotatedOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn execute(&mut self, input_path: &Path) -> Result<DriverReport, Box<dyn std::error::Error>> {
        if self.settings.frame_skip == 0 {
            return Err("frame_skip must be at least 1".into());
        }

        let metadata = self.reader.open(input_path)?;
        self.logger.info(&format!(
            "Processing {} ({}x{}, {:.2} fps, {} frames)",
            input_path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames
        ));

        if let Some(AnnotatedOutput::Video { writer, path }) = self.output.as_mut() {
            if let Err(e) = writer.open(path, &metadata) {
                self.reader.close();
                return Err(e);
            }
        }

        let result = self.process_frames(&metadata);

        self.reader.close();
        let closed = match self.output.as_mut() {
            Some(AnnotatedOutput::Video { writer, .. }) => writer.close(),
            _ => Ok(()),
        };

        let report = result?;
        closed?;

        self.logger.info(&format!(
            "Finished {} frames: {} faces on {} detected frames, {} crops saved",
            report.frames_read, report.faces_found, report.frames_detected, report.crops_saved
        ));
        self.logger.summary();
        Ok(report)
    }

    fn process_frames(
        &mut self,
        metadata: &VideoMetadata,
    ) -> Result<DriverReport, Box<dyn std::error::Error>> {
        let Self {
            reader,
            detector,
            annotator,
            image_writer,
            logger,
            output,
            settings,
        } = self;

        let mut crops = CropTracker::new(settings.crop_schedule);
        let mut report = DriverReport::default();

        for frame in reader.frames() {
            let mut frame = frame?;
            report.frames_read += 1;
            let index = frame.index();

            if index % settings.frame_skip == 0 {
                let start = Instant::now();
                let detections = detector.detect(&frame)?;
                logger.timing("detect", elapsed_ms(start));
                logger.count("faces", detections.len() as u64);

                report.frames_detected += 1;
                report.faces_found += detections.len();

                if !detections.is_empty() {
                    if let Some(crops_dir) = settings.crops_dir.as_deref() {
                        if let Some(slot) = crops.due(index, metadata) {
                            let saved = save_crops(
                                image_writer.as_ref(),
                                &frame,
                                &detections,
                                crops_dir,
                                slot,
                            )?;
                            logger.count("crops", saved as u64);
                            report.crops_saved += saved;
                        }
                    }
                }

                let start = Instant::now();
                annotator.annotate(&mut frame, &detections)?;
                logger.timing("annotate", elapsed_ms(start));

                if let Some(frames_dir) = settings.frames_dir.as_deref() {
                    let path = frames_dir.join(format!("frame_{index:04}.png"));
                    image_writer.write(&path, &frame)?;
                }
                if let Some(AnnotatedOutput::Image { path }) = output.as_ref() {
                    image_writer.write(path, &frame)?;
                }

                report.detections.push(FrameDetections {
                    frame_index: index,
                    detections,
                });
            }

            if let Some(AnnotatedOutput::Video { writer, .. }) = output.as_mut() {
                let start = Instant::now();
                writer.write(&frame)?;
                logger.timing("encode", elapsed_ms(start));
            }

            logger.progress(report.frames_read, metadata.total_frames);
        }

        Ok(report)
    }
}

/// Cuts each detection out of the un-annotated frame. Boxes are truncated to
/// integers and clipped; a box with nothing inside the frame is skipped but
/// keeps its index in the file name.
fn save_crops(
    writer: &dyn ImageWriter,
    frame: &Frame,
    detections: &[Detection],
    crops_dir: &Path,
    slot: CropSlot,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut saved = 0;
    for (i, detection) in detections.iter().enumerate() {
        let b = &detection.bbox;
        let Some(crop) = frame.crop(b.x1 as i64, b.y1 as i64, b.x2 as i64, b.y2 as i64) else {
            log::trace!("Skipping empty crop {i} on frame {}", frame.index());
            continue;
        };
        writer.write(&slot.path(crops_dir, i), &crop)?;
        saved += 1;
    }
    Ok(saved)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
