//! The three-stage cascade: propose over an image pyramid, refine 24×24
//! patches, finalize 48×48 patches with landmarks.

use std::time::Instant;

use log::{debug, trace};
use ndarray::{ArrayView3, ArrayView4, Axis};

use super::candidate_generator;
use super::cascade_config::{
    score_passes, CascadeConfig, ConfigError, FINALIZE_PATCH_SIZE, REFINE_PATCH_SIZE,
};
use super::detection::Detection;
use super::detection_error::{DetectionError, Stage};
use super::face_detector::FaceDetector;
use super::face_landmarks::{FaceLandmarks, LANDMARK_COUNT};
use super::geometry::{calibrate, calibrate_candidates, pad, round_boxes, to_square};
use super::image_pyramid::{level_tensor, pyramid_levels};
use super::patch_extractor::extract_patches;
use super::scoring_model::{ModelOutput, ScoringModel};
use crate::shared::face_box::{BoxRegression, Candidate, FaceBox};
use crate::shared::frame::Frame;

/// Cascade face detector over three borrowed scoring models.
///
/// Holds no per-frame state: every [`detect`](FaceDetector::detect) call
/// starts from the frame alone.
pub struct CascadeDetector<'m> {
    proposal: &'m mut dyn ScoringModel,
    refine: &'m mut dyn ScoringModel,
    finalize: &'m mut dyn ScoringModel,
    config: CascadeConfig,
}

impl<'m> CascadeDetector<'m> {
    pub fn new(
        proposal: &'m mut dyn ScoringModel,
        refine: &'m mut dyn ScoringModel,
        finalize: &'m mut dyn ScoringModel,
        config: CascadeConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            proposal,
            refine,
            finalize,
            config,
        })
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Stage 1: candidates from every pyramid level, suppressed per level and
    /// then globally, calibrated with the regression of their own cell.
    fn propose(
        &mut self,
        image: ArrayView3<u8>,
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectionError> {
        let levels = pyramid_levels(width, height, &self.config);
        let mut accumulated: Vec<Candidate> = Vec::new();

        for level in &levels {
            let tensor = level_tensor(image, level, self.config.swap_red_blue);
            let output = run_model(&mut *self.proposal, Stage::Proposal, tensor.view())?;
            if output.scores.dim().0 != 1 || output.regression.dim().0 != 1 {
                return Err(DetectionError::malformed(
                    Stage::Proposal,
                    format!(
                        "expected one map per level, got scores {:?} and regression {:?}",
                        output.scores.shape(),
                        output.regression.shape()
                    ),
                ));
            }

            let candidates = candidate_generator::generate(
                output.scores.index_axis(Axis(0), 0),
                output.regression.index_axis(Axis(0), 0),
                level.scale,
                self.config.proposal_threshold,
            )?;
            if candidates.is_empty() {
                continue;
            }

            let keep = self.config.proposal_level_nms.apply(&bboxes(&candidates));
            trace!(
                "Level {:.4} ({}x{}): {} candidates, {} after suppression",
                level.scale,
                level.width,
                level.height,
                candidates.len(),
                keep.len()
            );
            accumulated.extend(keep.into_iter().map(|i| candidates[i]));
        }

        if accumulated.is_empty() {
            return Ok(Vec::new());
        }

        let keep = self.config.proposal_global_nms.apply(&bboxes(&accumulated));
        let survivors: Vec<Candidate> = keep.into_iter().map(|i| accumulated[i]).collect();
        debug!(
            "Proposal: {} levels, {} candidates, {} after global suppression",
            levels.len(),
            accumulated.len(),
            survivors.len()
        );
        Ok(calibrate_candidates(&survivors))
    }

    /// Stage 2: re-score square 24×24 patches around each proposal.
    fn refine(
        &mut self,
        image: ArrayView3<u8>,
        boxes: &[FaceBox],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectionError> {
        if boxes.is_empty() {
            return Ok(Vec::new());
        }

        let squared = round_boxes(&to_square(boxes));
        let windows = pad(&squared, width, height);
        let batch = extract_patches(
            image,
            &windows,
            REFINE_PATCH_SIZE,
            self.config.min_refine_patch,
            self.config.swap_red_blue,
        );
        if batch.is_empty() {
            debug!("Refine: none of {} boxes gave a usable patch", boxes.len());
            return Ok(Vec::new());
        }

        let output = run_model(&mut *self.refine, Stage::Refine, batch.tensor.view())?;
        let (scores, offsets) = patch_outputs(Stage::Refine, &output, batch.len())?;

        let mut passed = Vec::new();
        let mut passed_offsets = Vec::new();
        for (row, &source) in batch.kept.iter().enumerate() {
            if score_passes(scores[row], self.config.refine_threshold) {
                passed.push(squared[source].with_score(scores[row] as f64));
                passed_offsets.push(offsets[row]);
            }
        }
        if passed.is_empty() {
            debug!("Refine: no patch above {}", self.config.refine_threshold);
            return Ok(Vec::new());
        }

        let keep = self.config.refine_nms.apply(&passed);
        debug!(
            "Refine: {} patches, {} above threshold, {} after suppression",
            batch.len(),
            passed.len(),
            keep.len()
        );
        let kept_boxes: Vec<FaceBox> = keep.iter().map(|&i| passed[i]).collect();
        let kept_offsets: Vec<BoxRegression> = keep.iter().map(|&i| passed_offsets[i]).collect();
        Ok(calibrate(&kept_boxes, &kept_offsets))
    }

    /// Stage 3: score 48×48 patches, decode landmarks against the patch box,
    /// calibrate, then suppress by the smaller area.
    fn finalize(
        &mut self,
        image: ArrayView3<u8>,
        boxes: &[FaceBox],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, DetectionError> {
        if boxes.is_empty() {
            return Ok(Vec::new());
        }

        let squared = round_boxes(&to_square(boxes));
        let windows = pad(&squared, width, height);
        let batch = extract_patches(
            image,
            &windows,
            FINALIZE_PATCH_SIZE,
            1,
            self.config.swap_red_blue,
        );
        if batch.is_empty() {
            debug!("Finalize: none of {} boxes gave a usable patch", boxes.len());
            return Ok(Vec::new());
        }

        let output = run_model(&mut *self.finalize, Stage::Finalize, batch.tensor.view())?;
        let (scores, offsets) = patch_outputs(Stage::Finalize, &output, batch.len())?;
        let raw_landmarks = match &output.landmarks {
            Some(lm) if lm.dim() == (batch.len(), 2 * LANDMARK_COUNT) => lm,
            Some(lm) => {
                return Err(DetectionError::malformed(
                    Stage::Finalize,
                    format!(
                        "expected landmarks [{}, {}], got {:?}",
                        batch.len(),
                        2 * LANDMARK_COUNT,
                        lm.shape()
                    ),
                ))
            }
            None => {
                return Err(DetectionError::malformed(
                    Stage::Finalize,
                    "model returned no landmarks",
                ))
            }
        };

        let mut passed = Vec::new();
        let mut passed_offsets = Vec::new();
        let mut landmarks = Vec::new();
        for (row, &source) in batch.kept.iter().enumerate() {
            if score_passes(scores[row], self.config.finalize_threshold) {
                let patch_box = squared[source].with_score(scores[row] as f64);
                let mut raw = [0f32; 2 * LANDMARK_COUNT];
                for (dst, &v) in raw.iter_mut().zip(raw_landmarks.row(row).iter()) {
                    *dst = v;
                }
                landmarks.push(FaceLandmarks::decode(&raw, &patch_box));
                passed.push(patch_box);
                passed_offsets.push(offsets[row]);
            }
        }
        if passed.is_empty() {
            debug!("Finalize: no patch above {}", self.config.finalize_threshold);
            return Ok(Vec::new());
        }

        let calibrated = calibrate(&passed, &passed_offsets);
        let keep = self.config.finalize_nms.apply(&calibrated);
        debug!(
            "Finalize: {} patches, {} above threshold, {} after suppression",
            batch.len(),
            passed.len(),
            keep.len()
        );
        Ok(keep
            .into_iter()
            .map(|i| Detection::new(calibrated[i], Some(landmarks[i].clone())))
            .collect())
    }
}

impl FaceDetector for CascadeDetector<'_> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        if frame.channels() != 3 {
            return Err(DetectionError::UnsupportedFrame {
                expected: 3,
                channels: frame.channels(),
            });
        }
        let image = frame.as_ndarray();
        let (width, height) = (frame.width(), frame.height());

        let start = Instant::now();
        let proposals = self.propose(image, width, height)?;
        trace!("Proposal stage took {:.1?}", start.elapsed());
        if proposals.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let refined = self.refine(image, &proposals, width, height)?;
        trace!("Refine stage took {:.1?}", start.elapsed());
        if refined.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let detections = self.finalize(image, &refined, width, height)?;
        trace!("Finalize stage took {:.1?}", start.elapsed());

        debug!("Frame {}: {} faces", frame.index(), detections.len());
        Ok(detections)
    }
}

fn bboxes(candidates: &[Candidate]) -> Vec<FaceBox> {
    candidates.iter().map(|c| c.bbox).collect()
}

fn run_model(
    model: &mut dyn ScoringModel,
    stage: Stage,
    batch: ArrayView4<f32>,
) -> Result<ModelOutput, DetectionError> {
    model
        .infer(batch)
        .map_err(|source| DetectionError::Model { stage, source })
}

/// Per-patch scores and regressions, checked against the batch size.
fn patch_outputs(
    stage: Stage,
    output: &ModelOutput,
    count: usize,
) -> Result<(Vec<f32>, Vec<BoxRegression>), DetectionError> {
    if output.scores.dim() != (count, 1, 1) {
        return Err(DetectionError::malformed(
            stage,
            format!(
                "expected scores [{count}, 1, 1], got {:?}",
                output.scores.shape()
            ),
        ));
    }
    if output.regression.dim() != (count, 4, 1, 1) {
        return Err(DetectionError::malformed(
            stage,
            format!(
                "expected regression [{count}, 4, 1, 1], got {:?}",
                output.regression.shape()
            ),
        ));
    }

    let scores = output.scores.iter().copied().collect();
    let offsets = output
        .regression
        .outer_iter()
        .map(|r| {
            BoxRegression::new(
                r[[0, 0, 0]] as f64,
                r[[1, 0, 0]] as f64,
                r[[2, 0, 0]] as f64,
                r[[3, 0, 0]] as f64,
            )
        })
        .collect();
    Ok((scores, offsets))
}
