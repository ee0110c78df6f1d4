//! Three-stage cascade face detection.
//!
//! A coarse proposal model scans an image pyramid, a refine model re-scores
//! 24×24 crops of the survivors, and a finalize model scores 48×48 crops and
//! regresses five facial landmarks. Everything between the model calls
//! (pyramid construction, candidate decoding, suppression, calibration and
//! border-padded patch extraction) lives in [`detection::domain`].

pub mod shared {
    pub mod constants;
    pub mod face_box;
    pub mod frame;
    pub mod video_metadata;
}

pub mod detection {
    pub mod domain {
        pub mod candidate_generator;
        pub mod cascade_config;
        pub mod cascade_detector;
        pub mod detection;
        pub mod detection_error;
        pub mod face_detector;
        pub mod face_landmarks;
        pub mod geometry;
        pub mod image_pyramid;
        pub mod patch_extractor;
        pub mod scoring_model;
        pub mod suppression;
    }
    pub mod infrastructure;
}

pub mod annotation {
    pub mod domain {
        pub mod frame_annotator;
    }
    pub mod infrastructure {
        pub mod box_annotator;
    }
}

pub mod video {
    pub mod domain {
        pub mod image_writer;
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod ffmpeg_writer;
        pub mod image_file_reader;
        pub mod image_file_writer;
    }
}

pub mod pipeline {
    pub mod crop_schedule;
    pub mod detect_faces_use_case;
    pub mod pipeline_logger;
    pub mod infrastructure {
        pub mod threaded_batch_executor;
    }
}
