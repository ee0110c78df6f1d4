pub const PROPOSAL_MODEL_NAME: &str = "PNet.onnx";
pub const REFINE_MODEL_NAME: &str = "RNet.onnx";
pub const FINALIZE_MODEL_NAME: &str = "ONet.onnx";

/// Directory searched for models relative to the working directory.
pub const LOCAL_MODEL_DIR: &str = "infer_models";

/// Application folder under the platform data directory.
pub const APP_DIR_NAME: &str = "facecascade";

/// Seconds added to the crop deadline after each save.
pub const DEFAULT_CROP_INTERVAL_SECS: u64 = 3;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
