use ort::execution_providers::ExecutionProviderDispatch;

/// Execution providers tried, in order, for every cascade session.
///
/// ONNX Runtime silently falls back to its CPU provider when none of these
/// can be registered, so an empty list simply means "CPU".
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Vec::new()
    }
}

/// Human-readable name of the provider list, for startup logging.
pub fn execution_provider_label() -> &'static str {
    if cfg!(target_os = "macos") {
        "CoreML"
    } else if cfg!(target_os = "windows") {
        "DirectML"
    } else {
        "CPU"
    }
}
