#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use tracing_subscriber::EnvFilter;

    // Used when `RUST_LOG` is not set. wgpu is chatty at info level.
    const DEFAULT_LOG_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

    tracing_log::LogTracer::init().expect("failed to initialize LogTracer");

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let stdout_subscriber = tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(stdout_subscriber)
        .expect("failed to install stdout global tracing subscriber");

    haunted_house::haunted_house_main();
}

// Browsers start from the `wasm_bindgen(start)` function in the library.
#[cfg(target_arch = "wasm32")]
fn main() {}
