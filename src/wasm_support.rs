use tracing::{info, warn};
use winit::window::Window;

/// Id of the page element the canvas is appended to. The document body is
/// used when the page has no such element.
const CONTAINER_ID: &str = "wasm-container";

pub fn logging_init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
}

/// Size the window's canvas to the browser viewport and attach it to the page.
pub fn create_canvas(window: &Window) -> anyhow::Result<()> {
    use winit::{dpi::LogicalSize, platform::web::WindowExtWebSys};

    let browser = web_sys::window().ok_or_else(|| anyhow::anyhow!("no browser window"))?;
    let document = browser
        .document()
        .ok_or_else(|| anyhow::anyhow!("browser window has no document"))?;

    // Winit prevents sizing with CSS so the size has to be manually specified.
    let width = browser.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0);
    let height = browser.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0);
    info!("requesting canvas size of {width} x {height}");
    let _ = window.request_inner_size(LogicalSize::new(width, height));

    let canvas = window
        .canvas()
        .ok_or_else(|| anyhow::anyhow!("window has no canvas"))?;

    let parent = match document.get_element_by_id(CONTAINER_ID) {
        Some(element) => element,
        None => {
            warn!("no #{CONTAINER_ID} element, appending canvas to the body");
            web_sys::Element::from(
                document
                    .body()
                    .ok_or_else(|| anyhow::anyhow!("document has no body"))?,
            )
        }
    };

    parent
        .append_child(&web_sys::Element::from(canvas))
        .map_err(|e| anyhow::anyhow!("failed to append canvas: {e:?}"))?;

    Ok(())
}

/// Set the canvas backing store to `size` physical pixels. The canvas keeps
/// its CSS size so the browser scales the drawing buffer to fit.
pub fn resize_canvas(window: &Window, (width, height): (u32, u32)) {
    use winit::platform::web::WindowExtWebSys;

    match window.canvas() {
        Some(canvas) => {
            canvas.set_width(width);
            canvas.set_height(height);
        }
        None => warn!("window has no canvas to resize"),
    }
}

/// Browser reported device pixel ratio.
pub fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0)
}

/// True when the page is allowed to request fullscreen presentation.
pub fn fullscreen_supported() -> bool {
    web_sys::window()
        .and_then(|w| w.document())
        .map(|d| d.fullscreen_enabled())
        .unwrap_or(false)
}
