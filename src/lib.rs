mod app;
pub mod assets;
pub mod camera;
pub mod context;
pub mod controls;
pub mod frame;
pub mod ghosts;
pub mod haunted_house;
pub mod math_utils;
pub mod platform;
pub mod renderer;
pub mod scene;
pub mod viewport;

#[cfg(target_arch = "wasm32")]
mod wasm_support;

use std::sync::Arc;

use tracing::info;
use winit::{
    event::*,
    event_loop::{EventLoop, EventLoopWindowTarget},
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

use app::HauntedHouseApp;
use assets::TextureProvider;
use context::SceneContext;
use haunted_house::{HauntedHouse, SceneSettings};
use renderer::Renderer;
use viewport::{fit_surface, window_viewport};

/// Open a window showing the haunted house and run until it is closed.
pub async fn run(settings: SceneSettings) -> anyhow::Result<()> {
    // Create main window for rendering.
    info!("creating main window for rendering");

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Haunted House")
            .build(&event_loop)?,
    );

    // Insert the main window into an HTML canvas element for WASM targets.
    #[cfg(target_arch = "wasm32")]
    wasm_support::create_canvas(&window)?;

    let mut textures = TextureProvider::new();
    let house = HauntedHouse::build(&settings, &mut textures)?;
    info!("scene ready with {} nodes", house.scene.len());

    let context = SceneContext::new(house, window_viewport(&window));

    let (width, height) = fit_surface(&window, &context.viewport());
    let renderer = Renderer::new(window.clone(), width, height).await?;

    let mut app = HauntedHouseApp::new(window.clone(), renderer, textures, context);

    // The first frame starts the loop and each frame requests the next one.
    window.request_redraw();

    // Main window event loop.
    info!("starting main window event loop");

    let event_handler = move |event: Event<()>, control_flow: &EventLoopWindowTarget<()>| {
        match event {
            Event::WindowEvent { window_id, event } if window_id == app.window().id() => {
                if app.input(&event) {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => control_flow.exit(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed {
                            if let Key::Named(NamedKey::Escape) = event.logical_key {
                                control_flow.exit()
                            }
                        }
                    }
                    WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                        app.window_resized();
                    }
                    WindowEvent::RedrawRequested => app.redraw(),
                    _ => {}
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => app.mouse_motion(delta.0, delta.1),
            _ => {}
        }
    };

    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            use winit::platform::web::EventLoopExtWebSys;
            event_loop.spawn(event_handler);
        } else {
            event_loop.run(event_handler)?;
        }
    }

    Ok(())
}

/// Native entry point.
#[cfg(not(target_arch = "wasm32"))]
pub fn haunted_house_main() {
    if let Err(e) = pollster::block_on(run(SceneSettings::from_env())) {
        tracing::error!("haunted house exited with an error: {e:#}");
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use tracing::error;
    use wasm_bindgen::prelude::*;

    use crate::haunted_house::SceneSettings;

    #[wasm_bindgen(start)]
    pub fn start() {
        crate::wasm_support::logging_init();

        wasm_bindgen_futures::spawn_local(async {
            if let Err(e) = super::run(SceneSettings::default()).await {
                error!("haunted house exited with an error: {e:#}");
            }
        });
    }
}
