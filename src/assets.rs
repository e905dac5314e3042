//! Asynchronous texture loading.
//!
//! `TextureProvider::load` hands back a `TextureHandle` right away. The file is
//! fetched and decoded away from the render loop and the result is delivered
//! over a channel, which the provider drains once per frame in `poll`. Anything
//! holding the handle (typically a material) sees the image on the following
//! frame. A texture that fails to load stays empty and the renderer substitutes
//! a default texture for it.
use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    sync::mpsc,
};

use glam::Vec2;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::platform::load_as_binary;

/// How texture coordinates outside of [0, 1] are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// The color space texel values are stored in. Color maps are sRGB encoded,
/// data maps (normals, roughness, etc) are linear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Srgb,
    #[default]
    Linear,
}

/// Sampling parameters attached to a texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureSettings {
    /// Number of times the texture repeats across the surface on the U and V
    /// axes.
    pub repeat: Vec2,
    /// Wrap mode along the U axis.
    pub wrap_s: WrapMode,
    /// Wrap mode along the V axis.
    pub wrap_t: WrapMode,
    pub color_space: ColorSpace,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            repeat: Vec2::ONE,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            color_space: ColorSpace::Linear,
        }
    }
}

impl TextureSettings {
    /// Settings for a texture holding sRGB encoded colors.
    pub fn srgb() -> Self {
        Self {
            color_space: ColorSpace::Srgb,
            ..Default::default()
        }
    }

    /// Tile the texture `repeat_x` by `repeat_y` times with repeat wrapping on
    /// both axes.
    pub fn tiled(self, repeat_x: f32, repeat_y: f32) -> Self {
        Self {
            repeat: Vec2::new(repeat_x, repeat_y),
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            ..self
        }
    }
}

/// Uniquely identifies a texture created by a `TextureProvider`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

/// Load progress of a texture.
#[derive(Clone, Debug)]
pub enum TextureState {
    Pending,
    Loaded(Rc<image::RgbaImage>),
    Failed(String),
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read texture `{path}`: {message}")]
    Read { path: String, message: String },
    #[error("failed to decode texture `{path}`")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("loading texture `{path}` was abandoned before it finished")]
    Abandoned { path: String },
}

/// Shared reference to a texture that may still be loading.
///
/// Cloning a handle is cheap and every clone observes the same load state and
/// sampling settings.
#[derive(Clone)]
pub struct TextureHandle {
    slot: Rc<TextureSlot>,
}

struct TextureSlot {
    id: TextureId,
    path: String,
    settings: Cell<TextureSettings>,
    state: RefCell<TextureState>,
    version: Cell<u64>,
}

impl TextureHandle {
    fn new(id: TextureId, path: &str, settings: TextureSettings) -> Self {
        Self {
            slot: Rc::new(TextureSlot {
                id,
                path: path.to_owned(),
                settings: Cell::new(settings),
                state: RefCell::new(TextureState::Pending),
                version: Cell::new(0),
            }),
        }
    }

    pub fn id(&self) -> TextureId {
        self.slot.id
    }

    /// The content relative path this texture was requested from.
    pub fn path(&self) -> &str {
        &self.slot.path
    }

    pub fn settings(&self) -> TextureSettings {
        self.slot.settings.get()
    }

    pub fn set_settings(&self, settings: TextureSettings) {
        self.slot.settings.set(settings);
        self.bump_version();
    }

    /// Set how many times the texture repeats along each axis.
    pub fn set_repeat(&self, repeat_x: f32, repeat_y: f32) {
        self.set_settings(TextureSettings {
            repeat: Vec2::new(repeat_x, repeat_y),
            ..self.settings()
        })
    }

    /// Set the wrap mode along the U (`wrap_s`) and V (`wrap_t`) axes.
    pub fn set_wrap(&self, wrap_s: WrapMode, wrap_t: WrapMode) {
        self.set_settings(TextureSettings {
            wrap_s,
            wrap_t,
            ..self.settings()
        })
    }

    pub fn state(&self) -> TextureState {
        self.slot.state.borrow().clone()
    }

    /// Get the decoded image if loading has completed.
    pub fn image(&self) -> Option<Rc<image::RgbaImage>> {
        match &*self.slot.state.borrow() {
            TextureState::Loaded(image) => Some(image.clone()),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(&*self.slot.state.borrow(), TextureState::Loaded(_))
    }

    /// Changes every time the image data or the sampling settings change. GPU
    /// copies of the texture compare versions to know when to refresh.
    pub fn version(&self) -> u64 {
        self.slot.version.get()
    }

    fn resolve(&self, result: Result<image::RgbaImage, AssetError>) {
        let new_state = match result {
            Ok(image) => {
                debug!(
                    "texture `{}` loaded ({} x {})",
                    self.path(),
                    image.width(),
                    image.height()
                );
                TextureState::Loaded(Rc::new(image))
            }
            Err(e) => {
                warn!("{e}; the surface will render with default values");
                TextureState::Failed(e.to_string())
            }
        };

        *self.slot.state.borrow_mut() = new_state;
        self.bump_version();
    }

    fn bump_version(&self) {
        self.slot.version.set(self.slot.version.get() + 1);
    }
}

impl std::fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.slot.state.borrow() {
            TextureState::Pending => "pending",
            TextureState::Loaded(_) => "loaded",
            TextureState::Failed(_) => "failed",
        };

        f.debug_struct("TextureHandle")
            .field("id", &self.slot.id)
            .field("path", &self.slot.path)
            .field("state", &state)
            .finish()
    }
}

type LoadResult = (TextureId, Result<image::RgbaImage, AssetError>);

/// Reports the outcome of a single texture load back to its provider.
///
/// Dropping a completion without calling `finish` reports the load as
/// abandoned so the handle does not stay pending forever.
pub struct LoadCompletion {
    id: TextureId,
    path: String,
    sender: Option<mpsc::Sender<LoadResult>>,
}

impl LoadCompletion {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decode `bytes` (if the read succeeded) and deliver the result.
    pub fn finish(mut self, bytes: anyhow::Result<Vec<u8>>) {
        let result = bytes
            .map_err(|e| AssetError::Read {
                path: self.path.clone(),
                message: format!("{e:#}"),
            })
            .and_then(|bytes| decode_image(&self.path, &bytes));

        self.send(result);
    }

    fn send(&mut self, result: Result<image::RgbaImage, AssetError>) {
        if let Some(sender) = self.sender.take() {
            if sender.send((self.id, result)).is_err() {
                debug!("texture provider went away before `{}` finished", self.path);
            }
        }
    }
}

impl Drop for LoadCompletion {
    fn drop(&mut self) {
        let path = self.path.clone();
        self.send(Err(AssetError::Abandoned { path }));
    }
}

/// Decode an encoded image (PNG or JPEG) into 8 bit RGBA texels.
pub fn decode_image(path: &str, bytes: &[u8]) -> Result<image::RgbaImage, AssetError> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgba8())
        .map_err(|source| AssetError::Decode {
            path: path.to_owned(),
            source,
        })
}

/// Starts texture loads without blocking the caller.
pub trait AssetLoader {
    /// Begin loading `completion.path()`. Implementations must eventually call
    /// `completion.finish` (or drop the completion).
    fn spawn_load(&self, completion: LoadCompletion);
}

/// Reads content files in the background: a worker thread on native targets,
/// a spawned future in the browser.
#[derive(Debug, Default)]
pub struct BackgroundLoader;

impl AssetLoader for BackgroundLoader {
    fn spawn_load(&self, completion: LoadCompletion) {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                wasm_bindgen_futures::spawn_local(async move {
                    let path = completion.path().to_owned();
                    let bytes = load_as_binary(&path).await;
                    completion.finish(bytes);
                });
            } else {
                let spawned = std::thread::Builder::new()
                    .name("texture-loader".to_owned())
                    .spawn(move || {
                        let path = completion.path().to_owned();
                        let bytes = pollster::block_on(load_as_binary(&path));
                        completion.finish(bytes);
                    });

                if let Err(e) = spawned {
                    warn!("failed to start texture loader thread: {e}");
                }
            }
        }
    }
}

/// Creates texture handles and populates them as loads complete.
pub struct TextureProvider {
    loader: Box<dyn AssetLoader>,
    next_id: u64,
    in_flight: HashMap<TextureId, TextureHandle>,
    sender: mpsc::Sender<LoadResult>,
    receiver: mpsc::Receiver<LoadResult>,
}

impl TextureProvider {
    /// Create a provider that loads content files in the background.
    pub fn new() -> Self {
        Self::with_loader(BackgroundLoader)
    }

    /// Create a provider that uses `loader` to start each load.
    pub fn with_loader(loader: impl AssetLoader + 'static) -> Self {
        let (sender, receiver) = mpsc::channel();

        Self {
            loader: Box::new(loader),
            next_id: 0,
            in_flight: HashMap::new(),
            sender,
            receiver,
        }
    }

    /// Request the texture at `path`. The returned handle is pending until a
    /// later call to `poll` observes the finished load.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn load(&mut self, path: &str, settings: TextureSettings) -> TextureHandle {
        let id = TextureId(self.next_id);
        self.next_id += 1;

        let handle = TextureHandle::new(id, path, settings);
        self.in_flight.insert(id, handle.clone());

        self.loader.spawn_load(LoadCompletion {
            id,
            path: path.to_owned(),
            sender: Some(self.sender.clone()),
        });

        handle
    }

    /// Apply every load that finished since the last poll. Returns how many
    /// handles were resolved. Never blocks.
    pub fn poll(&mut self) -> usize {
        let mut resolved = 0;

        while let Ok((id, result)) = self.receiver.try_recv() {
            match self.in_flight.remove(&id) {
                Some(handle) => {
                    handle.resolve(result);
                    resolved += 1;
                }
                None => warn!("ignoring result for unknown texture {id:?}"),
            }
        }

        if resolved > 0 && self.in_flight.is_empty() {
            info!("all requested textures have finished loading");
        }

        resolved
    }

    /// Number of textures still waiting on their loader.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

impl Default for TextureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Holds on to completions so a test decides when (and how) each load
    /// finishes.
    #[derive(Clone, Default)]
    pub struct ManualLoader {
        pub started: Rc<RefCell<Vec<LoadCompletion>>>,
    }

    impl AssetLoader for ManualLoader {
        fn spawn_load(&self, completion: LoadCompletion) {
            self.started.borrow_mut().push(completion);
        }
    }

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn handle_is_pending_until_polled() {
        let loader = ManualLoader::default();
        let mut provider = TextureProvider::with_loader(loader.clone());

        let handle = provider.load("textures/bricks/color.png", TextureSettings::srgb());
        assert!(matches!(handle.state(), TextureState::Pending));
        assert_eq!(1, provider.pending());

        let completion = loader.started.borrow_mut().pop().unwrap();
        assert_eq!("textures/bricks/color.png", completion.path());
        completion.finish(Ok(png_bytes(4, 2)));

        // Nothing changes until the provider is polled.
        assert!(!handle.is_loaded());

        assert_eq!(1, provider.poll());
        assert!(handle.is_loaded());
        assert_eq!(0, provider.pending());

        let image = handle.image().unwrap();
        assert_eq!((4, 2), image.dimensions());
    }

    #[test]
    fn read_failure_leaves_texture_empty() {
        let loader = ManualLoader::default();
        let mut provider = TextureProvider::with_loader(loader.clone());

        let handle = provider.load("textures/missing.png", Default::default());
        let version_before = handle.version();

        let completion = loader.started.borrow_mut().pop().unwrap();
        completion.finish(Err(anyhow::anyhow!("file not found")));
        provider.poll();

        assert!(matches!(handle.state(), TextureState::Failed(_)));
        assert!(handle.image().is_none());
        assert!(handle.version() > version_before);
    }

    #[test]
    fn corrupt_data_fails_to_decode() {
        let loader = ManualLoader::default();
        let mut provider = TextureProvider::with_loader(loader.clone());

        let handle = provider.load("textures/corrupt.png", Default::default());
        let completion = loader.started.borrow_mut().pop().unwrap();
        completion.finish(Ok(vec![1, 2, 3, 4]));
        provider.poll();

        match handle.state() {
            TextureState::Failed(message) => assert!(message.contains("decode")),
            other => panic!("expected a failed texture but got {other:?}"),
        }
    }

    #[test]
    fn dropped_completion_is_reported_as_abandoned() {
        let loader = ManualLoader::default();
        let mut provider = TextureProvider::with_loader(loader.clone());

        let handle = provider.load("textures/grass/color.png", Default::default());
        loader.started.borrow_mut().clear();

        assert_eq!(1, provider.poll());
        match handle.state() {
            TextureState::Failed(message) => assert!(message.contains("abandoned")),
            other => panic!("expected a failed texture but got {other:?}"),
        }
    }

    #[test]
    fn tiled_settings_repeat_and_wrap() {
        let settings = TextureSettings::srgb().tiled(8.0, 8.0);

        assert_eq!(Vec2::new(8.0, 8.0), settings.repeat);
        assert_eq!(WrapMode::Repeat, settings.wrap_s);
        assert_eq!(WrapMode::Repeat, settings.wrap_t);
        assert_eq!(ColorSpace::Srgb, settings.color_space);
    }

    #[test]
    fn changing_settings_bumps_version() {
        let mut provider = TextureProvider::with_loader(ManualLoader::default());
        let handle = provider.load("textures/grass/normal.png", Default::default());

        let before = handle.version();
        handle.set_repeat(8.0, 8.0);
        handle.set_wrap(WrapMode::Repeat, WrapMode::MirroredRepeat);

        assert_eq!(before + 2, handle.version());
        assert_eq!(Vec2::new(8.0, 8.0), handle.settings().repeat);
        assert_eq!(WrapMode::MirroredRepeat, handle.settings().wrap_t);
    }
}
