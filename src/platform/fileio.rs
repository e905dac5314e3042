use std::path::Path;

use cfg_if::cfg_if;
use tracing::debug;

/// Environment variable that overrides where native builds look for content.
pub const CONTENT_DIR_ENV_VAR: &str = "HAUNTED_HOUSE_CONTENT_DIR";

/// Converts a content relative path into the URL the page's HTTP server will
/// serve it from. Content lives under `<origin>/content/`.
#[cfg(target_arch = "wasm32")]
fn format_url<P>(file_name: P) -> anyhow::Result<reqwest::Url>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let origin = web_sys::window()
        .ok_or_else(|| anyhow::anyhow!("no browser window available"))?
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("failed to read page origin: {e:?}"))?;

    let relative = file_name
        .as_ref()
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("content path {file_name:?} is not valid utf8"))?;

    let final_url = reqwest::Url::parse(&format!("{origin}/"))?
        .join("content/")?
        .join(relative)?;

    debug!("url for content request: {final_url}");
    Ok(final_url)
}

/// Get the directory native builds read content from.
///
/// `HAUNTED_HOUSE_CONTENT_DIR` wins when set, otherwise the copy that
/// `build.rs` placed in the build output directory is used.
#[cfg(not(target_arch = "wasm32"))]
pub fn content_dir() -> std::path::PathBuf {
    std::env::var_os(CONTENT_DIR_ENV_VAR)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("OUT_DIR")).join("content"))
}

/// Loads a content file and returns its raw bytes. `file_path` is relative to
/// the content directory, eg `textures/door/color.png`.
pub async fn load_as_binary<P>(file_path: P) -> anyhow::Result<Vec<u8>>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    debug!("load file as binary: {file_path:?}");

    cfg_if! {
      if #[cfg(target_arch = "wasm32")] {
        let response = reqwest::get(format_url(&file_path)?).await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
      } else {
        let full_path = content_dir().join(file_path);
        Ok(std::fs::read(full_path)?)
      }
    }
}
