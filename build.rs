use std::env;

use anyhow::*;
use fs_extra::{copy_items, dir::CopyOptions};

fn main() -> Result<()> {
    // Re-run the build script whenever a texture is added, removed or edited.
    println!("cargo:rerun-if-changed=content");

    for entry in glob::glob("content/**/*")? {
        let path = entry?;
        if path.is_file() {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }

    // Native builds read textures from `$OUT_DIR/content`, see
    // `platform::fileio`.
    let out_dir = env::var("OUT_DIR")?;

    let copy_options = CopyOptions::new().overwrite(true);
    copy_items(&["content/"], out_dir, &copy_options)?;

    Ok(())
}
