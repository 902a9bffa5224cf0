use std::env;
use std::path::{Path, PathBuf};

const WATCHED: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in WATCHED {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // ffmpeg-sys-next finds FFmpeg through pkg-config everywhere but Windows.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    match vcpkg_ffmpeg() {
        Some(directory) if directory.exists() => report_vcpkg(&directory),
        Some(directory) => println!(
            "cargo:warning=VCPKG_ROOT is set but {} does not exist; bifgen needs the FFmpeg libraries.",
            directory.display()
        ),
        None => println!(
            "cargo:warning=FFMPEG_DIR is not set. Install FFmpeg (e.g. `vcpkg install ffmpeg`) and point FFMPEG_DIR at it to build bifgen."
        ),
    }
}

fn vcpkg_ffmpeg() -> Option<PathBuf> {
    let root = env::var_os("VCPKG_ROOT")?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    Some(Path::new(&root).join("installed").join(triplet))
}

fn report_vcpkg(directory: &Path) {
    println!(
        "cargo:warning=Using vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} to silence this.",
        directory.display()
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=Dynamic vcpkg FFmpeg builds also need VCPKGRS_DYNAMIC=1.");
    }
}
