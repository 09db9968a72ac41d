//! Build script - stages the linker script for embedded builds.
//!
//! `memory.x` describes the flash/RAM split around the S140 SoftDevice;
//! cortex-m-rt picks it up from the build output directory.  Host
//! (test) builds run this too but never link against it.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
