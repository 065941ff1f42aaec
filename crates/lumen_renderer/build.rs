// Build script for linking Embree library
//
// Only runs the link step when the `embree` feature is enabled.
// Linux/macOS: install embree4 from your package manager.
// Windows: vcpkg install embree[geometry-triangle]:x64-windows

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=EMBREE_DIR");

    if std::env::var_os("CARGO_FEATURE_EMBREE").is_none() {
        return;
    }

    println!("cargo:rustc-link-lib=embree4");

    if let Ok(embree_dir) = std::env::var("EMBREE_DIR") {
        println!("cargo:rustc-link-search=native={}/lib", embree_dir);
    }
    // vcpkg installs embree4.lib under the triplet directory
    if let Ok(vcpkg_root) = std::env::var("VCPKG_ROOT") {
        let lib_path = format!("{}\\installed\\x64-windows\\lib", vcpkg_root);
        println!("cargo:rustc-link-search=native={}", lib_path);
    }
}
