/// Build script for rendering_101
///
/// # Shader Strategy:
/// - Precompiled bytecode (`shaders/*.cso`) is loaded verbatim at runtime
/// - `shaders/triangle.hlsl` is compiled at runtime via D3DCompile when no bytecode is present
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=shaders/triangle.hlsl");
}
