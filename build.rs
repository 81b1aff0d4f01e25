// =============================================================================
// Build script (proto compilation)
// =============================================================================
// Compiles the GAEN export wire types from a .proto source at build time.
// In development, the types are defined manually in src/export/proto.rs for
// faster iteration. Enable this once a checked-in .proto file exists.
// =============================================================================

fn main() {
    // Uncomment once a .proto source is checked in:
    // prost_build::compile_protos(&["proto/temporary_exposure_key_export.proto"], &["proto/"])
    //     .expect("failed to compile protobuf definitions");
    println!("cargo:rerun-if-changed=proto/temporary_exposure_key_export.proto");
}
