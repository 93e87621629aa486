// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums, and traits that define the core
// concepts of the segmentation pipeline.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain data, error types, and traits
//
// Keeping this layer free of tensors means the dataset code,
// the post-processor and the tests can all talk about samples
// without needing a GPU or a backend type parameter.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Image sizes and the per-sample record fed into the network
pub mod sample;

// Error taxonomy shared by every layer
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
