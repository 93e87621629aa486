// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or inference).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1); progress goes to tracing
//   - No direct image or checkpoint file handling (Layers 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Settings shared by training and inference
pub mod settings;

// The resumable training workflow
pub mod train_use_case;

// The prediction workflow
pub mod infer_use_case;
