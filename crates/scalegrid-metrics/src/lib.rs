//! scalegrid-metrics — utilization samples in, Prometheus text out.
//!
//! # Architecture
//!
//! ```text
//! SampleWindow
//!   ├── record()  ← samples fetched from the platform each cycle
//!   ├── prune()   → drops samples older than the stabilization horizon
//!   └── samples() → input to the scaling policy
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for the /metrics endpoint
//! ```

pub mod prometheus;
pub mod window;

pub use prometheus::render_prometheus;
pub use window::SampleWindow;
