//! Balance Board Analytics - streaming direction classifier for balance boards.
//!
//! A balance board reports the load on four cells (right-front, right-rear,
//! left-front, left-rear) many times a second. This library turns that stream
//! into committed direction events (up, down, left, right or none) that can
//! drive a game or be stored for later analysis.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Collector   │──▶│ Calibration  │──▶│   Window +   │──▶│  Classifier  │
//! │ (per device) │   │ (idle frames)│   │   Summary    │   │   + latch    │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                 │ events
//!                                                                 ▼
//!                                       ┌──────────────┐   ┌──────────────┐
//!                                       │   Session    │◀──│ Sink writer  │
//!                                       │    stats     │   │ (one thread) │
//!                                       └──────────────┘   └──────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use balance_board_analytics::core::{ClassifierConfig, DirectionClassifier, Step};
//! use balance_board_analytics::collector::SensorFrame;
//! use chrono::Utc;
//!
//! let mut classifier = DirectionClassifier::new(ClassifierConfig::default());
//! let mut committed = None;
//! for _ in 0..11 {
//!     if let Step::Emitted(event) = classifier.process(SensorFrame::new(Utc::now(), [800, 800, 200, 200])) {
//!         committed = Some(event.direction);
//!     }
//! }
//! assert_eq!(committed.map(|d| d.to_string()), Some("right".to_string()));
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod device;
pub mod sink;
pub mod stats;

// Re-export key types at crate root for convenience
pub use crate::collector::{Direction, ReplayCollector, SensorFrame};
pub use crate::config::{Config, ConfigError};
pub use crate::core::{ClassifierConfig, DirectionClassifier, DirectionEvent, Step, Summary};
pub use crate::device::{spawn_device, spawn_sink_writer, DeviceReport, DeviceSpec, SinkReport};
pub use crate::sink::{BoardRecord, EventSink, JsonlSink, MemorySink, SinkError};
pub use crate::stats::{SessionStats, SharedSessionStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
