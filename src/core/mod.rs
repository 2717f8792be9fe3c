//! # Core Domain
//!
//! Watch settings and the documents a watch cycle consumes. It knows
//! nothing about terminals.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • WatchConfig          │
//!                    │  • RunReport / Totals   │
//!                    │  • AnalysisResult       │
//!                    │                         │
//!                    │  No terminal I/O.       │
//!                    └───────────┬─────────────┘
//!                                │
//!                                ▼
//!                    ┌─────────────────────────┐
//!                    │  tui (session, render)  │
//!                    └─────────────────────────┘
//! ```

pub mod config;
pub mod report;
