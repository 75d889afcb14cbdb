//! oxymas: multi-agent conversational runtime.
//!
//! Autonomous "oxy" units (agents and tools) exchange messages within one
//! logical conversation. The crate centers on the interaction ledger: an
//! append-only, causally ordered record of every exchange in a turn, with
//! multimodal content carried as external references and a registry that
//! accepts new oxys at runtime without disturbing open turns.
//!
//! # Quick Start
//!
//! ```no_run
//! use oxymas::prelude::*;
//!
//! # async fn example() -> oxymas::error::Result<()> {
//! let mas = Mas::new(MasConfig::default());
//! mas.register_oxy(
//!     "echo_agent",
//!     Capability::Agent,
//!     FnOxy::shared(|invocation, _ctx| async move { Ok(invocation.payload) }),
//! );
//! let result = mas.submit_message("s1", "echo_agent", "Hello").await?;
//! println!("{:?}", result.output_text());
//! # Ok(())
//! # }
//! ```

pub mod attachment;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mas;
pub mod oxy;
pub mod prelude;
pub mod registry;
pub mod session;
pub mod turn;
pub mod types;
pub mod util;

pub use config::MasConfig;
pub use error::{MasError, Result};
pub use mas::Mas;
