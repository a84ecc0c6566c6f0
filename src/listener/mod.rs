//! Listener strategies: push (streaming subscription) and pull (periodic
//! range scan), unified behind the `Listener` trait (spec.md §4.2, §4.3).
//!
//! Both strategies produce the same decoded-event shape and the same
//! per-listener ordering guarantee; a `ChainAdapter` decides which one to
//! mint for a given `ChainConfig.strategy`.

pub mod pull;
pub mod push;
pub mod traits;

pub use pull::PullListener;
pub use push::PushListener;
pub use traits::Listener;
