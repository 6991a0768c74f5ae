//! Strand Core
//!
//! This crate provides a fine-grained reactive dependency graph.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Push-pull change propagation with glitch-free, lazy recomputation
//! - Batching, untracked reads, and effect scopes
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: The dependency graph and the propagation algorithms
//! - `reactive`: Signals, memos, effects, and the runtime that drives them
//! - `config`: Runtime settings
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use strand_core::reactive::{Effect, Memo, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     Memo::new(move || count.get() * 2)
//! };
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let effect = {
//!     let (count, doubled, log) = (count.clone(), doubled.clone(), log.clone());
//!     Effect::new(move || {
//!         log.borrow_mut().push(format!("{} {}", count.get(), doubled.get()));
//!     })
//! };
//!
//! // Update the signal; the effect runs before `set` returns
//! count.set(5);
//! assert_eq!(*log.borrow(), ["0 0", "5 10"]);
//!
//! effect.stop();
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ConfigError, ReactiveError};
pub use reactive::{batch, untracked, Effect, EffectScope, Memo, MaybeSignal, Runtime, Signal};
