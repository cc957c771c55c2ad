// Copyright 2025 The HeronMQ Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # HeronMQ Controller
//!
//! Controller-side replica lifecycle management for a partitioned,
//! replicated log cluster. The elected controller tracks the state of every
//! replica (a `(topic, partition, broker)` triple), drives transitions
//! between legal states, and coordinates the side effects: control requests
//! to brokers and compare-and-swap updates of the authoritative
//! leader/in-sync-replica metadata in the coordination store.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │        Controller event loop (owner)       │
//! └──────┬──────────────────┬──────────────────┘
//!        │                  │
//! ┌──────▼───────┐   ┌──────▼──────────────────┐
//! │ Controller   │   │  ReplicaStateMachine    │
//! │ context      │◄──┤  (state table, ISR      │
//! │ (assignment, │   │  updater, executor)     │
//! │  leadership) │   └──┬───────────────────┬──┘
//! └──────────────┘      │                   │
//!              ┌────────▼───────┐   ┌───────▼────────┐
//!              │ Coordination   │   │ Broker request │
//!              │ store (CAS)    │   │ batch (flush)  │
//!              └────────────────┘   └────────────────┘
//! ```
//!
//! Every entry point is invoked from the controller's serial event loop, so
//! no two state-machine operations overlap; the only suspension points are
//! the store round-trips and the batch flush.

#![warn(rust_2018_idioms)]
#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod context;
pub mod deletion;
pub mod error;
pub mod replica;
pub mod store;

pub use config::ControllerConfig;
pub use context::ControllerContext;
pub use error::ControllerError;
pub use error::Result;
pub use replica::state::ReplicaState;
pub use replica::state_machine::ReplicaStateMachine;
