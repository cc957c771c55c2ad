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

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Lifecycle state of one replica as tracked by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicaState {
    /// No such replica known; also the implicit pre-creation state.
    NonExistent,
    /// Announced during a reassignment, not yet part of the partition's
    /// assignment.
    New,
    /// Part of the assignment; expected to serve as leader or follower.
    Online,
    /// Hosting broker is down, or the replica was removed from the ISR.
    Offline,
    /// A delete-replica command has been issued to the broker.
    DeletionStarted,
    /// Broker acknowledged deletion without error.
    DeletionSuccessful,
    /// Broker failed to delete, or deletion was attempted against an
    /// unreachable replica.
    DeletionIneligible,
}

impl ReplicaState {
    /// States a replica may be in immediately before moving to `self`.
    ///
    /// The edge set is fixed; anything outside it is an invalid transition
    /// that is logged and skipped.
    pub fn valid_previous_states(&self) -> &'static [ReplicaState] {
        use ReplicaState::*;
        match self {
            New => &[NonExistent],
            Online => &[New, Online, Offline, DeletionIneligible],
            Offline => &[New, Online, Offline, DeletionIneligible],
            DeletionStarted => &[Offline],
            DeletionSuccessful => &[DeletionStarted],
            DeletionIneligible => &[DeletionStarted],
            NonExistent => &[DeletionSuccessful],
        }
    }

    /// Whether a replica in `current` may move to `self`.
    pub fn is_valid_transition_from(&self, current: ReplicaState) -> bool {
        self.valid_previous_states().contains(&current)
    }
}

impl fmt::Display for ReplicaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplicaState::NonExistent => "NonExistent",
            ReplicaState::New => "New",
            ReplicaState::Online => "Online",
            ReplicaState::Offline => "Offline",
            ReplicaState::DeletionStarted => "DeletionStarted",
            ReplicaState::DeletionSuccessful => "DeletionSuccessful",
            ReplicaState::DeletionIneligible => "DeletionIneligible",
        };
        f.write_str(name)
    }
}
