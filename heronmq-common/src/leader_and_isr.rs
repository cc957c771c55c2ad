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

//! The per-partition leadership tuple.
//!
//! The controller is the only writer of this tuple; brokers receive it via
//! control requests and the coordination store holds the authoritative copy.

use serde::Deserialize;
use serde::Serialize;

/// Sentinel broker id for a partition that currently has no leader.
pub const NO_LEADER: i32 = -1;

/// Version of the partition-state node as first written by the controller.
pub const INITIAL_PARTITION_EPOCH: i32 = 0;

/// Leader epoch assigned when a partition is first created.
pub const INITIAL_LEADER_EPOCH: i32 = 0;

/// Leader, in-sync replica set and their versions for one partition.
///
/// `leader_epoch` is bumped by the controller every time it changes the
/// leader or the ISR; `partition_epoch` is the coordination-store node
/// version and is bumped by the store on every successful compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderAndIsr {
    pub leader: i32,
    pub leader_epoch: i32,
    pub isr: Vec<i32>,
    pub partition_epoch: i32,
}

impl LeaderAndIsr {
    /// Initial tuple for a freshly created partition.
    pub fn new(leader: i32, isr: Vec<i32>) -> Self {
        Self {
            leader,
            leader_epoch: INITIAL_LEADER_EPOCH,
            isr,
            partition_epoch: INITIAL_PARTITION_EPOCH,
        }
    }

    /// Derive the successor tuple for a leader or ISR change.
    ///
    /// The leader epoch is bumped here; the partition epoch is left for the
    /// store to bump when the compare-and-swap lands.
    pub fn new_leader_and_isr(&self, leader: i32, isr: Vec<i32>) -> Self {
        Self {
            leader,
            leader_epoch: self.leader_epoch + 1,
            isr,
            partition_epoch: self.partition_epoch,
        }
    }

    /// Copy of this tuple carrying the node version returned by the store.
    pub fn with_partition_epoch(&self, partition_epoch: i32) -> Self {
        Self {
            partition_epoch,
            ..self.clone()
        }
    }

    #[inline]
    pub fn has_leader(&self) -> bool {
        self.leader != NO_LEADER
    }

    #[inline]
    pub fn leader_opt(&self) -> Option<i32> {
        if self.has_leader() {
            Some(self.leader)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_in_isr(&self, broker_id: i32) -> bool {
        self.isr.contains(&broker_id)
    }
}

/// Leadership tuple together with the controller epoch that wrote it.
///
/// The controller epoch is the fencing token: a reader that finds a higher
/// epoch than its own in the store knows it has been superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderIsrAndControllerEpoch {
    pub leader_and_isr: LeaderAndIsr,
    pub controller_epoch: i32,
}

impl LeaderIsrAndControllerEpoch {
    pub fn new(leader_and_isr: LeaderAndIsr, controller_epoch: i32) -> Self {
        Self {
            leader_and_isr,
            controller_epoch,
        }
    }
}
