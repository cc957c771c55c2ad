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

//! Coordination-store abstraction
//!
//! The authoritative per-partition leadership lives in an external
//! strongly-consistent store as one versioned node per partition. This
//! module defines the client contract the controller programs against, the
//! payload codec, and an in-memory backend with real compare-and-swap
//! semantics.

pub mod memory;
pub mod reader;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use heronmq_common::LeaderAndIsr;
use heronmq_common::LeaderIsrAndControllerEpoch;
use heronmq_common::TopicPartition;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ControllerError;
use crate::error::Result;

pub use memory::InMemoryCoordinationStore;
pub use reader::read_partition_states;
pub use reader::PartitionStateReadResult;

/// Format version of the partition-state node payload.
pub const PARTITION_STATE_PAYLOAD_VERSION: i32 = 1;

/// Outcome of fetching one partition-state node.
#[derive(Debug)]
pub struct StateNodeResponse {
    pub partition: TopicPartition,
    pub kind: StateNodeResponseKind,
}

#[derive(Debug)]
pub enum StateNodeResponseKind {
    /// Node exists; `version` is the store's CAS version.
    Found { data: Bytes, version: i32 },
    /// No such node.
    Missing,
    /// The fetch for this node failed.
    Failed(ControllerError),
}

/// Result of a bulk leader/ISR compare-and-swap.
///
/// `to_retry` is specifically version conflict (the node was updated
/// concurrently); everything else lands in `failed`, including
/// controller-epoch fencing and missing nodes.
#[derive(Debug, Default)]
pub struct UpdateLeaderAndIsrResult {
    pub finished: HashMap<TopicPartition, LeaderAndIsr>,
    pub to_retry: Vec<TopicPartition>,
    pub failed: HashMap<TopicPartition, ControllerError>,
}

/// Client contract for the coordination store.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Bulk-fetch the partition-state nodes for the given partitions. The
    /// returned vector carries one response per input, in input order.
    async fn get_partition_states(
        &self,
        partitions: &[TopicPartition],
    ) -> Result<Vec<StateNodeResponse>>;

    /// Submit leader/ISR proposals as compare-and-swap writes tagged with
    /// the controller epoch. Each proposal's `partition_epoch` is the
    /// expected node version; on success the store bumps it and returns the
    /// stored tuple.
    async fn update_leader_and_isr(
        &self,
        proposals: HashMap<TopicPartition, LeaderAndIsr>,
        controller_epoch: i32,
    ) -> Result<UpdateLeaderAndIsrResult>;
}

/// Wire form of the partition-state node payload.
///
/// The node's CAS version is deliberately absent: it lives in the store's
/// node metadata and becomes `partition_epoch` on decode.
#[derive(Debug, Serialize, Deserialize)]
struct PartitionStatePayload {
    version: i32,
    leader: i32,
    leader_epoch: i32,
    isr: Vec<i32>,
    controller_epoch: i32,
}

/// Encode a leadership tuple into the node payload.
pub fn encode_partition_state(
    leader_and_isr: &LeaderAndIsr,
    controller_epoch: i32,
) -> Result<Bytes> {
    let payload = PartitionStatePayload {
        version: PARTITION_STATE_PAYLOAD_VERSION,
        leader: leader_and_isr.leader,
        leader_epoch: leader_and_isr.leader_epoch,
        isr: leader_and_isr.isr.clone(),
        controller_epoch,
    };
    Ok(Bytes::from(serde_json::to_vec(&payload)?))
}

/// Decode a node payload fetched at `node_version`.
///
/// An empty payload decodes to `None`; a malformed one is a serialization
/// error (the reader treats both as missing state).
pub fn decode_partition_state(
    data: &[u8],
    node_version: i32,
) -> Result<Option<LeaderIsrAndControllerEpoch>> {
    if data.is_empty() {
        return Ok(None);
    }
    let payload: PartitionStatePayload = serde_json::from_slice(data)?;
    Ok(Some(LeaderIsrAndControllerEpoch::new(
        LeaderAndIsr {
            leader: payload.leader,
            leader_epoch: payload.leader_epoch,
            isr: payload.isr,
            partition_epoch: node_version,
        },
        payload.controller_epoch,
    )))
}
