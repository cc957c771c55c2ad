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

use heronmq_common::PartitionReplica;
use heronmq_common::TopicPartition;
use thiserror::Error;

use crate::replica::state::ReplicaState;

/// Controller error types
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Coordination store I/O failure
    #[error("Store error: {0}")]
    Store(String),

    /// Payload encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store holds metadata written by a newer controller
    #[error("Controller moved: our epoch is {current_epoch}, store has epoch {store_epoch}")]
    ControllerMoved {
        current_epoch: i32,
        store_epoch: i32,
    },

    /// No partition-state node exists for the partition
    #[error("Partition state node for {0} does not exist")]
    StateNodeMissing(TopicPartition),

    /// The requested transition is not an edge of the replica state graph
    #[error("Replica {replica} cannot move from {from} to {to}")]
    InvalidStateTransition {
        replica: PartitionReplica,
        from: ReplicaState,
        to: ReplicaState,
    },

    /// A state change was rejected or could not be carried out
    #[error("State change failed: {0}")]
    StateChangeFailed(String),

    /// Handing requests to the broker transport failed
    #[error("Broker request send failed: {0}")]
    BrokerRequestSend(String),
}

impl From<serde_json::Error> for ControllerError {
    fn from(e: serde_json::Error) -> Self {
        ControllerError::Serialization(e.to_string())
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
