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

//! Broker control-request batching.
//!
//! The state machine accumulates control requests over the course of one
//! operation and flushes them as a coherent batch tagged with the
//! controller epoch. The batch is the exclusive property of the state
//! machine for the duration of a call; the broker RPC pool sits behind it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use heronmq_common::LeaderIsrAndControllerEpoch;
use heronmq_common::PartitionReplica;
use heronmq_common::TopicPartition;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::ControllerError;
use crate::error::Result;

/// Broker response to a stop-replica command, delivered asynchronously.
#[derive(Debug, Clone)]
pub struct StopReplicaResponse {
    pub replica: PartitionReplica,
    /// `None` on success, otherwise the broker-reported failure.
    pub error: Option<String>,
}

/// Invoked by the transport when a delete-partition stop-replica command is
/// answered. Handlers re-enter the controller event loop; they must not call
/// back into the state machine directly.
pub type StopReplicaCallback = Arc<dyn Fn(StopReplicaResponse) + Send + Sync>;

/// One control request, before per-broker fan-out.
#[derive(Clone)]
pub enum ControlRequest {
    LeaderAndIsr {
        partition: TopicPartition,
        leadership: LeaderIsrAndControllerEpoch,
        replica_assignment: Vec<i32>,
        is_new_replica: bool,
    },
    StopReplica {
        partition: TopicPartition,
        delete_partition: bool,
        callback: Option<StopReplicaCallback>,
    },
}

impl fmt::Debug for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRequest::LeaderAndIsr {
                partition,
                leadership,
                replica_assignment,
                is_new_replica,
            } => f
                .debug_struct("LeaderAndIsr")
                .field("partition", partition)
                .field("leadership", leadership)
                .field("replica_assignment", replica_assignment)
                .field("is_new_replica", is_new_replica)
                .finish(),
            ControlRequest::StopReplica {
                partition,
                delete_partition,
                callback,
            } => f
                .debug_struct("StopReplica")
                .field("partition", partition)
                .field("delete_partition", delete_partition)
                .field("has_callback", &callback.is_some())
                .finish(),
        }
    }
}

/// A control request addressed to one broker, stamped with the controller
/// epoch in force when the batch was flushed.
#[derive(Debug, Clone)]
pub struct ControlRequestEnvelope {
    pub broker_id: i32,
    pub controller_epoch: i32,
    pub request: ControlRequest,
}

/// Accumulates control requests during one state-machine operation and
/// flushes them to the brokers in a single pass.
#[async_trait]
pub trait BrokerRequestBatch: Send {
    /// Reset for a new operation. Any unsent requests are discarded.
    fn new_batch(&mut self);

    fn add_leader_and_isr_request(
        &mut self,
        broker_ids: &[i32],
        partition: &TopicPartition,
        leadership: &LeaderIsrAndControllerEpoch,
        replica_assignment: &[i32],
        is_new_replica: bool,
    );

    fn add_stop_replica_request(
        &mut self,
        broker_ids: &[i32],
        partition: &TopicPartition,
        delete_partition: bool,
        callback: Option<StopReplicaCallback>,
    );

    /// Flush everything accumulated since `new_batch`, tagged with the
    /// given controller epoch.
    async fn send_requests_to_brokers(&mut self, controller_epoch: i32) -> Result<()>;
}

/// Batch implementation that fans requests out per recipient broker onto an
/// unbounded channel drained by the broker RPC pool. Integration tests drain
/// the receiver directly.
pub struct QueuedBrokerRequestBatch {
    pending: Vec<(Vec<i32>, ControlRequest)>,
    sink: mpsc::UnboundedSender<ControlRequestEnvelope>,
}

impl QueuedBrokerRequestBatch {
    pub fn new(sink: mpsc::UnboundedSender<ControlRequestEnvelope>) -> Self {
        Self {
            pending: Vec::new(),
            sink,
        }
    }

    /// Batch plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControlRequestEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl BrokerRequestBatch for QueuedBrokerRequestBatch {
    fn new_batch(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                dropped = self.pending.len(),
                "new batch opened over unsent requests"
            );
            self.pending.clear();
        }
    }

    fn add_leader_and_isr_request(
        &mut self,
        broker_ids: &[i32],
        partition: &TopicPartition,
        leadership: &LeaderIsrAndControllerEpoch,
        replica_assignment: &[i32],
        is_new_replica: bool,
    ) {
        self.pending.push((
            broker_ids.to_vec(),
            ControlRequest::LeaderAndIsr {
                partition: partition.clone(),
                leadership: leadership.clone(),
                replica_assignment: replica_assignment.to_vec(),
                is_new_replica,
            },
        ));
    }

    fn add_stop_replica_request(
        &mut self,
        broker_ids: &[i32],
        partition: &TopicPartition,
        delete_partition: bool,
        callback: Option<StopReplicaCallback>,
    ) {
        self.pending.push((
            broker_ids.to_vec(),
            ControlRequest::StopReplica {
                partition: partition.clone(),
                delete_partition,
                callback,
            },
        ));
    }

    async fn send_requests_to_brokers(&mut self, controller_epoch: i32) -> Result<()> {
        for (brokers, request) in self.pending.drain(..) {
            for broker_id in brokers {
                self.sink
                    .send(ControlRequestEnvelope {
                        broker_id,
                        controller_epoch,
                        request: request.clone(),
                    })
                    .map_err(|e| ControllerError::BrokerRequestSend(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use heronmq_common::LeaderAndIsr;

    use super::*;

    fn leadership() -> LeaderIsrAndControllerEpoch {
        LeaderIsrAndControllerEpoch::new(LeaderAndIsr::new(1, vec![1, 2]), 7)
    }

    #[tokio::test]
    async fn nothing_is_sent_before_flush() {
        let (mut batch, mut rx) = QueuedBrokerRequestBatch::channel();
        batch.new_batch();
        batch.add_leader_and_isr_request(
            &[1],
            &TopicPartition::new("t", 0),
            &leadership(),
            &[1, 2],
            false,
        );
        assert!(rx.try_recv().is_err());

        batch.send_requests_to_brokers(7).await.unwrap();
        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.broker_id, 1);
        assert_eq!(envelope.controller_epoch, 7);
    }

    #[tokio::test]
    async fn flush_fans_out_per_recipient() {
        let (mut batch, mut rx) = QueuedBrokerRequestBatch::channel();
        batch.new_batch();
        batch.add_stop_replica_request(&[2, 3], &TopicPartition::new("t", 0), false, None);
        batch.send_requests_to_brokers(4).await.unwrap();

        let mut brokers = vec![rx.try_recv().unwrap().broker_id, rx.try_recv().unwrap().broker_id];
        brokers.sort_unstable();
        assert_eq!(brokers, vec![2, 3]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reopening_discards_unsent_requests() {
        let (mut batch, mut rx) = QueuedBrokerRequestBatch::channel();
        batch.new_batch();
        batch.add_stop_replica_request(&[1], &TopicPartition::new("t", 0), true, None);
        batch.new_batch();
        batch.send_requests_to_brokers(1).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_receiver_surfaces_send_error() {
        let (mut batch, rx) = QueuedBrokerRequestBatch::channel();
        drop(rx);
        batch.new_batch();
        batch.add_stop_replica_request(&[1], &TopicPartition::new("t", 0), false, None);
        let err = batch.send_requests_to_brokers(1).await.unwrap_err();
        assert!(matches!(err, ControllerError::BrokerRequestSend(_)));
    }
}
