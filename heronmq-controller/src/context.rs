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

//! Cluster metadata cached by the elected controller.
//!
//! The context is owned by the controller event loop and handed to the
//! replica state machine by mutable reference; nothing here is shared
//! across threads.

use std::collections::HashMap;
use std::collections::HashSet;

use heronmq_common::LeaderIsrAndControllerEpoch;
use heronmq_common::PartitionReplica;
use heronmq_common::TopicPartition;

/// Controller-local view of assignments, leadership and broker liveness.
#[derive(Debug, Default)]
pub struct ControllerContext {
    epoch: i32,
    live_brokers: HashSet<i32>,
    /// Replicas on failed storage of an otherwise-live broker.
    offline_replicas: HashSet<PartitionReplica>,
    /// Ordered replica assignment per partition; the first entry is the
    /// preferred leader.
    partition_assignments: HashMap<TopicPartition, Vec<i32>>,
    partition_leadership: HashMap<TopicPartition, LeaderIsrAndControllerEpoch>,
}

impl ControllerContext {
    pub fn new(epoch: i32) -> Self {
        Self {
            epoch,
            ..Default::default()
        }
    }

    #[inline]
    pub fn epoch(&self) -> i32 {
        self.epoch
    }

    pub fn set_epoch(&mut self, epoch: i32) {
        self.epoch = epoch;
    }

    // ---- broker liveness ----

    pub fn add_live_broker(&mut self, broker_id: i32) {
        self.live_brokers.insert(broker_id);
    }

    pub fn remove_live_broker(&mut self, broker_id: i32) {
        self.live_brokers.remove(&broker_id);
    }

    pub fn live_broker_ids(&self) -> &HashSet<i32> {
        &self.live_brokers
    }

    pub fn is_broker_live(&self, broker_id: i32) -> bool {
        self.live_brokers.contains(&broker_id)
    }

    pub fn mark_replica_offline(&mut self, replica: PartitionReplica) {
        self.offline_replicas.insert(replica);
    }

    pub fn clear_offline_replica(&mut self, replica: &PartitionReplica) {
        self.offline_replicas.remove(replica);
    }

    /// A replica is online when its broker is live and its storage has not
    /// been reported failed.
    pub fn is_replica_online(&self, broker_id: i32, partition: &TopicPartition) -> bool {
        self.live_brokers.contains(&broker_id)
            && !self
                .offline_replicas
                .contains(&PartitionReplica::new(partition.clone(), broker_id))
    }

    // ---- assignment ----

    pub fn set_partition_assignment(&mut self, partition: TopicPartition, brokers: Vec<i32>) {
        self.partition_assignments.insert(partition, brokers);
    }

    /// Assigned brokers for a partition, empty if the partition is unknown.
    pub fn partition_replica_assignment(&self, partition: &TopicPartition) -> &[i32] {
        self.partition_assignments
            .get(partition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append a broker to a partition's assignment if not already present.
    pub fn add_replica_to_assignment(&mut self, partition: &TopicPartition, broker_id: i32) {
        let brokers = self
            .partition_assignments
            .entry(partition.clone())
            .or_default();
        if !brokers.contains(&broker_id) {
            brokers.push(broker_id);
        }
    }

    /// Drop a broker from a partition's assignment; removes the partition
    /// entirely once its assignment drains.
    pub fn remove_replica_from_assignment(&mut self, partition: &TopicPartition, broker_id: i32) {
        if let Some(brokers) = self.partition_assignments.get_mut(partition) {
            brokers.retain(|&id| id != broker_id);
            if brokers.is_empty() {
                self.partition_assignments.remove(partition);
            }
        }
    }

    pub fn all_partitions(&self) -> impl Iterator<Item = &TopicPartition> {
        self.partition_assignments.keys()
    }

    /// Every replica of every known partition, as identity triples.
    pub fn all_replicas(&self) -> Vec<PartitionReplica> {
        self.partition_assignments
            .iter()
            .flat_map(|(partition, brokers)| {
                brokers
                    .iter()
                    .map(|&broker_id| PartitionReplica::new(partition.clone(), broker_id))
            })
            .collect()
    }

    // ---- leadership cache ----

    pub fn partition_leadership(
        &self,
        partition: &TopicPartition,
    ) -> Option<&LeaderIsrAndControllerEpoch> {
        self.partition_leadership.get(partition)
    }

    pub fn put_partition_leadership(
        &mut self,
        partition: TopicPartition,
        leadership: LeaderIsrAndControllerEpoch,
    ) {
        self.partition_leadership.insert(partition, leadership);
    }

    pub fn remove_partition_leadership(&mut self, partition: &TopicPartition) {
        self.partition_leadership.remove(partition);
    }
}
