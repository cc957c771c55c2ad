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

//! # ReplicaStateMachine
//!
//! Tracks the lifecycle state of every replica in the cluster and drives
//! transitions between legal states. Moving replicas to a target state
//! validates each transition, enqueues the broker control requests the
//! transition implies, updates the in-memory state table, and for offline
//! transitions rewrites the in-sync replica set in the coordination store
//! via compare-and-swap.
//!
//! Every method is called from the controller's serial event loop; the
//! state table has a single writer and is never locked. Errors never abort
//! a batch call: invalid and failed transitions are logged, the remaining
//! replicas proceed, and the request batch is still flushed.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use heronmq_common::LeaderIsrAndControllerEpoch;
use heronmq_common::PartitionReplica;
use heronmq_common::TopicPartition;
use heronmq_common::NO_LEADER;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

use crate::batch::BrokerRequestBatch;
use crate::batch::StopReplicaCallback;
use crate::config::ControllerConfig;
use crate::context::ControllerContext;
use crate::deletion::TopicDeletionPolicy;
use crate::error::ControllerError;
use crate::replica::state::ReplicaState;
use crate::store::read_partition_states;
use crate::store::CoordinationStore;

/// Completion hooks attached to the control requests of one call.
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Delivered with delete-partition stop-replica commands; invoked when
    /// the broker responds.
    pub stop_replica_response: Option<StopReplicaCallback>,
}

impl Callbacks {
    pub fn on_stop_replica_response(callback: StopReplicaCallback) -> Self {
        Self {
            stop_replica_response: Some(callback),
        }
    }
}

/// The controller's per-replica state table and transition executor.
pub struct ReplicaStateMachine {
    config: Arc<ControllerConfig>,
    store: Arc<dyn CoordinationStore>,
    deletion_policy: Arc<dyn TopicDeletionPolicy>,
    batch: Box<dyn BrokerRequestBatch>,
    replica_states: HashMap<PartitionReplica, ReplicaState>,
}

impl ReplicaStateMachine {
    pub fn new(
        config: Arc<ControllerConfig>,
        store: Arc<dyn CoordinationStore>,
        deletion_policy: Arc<dyn TopicDeletionPolicy>,
        batch: Box<dyn BrokerRequestBatch>,
    ) -> Self {
        Self {
            config,
            store,
            deletion_policy,
            batch,
            replica_states: HashMap::new(),
        }
    }

    /// Seed the state table from the current assignment and broker
    /// liveness, then drive every online replica to `Online`.
    ///
    /// Called on winning controller election. Replicas on dead brokers are
    /// seeded as `DeletionIneligible` so a topic mid-deletion is not
    /// retried against an unreachable broker but stays remembered.
    pub async fn startup(&mut self, ctx: &mut ControllerContext) {
        info!(cluster = %self.config.cluster_name, "initializing replica state");
        self.initialize_replica_state(ctx);
        debug!(states = ?self.replica_states, "initial replica state table");

        let online: Vec<PartitionReplica> = ctx
            .all_replicas()
            .into_iter()
            .filter(|replica| ctx.is_replica_online(replica.broker_id(), replica.topic_partition()))
            .collect();
        info!(
            online_replicas = online.len(),
            "started replica state machine"
        );
        self.handle_state_changes(ctx, &online, ReplicaState::Online)
            .await;
    }

    /// Drop all tracked state. No store access, no broker requests.
    pub fn shutdown(&mut self) {
        self.replica_states.clear();
        info!("stopped replica state machine");
    }

    fn initialize_replica_state(&mut self, ctx: &ControllerContext) {
        for replica in ctx.all_replicas() {
            let state = if ctx.is_replica_online(replica.broker_id(), replica.topic_partition()) {
                ReplicaState::Online
            } else {
                ReplicaState::DeletionIneligible
            };
            self.replica_states.insert(replica, state);
        }
    }

    /// Move `replicas` to `target_state`, with no completion hooks.
    pub async fn handle_state_changes(
        &mut self,
        ctx: &mut ControllerContext,
        replicas: &[PartitionReplica],
        target_state: ReplicaState,
    ) {
        self.handle_state_changes_with_callbacks(ctx, replicas, target_state, Callbacks::default())
            .await;
    }

    /// Move `replicas` to `target_state`.
    ///
    /// Opens a fresh request batch, applies the target-specific action for
    /// each replica grouped by owning broker, and flushes the batch exactly
    /// once, tagged with the controller epoch observed at entry. An empty
    /// input is a no-op and opens no batch.
    pub async fn handle_state_changes_with_callbacks(
        &mut self,
        ctx: &mut ControllerContext,
        replicas: &[PartitionReplica],
        target_state: ReplicaState,
        callbacks: Callbacks,
    ) {
        if replicas.is_empty() {
            return;
        }

        self.batch.new_batch();
        let mut by_broker: HashMap<i32, Vec<PartitionReplica>> = HashMap::new();
        for replica in replicas {
            by_broker
                .entry(replica.broker_id())
                .or_default()
                .push(replica.clone());
        }
        for (broker_id, broker_replicas) in by_broker {
            self.do_handle_state_changes(ctx, broker_id, &broker_replicas, target_state, &callbacks)
                .await;
        }

        if let Err(e) = self.batch.send_requests_to_brokers(ctx.epoch()).await {
            error!(error = %e, target = %target_state, "failed to flush control requests to brokers");
        }
    }

    async fn do_handle_state_changes(
        &mut self,
        ctx: &mut ControllerContext,
        broker_id: i32,
        replicas: &[PartitionReplica],
        target_state: ReplicaState,
        callbacks: &Callbacks,
    ) {
        // A replica never seen before validates as NonExistent; the default
        // is materialized so the query surface observes the attempt.
        for replica in replicas {
            self.replica_states
                .entry(replica.clone())
                .or_insert(ReplicaState::NonExistent);
        }
        let (valid, invalid): (Vec<&PartitionReplica>, Vec<&PartitionReplica>) = replicas
            .iter()
            .partition(|replica| target_state.is_valid_transition_from(self.replica_state(replica)));
        for replica in invalid {
            self.log_invalid_transition(replica, target_state);
        }

        match target_state {
            ReplicaState::New => {
                for replica in valid {
                    let partition = replica.topic_partition().clone();
                    match ctx.partition_leadership(&partition).cloned() {
                        Some(leadership) => {
                            if leadership.leader_and_isr.leader == broker_id {
                                let cause = ControllerError::StateChangeFailed(format!(
                                    "replica {replica} is already the leader for {partition}"
                                ));
                                self.log_failed_state_change(replica, target_state, &cause);
                                continue;
                            }
                            let assignment = ctx.partition_replica_assignment(&partition).to_vec();
                            self.batch.add_leader_and_isr_request(
                                &[broker_id],
                                &partition,
                                &leadership,
                                &assignment,
                                true,
                            );
                            self.transition(replica.clone(), target_state);
                        }
                        // Nothing to announce yet; the replica becomes
                        // visible to brokers once leadership exists.
                        None => self.transition(replica.clone(), target_state),
                    }
                }
            }
            ReplicaState::Online => {
                for replica in valid {
                    let partition = replica.topic_partition().clone();
                    match self.replica_state(replica) {
                        // Commit point of a reassignment: the replica joins
                        // the partition's assignment.
                        ReplicaState::New => {
                            ctx.add_replica_to_assignment(&partition, broker_id);
                        }
                        _ => {
                            if let Some(leadership) = ctx.partition_leadership(&partition).cloned()
                            {
                                let assignment =
                                    ctx.partition_replica_assignment(&partition).to_vec();
                                self.batch.add_leader_and_isr_request(
                                    &[broker_id],
                                    &partition,
                                    &leadership,
                                    &assignment,
                                    false,
                                );
                            }
                        }
                    }
                    self.transition(replica.clone(), target_state);
                }
            }
            ReplicaState::Offline => {
                for replica in &valid {
                    self.batch.add_stop_replica_request(
                        &[broker_id],
                        replica.topic_partition(),
                        false,
                        None,
                    );
                }

                let (with_leadership, without_leadership): (
                    Vec<&PartitionReplica>,
                    Vec<&PartitionReplica>,
                ) = valid.into_iter().partition(|replica| {
                    ctx.partition_leadership(replica.topic_partition()).is_some()
                });
                let partitions: Vec<TopicPartition> = with_leadership
                    .iter()
                    .map(|replica| replica.topic_partition().clone())
                    .collect();

                let updated = self.remove_replicas_from_isr(ctx, broker_id, partitions).await;
                for (partition, leadership) in updated {
                    if !self.deletion_policy.is_partition_to_be_deleted(&partition) {
                        let assignment = ctx.partition_replica_assignment(&partition).to_vec();
                        let recipients: Vec<i32> = assignment
                            .iter()
                            .copied()
                            .filter(|&id| id != broker_id && ctx.is_broker_live(id))
                            .collect();
                        self.batch.add_leader_and_isr_request(
                            &recipients,
                            &partition,
                            &leadership,
                            &assignment,
                            false,
                        );
                    }
                    self.transition(PartitionReplica::new(partition, broker_id), target_state);
                }

                // No cached leadership to adjust; the stop request above is
                // still in the batch.
                for replica in without_leadership {
                    self.transition(replica.clone(), target_state);
                }
            }
            ReplicaState::DeletionStarted => {
                for replica in valid {
                    self.transition(replica.clone(), target_state);
                    self.batch.add_stop_replica_request(
                        &[broker_id],
                        replica.topic_partition(),
                        true,
                        callbacks.stop_replica_response.clone(),
                    );
                }
            }
            ReplicaState::DeletionSuccessful | ReplicaState::DeletionIneligible => {
                for replica in valid {
                    self.transition(replica.clone(), target_state);
                }
            }
            ReplicaState::NonExistent => {
                for replica in valid {
                    ctx.remove_replica_from_assignment(replica.topic_partition(), broker_id);
                    let from = self
                        .replica_states
                        .remove(replica)
                        .unwrap_or(ReplicaState::NonExistent);
                    trace!(
                        replica = %replica,
                        from = %from,
                        to = %target_state,
                        "replica state change"
                    );
                }
            }
        }
    }

    /// Remove `broker_id` from the ISR of every given partition via
    /// compare-and-swap against the store, retrying version conflicts.
    ///
    /// Partitions in the returned map have had their ISR rewritten (or
    /// already excluded the broker) and the cached leadership refreshed.
    /// If the broker led the partition the new leader is [`NO_LEADER`]; a
    /// sole-member ISR is kept as-is rather than emptied. Partitions with
    /// no state in the store are reported as failed state changes unless
    /// their topic is queued for deletion.
    async fn remove_replicas_from_isr(
        &mut self,
        ctx: &mut ControllerContext,
        broker_id: i32,
        partitions: Vec<TopicPartition>,
    ) -> HashMap<TopicPartition, LeaderIsrAndControllerEpoch> {
        let mut results = HashMap::new();
        let mut remaining = partitions;

        while !remaining.is_empty() {
            let read = read_partition_states(self.store.as_ref(), ctx.epoch(), &remaining).await;
            for (partition, cause) in read.failed {
                let replica = PartitionReplica::new(partition, broker_id);
                self.log_failed_state_change(&replica, ReplicaState::Offline, &cause);
            }
            for partition in read.missing {
                if !self
                    .deletion_policy
                    .is_topic_queued_for_deletion(partition.topic())
                {
                    let cause = ControllerError::StateNodeMissing(partition.clone());
                    let replica = PartitionReplica::new(partition, broker_id);
                    self.log_failed_state_change(&replica, ReplicaState::Offline, &cause);
                }
            }

            let mut proposals = HashMap::new();
            for (partition, state) in read.found {
                let leader_and_isr = &state.leader_and_isr;
                if !leader_and_isr.is_in_isr(broker_id) {
                    // Already out of the ISR; the freshly read state still
                    // refreshes the cache.
                    ctx.put_partition_leadership(partition.clone(), state.clone());
                    results.insert(partition, state);
                    continue;
                }
                let new_leader = if leader_and_isr.leader == broker_id {
                    NO_LEADER
                } else {
                    leader_and_isr.leader
                };
                // A sole-member ISR is never emptied; the last copy of the
                // data stays eligible for re-election.
                let new_isr = if leader_and_isr.isr.len() == 1 {
                    leader_and_isr.isr.clone()
                } else {
                    leader_and_isr
                        .isr
                        .iter()
                        .copied()
                        .filter(|&id| id != broker_id)
                        .collect()
                };
                proposals.insert(partition, leader_and_isr.new_leader_and_isr(new_leader, new_isr));
            }
            if proposals.is_empty() {
                break;
            }

            let proposal_partitions: Vec<TopicPartition> = proposals.keys().cloned().collect();
            let update = match self
                .store
                .update_leader_and_isr(proposals, ctx.epoch())
                .await
            {
                Ok(update) => update,
                Err(e) => {
                    let cause = ControllerError::Store(e.to_string());
                    for partition in proposal_partitions {
                        let replica = PartitionReplica::new(partition, broker_id);
                        self.log_failed_state_change(&replica, ReplicaState::Offline, &cause);
                    }
                    break;
                }
            };

            for (partition, cause) in update.failed {
                let replica = PartitionReplica::new(partition, broker_id);
                self.log_failed_state_change(&replica, ReplicaState::Offline, &cause);
            }
            for (partition, stored) in update.finished {
                let leadership = LeaderIsrAndControllerEpoch::new(stored, ctx.epoch());
                ctx.put_partition_leadership(partition.clone(), leadership.clone());
                results.insert(partition, leadership);
            }

            remaining = update.to_retry;
            if !remaining.is_empty() && self.config.isr_update_retry_backoff_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.isr_update_retry_backoff_ms))
                    .await;
            }
        }

        results
    }

    // ---- query surface ----

    /// Current state of a replica; `NonExistent` when untracked.
    pub fn replica_state(&self, replica: &PartitionReplica) -> ReplicaState {
        self.replica_states
            .get(replica)
            .copied()
            .unwrap_or(ReplicaState::NonExistent)
    }

    /// All tracked replicas of `topic` currently in `state`.
    pub fn replicas_in_state(&self, topic: &str, state: ReplicaState) -> HashSet<PartitionReplica> {
        self.replica_states
            .iter()
            .filter(|(replica, s)| replica.topic() == topic && **s == state)
            .map(|(replica, _)| replica.clone())
            .collect()
    }

    pub fn is_any_replica_in_state(&self, topic: &str, state: ReplicaState) -> bool {
        self.replica_states
            .iter()
            .any(|(replica, s)| replica.topic() == topic && *s == state)
    }

    /// Whether every tracked replica of `topic` is in `state`. False when
    /// the topic has no tracked replicas.
    pub fn are_all_replicas_for_topic_in_state(&self, topic: &str, state: ReplicaState) -> bool {
        let mut seen = false;
        for (replica, s) in &self.replica_states {
            if replica.topic() == topic {
                if *s != state {
                    return false;
                }
                seen = true;
            }
        }
        seen
    }

    pub fn is_at_least_one_replica_in_deletion_started_state(&self, topic: &str) -> bool {
        self.is_any_replica_in_state(topic, ReplicaState::DeletionStarted)
    }

    // ---- transition bookkeeping ----

    fn transition(&mut self, replica: PartitionReplica, target: ReplicaState) {
        let from = self
            .replica_states
            .insert(replica.clone(), target)
            .unwrap_or(ReplicaState::NonExistent);
        trace!(replica = %replica, from = %from, to = %target, "replica state change");
    }

    fn log_invalid_transition(&self, replica: &PartitionReplica, target: ReplicaState) {
        let cause = ControllerError::InvalidStateTransition {
            replica: replica.clone(),
            from: self.replica_state(replica),
            to: target,
        };
        self.log_failed_state_change(replica, target, &cause);
    }

    fn log_failed_state_change(
        &self,
        replica: &PartitionReplica,
        target: ReplicaState,
        cause: &ControllerError,
    ) {
        error!(
            replica = %replica,
            from = %self.replica_state(replica),
            to = %target,
            error = %cause,
            "replica state change failed"
        );
    }
}
