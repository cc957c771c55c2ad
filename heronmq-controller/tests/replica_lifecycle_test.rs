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

//! Replica lifecycle integration tests

use std::sync::Arc;

use heronmq_common::LeaderAndIsr;
use heronmq_common::LeaderIsrAndControllerEpoch;
use heronmq_common::PartitionReplica;
use heronmq_common::TopicPartition;
use heronmq_controller::batch::ControlRequest;
use heronmq_controller::batch::ControlRequestEnvelope;
use heronmq_controller::batch::QueuedBrokerRequestBatch;
use heronmq_controller::batch::StopReplicaCallback;
use heronmq_controller::batch::StopReplicaResponse;
use heronmq_controller::deletion::NoTopicsQueued;
use heronmq_controller::replica::Callbacks;
use heronmq_controller::store::InMemoryCoordinationStore;
use heronmq_controller::ControllerConfig;
use heronmq_controller::ControllerContext;
use heronmq_controller::ReplicaState;
use heronmq_controller::ReplicaStateMachine;
use tokio::sync::mpsc;

fn tp(partition: i32) -> TopicPartition {
    TopicPartition::new("t", partition)
}

fn replica(partition: i32, broker_id: i32) -> PartitionReplica {
    PartitionReplica::new(tp(partition), broker_id)
}

fn machine_with_store(
    store: Arc<InMemoryCoordinationStore>,
) -> (
    ReplicaStateMachine,
    mpsc::UnboundedReceiver<ControlRequestEnvelope>,
) {
    let (batch, rx) = QueuedBrokerRequestBatch::channel();
    let machine = ReplicaStateMachine::new(
        Arc::new(ControllerConfig::test_config()),
        store,
        Arc::new(NoTopicsQueued),
        Box::new(batch),
    );
    (machine, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ControlRequestEnvelope>) -> Vec<ControlRequestEnvelope> {
    let mut envelopes = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        envelopes.push(envelope);
    }
    envelopes
}

#[tokio::test]
async fn fresh_startup_brings_live_replicas_online() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let (mut machine, mut rx) = machine_with_store(store);
    let mut ctx = ControllerContext::new(1);
    ctx.set_partition_assignment(tp(0), vec![1, 2, 3]);
    for broker in [1, 2, 3] {
        ctx.add_live_broker(broker);
    }

    machine.startup(&mut ctx).await;

    for broker in [1, 2, 3] {
        assert_eq!(
            machine.replica_state(&replica(0, broker)),
            ReplicaState::Online
        );
    }
    assert_eq!(machine.replicas_in_state("t", ReplicaState::Online).len(), 3);
    // No leadership is known yet, so nothing is announced to the brokers.
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn startup_with_known_leadership_announces_to_each_replica() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let (mut machine, mut rx) = machine_with_store(store);
    let mut ctx = ControllerContext::new(5);
    ctx.set_partition_assignment(tp(0), vec![1, 2, 3]);
    for broker in [1, 2, 3] {
        ctx.add_live_broker(broker);
    }
    ctx.put_partition_leadership(
        tp(0),
        LeaderIsrAndControllerEpoch::new(LeaderAndIsr::new(1, vec![1, 2, 3]), 5),
    );

    machine.startup(&mut ctx).await;

    let envelopes = drain(&mut rx);
    let mut recipients: Vec<i32> = envelopes
        .iter()
        .map(|envelope| {
            assert_eq!(envelope.controller_epoch, 5);
            match &envelope.request {
                ControlRequest::LeaderAndIsr { is_new_replica, .. } => {
                    assert!(!*is_new_replica);
                    envelope.broker_id
                }
                other => panic!("unexpected request {other:?}"),
            }
        })
        .collect();
    recipients.sort_unstable();
    assert_eq!(recipients, vec![1, 2, 3]);
}

#[tokio::test]
async fn full_lifecycle_round_trip() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let state = LeaderAndIsr {
        leader: 2,
        leader_epoch: 5,
        isr: vec![1, 2],
        partition_epoch: 3,
    };
    store.seed_partition_state(tp(0), &state, 9).unwrap();

    let (mut machine, mut rx) = machine_with_store(store.clone());
    let mut ctx = ControllerContext::new(9);
    ctx.set_partition_assignment(tp(0), vec![2]);
    ctx.add_live_broker(1);
    ctx.add_live_broker(2);
    ctx.put_partition_leadership(tp(0), LeaderIsrAndControllerEpoch::new(state, 9));

    let target = replica(0, 1);

    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::New)
        .await;
    assert!(machine
        .replicas_in_state("t", ReplicaState::New)
        .contains(&target));

    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::Online)
        .await;
    assert!(machine
        .replicas_in_state("t", ReplicaState::Online)
        .contains(&target));
    // New -> Online is the commit point into the assignment.
    assert_eq!(ctx.partition_replica_assignment(&tp(0)), &[2, 1]);

    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::Offline)
        .await;
    assert!(machine
        .replicas_in_state("t", ReplicaState::Offline)
        .contains(&target));
    let stored = store.partition_state(&tp(0)).unwrap().leader_and_isr;
    assert_eq!(stored.leader, 2);
    assert_eq!(stored.isr, vec![2]);

    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::DeletionStarted)
        .await;
    assert!(machine.is_at_least_one_replica_in_deletion_started_state("t"));

    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::DeletionSuccessful)
        .await;
    assert!(machine
        .replicas_in_state("t", ReplicaState::DeletionSuccessful)
        .contains(&target));

    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::NonExistent)
        .await;
    assert_eq!(machine.replica_state(&target), ReplicaState::NonExistent);
    assert!(machine
        .replicas_in_state("t", ReplicaState::DeletionSuccessful)
        .is_empty());
    assert_eq!(ctx.partition_replica_assignment(&tp(0)), &[2]);

    drain(&mut rx);
}

#[tokio::test]
async fn deletion_happy_path_drives_terminal_states_through_callback() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let (mut machine, mut rx) = machine_with_store(store);
    let mut ctx = ControllerContext::new(2);
    ctx.set_partition_assignment(tp(0), vec![1]);
    ctx.add_live_broker(1);

    let target = replica(0, 1);
    machine.startup(&mut ctx).await;
    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::Offline)
        .await;
    drain(&mut rx);

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let callback: StopReplicaCallback = Arc::new(move |response: StopReplicaResponse| {
        done_tx.send(response).unwrap();
    });
    machine
        .handle_state_changes_with_callbacks(
            &mut ctx,
            &[target.clone()],
            ReplicaState::DeletionStarted,
            Callbacks::on_stop_replica_response(callback),
        )
        .await;
    assert_eq!(
        machine.replica_state(&target),
        ReplicaState::DeletionStarted
    );

    // The transport answers the delete command; the attached callback fires
    // and its handler re-enters the event loop with the terminal targets.
    let envelopes = drain(&mut rx);
    let delivered = envelopes
        .iter()
        .find_map(|envelope| match &envelope.request {
            ControlRequest::StopReplica {
                delete_partition: true,
                callback: Some(callback),
                ..
            } => Some(callback.clone()),
            _ => None,
        })
        .expect("delete command must carry the callback");
    (delivered.as_ref())(StopReplicaResponse {
        replica: target.clone(),
        error: None,
    });
    let response = done_rx.try_recv().unwrap();
    assert!(response.error.is_none());

    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::DeletionSuccessful)
        .await;
    machine
        .handle_state_changes(&mut ctx, &[target.clone()], ReplicaState::NonExistent)
        .await;
    assert_eq!(machine.replica_state(&target), ReplicaState::NonExistent);
    assert!(ctx.partition_replica_assignment(&tp(0)).is_empty());
}

#[tokio::test]
async fn empty_input_opens_no_batch() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let (mut machine, mut rx) = machine_with_store(store);
    let mut ctx = ControllerContext::new(1);

    machine
        .handle_state_changes(&mut ctx, &[], ReplicaState::Online)
        .await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn new_replica_rejected_when_broker_is_already_leader() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let (mut machine, mut rx) = machine_with_store(store);
    let mut ctx = ControllerContext::new(4);
    ctx.set_partition_assignment(tp(0), vec![1, 2]);
    ctx.put_partition_leadership(
        tp(0),
        LeaderIsrAndControllerEpoch::new(LeaderAndIsr::new(1, vec![1, 2]), 4),
    );

    machine
        .handle_state_changes(&mut ctx, &[replica(0, 1)], ReplicaState::New)
        .await;

    assert_eq!(machine.replica_state(&replica(0, 1)), ReplicaState::NonExistent);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn offline_without_leadership_still_stops_the_replica() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let (mut machine, mut rx) = machine_with_store(store);
    let mut ctx = ControllerContext::new(3);
    ctx.set_partition_assignment(tp(0), vec![1, 2]);
    ctx.add_live_broker(1);
    ctx.add_live_broker(2);

    machine.startup(&mut ctx).await;
    drain(&mut rx);

    machine
        .handle_state_changes(&mut ctx, &[replica(0, 1)], ReplicaState::Offline)
        .await;

    assert_eq!(machine.replica_state(&replica(0, 1)), ReplicaState::Offline);
    let envelopes = drain(&mut rx);
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].broker_id, 1);
    assert!(matches!(
        envelopes[0].request,
        ControlRequest::StopReplica {
            delete_partition: false,
            ..
        }
    ));
}
