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

//! Bulk partition-state reads with classification.

use std::collections::HashMap;

use heronmq_common::LeaderIsrAndControllerEpoch;
use heronmq_common::TopicPartition;
use tracing::debug;

use crate::error::ControllerError;
use crate::store::decode_partition_state;
use crate::store::CoordinationStore;
use crate::store::StateNodeResponseKind;

/// Classified outcome of a bulk partition-state read.
#[derive(Debug, Default)]
pub struct PartitionStateReadResult {
    /// Decodable state written by this controller epoch or an older one.
    pub found: HashMap<TopicPartition, LeaderIsrAndControllerEpoch>,
    /// No node, or an empty/undecodable payload.
    pub missing: Vec<TopicPartition>,
    /// Fetch failures and controller-epoch fencing.
    pub failed: HashMap<TopicPartition, ControllerError>,
}

/// Fetch authoritative leadership for `partitions` and classify the results.
///
/// A payload carrying a controller epoch greater than `controller_epoch`
/// means another controller has superseded us; that partition is failed with
/// [`ControllerError::ControllerMoved`]. If the bulk fetch itself fails,
/// every input partition is failed with the same cause.
pub async fn read_partition_states(
    store: &dyn CoordinationStore,
    controller_epoch: i32,
    partitions: &[TopicPartition],
) -> PartitionStateReadResult {
    let mut result = PartitionStateReadResult::default();
    if partitions.is_empty() {
        return result;
    }

    let responses = match store.get_partition_states(partitions).await {
        Ok(responses) => responses,
        Err(e) => {
            let cause = e.to_string();
            for partition in partitions {
                result
                    .failed
                    .insert(partition.clone(), ControllerError::Store(cause.clone()));
            }
            return result;
        }
    };

    for response in responses {
        let partition = response.partition;
        match response.kind {
            StateNodeResponseKind::Found { data, version } => {
                match decode_partition_state(&data, version) {
                    Ok(Some(state)) if state.controller_epoch > controller_epoch => {
                        result.failed.insert(
                            partition,
                            ControllerError::ControllerMoved {
                                current_epoch: controller_epoch,
                                store_epoch: state.controller_epoch,
                            },
                        );
                    }
                    Ok(Some(state)) => {
                        result.found.insert(partition, state);
                    }
                    Ok(None) => result.missing.push(partition),
                    Err(e) => {
                        debug!(%partition, error = %e, "undecodable partition state treated as missing");
                        result.missing.push(partition);
                    }
                }
            }
            StateNodeResponseKind::Missing => result.missing.push(partition),
            StateNodeResponseKind::Failed(e) => {
                result.failed.insert(partition, e);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use bytes::Bytes;
    use heronmq_common::LeaderAndIsr;

    use super::*;
    use crate::error::Result;
    use crate::store::encode_partition_state;
    use crate::store::StateNodeResponse;
    use crate::store::UpdateLeaderAndIsrResult;

    struct ScriptedStore {
        fail_fetch: bool,
        responses: Vec<(TopicPartition, StateNodeResponseKind)>,
    }

    #[async_trait]
    impl CoordinationStore for ScriptedStore {
        async fn get_partition_states(
            &self,
            _partitions: &[TopicPartition],
        ) -> Result<Vec<StateNodeResponse>> {
            if self.fail_fetch {
                return Err(ControllerError::Store("connection lost".into()));
            }
            Ok(self
                .responses
                .iter()
                .map(|(partition, kind)| StateNodeResponse {
                    partition: partition.clone(),
                    kind: match kind {
                        StateNodeResponseKind::Found { data, version } => {
                            StateNodeResponseKind::Found {
                                data: data.clone(),
                                version: *version,
                            }
                        }
                        StateNodeResponseKind::Missing => StateNodeResponseKind::Missing,
                        StateNodeResponseKind::Failed(e) => {
                            StateNodeResponseKind::Failed(ControllerError::Store(e.to_string()))
                        }
                    },
                })
                .collect())
        }

        async fn update_leader_and_isr(
            &self,
            _proposals: HashMap<TopicPartition, LeaderAndIsr>,
            _controller_epoch: i32,
        ) -> Result<UpdateLeaderAndIsrResult> {
            unimplemented!("not exercised by reader tests")
        }
    }

    fn tp(partition: i32) -> TopicPartition {
        TopicPartition::new("t", partition)
    }

    fn found(state: &LeaderAndIsr, controller_epoch: i32, version: i32) -> StateNodeResponseKind {
        StateNodeResponseKind::Found {
            data: encode_partition_state(state, controller_epoch).unwrap(),
            version,
        }
    }

    #[tokio::test]
    async fn classifies_found_missing_and_failed() {
        let state = LeaderAndIsr::new(1, vec![1, 2]);
        let store = ScriptedStore {
            fail_fetch: false,
            responses: vec![
                (tp(0), found(&state, 3, 8)),
                (tp(1), StateNodeResponseKind::Missing),
                (
                    tp(2),
                    StateNodeResponseKind::Failed(ControllerError::Store("io".into())),
                ),
                (
                    tp(3),
                    StateNodeResponseKind::Found {
                        data: Bytes::new(),
                        version: 0,
                    },
                ),
            ],
        };

        let result = read_partition_states(&store, 5, &[tp(0), tp(1), tp(2), tp(3)]).await;
        assert_eq!(result.found[&tp(0)].leader_and_isr.partition_epoch, 8);
        assert_eq!(result.missing, vec![tp(1), tp(3)]);
        assert!(matches!(result.failed[&tp(2)], ControllerError::Store(_)));
    }

    #[tokio::test]
    async fn newer_controller_epoch_is_fencing() {
        let state = LeaderAndIsr::new(1, vec![1]);
        let store = ScriptedStore {
            fail_fetch: false,
            responses: vec![(tp(0), found(&state, 6, 1))],
        };

        let result = read_partition_states(&store, 5, &[tp(0)]).await;
        assert!(result.found.is_empty());
        assert!(matches!(
            result.failed[&tp(0)],
            ControllerError::ControllerMoved {
                current_epoch: 5,
                store_epoch: 6
            }
        ));
    }

    #[tokio::test]
    async fn bulk_fetch_failure_fails_every_input() {
        let store = ScriptedStore {
            fail_fetch: true,
            responses: vec![],
        };
        let result = read_partition_states(&store, 5, &[tp(0), tp(1)]).await;
        assert_eq!(result.failed.len(), 2);
        assert!(result.found.is_empty());
        assert!(result.missing.is_empty());
    }
}
