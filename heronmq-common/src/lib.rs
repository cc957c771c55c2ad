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

//! Shared cluster metadata types for HeronMQ.
//!
//! These types identify replicas across the cluster and carry the
//! per-partition leadership tuple that the controller and brokers agree on.

#![warn(rust_2018_idioms)]
#![warn(clippy::all)]

pub mod leader_and_isr;
pub mod topic_partition;

pub use leader_and_isr::LeaderAndIsr;
pub use leader_and_isr::LeaderIsrAndControllerEpoch;
pub use leader_and_isr::NO_LEADER;
pub use topic_partition::PartitionReplica;
pub use topic_partition::TopicPartition;
