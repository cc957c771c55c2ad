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

use cheetah_string::CheetahString;
use serde::Deserialize;
use serde::Serialize;

/// A single partition of a topic.
///
/// Ordering is by topic name, then partition index, which gives stable
/// iteration order wherever partitions are listed in logs or responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    topic: CheetahString,
    partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<CheetahString>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[inline]
    pub fn partition(&self) -> i32 {
        self.partition
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Identity of one copy of a partition hosted on one broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionReplica {
    topic_partition: TopicPartition,
    broker_id: i32,
}

impl PartitionReplica {
    pub fn new(topic_partition: TopicPartition, broker_id: i32) -> Self {
        Self {
            topic_partition,
            broker_id,
        }
    }

    #[inline]
    pub fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }

    #[inline]
    pub fn topic(&self) -> &str {
        self.topic_partition.topic()
    }

    #[inline]
    pub fn partition(&self) -> i32 {
        self.topic_partition.partition()
    }

    #[inline]
    pub fn broker_id(&self) -> i32 {
        self.broker_id
    }
}

impl fmt::Display for PartitionReplica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Topic={},Partition={},Replica={}]",
            self.topic_partition.topic(),
            self.topic_partition.partition(),
            self.broker_id
        )
    }
}
