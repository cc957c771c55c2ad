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

//! Topic-deletion policy consumed by the replica state machine.
//!
//! The deletion workflow itself lives elsewhere in the controller; the
//! state machine only asks whether a topic or partition is queued for
//! deletion, which changes how missing store state and follower
//! notifications are handled.

use std::collections::HashSet;

use cheetah_string::CheetahString;
use heronmq_common::TopicPartition;
use parking_lot::RwLock;

/// Queries answered by the topic-deletion workflow.
pub trait TopicDeletionPolicy: Send + Sync {
    fn is_topic_queued_for_deletion(&self, topic: &str) -> bool;

    fn is_partition_to_be_deleted(&self, partition: &TopicPartition) -> bool {
        self.is_topic_queued_for_deletion(partition.topic())
    }
}

/// Policy for embeddings without a deletion flow: nothing is ever deleted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTopicsQueued;

impl TopicDeletionPolicy for NoTopicsQueued {
    fn is_topic_queued_for_deletion(&self, _topic: &str) -> bool {
        false
    }
}

/// Set-backed policy fed by the deletion workflow.
#[derive(Debug, Default)]
pub struct DeletionTopics {
    topics: RwLock<HashSet<CheetahString>>,
}

impl DeletionTopics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, topic: impl Into<CheetahString>) {
        self.topics.write().insert(topic.into());
    }

    pub fn complete(&self, topic: &str) {
        self.topics.write().remove(topic);
    }
}

impl TopicDeletionPolicy for DeletionTopics {
    fn is_topic_queued_for_deletion(&self, topic: &str) -> bool {
        self.topics.read().contains(topic)
    }
}
