//! Runtime-tunable checkpoint manager configuration (§6).

use std::time::Duration;

use crate::error::ManagerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointConfig {
    checkpoint_period_s: u64,
    checkpoint_max_items: usize,
    max_checkpoints: usize,
    item_count_rotation: bool,
    keep_closed_checkpoints: bool,
    enable_checkpoint_merge: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            checkpoint_period_s: 5,
            checkpoint_max_items: 500,
            max_checkpoints: 2,
            item_count_rotation: true,
            keep_closed_checkpoints: false,
            enable_checkpoint_merge: false,
        }
    }
}

impl CheckpointConfig {
    pub fn builder() -> CheckpointConfigBuilder {
        CheckpointConfigBuilder::default()
    }

    pub fn checkpoint_period(&self) -> Duration {
        Duration::from_secs(self.checkpoint_period_s)
    }

    pub fn checkpoint_max_items(&self) -> usize {
        self.checkpoint_max_items
    }

    pub fn max_checkpoints(&self) -> usize {
        self.max_checkpoints
    }

    pub fn item_count_rotation(&self) -> bool {
        self.item_count_rotation
    }

    pub fn keep_closed_checkpoints(&self) -> bool {
        self.keep_closed_checkpoints
    }

    pub fn enable_checkpoint_merge(&self) -> bool {
        self.enable_checkpoint_merge
    }

    fn validate(&self) -> Result<(), ManagerError> {
        if !(1..=3600).contains(&self.checkpoint_period_s) {
            return Err(ManagerError::InvalidConfig {
                reason: format!(
                    "checkpoint_period_s {} out of range [1, 3600]",
                    self.checkpoint_period_s
                ),
            });
        }
        if !(10..=50000).contains(&self.checkpoint_max_items) {
            return Err(ManagerError::InvalidConfig {
                reason: format!(
                    "checkpoint_max_items {} out of range [10, 50000]",
                    self.checkpoint_max_items
                ),
            });
        }
        if !(1..=5).contains(&self.max_checkpoints) {
            return Err(ManagerError::InvalidConfig {
                reason: format!(
                    "max_checkpoints {} out of range [1, 5]",
                    self.max_checkpoints
                ),
            });
        }
        Ok(())
    }
}

/// Builder that validates bounds once, at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckpointConfigBuilder {
    inner: CheckpointConfig,
}

impl CheckpointConfigBuilder {
    pub fn checkpoint_period_s(mut self, v: u64) -> Self {
        self.inner.checkpoint_period_s = v;
        self
    }

    pub fn checkpoint_max_items(mut self, v: usize) -> Self {
        self.inner.checkpoint_max_items = v;
        self
    }

    pub fn max_checkpoints(mut self, v: usize) -> Self {
        self.inner.max_checkpoints = v;
        self
    }

    pub fn item_count_rotation(mut self, v: bool) -> Self {
        self.inner.item_count_rotation = v;
        self
    }

    pub fn keep_closed_checkpoints(mut self, v: bool) -> Self {
        self.inner.keep_closed_checkpoints = v;
        self
    }

    pub fn enable_checkpoint_merge(mut self, v: bool) -> Self {
        self.inner.enable_checkpoint_merge = v;
        self
    }

    pub fn build(self) -> Result<CheckpointConfig, ManagerError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}
