use crate::error::RecordError;

/// Usage state of a back buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferState {
    /// Owned by the presentation engine.
    Present,
    /// Writable as a color attachment.
    RenderTarget,
}

/// A recorded state transition of one back buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ResourceBarrier {
    pub back_buffer: usize,
    pub before: BufferState,
    pub after: BufferState,
}

/// Tracks the state of every back buffer in the swap chain.
///
/// States advance at record time. A barrier is only accepted when its `before`
/// state matches what the set currently holds for that buffer.
#[derive(Debug, Clone)]
pub struct BackBufferSet {
    states: Vec<BufferState>,
}

impl BackBufferSet {
    /// Creates `count` buffers, all in [`BufferState::Present`].
    pub fn new(count: usize) -> Self {
        debug_assert!(count > 0);
        Self {
            states: vec![BufferState::Present; count],
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, index: usize) -> Option<BufferState> {
        self.states.get(index).copied()
    }

    pub fn all_presentable(&self) -> bool {
        self.states.iter().all(|s| *s == BufferState::Present)
    }

    /// Validates and applies a transition, returning the barrier to record.
    pub fn transition(
        &mut self,
        index: usize,
        before: BufferState,
        after: BufferState,
    ) -> Result<ResourceBarrier, RecordError> {
        let count = self.states.len();
        let slot = self
            .states
            .get_mut(index)
            .ok_or(RecordError::BackBufferOutOfRange { index, count })?;

        if *slot != before {
            return Err(RecordError::IllegalTransition {
                index,
                expected: before,
                actual: *slot,
            });
        }

        *slot = after;
        Ok(ResourceBarrier {
            back_buffer: index,
            before,
            after,
        })
    }

    /// Fails unless `index` is currently a render target.
    pub fn require_render_target(
        &self,
        index: usize,
        action: &'static str,
    ) -> Result<(), RecordError> {
        match self.state(index) {
            Some(BufferState::RenderTarget) => Ok(()),
            Some(_) => Err(RecordError::NotRenderTarget { index, action }),
            None => Err(RecordError::BackBufferOutOfRange {
                index,
                count: self.states.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_set_is_presentable() {
        let set = BackBufferSet::new(2);
        assert_eq!(set.len(), 2);
        assert!(set.all_presentable());
    }

    #[test]
    fn transition_round_trip() {
        let mut set = BackBufferSet::new(2);

        let b = set
            .transition(1, BufferState::Present, BufferState::RenderTarget)
            .unwrap();
        assert_eq!(b.back_buffer, 1);
        assert_eq!(set.state(1), Some(BufferState::RenderTarget));
        assert_eq!(set.state(0), Some(BufferState::Present));

        set.transition(1, BufferState::RenderTarget, BufferState::Present)
            .unwrap();
        assert!(set.all_presentable());
    }

    #[test]
    fn rejects_transition_from_wrong_state() {
        let mut set = BackBufferSet::new(2);
        let err = set
            .transition(0, BufferState::RenderTarget, BufferState::Present)
            .unwrap_err();
        assert_eq!(
            err,
            RecordError::IllegalTransition {
                index: 0,
                expected: BufferState::RenderTarget,
                actual: BufferState::Present,
            }
        );
        // Rejected barriers leave the state untouched.
        assert_eq!(set.state(0), Some(BufferState::Present));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mut set = BackBufferSet::new(2);
        let err = set
            .transition(2, BufferState::Present, BufferState::RenderTarget)
            .unwrap_err();
        assert_eq!(err, RecordError::BackBufferOutOfRange { index: 2, count: 2 });
    }

    #[test]
    fn render_target_requirement() {
        let mut set = BackBufferSet::new(2);
        assert!(set.require_render_target(0, "cleared").is_err());
        set.transition(0, BufferState::Present, BufferState::RenderTarget)
            .unwrap();
        assert!(set.require_render_target(0, "cleared").is_ok());
    }
}
