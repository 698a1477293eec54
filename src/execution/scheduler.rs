//! Step cursor - decides which step runs next
//!
//! Steps run strictly in declaration order. The cursor only moves forward,
//! and once halted it yields nothing more, so no step after a fatal failure
//! can ever be handed out.

/// Forward-only position in a pipeline's step list
#[derive(Debug, Clone)]
pub struct StepCursor {
    position: usize,
    len: usize,
    halted: bool,
}

impl StepCursor {
    pub fn new(len: usize) -> Self {
        Self {
            position: 0,
            len,
            halted: false,
        }
    }

    /// Index of the next step to run
    pub fn next(&mut self) -> Option<usize> {
        if self.halted || self.position >= self.len {
            return None;
        }
        let index = self.position;
        self.position += 1;
        Some(index)
    }

    /// Stop handing out steps
    pub fn halt(&mut self) {
        self.halted = true;
    }
}
