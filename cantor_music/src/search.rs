// Explicit decision stack for backtracking search.
//
// Both generators fill positions left to right. Each position gets a `Frame`
// holding its candidate list (already ordered or shuffled by the caller), a
// cursor, and a count of how many candidates have been drawn. The generator
// loop pops candidates off the top frame; on acceptance it pushes a frame for
// the next position, and when a frame runs dry (or spends its retry budget)
// the frame is popped, which is the backtrack.
//
// The stack also counts work: `steps` is the number of candidate checks the
// caller has charged, and `deepest` the furthest position any frame reached.
// Both feed `GenerateError::NoSolutionFound`.
//
// Used by harmony.rs (exhaustive, deterministic order) and counterpoint.rs
// (shuffled candidates, bounded retries, restarts).

/// One decision point: a position and its untried candidates.
#[derive(Debug, Clone)]
pub struct Frame<T> {
    pub position: usize,
    candidates: Vec<T>,
    cursor: usize,
}

impl<T: Clone> Frame<T> {
    pub fn new(position: usize, candidates: Vec<T>) -> Self {
        Frame {
            position,
            candidates,
            cursor: 0,
        }
    }

    /// Draw the next untried candidate.
    pub fn next_candidate(&mut self) -> Option<T> {
        let candidate = self.candidates.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(candidate)
    }

    /// How many candidates have been drawn from this frame.
    pub fn attempts(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.candidates.len() - self.cursor
    }
}

/// A stack of frames plus work counters.
#[derive(Debug, Clone)]
pub struct SearchStack<T> {
    frames: Vec<Frame<T>>,
    pub steps: usize,
    pub deepest: usize,
}

impl<T: Clone> SearchStack<T> {
    pub fn new() -> Self {
        SearchStack {
            frames: Vec::new(),
            steps: 0,
            deepest: 0,
        }
    }

    pub fn push(&mut self, frame: Frame<T>) {
        self.deepest = self.deepest.max(frame.position);
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame<T>> {
        self.frames.pop()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame<T>> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Charge `n` candidate checks; returns false once `budget` is exceeded.
    pub fn charge(&mut self, n: usize, budget: usize) -> bool {
        self.steps += n;
        self.steps <= budget
    }
}

impl<T: Clone> Default for SearchStack<T> {
    fn default() -> Self {
        Self::new()
    }
}
