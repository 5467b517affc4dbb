use crate::sensor::types::MixedColor;

pub const DEFAULT_STABLE_FRAMES: u32 = 3;

/// Result of feeding one raw decision into the [`Stabilizer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The candidate has not persisted long enough yet
    Pending { candidate: Option<MixedColor>, count: u32 },
    /// The decision held for at least `stable_frames` ticks (may be undecided)
    Confirmed(Option<MixedColor>),
}

impl Verdict {
    pub fn confirmed(&self) -> Option<Option<MixedColor>> {
        match self {
            Verdict::Confirmed(decision) => Some(*decision),
            Verdict::Pending { .. } => None,
        }
    }
}

/// Debounces raw per-tick decisions
#[derive(Debug, Clone)]
pub struct Stabilizer {
    stable_frames: u32,
    candidate: Option<MixedColor>,
    count: u32,
}

impl Stabilizer {
    pub fn new(stable_frames: u32) -> Self {
        Self { stable_frames: stable_frames.max(1), candidate: None, count: 0 }
    }

    pub fn observe(&mut self, decision: Option<MixedColor>) -> Verdict {
        if self.count > 0 && decision == self.candidate {
            self.count = self.count.saturating_add(1);
        } else {
            self.candidate = decision;
            self.count = 1;
        }

        if self.count >= self.stable_frames {
            Verdict::Confirmed(self.candidate)
        } else {
            Verdict::Pending { candidate: self.candidate, count: self.count }
        }
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_STABLE_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirms_after_stable_frames() {
        let mut stabilizer = Stabilizer::new(3);
        assert_eq!(stabilizer.observe(Some(MixedColor::Red)), Verdict::Pending { candidate: Some(MixedColor::Red), count: 1 });
        assert!(stabilizer.observe(Some(MixedColor::Red)).confirmed().is_none());
        assert_eq!(stabilizer.observe(Some(MixedColor::Red)), Verdict::Confirmed(Some(MixedColor::Red)));
        // Stays confirmed while unchanged
        assert_eq!(stabilizer.observe(Some(MixedColor::Red)), Verdict::Confirmed(Some(MixedColor::Red)));
    }

    #[test]
    fn resets_on_change() {
        let mut stabilizer = Stabilizer::new(3);
        stabilizer.observe(Some(MixedColor::Red));
        stabilizer.observe(Some(MixedColor::Red));
        assert_eq!(stabilizer.observe(Some(MixedColor::Blue)), Verdict::Pending { candidate: Some(MixedColor::Blue), count: 1 });
        stabilizer.observe(Some(MixedColor::Blue));
        assert_eq!(stabilizer.observe(Some(MixedColor::Blue)), Verdict::Confirmed(Some(MixedColor::Blue)));
    }

    #[test]
    fn undecided_can_be_confirmed() {
        let mut stabilizer = Stabilizer::new(2);
        stabilizer.observe(None);
        assert_eq!(stabilizer.observe(None), Verdict::Confirmed(None));
    }

    #[test]
    fn single_frame_confirms_immediately() {
        let mut stabilizer = Stabilizer::new(1);
        assert_eq!(stabilizer.observe(Some(MixedColor::Green)), Verdict::Confirmed(Some(MixedColor::Green)));
    }
}
