//! Engine readiness state and decode request tokens

use std::fmt;

/// Readiness derived from which buffers are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No base image; render is a no-op
    Empty,
    /// Base image without a map; render copies the base through
    ImageOnly,
    /// Base image and map; render performs full displacement sampling
    Ready,
}

impl EngineState {
    pub fn derive(has_base: bool, has_map: bool) -> Self {
        match (has_base, has_map) {
            (false, _) => EngineState::Empty,
            (true, false) => EngineState::ImageOnly,
            (true, true) => EngineState::Ready,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Empty => "empty",
            EngineState::ImageOnly => "image_only",
            EngineState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Buffer slot a set-operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    BaseImage,
    DisplacementMap,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Slot::BaseImage => "base_image",
            Slot::DisplacementMap => "displacement_map",
        };
        f.write_str(name)
    }
}

/// Monotonic request counters, one per slot
///
/// Every set-call issues a new token; a completion may only write its slot
/// while its token is still the latest one issued for that slot.
#[derive(Debug, Default)]
pub struct RequestTokens {
    base_image: u64,
    displacement_map: u64,
}

impl RequestTokens {
    /// Issue the next token for `slot`, superseding every earlier one
    pub fn issue(&mut self, slot: Slot) -> u64 {
        let counter = self.counter_mut(slot);
        *counter += 1;
        *counter
    }

    pub fn is_current(&self, slot: Slot, token: u64) -> bool {
        match slot {
            Slot::BaseImage => self.base_image == token,
            Slot::DisplacementMap => self.displacement_map == token,
        }
    }

    fn counter_mut(&mut self, slot: Slot) -> &mut u64 {
        match slot {
            Slot::BaseImage => &mut self.base_image,
            Slot::DisplacementMap => &mut self.displacement_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_derivation() {
        assert_eq!(EngineState::derive(false, false), EngineState::Empty);
        assert_eq!(EngineState::derive(false, true), EngineState::Empty);
        assert_eq!(EngineState::derive(true, false), EngineState::ImageOnly);
        assert_eq!(EngineState::derive(true, true), EngineState::Ready);
    }

    #[test]
    fn test_later_token_supersedes_earlier() {
        let mut tokens = RequestTokens::default();
        let first = tokens.issue(Slot::BaseImage);
        let second = tokens.issue(Slot::BaseImage);

        assert!(!tokens.is_current(Slot::BaseImage, first));
        assert!(tokens.is_current(Slot::BaseImage, second));
    }

    #[test]
    fn test_slots_are_independent() {
        let mut tokens = RequestTokens::default();
        let base = tokens.issue(Slot::BaseImage);
        tokens.issue(Slot::DisplacementMap);
        tokens.issue(Slot::DisplacementMap);

        assert!(tokens.is_current(Slot::BaseImage, base));
    }
}
