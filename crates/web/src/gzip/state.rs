use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`GzipResponse`](crate::gzip::GzipResponse).
///
/// ```text
/// MightCompress --(eligible)--> Committing --> Compressing --> Finished
/// MightCompress --(ineligible)--> NotCompressing --> Finished
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionState {
    MightCompress = 0,
    NotCompressing = 1,
    Committing = 2,
    Compressing = 3,
    Finished = 4,
}

impl CompressionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CompressionState::MightCompress,
            1 => CompressionState::NotCompressing,
            2 => CompressionState::Committing,
            3 => CompressionState::Compressing,
            _ => CompressionState::Finished,
        }
    }
}

impl Display for CompressionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompressionState::MightCompress => "MIGHT_COMPRESS",
            CompressionState::NotCompressing => "NOT_COMPRESSING",
            CompressionState::Committing => "COMMITTING",
            CompressionState::Compressing => "COMPRESSING",
            CompressionState::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

/// An atomically updated [`CompressionState`].
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: CompressionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> CompressionState {
        CompressionState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: CompressionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves from `current` to `new`; on failure returns the actual state.
    pub fn compare_exchange(&self, current: CompressionState, new: CompressionState) -> Result<(), CompressionState> {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_previous| ())
            .map_err(CompressionState::from_u8)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(CompressionState::MightCompress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_exchange_only_from_expected() {
        let cell = StateCell::default();
        assert_eq!(cell.compare_exchange(CompressionState::MightCompress, CompressionState::Committing), Ok(()));
        assert_eq!(
            cell.compare_exchange(CompressionState::MightCompress, CompressionState::Committing),
            Err(CompressionState::Committing)
        );
        cell.set(CompressionState::Compressing);
        assert_eq!(cell.get(), CompressionState::Compressing);
        assert_eq!(cell.get().to_string(), "COMPRESSING");
    }
}
