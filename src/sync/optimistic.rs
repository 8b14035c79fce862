/// Lifecycle of one optimistic mutation.
///
/// A store records `Pending` when it applies a change locally, then moves it to
/// `Confirmed` once the authoritative store accepted it or to `RolledBack` with
/// the state it fell back to.
#[derive(Debug, Clone, PartialEq)]
pub enum Optimistic<T> {
    Pending { base: T, local: T },
    Confirmed(T),
    RolledBack { attempted: T, restored: T },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimisticPhase {
    PendingLocal,
    Confirmed,
    RolledBack,
}

impl<T> Optimistic<T> {
    pub fn pending(base: T, local: T) -> Self {
        Self::Pending { base, local }
    }

    /// `Pending` becomes `Confirmed(local)`; settled values are returned as is.
    pub fn confirm(self) -> Self {
        match self {
            Self::Pending { local, .. } => Self::Confirmed(local),
            settled => settled,
        }
    }

    /// `Pending` becomes `RolledBack`; settled values are returned as is.
    pub fn roll_back(self, restored: T) -> Self {
        match self {
            Self::Pending { local, .. } => Self::RolledBack {
                attempted: local,
                restored,
            },
            settled => settled,
        }
    }

    pub fn phase(&self) -> OptimisticPhase {
        match self {
            Self::Pending { .. } => OptimisticPhase::PendingLocal,
            Self::Confirmed(_) => OptimisticPhase::Confirmed,
            Self::RolledBack { .. } => OptimisticPhase::RolledBack,
        }
    }

    /// The value a reader should see right now.
    pub fn current(&self) -> &T {
        match self {
            Self::Pending { local, .. } => local,
            Self::Confirmed(value) => value,
            Self::RolledBack { restored, .. } => restored,
        }
    }
}
