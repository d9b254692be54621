//! Provider status transitions

use crate::models::deployment::ProviderStatus;

/// Validate moving a provider from `from` to `to`.
///
/// `up` is absorbing: completion may be applied from any state.
pub fn transition(from: ProviderStatus, to: ProviderStatus) -> Result<ProviderStatus, String> {
    use ProviderStatus::*;

    match (from, to) {
        (Pending, InProgress) | (InProgress, InProgress) => Ok(to),
        (Pending, Down) | (InProgress, Down) => Ok(Down),
        (_, Up) => Ok(Up),
        (from, to) => Err(format!("Invalid provider transition: {:?} -> {:?}", from, to)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProviderStatus::*;

    #[test]
    fn test_forward_transitions() {
        assert_eq!(transition(Pending, InProgress), Ok(InProgress));
        assert_eq!(transition(InProgress, InProgress), Ok(InProgress));
        assert_eq!(transition(InProgress, Down), Ok(Down));
        assert_eq!(transition(Pending, Up), Ok(Up));
        assert_eq!(transition(InProgress, Up), Ok(Up));
        assert_eq!(transition(Down, Up), Ok(Up));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(transition(Up, InProgress).is_err());
        assert!(transition(Up, Pending).is_err());
        assert!(transition(InProgress, Pending).is_err());
        assert!(transition(Down, InProgress).is_err());
        assert!(transition(Up, Down).is_err());
    }
}
