//! Channel lifecycle states.

/// State of the single logical channel.
///
/// Legal transitions:
/// - `Idle -> Connecting` (first `connect()`)
/// - `Connecting -> Open` (transport ready)
/// - `Connecting -> Closed` (transport could not be opened)
/// - `Open -> Closed` (transport closed or failed)
/// - `Closed -> Connecting` (reconnect or external `connect()`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl ChannelState {
    /// Whether `self -> next` is a legal edge.
    pub fn can_transition_to(self, next: ChannelState) -> bool {
        use ChannelState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Open)
                | (Connecting, Closed)
                | (Open, Closed)
                | (Closed, Connecting)
        )
    }

    /// A transport exists or is being created.
    pub fn is_active(self) -> bool {
        matches!(self, ChannelState::Connecting | ChannelState::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelState::{self, *};

    #[test]
    fn test_legal_edges() {
        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Open));
        assert!(Connecting.can_transition_to(Closed));
        assert!(Open.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Connecting));
    }

    #[test]
    fn test_illegal_edges() {
        let all = [Idle, Connecting, Open, Closed];
        let legal = 5;
        let count = all
            .iter()
            .flat_map(|a| all.iter().map(move |b| (*a, *b)))
            .filter(|(a, b)| a.can_transition_to(*b))
            .count();
        assert_eq!(count, legal);

        assert!(!Idle.can_transition_to(Open));
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Closed.can_transition_to(Open));
        assert!(!Open.can_transition_to(Open));
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(ChannelState::default(), Idle);
        assert!(!Idle.is_active());
        assert!(Connecting.is_active());
        assert!(Open.is_active());
        assert!(!Closed.is_active());
    }
}
