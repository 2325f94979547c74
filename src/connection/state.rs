//! Connection state machine

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected
    Idle,

    /// Control connection open, not authenticated
    Connected,

    /// Authenticated and ready for commands
    Ready,
}

/// Single lifecycle step between adjacent states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle → Connected
    Connect,
    /// Connected → Ready
    Login,
    /// Ready → Connected
    Logout,
    /// Connected → Idle
    Disconnect,
}

impl ConnectionState {
    /// Derive the state from the connection flags
    ///
    /// `logged_in` without `connected` is not a reachable state; it is
    /// reported as `Idle` so callers reconnect.
    pub fn from_flags(connected: bool, logged_in: bool) -> Self {
        match (connected, logged_in) {
            (true, true) => Self::Ready,
            (true, false) => Self::Connected,
            (false, _) => Self::Idle,
        }
    }

    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Idle, Connected) | (Connected, Ready) | (Ready, Connected) | (Connected, Idle)
        )
    }

    /// State reached by applying `step`, if it is legal from here
    pub fn apply(&self, step: Transition) -> Option<ConnectionState> {
        use ConnectionState::*;

        match (self, step) {
            (Idle, Transition::Connect) => Some(Connected),
            (Connected, Transition::Login) => Some(Ready),
            (Ready, Transition::Logout) => Some(Connected),
            (Connected, Transition::Disconnect) => Some(Idle),
            _ => None,
        }
    }

    /// Shortest sequence of steps from this state to `target`
    pub fn steps_to(&self, target: ConnectionState) -> Vec<Transition> {
        use ConnectionState::*;

        match (self, target) {
            (Idle, Connected) => vec![Transition::Connect],
            (Idle, Ready) => vec![Transition::Connect, Transition::Login],
            (Connected, Ready) => vec![Transition::Login],
            (Connected, Idle) => vec![Transition::Disconnect],
            (Ready, Connected) => vec![Transition::Logout],
            (Ready, Idle) => vec![Transition::Logout, Transition::Disconnect],
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connected => write!(f, "connected"),
            Self::Ready => write!(f, "ready"),
        }
    }
}
