use crate::{LoadEvent, SessionEvent};

/// Unified event of a playback session.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Session(SessionEvent),
    Load(LoadEvent),
}

impl From<SessionEvent> for Event {
    fn from(e: SessionEvent) -> Self {
        Self::Session(e)
    }
}

impl From<LoadEvent> for Event {
    fn from(e: LoadEvent) -> Self {
        Self::Load(e)
    }
}

impl Event {
    #[must_use]
    pub fn as_session(&self) -> Option<&SessionEvent> {
        match self {
            Self::Session(e) => Some(e),
            Self::Load(_) => None,
        }
    }

    #[must_use]
    pub fn as_load(&self) -> Option<&LoadEvent> {
        match self {
            Self::Load(e) => Some(e),
            Self::Session(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use lyre_abr::AbrReason;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(SessionEvent::Released.into(), true)]
    #[case(
        LoadEvent::RepresentationSwitched {
            from: None,
            to: "500k".into(),
            reason: AbrReason::Initial,
        }
        .into(),
        false
    )]
    fn sub_enum_accessors(#[case] event: Event, #[case] is_session: bool) {
        assert_eq!(event.as_session().is_some(), is_session);
        assert_eq!(event.as_load().is_some(), !is_session);
    }
}
