#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Which explanation the user is being shown about location access
pub enum PromptKind {
    /// Shown before the OS permission prompt so the user knows why we're asking
    Priming,
    /// The user can't grant access themselves
    Restricted,
    /// The user denied access before, point them at settings
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// A button on a [Prompt]
pub enum Choice {
    /// Go on to the OS permission prompt
    Proceed,
    NotNow,
    /// Dismiss an informational prompt
    Acknowledge,
    /// Deep link to the system settings
    OpenSettings,
}

impl Choice {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Proceed | Self::Acknowledge => "OK",
            Self::NotNow => "Not Now",
            Self::OpenSettings => "Settings",
        }
    }

    /// Whether this choice just closes the prompt
    pub const fn is_dismissal(self) -> bool {
        matches!(self, Self::NotNow | Self::Acknowledge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A message with a fixed set of choices, the first choice is the default action
pub struct Prompt {
    pub kind: PromptKind,
    pub title: &'static str,
    pub message: &'static str,
    pub choices: &'static [Choice],
}

const TITLE: &str = "GeoCasher needs your location";

impl Prompt {
    pub const fn for_kind(kind: PromptKind) -> Self {
        match kind {
            PromptKind::Priming => Self {
                kind,
                title: TITLE,
                message: "Your location is used to sort photos by how close they are to you and \
                          to show where a photo was taken relative to you. It isn't used for \
                          anything else.",
                choices: &[Choice::Proceed, Choice::NotNow],
            },
            PromptKind::Restricted => Self {
                kind,
                title: TITLE,
                message: "Location access is restricted on this device. Ask the device's owner \
                          to allow GeoCasher to use location services to sort photos by \
                          distance.",
                choices: &[Choice::Acknowledge],
            },
            PromptKind::Denied => Self {
                kind,
                title: TITLE,
                message: "Location access was turned off for GeoCasher. Allow it in Settings to \
                          sort photos by distance.",
                choices: &[Choice::OpenSettings, Choice::NotNow],
            },
        }
    }

    /// The choice taken when the user just closes the prompt
    pub fn cancel_choice(&self) -> Choice {
        self.choices
            .iter()
            .rev()
            .copied()
            .find(|c| c.is_dismissal())
            .unwrap_or(Choice::Acknowledge)
    }
}

/// Called with the user's answer to a [Prompt]
pub type ChoiceHandler = Box<dyn FnOnce(Choice) + Send>;

/// Something that can show a [Prompt] to the user
pub trait Presenter {
    /// Show `prompt`, then call `respond` with whatever the user picked. `respond` may be
    /// called later from another thread, or never if the prompt is torn down.
    fn present(&self, prompt: Prompt, respond: ChoiceHandler);
}
