//! Wizard step state machine.

use serde::{Deserialize, Serialize};

/// The steps of the intake wizard.
///
/// Progresses StarterInfo → AdvancedOptions → Submitted. The user may step
/// back from AdvancedOptions; Submitted is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    /// Source content, profile link and audience.
    #[default]
    StarterInfo,
    /// Tweet shape, tags and persona details.
    AdvancedOptions,
    Submitted,
}

impl WizardStep {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: WizardStep) -> bool {
        use WizardStep::*;
        matches!(
            (self, target),
            (StarterInfo, AdvancedOptions) | (AdvancedOptions, Submitted) | (AdvancedOptions, StarterInfo)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted)
    }

    /// Whether leaving this step sends the job.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::AdvancedOptions)
    }

    pub fn next(&self) -> Option<WizardStep> {
        match self {
            Self::StarterInfo => Some(Self::AdvancedOptions),
            Self::AdvancedOptions => Some(Self::Submitted),
            Self::Submitted => None,
        }
    }

    pub fn previous(&self) -> Option<WizardStep> {
        match self {
            Self::AdvancedOptions => Some(Self::StarterInfo),
            Self::StarterInfo | Self::Submitted => None,
        }
    }

    /// 1-based position shown in the progress indicator.
    pub fn number(&self) -> u8 {
        match self {
            Self::StarterInfo => 1,
            Self::AdvancedOptions => 2,
            Self::Submitted => 3,
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StarterInfo => "starter_info",
            Self::AdvancedOptions => "advanced_options",
            Self::Submitted => "submitted",
        };
        write!(f, "{s}")
    }
}
