//! Conversation state machine and the per-sender session record.

use serde::{Deserialize, Serialize};

use crate::error::DialogueError;
use crate::farm::FarmerProfile;

/// Where a sender currently is in the conversation.
///
/// Registration progresses linearly: Idle → CollectingName →
/// CollectingFirstCrop → CollectingMoreCrops → CollectingLocation →
/// CollectingLanguage → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    CollectingName,
    CollectingFirstCrop,
    CollectingMoreCrops,
    CollectingLocation,
    CollectingLanguage,
}

impl ConversationState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: ConversationState) -> bool {
        use ConversationState::*;
        matches!(
            (self, target),
            (Idle, CollectingName)
                | (CollectingName, CollectingFirstCrop)
                | (CollectingFirstCrop, CollectingMoreCrops)
                | (CollectingMoreCrops, CollectingLocation)
                | (CollectingLocation, CollectingLanguage)
                | (CollectingLanguage, Idle)
        )
    }

    /// Whether this state is one of the registration sub-steps.
    ///
    /// Text received in these states is flow input, never a command.
    pub fn is_registration_step(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// States in which at least one crop must already be collected.
    pub fn requires_crops(&self) -> bool {
        matches!(
            self,
            Self::CollectingMoreCrops | Self::CollectingLocation | Self::CollectingLanguage
        )
    }

    /// Validate a transition, returning the target on success.
    pub fn transition(self, target: ConversationState) -> Result<ConversationState, DialogueError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DialogueError::InvalidTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CollectingName => "collecting_name",
            Self::CollectingFirstCrop => "collecting_first_crop",
            Self::CollectingMoreCrops => "collecting_more_crops",
            Self::CollectingLocation => "collecting_location",
            Self::CollectingLanguage => "collecting_language",
        };
        write!(f, "{s}")
    }
}

/// Everything the dialogue knows about one sender.
///
/// Owned by the session store. Flows read it, compute a [`SessionPatch`],
/// and hand the patch back; nothing holds onto a copy past one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub conversation_state: ConversationState,
    #[serde(default)]
    pub collected_crops: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_profile: Option<FarmerProfile>,
}

impl SessionState {
    /// Field-wise overwrite: provided fields replace, omitted fields stay.
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(state) = patch.conversation_state {
            self.conversation_state = state;
        }
        if let Some(ref crops) = patch.collected_crops {
            self.collected_crops = crops.clone();
        }
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
        if let Some(ref location) = patch.location {
            self.location = location.clone();
        }
        if let Some(ref language) = patch.language {
            self.language = language.clone();
        }
        if let Some(ref profile) = patch.farmer_profile {
            self.farmer_profile = profile.clone();
        }
    }

    /// Check the cross-field invariants of a session.
    pub fn check_invariants(&self) -> Result<(), DialogueError> {
        if self.conversation_state.requires_crops() && self.collected_crops.is_empty() {
            return Err(DialogueError::InvalidTransition {
                from: self.conversation_state.to_string(),
                to: "state without collected crops".into(),
            });
        }
        match self.farmer_profile {
            Some(ref profile) if profile.crops().is_empty() => Err(DialogueError::InvalidProfile {
                reason: "stored profile has no crops".into(),
            }),
            _ => Ok(()),
        }
    }
}

/// A partial update to a [`SessionState`].
///
/// `None` leaves a field untouched. For optional fields, `Some(None)`
/// clears the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub conversation_state: Option<ConversationState>,
    pub collected_crops: Option<Vec<String>>,
    pub name: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub language: Option<Option<String>>,
    pub farmer_profile: Option<Option<FarmerProfile>>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: ConversationState) -> Self {
        self.conversation_state = Some(state);
        self
    }

    pub fn crops(mut self, crops: Vec<String>) -> Self {
        self.collected_crops = Some(crops);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(Some(name.into()));
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(Some(location.into()));
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(Some(language.into()));
        self
    }

    pub fn profile(mut self, profile: FarmerProfile) -> Self {
        self.farmer_profile = Some(Some(profile));
        self
    }

    /// Clear the crop list and every partially collected profile field.
    pub fn clear_partial_fields(mut self) -> Self {
        self.collected_crops = Some(Vec::new());
        self.name = Some(None);
        self.location = Some(None);
        self.language = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
