//! Registration flow: collects name, crops, location and language.
//!
//! Every function here is pure: it reads the session, decides the reply,
//! and returns a [`SessionPatch`] for the engine to merge. Nothing is
//! written until the engine applies the patch.

use std::sync::LazyLock;

use regex::Regex;

use super::messages;
use crate::error::DialogueError;
use crate::farm::FarmerProfile;
use crate::session::{ConversationState, SessionPatch, SessionState};

/// Result of handling one registration message.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub patch: SessionPatch,
    pub reply: String,
    /// Set when this message finished registration.
    pub completed: Option<FarmerProfile>,
}

impl StepOutcome {
    fn reprompt(reply: impl Into<String>) -> Self {
        Self {
            patch: SessionPatch::new(),
            reply: reply.into(),
            completed: None,
        }
    }

    fn advance(patch: SessionPatch, reply: impl Into<String>) -> Self {
        Self {
            patch,
            reply: reply.into(),
            completed: None,
        }
    }
}

/// Words that steer the more-crops step and are never stored as crops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CropControl {
    AddAnother,
    Finished,
}

fn crop_control(input: &str) -> Option<CropControl> {
    match input.trim().to_lowercase().as_str() {
        "yes" => Some(CropControl::AddAnother),
        "no" | "done" => Some(CropControl::Finished),
        _ => None,
    }
}

/// Begin registration from idle.
///
/// Any crops or partial fields left by an abandoned attempt are cleared.
/// A previously finalized profile stays until the new one replaces it.
pub fn begin(session: &SessionState) -> Result<StepOutcome, DialogueError> {
    let next = session
        .conversation_state
        .transition(ConversationState::CollectingName)?;
    Ok(StepOutcome::advance(
        SessionPatch::new().state(next).clear_partial_fields(),
        messages::REGISTER_START,
    ))
}

/// Handle one message for a sender who is mid-registration.
///
/// `input` is the sender's text with surrounding whitespace removed and
/// original casing kept. `phone` becomes the profile's phone on completion.
pub fn handle_step(
    session: &SessionState,
    input: &str,
    phone: &str,
) -> Result<StepOutcome, DialogueError> {
    let input = input.trim();
    let current = session.conversation_state;

    match current {
        ConversationState::Idle => Err(DialogueError::InvalidTransition {
            from: current.to_string(),
            to: "registration step".into(),
        }),

        ConversationState::CollectingName => {
            if input.is_empty() {
                return Ok(StepOutcome::reprompt(messages::ASK_NAME_AGAIN));
            }
            let next = current.transition(ConversationState::CollectingFirstCrop)?;
            Ok(StepOutcome::advance(
                SessionPatch::new().state(next).name(input),
                messages::ASK_FIRST_CROP,
            ))
        }

        ConversationState::CollectingFirstCrop => {
            if input.is_empty() || crop_control(input).is_some() {
                return Ok(StepOutcome::reprompt(messages::ASK_FIRST_CROP_AGAIN));
            }
            let next = current.transition(ConversationState::CollectingMoreCrops)?;
            Ok(StepOutcome::advance(
                SessionPatch::new()
                    .state(next)
                    .crops(vec![input.to_string()]),
                messages::more_crops_question(input),
            ))
        }

        ConversationState::CollectingMoreCrops => match crop_control(input) {
            _ if input.is_empty() => Ok(StepOutcome::reprompt(messages::ADD_MORE_CROPS)),
            Some(CropControl::AddAnother) => Ok(StepOutcome::reprompt(messages::ADD_MORE_CROPS)),
            Some(CropControl::Finished) => {
                if session.collected_crops.is_empty() {
                    return Err(DialogueError::InvalidProfile {
                        reason: "crop list finished without any crops".into(),
                    });
                }
                let next = current.transition(ConversationState::CollectingLocation)?;
                Ok(StepOutcome::advance(
                    SessionPatch::new().state(next),
                    messages::crops_complete(&session.collected_crops.join(", ")),
                ))
            }
            None => {
                let mut crops = session.collected_crops.clone();
                crops.push(input.to_string());
                Ok(StepOutcome::advance(
                    SessionPatch::new().crops(crops),
                    messages::crop_added(input),
                ))
            }
        },

        ConversationState::CollectingLocation => {
            if input.is_empty() {
                return Ok(StepOutcome::reprompt(messages::ASK_LOCATION_AGAIN));
            }
            let next = current.transition(ConversationState::CollectingLanguage)?;
            Ok(StepOutcome::advance(
                SessionPatch::new().state(next).location(input),
                messages::ASK_LANGUAGE,
            ))
        }

        ConversationState::CollectingLanguage => {
            if input.is_empty() {
                return Ok(StepOutcome::reprompt(messages::ASK_LANGUAGE_AGAIN));
            }
            let next = current.transition(ConversationState::Idle)?;
            let name = session.name.clone().ok_or_else(|| missing("name"))?;
            let location = session.location.clone().ok_or_else(|| missing("location"))?;
            let profile = FarmerProfile::new(
                name,
                session.collected_crops.clone(),
                location,
                input,
                phone,
            )?;
            Ok(finish(next, profile))
        }
    }
}

fn missing(field: &str) -> DialogueError {
    DialogueError::InvalidProfile {
        reason: format!("{field} was never collected"),
    }
}

fn finish(idle: ConversationState, profile: FarmerProfile) -> StepOutcome {
    StepOutcome {
        patch: SessionPatch::new()
            .state(idle)
            .clear_partial_fields()
            .profile(profile.clone()),
        reply: messages::registration_complete(&profile),
        completed: Some(profile),
    }
}

static FORM_FIELDS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    ["name", "crop", "location", "language"].map(|label| {
        Regex::new(&format!(r"(?im)^[\s*•-]*{label}\s*:\s*(.*?)\s*$"))
            .expect("form field pattern is valid")
    })
});

/// Register in one message from `Name:`/`Crop:`/`Location:`/`Language:`
/// lines. The crop line may list several crops separated by commas.
///
/// A missing or empty field gets the format help, and the session is left
/// untouched.
pub fn register_from_form(
    session: &SessionState,
    text: &str,
    phone: &str,
) -> Result<StepOutcome, DialogueError> {
    if session.conversation_state.is_registration_step() {
        return Err(DialogueError::InvalidTransition {
            from: session.conversation_state.to_string(),
            to: ConversationState::Idle.to_string(),
        });
    }

    let [name, crops, location, language] = FORM_FIELDS.each_ref().map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    });
    let (Some(name), Some(crops), Some(location), Some(language)) =
        (name, crops, location, language)
    else {
        return Ok(StepOutcome::reprompt(messages::INVALID_FORM));
    };

    let crops: Vec<String> = crops
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty() && crop_control(c).is_none())
        .map(String::from)
        .collect();

    match FarmerProfile::new(name, crops, location, language, phone) {
        Ok(profile) => Ok(finish(ConversationState::Idle, profile)),
        Err(DialogueError::InvalidProfile { .. }) => {
            Ok(StepOutcome::reprompt(messages::INVALID_FORM))
        }
        Err(e) => Err(e),
    }
}
