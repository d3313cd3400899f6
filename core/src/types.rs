//! Domain values for the typograf service.
//!
//! # Design
//! `ProcessTextParameters` is an immutable value: fields are private and set
//! once at construction, so a rendered request body is a pure function of the
//! parameters and the input text. `OperationOutcome` is the single terminal
//! value handed to a completion callback.

use crate::error::TypografError;

/// Which kind of entities the service emits in processed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityType {
    /// Named HTML entities such as `&nbsp;`.
    Html,
    /// Numeric XML entities such as `&#160;`.
    Xml,
    /// Plain characters, no entities at all.
    #[default]
    None,
    /// Named entities where they exist, numeric ones otherwise.
    Mixed,
}

impl EntityType {
    /// Integer code understood by the service.
    pub fn code(self) -> i32 {
        match self {
            EntityType::Html => 1,
            EntityType::Xml => 2,
            EntityType::None => 3,
            EntityType::Mixed => 4,
        }
    }
}

/// Text processing options sent along with every request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessTextParameters {
    entity_type: EntityType,
    max_non_breaking_spaces: u32,
    use_break_line_tags: bool,
    use_paragraph_tags: bool,
}

impl ProcessTextParameters {
    /// `max_non_breaking_spaces` of zero means no limit.
    pub fn new(
        entity_type: EntityType,
        max_non_breaking_spaces: u32,
        use_break_line_tags: bool,
        use_paragraph_tags: bool,
    ) -> Self {
        Self {
            entity_type,
            max_non_breaking_spaces,
            use_break_line_tags,
            use_paragraph_tags,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn max_non_breaking_spaces(&self) -> u32 {
        self.max_non_breaking_spaces
    }

    pub fn use_break_line_tags(&self) -> bool {
        self.use_break_line_tags
    }

    pub fn use_paragraph_tags(&self) -> bool {
        self.use_paragraph_tags
    }
}

/// Terminal result of one `process_text` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Text extracted from the service response.
    Success(String),
    Failure(TypografError),
    /// The call was cancelled before a response was processed.
    Cancelled,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success(_))
    }

    /// Processed text, if the call succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            OperationOutcome::Success(text) => Some(text),
            _ => None,
        }
    }
}
