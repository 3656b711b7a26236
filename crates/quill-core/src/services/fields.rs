//! Input checks shared by the services.

use crate::error::FieldErrors;

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_CATEGORY_NAME_LEN: usize = 100;

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const BLANK: &str = "This field may not be blank.";

/// Check a required text field, recording what is wrong with it.
///
/// Returns the value unchanged; callers only use it once `errors` is empty.
pub(crate) fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_len: Option<usize>,
) -> String {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return String::new();
    };

    if value.trim().is_empty() {
        errors.add(field, BLANK);
    } else if let Some(max) = max_len {
        if value.chars().count() > max {
            errors.add(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
        }
    }

    value
}

/// Blank optional values count as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
