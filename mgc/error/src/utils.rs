use std::fmt::Display;

use itertools::Itertools;

/// Displays a string which says that one of the elements of
/// `collection` was expected.
pub fn display_expected_of_any<T: Display>(collection: &[T]) -> String {
    match collection {
        [] => "Did not expect anything".to_string(),
        [single] => format!("Expected {single}"),
        many => format!(
            "Expected one of ({})",
            many.iter().map(|val| format!("{val}")).join(", ")
        ),
    }
}
