//! Process exit codes (spec.md §6: "a defined 'incorrect' code ... a
//! 'success' code"). Named so every terminating call site exits with
//! one of these instead of inventing a numeric literal.

/// Successful completion.
pub const EXIT_SUCCESS: i32 = 0;

/// Fatal, unrecoverable start-up or configuration error.
pub const EXIT_INCORRECT: i32 = 1;
