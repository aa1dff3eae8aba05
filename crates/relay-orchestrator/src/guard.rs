//! Stricter prompt used for the one retry each provider gets

/// Appended to the base prompt for the single retry a provider gets
pub const GUARD_INSTRUCTION: &str = "IMPORTANT: Your previous reply could not be used. \
Respond again with one strict JSON value only. Do not wrap it in Markdown code fences, \
do not add commentary before or after it, close every bracket and quote, and fix any \
syntax problems such as trailing commas or truncated output.";

/// Base prompt followed by [`GUARD_INSTRUCTION`]
#[must_use]
pub fn guard_prompt(base: &str) -> String {
    format!("{}\n\n{GUARD_INSTRUCTION}", base.trim_end())
}
