//! # Menu Labels
//!
//! Reply-keyboard labels that act like their commands when sent as plain text.

pub const SUBMIT: &str = "📝 Submit";
pub const PROFILE: &str = "👤 My profile";
pub const HELP: &str = "❓ Help";

/// Maps a menu label (with or without its emoji) to the command it stands for.
pub fn command_for_label(text: &str) -> Option<&'static str> {
    let stripped = text.trim_start_matches(|c: char| !c.is_alphanumeric()).trim();
    [(SUBMIT, "submit"), (PROFILE, "me"), (HELP, "help")]
        .into_iter()
        .find(|(label, _)| {
            let bare = label.trim_start_matches(|c: char| !c.is_alphanumeric());
            text.trim() == *label || stripped.eq_ignore_ascii_case(bare)
        })
        .map(|(_, command)| command)
}
