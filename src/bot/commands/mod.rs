pub mod admin;
pub mod cancel;
pub mod start;
pub mod unlock;
pub mod upload;

/// Callback data of the admin panel buttons
pub const CB_CLEAR_SPECIFIC: &str = "admin_clear_specific";
pub const CB_CLEAR_ALL: &str = "admin_clear_all";
/// Callback data of the "Download more" button
pub const CB_UNLOCK_AGAIN: &str = "unlock_again";

/// Bot commands understood in private chats
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`, optionally with a share token
    Start(Option<String>),
    Upload,
    Admin,
    Cancel,
    Unknown(String),
}

impl Command {
    /// Parse a message text. Returns `None` when the text is not a command.
    ///
    /// Accepts the `/name@BotName` form used in groups and matches names
    /// case-insensitively.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        let arg = parts
            .next()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Some(match name.as_str() {
            "start" => Self::Start(arg),
            "upload" => Self::Upload,
            "admin" => Self::Admin,
            "cancel" => Self::Cancel,
            _ => Self::Unknown(name),
        })
    }
}
