//! HTML advisory texts shown to principals.

use crate::relay::html_escape;
use crate::scheduler::DeliveryNotices;
use std::time::Duration;

/// Delivery advisories in this module's wording
pub const DELIVERY_NOTICES: DeliveryNotices = DeliveryNotices {
    invalid_token,
    header: delivery_header,
    partial: delivery_partial,
    failed: delivery_failed,
};

fn minutes(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let m = secs / 60;
        format!("{} minute{}", m, if m == 1 { "" } else { "s" })
    } else {
        format!("{} seconds", secs)
    }
}

pub fn welcome(first_name: Option<&str>) -> String {
    match first_name {
        Some(name) => format!(
            "<b>Welcome, {} 🙌</b>\n\nI can securely deliver files to you.",
            html_escape(name)
        ),
        None => "<b>Welcome 🙌</b>\n\nI can securely deliver files to you.".to_string(),
    }
}

pub fn invalid_token() -> String {
    "❌ <b>Invalid or expired link.</b>".to_string()
}

pub fn delivery_header(count: usize, ttl: Duration) -> String {
    let noun = if count == 1 { "file" } else { "files" };
    format!(
        "⏳ <i>{} {} incoming. They will self-destruct in {}.</i>",
        count,
        noun,
        minutes(ttl)
    )
}

pub fn delivery_partial(delivered: usize, total: usize, ttl: Duration) -> String {
    format!(
        "⏳ <i>Delivered {} of {} files. Some could not be retrieved. \
         They will self-destruct in {}.</i>",
        delivered,
        total,
        minutes(ttl)
    )
}

pub fn delivery_failed() -> String {
    "❌ <b>Error:</b> Could not retrieve the file. It may have been deleted by an admin.".to_string()
}

pub fn generic_failure() -> String {
    "❌ <b>Something went wrong.</b> Please try again later.".to_string()
}

pub fn ingest_mode_entered() -> String {
    "📤 <b>Upload Mode Activated</b>\n\
     Send me any file (Photo, Video, PDF, etc.) to store it. \
     Files sent together share one link."
        .to_string()
}

pub fn ingest_rejected() -> String {
    "⚠️ <b>Upload Mode is Active.</b>\nPlease send a file, or type /cancel to exit.".to_string()
}

pub fn ingest_stored(share_url: &str) -> String {
    format!(
        "✅ <b>File Uploaded Successfully!</b>\n\n\
         🔗 <b>Shareable Link:</b>\n<code>{}</code>\n\n\
         <i>Send another file or type /cancel to exit upload mode.</i>",
        html_escape(share_url)
    )
}

pub fn ingest_failed() -> String {
    "❌ <b>Error storing file.</b> The vault did not accept it, please send it again.".to_string()
}

/// Caption attached to the archived vault copy
pub fn vault_caption(share_url: &str) -> String {
    format!("🔗 {}", html_escape(share_url))
}

pub fn admin_panel(token_count: i64) -> String {
    format!(
        "⚙️ <b>Admin Control Panel</b>\nActive links: {}\nSelect an action below:",
        token_count
    )
}

pub fn revoke_prompt() -> String {
    "🔗 <b>Send me the special link</b> of the file you want to delete:".to_string()
}

pub fn revoke_done(removed: u64, vault_failed: usize) -> String {
    let noun = if removed == 1 { "file" } else { "files" };
    let deleted = removed.saturating_sub(vault_failed as u64);
    if vault_failed == 0 {
        format!(
            "✅ <b>{} {} permanently deleted</b> from the channel and database.",
            removed, noun
        )
    } else if deleted == 0 {
        format!(
            "⚠️ <b>Link revoked</b>, but none of its {} {} could be deleted from the channel.",
            removed, noun
        )
    } else {
        format!(
            "⚠️ <b>Link revoked.</b> {} of {} {} deleted from the channel, {} left behind.",
            deleted, removed, noun, vault_failed
        )
    }
}

pub fn revoke_not_found() -> String {
    "❌ <b>Link not found in database.</b>".to_string()
}

pub fn revoke_malformed() -> String {
    "❌ <b>That does not look like a share link.</b> Nothing was deleted.".to_string()
}

pub fn cleared_all(rows: u64) -> String {
    format!(
        "✅ <b>Database Cleared.</b>\nAll existing links have been invalidated ({} entries).",
        rows
    )
}

pub fn cancelled() -> String {
    "🚫 <b>Action cancelled.</b>".to_string()
}

pub fn unlock_invalid_link() -> String {
    "⚠️ <b>Please send a valid link.</b>".to_string()
}

pub fn unlock_progress(stage: &str, percent: u8) -> String {
    let filled = usize::from(percent / 20);
    let bar: String = "■".repeat(filled) + &"□".repeat(5 - filled.min(5));
    format!("<blockquote>{}\n[{}] {}%</blockquote>", stage, bar, percent)
}

pub fn unlock_failed(reason: &str) -> String {
    format!("<blockquote>❌ <b>{}</b></blockquote>", html_escape(reason))
}

pub fn unlock_prompt() -> String {
    "📥 <b>Send me another link</b> to download.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_mentions_count_and_ttl() {
        let text = delivery_header(3, Duration::from_secs(300));
        assert!(text.contains("3 files"));
        assert!(text.contains("5 minutes"));
        assert!(delivery_header(1, Duration::from_secs(45)).contains("1 file incoming"));
    }

    #[test]
    fn test_share_url_is_escaped() {
        let text = ingest_stored("https://t.me/bot?start=a&b");
        assert!(text.contains("start=a&amp;b"));
    }

    #[test]
    fn test_revoke_reply_counts_only_deleted_copies() {
        assert!(revoke_done(2, 0).contains("2 files permanently deleted"));
        assert!(revoke_done(2, 2).contains("none of its 2 files"));
        let partial = revoke_done(3, 1);
        assert!(partial.contains("2 of 3 files"));
        assert!(partial.contains("1 left behind"));
    }

    #[test]
    fn test_progress_bar() {
        assert!(unlock_progress("x", 60).contains("[■■■□□] 60%"));
        assert!(unlock_progress("x", 100).contains("[■■■■■] 100%"));
    }
}
