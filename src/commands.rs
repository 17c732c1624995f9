//! Admin command surface
//!
//! Commands are a closed enum: the verb is recognized first, authorization
//! is checked second, and only then are the remaining arguments parsed.
//! That ordering means a non-admin can never trigger argument-parsing side
//! effects (or error detail) on a privileged command.
//!
//! Batch commands (`/addurls`, `/delurls`) are best-effort per line: one
//! bad line is reported and does not stop the rest, and the registry is
//! persisted once at the end if at least one line succeeded.

use thiserror::Error;

use crate::annotator::escape_html;
use crate::registry::LinkRegistry;
use crate::store::LinkStore;

/// Telegram message size limit we chunk replies against
pub const MAX_REPLY_CHARS: usize = 4000;

const DENIED: &str = "❌ Only admins can use this command.";
const PERSIST_WARNING: &str = "⚠️ Warning: links could not be saved to disk.";

const USAGE_ADDURL: &str =
    "Usage: /addurl [Label] [URL]\n\nExample: /addurl SignUp https://example.com/ref123";
const USAGE_ADDURLS: &str = "Usage: /addurls\nLabel1 URL1\nLabel2 URL2\n...";
const USAGE_DELURL: &str = "Usage: /delurl [URL]";
const USAGE_DELURLS: &str = "Usage: /delurls\nURL1\nURL2\n...";
const USAGE_SETBUTTON: &str = "Usage: /setbutton [URL] [Button Text]";

/// Command errors surfaced as fixed user-facing replies
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Only admins can use this command")]
    Unauthorized,
    #[error("{0}")]
    Usage(&'static str),
}

/// Recognized command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    AddUrl,
    AddUrls,
    DelUrl,
    DelUrls,
    ListUrls,
    SetButton,
}

impl CommandKind {
    /// Split a message into a known verb and the argument remainder.
    /// Accepts the `/cmd@BotName` form Telegram uses in group chats.
    /// Unknown slash-commands return `None` and fall through to the
    /// auto-annotation pipeline.
    pub fn from_text(text: &str) -> Option<(CommandKind, &str)> {
        let text = text.trim_start();
        if !text.starts_with('/') {
            return None;
        }
        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest),
            None => (text, ""),
        };
        let verb = head[1..].split('@').next().unwrap_or("");
        let kind = match verb {
            "start" => CommandKind::Start,
            "addurl" => CommandKind::AddUrl,
            "addurls" => CommandKind::AddUrls,
            "delurl" => CommandKind::DelUrl,
            "delurls" => CommandKind::DelUrls,
            "listurls" => CommandKind::ListUrls,
            "setbutton" => CommandKind::SetButton,
            _ => return None,
        };
        Some((kind, rest))
    }

    /// Everything except `/start` mutates or inspects the registry
    pub fn requires_admin(self) -> bool {
        !matches!(self, CommandKind::Start)
    }
}

/// A fully parsed command with its validated argument payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    AddUrl { label: String, url: String },
    AddUrls { body: String },
    DelUrl { url: String },
    DelUrls { body: String },
    ListUrls,
    SetButton { url: String, label: String },
}

impl Command {
    /// Parse the argument remainder for a verb. Call only after the
    /// authorization check has passed.
    pub fn parse(kind: CommandKind, rest: &str) -> Result<Command, CommandError> {
        match kind {
            CommandKind::Start => Ok(Command::Start),
            CommandKind::AddUrl => {
                let (label, url) = split_two(rest).ok_or(CommandError::Usage(USAGE_ADDURL))?;
                Ok(Command::AddUrl {
                    label: label.to_string(),
                    url: url.to_string(),
                })
            }
            CommandKind::AddUrls => {
                if rest.trim().is_empty() {
                    return Err(CommandError::Usage(USAGE_ADDURLS));
                }
                Ok(Command::AddUrls {
                    body: rest.to_string(),
                })
            }
            CommandKind::DelUrl => {
                let url = rest.trim();
                if url.is_empty() {
                    return Err(CommandError::Usage(USAGE_DELURL));
                }
                Ok(Command::DelUrl {
                    url: url.to_string(),
                })
            }
            CommandKind::DelUrls => {
                if rest.trim().is_empty() {
                    return Err(CommandError::Usage(USAGE_DELURLS));
                }
                Ok(Command::DelUrls {
                    body: rest.to_string(),
                })
            }
            CommandKind::ListUrls => Ok(Command::ListUrls),
            CommandKind::SetButton => {
                let (url, label) = split_two(rest).ok_or(CommandError::Usage(USAGE_SETBUTTON))?;
                Ok(Command::SetButton {
                    url: url.to_string(),
                    label: label.to_string(),
                })
            }
        }
    }
}

/// First whitespace-delimited token plus the trimmed remainder
fn split_two(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim();
    let (first, second) = rest.split_once(char::is_whitespace)?;
    let second = second.trim();
    if first.is_empty() || second.is_empty() {
        return None;
    }
    Some((first, second))
}

/// Route one inbound message through the command surface.
///
/// Returns `None` when the text is not a recognized command (the caller
/// then runs the annotation pipeline), otherwise the sequence of reply
/// messages to send, already chunked under the transport size limit.
pub fn route(
    text: &str,
    sender_id: i64,
    is_admin: bool,
    bot_username: &str,
    registry: &mut LinkRegistry,
    store: &LinkStore,
) -> Option<Vec<String>> {
    let (kind, rest) = CommandKind::from_text(text)?;

    if kind.requires_admin() && !is_admin {
        tracing::warn!("User {} denied for {:?}", sender_id, kind);
        return Some(vec![DENIED.to_string()]);
    }

    let command = match Command::parse(kind, rest) {
        Ok(command) => command,
        Err(CommandError::Usage(usage)) => return Some(vec![usage.to_string()]),
        Err(CommandError::Unauthorized) => return Some(vec![DENIED.to_string()]),
    };

    Some(execute(command, sender_id, bot_username, registry, store))
}

/// Execute a parsed command against the registry and build the replies
pub fn execute(
    command: Command,
    sender_id: i64,
    bot_username: &str,
    registry: &mut LinkRegistry,
    store: &LinkStore,
) -> Vec<String> {
    match command {
        Command::Start => vec![start_text(bot_username)],

        Command::AddUrl { label, url } => match registry.add(&url, &label) {
            Ok(()) => {
                tracing::info!("Admin {} added URL: {} -> {}", sender_id, label, url);
                let mut reply = format!(
                    "✅ Saved: <b>{}</b> → {}",
                    escape_html(&label),
                    escape_html(&url)
                );
                persist(registry, store, &mut reply);
                vec![reply]
            }
            Err(_) => {
                vec!["❌ Invalid URL. Must start with http:// or https://".to_string()]
            }
        },

        Command::AddUrls { body } => {
            let mut added = Vec::new();
            let mut errors = Vec::new();
            for (line_num, line) in body.lines().enumerate() {
                let line_num = line_num + 1;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Some((label, url)) = split_two(line) else {
                    errors.push(format!("Line {}: Invalid format", line_num));
                    continue;
                };
                if registry.add(url, label).is_err() {
                    errors.push(format!("Line {}: Invalid URL", line_num));
                    continue;
                }
                added.push(format!("{} → {}", escape_html(label), escape_html(url)));
            }

            let mut reply = String::new();
            if !added.is_empty() {
                reply.push_str("✅ Added:\n");
                reply.push_str(&added.join("\n"));
            }
            if !errors.is_empty() {
                if !reply.is_empty() {
                    reply.push_str("\n\n");
                }
                reply.push_str("❌ Errors:\n");
                reply.push_str(&errors.join("\n"));
            }
            if reply.is_empty() {
                reply = "No valid URLs to add.".to_string();
            }
            if !added.is_empty() {
                persist(registry, store, &mut reply);
            }
            tracing::info!("Admin {} added {} URLs", sender_id, added.len());
            chunk_lines(&reply, MAX_REPLY_CHARS)
        }

        Command::DelUrl { url } => match registry.remove(&url) {
            Ok(_) => {
                tracing::info!("Admin {} removed URL: {}", sender_id, url);
                let mut reply = format!("❌ Removed {}", escape_html(&url));
                persist(registry, store, &mut reply);
                vec![reply]
            }
            Err(_) => vec!["URL not found in database".to_string()],
        },

        Command::DelUrls { body } => {
            let mut removed = Vec::new();
            let mut not_found = Vec::new();
            for line in body.lines() {
                let url = line.trim();
                if url.is_empty() {
                    continue;
                }
                match registry.remove(url) {
                    Ok(_) => removed.push(escape_html(url)),
                    Err(_) => not_found.push(escape_html(url)),
                }
            }

            let mut reply = String::new();
            if !removed.is_empty() {
                reply.push_str("❌ Removed:\n");
                reply.push_str(&removed.join("\n"));
            }
            if !not_found.is_empty() {
                if !reply.is_empty() {
                    reply.push_str("\n\n");
                }
                reply.push_str("⚠️ Not found:\n");
                reply.push_str(&not_found.join("\n"));
            }
            if reply.is_empty() {
                reply = "No URLs to remove.".to_string();
            }
            if !removed.is_empty() {
                persist(registry, store, &mut reply);
            }
            tracing::info!("Admin {} removed {} URLs", sender_id, removed.len());
            chunk_lines(&reply, MAX_REPLY_CHARS)
        }

        Command::ListUrls => {
            if registry.is_empty() {
                return vec!["No links saved yet.".to_string()];
            }
            let mut text = format!("<b>Saved Links ({}):</b>\n\n", registry.len());
            for (i, entry) in registry.list().enumerate() {
                text.push_str(&format!(
                    "{}. {} → {}\n",
                    i + 1,
                    escape_html(entry.button_label()),
                    escape_html(&entry.url)
                ));
            }
            chunk_lines(&text, MAX_REPLY_CHARS)
        }

        Command::SetButton { url, label } => match registry.relabel(&url, &label) {
            Ok(()) => {
                tracing::info!("Admin {} updated button for {}", sender_id, url);
                let mut reply = format!(
                    "🔁 Updated label for {} to: <b>{}</b>",
                    escape_html(&url),
                    escape_html(&label)
                );
                persist(registry, store, &mut reply);
                vec![reply]
            }
            Err(_) => vec!["URL not found in database".to_string()],
        },
    }
}

/// Flush the registry after a successful mutation. Failures are logged and
/// flagged in the reply; the in-memory change stands either way.
fn persist(registry: &LinkRegistry, store: &LinkStore, reply: &mut String) {
    if let Err(e) = store.save(registry) {
        tracing::error!("Error saving links to {:?}: {}", store.path(), e);
        reply.push_str("\n\n");
        reply.push_str(PERSIST_WARNING);
    }
}

fn start_text(bot_username: &str) -> String {
    format!(
        "🤖 <b>Referral Link Bot</b> (@{})\n\n\
        This bot automatically formats messages containing saved referral links with inline buttons.\n\n\
        <b>Admin Commands:</b>\n\
        /addurl [Label] [URL] - Add a single referral link\n\
        /addurls - Add multiple links (one per line: Label URL)\n\
        /delurl [URL] - Remove a referral link\n\
        /delurls - Remove multiple URLs (one per line)\n\
        /listurls - List all saved links\n\
        /setbutton [URL] [Button Text] - Update button text for a URL\n\n\
        <b>How it works:</b>\n\
        When you post a message containing any saved referral URL, the bot will \
        automatically format it with inline buttons and extract any referral codes.",
        escape_html(bot_username)
    )
}

/// Split `text` into chunks of at most `limit` characters, breaking only
/// at line boundaries so no entry line spans two messages. A single line
/// longer than the limit becomes its own oversized chunk rather than being
/// torn apart mid-line.
pub fn chunk_lines(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    for line in text.split_inclusive('\n') {
        let line_chars = line.chars().count();
        if current_chars + line_chars > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(line);
        current_chars += line_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
