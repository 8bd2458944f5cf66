use async_trait::async_trait;
use teloxide::{prelude::*, types::ParseMode};
use tracing::{info, warn};

use common::{Error, Notifier, Result};

/// Telegram rejects longer message texts.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Sends monitor alerts to one or more Telegram chats as Markdown text.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_ids: Vec<ChatId>,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self::with_chats(token, &[chat_id])
    }

    pub fn with_chats(token: impl Into<String>, chat_ids: &[i64]) -> Self {
        Self {
            bot: Bot::new(token),
            chat_ids: chat_ids.iter().map(|&id| ChatId(id)).collect(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let delivered = send_alert(&self.bot, &self.chat_ids, message).await;
        if delivered == 0 && !self.chat_ids.is_empty() {
            return Err(Error::Notification(
                "alert was not delivered to any chat".into(),
            ));
        }
        info!(chats = delivered, "Telegram alert sent");
        Ok(())
    }
}

/// Send `message` to every chat, splitting it when it exceeds Telegram's
/// length limit. Returns how many chats received all parts.
pub async fn send_alert(bot: &Bot, chat_ids: &[ChatId], message: &str) -> usize {
    let parts = split_message(message, MAX_MESSAGE_LEN);
    let mut delivered = 0;
    'chats: for &chat_id in chat_ids {
        for part in &parts {
            if let Err(e) = bot
                .send_message(chat_id, part.as_str())
                .parse_mode(ParseMode::Markdown)
                .await
            {
                warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram alert");
                continue 'chats;
            }
        }
        delivered += 1;
    }
    delivered
}

/// Break `text` into chunks of at most `max_len` bytes, on line boundaries
/// where possible.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len || max_len == 0 {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if current.len() + line.len() > max_len && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        if line.len() > max_len {
            // A single overlong line is cut on char boundaries.
            for ch in line.chars() {
                if current.len() + ch.len_utf8() > max_len {
                    parts.push(std::mem::take(&mut current));
                }
                current.push(ch);
            }
        } else {
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_one_part() {
        assert_eq!(split_message("*SMC signal*\nEntry: 1", 4096).len(), 1);
    }

    #[test]
    fn long_message_splits_on_lines() {
        let text = "aaaa\nbbbb\ncccc\n";
        let parts = split_message(text, 10);
        assert_eq!(parts, vec!["aaaa\nbbbb\n".to_string(), "cccc\n".to_string()]);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn overlong_line_is_cut() {
        let text = "x".repeat(25);
        let parts = split_message(&text, 10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() <= 10));
        assert_eq!(parts.concat(), text);
    }

    #[tokio::test]
    async fn no_chats_is_not_an_error() {
        let notifier = TelegramNotifier::with_chats("123:token", &[]);
        assert!(notifier.notify("hello").await.is_ok());
    }
}
