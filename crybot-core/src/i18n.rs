// File: crybot-core/src/i18n.rs
//! Bot-authored reply strings in the supported interface languages.

use crybot_common::models::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    HelpTitle,
    HelpEmpty,
    DmOnly,
    ChatOnly,
    AdminOnly,
    RateLimited,
    StartDirect,
    StartChat,
    Pong,
    CacheStatsTitle,
    NoCaches,
    LimitReset,
    LimitNotTracked,
    ResetLimitUsage,
}

fn ru(key: MessageKey) -> &'static str {
    match key {
        MessageKey::HelpTitle => "CryBot - команды:",
        MessageKey::HelpEmpty => "Нет доступных команд.",
        MessageKey::DmOnly => "⛔ Эта команда доступна только в личных сообщениях.",
        MessageKey::ChatOnly => "⛔ Эта команда доступна только в беседе.",
        MessageKey::AdminOnly => "⛔ Команда доступна только администраторам.",
        MessageKey::RateLimited => "⚠️ Слишком много запросов. Попробуйте через {seconds} секунд.",
        MessageKey::StartDirect => "🎮 CryBot\n\nВерсия: `{version}`\n\nНапишите /help, чтобы увидеть список команд.",
        MessageKey::StartChat => "👋 CryBot (версия: `{version}`)\n\nСписок команд: /help",
        MessageKey::Pong => "🏓 Понг!",
        MessageKey::CacheStatsTitle => "📦 Статистика кешей:",
        MessageKey::NoCaches => "Кеши не зарегистрированы.",
        MessageKey::LimitReset => "✅ Лимит для {actor} сброшен.",
        MessageKey::LimitNotTracked => "Для {actor} нет активного лимита.",
        MessageKey::ResetLimitUsage => "Использование: resetlimit <id пользователя>",
    }
}

fn en(key: MessageKey) -> &'static str {
    match key {
        MessageKey::HelpTitle => "CryBot - commands:",
        MessageKey::HelpEmpty => "No commands available.",
        MessageKey::DmOnly => "⛔ This command is only available in direct messages.",
        MessageKey::ChatOnly => "⛔ This command is only available in group chats.",
        MessageKey::AdminOnly => "⛔ This command is for administrators only.",
        MessageKey::RateLimited => "⚠️ Too many requests. Try again in {seconds} seconds.",
        MessageKey::StartDirect => "🎮 CryBot\n\nVersion: `{version}`\n\nSend /help to see the command list.",
        MessageKey::StartChat => "👋 CryBot (version: `{version}`)\n\nCommand list: /help",
        MessageKey::Pong => "🏓 Pong!",
        MessageKey::CacheStatsTitle => "📦 Cache statistics:",
        MessageKey::NoCaches => "No caches registered.",
        MessageKey::LimitReset => "✅ Rate limit for {actor} has been reset.",
        MessageKey::LimitNotTracked => "{actor} has no active rate limit.",
        MessageKey::ResetLimitUsage => "Usage: resetlimit <user id>",
    }
}

pub fn text(lang: Language, key: MessageKey) -> &'static str {
    match lang {
        Language::Ru => ru(key),
        Language::En => en(key),
    }
}

/// Looks up `key` and substitutes each `{name}` placeholder from `args`.
/// Placeholders without a matching argument are left as-is.
pub fn render(lang: Language, key: MessageKey, args: &[(&str, &str)]) -> String {
    let mut out = text(lang, key).to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}
