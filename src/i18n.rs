use std::env;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn from_str(s: &str) -> Self {
        let s = s.to_lowercase();
        if s.starts_with("zh") {
            Language::Zh
        } else {
            Language::En
        }
    }

    /// Configured preference first, then `LANG`.
    pub fn detect(preference: Option<&str>) -> Self {
        preference
            .map(Self::from_str)
            .or_else(|| env::var("LANG").ok().map(|l| Self::from_str(&l)))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum MessageKey {
    WelcomeMessage,
    PromptUser,
    Waiting,
    NoTab,
    NoModel,
    NoModelLabel,
    TabSaved,
    TabOpened,
    TabClosed,
    HistoryCleared,
    PreferencesSaved,
    ModelsHeader,
    Exported,
    ClosedTabReply,
}

pub fn t(lang: &Language, key: MessageKey) -> &'static str {
    match (lang, key) {
        (Language::En, MessageKey::WelcomeMessage) => {
            "Type a message and press Enter. /help lists commands. Up/Down recall history. Ctrl+C exits."
        }
        (Language::Zh, MessageKey::WelcomeMessage) => {
            "输入消息后按 Enter 发送。/help 查看命令，上/下键调出历史，Ctrl+C 退出。"
        }

        (Language::En, MessageKey::PromptUser) => "you> ",
        (Language::Zh, MessageKey::PromptUser) => "你> ",

        (Language::En, MessageKey::Waiting) => "waiting for reply",
        (Language::Zh, MessageKey::Waiting) => "等待回复中",

        (Language::En, MessageKey::NoTab) => "No tab is open. Use /new to open one.",
        (Language::Zh, MessageKey::NoTab) => "没有打开的标签页，请使用 /new 新建。",

        (Language::En, MessageKey::NoModel) => "This tab has no model. Pick one with /model <name>.",
        (Language::Zh, MessageKey::NoModel) => "当前标签页未选择模型，请使用 /model <名称>。",

        (Language::En, MessageKey::NoModelLabel) => "no model",
        (Language::Zh, MessageKey::NoModelLabel) => "未选择模型",

        (Language::En, MessageKey::TabSaved) => "Tab saved to ",
        (Language::Zh, MessageKey::TabSaved) => "标签页已保存到 ",

        (Language::En, MessageKey::TabOpened) => "Opened tab ",
        (Language::Zh, MessageKey::TabOpened) => "已打开标签页 ",

        (Language::En, MessageKey::TabClosed) => "Closed tab ",
        (Language::Zh, MessageKey::TabClosed) => "已关闭标签页 ",

        (Language::En, MessageKey::HistoryCleared) => "History cleared.",
        (Language::Zh, MessageKey::HistoryCleared) => "历史已清空。",

        (Language::En, MessageKey::PreferencesSaved) => "Preferences saved.",
        (Language::Zh, MessageKey::PreferencesSaved) => "偏好设置已保存。",

        (Language::En, MessageKey::ModelsHeader) => "Models:",
        (Language::Zh, MessageKey::ModelsHeader) => "模型：",

        (Language::En, MessageKey::Exported) => "Transcript written to ",
        (Language::Zh, MessageKey::Exported) => "对话已导出到 ",

        (Language::En, MessageKey::ClosedTabReply) => "A reply arrived for a closed tab and was dropped.",
        (Language::Zh, MessageKey::ClosedTabReply) => "已关闭标签页的回复已被丢弃。",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_str() {
        assert!(matches!(Language::from_str("zh-CN"), Language::Zh));
        assert!(matches!(Language::from_str("zh_TW"), Language::Zh));
        assert!(matches!(Language::from_str("en-US"), Language::En));
        assert!(matches!(Language::from_str("fr"), Language::En));
    }

    #[test]
    fn test_preference_wins_over_environment() {
        assert_eq!(Language::detect(Some("zh")), Language::Zh);
    }

    #[test]
    fn test_prompts_differ_per_language() {
        assert_ne!(
            t(&Language::En, MessageKey::PromptUser),
            t(&Language::Zh, MessageKey::PromptUser)
        );
    }
}
