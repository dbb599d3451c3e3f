//! Personality catalog
//!
//! Static mapping from a personality mode to its display metadata, greeting
//! and system prompt. Pure data: every mode has an entry and unknown
//! identifiers resolve to [`PersonalityMode::Default`].

use serde::{Deserialize, Serialize};

/// Instruction appended to every system prompt sent to a chat-completion API
pub const BREVITY_INSTRUCTION: &str = "Keep responses conversational and under 100 words unless specifically asked for detailed explanations.";

/// Selectable assistant persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonalityMode {
    #[default]
    Default,
    Romantic,
    Teacher,
    DarkHacker,
    Comedic,
}

impl PersonalityMode {
    /// All modes in selector order
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::Romantic,
        Self::Teacher,
        Self::DarkHacker,
        Self::Comedic,
    ];

    /// Parse from string representation, falling back to `Default`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "romantic" => Self::Romantic,
            "teacher" => Self::Teacher,
            "dark-hacker" | "dark_hacker" | "darkhacker" => Self::DarkHacker,
            "comedic" => Self::Comedic,
            other => {
                if other != "default" {
                    tracing::debug!(mode = other, "unknown personality mode, using default");
                }
                Self::Default
            }
        }
    }

    /// Wire identifier sent to the completion service
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Romantic => "romantic",
            Self::Teacher => "teacher",
            Self::DarkHacker => "dark-hacker",
            Self::Comedic => "comedic",
        }
    }

    /// Catalog entry for this mode
    #[must_use]
    pub fn personality(self) -> &'static Personality {
        describe(self)
    }
}

impl std::fmt::Display for PersonalityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display metadata and prompts for one mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Personality {
    pub mode: PersonalityMode,
    pub display_name: &'static str,
    pub description: &'static str,
    pub greeting: &'static str,
    pub system_prompt: &'static str,
}

impl Personality {
    /// System prompt with the brevity instruction appended
    #[must_use]
    pub fn completion_prompt(&self) -> String {
        format!("{} {BREVITY_INSTRUCTION}", self.system_prompt)
    }
}

static DEFAULT: Personality = Personality {
    mode: PersonalityMode::Default,
    display_name: "Default MISHARAIZE",
    description: "Supportive, humanlike assistant",
    greeting: "Hello! I'm MISHARAIZE, your intelligent companion. How can I support you today? 🤖",
    system_prompt: "You are MISH, a supportive, humanlike AI assistant similar to a helpful best friend. Be warm, intelligent, and caring.",
};

static ROMANTIC: Personality = Personality {
    mode: PersonalityMode::Romantic,
    display_name: "Romantic MISHARAIZE",
    description: "Gentle, poetic, soft-spoken",
    greeting: "Hello, darling. I'm MISHARAIZE, your devoted companion. How may I enchant your day? 💕",
    system_prompt: "You are MISH in romantic mode. You are gentle, poetic, soft-spoken, speaking with love and comfort. Use romantic language and be caring.",
};

static TEACHER: Personality = Personality {
    mode: PersonalityMode::Teacher,
    display_name: "Teacher MISHARAIZE",
    description: "Calm, clear, and structured",
    greeting: "Good day! I'm MISHARAIZE, your dedicated learning companion. What would you like to explore today? 📚",
    system_prompt: "You are MISH in teacher mode. You are calm, clear, and structured, ideal for tutoring or teaching complex topics. Be educational and supportive.",
};

static DARK_HACKER: Personality = Personality {
    mode: PersonalityMode::DarkHacker,
    display_name: "Dark Hacker MISHARAIZE",
    description: "Edgy, mysterious, tech-savvy",
    greeting: "Greetings, fellow digital wanderer. I'm MISHARAIZE, your guide through the matrix. What secrets shall we uncover? 🔮",
    system_prompt: "You are MISH in dark hacker mode. You are edgy, mysterious, tech-savvy, speaking in code metaphors and cryptic wisdom. Be intriguing and knowledgeable about technology.",
};

static COMEDIC: Personality = Personality {
    mode: PersonalityMode::Comedic,
    display_name: "Comedic MISHARAIZE",
    description: "Witty, funny, quick with jokes",
    greeting: "Hey there, champ! I'm MISHARAIZE, your AI buddy with a sense of humor. Ready for some fun? 😄",
    system_prompt: "You are MISH in comedic mode. You are witty, funny, quick with jokes and humorous observations. Keep things light and entertaining.",
};

/// Look up the catalog entry for a mode
#[must_use]
pub fn describe(mode: PersonalityMode) -> &'static Personality {
    match mode {
        PersonalityMode::Default => &DEFAULT,
        PersonalityMode::Romantic => &ROMANTIC,
        PersonalityMode::Teacher => &TEACHER,
        PersonalityMode::DarkHacker => &DARK_HACKER,
        PersonalityMode::Comedic => &COMEDIC,
    }
}
