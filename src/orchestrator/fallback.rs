// src/orchestrator/fallback.rs
// Deterministic canned responder used when no provider can answer

struct Rule {
    keywords: &'static [&'static str],
    response: &'static str,
}

// Ordered: the first rule with any keyword contained in the message wins.
static RULES: &[Rule] = &[
    Rule {
        keywords: &["hello", "hi", "hey", "greetings"],
        response: "👋 Hey there! Welcome! I'm so excited to help you today! What can I do for you?",
    },
    Rule {
        keywords: &["bye", "goodbye", "see you", "farewell"],
        response: "Bye! Have an amazing day! Come back anytime! 😊",
    },
    Rule {
        keywords: &["thank", "thanks", "appreciate"],
        response: "You're absolutely welcome! Is there anything else I can help you with? 😊",
    },
    Rule {
        keywords: &["how are you", "how do you do"],
        response: "I'm feeling fantastic! Thanks for asking! Ready to help you with anything! 🚀",
    },
    Rule {
        keywords: &["menu", "options", "start", "begin"],
        response: "🏠 Here's our main menu! Pick your adventure: 📞 Contact | 💼 Services | ⏰ Hours | 📍 Location | 💬 Human Support. What's your choice?",
    },
    Rule {
        keywords: &["contact", "phone", "email", "address", "reach"],
        response: "📞 Here's how to reach us! 📧 support@example.com | 📱 +1 (555) 123-4567 | 🕐 Mon-Fri 9AM-6PM EST | 📍 123 Business Street, Suite 100. Need more info?",
    },
    Rule {
        keywords: &["service", "offer", "provide", "consulting", "support"],
        response: "💼 We offer amazing services! 🎯 Consulting | 🔧 24/7 Tech Support | 📊 Data Analysis | 🚀 Project Management | 💡 Training. Which one sparks your interest?",
    },
    Rule {
        keywords: &["hours", "schedule", "open", "close", "available"],
        response: "⏰ Our hours! 📅 Mon-Fri 9AM-6PM EST | 🌙 Sat 10AM-4PM EST | ❌ Sun Closed | 🚨 Emergency support: 24/7 for premium clients! When works for you?",
    },
    Rule {
        keywords: &["location", "direction", "where", "find", "parking"],
        response: "📍 Find us at 123 Business Street, Suite 100! 🚗 Free parking | 🚌 Bus stop 2 blocks away | ✈️ 15 min from airport. Need directions from your spot?",
    },
    Rule {
        keywords: &["human", "person", "agent", "representative"],
        response: "💬 Let's connect you with a human! 📞 +1 (555) 123-4567 (Mon-Fri 9AM-6PM EST) | 📧 support@example.com | 💻 Live chat on our website! Anything else while you wait?",
    },
    Rule {
        keywords: &["help", "assist"],
        response: "🤝 I'm here to help! You can ask me about: Contact info, Services, Hours, Location, or connect with a human! What interests you?",
    },
];

pub const DEFAULT_FALLBACK_RESPONSE: &str =
    "I'm here to help! Could you rephrase that or give me more context? 🎯";

/// Keyword-matched canned replies. Total and pure: the same message always
/// produces the same response, and no input fails.
pub struct FallbackResponder;

impl FallbackResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn respond(&self, message: &str) -> &'static str {
        let normalized = message.to_lowercase();
        RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| normalized.contains(k)))
            .map(|rule| rule.response)
            .unwrap_or(DEFAULT_FALLBACK_RESPONSE)
    }
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new()
    }
}
