//! Value vocabularies for the enum-valued columns in tenant stores.
//!
//! The columns themselves are VARCHAR + CHECK; row structs carry plain
//! strings and these types validate at the API boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($name), ": {}"), other)),
                }
            }
        }
    };
}

string_enum!(Personality {
    Formal => "formal",
    Casual => "casual",
    Friendly => "friendly",
    Professional => "professional",
});

string_enum!(AiProvider {
    Chatgpt => "chatgpt",
    Gemini => "gemini",
    Huggingface => "huggingface",
});

string_enum!(ChannelType {
    Whatsapp => "whatsapp",
    Telegram => "telegram",
    Web => "web",
    Api => "api",
});

string_enum!(ConversationStatus {
    Active => "active",
    Resolved => "resolved",
    Pending => "pending",
    Closed => "closed",
});

string_enum!(Sender {
    User => "user",
    Agent => "agent",
});

string_enum!(MessageType {
    Text => "text",
    Image => "image",
    Audio => "audio",
    Document => "document",
    Video => "video",
});

string_enum!(MessageStatus {
    Sent => "sent",
    Delivered => "delivered",
    Read => "read",
    Failed => "failed",
});

string_enum!(SessionStatus {
    Active => "active",
    Inactive => "inactive",
    Ended => "ended",
});
