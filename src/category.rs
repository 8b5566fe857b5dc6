use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Notification channel of an event.
///
/// The category decides which queue an event lands in, which worker
/// processes it and how long processing takes (see [`crate::CategorySettings`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Email,
    Sms,
    Push,
}

impl Category {
    /// Every known category, in declaration order.
    pub const ALL: [Category; 3] = [Category::Email, Category::Sms, Category::Push];

    /// Wire name, as used in callback payloads and configuration keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Email => "EMAIL",
            Category::Sms => "SMS",
            Category::Push => "PUSH",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown category '{s}'")))
    }
}
