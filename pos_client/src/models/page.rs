use serde::{Deserialize, Serialize};

/// Position in a paginated provider listing.
///
/// Square paginates with opaque tokens, Clover with offset and limit. A
/// listing always starts from [`Cursor::Start`]; providers translate it into
/// their own first-page request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cursor {
    #[default]
    Start,
    Token { token: String },
    Offset { offset: u32, limit: u32 },
}

impl Cursor {
    pub fn token(token: impl Into<String>) -> Self {
        Cursor::Token {
            token: token.into(),
        }
    }

    /// Offset cursor following a page of `received` items, or `None` when the
    /// page was short and the listing is exhausted.
    pub fn next_offset(offset: u32, limit: u32, received: usize) -> Option<Self> {
        if limit == 0 || received < limit as usize {
            None
        } else {
            Some(Cursor::Offset {
                offset: offset + limit,
                limit,
            })
        }
    }
}
