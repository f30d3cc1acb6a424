use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The point-of-sale provider a retailer is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Origin {
    Clover,
    Square,
}

impl Origin {
    /// Uppercase code used in persisted rows and webhook routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Clover => "CLOVER",
            Origin::Square => "SQUARE",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLOVER" => Ok(Origin::Clover),
            "SQUARE" => Ok(Origin::Square),
            other => Err(format!("unknown POS origin: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("square".parse::<Origin>().unwrap(), Origin::Square);
        assert_eq!(" Clover ".parse::<Origin>().unwrap(), Origin::Clover);
        assert!("toast".parse::<Origin>().is_err());
    }
}
