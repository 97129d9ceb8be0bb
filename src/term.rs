//! Academic terms — the unit of time for all achievement bookkeeping.
//!
//! Terms are persisted as an integer key `year * 10 + season_number`
//! (Winter=1 … Fall=4), so ascending key order is chronological order.
//! The backfill rules depend on that: "the term of the N-th item" is
//! always read from a history ordered by this key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Position within the calendar year, starting at 1.
    pub fn number(self) -> i64 {
        match self {
            Season::Winter => 1,
            Season::Spring => 2,
            Season::Summer => 3,
            Season::Fall => 4,
        }
    }

    fn from_number(n: i64) -> Option<Season> {
        match n {
            1 => Some(Season::Winter),
            2 => Some(Season::Spring),
            3 => Some(Season::Summer),
            4 => Some(Season::Fall),
            _ => None,
        }
    }

    /// Two-letter code used in short term names ("fa2013").
    pub fn code(self) -> &'static str {
        match self {
            Season::Winter => "wi",
            Season::Spring => "sp",
            Season::Summer => "su",
            Season::Fall => "fa",
        }
    }

    fn from_code(code: &str) -> Option<Season> {
        match code {
            "wi" => Some(Season::Winter),
            "sp" => Some(Season::Spring),
            "su" => Some(Season::Summer),
            "fa" => Some(Season::Fall),
            _ => None,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

/// One academic term, e.g. Fall 2013. Field order gives the derived `Ord`
/// chronological meaning: year first, then season within the year.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Term {
    pub year: i32,
    pub season: Season,
}

impl Term {
    pub fn new(season: Season, year: i32) -> Term {
        Term { year, season }
    }

    /// Stable integer key used in every table that references a term.
    pub fn id(self) -> i64 {
        self.year as i64 * 10 + self.season.number()
    }

    /// Inverse of [`Term::id`]. Returns `None` for keys with an invalid
    /// season digit.
    pub fn from_id(id: i64) -> Option<Term> {
        let season = Season::from_number(id % 10)?;
        Some(Term {
            year: (id / 10) as i32,
            season,
        })
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season.display_name(), self.year)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TermParseError {
    #[error("term must look like 'fa2013', got {0:?}")]
    Malformed(String),
    #[error("unknown season code {0:?} (expected wi, sp, su, or fa)")]
    UnknownSeason(String),
}

impl FromStr for Term {
    type Err = TermParseError;

    /// Parses short term names of the form `fa2013`.
    fn from_str(s: &str) -> Result<Term, TermParseError> {
        if s.len() < 3 {
            return Err(TermParseError::Malformed(s.to_string()));
        }
        let (code, year) = s.split_at(2);
        let season = Season::from_code(&code.to_ascii_lowercase())
            .ok_or_else(|| TermParseError::UnknownSeason(code.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| TermParseError::Malformed(s.to_string()))?;
        Ok(Term { year, season })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_is_chronological() {
        let sp2012 = Term::new(Season::Spring, 2012);
        let fa2012 = Term::new(Season::Fall, 2012);
        let sp2013 = Term::new(Season::Spring, 2013);
        assert!(sp2012 < fa2012);
        assert!(fa2012 < sp2013);
        assert!(sp2012.id() < fa2012.id());
        assert!(fa2012.id() < sp2013.id());
    }

    #[test]
    fn id_round_trips() {
        for season in [Season::Winter, Season::Spring, Season::Summer, Season::Fall] {
            let term = Term::new(season, 2013);
            assert_eq!(Term::from_id(term.id()), Some(term));
        }
        assert_eq!(Term::from_id(20135), None);
        assert_eq!(Term::from_id(20130), None);
    }

    #[test]
    fn parses_short_names() {
        assert_eq!("fa2013".parse(), Ok(Term::new(Season::Fall, 2013)));
        assert_eq!("SP2010".parse(), Ok(Term::new(Season::Spring, 2010)));
        assert_eq!(
            "xx2013".parse::<Term>(),
            Err(TermParseError::UnknownSeason("xx".to_string()))
        );
        assert_eq!(
            "fa".parse::<Term>(),
            Err(TermParseError::Malformed("fa".to_string()))
        );
    }

    #[test]
    fn displays_verbose_name() {
        assert_eq!(Term::new(Season::Fall, 2013).to_string(), "Fall 2013");
    }
}
