use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The size of a time bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Monthly,
    Quarterly,
}

impl Granularity {
    /// Truncates a timestamp to the bucket containing it
    pub fn bucket(self, time: NaiveDateTime) -> TimeBucket {
        let period = match self {
            Granularity::Monthly => time.month(),
            Granularity::Quarterly => (time.month() - 1) / 3 + 1,
        };
        TimeBucket {
            year: time.year(),
            period,
            granularity: self,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Granularity::Monthly => f.write_str("monthly"),
            Granularity::Quarterly => f.write_str("quarterly"),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;
    fn from_str(x: &str) -> Result<Granularity, String> {
        match x.to_ascii_lowercase().as_str() {
            "monthly" | "month" | "m" => Ok(Granularity::Monthly),
            "quarterly" | "quarter" | "q" => Ok(Granularity::Quarterly),
            _ => Err(format!("{:?} is not a granularity (monthly, quarterly)", x)),
        }
    }
}

/// A calendar month or quarter.
///
/// Buckets order chronologically.  Only `Granularity::bucket` constructs
/// them, so `period` is always 1..=12 for months and 1..=4 for quarters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket {
    year: i32,
    period: u32,
    granularity: Granularity,
}

impl TimeBucket {
    pub fn year(self) -> i32 {
        self.year
    }

    /// The month (1-12) or quarter (1-4)
    pub fn period(self) -> u32 {
        self.period
    }

    pub fn granularity(self) -> Granularity {
        self.granularity
    }

    /// The first day of the bucket
    pub fn start(self) -> NaiveDate {
        let month = match self.granularity {
            Granularity::Monthly => self.period,
            Granularity::Quarterly => (self.period - 1) * 3 + 1,
        };
        NaiveDate::from_ymd_opt(self.year, month, 1).expect("bucket periods are valid months")
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.granularity {
            Granularity::Monthly => write!(f, "{:04}-{:02}", self.year, self.period),
            Granularity::Quarterly => write!(f, "{:04}-Q{}", self.year, self.period),
        }
    }
}

impl Serialize for TimeBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn monthly() {
        let b = Granularity::Monthly.bucket(at("2023-11-30 23:59:59"));
        assert_eq!(b.to_string(), "2023-11");
        assert_eq!(b.start(), NaiveDate::from_ymd_opt(2023, 11, 1).unwrap());
    }

    #[test]
    fn quarterly() {
        let q = |s| Granularity::Quarterly.bucket(at(s)).to_string();
        assert_eq!(q("2023-01-01 00:00:00"), "2023-Q1");
        assert_eq!(q("2023-03-31 12:00:00"), "2023-Q1");
        assert_eq!(q("2023-04-01 00:00:00"), "2023-Q2");
        assert_eq!(q("2023-12-31 00:00:00"), "2023-Q4");
        let b = Granularity::Quarterly.bucket(at("2023-08-15 00:00:00"));
        assert_eq!(b.start(), NaiveDate::from_ymd_opt(2023, 7, 1).unwrap());
    }

    #[test]
    fn chronological_order() {
        let g = Granularity::Monthly;
        assert!(g.bucket(at("2022-12-01 00:00:00")) < g.bucket(at("2023-01-01 00:00:00")));
        assert!(g.bucket(at("2023-02-01 00:00:00")) < g.bucket(at("2023-10-01 00:00:00")));
    }

    #[test]
    fn parse() {
        assert_eq!("Quarterly".parse::<Granularity>(), Ok(Granularity::Quarterly));
        assert_eq!("m".parse::<Granularity>(), Ok(Granularity::Monthly));
        assert!("weekly".parse::<Granularity>().is_err());
    }
}
