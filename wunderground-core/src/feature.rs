use chrono::NaiveDate;
use std::{convert::TryFrom, fmt};

use crate::Error;

/// A weather-data facet the provider can return, one path segment per facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Alerts,
    Almanac,
    Astronomy,
    Autocomplete,
    Conditions,
    CurrentHurricane,
    Forecast,
    Forecast10Day,
    Geolookup,
    History(NaiveDate),
    Hourly,
    Hourly7Day,
    Hourly10Day,
    Planner { start: NaiveDate, end: NaiveDate },
    RawTide,
    Tide,
    Webcams,
    Yesterday,
}

impl Feature {
    /// Base name of the feature, without any date suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Alerts => "alerts",
            Feature::Almanac => "almanac",
            Feature::Astronomy => "astronomy",
            Feature::Autocomplete => "autocomplete",
            Feature::Conditions => "conditions",
            Feature::CurrentHurricane => "currenthurricane",
            Feature::Forecast => "forecast",
            Feature::Forecast10Day => "forecast10day",
            Feature::Geolookup => "geolookup",
            Feature::History(_) => "history",
            Feature::Hourly => "hourly",
            Feature::Hourly7Day => "hourly7day",
            Feature::Hourly10Day => "hourly10day",
            Feature::Planner { .. } => "planner",
            Feature::RawTide => "rawtide",
            Feature::Tide => "tide",
            Feature::Webcams => "webcams",
            Feature::Yesterday => "yesterday",
        }
    }

    /// Features that take no parameters.
    pub const fn plain() -> &'static [Feature] {
        &[
            Feature::Alerts,
            Feature::Almanac,
            Feature::Astronomy,
            Feature::Autocomplete,
            Feature::Conditions,
            Feature::CurrentHurricane,
            Feature::Forecast,
            Feature::Forecast10Day,
            Feature::Geolookup,
            Feature::Hourly,
            Feature::Hourly7Day,
            Feature::Hourly10Day,
            Feature::RawTide,
            Feature::Tide,
            Feature::Webcams,
            Feature::Yesterday,
        ]
    }

    /// The queue token, e.g. `conditions`, `history_20240501`, `planner_05010515`.
    pub fn token(&self) -> String {
        match self {
            Feature::History(date) => format!("history_{}", date.format("%Y%m%d")),
            Feature::Planner { start, end } => format!(
                "planner_{}{}",
                start.format("%m%d"),
                end.format("%m%d")
            ),
            other => other.as_str().to_string(),
        }
    }

    /// `history` for a date given as `YYYY-MM-DD` or `YYYYMMDD`.
    pub fn history_from(date: &str) -> Result<Self, Error> {
        Ok(Feature::History(parse_date("date", date)?))
    }

    /// `planner` for a range; both ends must be well-formed dates.
    pub fn planner_from(start: &str, end: &str) -> Result<Self, Error> {
        Ok(Feature::Planner {
            start: parse_date("start", start)?,
            end: parse_date("end", end)?,
        })
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl TryFrom<&str> for Feature {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        if lower == "history" || lower == "planner" {
            return Err(Error::invalid(
                "feature",
                format!("'{lower}' needs a date, use the dedicated constructor"),
            ));
        }

        Feature::plain()
            .iter()
            .find(|f| f.as_str() == lower)
            .copied()
            .ok_or_else(|| Error::invalid("feature", format!("unknown feature '{value}'")))
    }
}

/// Parse a calendar date in `YYYY-MM-DD` or `YYYYMMDD` form.
pub fn parse_date(name: &'static str, value: &str) -> Result<NaiveDate, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid(name, "a date is required"));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .map_err(|_| {
            Error::invalid(
                name,
                format!("'{value}' is not a calendar date (expected YYYY-MM-DD)"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_feature_as_str_roundtrip() {
        for feature in Feature::plain() {
            let parsed = Feature::try_from(feature.as_str())
                .expect("roundtrip should succeed");
            assert_eq!(*feature, parsed);
            assert_eq!(feature.token(), feature.as_str());
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            Feature::try_from("Conditions").unwrap(),
            Feature::Conditions
        );
        assert_eq!(Feature::try_from(" TIDE ").unwrap(), Feature::Tide);
    }

    #[test]
    fn unknown_feature_error() {
        let err = Feature::try_from("doesnotexist").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "feature", .. }));
        assert!(err.to_string().contains("unknown feature"));
    }

    #[test]
    fn dated_features_cannot_be_parsed_by_name() {
        assert!(Feature::try_from("history").is_err());
        assert!(Feature::try_from("planner").is_err());
    }

    #[test]
    fn history_token_encodes_date() {
        let feature = Feature::history_from("2024-05-01").unwrap();
        assert_eq!(feature.token(), "history_20240501");

        let compact = Feature::history_from("20240501").unwrap();
        assert_eq!(feature, compact);
    }

    #[test]
    fn planner_token_encodes_month_day_range() {
        let feature = Feature::planner_from("2024-05-01", "2024-05-15").unwrap();
        assert_eq!(feature.token(), "planner_05010515");
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(Feature::history_from("tomorrow").is_err());
        assert!(Feature::history_from("2024-02-30").is_err());
        assert!(Feature::history_from("").is_err());

        let err = Feature::planner_from("2024-05-01", "").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "end", .. }));

        let err = Feature::planner_from("0501", "2024-05-15").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "start", .. }));
    }
}
