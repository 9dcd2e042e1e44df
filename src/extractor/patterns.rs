//! Text patterns shared by the card pass and the whole-document fallback.

use anyhow::Result;
use regex::Regex;

use crate::model::Stops;

pub struct FarePatterns {
    time: Regex,
    price_usd: Regex,
    price_miles: Regex,
    duration: Regex,
    flight_number: Regex,
    stop_count: Regex,
    carrier_code: String,
}

impl FarePatterns {
    /// Builds the pattern set for one carrier. Flight numbers are recognized
    /// by either the IATA code or the marketing name and always normalized
    /// to the code.
    pub fn new(carrier_code: &str, carrier_name: &str) -> Result<Self> {
        let flight_number = format!(
            r"(?i)\b(?:{}|{})\s?(\d{{1,4}})\b",
            regex::escape(carrier_code),
            regex::escape(carrier_name)
        );

        Ok(FarePatterns {
            // "6:00 AM", "18:30", "9:15pm"
            time: Regex::new(r"\b\d{1,2}:\d{2}(?:\s?(?:AM|PM|am|pm))?")?,
            price_usd: Regex::new(r"\$\d[\d,]*(?:\.\d{2})?")?,
            // "12,500 miles", "12.5k miles", "800 pts"
            price_miles: Regex::new(r"(?i)\b\d[\d,]*(?:\.\d+)?k?\s?(?:miles|points|pts)\b")?,
            // "1h 25m", "2 hr 5 min"
            duration: Regex::new(r"(?i)\b\d{1,2}\s?h(?:rs?)?(?:\s?\d{1,2}\s?m(?:in)?)?\b")?,
            flight_number: Regex::new(&flight_number)?,
            stop_count: Regex::new(r"(?i)\b(\d+)\s?stops?\b")?,
            carrier_code: carrier_code.to_string(),
        })
    }

    /// Every clock time in `text`, in order of appearance.
    pub fn times(&self, text: &str) -> Vec<String> {
        self.time
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    pub fn prices_usd(&self, text: &str) -> Vec<String> {
        self.price_usd
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    pub fn first_price_usd(&self, text: &str) -> Option<String> {
        self.price_usd.find(text).map(|m| m.as_str().to_string())
    }

    pub fn first_price_miles(&self, text: &str) -> Option<String> {
        self.price_miles.find(text).map(|m| m.as_str().to_string())
    }

    pub fn first_duration(&self, text: &str) -> Option<String> {
        self.duration.find(text).map(|m| m.as_str().trim().to_string())
    }

    /// First flight number in `text`, as `"<code> <digits>"`.
    pub fn first_flight_number(&self, text: &str) -> Option<String> {
        self.flight_number
            .captures(text)
            .and_then(|cap| cap.get(1))
            .map(|digits| format!("{} {}", self.carrier_code, digits.as_str()))
    }

    /// Every flight number in `text`, normalized.
    pub fn flight_numbers(&self, text: &str) -> Vec<String> {
        self.flight_number
            .captures_iter(text)
            .filter_map(|cap| cap.get(1))
            .map(|digits| format!("{} {}", self.carrier_code, digits.as_str()))
            .collect()
    }

    pub fn stops(&self, text: &str) -> Option<Stops> {
        let lower = text.to_lowercase();
        if ["nonstop", "non-stop", "non stop"].iter().any(|k| lower.contains(k)) {
            return Some(Stops::Nonstop);
        }

        let cap = self.stop_count.captures(&lower)?;
        match cap.get(1).map(|m| m.as_str()) {
            Some("1") => Some(Stops::OneStop),
            Some("2") => Some(Stops::TwoStop),
            _ => Some(Stops::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn united() -> FarePatterns {
        FarePatterns::new("UA", "United").unwrap()
    }

    #[test]
    fn test_times_with_and_without_meridiem() {
        let p = united();
        assert_eq!(
            p.times("Departs 6:00 AM arrives 18:30 or 9:15pm"),
            vec!["6:00 AM", "18:30", "9:15pm"]
        );
    }

    #[test]
    fn test_time_does_not_keep_trailing_space() {
        let p = united();
        assert_eq!(p.times("18:30 UA 1"), vec!["18:30"]);
    }

    #[test]
    fn test_prices() {
        let p = united();
        assert_eq!(p.first_price_usd("from $1,245.50 total"), Some("$1,245.50".into()));
        assert_eq!(p.first_price_usd("price unavailable $"), None);
        assert_eq!(p.first_price_miles("or 12.5k miles"), Some("12.5k miles".into()));
        assert_eq!(p.first_price_miles("12,500 Miles"), Some("12,500 Miles".into()));
        assert_eq!(p.first_price_miles("no award seats"), None);
    }

    #[test]
    fn test_duration_is_not_a_clock_time() {
        let p = united();
        assert_eq!(p.first_duration("6:00 AM 9:15 AM"), None);
        assert_eq!(p.first_duration("6:00 AM 1h 25m"), Some("1h 25m".into()));
        assert_eq!(p.first_duration("2 hr 5 min"), Some("2 hr 5 min".into()));
    }

    #[test]
    fn test_flight_number_normalized() {
        let p = united();
        assert_eq!(p.first_flight_number("UA 123"), Some("UA 123".into()));
        assert_eq!(p.first_flight_number("ua1234"), Some("UA 1234".into()));
        assert_eq!(p.first_flight_number("United 456"), Some("UA 456".into()));
        assert_eq!(p.first_flight_number("Guam 12"), None);
        assert_eq!(p.flight_numbers("UA 1 and UA 2"), vec!["UA 1", "UA 2"]);
    }

    #[test]
    fn test_other_carrier() {
        let p = FarePatterns::new("DL", "Delta").unwrap();
        assert_eq!(p.first_flight_number("Delta 88"), Some("DL 88".into()));
        assert_eq!(p.first_flight_number("UA 88"), None);
    }

    #[test]
    fn test_stops() {
        let p = united();
        assert_eq!(p.stops("Nonstop"), Some(Stops::Nonstop));
        assert_eq!(p.stops("non-stop service"), Some(Stops::Nonstop));
        assert_eq!(p.stops("1 stop in DEN"), Some(Stops::OneStop));
        assert_eq!(p.stops("2 stops"), Some(Stops::TwoStop));
        assert_eq!(p.stops("11 stops"), Some(Stops::Unknown));
        assert_eq!(p.stops("Non Stop"), Some(Stops::Nonstop));
        assert_eq!(p.stops("Stopover info"), None);
        assert_eq!(p.stops("stops may vary"), None);
        assert_eq!(p.stops("6:00 AM $245"), None);
    }
}
