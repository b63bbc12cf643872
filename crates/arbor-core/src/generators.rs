//! Standard value generators for the keyword resolver

use crate::keyword::{KeywordRequest, KeywordResolver};
use crate::limits::{
    DEFAULT_GENERATED_DECIMAL, DEFAULT_GENERATED_TEXT_LEN, GENERATED_DECIMAL_FRACTION,
    MAX_GENERATED_DECIMAL, MAX_GENERATED_INTEGER, MAX_GENERATED_TEXT_LEN,
};
use crate::store::Store;
use chrono::{Duration, Local, NaiveDate, NaiveTime};
use ulid::Ulid;

const FIRST_NAMES_MALE: &[&str] = &[
    "James", "John", "Robert", "Michael", "William", "David", "Richard", "Joseph", "Thomas",
    "Charles", "Daniel", "Matthew", "Anthony", "Mark", "Donald", "Steven", "Paul", "Andrew",
    "Joshua", "Kenneth", "Kevin", "Brian", "George", "Edward", "Ronald", "Timothy", "Jason",
    "Jeffrey", "Ryan", "Jacob",
];

const FIRST_NAMES_FEMALE: &[&str] = &[
    "Mary", "Patricia", "Jennifer", "Linda", "Elizabeth", "Barbara", "Susan", "Jessica", "Sarah",
    "Karen", "Nancy", "Lisa", "Betty", "Margaret", "Sandra", "Ashley", "Kimberly", "Emily",
    "Donna", "Michelle", "Dorothy", "Carol", "Amanda", "Melissa", "Deborah", "Stephanie",
    "Rebecca", "Sharon", "Laura", "Cynthia",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson",
];

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Uniform-ish value in `0..bound`, drawn from a fresh ULID's random bits
fn random_below(bound: u64) -> u64 {
    if bound == 0 {
        return 0;
    }
    // 80 random bits leave negligible modulo bias for these bounds
    (Ulid::new().random() % u128::from(bound)) as u64
}

fn random_text(len: u64) -> String {
    (0..len)
        .map(|_| LETTERS[random_below(LETTERS.len() as u64) as usize] as char)
        .collect()
}

/// Non-negative integer parameter no larger than `max`
fn bounded_parameter(parameter: &str, max: u64) -> Option<u64> {
    parameter.parse::<u64>().ok().filter(|n| *n <= max)
}

/// Built-in resolver for `Newid`, names, text, numbers, dates and times
#[derive(Debug, Clone, Default)]
pub struct StandardGenerators {
    next_id: u64,
}

impl StandardGenerators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next numeric id not already used as a node name
    fn new_id(&mut self, store: &Store) -> String {
        loop {
            let candidate = self.next_id.to_string();
            self.next_id += 1;
            if !store.contains_name(&candidate) {
                return candidate;
            }
        }
    }

    fn name(list: &[&str], unique: bool, store: &Store) -> String {
        if !unique {
            return list[random_below(list.len() as u64) as usize].to_string();
        }
        let start = random_below(list.len() as u64) as usize;
        (0..list.len())
            .map(|offset| list[(start + offset) % list.len()])
            .find(|name| !store.contains_name(name) && !store.contains_value(name))
            .map(String::from)
            .unwrap_or_else(|| random_text(DEFAULT_GENERATED_TEXT_LEN))
    }

    fn date(parameter: Option<&str>, format: &str) -> Option<String> {
        let date = match parameter {
            None => {
                let start = NaiveDate::from_ymd_opt(1920, 1, 1)?;
                let end = NaiveDate::from_ymd_opt(2020, 12, 31)?;
                let span = (end - start).num_days() as u64 + 1;
                start + Duration::days(random_below(span) as i64)
            }
            Some(p) if p.eq_ignore_ascii_case("now") => Local::now().date_naive(),
            Some(_) => return None,
        };
        Some(date.format(format).to_string())
    }

    fn time(parameter: Option<&str>, format: &str) -> Option<String> {
        let time = match parameter {
            None => NaiveTime::from_num_seconds_from_midnight_opt(random_below(86_400) as u32, 0)?,
            Some(p) if p.eq_ignore_ascii_case("now") => Local::now().time(),
            Some(_) => return None,
        };
        Some(time.format(format).to_string())
    }
}

impl KeywordResolver for StandardGenerators {
    fn resolve(&mut self, request: &KeywordRequest, store: &Store) -> Option<String> {
        let vocab = store.vocabulary();
        let parameter = request.parameter.as_deref();
        let unique = match parameter {
            None => false,
            Some(p) if p.eq_ignore_ascii_case("unique") => true,
            Some(_) => false,
        };

        match request.keyword.as_str() {
            "Newid" if request.field.is_name() && parameter.is_none() => Some(self.new_id(store)),
            "FirstNameMale" if parameter.is_none() || unique => {
                Some(Self::name(FIRST_NAMES_MALE, unique, store))
            }
            "FirstNameFemale" if parameter.is_none() || unique => {
                Some(Self::name(FIRST_NAMES_FEMALE, unique, store))
            }
            "LastName" if parameter.is_none() || unique => {
                Some(Self::name(LAST_NAMES, unique, store))
            }
            "Text" => {
                let len = match parameter {
                    None => random_below(DEFAULT_GENERATED_TEXT_LEN + 1),
                    Some(p) => bounded_parameter(p, MAX_GENERATED_TEXT_LEN)?,
                };
                Some(random_text(len))
            }
            "Integer" => {
                let max = match parameter {
                    None => i32::MAX as u64,
                    Some(p) => bounded_parameter(p, MAX_GENERATED_INTEGER)?,
                };
                Some(random_below(max + 1).to_string())
            }
            "Decimal" => {
                let max = match parameter {
                    None => DEFAULT_GENERATED_DECIMAL,
                    Some(p) => bounded_parameter(p, MAX_GENERATED_DECIMAL)?,
                };
                Some(format!(
                    "{}.{:02}",
                    random_below(max + 1),
                    random_below(GENERATED_DECIMAL_FRACTION + 1)
                ))
            }
            "Boolean" if parameter.is_none() => {
                Some(if random_below(2) == 0 { "false" } else { "true" }.to_string())
            }
            "Date" => Self::date(parameter, &vocab.date_format),
            "Time" => Self::time(parameter, &vocab.time_format),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::FieldRef;
    use crate::value::ValueType;
    use crate::vocabulary::Vocabulary;
    use std::sync::Arc;

    fn store() -> Store {
        Store::new(Arc::new(Vocabulary::default()))
    }

    fn request(keyword: &str, parameter: Option<&str>, field: FieldRef) -> KeywordRequest {
        KeywordRequest {
            keyword: keyword.into(),
            parameter: parameter.map(String::from),
            field,
        }
    }

    #[test]
    fn test_newid_skips_existing_names() {
        let mut store = store();
        let root = store.root();
        store.insert_or_get_child(root, "0", "").unwrap();
        let mut generators = StandardGenerators::new();
        let name = request("Newid", None, FieldRef::SelectedName);
        assert_eq!(generators.resolve(&name, &store).as_deref(), Some("1"));
        assert_eq!(generators.resolve(&name, &store).as_deref(), Some("2"));

        let value = request("Newid", None, FieldRef::SelectedValue);
        assert_eq!(generators.resolve(&value, &store), None);
    }

    #[test]
    fn test_numbers_respect_parameters() {
        let store = store();
        let mut generators = StandardGenerators::new();
        for _ in 0..50 {
            let n: u64 = generators
                .resolve(&request("Integer", Some("5"), FieldRef::SelectedValue), &store)
                .unwrap()
                .parse()
                .unwrap();
            assert!(n <= 5);

            let text = generators
                .resolve(&request("Text", Some("12"), FieldRef::SelectedValue), &store)
                .unwrap();
            assert_eq!(text.len(), 12);
            assert!(text.chars().all(|c| c.is_ascii_alphabetic()));

            let decimal = generators
                .resolve(&request("Decimal", Some("3"), FieldRef::SelectedValue), &store)
                .unwrap();
            let parsed: f64 = decimal.parse().unwrap();
            assert!(parsed < 4.0);
        }
        assert_eq!(
            generators.resolve(&request("Integer", Some("100000000"), FieldRef::SelectedValue), &store),
            None
        );
        assert_eq!(
            generators.resolve(&request("Text", Some("abc"), FieldRef::SelectedValue), &store),
            None
        );
    }

    #[test]
    fn test_dates_and_times_are_well_formed() {
        let store = store();
        let vocab = Vocabulary::default();
        let mut generators = StandardGenerators::new();
        for parameter in [None, Some("now")] {
            let date = generators
                .resolve(&request("Date", parameter, FieldRef::SelectedValue), &store)
                .unwrap();
            assert!(ValueType::Date.accepts(&date, &vocab), "{}", date);
            let time = generators
                .resolve(&request("Time", parameter, FieldRef::SelectedValue), &store)
                .unwrap();
            assert!(ValueType::Time.accepts(&time, &vocab), "{}", time);
        }
    }

    #[test]
    fn test_unique_names_avoid_existing() {
        let mut store = store();
        let root = store.root();
        for name in LAST_NAMES.iter().skip(1) {
            let (id, _) = store.insert_or_get_child(root, "person", "").unwrap();
            let (last, _) = store.insert_or_get_child(id, name, "").unwrap();
            store.set_value(last, "").unwrap();
        }
        let mut generators = StandardGenerators::new();
        let name = generators
            .resolve(&request("LastName", Some("unique"), FieldRef::SelectedValue), &store)
            .unwrap();
        assert_eq!(name, LAST_NAMES[0]);
    }

    #[test]
    fn test_boolean() {
        let store = store();
        let mut generators = StandardGenerators::new();
        let value = generators
            .resolve(&request("Boolean", None, FieldRef::SelectedValue), &store)
            .unwrap();
        assert!(value == "true" || value == "false");
    }
}
