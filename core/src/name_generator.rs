//! Deterministic customer names and service addresses for demo data.

use crate::rng::SeedRng;

pub struct NameGenerator;

impl NameGenerator {
    pub fn full_name(rng: &mut SeedRng) -> String {
        let first = rng.pick(FIRST_NAMES);
        let last = rng.pick(LAST_NAMES);
        format!("{first} {last}")
    }

    /// A street address such as "214 Willow Lane".
    pub fn address(rng: &mut SeedRng) -> String {
        let number = rng.range_inclusive(1, 999);
        let street = rng.pick(STREETS);
        let kind = rng.pick(STREET_KINDS);
        format!("{number} {street} {kind}")
    }
}

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "Michael", "Linda", "David", "Elizabeth",
    "Joseph", "Susan", "Thomas", "Sarah", "Daniel", "Karen", "Samuel", "Nancy",
    "Amina", "Kwame", "Priya", "Wei", "Fatima", "Carlos", "Aisha", "Noah",
    "Grace", "Ibrahim", "Sofia", "Mateo", "Hannah", "Tariq",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Garcia", "Miller", "Davis", "Martinez",
    "Wilson", "Anderson", "Taylor", "Thomas", "Moore", "Lee", "Patel", "Nguyen",
    "Okafor", "Mensah", "Chen", "Haddad", "Rivera", "Khan", "Kim", "Silva",
];

const STREETS: &[&str] = &[
    "Willow", "Reservoir", "River", "Spring", "Lake", "Oak", "Cedar", "Hill",
    "Station", "Mill", "Meadow", "Harbor",
];

const STREET_KINDS: &[&str] = &["Street", "Road", "Lane", "Avenue", "Close"];
