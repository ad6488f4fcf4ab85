//! Random default nickname.
//!
//! Nicknames look like `DeepEel42`: a nautical adjective and noun plus two
//! digits, kept within the 9 characters RFC 2812 guarantees a server accepts.

use rand::RngExt;

/// Longest nickname every server must accept.
pub const MAX_NICK_LEN: usize = 9;

const SUFFIX_DIGITS: usize = 2;

const ADJECTIVES: &[&str] = &[
    "Coral", "Tidal", "Salty", "Misty", "Foggy", "Brine", "Sandy", "Deep", "Calm", "Rusty",
    "Amber", "Azure", "Teal", "Pearl", "Drift", "Swift", "Quiet", "Lucky", "Wet", "Blue",
];

const NOUNS: &[&str] = &[
    "Crab", "Eel", "Gull", "Tern", "Seal", "Orca", "Skiff", "Buoy", "Reef", "Kelp", "Squid",
    "Pike", "Cod", "Clam", "Dory", "Ketch", "Yawl", "Ray", "Koi", "Auk",
];

/// Adjective/noun pairs short enough to leave room for the digits.
fn fitting_pairs() -> Vec<(&'static str, &'static str)> {
    let budget = MAX_NICK_LEN - SUFFIX_DIGITS;
    ADJECTIVES
        .iter()
        .flat_map(|adj| NOUNS.iter().map(move |noun| (*adj, *noun)))
        .filter(|(adj, noun)| adj.len() + noun.len() <= budget)
        .collect()
}

/// Generate a random nickname like `DeepEel42`.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let pairs = fitting_pairs();
    let num: u8 = rng.random_range(0..100);
    if pairs.is_empty() {
        return format!("marina{:02}", num);
    }
    let (adj, noun) = pairs[rng.random_range(0..pairs.len())];
    format!("{}{}{:02}", adj, noun, num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_shape() {
        for _ in 0..100 {
            let nick = generate_nickname();
            let letters = nick.trim_end_matches(|c: char| c.is_ascii_digit());
            let digits = &nick[letters.len()..];
            assert!(ADJECTIVES.iter().any(|a| letters.starts_with(a)), "{}", nick);
            assert!(NOUNS.iter().any(|n| letters.ends_with(n)), "{}", nick);
            assert_eq!(digits.len(), SUFFIX_DIGITS, "{}", nick);
            assert!(nick.len() <= MAX_NICK_LEN, "{}", nick);
        }
    }

    #[test]
    fn every_pair_fits_the_limit() {
        let pairs = fitting_pairs();
        assert!(pairs.len() >= 30);
        assert!(pairs.iter().all(|(a, n)| a.len() + n.len() + SUFFIX_DIGITS <= MAX_NICK_LEN));
        assert!(!pairs.contains(&("Coral", "Skiff")));
    }
}
