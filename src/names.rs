use rand::seq::IndexedRandom;

const ADJECTIVES: &[&str] = &[
    "Amber", "Bitter", "Blue", "Bright", "Broken", "Calm", "Crimson", "Dusty", "Electric",
    "Fading", "Golden", "Hidden", "Hollow", "Lazy", "Lonely", "Lucky", "Midnight", "Misty",
    "Neon", "Quiet", "Restless", "Rusty", "Silver", "Sleepy", "Velvet", "Wandering", "Wild",
];

const NOUNS: &[&str] = &[
    "Anchor", "Avenue", "Comet", "Echo", "Ember", "Falcon", "Garden", "Harbor", "Heron",
    "Lantern", "Meadow", "Mirror", "Orchard", "Parade", "Pylon", "River", "Rocket", "Signal",
    "Summit", "Tide", "Tram", "Valley", "Voyage", "Window",
];

/// Supplies the human readable suffix of generated playlist names
pub trait NameGenerator: Send + Sync {
    fn generate(&self) -> String;
}

pub struct WordNames;

impl NameGenerator for WordNames {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Quiet");
        let noun = NOUNS.choose(&mut rng).copied().unwrap_or("River");
        format!("{} {}", adjective, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_an_adjective_and_a_noun() {
        for _ in 0..50 {
            let name = WordNames.generate();
            let parts = name.split(' ').collect::<Vec<_>>();
            assert_eq!(parts.len(), 2, "{}", name);
            assert!(ADJECTIVES.contains(&parts[0]));
            assert!(NOUNS.contains(&parts[1]));
        }
    }
}
