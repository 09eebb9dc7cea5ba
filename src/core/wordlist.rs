//! Fixed 104-word recovery phrase wordlist.
//!
//! This list is part of the on-disk / recovery contract: phrases generated
//! by `envsync init` and words accepted by `envsync restore` are drawn from
//! exactly this list, in this order. Do not reorder or resize it.

pub const WORDS: [&str; 104] = [
    "anchor", "anvil", "apple", "arrow", "autumn", "badge", "banjo", "basil",
    "beacon", "bison", "blanket", "bolt", "bramble", "breeze", "bridge", "brisk",
    "bronze", "cabin", "cactus", "candle", "canyon", "cedar", "chalk", "charm",
    "cinder", "clover", "coral", "cosmic", "cradle", "crimson", "crystal", "dawn",
    "delta", "desert", "dove", "drift", "ember", "falcon", "feather", "fern",
    "flint", "forest", "fossil", "garnet", "glacier", "granite", "gravel", "harbor",
    "harvest", "hazel", "hollow", "indigo", "island", "ivory", "jasper", "jungle",
    "kernel", "kettle", "lagoon", "lantern", "lichen", "linen", "lotus", "lumber",
    "maple", "marble", "meadow", "mirror", "moss", "nectar", "nimbus", "nutmeg",
    "oasis", "oracle", "orchid", "otter", "pebble", "pepper", "petal", "pine",
    "pivot", "prairie", "quartz", "quiver", "raven", "reed", "ridge", "river",
    "saffron", "sage", "sapling", "sequoia", "shadow", "shell", "sienna", "slate",
    "sparrow", "spruce", "summit", "thistle", "tide", "timber", "tundra", "velvet",
    "walnut", "willow", "wisp", "zephyr",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn has_exactly_104_words() {
        assert_eq!(WORDS.len(), 104);
    }

    #[test]
    fn words_are_unique() {
        let set: HashSet<&str> = WORDS.iter().copied().collect();
        assert_eq!(set.len(), WORDS.len());
    }

    #[test]
    fn words_are_lowercase_ascii() {
        for w in WORDS.iter() {
            assert!(w.chars().all(|c| c.is_ascii_lowercase()));
        }
    }
}
