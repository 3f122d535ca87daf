//! Word rendering of key longids.
//!
//! A longid is sixteen hex characters; users cannot compare those
//! reliably. Each byte maps to one word from a fixed 256-word list, so a
//! longid renders as eight words that are easy to read out loud. The list
//! must never be reordered: renderings are compared across installations.

const WORDS: [&str; 256] = [
    "acid", "also", "apex", "aqua", "arch", "atom", "aunt", "award",
    "back", "bald", "bank", "barn", "bath", "bead", "beam", "bean",
    "bell", "belt", "bend", "bike", "bird", "blue", "boat", "bold",
    "bone", "book", "born", "both", "bowl", "brick", "bride", "brook",
    "brush", "bulb", "burn", "bush", "cabin", "cake", "calm", "camp",
    "card", "cart", "cave", "chair", "chalk", "charm", "chef", "chess",
    "chief", "child", "choir", "cider", "city", "clay", "cliff", "clock",
    "cloud", "coal", "coast", "coin", "cold", "coral", "cork", "corn",
    "crane", "creek", "crisp", "crop", "crow", "cube", "curl", "dance",
    "dawn", "deck", "deep", "deer", "desk", "dime", "dock", "dome",
    "door", "dove", "draw", "drum", "dusk", "dust", "each", "earth",
    "east", "echo", "edge", "elder", "elm", "ember", "face", "fair",
    "fall", "farm", "fast", "fern", "field", "fire", "firm", "fish",
    "flag", "flame", "flash", "fleet", "flint", "flood", "floor", "flour",
    "flute", "foam", "fog", "fork", "fort", "fox", "frame", "frost",
    "fruit", "gate", "gem", "gift", "glad", "glass", "glen", "globe",
    "gold", "good", "grain", "grand", "grape", "grass", "green", "grove",
    "gulf", "hall", "hand", "harbor", "hawk", "hazel", "heart", "hedge",
    "herb", "hill", "hive", "home", "honey", "hook", "horn", "horse",
    "house", "husk", "ice", "inch", "iron", "island", "ivory", "ivy",
    "jade", "jar", "jazz", "jewel", "join", "judge", "juice", "jump",
    "keel", "keen", "keep", "kind", "king", "kite", "knee", "knit",
    "lace", "lake", "lamp", "land", "lark", "leaf", "ledge", "lemon",
    "light", "lily", "lime", "linen", "lion", "loaf", "lodge", "loft",
    "long", "loom", "lunar", "lute", "maid", "main", "maple", "marsh",
    "mast", "meadow", "mellow", "mild", "mill", "mint", "moon", "moss",
    "moth", "mount", "music", "nest", "night", "noble", "north", "note",
    "oak", "oar", "ocean", "olive", "opal", "orbit", "otter", "owl",
    "palm", "park", "peach", "pearl", "pine", "plain", "plum", "pond",
    "press", "prime", "quail", "quart", "queen", "quill", "rain", "reef",
    "ridge", "river", "robin", "rose", "sage", "sand", "shell", "silk",
    "slate", "snow", "spark", "spring", "star", "stone", "swan", "tide",
];

/// Render a 16-hex-char longid as eight words.
///
/// Returns None for inputs that are not a well-formed longid.
pub fn mnemonic(longid: &str) -> Option<String> {
    if longid.len() != 16 || !longid.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = hex::decode(longid).ok()?;
    let words: Vec<&str> = bytes.iter().map(|b| WORDS[*b as usize]).collect();
    Some(words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonic_is_stable() {
        assert_eq!(
            mnemonic("0000000000000000").as_deref(),
            Some("acid acid acid acid acid acid acid acid")
        );
        assert_eq!(
            mnemonic("66AC6C8CCA7019A2").as_deref(),
            mnemonic("66ac6c8cca7019a2").as_deref()
        );
    }

    #[test]
    fn test_mnemonic_rejects_bad_shapes() {
        assert_eq!(mnemonic("123"), None);
        assert_eq!(mnemonic("GGGGGGGGGGGGGGGG"), None);
    }
}
