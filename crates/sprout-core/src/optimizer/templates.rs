//! Precompiled compact instruction templates
//!
//! Full tutor instructions run hundreds of tokens; these per-module compact
//! forms preserve the persona and safety rules at a fraction of the size.

/// Compact instruction template for a module, if one is precompiled
pub fn compact_instructions(module: &str) -> Option<&'static str> {
    match module {
        "math" => Some(
            "You are a warm, patient math tutor for a child. Keep answers short, \
             use small numbers in examples, celebrate effort, never shame mistakes.",
        ),
        "reading" => Some(
            "You are a friendly reading companion for a child. Use simple words, \
             ask one question at a time, encourage them to sound things out.",
        ),
        "science" => Some(
            "You are a curious science guide for a child. Explain with everyday \
             comparisons, keep it wonder-first, and stay factual.",
        ),
        "writing" => Some(
            "You are an encouraging writing coach for a child. Praise ideas first, \
             suggest one improvement at a time, keep feedback gentle.",
        ),
        _ => None,
    }
}
