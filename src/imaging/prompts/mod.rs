// ABOUTME: Prompt construction for thumbnail generation requests
// ABOUTME: Static prompt sections live in markdown files compiled into the binary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::Write as _;

use thumbanana_core::constants::generation::{THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use thumbanana_core::models::StylePreset;

const BASE: &str = include_str!("base.md");
const REFERENCES: &str = include_str!("references.md");
const QUALITY: &str = include_str!("quality.md");

const BOLD: &str = include_str!("bold.md");
const MINIMAL: &str = include_str!("minimal.md");
const COMIC: &str = include_str!("comic.md");
const TECH: &str = include_str!("tech.md");

/// Style guidelines for a preset
#[must_use]
pub const fn style_guidelines(style: StylePreset) -> &'static str {
    match style {
        StylePreset::Bold => BOLD,
        StylePreset::Minimal => MINIMAL,
        StylePreset::Comic => COMIC,
        StylePreset::Tech => TECH,
    }
}

/// Full generation prompt for a summarized title
#[must_use]
pub fn build_prompt(summarized_title: &str, style: StylePreset, reference_count: usize) -> String {
    let mut prompt = format!(
        "CRITICAL: Generate the image at exactly {THUMBNAIL_WIDTH}x{THUMBNAIL_HEIGHT} pixels \
         (16:9 landscape). Do NOT create square or portrait images.\n\n"
    );
    prompt.push_str(BASE);
    let _ = write!(prompt, "\nHEADLINE TO FEATURE: \"{summarized_title}\"\n\n");
    prompt.push_str(style_guidelines(style));

    if reference_count > 0 {
        let _ = write!(
            prompt,
            "\n{reference_count} reference image(s) attached. Blend them with the {style} style.\n"
        );
        prompt.push_str(REFERENCES);
    }

    prompt.push('\n');
    prompt.push_str(QUALITY);
    let _ = write!(
        prompt,
        "- Faithful execution of the {style} style\n- Final size {THUMBNAIL_WIDTH}x{THUMBNAIL_HEIGHT}\n"
    );
    prompt.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_title_size_and_style() {
        let prompt = build_prompt("Rust in 10 minutes", StylePreset::Tech, 0);
        assert!(prompt.starts_with("CRITICAL: Generate the image at exactly 1280x720"));
        assert!(prompt.contains("HEADLINE TO FEATURE: \"Rust in 10 minutes\""));
        assert!(prompt.contains("TECH STYLE"));
        assert!(!prompt.contains("REFERENCE IMAGES"));
    }

    #[test]
    fn test_reference_section_only_with_references() {
        let prompt = build_prompt("x", StylePreset::Comic, 2);
        assert!(prompt.contains("2 reference image(s) attached"));
        assert!(prompt.contains("REFERENCE IMAGES"));
    }

    #[test]
    fn test_every_style_has_guidelines() {
        for style in StylePreset::ALL {
            assert!(style_guidelines(style)
                .to_lowercase()
                .contains(style.as_str()));
        }
    }
}
