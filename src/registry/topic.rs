//! Per-room topic drawing
//!
//! Every room carries one current topic, drawn from a fixed pool when the
//! room is created and re-drawn on request. Draws are memoryless uniform
//! picks; consecutive repeats are allowed.

use rand::seq::IndexedRandom;

/// Fixed pool of drawing themes
pub const THEME_POOL: &[&str] = &[
    "Underwater World",
    "Future City",
    "Space Expedition",
    "Cute Animal Party",
    "Autumn Scenery",
    "Abstract Lines",
    "Fairy Tale Castle",
    "Superhero Assembly",
    "Summer Beach",
    "Cyberpunk Street",
    "Shooting Stars",
    "Retro Nostalgia",
    "Food Carnival",
    "Sports Day",
    "Music Festival",
];

/// Draw a topic uniformly at random from the pool
pub fn draw_theme() -> &'static str {
    THEME_POOL
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(THEME_POOL[0])
}
