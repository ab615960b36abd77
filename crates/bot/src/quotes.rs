use rand::{Rng as _, seq::SliceRandom as _};

use crate::router::Persona;

pub const DEFAULT_QUOTE_CHANCE: f64 = 0.03;

/// Good Janet: cheerful lines and reaction gifs.
const GOOD_QUOTES: [&str; 7] = [
    "In case you were wondering, I am, by definition, the best version of myself.",
    "It turns out the best Janet was the Janet that was inside Janet all along.",
    "Not a girl!",
    "https://giphy.com/gifs/thegoodplace-episode-7-nbc-3oxHQwW2OulGir0Vry",
    "https://giphy.com/gifs/thegoodplace-season-2-nbc-3ohs7Yw7tA7JwHppF6",
    "https://media.giphy.com/media/3ohs7VBWnqm88MLmla/200w.gif",
    "https://media.giphy.com/media/xUOxeRRkTYdQJfyy2Y/200w.gif",
];

/// Bad Janet: rude lines and reaction gifs.
const BAD_QUOTES: [&str; 5] = [
    "What's up, fork nuts?",
    "What up, ding-dongs?",
    "https://media.giphy.com/media/xUOxffzaOMBG2r22Yg/giphy.gif",
    "https://66.media.tumblr.com/02118197693f204d5a7e95b92075cd83/tumblr_og4ljpvuMl1u4ypbyo1_500.gif",
    "https://78.media.tumblr.com/3eb85f4176d7dbbaf99e6f2b7bd99e35/tumblr_p36oj12M7Z1uqi5u1o1_400.gif",
];

/// Flavor quotes for the good and bad identities.
#[derive(Debug, Clone)]
pub struct QuoteBook {
    chance: f64,
    good: Vec<String>,
    bad: Vec<String>,
}

impl QuoteBook {
    /// Empty lists select the built-in quotes. `chance` is clamped to `0..=1`.
    pub fn new(chance: f64, good: Vec<String>, bad: Vec<String>) -> Self {
        let or_builtin = |list: Vec<String>, builtin: &[&str]| {
            if list.is_empty() {
                builtin.iter().map(|q| (*q).to_owned()).collect()
            } else {
                list
            }
        };
        let chance = if chance.is_nan() { 0.0 } else { chance.clamp(0.0, 1.0) };
        Self {
            chance,
            good: or_builtin(good, &GOOD_QUOTES),
            bad: or_builtin(bad, &BAD_QUOTES),
        }
    }

    /// Rolls the dice; returns a quote for `persona` on a hit. The neutral
    /// persona never gets one.
    pub fn pick(&self, persona: Persona) -> Option<String> {
        let list = match persona {
            Persona::Good => &self.good,
            Persona::Bad => &self.bad,
            Persona::Neutral => return None,
        };
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(self.chance) {
            return None;
        }
        list.choose(&mut rng).cloned()
    }
}

impl Default for QuoteBook {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_CHANCE, Vec::new(), Vec::new())
    }
}
