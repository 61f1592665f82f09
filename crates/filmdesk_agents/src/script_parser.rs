//! Scene-heading parser for screenplay text.
//!
//! Recognises sluglines such as `INT. COFFEE SHOP - DAY` and collects the
//! all-caps character cues that follow each heading until the next one.

use filmdesk_db::{Scene, SceneId};

const TIMES_OF_DAY: [&str; 4] = ["DAY", "NIGHT", "DAWN", "DUSK"];

/// Hours estimated per scene when nothing better is known.
const DEFAULT_SHOOT_HOURS: f64 = 1.5;

struct Heading {
    int_ext: &'static str,
    location: String,
    day_night: String,
}

/// Parse every scene heading in `text`. Scenes are numbered from 1.
pub fn parse_scenes(text: &str) -> Vec<Scene> {
    let mut scenes: Vec<Scene> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(heading) = parse_heading(line) {
            scenes.push(Scene {
                id: SceneId::new(),
                number: scenes.len() as u32 + 1,
                slug: line.to_string(),
                int_ext: heading.int_ext.to_string(),
                day_night: heading.day_night,
                location: heading.location,
                characters: Vec::new(),
                est_shoot_hours: DEFAULT_SHOOT_HOURS,
                complexity: "medium".to_string(),
                notes: String::new(),
            });
            continue;
        }

        if let (Some(scene), Some(name)) = (scenes.last_mut(), character_cue(line)) {
            if !scene.characters.contains(&name) {
                scene.characters.push(name);
            }
        }
    }

    scenes
}

fn parse_heading(line: &str) -> Option<Heading> {
    let upper = line.to_uppercase();
    let (int_ext, rest) = ["INT./EXT.", "INT/EXT", "INT.", "EXT."]
        .iter()
        .find_map(|prefix| upper.strip_prefix(prefix).map(|rest| (*prefix, rest)))?;
    let int_ext = match int_ext {
        "INT." => "INT",
        "EXT." => "EXT",
        _ => "INT/EXT",
    };

    let (location, time) = rest.rsplit_once(" - ")?;
    let time = time.trim();
    if !TIMES_OF_DAY.contains(&time) {
        return None;
    }
    let location = location.trim();
    if location.is_empty() {
        return None;
    }

    Some(Heading {
        int_ext,
        location: title_case(location),
        day_night: time.to_string(),
    })
}

/// An all-caps line is a cue; parentheticals such as `(V.O.)` are dropped.
fn character_cue(line: &str) -> Option<String> {
    let name = match line.find('(') {
        Some(idx) => line[..idx].trim(),
        None => line,
    };
    if name.is_empty() || name.len() > 30 || name.ends_with(':') {
        return None;
    }
    let has_letter = name.chars().any(|c| c.is_ascii_alphabetic());
    let all_caps = name.chars().all(|c| {
        c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ' ' | '\'' | '.' | '-')
    });
    (has_letter && all_caps).then(|| name.to_string())
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
