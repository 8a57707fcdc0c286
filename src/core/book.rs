//! Layout of the exported picture book: cover, one spread per page and a
//! closing page. Turning this into an actual file is up to the front-end.

use serde::{Deserialize, Serialize};

use crate::core::snapshot::SavedStory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cover {
    pub title: String,
    pub hero_name: String,
    pub portrait: String,
    pub author_line: String,
    pub date_line: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub page_number: u32,
    pub illustration: String,
    pub text: String,
    /// The card choice that led to this page.
    pub footnote: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closing {
    pub heading: String,
    pub stars: u32,
    pub stars_line: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDocument {
    pub cover: Cover,
    pub spreads: Vec<Spread>,
    pub closing: Closing,
}

impl BookDocument {
    pub fn from_snapshot(story: &SavedStory) -> Self {
        let cover = Cover {
            title: format!("The Adventures of {}", story.hero.name),
            hero_name: story.hero.name.clone(),
            portrait: story.hero.portrait.clone(),
            author_line: format!("Written by {}", story.author_name),
            date_line: format!("Created on {}", story.timestamp.format("%B %-d, %Y")),
        };

        let spreads = story
            .pages
            .iter()
            .map(|page| Spread {
                page_number: page.page_number,
                illustration: page.image.clone(),
                text: page.text.clone(),
                footnote: page
                    .user_choice
                    .as_ref()
                    .map(|choice| format!("Decision: {}", choice)),
            })
            .collect();

        let closing = Closing {
            heading: "The End".to_string(),
            stars: story.stars_collected,
            stars_line: format!("You collected {} Stars!", story.stars_collected),
        };

        Self {
            cover,
            spreads,
            closing,
        }
    }

    /// Suggested file stem, e.g. `Jules_Adventure`.
    pub fn file_stem(&self) -> String {
        let name: String = self
            .cover
            .hero_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_Adventure", name)
    }

    /// Plain-text rendering, used by the preview tool.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", self.cover.title));
        out.push_str(&format!("{}\n{}\n\n", self.cover.author_line, self.cover.date_line));
        for spread in &self.spreads {
            out.push_str(&format!("[{}] {}\n", spread.page_number, spread.text));
            if let Some(note) = &spread.footnote {
                out.push_str(&format!("    {}\n", note));
            }
        }
        out.push_str(&format!("\n{}\n{}\n", self.closing.heading, self.closing.stars_line));
        out
    }
}
