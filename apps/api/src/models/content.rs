use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::masonry::{Dimensions, LayoutRecord};

/// A generated image shown on the image page. Table `"imageData"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ImageRow {
    pub id: i64,
    pub img_src: String,
    pub img_title: Option<String>,
    /// Section key; matched against `PersonaSection::main_title`.
    pub img_model: Option<String>,
    /// The prompt the image was generated from.
    pub img_description: Option<String>,
    pub img_width: Option<i32>,
    pub img_height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl ImageRow {
    /// Stored dimensions, used when the image itself cannot be probed.
    pub fn stored_dimensions(&self) -> Option<Dimensions> {
        match (self.img_width, self.img_height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(Dimensions::new(w as f64, h as f64)),
            _ => None,
        }
    }

    pub fn to_layout_record(&self) -> LayoutRecord {
        LayoutRecord {
            id: self.id.to_string(),
            image_ref: self.img_src.clone(),
            title: self.img_title.clone(),
            caption: self.img_description.clone(),
            fallback: self.stored_dimensions(),
        }
    }
}

/// An entry on the work page. Table `projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub main_title: String,
    pub sub_title: String,
    pub date: String,
    /// Case-study document; projects without one render as plain rows.
    pub link: Option<String>,
    pub img: Option<String>,
    pub position: i32,
}

/// The hero reel on the video page. Table `videos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VideoRow {
    pub id: i64,
    pub title: Option<String>,
    pub src: String,
    pub created_at: DateTime<Utc>,
}
