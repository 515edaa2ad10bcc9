use serde::{Deserialize, Serialize};

use crate::models::content::ImageRow;

/// A titled group on the image page. Images join the section whose `main_title`
/// equals their `img_model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSection {
    pub main_title: String,
    pub sub_title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionImages {
    #[serde(flatten)]
    pub section: PersonaSection,
    pub items: Vec<ImageRow>,
}

pub fn default_sections() -> Vec<PersonaSection> {
    vec![PersonaSection {
        main_title: "image".to_string(),
        sub_title: String::new(),
    }]
}

/// Images whose model matches `model`, keeping store order.
pub fn filter_by_model<'a>(images: &'a [ImageRow], model: &str) -> Vec<&'a ImageRow> {
    images
        .iter()
        .filter(|img| img.img_model.as_deref() == Some(model))
        .collect()
}

/// Splits images into sections. Images matching no section are left out.
pub fn group_sections(sections: &[PersonaSection], images: &[ImageRow]) -> Vec<SectionImages> {
    sections
        .iter()
        .map(|section| SectionImages {
            section: section.clone(),
            items: filter_by_model(images, &section.main_title)
                .into_iter()
                .cloned()
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn image(id: i64, model: Option<&str>) -> ImageRow {
        ImageRow {
            id,
            img_src: format!("https://cdn.example.com/{id}.png"),
            img_title: Some(format!("title {id}")),
            img_model: model.map(str::to_string),
            img_description: None,
            img_width: None,
            img_height: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_group_sections_filters_by_model() {
        let images = vec![
            image(3, Some("image")),
            image(2, Some("video")),
            image(1, Some("image")),
            image(0, None),
        ];
        let grouped = group_sections(&default_sections(), &images);
        assert_eq!(grouped.len(), 1);
        let ids: Vec<i64> = grouped[0].items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 1], "store order is preserved");
    }

    #[test]
    fn test_empty_section_still_listed() {
        let sections = vec![
            PersonaSection {
                main_title: "image".to_string(),
                sub_title: String::new(),
            },
            PersonaSection {
                main_title: "portrait".to_string(),
                sub_title: "people".to_string(),
            },
        ];
        let grouped = group_sections(&sections, &[image(1, Some("image"))]);
        assert_eq!(grouped.len(), 2);
        assert!(grouped[1].items.is_empty());
    }

    #[test]
    fn test_section_serializes_flat() {
        let grouped = group_sections(&default_sections(), &[]);
        let json = serde_json::to_value(&grouped[0]).unwrap();
        assert_eq!(json["main_title"], "image");
        assert!(json["items"].as_array().unwrap().is_empty());
    }
}
