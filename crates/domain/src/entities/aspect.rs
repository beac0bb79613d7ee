use serde::{Deserialize, Serialize};

/// An index card on the scene: situation aspects, stress boxes, consequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aspect {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub checkboxes: Vec<bool>,
    #[serde(default)]
    pub consequences: Vec<String>,
}

impl Aspect {
    /// Clear the card's play state. Title and the number of boxes/slots survive.
    pub fn reset(&mut self) {
        self.content.clear();
        self.checkboxes.iter_mut().for_each(|c| *c = false);
        self.consequences.iter_mut().for_each(String::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_title_and_shape() {
        let mut aspect = Aspect {
            title: "On Fire".to_string(),
            content: "The warehouse burns".to_string(),
            checkboxes: vec![true, false, true],
            consequences: vec!["Singed".to_string()],
        };
        aspect.reset();
        assert_eq!(aspect.title, "On Fire");
        assert!(aspect.content.is_empty());
        assert_eq!(aspect.checkboxes, vec![false, false, false]);
        assert_eq!(aspect.consequences, vec![String::new()]);
    }
}
