/// One selectable audio track, embedded in the video or loaded from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrackInfo {
    pub index: usize,
    pub label: String,
    pub language: String,
    pub is_external: bool,
}

impl AudioTrackInfo {
    pub fn embedded(index: usize, label: Option<String>, language: Option<String>) -> Self {
        Self {
            index,
            label: label.unwrap_or_else(|| format!("Audio Track {}", index + 1)),
            language: language.unwrap_or_else(|| "unknown".to_string()),
            is_external: false,
        }
    }

    pub fn external(index: usize, file_name: String) -> Self {
        Self {
            index,
            label: file_name,
            language: "external".to_string(),
            is_external: true,
        }
    }

    pub fn menu_label(&self) -> String {
        format!("{} ({})", self.label, self.language)
    }
}
