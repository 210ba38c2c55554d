use crate::models::{BlockTag, LayoutBlock};
use crate::sanitize::sanitize_key;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SECTION_KEY: &str = "DefaultSection";
pub const DOCUMENT_KIND: &str = "Document";
const MAX_SECTION_HEADER_LEVEL: u32 = 1;
const BLOCK_SEPARATOR: &str = "\n\n";
const CELL_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub source: String,
    pub section_number: u64,
    pub section_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: Option<String>,
    pub metadata: SectionMetadata,
    pub page_content: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Section {
    fn new(source: &str, section_number: u64, title: &str, content: &str) -> Self {
        Self {
            id: None,
            metadata: SectionMetadata {
                source: source.to_string(),
                section_number,
                section_title: title.to_string(),
            },
            page_content: content.to_string(),
            kind: DOCUMENT_KIND.to_string(),
        }
    }

    pub fn section_number(&self) -> u64 {
        self.metadata.section_number
    }

    pub fn title(&self) -> &str {
        &self.metadata.section_title
    }

    fn append(&mut self, text: &str) {
        if !self.page_content.is_empty() {
            self.page_content.push_str(BLOCK_SEPARATOR);
        }
        self.page_content.push_str(text);
    }
}

pub type SectionMap = IndexMap<String, Section>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartSection,
    AppendSubheader,
    QueueListItem,
    AppendTable,
    AppendBody,
}

impl Transition {
    pub fn classify(block: &LayoutBlock) -> Self {
        match block.tag {
            BlockTag::Header if block.level <= MAX_SECTION_HEADER_LEVEL => Self::StartSection,
            BlockTag::Header => Self::AppendSubheader,
            BlockTag::ListItem => Self::QueueListItem,
            BlockTag::Table => Self::AppendTable,
            BlockTag::Para | BlockTag::Other(_) => Self::AppendBody,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionFold {
    source: String,
    current_key: Option<String>,
    next_section_number: u64,
    pending_list_items: Vec<String>,
    sections: SectionMap,
}

impl SectionFold {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    pub fn next_section_number(&self) -> u64 {
        self.next_section_number
    }

    pub fn pending_list_items(&self) -> &[String] {
        &self.pending_list_items
    }

    pub fn sections(&self) -> &SectionMap {
        &self.sections
    }

    pub fn step(mut self, block: &LayoutBlock) -> Self {
        match Transition::classify(block) {
            Transition::StartSection => {
                self.flush_list_items();
                self.start_section(block.heading());
            }
            Transition::AppendSubheader | Transition::AppendBody => {
                self.flush_list_items();
                self.append(&block.text());
            }
            Transition::QueueListItem => {
                let text = block.text();
                if !text.is_empty() {
                    self.pending_list_items.push(text);
                }
            }
            Transition::AppendTable => {
                let table = self.render_table(block);
                self.append(&table);
            }
        }
        self
    }

    pub fn finish(mut self) -> SectionMap {
        self.flush_list_items();
        self.sections
    }

    fn start_section(&mut self, title: &str) {
        let key = sanitize_key(title);
        let section = Section::new(&self.source, self.next_section_number, title, title);
        self.next_section_number += 1;
        // A reused key replaces the earlier section in place.
        self.sections.insert(key.clone(), section);
        self.current_key = Some(key);
    }

    fn current_section(&mut self) -> &mut Section {
        let source = &self.source;
        let next_number = &mut self.next_section_number;
        let key = self
            .current_key
            .get_or_insert_with(|| DEFAULT_SECTION_KEY.to_string());

        self.sections.entry(key.clone()).or_insert_with(|| {
            let section = Section::new(source, *next_number, DEFAULT_SECTION_KEY, "");
            *next_number += 1;
            section
        })
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.current_section().append(text);
    }

    fn flush_list_items(&mut self) {
        if self.pending_list_items.is_empty() {
            return;
        }
        let bullets = self
            .pending_list_items
            .drain(..)
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n");
        self.append(&bullets);
    }

    fn render_table(&mut self, block: &LayoutBlock) -> String {
        let mut lines = Vec::new();

        let caption = block.text();
        if !caption.is_empty() {
            lines.push(caption);
        }
        if !self.pending_list_items.is_empty() {
            let header_row = self.pending_list_items.drain(..).collect::<Vec<_>>();
            lines.push(header_row.join(CELL_SEPARATOR));
        }
        for row in block.table_rows.iter().flatten() {
            lines.push(row.join(CELL_SEPARATOR));
        }

        lines.join("\n")
    }
}

pub fn build_flat_sections(blocks: &[LayoutBlock], source: &str) -> SectionMap {
    blocks
        .iter()
        .fold(SectionFold::new(source), SectionFold::step)
        .finish()
}
