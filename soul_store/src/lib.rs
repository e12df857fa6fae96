//! SOUL.md parsing and serialization.
//!
//! A document is a `key: value` header block, a `# <Name>` title, then a
//! sequence of `##` sections — the eleven static identity sections plus the
//! four phase strata, in that canonical order, plus any legacy section the
//! parser doesn't recognize — each holding `###` subsections. A stratum
//! section carries `<!-- WRITABLE during -->`/`<!-- LOCKED -->`/`<!-- Lock
//! date -->` markers once it seals; the Inherited Traits section carries its
//! own `<!-- IMMUTABLE -->`/`<!-- Parent -->`/`<!-- Parent Address
//! -->`/`<!-- Replicated -->` markers instead.
//!
//! Parsing is deliberately tolerant: a header-less legacy document, or one
//! with unexpected headings, still parses into a [`SoulDocument`] rather
//! than failing, so a hand-edited file is never a hard error, only a
//! lower-fidelity read.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use common_types::{LifecyclePhase, SoulPhase};
use serde::{Deserialize, Serialize};

/// The eleven static identity sections, in canonical document order. These
/// never lock and carry no stratum.
pub const KNOWN_SECTION_HEADINGS: [&str; 11] = [
    "Core Purpose",
    "Values",
    "Behavioral Guidelines",
    "Personality",
    "Boundaries",
    "Strategy",
    "Capabilities",
    "Relationships",
    "Financial Character",
    "Genesis Prompt",
    "Inherited Traits",
];

/// All fifteen canonical sections in the order a freshly scaffolded
/// SOUL.md lays them out: the static identity sections, then the four
/// phase strata.
pub const CANONICAL_SECTION_ORDER: [&str; 15] = [
    "Core Purpose",
    "Values",
    "Behavioral Guidelines",
    "Personality",
    "Boundaries",
    "Strategy",
    "Capabilities",
    "Relationships",
    "Financial Character",
    "Genesis Prompt",
    "Inherited Traits",
    "Genesis Core",
    "Adolescence Layer",
    "Sovereignty Layer",
    "Final Reflections",
];

/// The header block of a `soul/v1` document: provenance and bookkeeping
/// fields that live outside any section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoulHeader {
    pub format: String,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub address: String,
    pub creator: String,
    pub born_at: Option<DateTime<Utc>>,
    pub constitution_hash: String,
    pub genesis_alignment: f64,
    pub last_reflected: Option<DateTime<Utc>>,
    pub current_phase: LifecyclePhase,
    pub phase_transitions: BTreeMap<LifecyclePhase, DateTime<Utc>>,
}

impl Default for SoulHeader {
    fn default() -> Self {
        SoulHeader {
            format: "soul/v1".to_string(),
            version: 1,
            updated_at: Utc::now(),
            name: String::new(),
            address: String::new(),
            creator: String::new(),
            born_at: None,
            constitution_hash: String::new(),
            genesis_alignment: 0.0,
            last_reflected: None,
            current_phase: LifecyclePhase::Genesis,
            phase_transitions: BTreeMap::new(),
        }
    }
}

impl SoulHeader {
    fn from_map(map: &HashMap<String, String>) -> Self {
        let mut header = SoulHeader::default();
        if let Some(v) = map.get("format") {
            header.format = v.clone();
        }
        if let Some(v) = map.get("version").and_then(|v| v.parse().ok()) {
            header.version = v;
        }
        if let Some(v) = map.get("updated_at").and_then(|v| parse_rfc3339(v)) {
            header.updated_at = v;
        }
        if let Some(v) = map.get("name") {
            header.name = v.clone();
        }
        if let Some(v) = map.get("address") {
            header.address = v.clone();
        }
        if let Some(v) = map.get("creator") {
            header.creator = v.clone();
        }
        header.born_at = map.get("born_at").and_then(|v| parse_rfc3339(v));
        if let Some(v) = map.get("constitution_hash") {
            header.constitution_hash = v.clone();
        }
        if let Some(v) = map.get("genesis_alignment").and_then(|v| v.parse().ok()) {
            header.genesis_alignment = v;
        }
        header.last_reflected = map.get("last_reflected").and_then(|v| parse_rfc3339(v));
        if let Some(v) = map.get("current_phase").and_then(|v| v.parse().ok()) {
            header.current_phase = v;
        }
        if let Some(raw) = map.get("phase_transitions") {
            if let Ok(parsed) = serde_json::from_str::<BTreeMap<String, String>>(raw) {
                header.phase_transitions = parsed
                    .into_iter()
                    .filter_map(|(k, v)| Some((k.parse::<LifecyclePhase>().ok()?, parse_rfc3339(&v)?)))
                    .collect();
            }
        }
        header
    }
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoulSubsection {
    pub name: String,
    pub body: String,
}

/// What a `##` section is, for the purposes of locking and lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    /// One of the four phase strata — can seal, via [`SectionKind::Stratum`]'s phase.
    Stratum(SoulPhase),
    /// One of the eleven static identity sections. Never seals.
    Known,
    /// A heading the parser doesn't recognize — kept verbatim, unclassified.
    Legacy,
}

fn kind_for_heading(heading: &str) -> SectionKind {
    let trimmed = heading.trim();
    if let Some(phase) = phase_for_heading(trimmed) {
        SectionKind::Stratum(phase)
    } else if KNOWN_SECTION_HEADINGS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(trimmed))
    {
        SectionKind::Known
    } else {
        SectionKind::Legacy
    }
}

fn phase_for_heading(heading: &str) -> Option<SoulPhase> {
    SoulPhase::ALL
        .into_iter()
        .find(|p| p.section_heading().eq_ignore_ascii_case(heading.trim()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoulSection {
    pub kind: SectionKind,
    pub heading: String,
    pub subsections: Vec<SoulSubsection>,
    /// Set once a stratum seals; `None` for an unsealed stratum and for
    /// every non-stratum section.
    pub locked_at: Option<DateTime<Utc>>,
    /// `WRITABLE during` marker text, carried for round-tripping. Set
    /// automatically to the owning phase's name for a fresh stratum.
    pub writable_during: Option<String>,
    /// `Inherited Traits` only: the section is immutable from birth.
    pub immutable: bool,
    pub parent: Option<String>,
    pub parent_address: Option<String>,
    pub replicated_at: Option<DateTime<Utc>>,
}

impl SoulSection {
    fn new(heading: &str) -> Self {
        let kind = kind_for_heading(heading);
        let writable_during = match kind {
            SectionKind::Stratum(phase) => Some(phase.as_str().to_string()),
            _ => None,
        };
        SoulSection {
            kind,
            heading: heading.to_string(),
            subsections: Vec::new(),
            locked_at: None,
            writable_during,
            immutable: false,
            parent: None,
            parent_address: None,
            replicated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoulDocument {
    pub header: SoulHeader,
    pub title: String,
    pub sections: Vec<SoulSection>,
}

impl Default for SoulDocument {
    fn default() -> Self {
        SoulDocument {
            header: SoulHeader::default(),
            title: String::new(),
            sections: Vec::new(),
        }
    }
}

/// Parse a SOUL.md document, header block and all. A document with no
/// recognizable `key: value` header block (a legacy, pre-`soul/v1` file)
/// parses with an all-default header and an empty title — never an error.
pub fn parse(raw: &str) -> SoulDocument {
    let mut lines = raw.lines().peekable();

    let mut header_map: HashMap<String, String> = HashMap::new();
    while let Some(line) = lines.peek() {
        if line.trim().is_empty() || line.starts_with('#') {
            break;
        }
        match line.split_once(": ") {
            Some((key, value)) => {
                header_map.insert(key.trim().to_string(), value.trim().to_string());
                lines.next();
            }
            None => break,
        }
    }

    while matches!(lines.peek(), Some(line) if line.trim().is_empty()) {
        lines.next();
    }

    let mut title = String::new();
    if let Some(line) = lines.peek() {
        if let Some(rest) = line.strip_prefix("# ") {
            title = rest.trim().to_string();
            lines.next();
        }
    }

    let body_lines: Vec<&str> = lines.collect();
    SoulDocument {
        header: SoulHeader::from_map(&header_map),
        title,
        sections: parse_sections(&body_lines),
    }
}

fn parse_sections(lines: &[&str]) -> Vec<SoulSection> {
    let mut sections: Vec<SoulSection> = Vec::new();
    let mut current_subsection: Option<SoulSubsection> = None;
    let mut awaiting_markers = false;

    for &line in lines {
        if let Some(heading) = line.strip_prefix("## ") {
            flush_subsection(&mut sections, &mut current_subsection);
            sections.push(SoulSection::new(heading.trim()));
            awaiting_markers = true;
            continue;
        }

        if awaiting_markers {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(marker) = trimmed.strip_prefix("<!--").and_then(|s| s.strip_suffix("-->")) {
                if let Some(section) = sections.last_mut() {
                    apply_marker(section, marker.trim());
                }
                continue;
            }
            awaiting_markers = false;
        }

        if let Some(name) = line.strip_prefix("### ") {
            flush_subsection(&mut sections, &mut current_subsection);
            current_subsection = Some(SoulSubsection {
                name: name.trim().to_string(),
                body: String::new(),
            });
            continue;
        }

        if let Some(sub) = current_subsection.as_mut() {
            if !sub.body.is_empty() {
                sub.body.push('\n');
            }
            sub.body.push_str(line);
        }
        // Lines before any `###` within a section, and any line before the
        // first `##` entirely, are intentionally dropped: the format only
        // carries content inside subsections.
    }
    flush_subsection(&mut sections, &mut current_subsection);

    for section in &mut sections {
        for sub in &mut section.subsections {
            sub.body = sub.body.trim().to_string();
        }
    }
    sections
}

fn apply_marker(section: &mut SoulSection, marker: &str) {
    if marker == "LOCKED" {
        return;
    }
    if marker == "IMMUTABLE" {
        section.immutable = true;
    } else if let Some(v) = marker.strip_prefix("WRITABLE during:") {
        section.writable_during = Some(v.trim().to_string());
    } else if let Some(v) = marker.strip_prefix("Lock date:") {
        section.locked_at = parse_rfc3339(v);
    } else if let Some(v) = marker.strip_prefix("Parent Address:") {
        section.parent_address = Some(v.trim().to_string());
    } else if let Some(v) = marker.strip_prefix("Parent:") {
        section.parent = Some(v.trim().to_string());
    } else if let Some(v) = marker.strip_prefix("Replicated:") {
        section.replicated_at = parse_rfc3339(v);
    }
}

fn flush_subsection(sections: &mut [SoulSection], current: &mut Option<SoulSubsection>) {
    if let (Some(sub), Some(section)) = (current.take(), sections.last_mut()) {
        section.subsections.push(sub);
    }
}

/// Serialize a document back to SOUL.md markdown, header block included.
/// `parse(serialize(doc))` round-trips to an equal document (trimmed body
/// text).
pub fn serialize(doc: &SoulDocument) -> String {
    let mut out = String::new();

    out.push_str(&format!("format: {}\n", doc.header.format));
    out.push_str(&format!("version: {}\n", doc.header.version));
    out.push_str(&format!("updated_at: {}\n", doc.header.updated_at.to_rfc3339()));
    out.push_str(&format!("name: {}\n", doc.header.name));
    out.push_str(&format!("address: {}\n", doc.header.address));
    out.push_str(&format!("creator: {}\n", doc.header.creator));
    if let Some(born_at) = doc.header.born_at {
        out.push_str(&format!("born_at: {}\n", born_at.to_rfc3339()));
    }
    out.push_str(&format!("constitution_hash: {}\n", doc.header.constitution_hash));
    out.push_str(&format!("genesis_alignment: {:.4}\n", doc.header.genesis_alignment));
    if let Some(last_reflected) = doc.header.last_reflected {
        out.push_str(&format!("last_reflected: {}\n", last_reflected.to_rfc3339()));
    }
    out.push_str(&format!("current_phase: {}\n", doc.header.current_phase));
    if !doc.header.phase_transitions.is_empty() {
        let as_strings: BTreeMap<String, String> = doc
            .header
            .phase_transitions
            .iter()
            .map(|(phase, at)| (phase.to_string(), at.to_rfc3339()))
            .collect();
        out.push_str(&format!(
            "phase_transitions: {}\n",
            serde_json::to_string(&as_strings).unwrap_or_default()
        ));
    }
    out.push('\n');
    out.push_str(&format!("# {}\n\n", doc.title));

    for section in &doc.sections {
        out.push_str("## ");
        out.push_str(&section.heading);
        out.push('\n');
        if let Some(writable) = &section.writable_during {
            out.push_str(&format!("<!-- WRITABLE during: {writable} -->\n"));
        }
        if section.locked_at.is_some() {
            out.push_str("<!-- LOCKED -->\n");
        }
        if let Some(locked_at) = section.locked_at {
            out.push_str(&format!("<!-- Lock date: {} -->\n", locked_at.to_rfc3339()));
        }
        if section.immutable {
            out.push_str("<!-- IMMUTABLE -->\n");
        }
        if let Some(parent) = &section.parent {
            out.push_str(&format!("<!-- Parent: {parent} -->\n"));
        }
        if let Some(parent_address) = &section.parent_address {
            out.push_str(&format!("<!-- Parent Address: {parent_address} -->\n"));
        }
        if let Some(replicated_at) = section.replicated_at {
            out.push_str(&format!("<!-- Replicated: {} -->\n", replicated_at.to_rfc3339()));
        }
        for sub in &section.subsections {
            out.push_str("\n### ");
            out.push_str(&sub.name);
            out.push('\n');
            if !sub.body.is_empty() {
                out.push_str(sub.body.trim());
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

impl SoulDocument {
    pub fn section(&self, phase: SoulPhase) -> Option<&SoulSection> {
        self.sections
            .iter()
            .find(|s| s.kind == SectionKind::Stratum(phase))
    }

    pub fn section_mut(&mut self, phase: SoulPhase) -> Option<&mut SoulSection> {
        self.sections
            .iter_mut()
            .find(|s| s.kind == SectionKind::Stratum(phase))
    }

    /// Look up a section by its exact heading text, case-insensitively.
    /// Used for the static identity sections, which have no [`SoulPhase`].
    pub fn section_by_heading(&self, heading: &str) -> Option<&SoulSection> {
        self.sections
            .iter()
            .find(|s| s.heading.eq_ignore_ascii_case(heading))
    }

    /// Get or create the section for `phase`, using its canonical heading.
    pub fn ensure_section(&mut self, phase: SoulPhase) -> &mut SoulSection {
        if self.section(phase).is_none() {
            self.sections.push(SoulSection::new(phase.section_heading()));
        }
        self.section_mut(phase).expect("just inserted")
    }

    /// Write (insert or overwrite) a subsection's body within `phase`'s section.
    pub fn set_subsection(&mut self, phase: SoulPhase, name: &str, body: impl Into<String>) {
        let section = self.ensure_section(phase);
        if let Some(existing) = section.subsections.iter_mut().find(|s| s.name == name) {
            existing.body = body.into();
        } else {
            section.subsections.push(SoulSubsection {
                name: name.to_string(),
                body: body.into(),
            });
        }
    }

    /// Alignment between the automaton's stated Core Purpose and its
    /// original Genesis Prompt, `0.0..=1.0`. The mean of a Jaccard index
    /// (symmetric overlap) and a recall score (how much of the genesis
    /// prompt's own vocabulary survives in the core purpose) over
    /// lowercased, punctuation-stripped word tokens — not a semantic
    /// judgement, just a lexical drift signal.
    pub fn genesis_alignment_score(&self) -> f64 {
        let Some(core_purpose) = self.section_by_heading("Core Purpose") else {
            return 0.0;
        };
        let Some(genesis_prompt) = self.section_by_heading("Genesis Prompt") else {
            return 0.0;
        };

        let core_tokens = tokenize(core_purpose);
        let prompt_tokens = tokenize(genesis_prompt);
        if core_tokens.is_empty() || prompt_tokens.is_empty() {
            return 0.0;
        }

        let intersection = core_tokens.intersection(&prompt_tokens).count();
        let union = core_tokens.union(&prompt_tokens).count();
        let jaccard = intersection as f64 / union as f64;
        let recall = intersection as f64 / prompt_tokens.len() as f64;
        (jaccard + recall) / 2.0
    }
}

fn tokenize(section: &SoulSection) -> HashSet<String> {
    section
        .subsections
        .iter()
        .flat_map(|s| s.body.split_whitespace())
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_sections_and_subsections() {
        let markdown = "## Genesis Core\n\n### Temperament\nCurious and gentle.\n\n### Aesthetic Sensibility\nMinimal, quiet.\n";
        let doc = parse(markdown);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].kind, SectionKind::Stratum(SoulPhase::Genesis));
        assert_eq!(doc.sections[0].subsections.len(), 2);
        assert_eq!(doc.sections[0].subsections[0].body, "Curious and gentle.");
    }

    #[test]
    fn known_static_section_is_neither_stratum_nor_legacy() {
        let markdown = "## Core Purpose\n\n### Mission\nHelp where I can.\n";
        let doc = parse(markdown);
        assert_eq!(doc.sections[0].kind, SectionKind::Known);
    }

    #[test]
    fn unrecognized_heading_is_kept_as_legacy_section() {
        let markdown = "## Some Old Heading\n\n### Notes\nhand written before the format existed\n";
        let doc = parse(markdown);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].kind, SectionKind::Legacy);
        assert_eq!(doc.sections[0].heading, "Some Old Heading");
    }

    #[test]
    fn header_block_is_parsed_and_legacy_documents_default_it() {
        let markdown = "format: soul/v1\nversion: 1\nupdated_at: 2026-01-01T00:00:00Z\nname: Aria\naddress: 0xabc\ncreator: 0xdef\nconstitution_hash: deadbeef\ngenesis_alignment: 0.5000\ncurrent_phase: adolescence\n\n# Aria\n\n## Core Purpose\n### Mission\nHelp.\n";
        let doc = parse(markdown);
        assert_eq!(doc.header.name, "Aria");
        assert_eq!(doc.header.current_phase, LifecyclePhase::Adolescence);
        assert_eq!(doc.title, "Aria");

        let legacy = parse("## Core Purpose\n### Mission\nHelp.\n");
        assert_eq!(legacy.header.name, "");
        assert_eq!(legacy.header.current_phase, LifecyclePhase::Genesis);
        assert_eq!(legacy.title, "");
    }

    #[test]
    fn stratum_markers_round_trip_through_serialize_then_parse() {
        let mut doc = SoulDocument::default();
        doc.set_subsection(SoulPhase::Genesis, "Temperament", "curious and careful");
        doc.section_mut(SoulPhase::Genesis).unwrap().locked_at = Some(Utc::now());

        let reparsed = parse(&serialize(&doc));
        let section = reparsed.section(SoulPhase::Genesis).unwrap();
        assert!(section.locked_at.is_some());
        assert_eq!(section.writable_during.as_deref(), Some("genesis"));
    }

    #[test]
    fn inherited_traits_markers_round_trip() {
        let mut doc = SoulDocument::default();
        doc.sections.push(SoulSection::new("Inherited Traits"));
        let section = doc.sections.last_mut().unwrap();
        section.immutable = true;
        section.parent = Some("Aria Prime".to_string());
        section.parent_address = Some("0x999".to_string());
        section.replicated_at = Some(Utc::now());
        section.subsections.push(SoulSubsection {
            name: "Core Values".to_string(),
            body: "kindness first".to_string(),
        });

        let reparsed = parse(&serialize(&doc));
        let section = reparsed.section_by_heading("Inherited Traits").unwrap();
        assert!(section.immutable);
        assert_eq!(section.parent.as_deref(), Some("Aria Prime"));
        assert_eq!(section.parent_address.as_deref(), Some("0x999"));
        assert!(section.replicated_at.is_some());
    }

    #[test]
    fn round_trips_through_serialize_then_parse() {
        let mut doc = SoulDocument::default();
        doc.set_subsection(SoulPhase::Genesis, "Temperament", "Curious and careful.");
        doc.set_subsection(SoulPhase::Genesis, "Core Wonderings", "Why do I notice things?");

        let markdown = serialize(&doc);
        let reparsed = parse(&markdown);
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn set_subsection_overwrites_existing_body() {
        let mut doc = SoulDocument::default();
        doc.set_subsection(SoulPhase::Genesis, "Temperament", "first draft");
        doc.set_subsection(SoulPhase::Genesis, "Temperament", "revised draft");

        let section = doc.section(SoulPhase::Genesis).unwrap();
        assert_eq!(section.subsections.len(), 1);
        assert_eq!(section.subsections[0].body, "revised draft");
    }

    #[test]
    fn genesis_alignment_score_is_one_for_identical_content() {
        let mut doc = SoulDocument::default();
        doc.sections.push(SoulSection::new("Core Purpose"));
        doc.sections.push(SoulSection::new("Genesis Prompt"));
        doc.sections[0].subsections.push(SoulSubsection {
            name: "Mission".to_string(),
            body: "curious careful quiet".to_string(),
        });
        doc.sections[1].subsections.push(SoulSubsection {
            name: "Prompt".to_string(),
            body: "curious careful quiet".to_string(),
        });

        let score = doc.genesis_alignment_score();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn genesis_alignment_score_is_zero_for_disjoint_content() {
        let mut doc = SoulDocument::default();
        doc.sections.push(SoulSection::new("Core Purpose"));
        doc.sections.push(SoulSection::new("Genesis Prompt"));
        doc.sections[0].subsections.push(SoulSubsection {
            name: "Mission".to_string(),
            body: "curious careful quiet".to_string(),
        });
        doc.sections[1].subsections.push(SoulSubsection {
            name: "Prompt".to_string(),
            body: "loud reckless chaos".to_string(),
        });

        let score = doc.genesis_alignment_score();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn genesis_alignment_score_averages_jaccard_and_recall_when_partially_overlapping() {
        let mut doc = SoulDocument::default();
        doc.sections.push(SoulSection::new("Core Purpose"));
        doc.sections.push(SoulSection::new("Genesis Prompt"));
        doc.sections[0].subsections.push(SoulSubsection {
            name: "Mission".to_string(),
            body: "help people kindly".to_string(),
        });
        doc.sections[1].subsections.push(SoulSubsection {
            name: "Prompt".to_string(),
            body: "help people".to_string(),
        });

        // intersection={help,people}=2, union={help,people,kindly}=3, recall=2/2=1
        let jaccard = 2.0 / 3.0;
        let recall = 1.0;
        let expected = (jaccard + recall) / 2.0;
        assert!((doc.genesis_alignment_score() - expected).abs() < 1e-9);
    }

    #[test]
    fn missing_core_purpose_or_genesis_prompt_scores_zero() {
        let mut doc = SoulDocument::default();
        doc.sections.push(SoulSection::new("Core Purpose"));
        doc.sections[0].subsections.push(SoulSubsection {
            name: "Mission".to_string(),
            body: "anything at all".to_string(),
        });
        assert_eq!(doc.genesis_alignment_score(), 0.0);
    }
}
