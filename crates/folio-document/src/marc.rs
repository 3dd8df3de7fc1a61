// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// MARC-XML bibliographic metadata.
//
// Only the first `record` element of a document is read. Each accessor picks
// the first occurrence of the first tag in its lookup list that is present,
// joins the wanted subfields with a single space in document order, and trims
// trailing ISBD punctuation (`,` `/` `:` `;`) and whitespace.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use folio_core::error::{FolioError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, instrument};

/// Conventional file name of an item's bibliographic record.
pub const MARC_FILENAME: &str = "marc.xml";

const TITLE: (&[&str], &[char]) = (&["245"], &['a', 'b']);
const PERSONAL_AUTHOR: (&[&str], &[char]) = (&["100", "700"], &['a', 'b', 'c', 'd']);
const CORPORATE_AUTHOR: (&[&str], &[char]) = (&["110", "710"], &['a', 'b', 'c', 'd']);
const PUBLISHER: (&[&str], &[char]) = (&["260", "264"], &['a', 'b', 'c', 'd']);
const PHYSICAL_DESCRIPTION: (&[&str], &[char]) = (&["300"], &['a', 'b', 'c']);

/// One `datafield` of a MARC record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DataField {
    tag: String,
    subfields: Vec<(char, String)>,
}

/// Read-only view over one MARC-XML record. Accessors are computed on first
/// use and cached.
#[derive(Debug)]
pub struct MarcMetadata {
    fields: Vec<DataField>,
    title: OnceCell<Option<String>>,
    author: OnceCell<Option<String>>,
    publisher: OnceCell<Option<String>>,
    physical_description: OnceCell<Option<String>>,
}

impl MarcMetadata {
    /// Parse the MARC-XML file at `path`.
    ///
    /// Returns `Ok(None)` for a well-formed document that holds no `record`
    /// element, and `Err(MetadataUnavailable)` when the file cannot be read or
    /// is not well-formed XML.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let unavailable = |reason: String| FolioError::MetadataUnavailable {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        let metadata = Self::from_xml(&text).map_err(unavailable)?;
        debug!(found = metadata.is_some(), "MARC record parsed");
        Ok(metadata)
    }

    /// Parse MARC-XML held in memory. The error is a human-readable reason.
    pub fn from_xml(xml: &str) -> std::result::Result<Option<Self>, String> {
        Ok(parse_first_record(xml)?.map(Self::from_fields))
    }

    fn from_fields(fields: Vec<DataField>) -> Self {
        Self {
            fields,
            title: OnceCell::new(),
            author: OnceCell::new(),
            publisher: OnceCell::new(),
            physical_description: OnceCell::new(),
        }
    }

    /// Title statement (245 $a $b).
    pub fn title(&self) -> Option<&str> {
        self.title
            .get_or_init(|| self.lookup(TITLE))
            .as_deref()
    }

    /// Personal name (100, else 700); corporate name (110, else 710) only
    /// when no personal name is present.
    pub fn author(&self) -> Option<&str> {
        self.author
            .get_or_init(|| {
                self.lookup(PERSONAL_AUTHOR)
                    .or_else(|| self.lookup(CORPORATE_AUTHOR))
            })
            .as_deref()
    }

    /// Publication statement (260, else 264).
    pub fn publisher(&self) -> Option<&str> {
        self.publisher
            .get_or_init(|| self.lookup(PUBLISHER))
            .as_deref()
    }

    /// Physical description (300 $a $b $c).
    pub fn physical_description(&self) -> Option<&str> {
        self.physical_description
            .get_or_init(|| self.lookup(PHYSICAL_DESCRIPTION))
            .as_deref()
    }

    fn lookup(&self, (tags, codes): (&[&str], &[char])) -> Option<String> {
        let field = tags
            .iter()
            .find_map(|tag| self.fields.iter().find(|f| f.tag == *tag))?;
        let joined = field
            .subfields
            .iter()
            .filter(|(code, _)| codes.contains(code))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = trim_trailing_punctuation(&joined);
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    }
}

fn trim_trailing_punctuation(text: &str) -> &str {
    text.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '/' | ':' | ';'))
}

/// Locate an item's MARC record: `marc.xml`, else `<record_id>.xml` with the
/// record id's trailing check digit removed.
pub fn locate_record(dir: &Path, record_id: &str) -> Option<PathBuf> {
    let conventional = dir.join(MARC_FILENAME);
    if conventional.is_file() {
        return Some(conventional);
    }
    let mut chars = record_id.chars();
    chars.next_back()?;
    let stem = chars.as_str();
    if stem.is_empty() {
        return None;
    }
    let by_record = dir.join(format!("{stem}.xml"));
    by_record.is_file().then_some(by_record)
}

fn attribute(element: &BytesStart<'_>, name: &str) -> std::result::Result<Option<String>, String> {
    let Some(attr) = element
        .try_get_attribute(name)
        .map_err(|e| format!("bad attribute: {e}"))?
    else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|e| format!("bad attribute value: {e}"))?;
    Ok(Some(value.into_owned()))
}

/// Walk the whole document (so malformation anywhere is reported) and keep
/// the data fields of the first `record` element.
fn parse_first_record(xml: &str) -> std::result::Result<Option<Vec<DataField>>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut seen_root = false;
    let mut record: Option<Vec<DataField>> = None;
    let mut in_record = false;
    let mut field: Option<DataField> = None;
    let mut subfield: Option<(char, String)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                depth += 1;
                seen_root = true;
                match e.local_name().as_ref() {
                    b"record" if record.is_none() && !in_record => {
                        in_record = true;
                        record = Some(Vec::new());
                    }
                    b"datafield" if in_record => {
                        let tag = attribute(&e, "tag")?.unwrap_or_default();
                        field = Some(DataField {
                            tag,
                            subfields: Vec::new(),
                        });
                    }
                    b"subfield" if field.is_some() => {
                        let code = attribute(&e, "code")?
                            .and_then(|c| c.chars().next())
                            .unwrap_or(' ');
                        subfield = Some((code, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                seen_root = true;
                if e.local_name().as_ref() == b"record" && record.is_none() {
                    record = Some(Vec::new());
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| format!("bad text: {e}"))?;
                if depth == 0 && !text.trim().is_empty() {
                    return Err("text outside the root element".into());
                }
                if let Some((_, value)) = subfield.as_mut() {
                    value.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some((_, value)) = subfield.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"subfield" => {
                        if let (Some(sub), Some(f)) = (subfield.take(), field.as_mut()) {
                            f.subfields.push(sub);
                        }
                    }
                    b"datafield" => {
                        if let (Some(f), Some(fields)) = (field.take(), record.as_mut()) {
                            if in_record {
                                fields.push(f);
                            }
                        }
                    }
                    b"record" if in_record => in_record = false,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err("unexpected end of document: unclosed elements".into());
    }
    if !seen_root {
        return Err("no root element".into());
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<collection xmlns="http://www.loc.gov/MARC21/slim">
  <record>
    <leader>00000cam a2200000 a 4500</leader>
    <controlfield tag="001">b12345678</controlfield>
    <datafield tag="245" ind1="1" ind2="0">
      <subfield code="a">The great Gatsby /</subfield>
      <subfield code="c">F. Scott Fitzgerald.</subfield>
    </datafield>
    <datafield tag="700" ind1="1" ind2=" ">
      <subfield code="a">Perkins, Maxwell,</subfield>
      <subfield code="e">editor.</subfield>
    </datafield>
    <datafield tag="100" ind1="1" ind2=" ">
      <subfield code="a">Fitzgerald, F. Scott</subfield>
      <subfield code="q">(Francis Scott),</subfield>
      <subfield code="d">1896-1940.</subfield>
    </datafield>
    <datafield tag="264" ind1=" " ind2="1">
      <subfield code="a">New York :</subfield>
      <subfield code="b">Scribner,</subfield>
      <subfield code="c">1925.</subfield>
    </datafield>
    <datafield tag="300" ind1=" " ind2=" ">
      <subfield code="a">218 pages ;</subfield>
      <subfield code="c">20 cm</subfield>
    </datafield>
  </record>
</collection>"#;

    fn parse(xml: &str) -> MarcMetadata {
        MarcMetadata::from_xml(xml).expect("well-formed").expect("record")
    }

    #[test]
    fn extracts_title_and_trims_punctuation() {
        assert_eq!(parse(RECORD).title(), Some("The great Gatsby"));
    }

    #[test]
    fn prefers_100_over_700() {
        assert_eq!(parse(RECORD).author(), Some("Fitzgerald, F. Scott 1896-1940."));
    }

    #[test]
    fn falls_back_to_264_for_publisher() {
        assert_eq!(parse(RECORD).publisher(), Some("New York : Scribner, 1925."));
    }

    #[test]
    fn physical_description_joins_wanted_subfields() {
        assert_eq!(parse(RECORD).physical_description(), Some("218 pages ; 20 cm"));
    }

    #[test]
    fn corporate_author_only_without_personal_author() {
        let xml = r#"<record>
            <datafield tag="710"><subfield code="a">Acme Press.</subfield></datafield>
            <datafield tag="110"><subfield code="a">Library of Congress,</subfield></datafield>
        </record>"#;
        assert_eq!(parse(xml).author(), Some("Library of Congress"));
    }

    #[test]
    fn missing_fields_are_none() {
        let metadata = parse("<record><controlfield tag=\"001\">x</controlfield></record>");
        assert_eq!(metadata.title(), None);
        assert_eq!(metadata.author(), None);
        assert_eq!(metadata.publisher(), None);
    }

    #[test]
    fn namespace_prefixes_are_ignored() {
        let xml = r#"<marc:record xmlns:marc="http://www.loc.gov/MARC21/slim">
            <marc:datafield tag="245"><marc:subfield code="a">Prefixed :</marc:subfield>
            <marc:subfield code="b">a subtitle /</marc:subfield></marc:datafield>
        </marc:record>"#;
        assert_eq!(parse(xml).title(), Some("Prefixed : a subtitle"));
    }

    #[test]
    fn entities_are_unescaped() {
        let xml = r#"<record><datafield tag="245"><subfield code="a">Salt &amp; pepper</subfield></datafield></record>"#;
        assert_eq!(parse(xml).title(), Some("Salt & pepper"));
    }

    #[test]
    fn only_first_record_is_used() {
        let xml = r#"<collection>
            <record><datafield tag="245"><subfield code="a">First</subfield></datafield></record>
            <record><datafield tag="245"><subfield code="a">Second</subfield></datafield></record>
        </collection>"#;
        assert_eq!(parse(xml).title(), Some("First"));
    }

    #[test]
    fn document_without_record_is_none() {
        let parsed = MarcMetadata::from_xml("<collection/>").expect("well-formed");
        assert!(parsed.is_none());
    }

    #[test]
    fn malformed_documents_are_errors() {
        for xml in [
            r#"<record><datafield tag="245"><subfield code="a">Broken</datafield></record>"#,
            "<record><datafield tag=\"245\">",
            "this is not xml",
            "",
        ] {
            assert!(MarcMetadata::from_xml(xml).is_err(), "{xml:?} parsed");
        }
    }

    #[test]
    fn load_reports_metadata_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(MARC_FILENAME);
        std::fs::write(&path, "<record><oops></record>").expect("write");
        let err = MarcMetadata::load(&path).unwrap_err();
        assert!(matches!(err, FolioError::MetadataUnavailable { .. }));
    }

    #[test]
    fn locates_record_by_id_without_check_digit() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(locate_record(dir.path(), "b1234567x"), None);

        let by_id = dir.path().join("b1234567.xml");
        std::fs::write(&by_id, RECORD).expect("write");
        assert_eq!(locate_record(dir.path(), "b1234567x"), Some(by_id));

        let conventional = dir.path().join(MARC_FILENAME);
        std::fs::write(&conventional, RECORD).expect("write");
        assert_eq!(locate_record(dir.path(), "b1234567x"), Some(conventional));
    }
}
