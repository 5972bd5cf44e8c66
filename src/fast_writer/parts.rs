//! Package-level parts: manifest, relationships, workbook and document properties

use super::xml_writer::XmlBuffer;
use crate::error::Result;
use crate::types::DocumentProperties;
use chrono::{DateTime, Utc};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const DOC_RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const APPLICATION: &str = "sheetstream";

/// What the workbook part needs to know about each sheet
#[derive(Debug, Clone)]
pub struct SheetEntry {
    pub name: String,
    pub hidden: bool,
    /// Target of the sheet's hidden `_xlnm._FilterDatabase` name
    pub filter_range: Option<String>,
}

/// Relationship id of the n-th (0-based) sheet; styles and strings follow the sheets
fn sheet_rel_id(index: usize) -> usize {
    index + 1
}

pub fn write_content_types(buffer: &mut XmlBuffer, sheet_count: usize) {
    buffer.write_str(XML_DECLARATION);
    buffer.write_str(
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>",
    );
    for i in 1..=sheet_count {
        buffer.write_str("<Override PartName=\"/xl/worksheets/sheet");
        buffer.write_int(i);
        buffer.write_str(
            ".xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>",
        );
    }
    buffer.write_str(
        "<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
         <Override PartName=\"/xl/sharedStrings.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>\
         <Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
         <Override PartName=\"/docProps/app.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.extended-properties+xml\"/>\
         </Types>",
    );
}

pub fn write_root_rels(buffer: &mut XmlBuffer) {
    buffer.write_str(XML_DECLARATION);
    buffer.write_str(
        "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
         <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
         <Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>\
         <Relationship Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties\" Target=\"docProps/app.xml\"/>\
         </Relationships>",
    );
}

/// `xl/workbook.xml`: sheets in creation order, filter names, recalculation flag
pub fn write_workbook(
    buffer: &mut XmlBuffer,
    sheets: &[SheetEntry],
    needs_recalc: bool,
) -> Result<()> {
    buffer.write_str(XML_DECLARATION);
    buffer.start_element("workbook");
    buffer.attribute("xmlns", SPREADSHEET_NS)?;
    buffer.attribute("xmlns:r", DOC_RELATIONSHIPS_NS)?;
    buffer.close_start_tag();

    let active = sheets.iter().position(|s| !s.hidden).unwrap_or(0);
    buffer.write_str("<bookViews><workbookView");
    if active > 0 {
        buffer.attribute_int("activeTab", active);
    }
    buffer.write_str("/></bookViews>");

    buffer.write_str("<sheets>");
    for (i, sheet) in sheets.iter().enumerate() {
        buffer.start_element("sheet");
        buffer.attribute("name", &sheet.name)?;
        buffer.attribute_int("sheetId", i + 1);
        if sheet.hidden {
            buffer.write_str(" state=\"hidden\"");
        }
        buffer.write_str(" r:id=\"rId");
        buffer.write_int(sheet_rel_id(i));
        buffer.write_str("\"/>");
    }
    buffer.write_str("</sheets>");

    if sheets.iter().any(|s| s.filter_range.is_some()) {
        buffer.write_str("<definedNames>");
        for (i, sheet) in sheets.iter().enumerate() {
            if let Some(range) = &sheet.filter_range {
                buffer.write_str("<definedName name=\"_xlnm._FilterDatabase\"");
                buffer.attribute_int("localSheetId", i);
                buffer.write_str(" hidden=\"1\">");
                buffer.write_escaped_text(range)?;
                buffer.end_element("definedName");
            }
        }
        buffer.write_str("</definedNames>");
    }

    if needs_recalc {
        buffer.write_str("<calcPr calcId=\"0\" fullCalcOnLoad=\"1\"/>");
    }
    buffer.end_element("workbook");
    Ok(())
}

pub fn write_workbook_rels(buffer: &mut XmlBuffer, sheet_count: usize) -> Result<()> {
    buffer.write_str(XML_DECLARATION);
    buffer.start_element("Relationships");
    buffer.attribute("xmlns", RELATIONSHIPS_NS)?;
    buffer.close_start_tag();

    for i in 0..sheet_count {
        buffer.write_str("<Relationship Id=\"rId");
        buffer.write_int(sheet_rel_id(i));
        buffer.write_str(
            "\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" \
             Target=\"worksheets/sheet",
        );
        buffer.write_int(i + 1);
        buffer.write_str(".xml\"/>");
    }

    buffer.write_str("<Relationship Id=\"rId");
    buffer.write_int(sheet_count + 1);
    buffer.write_str(
        "\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>",
    );
    buffer.write_str("<Relationship Id=\"rId");
    buffer.write_int(sheet_count + 2);
    buffer.write_str(
        "\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings\" Target=\"sharedStrings.xml\"/>",
    );
    buffer.end_element("Relationships");
    Ok(())
}

/// `docProps/core.xml`
pub fn write_core_props(
    buffer: &mut XmlBuffer,
    properties: &DocumentProperties,
    now: DateTime<Utc>,
) -> Result<()> {
    let created = properties
        .created
        .unwrap_or(now)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    let modified = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let author = properties.author.as_deref().unwrap_or(APPLICATION);

    buffer.write_str(XML_DECLARATION);
    buffer.write_str(
        "<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" \
         xmlns:dcmitype=\"http://purl.org/dc/dcmitype/\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
    );
    if let Some(title) = &properties.title {
        buffer.text_element("dc:title", title)?;
    }
    if let Some(subject) = &properties.subject {
        buffer.text_element("dc:subject", subject)?;
    }
    buffer.text_element("dc:creator", author)?;
    buffer.text_element("cp:lastModifiedBy", author)?;
    buffer.write_str("<dcterms:created xsi:type=\"dcterms:W3CDTF\">");
    buffer.write_str(&created);
    buffer.write_str("</dcterms:created><dcterms:modified xsi:type=\"dcterms:W3CDTF\">");
    buffer.write_str(&modified);
    buffer.write_str("</dcterms:modified></cp:coreProperties>");
    Ok(())
}

/// `docProps/app.xml`
pub fn write_app_props(buffer: &mut XmlBuffer, properties: &DocumentProperties) -> Result<()> {
    buffer.write_str(XML_DECLARATION);
    buffer.write_str(
        "<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\" \
         xmlns:vt=\"http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes\">",
    );
    buffer.text_element("Application", APPLICATION)?;
    buffer.write_str("<DocSecurity>0</DocSecurity><ScaleCrop>false</ScaleCrop>");
    if let Some(company) = &properties.company {
        buffer.text_element("Company", company)?;
    }
    buffer.write_str(
        "<LinksUpToDate>false</LinksUpToDate><SharedDoc>false</SharedDoc>\
         <HyperlinksChanged>false</HyperlinksChanged><AppVersion>12.0000</AppVersion></Properties>",
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast_writer::options::InvalidCharPolicy;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn text(buffer: &XmlBuffer) -> String {
        String::from_utf8(buffer.as_bytes().to_vec()).unwrap()
    }

    fn entry(name: &str, hidden: bool, filter_range: Option<&str>) -> SheetEntry {
        SheetEntry {
            name: name.to_string(),
            hidden,
            filter_range: filter_range.map(str::to_string),
        }
    }

    #[test]
    fn test_workbook_part() {
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        let sheets = [
            entry("Hidden", true, None),
            entry("R&D", false, Some("'R&D'!$A$1:$C$9")),
        ];
        write_workbook(&mut buffer, &sheets, true).unwrap();
        let xml = text(&buffer);

        assert!(xml.contains("<workbookView activeTab=\"1\"/>"));
        assert!(xml.contains(
            "<sheets><sheet name=\"Hidden\" sheetId=\"1\" state=\"hidden\" r:id=\"rId1\"/>\
             <sheet name=\"R&amp;D\" sheetId=\"2\" r:id=\"rId2\"/></sheets>"
        ));
        assert!(xml.contains(
            "<definedNames><definedName name=\"_xlnm._FilterDatabase\" localSheetId=\"1\" hidden=\"1\">\
             'R&amp;D'!$A$1:$C$9</definedName></definedNames><calcPr calcId=\"0\" fullCalcOnLoad=\"1\"/></workbook>"
        ));
    }

    #[test]
    fn test_no_recalc_flag_by_default() {
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        write_workbook(&mut buffer, &[entry("Sheet1", false, None)], false).unwrap();
        let xml = text(&buffer);
        assert!(!xml.contains("calcPr"));
        assert!(!xml.contains("definedNames"));
        assert!(xml.contains("<workbookView/>"));
    }

    #[test]
    fn test_relationship_ids_follow_sheets() {
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        write_workbook_rels(&mut buffer, 2).unwrap();
        let xml = text(&buffer);
        assert!(xml.contains("Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet2.xml\""));
        assert!(xml.contains("Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\""));
        assert!(xml.contains("Id=\"rId4\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings\""));
    }

    #[test]
    fn test_content_types_list_every_sheet() {
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        write_content_types(&mut buffer, 3);
        let xml = text(&buffer);
        assert_eq!(xml.matches("/xl/worksheets/sheet").count(), 3);
        assert!(xml.contains("PartName=\"/xl/worksheets/sheet3.xml\""));
    }

    #[test]
    fn test_core_props() {
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 8, 9, 10).unwrap();
        let props = DocumentProperties::new().title("Q1 <draft>").author("Ana");
        write_core_props(&mut buffer, &props, now).unwrap();
        let xml = text(&buffer);

        assert!(xml.contains("<dc:title>Q1 &lt;draft&gt;</dc:title>"));
        assert!(xml.contains("<dc:creator>Ana</dc:creator>"));
        assert!(xml.contains(
            "<dcterms:created xsi:type=\"dcterms:W3CDTF\">2024-03-05T08:09:10Z</dcterms:created>"
        ));
    }
}
