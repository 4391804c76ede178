//! Open the container, read the content part, write it back.

use std::io::{Cursor, Read, Seek, Write};

use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::DocxError;
use crate::config::{DOCUMENT_PART, MAX_DOWNLOAD_BYTES};

/// Name of the entry holding the document's text. Exact match first;
/// some producers nest or rename the part, so fall back to a suffix
/// scan.
fn locate_content_part<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    if archive.file_names().any(|name| name == DOCUMENT_PART) {
        return Some(DOCUMENT_PART.to_string());
    }
    archive
        .file_names()
        .find(|name| name.ends_with("document.xml"))
        .map(str::to_string)
}

/// Pre-allocation bound for reading a part. The declared uncompressed
/// size is archive data, so it never reserves more than the transfer
/// ceiling.
fn read_capacity(declared: u64) -> usize {
    declared.min(MAX_DOWNLOAD_BYTES as u64) as usize
}

/// Read the content part as UTF-8 text.
pub fn read_content_part(bytes: &[u8]) -> Result<String, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let name = locate_content_part(&archive).ok_or(DocxError::MissingContentPart)?;
    let mut entry = archive.by_name(&name)?;
    let mut raw = Vec::with_capacity(read_capacity(entry.size()));
    entry.read_to_end(&mut raw)?;
    String::from_utf8(raw).map_err(|_| DocxError::NonUtf8ContentPart)
}

/// Rebuild the archive with the content part replaced by `xml`. Every
/// other entry is copied through raw (no recompression), preserving
/// entry order.
pub fn replace_content_part(bytes: &[u8], xml: &str) -> Result<Vec<u8>, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let name = locate_content_part(&archive).ok_or(DocxError::MissingContentPart)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.name() == name {
            writer.start_file(name.as_str(), SimpleFileOptions::default())?;
            writer.write_all(xml.as_bytes())?;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }
    Ok(writer.finish()?.into_inner())
}

/// Minimal two-entry container for tests: the content part plus one
/// opaque sibling.
#[cfg(test)]
pub(crate) fn make_container(document_xml: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(b"<Types/>").unwrap();
    writer.start_file(DOCUMENT_PART, options).unwrap();
    writer.write_all(document_xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_the_content_part_back() {
        let bytes = make_container("<w:document>hola</w:document>");
        assert_eq!(
            read_content_part(&bytes).unwrap(),
            "<w:document>hola</w:document>"
        );
    }

    #[test]
    fn replaces_only_the_content_part() {
        let bytes = make_container("<w:document>viejo</w:document>");
        let out = replace_content_part(&bytes, "<w:document>nuevo</w:document>").unwrap();

        assert_eq!(
            read_content_part(&out).unwrap(),
            "<w:document>nuevo</w:document>"
        );
        // The sibling entry survived the rewrite.
        let mut archive = ZipArchive::new(Cursor::new(out.as_slice())).unwrap();
        let mut sibling = String::new();
        archive
            .by_name("[Content_Types].xml")
            .unwrap()
            .read_to_string(&mut sibling)
            .unwrap();
        assert_eq!(sibling, "<Types/>");
    }

    #[test]
    fn missing_content_part_is_reported() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(
            read_content_part(&bytes),
            Err(DocxError::MissingContentPart)
        ));
    }

    #[test]
    fn suffix_scan_finds_relocated_parts() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:document/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert_eq!(read_content_part(&bytes).unwrap(), "<w:document/>");
    }

    #[test]
    fn garbage_bytes_are_a_zip_error() {
        assert!(matches!(
            read_content_part(b"not a zip at all"),
            Err(DocxError::Zip(_))
        ));
    }

    #[test]
    fn forged_declared_sizes_do_not_drive_allocation() {
        assert_eq!(read_capacity(64), 64);
        assert_eq!(read_capacity(u64::MAX), MAX_DOWNLOAD_BYTES);
    }
}
