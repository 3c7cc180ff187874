//! Attachment discovery over IMAP `BODYSTRUCTURE` trees, and decoding of
//! individually fetched body sections.

use async_imap::imap_proto::{BodyContentCommon, BodyParams, BodyStructure, ContentEncoding};
use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::MessageParser;

use crate::sanitize::sanitize_filename;

use super::model::AttachmentDescriptor;

/// Attachments of a message in MIME order.
///
/// A leaf part counts as an attachment when its disposition is `attachment`
/// or when it carries a file name. Embedded messages always count. Text and
/// multipart containers without a name are message body.
pub fn attachments_of(structure: &BodyStructure<'_>) -> Vec<AttachmentDescriptor> {
    let mut found = Vec::new();
    collect(structure, &[], &mut found);
    found
}

fn collect(structure: &BodyStructure<'_>, prefix: &[u32], found: &mut Vec<AttachmentDescriptor>) {
    match structure {
        BodyStructure::Multipart { bodies, .. } => {
            for (index, body) in bodies.iter().enumerate() {
                let mut path = prefix.to_vec();
                path.push(index as u32 + 1);
                collect(body, &path, found);
            }
        }
        BodyStructure::Basic { common, other, .. } | BodyStructure::Text { common, other, .. } => {
            if is_attachment(common) {
                let descriptor = describe(found.len(), leaf_section(prefix), common, other.octets);
                found.push(descriptor);
            }
        }
        BodyStructure::Message { common, other, .. } => {
            let descriptor = describe(found.len(), leaf_section(prefix), common, other.octets);
            found.push(descriptor);
        }
    }
}

/// A non-multipart message addresses its only body as section `1`.
fn leaf_section(prefix: &[u32]) -> Vec<u32> {
    if prefix.is_empty() {
        vec![1]
    } else {
        prefix.to_vec()
    }
}

fn is_attachment(common: &BodyContentCommon<'_>) -> bool {
    let disposed = common
        .disposition
        .as_ref()
        .is_some_and(|d| d.ty.eq_ignore_ascii_case("attachment"));
    disposed || raw_name(common).is_some()
}

fn param<'a>(params: &'a BodyParams<'_>, key: &str) -> Option<&'a str> {
    params
        .as_ref()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| &**v)
}

fn raw_name<'a>(common: &'a BodyContentCommon<'_>) -> Option<&'a str> {
    common
        .disposition
        .as_ref()
        .and_then(|d| param(&d.params, "filename"))
        .or_else(|| param(&common.ty.params, "name"))
        .filter(|name| !name.is_empty())
}

fn describe(
    part: usize,
    section: Vec<u32>,
    common: &BodyContentCommon<'_>,
    octets: u32,
) -> AttachmentDescriptor {
    let content_type = format!(
        "{}/{}",
        common.ty.ty.to_ascii_lowercase(),
        common.ty.subtype.to_ascii_lowercase()
    );

    let name = raw_name(common)
        .map(decode_words)
        .map(|name| sanitize_filename(&name))
        .unwrap_or_else(|| fallback_name(Some(&content_type)));

    AttachmentDescriptor {
        part,
        section,
        name,
        size: u64::from(octets),
        content_type: Some(content_type),
    }
}

/// Decodes RFC 2047 encoded words by parsing the value as a header.
fn decode_words(raw: &str) -> String {
    if !raw.contains("=?") {
        return raw.to_string();
    }
    let header = format!("Subject: {}\r\n\r\n", raw);
    MessageParser::default()
        .parse(header.as_bytes())
        .and_then(|message| message.subject().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

/// `attachment.<ext>` with the extension guessed from the content type.
pub fn fallback_name(content_type: Option<&str>) -> String {
    content_type
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|extensions| extensions.first())
        .map(|ext| format!("attachment.{}", ext))
        .unwrap_or_else(|| "attachment".to_string())
}

fn leaf_encoding<'s, 'a>(body: &'s BodyStructure<'a>) -> Option<&'s ContentEncoding<'a>> {
    match body {
        BodyStructure::Basic { other, .. }
        | BodyStructure::Text { other, .. }
        | BodyStructure::Message { other, .. } => Some(&other.transfer_encoding),
        BodyStructure::Multipart { .. } => None,
    }
}

fn encoding_at<'s, 'a>(
    structure: &'s BodyStructure<'a>,
    section: &[u32],
) -> Option<&'s ContentEncoding<'a>> {
    match (structure, section) {
        (BodyStructure::Multipart { bodies, .. }, [first, rest @ ..]) => {
            let body = bodies.get((*first as usize).checked_sub(1)?)?;
            if rest.is_empty() {
                leaf_encoding(body)
            } else {
                encoding_at(body, rest)
            }
        }
        (_, [1]) => leaf_encoding(structure),
        _ => None,
    }
}

/// Decodes the raw bytes of `section` according to its transfer encoding.
///
/// Returns `None` when the section does not exist in `structure` or the
/// content does not decode.
pub fn decode_section(
    structure: &BodyStructure<'_>,
    section: &[u32],
    raw: &[u8],
) -> Option<Vec<u8>> {
    match encoding_at(structure, section)? {
        ContentEncoding::Base64 => base64_decode(raw),
        ContentEncoding::QuotedPrintable => quoted_printable_decode(raw),
        _ => Some(raw.to_vec()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_imap::imap_proto::parser::parse_response;
    use async_imap::imap_proto::{AttributeValue, Response};

    pub(crate) const STATS_STRUCTURE: &[u8] = b"* 1 FETCH (BODYSTRUCTURE (\
        (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"us-ascii\") NIL NIL \"7BIT\" 14 1 NIL NIL NIL)\
        (\"APPLICATION\" \"OCTET-STREAM\" (\"NAME\" \"A.txt\") NIL NIL \"BASE64\" 8 NIL \
            (\"ATTACHMENT\" (\"FILENAME\" \"A.txt\")) NIL)\
        (\"APPLICATION\" \"ZIP\" NIL NIL NIL \"BASE64\" 0 NIL \
            (\"ATTACHMENT\" (\"FILENAME\" \"../stats.zip\")) NIL)\
        (\"TEXT\" \"CSV\" (\"NAME\" \"=?UTF-8?Q?Z=C3=BCrich.csv?=\") NIL NIL \
            \"QUOTED-PRINTABLE\" 12 1 NIL NIL NIL) \
        \"MIXED\" (\"BOUNDARY\" \"BOUNDARY\") NIL NIL))\r\n";

    pub(crate) fn with_structure<R>(response: &[u8], f: impl FnOnce(&BodyStructure<'_>) -> R) -> R {
        let (_, parsed) = parse_response(response).unwrap();
        match parsed {
            Response::Fetch(_, attributes) => {
                let structure = attributes
                    .iter()
                    .find_map(|attribute| match attribute {
                        AttributeValue::BodyStructure(structure) => Some(structure),
                        _ => None,
                    })
                    .unwrap();
                f(structure)
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_attachments_in_mime_order() {
        let attachments = with_structure(STATS_STRUCTURE, attachments_of);

        assert_eq!(attachments.len(), 3);
        assert_eq!(attachments[0].name, "A.txt");
        assert_eq!(attachments[0].section, vec![2]);
        assert_eq!(attachments[0].part, 0);
        assert_eq!(attachments[0].size, 8);
        assert_eq!(attachments[1].name, "_stats.zip");
        assert_eq!(attachments[1].content_type.as_deref(), Some("application/zip"));
        assert!(attachments[1].is_empty());
        assert_eq!(attachments[2].section, vec![4]);
    }

    #[test]
    fn test_encoded_word_names_are_decoded() {
        let attachments = with_structure(STATS_STRUCTURE, attachments_of);
        assert_eq!(attachments[2].name, "Zürich.csv");
    }

    #[test]
    fn test_single_part_message_without_name_has_no_attachments() {
        let response = b"* 1 FETCH (BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"us-ascii\") \
            NIL NIL \"7BIT\" 14 1 NIL NIL NIL))\r\n";
        assert!(with_structure(response, attachments_of).is_empty());
    }

    #[test]
    fn test_single_part_attachment_is_section_one() {
        let response = b"* 1 FETCH (BODYSTRUCTURE (\"APPLICATION\" \"PDF\" (\"NAME\" \"r.pdf\") \
            NIL NIL \"BASE64\" 12 NIL (\"ATTACHMENT\" (\"FILENAME\" \"r.pdf\")) NIL))\r\n";
        let attachments = with_structure(response, attachments_of);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].section, vec![1]);
    }

    #[test]
    fn test_decode_section_uses_transfer_encoding() {
        with_structure(STATS_STRUCTURE, |structure| {
            assert_eq!(
                decode_section(structure, &[2], b"aGVsbG8=\r\n").unwrap(),
                b"hello"
            );
            assert_eq!(
                decode_section(structure, &[4], b"a,b=0D=0A1,2").unwrap(),
                b"a,b\r\n1,2"
            );
            assert_eq!(decode_section(structure, &[1], b"plain").unwrap(), b"plain");
        });
    }

    #[test]
    fn test_decode_section_unknown_section() {
        with_structure(STATS_STRUCTURE, |structure| {
            assert!(decode_section(structure, &[9], b"x").is_none());
            assert!(decode_section(structure, &[], b"x").is_none());
        });
    }

    #[test]
    fn test_fallback_name_uses_content_type() {
        assert_eq!(fallback_name(Some("application/pdf")), "attachment.pdf");
        assert_eq!(fallback_name(None), "attachment");
    }
}
