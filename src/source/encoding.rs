use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported encoding '{0}'")]
    UnknownEncoding(String),

    #[error("no candidate encoding decoded the content (tried: {})", format_tried(.tried))]
    Exhausted { tried: Vec<TextEncoding> },
}

fn format_tried(tried: &[TextEncoding]) -> String {
    tried
        .iter()
        .map(|e| e.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Text encodings a log file may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value
    Latin1,
    Windows1252,
    Cp850,
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Bytes with no assignment in windows-1252.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// Upper half (0x80..=0xFF) of code page 850.
const CP850_HIGH: [char; 128] = [
    '\u{00C7}', '\u{00FC}', '\u{00E9}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E5}', '\u{00E7}',
    '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00EF}', '\u{00EE}', '\u{00EC}', '\u{00C4}', '\u{00C5}',
    '\u{00C9}', '\u{00E6}', '\u{00C6}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00FB}', '\u{00F9}',
    '\u{00FF}', '\u{00D6}', '\u{00DC}', '\u{00F8}', '\u{00A3}', '\u{00D8}', '\u{00D7}', '\u{0192}',
    '\u{00E1}', '\u{00ED}', '\u{00F3}', '\u{00FA}', '\u{00F1}', '\u{00D1}', '\u{00AA}', '\u{00BA}',
    '\u{00BF}', '\u{00AE}', '\u{00AC}', '\u{00BD}', '\u{00BC}', '\u{00A1}', '\u{00AB}', '\u{00BB}',
    '\u{2591}', '\u{2592}', '\u{2593}', '\u{2502}', '\u{2524}', '\u{00C1}', '\u{00C2}', '\u{00C0}',
    '\u{00A9}', '\u{2563}', '\u{2551}', '\u{2557}', '\u{255D}', '\u{00A2}', '\u{00A5}', '\u{2510}',
    '\u{2514}', '\u{2534}', '\u{252C}', '\u{251C}', '\u{2500}', '\u{253C}', '\u{00E3}', '\u{00C3}',
    '\u{255A}', '\u{2554}', '\u{2569}', '\u{2566}', '\u{2560}', '\u{2550}', '\u{256C}', '\u{00A4}',
    '\u{00F0}', '\u{00D0}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{0131}', '\u{00CD}', '\u{00CE}',
    '\u{00CF}', '\u{2518}', '\u{250C}', '\u{2588}', '\u{2584}', '\u{00A6}', '\u{00CC}', '\u{2580}',
    '\u{00D3}', '\u{00DF}', '\u{00D4}', '\u{00D2}', '\u{00F5}', '\u{00D5}', '\u{00B5}', '\u{00FE}',
    '\u{00DE}', '\u{00DA}', '\u{00DB}', '\u{00D9}', '\u{00FD}', '\u{00DD}', '\u{00AF}', '\u{00B4}',
    '\u{00AD}', '\u{00B1}', '\u{2017}', '\u{00BE}', '\u{00B6}', '\u{00A7}', '\u{00F7}', '\u{00B8}',
    '\u{00B0}', '\u{00A8}', '\u{00B7}', '\u{00B9}', '\u{00B3}', '\u{00B2}', '\u{25A0}', '\u{00A0}',
];

impl TextEncoding {
    /// Canonical label, as accepted in config.
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Windows1252 => "windows-1252",
            TextEncoding::Cp850 => "cp850",
        }
    }

    /// Decode the entire byte slice, or `None` if any byte sequence is invalid
    /// in this encoding. Never substitutes replacement characters.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                encoding_rs::UTF_8
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|text| text.into_owned())
            }
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Windows1252 => {
                if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
                    return None;
                }
                encoding_rs::WINDOWS_1252
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|text| text.into_owned())
            }
            TextEncoding::Cp850 => Some(
                bytes
                    .iter()
                    .map(|&b| {
                        if b < 0x80 {
                            char::from(b)
                        } else {
                            CP850_HIGH[usize::from(b - 0x80)]
                        }
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = DecodeError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(TextEncoding::Latin1),
            "cp1252" | "windows-1252" => Ok(TextEncoding::Windows1252),
            "cp850" | "ibm850" | "850" => Ok(TextEncoding::Cp850),
            _ => Err(DecodeError::UnknownEncoding(label.to_string())),
        }
    }
}

/// Parse encoding labels into an ordered candidate list.
///
/// Labels naming the same codec collapse onto the first occurrence so the
/// trial order stays fixed regardless of aliases.
pub fn candidates_from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Vec<TextEncoding>, DecodeError> {
    let mut candidates = Vec::with_capacity(labels.len());
    for label in labels {
        let encoding: TextEncoding = label.as_ref().parse()?;
        if !candidates.contains(&encoding) {
            candidates.push(encoding);
        }
    }
    Ok(candidates)
}

/// Try each candidate in order and return the first that decodes all of `bytes`.
pub fn decode_first(
    bytes: &[u8],
    candidates: &[TextEncoding],
) -> Result<(TextEncoding, String), DecodeError> {
    for encoding in candidates {
        if let Some(text) = encoding.decode(bytes) {
            return Ok((*encoding, text));
        }
    }
    Err(DecodeError::Exhausted {
        tried: candidates.to_vec(),
    })
}
