//! XML escaping for character data and attribute values.

use std::io::{self, Write};

/// Where escaped text is going to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    /// Element content. Escapes `&` `<` `>`.
    Text,
    /// A double-quoted attribute value. Also escapes `"` and the whitespace
    /// characters attribute normalization would otherwise fold into spaces.
    Attribute,
}

fn replacement(byte: u8, context: Context) -> Option<&'static [u8]> {
    match (byte, context) {
        (b'&', _) => Some(b"&amp;"),
        (b'<', _) => Some(b"&lt;"),
        (b'>', _) => Some(b"&gt;"),
        (b'"', Context::Attribute) => Some(b"&quot;"),
        (b'\n', Context::Attribute) => Some(b"&#10;"),
        (b'\r', Context::Attribute) => Some(b"&#13;"),
        (b'\t', Context::Attribute) => Some(b"&#9;"),
        // keeps "\r\n" in content from collapsing to "\n" on the way back in
        (b'\r', Context::Text) => Some(b"&#13;"),
        _ => None,
    }
}

/// Writes `text` to `out`, copying unescaped runs in one call each.
pub(crate) fn write_escaped<W: Write + ?Sized>(
    out: &mut W,
    text: &str,
    context: Context,
) -> io::Result<()> {
    let bytes = text.as_bytes();
    let mut run_start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(entity) = replacement(b, context) {
            out.write_all(&bytes[run_start..i])?;
            out.write_all(entity)?;
            run_start = i + 1;
        }
    }
    out.write_all(&bytes[run_start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape(text: &str, context: Context) -> String {
        let mut buf = Vec::new();
        write_escaped(&mut buf, text, context).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn text_escapes_markup() {
        assert_eq!(escape("a < b && c > d", Context::Text), "a &lt; b &amp;&amp; c &gt; d");
    }

    #[test]
    fn text_keeps_quotes_and_newlines() {
        assert_eq!(escape("say \"hi\"\n", Context::Text), "say \"hi\"\n");
    }

    #[test]
    fn attribute_escapes_quotes_and_whitespace() {
        assert_eq!(
            escape("a \"b\"\n\tc", Context::Attribute),
            "a &quot;b&quot;&#10;&#9;c"
        );
    }

    #[test]
    fn multibyte_text_passes_through() {
        assert_eq!(escape("héllo → wörld", Context::Attribute), "héllo → wörld");
    }

    #[test]
    fn escape_at_both_ends() {
        assert_eq!(escape("<x>", Context::Text), "&lt;x&gt;");
        assert_eq!(escape("", Context::Text), "");
    }
}
