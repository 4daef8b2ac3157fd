//! The XML document sent with host generated error responses.
//!
//! ```text
//! <?xml version="1.0" encoding="ascii"?>
//! <?xml-stylesheet type="text/xsl" href="/sys/error.xsl"?>
//! <error xmlns="http://if.fault.io/xml/failure" domain="/internet/http">
//!   <frame code="404" message="NOT FOUND"/>
//! </error>
//! ```
//!
//! The rendered document carries no whitespace between elements and is pure
//! ASCII: markup characters and anything outside printable ASCII in the
//! description are written as character references.

use std::fmt::Write;

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;

use crate::status;

pub const STYLESHEET: &str = "/sys/error.xsl";

const PROLOGUE: &str = concat!(
    r#"<?xml version="1.0" encoding="ascii"?>"#,
    r#"<?xml-stylesheet type="text/xsl" href="/sys/error.xsl"?>"#,
    r#"<error xmlns="http://if.fault.io/xml/failure" domain="/internet/http">"#,
);

pub fn render(status: StatusCode, description: &str) -> Bytes {
    let mut dst = BytesMut::with_capacity(PROLOGUE.len() + description.len() + 48);
    dst.put_slice(PROLOGUE.as_bytes());
    dst.put_slice(br#"<frame code=""#);
    dst.put_slice(&status::code(status));
    dst.put_slice(br#"" message=""#);
    escape(description, &mut dst);
    dst.put_slice(br#""/></error>"#);
    dst.freeze()
}

fn escape(text: &str, dst: &mut BytesMut) {
    for ch in text.chars() {
        match ch {
            '&' => dst.put_slice(b"&amp;"),
            '<' => dst.put_slice(b"&lt;"),
            '>' => dst.put_slice(b"&gt;"),
            '"' => dst.put_slice(b"&quot;"),
            ' '..='~' => dst.put_u8(ch as u8),
            _ => {
                let mut reference = String::with_capacity(10);
                let _ = write!(reference, "&#{};", u32::from(ch));
                dst.put_slice(reference.as_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_document() {
        let document = render(StatusCode::NOT_FOUND, "NOT FOUND");
        let expected = concat!(
            r#"<?xml version="1.0" encoding="ascii"?>"#,
            r#"<?xml-stylesheet type="text/xsl" href="/sys/error.xsl"?>"#,
            r#"<error xmlns="http://if.fault.io/xml/failure" domain="/internet/http">"#,
            r#"<frame code="404" message="NOT FOUND"/>"#,
            r#"</error>"#,
        );
        assert_eq!(document, expected.as_bytes());
        assert!(PROLOGUE.contains(STYLESHEET));
    }

    #[test]
    fn description_is_escaped_to_ascii() {
        let document = render(StatusCode::INTERNAL_SERVER_ERROR, r#"<bad> "quote" & café"#);
        let document = std::str::from_utf8(&document).unwrap();
        assert!(document.is_ascii());
        assert!(document.contains(r#"message="&lt;bad&gt; &quot;quote&quot; &amp; caf&#233;""#), "{document}");
    }
}
