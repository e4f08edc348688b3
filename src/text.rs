//! Small text helpers for provider payloads.

/// Decode the HTML entities the platforms actually emit in titles and
/// descriptions: the five named ones plus numeric references.
pub fn decode_html_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let Some(end) = rest.find(';') else {
            // No terminator: nothing left to decode.
            out.push_str(rest);
            return out;
        };

        let entity = &rest[1..end];
        match decode_entity(entity) {
            Some(decoded) => {
                out.push_str(&decoded);
                rest = &rest[end + 1..];
            }
            None => {
                // Unknown entity, keep the ampersand literally.
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<String> {
    match entity {
        "amp" => return Some("&".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "quot" => return Some("\"".to_string()),
        "apos" => return Some("'".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()?
    } else {
        return None;
    };

    char::from_u32(code).map(|c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_entities() {
        assert_eq!(
            decode_html_entities("Tom &amp; Jerry &lt;3 &quot;cats&quot;"),
            "Tom & Jerry <3 \"cats\""
        );
    }

    #[test]
    fn decodes_numeric_entities() {
        assert_eq!(decode_html_entities("it&#39;s"), "it's");
        assert_eq!(decode_html_entities("d&#x27;oh"), "d'oh");
    }

    #[test]
    fn leaves_plain_text_and_unknown_entities_alone() {
        assert_eq!(decode_html_entities("no entities here"), "no entities here");
        assert_eq!(decode_html_entities("AT&T; R&D"), "AT&T; R&D");
        assert_eq!(decode_html_entities("trailing &"), "trailing &");
    }

    #[test]
    fn decodes_adjacent_entities() {
        assert_eq!(decode_html_entities("&lt;&gt;&amp;"), "<>&");
    }
}
