//! Set Blob Service Properties body carrying CORS rules.

use crate::container::CorsRule;

/// Render the Set Blob Service Properties body for the given CORS rules.
///
/// Only the `Cors` element is sent, so logging and metrics settings are left
/// as they are.
pub fn cors_properties_body(rules: &[CorsRule]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<StorageServiceProperties>\n  <Cors>\n");
    for rule in rules {
        xml.push_str("    <CorsRule>\n");
        push_list(&mut xml, "AllowedOrigins", &rule.allowed_origins);
        push_list(&mut xml, "AllowedMethods", &rule.allowed_methods);
        push_list(&mut xml, "AllowedHeaders", &rule.allowed_headers);
        push_list(&mut xml, "ExposedHeaders", &rule.exposed_headers);
        xml.push_str(&format!(
            "      <MaxAgeInSeconds>{}</MaxAgeInSeconds>\n",
            rule.max_age_secs
        ));
        xml.push_str("    </CorsRule>\n");
    }
    xml.push_str("  </Cors>\n</StorageServiceProperties>");
    xml
}

fn push_list(xml: &mut String, tag: &str, values: &[String]) {
    xml.push_str(&format!(
        "      <{tag}>{}</{tag}>\n",
        escape(&values.join(","))
    ));
}

/// Escape the five predefined XML entities.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
