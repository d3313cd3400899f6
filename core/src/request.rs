//! SOAP request body rendering.
//!
//! The envelope skeleton is fixed; only the input text and the four option
//! values are substituted. Text is escaped before substitution so caller
//! input can never add XML structure to the envelope.

use crate::types::ProcessTextParameters;

/// Namespace of the typograf web service operations.
pub const SERVICE_NAMESPACE: &str = "http://typograf.artlebedev.ru/webservices/";

impl ProcessTextParameters {
    /// Render the SOAP envelope for processing `text` with these parameters.
    pub fn request_body(&self, text: &str) -> String {
        format!(
            "<soapenv:Envelope xmlns:soapenv='http://schemas.xmlsoap.org/soap/envelope/'>
    <soapenv:Header>
    </soapenv:Header>
    <soapenv:Body>
        <tns:ProcessText xmlns:tns='{ns}'>
            <tns:text>{text}</tns:text>
            <tns:entityType>{entity_type}</tns:entityType>
            <tns:maxNobr>{max_nobr}</tns:maxNobr>
            <tns:useBr>{use_br}</tns:useBr>
            <tns:useP>{use_p}</tns:useP>
        </tns:ProcessText>
    </soapenv:Body>
</soapenv:Envelope>
",
            ns = SERVICE_NAMESPACE,
            text = escape_xml(text),
            entity_type = self.entity_type().code(),
            max_nobr = self.max_non_breaking_spaces(),
            use_br = self.use_break_line_tags(),
            use_p = self.use_paragraph_tags(),
        )
    }
}

/// Escape XML-significant characters and drop characters XML 1.0 cannot carry.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            c if is_xml_char(c) => escaped.push(c),
            _ => {}
        }
    }
    escaped
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}
